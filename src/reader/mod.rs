//! Reader Module
//!
//! Opens a store file and serves queries against it. The whole header and
//! footer (alphabet, lexicon, entry tables, mappings, cluster table) are
//! loaded into memory at open; clusters stay on disk and are fetched and
//! decompressed per `get` call.
//!
//! The reader never mutates the file. `find` works purely on the in-memory
//! tables; `get` takes the file mutex for its one positioned read, so
//! concurrent calls against a shared reader are safe.

mod decode;
mod query;

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use bytes::{Buf, Bytes};
use parking_lot::Mutex;

use crate::error::{LexError, Result};
use crate::format::array2d::Array2d;
use crate::format::{
    need, split_nul_strings, version_string, MAX_SUPPORTED_VERSION, MIN_SUPPORTED_VERSION,
    READER_VERSION,
};
use crate::lexicon::Lexicon;

/// Read-only handle to one store file
pub struct Reader {
    /// Cluster reads seek+read under this lock
    file: Mutex<File>,

    writer_version: (u32, u32, u32),
    pub(crate) alphabet: Vec<String>,
    pub(crate) lexicon: Lexicon,

    /// Entry ids, strictly ascending
    pub(crate) ids: Vec<u64>,
    /// Per-row byte position inside the owning (decompressed) cluster
    pub(crate) pos: Vec<u16>,
    /// Per-row index into `cluster_offsets`
    pub(crate) cluster_of_row: Vec<u32>,

    /// Lexicon id -> (entry row << 8 | path index) references
    pub(crate) id_mapping: Array2d,
    /// Entry row -> lexicon ids under registered paths
    pub(crate) paths_mapping: Array2d,
    /// Absolute file offset of every cluster
    pub(crate) cluster_offsets: Vec<u32>,

    /// Whether the file was built with a path registry (content filters)
    pub(crate) filters_supported: bool,
}

impl Reader {
    /// Open a store file and load its header and footer tables
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| LexError::Open {
            path: path.display().to_string(),
            source: e,
        })?;
        let file_len = file.metadata()?.len();
        let mut input = BufReader::new(file);

        // version gate
        let writer_version = (
            read_u32(&mut input)?,
            read_u32(&mut input)?,
            read_u32(&mut input)?,
        );
        if writer_version < MIN_SUPPORTED_VERSION || writer_version > MAX_SUPPORTED_VERSION {
            return Err(LexError::UnsupportedVersion {
                found: version_string(writer_version),
                min: version_string(MIN_SUPPORTED_VERSION),
                max: version_string(MAX_SUPPORTED_VERSION),
            });
        }

        // alphabet block
        let alphabet_len = read_u16(&mut input)? as usize;
        let mut alphabet_bytes = vec![0u8; alphabet_len];
        read_header_exact(&mut input, &mut alphabet_bytes)?;
        let alphabet = split_nul_strings(&alphabet_bytes, "alphabet")?;

        // lexicon blob
        let lexicon = Lexicon::load(&mut input)?;

        // entry tables
        let entry_count = read_u32(&mut input)? as usize;
        let mut ids = Vec::with_capacity(entry_count);
        for _ in 0..entry_count {
            ids.push(read_u64(&mut input)?);
        }
        for pair in ids.windows(2) {
            if pair[0] >= pair[1] {
                return Err(LexError::Corrupted(
                    "entry ids not strictly ascending".to_string(),
                ));
            }
        }
        let mut pos = Vec::with_capacity(entry_count);
        for _ in 0..entry_count {
            pos.push(read_u16(&mut input)?);
        }
        let mut cluster_of_row = Vec::with_capacity(entry_count);
        for _ in 0..entry_count {
            cluster_of_row.push(read_u32(&mut input)?);
        }

        let footer_start = read_u32(&mut input)? as u64;
        let header_end = input.stream_position()?;
        if footer_start < header_end || footer_start > file_len {
            return Err(LexError::Corrupted(format!(
                "footer start {} outside file of {} bytes",
                footer_start, file_len
            )));
        }

        // footer
        input.seek(SeekFrom::Start(footer_start))?;
        let mut footer_bytes = Vec::with_capacity((file_len - footer_start) as usize);
        input.read_to_end(&mut footer_bytes)?;
        let mut footer = Bytes::from(footer_bytes);

        let id_mapping = Array2d::decode(&mut footer, "id mapping")?;
        let paths_mapping = Array2d::decode(&mut footer, "paths mapping")?;

        need(&footer, 4, "cluster table")?;
        let cluster_count = footer.get_u32_le() as usize;
        need(&footer, 4 * cluster_count, "cluster table")?;
        let mut cluster_offsets = Vec::with_capacity(cluster_count);
        for _ in 0..cluster_count {
            cluster_offsets.push(footer.get_u32_le());
        }
        if footer.has_remaining() {
            return Err(LexError::Corrupted(
                "trailing bytes after the footer".to_string(),
            ));
        }

        // cross-table consistency
        if id_mapping.rows() != lexicon.num_keys() {
            return Err(LexError::Corrupted(format!(
                "id mapping holds {} rows for {} lexicon keys",
                id_mapping.rows(),
                lexicon.num_keys()
            )));
        }
        if paths_mapping.rows() != entry_count {
            return Err(LexError::Corrupted(format!(
                "paths mapping holds {} rows for {} entries",
                paths_mapping.rows(),
                entry_count
            )));
        }

        let mut filters_supported = false;
        for &reference in id_mapping.elements() {
            if (reference >> 8) as usize >= entry_count {
                return Err(LexError::Corrupted(
                    "id mapping references an entry row out of range".to_string(),
                ));
            }
            filters_supported |= reference & 0xFF != 0;
        }
        for &lexicon_id in paths_mapping.elements() {
            if lexicon_id as usize >= lexicon.num_keys() {
                return Err(LexError::Corrupted(
                    "paths mapping references a lexicon id out of range".to_string(),
                ));
            }
        }
        for &c in &cluster_of_row {
            if c as usize >= cluster_offsets.len() {
                return Err(LexError::Corrupted(
                    "entry references a cluster out of range".to_string(),
                ));
            }
        }

        tracing::debug!(
            "opened store {}: {} entries, {} clusters, {} terms, writer v{}",
            path.display(),
            entry_count,
            cluster_offsets.len(),
            lexicon.num_keys(),
            version_string(writer_version)
        );

        Ok(Self {
            file: Mutex::new(input.into_inner()),
            writer_version,
            alphabet,
            lexicon,
            ids,
            pos,
            cluster_of_row,
            id_mapping,
            paths_mapping,
            cluster_offsets,
            filters_supported,
        })
    }

    /// Version of the writer that produced this file
    pub fn writer_version(&self) -> String {
        version_string(self.writer_version)
    }

    /// Version of this reading library
    pub fn reader_version(&self) -> String {
        version_string(READER_VERSION)
    }

    /// Number of entries in the store
    pub fn entry_count(&self) -> usize {
        self.ids.len()
    }

    /// Number of clusters in the store
    pub fn cluster_count(&self) -> usize {
        self.cluster_offsets.len()
    }

    /// Whether the file was built with a path registry
    pub fn filters_supported(&self) -> bool {
        self.filters_supported
    }
}

// =============================================================================
// Header Reads (truncation is corruption, not I/O failure)
// =============================================================================

fn read_header_exact(input: &mut impl Read, buf: &mut [u8]) -> Result<()> {
    input.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            LexError::Corrupted("truncated header".to_string())
        } else {
            LexError::Io(e)
        }
    })
}

fn read_u16(input: &mut impl Read) -> Result<u16> {
    let mut buf = [0u8; 2];
    read_header_exact(input, &mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32(input: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_header_exact(input, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(input: &mut impl Read) -> Result<u64> {
    let mut buf = [0u8; 8];
    read_header_exact(input, &mut buf)?;
    Ok(u64::from_le_bytes(buf))
}
