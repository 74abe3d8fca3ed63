//! Writer Module
//!
//! Compiles a source document collection into one store file. The writer is
//! single-threaded and makes two full traversals of the source: the
//! collection pass freezes the alphabet, lexicon and id table, then the
//! encoding pass streams entry blobs into byte-budgeted clusters and patches
//! the header tables it reserved up front.
//!
//! A failed write leaves the destination in an undefined state; callers must
//! discard it.

mod cluster;
mod collect;
mod encoder;

use std::fs::OpenOptions;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use bytes::BytesMut;

use crate::error::{LexError, Result};
use crate::format::array2d::Array2d;
use crate::format::{
    MAX_ENTRY_ROWS, MAX_RECORD_PAYLOAD, MAX_REGISTERED_PATHS, WRITER_VERSION,
};
use crate::scan::{Scan, ScanEvent, XmlScanner};

use cluster::ClusterPacker;
use collect::CollectPass;
use encoder::TreeEncoder;

// =============================================================================
// Source Conventions
// =============================================================================

/// Wrapper element holding the entry sequence
const BODY_TAG: &str = "body";

/// Element marking one entry
const ENTRY_TAG: &str = "entry";

/// Entry attribute carrying the caller-assigned id
const ID_ATTR: &str = "xml:id";

// =============================================================================
// Pass Driver
// =============================================================================

/// Receiver for the structural events both passes share
pub(crate) trait PassSink {
    fn entry_open(&mut self, id: u64, extra_attrs: &[(String, String)]) -> Result<()>;
    fn element_open(&mut self, name: &str, attrs: &[(String, String)]) -> Result<()>;
    fn text(&mut self, s: &str) -> Result<()>;
    fn element_close(&mut self) -> Result<()>;
    fn entry_close(&mut self) -> Result<()>;
    fn document_end(&mut self) -> Result<()>;
}

/// What one open element on the stack means to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    /// Outside the body, or a non-entry element directly under it
    Ignored,
    Body,
    Entry,
    Element,
}

/// Drive one full traversal, routing events by document structure.
///
/// Handles the body/entry framing, id extraction, and the structural errors
/// both passes agree on (nested entries, bare text under an entry).
fn run_pass(scanner: &mut impl Scan, sink: &mut impl PassSink) -> Result<()> {
    let mut levels: Vec<Level> = Vec::new();

    while let Some(event) = scanner.next_event()? {
        match event {
            ScanEvent::Open { name, attrs } => {
                let level = match levels.last() {
                    Some(Level::Entry) | Some(Level::Element) => {
                        if name == ENTRY_TAG {
                            return Err(LexError::Source("nested entry element".to_string()));
                        }
                        sink.element_open(&name, &attrs)?;
                        Level::Element
                    }
                    Some(Level::Body) if name == ENTRY_TAG => {
                        let (id, extra) = entry_identity(&attrs)?;
                        sink.entry_open(id, &extra)?;
                        Level::Entry
                    }
                    Some(Level::Body) => Level::Ignored,
                    _ => {
                        if name == BODY_TAG && !levels.contains(&Level::Body) {
                            Level::Body
                        } else {
                            Level::Ignored
                        }
                    }
                };
                levels.push(level);
            }
            ScanEvent::Close => {
                let level = levels
                    .pop()
                    .ok_or_else(|| LexError::Source("unbalanced element close".to_string()))?;
                match level {
                    Level::Element => sink.element_close()?,
                    Level::Entry => sink.entry_close()?,
                    Level::Body | Level::Ignored => {}
                }
            }
            ScanEvent::Text(s) => match levels.last() {
                Some(Level::Element) => sink.text(&s)?,
                Some(Level::Entry) => {
                    return Err(LexError::Source(
                        "text directly under an entry element".to_string(),
                    ));
                }
                _ => {}
            },
        }
    }

    if !levels.is_empty() {
        return Err(LexError::Source("document ends with open elements".to_string()));
    }

    sink.document_end()
}

/// Split an entry's attributes into its parsed id and the remainder
fn entry_identity(attrs: &[(String, String)]) -> Result<(u64, Vec<(String, String)>)> {
    let mut id = None;
    let mut extra = Vec::new();

    for (name, value) in attrs {
        if name == ID_ATTR {
            id = Some(parse_entry_id(value).ok_or_else(|| {
                LexError::Source(format!("entry id {:?} holds no number", value))
            })?);
        } else {
            extra.push((name.clone(), value.clone()));
        }
    }

    match id {
        Some(id) => Ok((id, extra)),
        None => Err(LexError::Source("entry without an xml:id".to_string())),
    }
}

/// Parse the leading digit run after skipping any non-digit prefix
/// (`"e1010990"` yields 1010990)
fn parse_entry_id(raw: &str) -> Option<u64> {
    let digits: String = raw
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

// =============================================================================
// Encoding Pass Sink
// =============================================================================

struct EncodePass<'a, 'b, W: Write + Seek> {
    encoder: TreeEncoder<'a>,
    packer: ClusterPacker,
    out: &'b mut W,
    encoded: u64,
}

impl<'a, 'b, W: Write + Seek> PassSink for EncodePass<'a, 'b, W> {
    fn entry_open(&mut self, id: u64, _extra_attrs: &[(String, String)]) -> Result<()> {
        self.encoder.begin_entry(id)
    }

    fn element_open(&mut self, name: &str, attrs: &[(String, String)]) -> Result<()> {
        self.encoder.open_element(name, attrs)
    }

    fn text(&mut self, s: &str) -> Result<()> {
        self.encoder.text(s)
    }

    fn element_close(&mut self) -> Result<()> {
        self.encoder.close_element()
    }

    fn entry_close(&mut self) -> Result<()> {
        let (row, blob) = self.encoder.finish_entry()?;
        self.packer.push_entry(row, &blob, self.out)?;

        self.encoded += 1;
        if self.encoded % 5000 == 0 {
            tracing::debug!("encoded {} entries", self.encoded);
        }
        Ok(())
    }

    fn document_end(&mut self) -> Result<()> {
        self.packer.flush(self.out)
    }
}

// =============================================================================
// Public Entry Point
// =============================================================================

/// What `write` produced, for logging and the CLI
#[derive(Debug, Clone)]
pub struct WriteSummary {
    pub entries: usize,
    pub clusters: usize,
    pub lexicon_keys: usize,
    pub alphabet_len: usize,
}

/// Compile `src` into a store file at `dst`.
///
/// `registered_paths` must be sorted and unique (their rank+1 becomes the
/// stored path index); `cluster_budget` bounds the uncompressed size of each
/// cluster.
pub fn write(
    src: impl AsRef<Path>,
    dst: impl AsRef<Path>,
    registered_paths: &[String],
    cluster_budget: u16,
) -> Result<WriteSummary> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    validate_registry(registered_paths)?;
    if cluster_budget == 0 {
        return Err(LexError::InvalidInput(
            "cluster budget must be at least 1 byte".to_string(),
        ));
    }

    tracing::info!("writing store {} from {}", dst.display(), src.display());

    // pass 1: freeze alphabet, lexicon and id table
    let mut collect = CollectPass::new();
    run_pass(&mut XmlScanner::from_path(src)?, &mut collect)?;
    let collected = collect.finish()?;

    if collected.ids.len() > MAX_ENTRY_ROWS {
        return Err(LexError::InvalidInput(format!(
            "{} entries exceed the {} the id-mapping layout addresses",
            collected.ids.len(),
            MAX_ENTRY_ROWS
        )));
    }
    if collected.lexicon.num_keys() > MAX_RECORD_PAYLOAD as usize
        || collected.alphabet.len() > MAX_RECORD_PAYLOAD as usize
    {
        return Err(LexError::InvalidInput(
            "alphabet or lexicon exceeds 30-bit record indexing".to_string(),
        ));
    }

    let alphabet_block = alphabet_block(&collected.alphabet)?;

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(dst)?;
    let mut out = BufWriter::new(file);

    // fixed leading sections
    let (major, minor, patch) = WRITER_VERSION;
    out.write_all(&major.to_le_bytes())?;
    out.write_all(&minor.to_le_bytes())?;
    out.write_all(&patch.to_le_bytes())?;

    out.write_all(&(alphabet_block.len() as u16).to_le_bytes())?;
    out.write_all(&alphabet_block)?;

    let mut lexicon_blob = Vec::new();
    collected.lexicon.save(&mut lexicon_blob);
    out.write_all(&lexicon_blob)?;

    // reserve the entry tables; patched once cluster positions are known
    let table_pos = out.stream_position()?;
    let entry_count = collected.ids.len();
    let reserved = 4 + entry_count * (8 + 2 + 4) + 4;
    out.write_all(&vec![0u8; reserved])?;

    // pass 2: encode entries into clusters
    let mut pass = EncodePass {
        encoder: TreeEncoder::new(
            &collected.alphabet,
            &collected.lexicon,
            &collected.ids,
            registered_paths,
        ),
        packer: ClusterPacker::new(cluster_budget, entry_count),
        out: &mut out,
        encoded: 0,
    };
    run_pass(&mut XmlScanner::from_path(src)?, &mut pass)?;

    let EncodePass {
        encoder, packer, ..
    } = pass;

    let footer_start = out.stream_position()?;
    if footer_start > u32::MAX as u64 {
        return Err(LexError::InvalidInput(
            "store file exceeds 4 GiB addressing".to_string(),
        ));
    }

    // patch the reserved tables
    out.seek(SeekFrom::Start(table_pos))?;
    out.write_all(&(entry_count as u32).to_le_bytes())?;
    for &id in &collected.ids {
        out.write_all(&id.to_le_bytes())?;
    }
    for &p in &packer.pos {
        out.write_all(&p.to_le_bytes())?;
    }
    for &c in &packer.cluster_of_row {
        out.write_all(&c.to_le_bytes())?;
    }
    out.write_all(&(footer_start as u32).to_le_bytes())?;

    // footer
    out.seek(SeekFrom::Start(footer_start))?;

    let id_mapping = Array2d::from_rows(&encoder.id_mapping);
    let paths_mapping = Array2d::from_rows(&encoder.paths_mapping);
    let mut footer = BytesMut::with_capacity(
        id_mapping.encoded_len() + paths_mapping.encoded_len() + 4 + 4 * packer.clusters(),
    );
    id_mapping.encode(&mut footer);
    paths_mapping.encode(&mut footer);
    footer.extend_from_slice(&(packer.clusters() as u32).to_le_bytes());
    for &offset in &packer.cluster_offsets {
        footer.extend_from_slice(&offset.to_le_bytes());
    }
    out.write_all(&footer)?;
    out.flush()?;

    let summary = WriteSummary {
        entries: entry_count,
        clusters: packer.clusters(),
        lexicon_keys: collected.lexicon.num_keys(),
        alphabet_len: collected.alphabet.len(),
    };
    tracing::info!(
        "store written: {} entries, {} clusters, {} terms, {} names",
        summary.entries,
        summary.clusters,
        summary.lexicon_keys,
        summary.alphabet_len
    );
    Ok(summary)
}

/// The registry must be sorted and unique so stored indices stay stable
fn validate_registry(paths: &[String]) -> Result<()> {
    if paths.len() > MAX_REGISTERED_PATHS {
        return Err(LexError::InvalidInput(format!(
            "{} registered paths exceed the limit of {}",
            paths.len(),
            MAX_REGISTERED_PATHS
        )));
    }
    for pair in paths.windows(2) {
        if pair[0] >= pair[1] {
            return Err(LexError::InvalidInput(
                "registered paths must be sorted and unique".to_string(),
            ));
        }
    }
    Ok(())
}

/// NUL-terminated sorted names, bounded by the u16 length prefix
fn alphabet_block(alphabet: &[String]) -> Result<Vec<u8>> {
    let mut block = Vec::new();
    for name in alphabet {
        block.extend_from_slice(name.as_bytes());
        block.push(0);
    }
    if block.len() > u16::MAX as usize {
        return Err(LexError::InvalidInput(format!(
            "alphabet block of {} bytes exceeds the u16 length field",
            block.len()
        )));
    }
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_ids_parse_after_a_prefix() {
        assert_eq!(parse_entry_id("e1010990"), Some(1010990));
        assert_eq!(parse_entry_id("42"), Some(42));
        assert_eq!(parse_entry_id("id-7x9"), Some(7));
        assert_eq!(parse_entry_id("none"), None);
        assert_eq!(parse_entry_id(""), None);
    }

    #[test]
    fn registry_must_be_sorted_unique() {
        let ok = vec!["/a".to_string(), "/b".to_string()];
        assert!(validate_registry(&ok).is_ok());

        let unsorted = vec!["/b".to_string(), "/a".to_string()];
        assert!(validate_registry(&unsorted).is_err());

        let dup = vec!["/a".to_string(), "/a".to_string()];
        assert!(validate_registry(&dup).is_err());
    }

    #[test]
    fn alphabet_block_is_nul_terminated() {
        let block = alphabet_block(&["a".to_string(), "bc".to_string()]).unwrap();
        assert_eq!(block, b"a\0bc\0");
    }
}
