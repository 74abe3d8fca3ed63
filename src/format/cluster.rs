//! Cluster frame codec
//!
//! A cluster is one independently compressed block of back-to-back entry
//! blobs. On disk:
//! ```text
//! [UncompressedSize: u16][CompressedLen: i32][CompressedLen bytes, LZ4 block]
//! ```
//! Decompression must yield exactly the declared uncompressed size.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use lz4_flex::block::{compress, decompress, get_maximum_output_size};

use crate::error::{LexError, Result};

/// Frame header: uncompressed size (2) + compressed length (4)
pub const FRAME_HEADER: usize = 6;

/// Compress `data` and append one cluster frame at the writer's position.
///
/// Returns the absolute offset the frame was written at. The caller keeps
/// uncompressed cluster sizes within u16 range.
pub fn write_cluster<W: Write + Seek>(out: &mut W, data: &[u8]) -> Result<u64> {
    debug_assert!(data.len() <= u16::MAX as usize);

    let offset = out.stream_position()?;
    let compressed = compress(data);

    out.write_all(&(data.len() as u16).to_le_bytes())?;
    out.write_all(&(compressed.len() as i32).to_le_bytes())?;
    out.write_all(&compressed)?;

    tracing::debug!(
        "cluster at {}: {} bytes -> {} compressed",
        offset,
        data.len(),
        compressed.len()
    );

    Ok(offset)
}

/// Read and decompress the cluster frame at `offset`.
///
/// A frame that ends early is corruption, not an I/O failure: the header
/// tables told us it should be here.
pub fn read_cluster(file: &mut File, offset: u64) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(offset))?;

    let mut header = [0u8; FRAME_HEADER];
    read_frame_exact(file, &mut header)?;

    let uncompressed_size = u16::from_le_bytes(header[0..2].try_into().unwrap()) as usize;
    let compressed_len = i32::from_le_bytes(header[2..6].try_into().unwrap());

    if compressed_len <= 0
        || compressed_len as usize > get_maximum_output_size(u16::MAX as usize)
    {
        return Err(LexError::Corrupted(format!(
            "cluster at {} has bad compressed length {}",
            offset, compressed_len
        )));
    }

    let mut compressed = vec![0u8; compressed_len as usize];
    read_frame_exact(file, &mut compressed)?;

    let data = decompress(&compressed, uncompressed_size).map_err(|e| {
        LexError::Corrupted(format!("cluster at {} fails to decompress: {}", offset, e))
    })?;

    if data.len() != uncompressed_size {
        return Err(LexError::Corrupted(format!(
            "cluster at {} decompressed to {} bytes, declared {}",
            offset,
            data.len(),
            uncompressed_size
        )));
    }

    Ok(data)
}

/// `read_exact` that reports truncation as file corruption
fn read_frame_exact(file: &mut File, buf: &mut [u8]) -> Result<()> {
    file.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            LexError::Corrupted("cluster truncated".to_string())
        } else {
            LexError::Io(e)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn frame_roundtrips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clusters.bin");

        let data = b"entry-one entry-two entry-three".repeat(8);
        let offset = {
            let mut out = File::create(&path).unwrap();
            write_cluster(&mut out, &data).unwrap()
        };

        let mut file = File::open(&path).unwrap();
        assert_eq!(read_cluster(&mut file, offset).unwrap(), data);
    }

    #[test]
    fn truncated_frame_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clusters.bin");

        let data = b"0123456789abcdef".repeat(16);
        {
            let mut out = File::create(&path).unwrap();
            write_cluster(&mut out, &data).unwrap();
            let len = out.stream_position().unwrap();
            out.set_len(len - 1).unwrap();
        }

        let mut file = File::open(&path).unwrap();
        match read_cluster(&mut file, 0) {
            Err(LexError::Corrupted(_)) => {}
            other => panic!("expected corruption, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn in_memory_writer_records_offsets() {
        let mut out = Cursor::new(Vec::new());
        let a = write_cluster(&mut out, b"aaaa").unwrap();
        let b = write_cluster(&mut out, b"bbbb").unwrap();
        assert_eq!(a, 0);
        assert!(b > a);
    }
}
