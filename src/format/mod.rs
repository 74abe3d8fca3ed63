//! On-Disk Format Module
//!
//! Shared codecs and constants for the store file layout. All integers are
//! little-endian.
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header                                                       │
//! │   WriterVersion: u32 major | u32 minor | u32 patch           │
//! │   Alphabet: u16 byte length | NUL-terminated sorted strings  │
//! │   Lexicon blob (self-delimiting, see lexicon module)         │
//! │   EntryCount N: u32                                          │
//! │   N × u64 entry ids (strictly ascending)                     │
//! │   N × u16 in-cluster byte positions                          │
//! │   N × u32 cluster indices                                    │
//! │   FooterStart: u32 (absolute offset)                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Clusters (back-to-back)                                      │
//! │   [UncompressedSize: u16][CompressedLen: i32][LZ4 block]     │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Footer (at FooterStart)                                      │
//! │   Id mapping: 2-D u32 array                                  │
//! │   Paths mapping: 2-D u32 array                               │
//! │   Cluster table: u32 count | count × u32 absolute offsets    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entry blob (inside a decompressed cluster, no separator):
//! ```text
//! [LastNodePop: u8][bp bits, MSB-first, zero-left-padded][records]
//! ```
//! Record words are u32 with the tag in the low 2 bits (see `record`).
//! An id-mapping element packs `(entry row << 8) | path index`.

pub mod array2d;
pub mod bits;
pub mod cluster;
pub mod record;

use bytes::Buf;

use crate::error::{LexError, Result};

// =============================================================================
// Shared Constants
// =============================================================================

/// Format version stamped into every file this writer produces
pub const WRITER_VERSION: (u32, u32, u32) = (0, 1, 0);

/// Version of the reading side of this library
pub const READER_VERSION: (u32, u32, u32) = (0, 1, 0);

/// Oldest writer version this reader accepts (inclusive)
pub const MIN_SUPPORTED_VERSION: (u32, u32, u32) = (0, 1, 0);

/// Newest writer version this reader accepts (inclusive)
pub const MAX_SUPPORTED_VERSION: (u32, u32, u32) = (0, 1, 0);

/// Record payloads carry 30 bits; indices at or above this cannot be encoded
pub const MAX_RECORD_PAYLOAD: u32 = (1 << 30) - 1;

/// Entry rows share an id-mapping element with a u8 path index
pub const MAX_ENTRY_ROWS: usize = (1 << 24) - 1;

/// Path indices are 1-based u8, 0 meaning "unregistered"
pub const MAX_REGISTERED_PATHS: usize = 255;

/// Render a version triple the way `writer_version()` reports it
pub fn version_string(v: (u32, u32, u32)) -> String {
    format!("{}.{}.{}", v.0, v.1, v.2)
}

// =============================================================================
// Bounds-Checked Buffer Reads
// =============================================================================

/// Fail with a corruption error unless `buf` still holds `n` bytes of `what`
pub(crate) fn need(buf: &impl Buf, n: usize, what: &str) -> Result<()> {
    if buf.remaining() < n {
        return Err(LexError::Corrupted(format!("truncated {}", what)));
    }
    Ok(())
}

/// Parse a block of NUL-terminated strings in file order.
///
/// Empty strings are legal (an attribute value may be empty), so consecutive
/// NULs are significant. A trailing unterminated run is a corruption error.
pub(crate) fn split_nul_strings(bytes: &[u8], what: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    let mut current = Vec::new();

    for &b in bytes {
        if b == 0 {
            let s = String::from_utf8(std::mem::take(&mut current))
                .map_err(|_| LexError::Corrupted(format!("invalid UTF-8 in {}", what)))?;
            out.push(s);
        } else {
            current.push(b);
        }
    }

    if !current.is_empty() {
        return Err(LexError::Corrupted(format!(
            "unterminated string in {}",
            what
        )));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nul_strings_roundtrip_with_empties() {
        let block = b"abc\0\0xy\0";
        let parsed = split_nul_strings(block, "alphabet").unwrap();
        assert_eq!(parsed, vec!["abc".to_string(), String::new(), "xy".to_string()]);
    }

    #[test]
    fn nul_strings_reject_unterminated_tail() {
        assert!(split_nul_strings(b"abc\0tail", "alphabet").is_err());
    }

    #[test]
    fn version_string_formats_triple() {
        assert_eq!(version_string((1, 2, 3)), "1.2.3");
    }
}
