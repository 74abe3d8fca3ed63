//! Lexicon Module
//!
//! The term dictionary behind keyword search: every distinct text leaf in the
//! source maps to a stable integer id, bidirectionally. Ids are sort ranks
//! over the deduplicated key set, which keeps them stable for the lifetime of
//! one file and makes prefix (predictive) iteration a contiguous scan.
//!
//! ## Blob Format
//! ```text
//! [KeyCount: u32][ByteLen: u32][ByteLen bytes of NUL-terminated sorted keys]
//! ```
//! The blob is self-delimiting so it can sit between the alphabet block and
//! the entry tables in the store header.

use std::collections::BTreeSet;
use std::io::Read;

use crate::error::{LexError, Result};
use crate::format::split_nul_strings;

/// Immutable, prefix-searchable term dictionary with stable ids
#[derive(Debug, Default)]
pub struct Lexicon {
    /// Sorted unique keys; a key's index is its id
    keys: Vec<String>,
}

impl Lexicon {
    /// Build from the collected set of distinct text leaves.
    ///
    /// `BTreeSet` iteration order is the sorted order the id assignment
    /// depends on.
    pub fn build(terms: BTreeSet<String>) -> Self {
        Self {
            keys: terms.into_iter().collect(),
        }
    }

    /// Number of keys (ids are `0..num_keys`)
    pub fn num_keys(&self) -> usize {
        self.keys.len()
    }

    /// Exact lookup: key string to id
    pub fn lookup(&self, key: &str) -> Option<u32> {
        self.keys
            .binary_search_by(|k| k.as_str().cmp(key))
            .ok()
            .map(|i| i as u32)
    }

    /// Decode an id back to its key string
    pub fn decode(&self, id: u32) -> Option<&str> {
        self.keys.get(id as usize).map(|k| k.as_str())
    }

    /// Predictive iterator: all `(id, key)` pairs whose key starts with
    /// `prefix`, in sorted key order. An empty prefix visits every key.
    pub fn prefix_iter<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (u32, &'a str)> + 'a {
        let start = self.keys.partition_point(|k| k.as_str() < prefix);
        self.keys[start..]
            .iter()
            .enumerate()
            .take_while(move |(_, k)| k.starts_with(prefix))
            .map(move |(i, k)| ((start + i) as u32, k.as_str()))
    }

    /// Serialized byte length
    pub fn encoded_len(&self) -> usize {
        8 + self.keys.iter().map(|k| k.len() + 1).sum::<usize>()
    }

    /// Append the blob to a byte buffer
    pub fn save(&self, out: &mut Vec<u8>) {
        let byte_len: usize = self.keys.iter().map(|k| k.len() + 1).sum();
        out.extend_from_slice(&(self.keys.len() as u32).to_le_bytes());
        out.extend_from_slice(&(byte_len as u32).to_le_bytes());
        for key in &self.keys {
            out.extend_from_slice(key.as_bytes());
            out.push(0);
        }
    }

    /// Load the blob from the reader's current position.
    ///
    /// Validates the key count and the strict ascending order ids depend on.
    pub fn load(input: &mut impl Read) -> Result<Self> {
        let mut header = [0u8; 8];
        read_blob_exact(input, &mut header)?;

        let key_count = u32::from_le_bytes(header[0..4].try_into().unwrap()) as usize;
        let byte_len = u32::from_le_bytes(header[4..8].try_into().unwrap()) as usize;

        let mut bytes = vec![0u8; byte_len];
        read_blob_exact(input, &mut bytes)?;

        let keys = split_nul_strings(&bytes, "lexicon")?;
        if keys.len() != key_count {
            return Err(LexError::Corrupted(format!(
                "lexicon declares {} keys, blob holds {}",
                key_count,
                keys.len()
            )));
        }
        for pair in keys.windows(2) {
            if pair[0] >= pair[1] {
                return Err(LexError::Corrupted(
                    "lexicon keys not strictly ascending".to_string(),
                ));
            }
        }

        Ok(Self { keys })
    }
}

/// `read_exact` that reports truncation as file corruption
fn read_blob_exact(input: &mut impl Read, buf: &mut [u8]) -> Result<()> {
    input.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            LexError::Corrupted("lexicon blob truncated".to_string())
        } else {
            LexError::Io(e)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Lexicon {
        let terms: BTreeSet<String> = ["plump", "pleasant", "full", "fleshy", "plumage"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        Lexicon::build(terms)
    }

    #[test]
    fn ids_are_sort_ranks() {
        let lex = sample();
        assert_eq!(lex.num_keys(), 5);
        assert_eq!(lex.lookup("fleshy"), Some(0));
        assert_eq!(lex.lookup("plump"), Some(4));
        assert_eq!(lex.decode(0), Some("fleshy"));
        assert_eq!(lex.decode(4), Some("plump"));
        assert_eq!(lex.lookup("missing"), None);
        assert_eq!(lex.decode(5), None);
    }

    #[test]
    fn prefix_iteration_is_sorted_and_contiguous() {
        let lex = sample();
        let hits: Vec<&str> = lex.prefix_iter("pl").map(|(_, k)| k).collect();
        assert_eq!(hits, vec!["pleasant", "plumage", "plump"]);

        let all: Vec<&str> = lex.prefix_iter("").map(|(_, k)| k).collect();
        assert_eq!(all.len(), 5);

        assert_eq!(lex.prefix_iter("zz").count(), 0);
    }

    #[test]
    fn prefix_ids_match_lookup() {
        let lex = sample();
        for (id, key) in lex.prefix_iter("") {
            assert_eq!(lex.lookup(key), Some(id));
        }
    }

    #[test]
    fn blob_roundtrips() {
        let lex = sample();
        let mut blob = Vec::new();
        lex.save(&mut blob);
        assert_eq!(blob.len(), lex.encoded_len());

        let loaded = Lexicon::load(&mut blob.as_slice()).unwrap();
        assert_eq!(loaded.num_keys(), lex.num_keys());
        assert_eq!(loaded.lookup("plumage"), lex.lookup("plumage"));
    }

    #[test]
    fn load_rejects_unsorted_blob() {
        let mut blob = Vec::new();
        blob.extend_from_slice(&2u32.to_le_bytes());
        blob.extend_from_slice(&4u32.to_le_bytes());
        blob.extend_from_slice(b"b\0a\0");
        assert!(Lexicon::load(&mut blob.as_slice()).is_err());
    }

    #[test]
    fn load_rejects_truncated_blob() {
        let lex = sample();
        let mut blob = Vec::new();
        lex.save(&mut blob);
        blob.truncate(blob.len() - 2);
        assert!(Lexicon::load(&mut blob.as_slice()).is_err());
    }
}
