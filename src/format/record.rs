//! Record stream codec
//!
//! The record stream interleaves with the bp bitstream to describe one entry.
//! Every record is a 4-byte little-endian word: the low 2 bits hold the tag,
//! the high 30 bits the payload. An attribute-name word is immediately
//! followed by one untagged word holding the raw attribute-value index.

use bytes::BufMut;

use crate::error::{LexError, Result};

/// Tag bits: element open (payload = tag-name alphabet index)
pub const TAG_OPEN: u8 = 0;

/// Tag bits: text leaf (payload = lexicon id)
pub const TAG_TEXT: u8 = 1;

/// Tag bits: attribute name (payload = name index; value word follows)
pub const TAG_ATTR: u8 = 2;

/// One decoded record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    /// Element open with its tag-name alphabet index
    Open(u32),
    /// Text leaf with its lexicon id
    Text(u32),
    /// Attribute pair: name and value alphabet indices
    Attr { name: u32, value: u32 },
}

/// Append an element-open record
pub fn put_open(buf: &mut impl BufMut, name_idx: u32) {
    buf.put_u32_le((name_idx << 2) | TAG_OPEN as u32);
}

/// Append a text record
pub fn put_text(buf: &mut impl BufMut, lexicon_id: u32) {
    buf.put_u32_le((lexicon_id << 2) | TAG_TEXT as u32);
}

/// Append an attribute pair (tagged name word, raw value word)
pub fn put_attr(buf: &mut impl BufMut, name_idx: u32, value_idx: u32) {
    buf.put_u32_le((name_idx << 2) | TAG_ATTR as u32);
    buf.put_u32_le(value_idx);
}

/// Sequential reader over an entry's record stream.
///
/// `peek_tag` looks at the next word without consuming it, which is how the
/// decoder holds an Open record over for the bit position that owns it.
pub struct RecordCursor<'a> {
    data: &'a [u8],
    at: usize,
}

impl<'a> RecordCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, at: 0 }
    }

    fn word(&self, at: usize) -> Result<u32> {
        let end = at
            .checked_add(4)
            .filter(|&e| e <= self.data.len())
            .ok_or_else(|| LexError::Corrupted("truncated record stream".to_string()))?;
        let bytes: [u8; 4] = self.data[at..end].try_into().unwrap();
        Ok(u32::from_le_bytes(bytes))
    }

    /// Tag of the next record without consuming it
    pub fn peek_tag(&self) -> Result<u8> {
        Ok((self.word(self.at)? & 3) as u8)
    }

    /// Consume and decode the next record
    pub fn next(&mut self) -> Result<Record> {
        let word = self.word(self.at)?;
        self.at += 4;

        let payload = word >> 2;
        match (word & 3) as u8 {
            TAG_OPEN => Ok(Record::Open(payload)),
            TAG_TEXT => Ok(Record::Text(payload)),
            TAG_ATTR => {
                let value = self.word(self.at)?;
                self.at += 4;
                Ok(Record::Attr {
                    name: payload,
                    value,
                })
            }
            tag => Err(LexError::Corrupted(format!("unknown record tag {}", tag))),
        }
    }
}
