//! Footer 2-D array codec
//!
//! The id and paths mappings are jagged arrays of u32 stored flat:
//! ```text
//! [RowCount: u32][TotalElems: u32][RowCount × u32 row starts][flat elems]
//! ```
//! Row `i` spans `starts[i] .. starts[i + 1]` (or the end for the last row).

use bytes::{Buf, BufMut, Bytes};

use crate::error::{LexError, Result};
use crate::format::need;

/// An immutable jagged 2-D array of u32
#[derive(Debug, Default)]
pub struct Array2d {
    starts: Vec<u32>,
    elems: Vec<u32>,
}

impl Array2d {
    /// Build from per-row vectors (writer side)
    pub fn from_rows(rows: &[Vec<u32>]) -> Self {
        let mut starts = Vec::with_capacity(rows.len());
        let mut elems = Vec::new();
        for row in rows {
            starts.push(elems.len() as u32);
            elems.extend_from_slice(row);
        }
        Self { starts, elems }
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.starts.len()
    }

    /// All elements, flat (row boundaries ignored)
    pub fn elements(&self) -> &[u32] {
        &self.elems
    }

    /// Elements of row `i`; an out-of-range row is a corruption error
    pub fn row(&self, i: usize) -> Result<&[u32]> {
        if i >= self.starts.len() {
            return Err(LexError::Corrupted(format!(
                "mapping row {} out of range ({} rows)",
                i,
                self.starts.len()
            )));
        }
        let start = self.starts[i] as usize;
        let end = match self.starts.get(i + 1) {
            Some(&next) => next as usize,
            None => self.elems.len(),
        };
        Ok(&self.elems[start..end])
    }

    /// Serialized byte length
    pub fn encoded_len(&self) -> usize {
        8 + 4 * self.starts.len() + 4 * self.elems.len()
    }

    /// Write the array in footer layout
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.starts.len() as u32);
        buf.put_u32_le(self.elems.len() as u32);
        for &s in &self.starts {
            buf.put_u32_le(s);
        }
        for &e in &self.elems {
            buf.put_u32_le(e);
        }
    }

    /// Parse and validate an array from footer bytes
    pub fn decode(buf: &mut Bytes, what: &str) -> Result<Self> {
        need(buf, 8, what)?;
        let rows = buf.get_u32_le() as usize;
        let total = buf.get_u32_le() as usize;

        need(buf, 4 * rows, what)?;
        let mut starts = Vec::with_capacity(rows);
        for _ in 0..rows {
            starts.push(buf.get_u32_le());
        }

        // row starts must be monotonic and inside the element array
        let mut prev = 0u32;
        for &s in &starts {
            if s < prev || s as usize > total {
                return Err(LexError::Corrupted(format!("{} row table inconsistent", what)));
            }
            prev = s;
        }
        if let Some(&first) = starts.first() {
            if first != 0 {
                return Err(LexError::Corrupted(format!("{} row table inconsistent", what)));
            }
        }

        need(buf, 4 * total, what)?;
        let mut elems = Vec::with_capacity(total);
        for _ in 0..total {
            elems.push(buf.get_u32_le());
        }

        Ok(Self { starts, elems })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn roundtrip(rows: &[Vec<u32>]) -> Array2d {
        let arr = Array2d::from_rows(rows);
        let mut buf = BytesMut::new();
        arr.encode(&mut buf);
        assert_eq!(buf.len(), arr.encoded_len());
        Array2d::decode(&mut buf.freeze(), "test").unwrap()
    }

    #[test]
    fn jagged_rows_roundtrip() {
        let rows = vec![vec![1, 2, 3], vec![], vec![7]];
        let arr = roundtrip(&rows);
        assert_eq!(arr.rows(), 3);
        assert_eq!(arr.row(0).unwrap(), &[1, 2, 3]);
        assert_eq!(arr.row(1).unwrap(), &[] as &[u32]);
        assert_eq!(arr.row(2).unwrap(), &[7]);
        assert!(arr.row(3).is_err());
    }

    #[test]
    fn empty_array_roundtrips() {
        let arr = roundtrip(&[]);
        assert_eq!(arr.rows(), 0);
        assert!(arr.elements().is_empty());
    }

    #[test]
    fn decode_rejects_bad_row_table() {
        // rows = 2, total = 1, starts = [1, 0] is not monotonic
        let mut buf = BytesMut::new();
        buf.put_u32_le(2);
        buf.put_u32_le(1);
        buf.put_u32_le(1);
        buf.put_u32_le(0);
        buf.put_u32_le(9);
        assert!(Array2d::decode(&mut buf.freeze(), "test").is_err());
    }

    #[test]
    fn decode_rejects_truncation() {
        let arr = Array2d::from_rows(&[vec![1, 2]]);
        let mut buf = BytesMut::new();
        arr.encode(&mut buf);
        let mut short = buf.freeze();
        short.truncate(short.len() - 1);
        assert!(Array2d::decode(&mut short, "test").is_err());
    }
}
