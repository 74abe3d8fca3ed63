//! Tree encoder (pass 2)
//!
//! Second traversal of the source. For each entry it emits the
//! balanced-parenthesis bitstream and the interleaved record stream, tracks
//! `last_node_pop` (the records owed to the last element opened), classifies
//! text occurrences against the path registry, and accumulates the id and
//! paths mappings.
//!
//! The alphabet and lexicon are frozen before this pass starts; the encoder
//! only ever reads them.

use bytes::BytesMut;

use crate::error::{LexError, Result};
use crate::format::bits::pack_bits;
use crate::format::record;
use crate::lexicon::Lexicon;

/// Per-open-element state
struct Frame {
    has_children: bool,
    text: String,
}

/// Encoding context threaded through pass 2
pub struct TreeEncoder<'a> {
    alphabet: &'a [String],
    lexicon: &'a Lexicon,
    ids: &'a [u64],
    /// Registered paths, sorted; index+1 is the stored path index
    paths: &'a [String],

    /// Per-lexicon-id references: (entry row << 8) | path index
    pub id_mapping: Vec<Vec<u32>>,
    /// Per-entry-row lexicon ids reachable via a registered path
    pub paths_mapping: Vec<Vec<u32>>,

    // ---- state for the entry currently being encoded ----
    row: usize,
    bits: Vec<bool>,
    records: BytesMut,
    last_node_pop: u32,
    roots: u32,
    path: String,
    frames: Vec<Frame>,
}

impl<'a> TreeEncoder<'a> {
    pub fn new(
        alphabet: &'a [String],
        lexicon: &'a Lexicon,
        ids: &'a [u64],
        paths: &'a [String],
    ) -> Self {
        Self {
            alphabet,
            lexicon,
            ids,
            paths,
            id_mapping: vec![Vec::new(); lexicon.num_keys()],
            paths_mapping: vec![Vec::new(); ids.len()],
            row: 0,
            bits: Vec::new(),
            records: BytesMut::new(),
            last_node_pop: 0,
            roots: 0,
            path: String::new(),
            frames: Vec::new(),
        }
    }

    /// Start encoding the entry with the given caller-assigned id
    pub fn begin_entry(&mut self, id: u64) -> Result<()> {
        self.row = self
            .ids
            .binary_search(&id)
            .map_err(|_| LexError::Source(format!("source changed between passes: id {}", id)))?;
        self.bits.clear();
        self.records.clear();
        self.last_node_pop = 0;
        self.roots = 0;
        self.path.clear();
        self.frames.clear();
        Ok(())
    }

    pub fn open_element(&mut self, name: &str, attrs: &[(String, String)]) -> Result<()> {
        match self.frames.last_mut() {
            Some(parent) => {
                if !parent.text.is_empty() {
                    return Err(LexError::Source(format!(
                        "element {:?} mixes text and child elements",
                        name
                    )));
                }
                parent.has_children = true;
            }
            None => {
                self.roots += 1;
                if self.roots > 1 {
                    return Err(LexError::Source(
                        "entry holds more than one root element".to_string(),
                    ));
                }
            }
        }

        self.bits.push(true);
        self.path.push('/');
        self.path.push_str(name);

        self.last_node_pop = 0;
        let name_idx = self.alphabet_index(name)?;
        record::put_open(&mut self.records, name_idx);

        for (attr_name, attr_value) in attrs {
            let attr_name_idx = self.alphabet_index(attr_name)?;
            let attr_value_idx = self.alphabet_index(attr_value)?;
            record::put_attr(&mut self.records, attr_name_idx, attr_value_idx);
            self.last_node_pop += 1;
        }

        self.frames.push(Frame {
            has_children: false,
            text: String::new(),
        });
        Ok(())
    }

    pub fn text(&mut self, s: &str) -> Result<()> {
        let frame = self
            .frames
            .last_mut()
            .ok_or_else(|| LexError::Source("text outside any element".to_string()))?;
        if frame.has_children {
            return Err(LexError::Source(
                "element mixes child elements and trailing text".to_string(),
            ));
        }
        frame.text.push_str(s);
        Ok(())
    }

    pub fn close_element(&mut self) -> Result<()> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| LexError::Source("unbalanced element close".to_string()))?;

        if !frame.text.is_empty() {
            let lexicon_id = self.lexicon.lookup(&frame.text).ok_or_else(|| {
                LexError::Source(format!(
                    "source changed between passes: text {:?}",
                    frame.text
                ))
            })?;
            record::put_text(&mut self.records, lexicon_id);
            self.last_node_pop += 1;

            // classify against the registry while the closing element is
            // still on the path
            let path_index = self.path_index();
            if self.paths.is_empty() || path_index != 0 {
                self.id_mapping[lexicon_id as usize]
                    .push(((self.row as u32) << 8) | path_index as u32);
                self.paths_mapping[self.row].push(lexicon_id);
            }
        }

        self.bits.push(false);

        // drop the closing element from the path
        match self.path.rfind('/') {
            Some(cut) => self.path.truncate(cut),
            None => self.path.clear(),
        }
        Ok(())
    }

    /// Finish the entry: returns its row and self-delimiting blob
    pub fn finish_entry(&mut self) -> Result<(usize, Vec<u8>)> {
        if !self.frames.is_empty() {
            return Err(LexError::Source("entry ends with open elements".to_string()));
        }
        if self.roots != 1 {
            return Err(LexError::Source(
                "entry must hold exactly one root element".to_string(),
            ));
        }
        if self.last_node_pop > u8::MAX as u32 {
            return Err(LexError::Source(format!(
                "last element carries {} records, limit is {}",
                self.last_node_pop,
                u8::MAX
            )));
        }

        let packed = pack_bits(&self.bits);
        let mut blob = Vec::with_capacity(1 + packed.len() + self.records.len());
        blob.push(self.last_node_pop as u8);
        blob.extend_from_slice(&packed);
        blob.extend_from_slice(&self.records);

        Ok((self.row, blob))
    }

    fn alphabet_index(&self, name: &str) -> Result<u32> {
        self.alphabet
            .binary_search_by(|probe| probe.as_str().cmp(name))
            .map(|i| i as u32)
            .map_err(|_| {
                LexError::Source(format!("source changed between passes: name {:?}", name))
            })
    }

    /// 1 + rank of the current path in the registry, 0 when unregistered
    fn path_index(&self) -> u8 {
        match self
            .paths
            .binary_search_by(|probe| probe.as_str().cmp(&self.path))
        {
            Ok(rank) => (rank + 1) as u8,
            Err(_) => 0,
        }
    }
}
