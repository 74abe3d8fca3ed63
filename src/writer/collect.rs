//! Collection pass (pass 1)
//!
//! First full traversal of the source: gathers the distinct element/attribute
//! names and attribute values (the alphabet), the distinct text leaves (the
//! lexicon key set), and the entry id list. Everything downstream depends on
//! these being finalized and immutable before any record index is emitted.

use std::collections::BTreeSet;

use crate::error::{LexError, Result};
use crate::lexicon::Lexicon;
use crate::writer::PassSink;

/// Output of the collection pass
pub struct Collected {
    /// Sorted unique element/attribute names and attribute values
    pub alphabet: Vec<String>,
    /// Term dictionary over the distinct text leaves
    pub lexicon: Lexicon,
    /// Entry ids, sorted ascending
    pub ids: Vec<u64>,
}

/// Per-open-element state for structure validation
struct Frame {
    has_children: bool,
    text: String,
}

/// Sink that accumulates the alphabet, text set and id list
pub struct CollectPass {
    names: BTreeSet<String>,
    terms: BTreeSet<String>,
    ids: Vec<u64>,
    frames: Vec<Frame>,
    entry_count: u64,
}

impl CollectPass {
    pub fn new() -> Self {
        Self {
            names: BTreeSet::new(),
            terms: BTreeSet::new(),
            ids: Vec::new(),
            frames: Vec::new(),
            entry_count: 0,
        }
    }

    /// Finalize: sort ids, reject duplicates, freeze alphabet and lexicon
    pub fn finish(mut self) -> Result<Collected> {
        self.ids.sort_unstable();
        for pair in self.ids.windows(2) {
            if pair[0] == pair[1] {
                return Err(LexError::InvalidInput(format!(
                    "duplicate entry id {}",
                    pair[0]
                )));
            }
        }

        Ok(Collected {
            alphabet: self.names.into_iter().collect(),
            lexicon: Lexicon::build(self.terms),
            ids: self.ids,
        })
    }
}

impl PassSink for CollectPass {
    fn entry_open(&mut self, id: u64, extra_attrs: &[(String, String)]) -> Result<()> {
        for (name, _) in extra_attrs {
            tracing::warn!(
                "entry {}: dropping attribute {:?} on the entry element",
                id,
                name
            );
        }
        self.ids.push(id);
        Ok(())
    }

    fn element_open(&mut self, name: &str, attrs: &[(String, String)]) -> Result<()> {
        if let Some(parent) = self.frames.last_mut() {
            if !parent.text.is_empty() {
                return Err(LexError::Source(format!(
                    "element {:?} mixes text and child elements",
                    name
                )));
            }
            parent.has_children = true;
        }

        self.names.insert(name.to_string());
        for (attr_name, attr_value) in attrs {
            self.names.insert(attr_name.clone());
            self.names.insert(attr_value.clone());
        }

        self.frames.push(Frame {
            has_children: false,
            text: String::new(),
        });
        Ok(())
    }

    fn text(&mut self, s: &str) -> Result<()> {
        // run_pass only routes text inside elements here
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

    fn element_close(&mut self) -> Result<()> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| LexError::Source("unbalanced element close".to_string()))?;
        if !frame.text.is_empty() {
            self.terms.insert(frame.text);
        }
        Ok(())
    }

    fn entry_close(&mut self) -> Result<()> {
        self.entry_count += 1;
        if self.entry_count % 5000 == 0 {
            tracing::debug!("collected {} entries", self.entry_count);
        }
        Ok(())
    }

    fn document_end(&mut self) -> Result<()> {
        tracing::debug!(
            "collection pass done: {} entries, {} names, {} terms",
            self.entry_count,
            self.names.len(),
            self.terms.len()
        );
        Ok(())
    }
}
