//! Entry reconstruction
//!
//! `get` locates an entry's blob inside its compressed cluster and replays
//! the balanced-parenthesis bits against the record stream to rebuild the
//! original tagged text. The blob carries no length field: the bitstream is
//! self-delimiting and `last_node_pop` bounds the records owed to the last
//! element opened, which is what stops the decoder exactly at the entry
//! boundary inside a shared cluster.

use crate::error::{LexError, Result};
use crate::format::bits::parse_bits;
use crate::format::cluster::read_cluster;
use crate::format::record::{Record, RecordCursor, TAG_OPEN};
use crate::reader::Reader;

impl Reader {
    /// Reconstruct one entry's tagged text; `Ok(None)` when the id is absent
    pub fn get(&self, id: u64) -> Result<Option<String>> {
        let row = match self.ids.binary_search(&id) {
            Ok(row) => row,
            Err(_) => return Ok(None),
        };

        let cluster_offset = self.cluster_offsets[self.cluster_of_row[row] as usize];
        let data = {
            let mut file = self.file.lock();
            read_cluster(&mut file, cluster_offset as u64)?
        };

        let position = self.pos[row] as usize;
        if position >= data.len() {
            return Err(LexError::Corrupted(format!(
                "entry {} at position {} in a {}-byte cluster",
                id,
                position,
                data.len()
            )));
        }

        tracing::debug!(
            "get {}: row {}, cluster offset {}, position {}",
            id,
            row,
            cluster_offset,
            position
        );

        self.decode_entry(&data[position..]).map(Some)
    }

    /// Decode one entry blob from the start of `blob`
    fn decode_entry(&self, blob: &[u8]) -> Result<String> {
        let last_node_pop = blob[0] as u32;
        let parsed = parse_bits(&blob[1..])?;
        let mut records = RecordCursor::new(&blob[1 + parsed.byte_len..]);

        let mut output = String::new();
        let mut tag_stack: Vec<&str> = Vec::new();
        // whether the current element's attribute list still awaits its `>`
        let mut tag_open = false;

        for (i, &bit) in parsed.bits.iter().enumerate() {
            if !bit {
                if tag_open {
                    output.push('>');
                    tag_open = false;
                }
                let name = tag_stack.pop().ok_or_else(|| {
                    LexError::Corrupted("close bit without an open element".to_string())
                })?;
                output.push_str("</");
                output.push_str(name);
                output.push('>');
                continue;
            }

            // a 1 bit always owns the next Open record
            let name = match records.next()? {
                Record::Open(idx) => self.alphabet_str(idx)?,
                _ => {
                    return Err(LexError::Corrupted(
                        "open bit without an open record".to_string(),
                    ))
                }
            };
            if tag_open {
                output.push('>');
            }
            output.push('<');
            output.push_str(name);
            tag_stack.push(name);
            tag_open = true;

            // records belonging to this element; only the last element opened
            // is bounded by last_node_pop -- interior elements always run to
            // the next Open
            let at_last_open = i == parsed.last_open;
            let mut consumed = 0u32;
            loop {
                if at_last_open && consumed >= last_node_pop {
                    break;
                }
                if records.peek_tag()? == TAG_OPEN {
                    break;
                }
                match records.next()? {
                    Record::Attr {
                        name: name_idx,
                        value: value_idx,
                    } => {
                        let attr_name = self.alphabet_str(name_idx)?;
                        let attr_value = self.alphabet_str(value_idx)?;
                        output.push(' ');
                        output.push_str(attr_name);
                        output.push_str("=\"");
                        output.push_str(attr_value);
                        output.push('"');
                    }
                    Record::Text(lexicon_id) => {
                        if tag_open {
                            output.push('>');
                            tag_open = false;
                        }
                        let text = self.lexicon.decode(lexicon_id).ok_or_else(|| {
                            LexError::Corrupted(format!(
                                "text record references unknown term {}",
                                lexicon_id
                            ))
                        })?;
                        output.push_str(text);
                    }
                    Record::Open(_) => {
                        return Err(LexError::Corrupted(
                            "record stream inconsistent with bitstream".to_string(),
                        ))
                    }
                }
                consumed += 1;
            }
        }

        if !tag_stack.is_empty() {
            return Err(LexError::Corrupted(
                "bitstream ends with open elements".to_string(),
            ));
        }

        Ok(output)
    }

    fn alphabet_str(&self, index: u32) -> Result<&str> {
        self.alphabet
            .get(index as usize)
            .map(|s| s.as_str())
            .ok_or_else(|| {
                LexError::Corrupted(format!("alphabet index {} out of range", index))
            })
    }
}
