//! Source Scanner Module
//!
//! Pull-style event stream over the source document. The writer consumes
//! `ScanEvent`s from a `Scan` implementation, so its two passes are
//! straight-line state machines instead of re-entrant callbacks, and tests
//! can drive the encoder with synthetic streams.
//!
//! `XmlScanner` is the production implementation, built on quick-xml's pull
//! reader.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{LexError, Result};

/// One event from the source document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// An element opened, with its attributes in document order
    Open {
        name: String,
        attrs: Vec<(String, String)>,
    },
    /// The most recently opened element closed
    Close,
    /// A run of character data (whitespace-trimmed, never empty)
    Text(String),
}

/// A pull-style source of scan events
pub trait Scan {
    /// Next event, or `None` at end of document
    fn next_event(&mut self) -> Result<Option<ScanEvent>>;
}

/// XML scanner over any buffered reader
pub struct XmlScanner<B: BufRead> {
    reader: Reader<B>,
    buf: Vec<u8>,
    /// A self-closing element yields Open, then Close on the next call
    pending_close: bool,
}

impl XmlScanner<BufReader<File>> {
    /// Open a source file for scanning
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| LexError::Source(format!("cannot open {}: {}", path.display(), e)))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<B: BufRead> XmlScanner<B> {
    /// Wrap a buffered reader
    pub fn new(input: B) -> Self {
        let mut reader = Reader::from_reader(input);
        reader.trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            pending_close: false,
        }
    }
}

/// Decode an element-open event's name and attributes
fn open_event(start: &quick_xml::events::BytesStart<'_>) -> Result<ScanEvent> {
    let name = utf8(start.name())?;

    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| LexError::Source(format!("bad attribute: {}", e)))?;
        let key = utf8(attr.key)?;
        let value = attr
            .unescaped_value()
            .map_err(|e| LexError::Source(format!("bad attribute value: {}", e)))?;
        attrs.push((key, utf8(&value)?));
    }

    Ok(ScanEvent::Open { name, attrs })
}

impl<B: BufRead> Scan for XmlScanner<B> {
    fn next_event(&mut self) -> Result<Option<ScanEvent>> {
        if self.pending_close {
            self.pending_close = false;
            return Ok(Some(ScanEvent::Close));
        }

        loop {
            self.buf.clear();
            let event = self
                .reader
                .read_event(&mut self.buf)
                .map_err(|e| LexError::Source(format!("XML parse error: {}", e)))?;

            match event {
                Event::Start(ref start) => return Ok(Some(open_event(start)?)),
                Event::Empty(ref start) => {
                    let open = open_event(start)?;
                    self.pending_close = true;
                    return Ok(Some(open));
                }
                Event::End(_) => return Ok(Some(ScanEvent::Close)),
                Event::Text(ref text) => {
                    let raw = text
                        .unescaped()
                        .map_err(|e| LexError::Source(format!("bad text: {}", e)))?;
                    let s = utf8(&raw)?;
                    let trimmed = s.trim();
                    if !trimmed.is_empty() {
                        return Ok(Some(ScanEvent::Text(trimmed.to_string())));
                    }
                }
                Event::CData(ref text) => {
                    let s = utf8(text)?;
                    let trimmed = s.trim();
                    if !trimmed.is_empty() {
                        return Ok(Some(ScanEvent::Text(trimmed.to_string())));
                    }
                }
                Event::Eof => return Ok(None),
                // declarations, comments, processing instructions
                _ => {}
            }
        }
    }
}

fn utf8(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(|s| s.to_string())
        .map_err(|e| LexError::Source(format!("source is not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(xml: &str) -> Vec<ScanEvent> {
        let mut scanner = XmlScanner::new(xml.as_bytes());
        let mut events = Vec::new();
        while let Some(ev) = scanner.next_event().unwrap() {
            events.push(ev);
        }
        events
    }

    #[test]
    fn elements_attributes_and_text() {
        let events = scan_all(r#"<a x="1"><b>hi</b></a>"#);
        assert_eq!(
            events,
            vec![
                ScanEvent::Open {
                    name: "a".to_string(),
                    attrs: vec![("x".to_string(), "1".to_string())],
                },
                ScanEvent::Open {
                    name: "b".to_string(),
                    attrs: vec![],
                },
                ScanEvent::Text("hi".to_string()),
                ScanEvent::Close,
                ScanEvent::Close,
            ]
        );
    }

    #[test]
    fn self_closing_yields_open_then_close() {
        let events = scan_all("<a><b/></a>");
        assert_eq!(
            events,
            vec![
                ScanEvent::Open {
                    name: "a".to_string(),
                    attrs: vec![],
                },
                ScanEvent::Open {
                    name: "b".to_string(),
                    attrs: vec![],
                },
                ScanEvent::Close,
                ScanEvent::Close,
            ]
        );
    }

    #[test]
    fn whitespace_only_text_is_dropped() {
        let events = scan_all("<a>\n   <b>x</b>\n</a>");
        assert!(events
            .iter()
            .all(|e| !matches!(e, ScanEvent::Text(t) if t.trim().is_empty())));
        assert!(events.contains(&ScanEvent::Text("x".to_string())));
    }

    #[test]
    fn entities_are_unescaped() {
        let events = scan_all("<a>fish &amp; chips</a>");
        assert!(events.contains(&ScanEvent::Text("fish & chips".to_string())));
    }
}
