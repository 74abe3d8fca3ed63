//! Keyword lookup
//!
//! `find` resolves a keyword (optionally a `%` prefix query) through the
//! lexicon's predictive iterator, then filters the id-mapping references by
//! path restriction, per-call entry dedup, and an optional content filter,
//! before applying the global offset/count window.

use std::collections::{BTreeMap, HashSet};

use crate::error::{LexError, Result};
use crate::reader::Reader;

impl Reader {
    /// Look up entries by indexed keyword.
    ///
    /// A trailing unescaped `%` makes the query a prefix match (write `\%`
    /// for a literal). `offset`/`count` window the surviving references
    /// globally across keys; `count` 0 means unbounded. `path_index`
    /// restricts matches to one registered path (0 = no restriction).
    /// `filter` additionally requires the entry to contain a text matching
    /// it under a registered path, `filter_path_index` pinning that path.
    ///
    /// Returns matched key strings to the entry ids accepted under them.
    pub fn find(
        &self,
        keyword: &str,
        offset: usize,
        count: usize,
        path_index: u8,
        filter: Option<&str>,
        filter_path_index: u8,
    ) -> Result<BTreeMap<String, Vec<u64>>> {
        let (clean, prefix) = parse_wildcard(keyword);

        let filter_query = match filter {
            Some(term) => {
                if !self.filters_supported {
                    return Err(LexError::NoFilterSupport);
                }
                Some(parse_wildcard(term))
            }
            None => None,
        };

        tracing::debug!(
            "find {:?} (prefix: {}, offset: {}, count: {}, path: {})",
            clean,
            prefix,
            offset,
            count,
            path_index
        );

        let mut results: BTreeMap<String, Vec<u64>> = BTreeMap::new();
        let mut seen: HashSet<u64> = HashSet::new();
        let mut skipped = 0usize;
        let mut taken = 0usize;

        'keys: for (lexicon_id, key) in self.lexicon.prefix_iter(clean) {
            if !prefix && key != clean {
                break;
            }

            for &reference in self.id_mapping.row(lexicon_id as usize)? {
                let row = (reference >> 8) as usize;
                let ref_path = (reference & 0xFF) as u8;

                if path_index != 0 && ref_path != path_index {
                    continue;
                }

                // an id consumed once in this call is never revisited, even
                // when the offset window swallowed it
                let entry_id = self.ids[row];
                if !seen.insert(entry_id) {
                    continue;
                }

                if let Some((filter_term, filter_prefix)) = filter_query {
                    if !self.matches_filter(row, filter_term, filter_prefix, filter_path_index)? {
                        continue;
                    }
                }

                if skipped < offset {
                    skipped += 1;
                    continue;
                }

                results.entry(key.to_string()).or_default().push(entry_id);
                taken += 1;
                if count != 0 && taken >= count {
                    break 'keys;
                }
            }
        }

        Ok(results)
    }

    /// Content filter: does entry `row` hold a registered text matching the
    /// filter term, under `filter_path_index` when nonzero?
    ///
    /// The path association is re-derived from the filter term's own
    /// id-mapping row rather than the entry's paths-mapping row.
    fn matches_filter(
        &self,
        row: usize,
        filter_term: &str,
        filter_prefix: bool,
        filter_path_index: u8,
    ) -> Result<bool> {
        for &lexicon_id in self.paths_mapping.row(row)? {
            let text = self.lexicon.decode(lexicon_id).ok_or_else(|| {
                LexError::Corrupted("paths mapping references an unknown term".to_string())
            })?;

            let hit = if filter_prefix {
                text.starts_with(filter_term)
            } else {
                text == filter_term
            };
            if !hit {
                continue;
            }

            if filter_path_index == 0 {
                return Ok(true);
            }
            for &reference in self.id_mapping.row(lexicon_id as usize)? {
                if (reference >> 8) as usize == row
                    && (reference & 0xFF) as u8 == filter_path_index
                {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

/// Split a keyword into its cleaned form and whether it is a prefix query.
///
/// Only an unescaped trailing `%` is stripped; a keyword ending in `\%` is
/// left untouched and matched exactly, backslash included.
fn parse_wildcard(keyword: &str) -> (&str, bool) {
    let bytes = keyword.as_bytes();
    if bytes.last() == Some(&b'%')
        && bytes.len().checked_sub(2).map(|i| bytes[i]) != Some(b'\\')
    {
        (&keyword[..keyword.len() - 1], true)
    } else {
        (keyword, false)
    }
}

#[cfg(test)]
mod tests {
    use super::parse_wildcard;

    #[test]
    fn trailing_percent_is_a_prefix_query() {
        assert_eq!(parse_wildcard("foo%"), ("foo", true));
        assert_eq!(parse_wildcard("foo"), ("foo", false));
    }

    #[test]
    fn escaped_percent_stays_exact_and_unstripped() {
        assert_eq!(parse_wildcard("foo\\%"), ("foo\\%", false));
    }

    #[test]
    fn bare_percent_means_match_everything() {
        assert_eq!(parse_wildcard("%"), ("", true));
    }
}
