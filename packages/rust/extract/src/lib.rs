//! Pattern-based extraction of records from raw delimited text.
//!
//! Input text is a sequence of chunks separated by a delimiter (a blank line
//! by default). Each chunk becomes exactly one [`Record`]: pattern *i* of the
//! [`PatternSet`] is matched against line *i* of the chunk and its named
//! captures become fields.
//!
//! ```text
//! 木:나무          <- ^(?P<hanja>[^:]+):(?P<meaning>[^:]+)$
//! 나무;수목        <- [^(?P<words>.+)$, ";"]
//! 12               <- ^(?P<reference_idx>.+)$
//! ```

mod pattern;

use hanjadeck_shared::{FieldValue, HanjaDeckError, PatternSpec, Record, Result};
use tracing::{debug, instrument};

pub use pattern::{Pattern, PatternSet};

/// Default chunk separator.
pub const DEFAULT_DELIMITER: &str = "\n\n";

/// Separator of the entry-key specification.
const KEY_SEPARATOR: char = '|';

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Compile `specs` and extract one record per chunk of `raw_text`.
///
/// A malformed pattern aborts before any chunk is read.
pub fn extract(raw_text: &str, specs: &[PatternSpec], delimiter: &str) -> Result<Vec<Record>> {
    let patterns = PatternSet::compile(specs)?;
    extract_with(raw_text, &patterns, delimiter)
}

/// Extract one record per chunk using an already compiled pattern set.
#[instrument(skip_all, fields(patterns = patterns.len(), bytes = raw_text.len()))]
pub fn extract_with(raw_text: &str, patterns: &PatternSet, delimiter: &str) -> Result<Vec<Record>> {
    if delimiter.is_empty() {
        return Err(HanjaDeckError::configuration("chunk delimiter is empty"));
    }

    let normalized = raw_text.replace("\r\n", "\n");
    let delimiter = delimiter.replace("\r\n", "\n");
    let records: Vec<Record> = normalized
        .split(delimiter.as_str())
        .map(|chunk| chunk.trim_matches('\n'))
        .filter(|chunk| !chunk.trim().is_empty())
        .enumerate()
        .map(|(index, chunk)| parse_chunk(index, chunk, patterns))
        .collect();

    debug!(records = records.len(), "extraction complete");
    Ok(records)
}

/// Parse a single chunk. Lines that do not match contribute nothing.
fn parse_chunk(index: usize, chunk: &str, patterns: &PatternSet) -> Record {
    let mut record = Record::new();
    let mut lines = chunk.split('\n');

    for (line_no, pattern) in patterns.iter().enumerate() {
        let Some(line) = lines.next() else {
            debug!(chunk = index, line = line_no, "chunk has fewer lines than patterns");
            break;
        };

        match pattern {
            Pattern::Single(rule) => {
                let Some(caps) = rule.captures(line) else {
                    debug!(chunk = index, line = line_no, "line did not match");
                    continue;
                };
                for name in rule.capture_names().flatten() {
                    if let Some(m) = caps.name(name) {
                        record.insert(name, m.as_str());
                    }
                }
            }
            Pattern::Split { rule, delimiter } => {
                let Some(name) = Pattern::split_field(rule) else {
                    continue;
                };
                let Some(m) = rule.captures(line).and_then(|caps| caps.name(name)) else {
                    debug!(chunk = index, line = line_no, "line did not match");
                    continue;
                };
                let items: Vec<String> = m.as_str().split(delimiter.as_str()).map(String::from).collect();
                record.insert(name, FieldValue::List(items));
            }
        }
    }

    record
}

// ---------------------------------------------------------------------------
// Record shaping helpers
// ---------------------------------------------------------------------------

/// Expand every record whose `field` is a list into one record per item.
///
/// Each copy keeps all other fields, stores the item as text under `into`
/// and drops `field`. Records without the field, or with an empty list, pass
/// through unchanged.
pub fn explode(records: Vec<Record>, field: &str, into: &str) -> Vec<Record> {
    let mut out = Vec::with_capacity(records.len());

    for record in records {
        let items = match record.get(field) {
            Some(FieldValue::List(items)) if !items.is_empty() => items.clone(),
            _ => {
                out.push(record);
                continue;
            }
        };

        for item in items {
            let mut copy = record.clone();
            copy.remove(field);
            copy.insert(into, item);
            out.push(copy);
        }
    }

    out
}

/// Parse an entry-key specification such as `"hanja|meaning|tags"`.
pub fn parse_key_order(spec: &str) -> Vec<String> {
    spec.split(KEY_SEPARATOR)
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_specs() -> Vec<PatternSpec> {
        vec![
            PatternSpec::Rule(r"^(?P<hanja>[^:]+):(?P<meaning>[^:]+)$".into()),
            PatternSpec::Pair(vec![r"^(?P<words>.+)$".into(), ";".into()]),
            PatternSpec::Rule(r"^(?P<reference_idx>.+)$".into()),
        ]
    }

    #[test]
    fn extracts_single_chunk() {
        let records = extract("木:나무\n나무;수목\n12", &default_specs(), DEFAULT_DELIMITER)
            .expect("extract");

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.get_text("hanja"), Some("木"));
        assert_eq!(record.get_text("meaning"), Some("나무"));
        assert_eq!(
            record.get("words"),
            Some(&FieldValue::from(vec!["나무", "수목"]))
        );
        assert_eq!(record.get_text("reference_idx"), Some("12"));

        let keys: Vec<&str> = record.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["hanja", "meaning", "words", "reference_idx"]);
    }

    #[test]
    fn one_record_per_chunk_in_order() {
        let text = "木:나무\n나무\n1\n\n水:물\n수면;수도\n2\n\n火:불\n화재\n3\n";
        let records = extract(text, &default_specs(), DEFAULT_DELIMITER).expect("extract");

        let hanja: Vec<&str> = records.iter().filter_map(|r| r.get_text("hanja")).collect();
        assert_eq!(hanja, vec!["木", "水", "火"]);
    }

    #[test]
    fn split_field_is_always_a_list() {
        let records = extract("木:나무\n나무\n1", &default_specs(), DEFAULT_DELIMITER).unwrap();
        assert_eq!(records[0].get("words"), Some(&FieldValue::from(vec!["나무"])));
    }

    #[test]
    fn unmatched_line_contributes_nothing() {
        let records = extract("no colon here\n나무;수목\n12", &default_specs(), DEFAULT_DELIMITER)
            .unwrap();
        assert!(!records[0].contains_key("hanja"));
        assert!(!records[0].contains_key("meaning"));
        assert!(records[0].contains_key("words"));
    }

    #[test]
    fn short_chunk_leaves_fields_missing() {
        let records = extract("木:나무", &default_specs(), DEFAULT_DELIMITER).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].len(), 2);
    }

    #[test]
    fn optional_group_is_not_inserted() {
        let specs = vec![PatternSpec::Rule(
            r"^(?P<hanja>[^:]+):(?P<meaning>[^:]+)(?::(?P<simplified_char>.+))?$".into(),
        )];
        let records = extract("学:배울 학:学\n\n木:나무", &specs, DEFAULT_DELIMITER).unwrap();
        assert_eq!(records[0].get_text("simplified_char"), Some("学"));
        assert!(!records[1].contains_key("simplified_char"));
    }

    #[test]
    fn crlf_and_extra_blank_lines_are_tolerated() {
        let text = "木:나무\r\n나무\r\n1\r\n\r\n\r\n水:물\r\n물\r\n2\r\n\r\n";
        let records = extract(text, &default_specs(), DEFAULT_DELIMITER).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get_text("hanja"), Some("水"));
    }

    #[test]
    fn custom_delimiter() {
        let records = extract("木:나무\n나무\n1\n---\n水:물\n물\n2", &default_specs(), "\n---\n")
            .unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn crlf_delimiter_matches_crlf_input() {
        let specs = vec![PatternSpec::Rule(r"^(?P<a>.+)$".into())];
        let records = extract("x\r\n\r\ny", &specs, "\r\n\r\n").unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get_text("a"), Some("x"));
        assert_eq!(records[1].get_text("a"), Some("y"));
    }

    #[test]
    fn malformed_pattern_aborts() {
        let mut specs = default_specs();
        specs.push(PatternSpec::Pair(vec!["^(?P<x>.+)$".into()]));
        let err = extract("木:나무\n나무\n1", &specs, DEFAULT_DELIMITER).unwrap_err();
        assert!(matches!(err, HanjaDeckError::Configuration { .. }));
        assert!(err.to_string().contains("pattern #3"));
    }

    #[test]
    fn explode_yields_one_record_per_item() {
        let records = extract("木:나무\n나무;수목\n12\n\n水:물\n\n", &default_specs(), DEFAULT_DELIMITER)
            .unwrap();
        let exploded = explode(records, "words", "word");

        assert_eq!(exploded.len(), 3);
        assert_eq!(exploded[0].get_text("word"), Some("나무"));
        assert_eq!(exploded[1].get_text("word"), Some("수목"));
        assert_eq!(exploded[1].get_text("reference_idx"), Some("12"));
        assert!(!exploded[0].contains_key("words"));
        // Record without the list passes through
        assert_eq!(exploded[2].get_text("hanja"), Some("水"));
    }

    #[test]
    fn key_order_parsing() {
        assert_eq!(
            parse_key_order("hanja | meaning||tags"),
            vec!["hanja", "meaning", "tags"]
        );
        assert!(parse_key_order("").is_empty());
    }
}
