//! Positional merge of input records with source records.

use hanjadeck_shared::{FieldValue, HanjaDeckError, Record, Result};
use tracing::{debug, instrument};

/// Merge `source[i]` into `input[i]` for every position.
///
/// For each field of the source record:
/// - input holds a non-empty list → the input keeps its first item as text,
///   the source value is dropped;
/// - input holds any other value → the source value overwrites it in place;
/// - input lacks the field → it is appended.
///
/// Input fields the source does not mention are kept as they are.
#[instrument(skip_all, fields(records = input.len()))]
pub fn fuse(input: Vec<Record>, source: Vec<Record>) -> Result<Vec<Record>> {
    if input.len() != source.len() {
        return Err(HanjaDeckError::consistency(format!(
            "cannot fuse {} input records with {} source records",
            input.len(),
            source.len()
        )));
    }

    let fused: Vec<Record> = input
        .into_iter()
        .zip(source)
        .map(|(record, counterpart)| fuse_record(record, counterpart))
        .collect();

    debug!(records = fused.len(), "fusion complete");
    Ok(fused)
}

fn fuse_record(mut record: Record, counterpart: Record) -> Record {
    for (key, value) in counterpart {
        match record.get_mut(&key) {
            Some(FieldValue::List(items)) => {
                if let Some(first) = items.first().cloned() {
                    record.insert(key, first);
                }
            }
            Some(existing) => *existing = value,
            None => {
                record.insert(key, value);
            }
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, FieldValue)]) -> Record {
        pairs.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    #[test]
    fn input_list_collapses_to_first_item() {
        let input = record(&[("words", FieldValue::from(vec!["나무", "수목"]))]);
        let source = record(&[("words", FieldValue::from("木材"))]);

        let fused = fuse(vec![input], vec![source]).unwrap();
        assert_eq!(fused[0].get_text("words"), Some("나무"));
    }

    #[test]
    fn source_overwrites_scalars_in_place_and_appends_new_fields() {
        let input = record(&[
            ("hanja", FieldValue::from("木")),
            ("meaning", FieldValue::from("나무")),
            ("reference_idx", FieldValue::from("12")),
        ]);
        let source = record(&[
            ("meaning", FieldValue::from("나무 목")),
            ("stroke_count", FieldValue::Number(4)),
        ]);

        let fused = fuse(vec![input], vec![source]).unwrap();
        let keys: Vec<&str> = fused[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["hanja", "meaning", "reference_idx", "stroke_count"]);
        assert_eq!(fused[0].get_text("meaning"), Some("나무 목"));
        assert_eq!(fused[0].get_text("reference_idx"), Some("12"));
        assert_eq!(fused[0].get("stroke_count"), Some(&FieldValue::Number(4)));
    }

    #[test]
    fn empty_input_list_is_left_alone() {
        let input = record(&[("words", FieldValue::List(vec![]))]);
        let source = record(&[("words", FieldValue::from("x"))]);

        let fused = fuse(vec![input], vec![source]).unwrap();
        assert_eq!(fused[0].get("words"), Some(&FieldValue::List(vec![])));
    }

    #[test]
    fn records_pair_by_position() {
        let input = vec![
            record(&[("hanja", FieldValue::from("木"))]),
            record(&[("hanja", FieldValue::from("水"))]),
        ];
        let source = vec![
            record(&[("reading", FieldValue::from("목"))]),
            record(&[("reading", FieldValue::from("수"))]),
        ];

        let fused = fuse(input, source).unwrap();
        assert_eq!(fused[1].get_text("hanja"), Some("水"));
        assert_eq!(fused[1].get_text("reading"), Some("수"));
    }

    #[test]
    fn length_mismatch_is_consistency_error() {
        let err = fuse(vec![Record::new()], vec![]).unwrap_err();
        assert!(matches!(err, HanjaDeckError::Consistency { .. }));
    }
}
