//! Fault-isolating modifier pipeline.
//!
//! A [`Modifier`] either rewrites one field across all records
//! ([`Modifier::Scoped`]) or replaces the whole collection
//! ([`Modifier::Whole`]). Modifiers run in order. A failing invocation is
//! logged and skipped: a scoped failure leaves that one record's field as it
//! was, a whole-collection failure leaves the collection as it was before the
//! step. Errors never leave [`apply`].

use std::fmt;

use hanjadeck_shared::{FieldValue, HanjaDeckError, ModifierSpec, Record, Result};
use tracing::{debug, instrument, warn};

/// Field-level transform.
pub type FieldFn = Box<dyn Fn(&FieldValue) -> Result<FieldValue> + Send + Sync>;

/// Collection-level transform.
pub type CollectionFn = Box<dyn Fn(&[Record]) -> Result<Vec<Record>> + Send + Sync>;

pub enum Modifier {
    Scoped { field: String, transform: FieldFn },
    Whole { name: String, transform: CollectionFn },
}

impl Modifier {
    pub fn scoped<F>(field: impl Into<String>, transform: F) -> Self
    where
        F: Fn(&FieldValue) -> Result<FieldValue> + Send + Sync + 'static,
    {
        Modifier::Scoped {
            field: field.into(),
            transform: Box::new(transform),
        }
    }

    pub fn whole<F>(name: impl Into<String>, transform: F) -> Self
    where
        F: Fn(&[Record]) -> Result<Vec<Record>> + Send + Sync + 'static,
    {
        Modifier::Whole {
            name: name.into(),
            transform: Box::new(transform),
        }
    }

    /// Build a built-in modifier from its configuration entry.
    pub fn from_spec(spec: &ModifierSpec) -> Self {
        match spec.clone() {
            ModifierSpec::Join { field, separator } => {
                Modifier::scoped(field, move |value| join(value, &separator))
            }
            ModifierSpec::Split { field, separator } => {
                Modifier::scoped(field, move |value| split(value, &separator))
            }
            ModifierSpec::First { field } => Modifier::scoped(field, first),
            ModifierSpec::Trim { field } => Modifier::scoped(field, trim),
            ModifierSpec::StripParenthetical { field } => {
                Modifier::scoped(field, strip_parenthetical)
            }
            ModifierSpec::Rank { field, start } => {
                let name = format!("rank:{field}");
                Modifier::whole(name, move |records| Ok(rank(records, &field, start)))
            }
            ModifierSpec::Fill { field, value } => {
                let name = format!("fill:{field}");
                Modifier::whole(name, move |records| Ok(fill(records, &field, &value)))
            }
        }
    }

    fn label(&self) -> &str {
        match self {
            Modifier::Scoped { field, .. } => field,
            Modifier::Whole { name, .. } => name,
        }
    }
}

impl fmt::Debug for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modifier::Scoped { field, .. } => f.debug_struct("Scoped").field("field", field).finish(),
            Modifier::Whole { name, .. } => f.debug_struct("Whole").field("name", name).finish(),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run `modifiers` over `records` in order. No modifiers is the identity.
#[instrument(skip_all, fields(records = records.len(), modifiers = modifiers.len()))]
pub fn apply(mut records: Vec<Record>, modifiers: &[Modifier]) -> Vec<Record> {
    for (step, modifier) in modifiers.iter().enumerate() {
        match modifier {
            Modifier::Scoped { field, transform } => {
                let mut failures = 0usize;
                for (index, record) in records.iter_mut().enumerate() {
                    let Some(value) = record.get(field) else {
                        continue;
                    };
                    match transform(value) {
                        Ok(next) => {
                            record.insert(field.as_str(), next);
                        }
                        Err(e) => {
                            failures += 1;
                            warn!(
                                step,
                                field = %field,
                                record = index,
                                error = %e,
                                entry = ?record,
                                "modifier failed on record, keeping previous value"
                            );
                        }
                    }
                }
                debug!(step, modifier = modifier.label(), failures, "scoped modifier applied");
            }
            Modifier::Whole { name, transform } => match transform(&records) {
                Ok(next) => {
                    debug!(step, modifier = %name, records = next.len(), "collection modifier applied");
                    records = next;
                }
                Err(e) => {
                    warn!(step, modifier = %name, error = %e, "collection modifier failed, step skipped");
                }
            },
        }
    }

    records
}

// ---------------------------------------------------------------------------
// Built-ins
// ---------------------------------------------------------------------------

fn join(value: &FieldValue, separator: &str) -> Result<FieldValue> {
    match value {
        FieldValue::List(items) => Ok(FieldValue::Text(items.join(separator))),
        FieldValue::Text(_) | FieldValue::Number(_) => Ok(value.clone()),
        FieldValue::Map(_) => Err(HanjaDeckError::modifier("join: cannot join a mapping")),
    }
}

fn split(value: &FieldValue, separator: &str) -> Result<FieldValue> {
    if separator.is_empty() {
        return Err(HanjaDeckError::modifier("split: separator is empty"));
    }
    match value {
        FieldValue::Text(text) => Ok(FieldValue::List(
            text.split(separator).map(String::from).collect(),
        )),
        FieldValue::List(_) => Ok(value.clone()),
        other => Err(HanjaDeckError::modifier(format!("split: not text: {other}"))),
    }
}

fn first(value: &FieldValue) -> Result<FieldValue> {
    match value {
        FieldValue::List(items) => items
            .first()
            .map(|item| FieldValue::Text(item.clone()))
            .ok_or_else(|| HanjaDeckError::modifier("first: list is empty")),
        _ => Ok(value.clone()),
    }
}

fn trim(value: &FieldValue) -> Result<FieldValue> {
    map_text(value, "trim", |s| s.trim().to_string())
}

fn strip_parenthetical(value: &FieldValue) -> Result<FieldValue> {
    map_text(value, "strip_parenthetical", |s| {
        s.split('(').next().unwrap_or_default().trim().to_string()
    })
}

/// Apply `f` to a text value or to every item of a list.
fn map_text(value: &FieldValue, op: &str, f: impl Fn(&str) -> String) -> Result<FieldValue> {
    match value {
        FieldValue::Text(text) => Ok(FieldValue::Text(f(text.as_str()))),
        FieldValue::List(items) => Ok(FieldValue::List(items.iter().map(|s| f(s.as_str())).collect())),
        other => Err(HanjaDeckError::modifier(format!("{op}: not text: {other}"))),
    }
}

fn rank(records: &[Record], field: &str, start: i64) -> Vec<Record> {
    records
        .iter()
        .zip(start..)
        .map(|(record, position)| {
            let mut record = record.clone();
            record.insert(field, position);
            record
        })
        .collect()
}

fn fill(records: &[Record], field: &str, value: &str) -> Vec<Record> {
    records
        .iter()
        .map(|record| {
            let mut record = record.clone();
            if !record.contains_key(field) {
                record.insert(field, value);
            }
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<Record> {
        vec![
            [("hanja", FieldValue::from("木")), ("words", FieldValue::from(vec!["나무", "수목"]))]
                .into_iter()
                .collect(),
            [("hanja", FieldValue::from("水")), ("words", FieldValue::from(vec!["물"]))]
                .into_iter()
                .collect(),
            [("hanja", FieldValue::from("火"))].into_iter().collect(),
        ]
    }

    #[test]
    fn no_modifiers_is_identity() {
        assert_eq!(apply(records(), &[]), records());
    }

    #[test]
    fn scoped_modifier_skips_records_without_the_field() {
        let out = apply(records(), &[Modifier::from_spec(&ModifierSpec::Join {
            field: "words".into(),
            separator: "·".into(),
        })]);

        assert_eq!(out[0].get_text("words"), Some("나무·수목"));
        assert_eq!(out[1].get_text("words"), Some("물"));
        assert!(!out[2].contains_key("words"));
    }

    #[test]
    fn failure_on_one_record_does_not_stop_others_or_later_steps() {
        let explode_on_water = Modifier::scoped("hanja", |value| {
            if value.as_text() == Some("水") {
                Err(HanjaDeckError::modifier("boom"))
            } else {
                Ok(FieldValue::Text(format!("[{value}]")))
            }
        });
        let fill = Modifier::from_spec(&ModifierSpec::Fill {
            field: "deck".into(),
            value: "basic".into(),
        });

        let out = apply(records(), &[explode_on_water, fill]);

        assert_eq!(out[0].get_text("hanja"), Some("[木]"));
        assert_eq!(out[1].get_text("hanja"), Some("水"));
        assert_eq!(out[2].get_text("hanja"), Some("[火]"));
        assert!(out.iter().all(|r| r.get_text("deck") == Some("basic")));
    }

    #[test]
    fn failing_whole_modifier_keeps_previous_collection() {
        let drop_all = Modifier::whole("fail", |_| Err(HanjaDeckError::modifier("nope")));
        let rank = Modifier::from_spec(&ModifierSpec::Rank {
            field: "position".into(),
            start: 1,
        });

        let out = apply(records(), &[drop_all, rank]);
        assert_eq!(out.len(), 3);
        assert_eq!(out[2].get("position"), Some(&FieldValue::Number(3)));
    }

    #[test]
    fn whole_modifier_replaces_collection() {
        let keep_first = Modifier::whole("head", |records| Ok(records[..1].to_vec()));
        assert_eq!(apply(records(), &[keep_first]).len(), 1);
    }

    #[test]
    fn built_in_first_and_strip() {
        let out = apply(
            vec![[("words", FieldValue::from(vec!["漢字(한자) ", "x"]))].into_iter().collect()],
            &[
                Modifier::from_spec(&ModifierSpec::First { field: "words".into() }),
                Modifier::from_spec(&ModifierSpec::StripParenthetical { field: "words".into() }),
            ],
        );
        assert_eq!(out[0].get_text("words"), Some("漢字"));
    }

    #[test]
    fn built_in_split_and_trim() {
        let out = apply(
            vec![[("words", " 나무 ; 수목 ")].into_iter().collect()],
            &[
                Modifier::from_spec(&ModifierSpec::Split {
                    field: "words".into(),
                    separator: ";".into(),
                }),
                Modifier::from_spec(&ModifierSpec::Trim { field: "words".into() }),
            ],
        );
        assert_eq!(out[0].get("words"), Some(&FieldValue::from(vec!["나무", "수목"])));
    }

    #[test]
    fn first_of_empty_list_fails_in_isolation() {
        let out = apply(
            vec![[("words", FieldValue::List(vec![]))].into_iter().collect()],
            &[Modifier::from_spec(&ModifierSpec::First { field: "words".into() })],
        );
        assert_eq!(out[0].get("words"), Some(&FieldValue::List(vec![])));
    }
}
