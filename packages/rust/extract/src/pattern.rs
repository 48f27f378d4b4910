//! Line patterns: compiling [`PatternSpec`] lists into a [`PatternSet`].

use hanjadeck_shared::{HanjaDeckError, PatternSpec, Result};
use regex::Regex;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A compiled line pattern.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Every named capture becomes a text field.
    Single(Regex),
    /// The rule's only named capture is split into a list field.
    Split { rule: Regex, delimiter: String },
}

impl Pattern {
    /// Name of the captured field for a `Split` pattern.
    pub(crate) fn split_field(rule: &Regex) -> Option<&str> {
        rule.capture_names().flatten().next()
    }
}

/// An ordered list of patterns; pattern *i* applies to line *i* of a chunk.
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    /// Compile a pattern specification list.
    ///
    /// Fails on the first malformed entry with a configuration error that
    /// names its index.
    pub fn compile(specs: &[PatternSpec]) -> Result<Self> {
        let patterns = specs
            .iter()
            .enumerate()
            .map(|(index, spec)| compile_one(index, spec))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

fn compile_one(index: usize, spec: &PatternSpec) -> Result<Pattern> {
    match spec {
        PatternSpec::Rule(rule) => Ok(Pattern::Single(compile_regex(index, rule)?)),
        PatternSpec::Pair(pair) => {
            let [rule, delimiter] = pair.as_slice() else {
                return Err(HanjaDeckError::configuration(format!(
                    "pattern #{index}: a pair needs exactly [rule, delimiter], got {} elements",
                    pair.len()
                )));
            };
            let rule = compile_regex(index, rule)?;

            let groups = rule.capture_names().flatten().count();
            if groups != 1 {
                return Err(HanjaDeckError::configuration(format!(
                    "pattern #{index}: a split rule needs exactly one named group, found {groups}"
                )));
            }
            if delimiter.is_empty() {
                return Err(HanjaDeckError::configuration(format!(
                    "pattern #{index}: split delimiter is empty"
                )));
            }

            Ok(Pattern::Split {
                rule,
                delimiter: delimiter.clone(),
            })
        }
        PatternSpec::Invalid(value) => Err(HanjaDeckError::configuration(format!(
            "pattern #{index}: expected a rule or a [rule, delimiter] pair, got {value}"
        ))),
    }
}

fn compile_regex(index: usize, rule: &str) -> Result<Regex> {
    Regex::new(rule).map_err(|e| {
        HanjaDeckError::configuration(format!("pattern #{index}: invalid rule: {e}"))
    })
}
