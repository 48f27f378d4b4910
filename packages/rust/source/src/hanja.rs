//! Hanja character helpers and the variant-form table.

use std::collections::HashMap;
use std::path::Path;

use hanjadeck_shared::{HanjaDeckError, Result};
use tracing::debug;

/// Code point ranges accepted as hanja.
const HANJA_RANGES: &[(u32, u32)] = &[
    (0x2E80, 0x2EFF),   // CJK radicals supplement
    (0x3400, 0x4DBF),   // extension A
    (0x4E00, 0x9FFF),   // unified ideographs
    (0xF900, 0xFAFF),   // compatibility ideographs
    (0x20000, 0x2A6DF), // extension B
    (0x2A700, 0x2B73F), // extension C
    (0x2B740, 0x2B81F), // extension D
    (0x2B820, 0x2CEAF), // extension E
    (0x2F800, 0x2FA1F), // compatibility supplement
];

/// Whether `ch` is a hanja character.
pub fn is_hanja(ch: char) -> bool {
    let code = u32::from(ch);
    HANJA_RANGES
        .iter()
        .any(|&(start, end)| (start..=end).contains(&code))
}

/// The hanja characters of `text`, in order, one string per character.
pub fn hanja_chars(text: &str) -> Vec<String> {
    text.chars()
        .filter(|&ch| is_hanja(ch))
        .map(String::from)
        .collect()
}

// ---------------------------------------------------------------------------
// VariantTable
// ---------------------------------------------------------------------------

/// Maps variant character forms to their canonical form.
///
/// The text format is one group per line, canonical form first:
///
/// ```text
/// # canonical:variant:variant
/// 學:学:斈
/// 國:国
/// ```
#[derive(Debug, Clone, Default)]
pub struct VariantTable {
    canonical: HashMap<String, String>,
}

impl VariantTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the table from text. Blank lines and `#` comments are skipped.
    pub fn parse(text: &str) -> Self {
        let mut canonical = HashMap::new();

        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut forms = line.split(':').map(str::trim);
            let Some(standard) = forms.next().filter(|s| !s.is_empty()) else {
                continue;
            };
            for variant in forms.filter(|v| !v.is_empty()) {
                canonical
                    .entry(variant.to_string())
                    .or_insert_with(|| standard.to_string());
            }
        }

        Self { canonical }
    }

    /// Load the table from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| HanjaDeckError::io(path, e))?;
        let table = Self::parse(&text);
        debug!(path = %path.display(), variants = table.len(), "loaded variant table");
        Ok(table)
    }

    /// The canonical form of `form`, or `form` itself if it has no mapping.
    pub fn standardize<'a>(&'a self, form: &'a str) -> &'a str {
        self.canonical.get(form).map(String::as_str).unwrap_or(form)
    }

    /// Standardize every character of `query`.
    pub fn normalize(&self, query: &str) -> String {
        let mut buf = [0u8; 4];
        query
            .chars()
            .map(|ch| self.standardize(ch.encode_utf8(&mut buf)).to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }
}
