//! Offline content source backed by a JSON catalog.
//!
//! ```json
//! {
//!   "candidates": { "木": [{ "label": "木", "id": "1001" }] },
//!   "entries":    { "1001": { "meanings": ["나무"], "sub_entry_ids": ["1002"] } }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use hanjadeck_shared::{HanjaDeckError, Result, SourceError};
use serde::Deserialize;
use tracing::debug;

use super::{Candidate, ContentSource, EntryDetail, SourceResult};

/// In-memory catalog of candidates and entry details.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogSource {
    #[serde(default)]
    candidates: HashMap<String, Vec<Candidate>>,
    #[serde(default)]
    entries: HashMap<String, EntryDetail>,
}

impl CatalogSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a catalog from its JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| HanjaDeckError::parse(format!("invalid catalog: {e}")))
    }

    /// Load a catalog file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| HanjaDeckError::io(path, e))?;
        let catalog = Self::from_json(&text)?;
        debug!(
            path = %path.display(),
            queries = catalog.candidates.len(),
            entries = catalog.entries.len(),
            "loaded catalog"
        );
        Ok(catalog)
    }

    /// Append a search hit for `query`.
    pub fn with_candidate(
        mut self,
        query: impl Into<String>,
        label: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        self.candidates
            .entry(query.into())
            .or_default()
            .push(Candidate::new(label, id));
        self
    }

    /// Register the detail of entry `id`.
    pub fn with_entry(mut self, id: impl Into<String>, detail: EntryDetail) -> Self {
        self.entries.insert(id.into(), detail);
        self
    }
}

#[async_trait]
impl ContentSource for CatalogSource {
    async fn query(&self, text: &str) -> SourceResult<Vec<Candidate>> {
        Ok(self.candidates.get(text).cloned().unwrap_or_default())
    }

    async fn detail(&self, id: &str) -> SourceResult<EntryDetail> {
        self.entries.get(id).cloned().ok_or(SourceError::NotFound)
    }

    fn name(&self) -> &str {
        "catalog"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parses_json_catalog() {
        let catalog = CatalogSource::from_json(
            r#"{
                "candidates": {"木": [{"label": "木", "id": "1001"}]},
                "entries": {"1001": {"meanings": ["나무"], "fields": {"reading": "목"}}}
            }"#,
        )
        .expect("valid catalog");

        let hits = catalog.query("木").await.unwrap();
        assert_eq!(hits, vec![Candidate::new("木", "1001")]);

        let detail = catalog.detail("1001").await.unwrap();
        assert_eq!(detail.meanings, vec!["나무"]);
        assert_eq!(detail.fields.get_text("reading"), Some("목"));
        assert!(detail.sub_entry_ids.is_empty());
    }

    #[tokio::test]
    async fn unknown_query_is_empty_and_unknown_id_is_not_found() {
        let catalog = CatalogSource::new();
        assert!(catalog.query("水").await.unwrap().is_empty());
        assert_eq!(catalog.detail("9").await.unwrap_err(), SourceError::NotFound);
    }

    #[test]
    fn malformed_catalog_is_parse_error() {
        let err = CatalogSource::from_json("{\"entries\": 3}").unwrap_err();
        assert!(matches!(err, HanjaDeckError::Parse { .. }));
    }

    #[test]
    fn load_reads_file() {
        let path = std::env::temp_dir().join(format!("hanjadeck-catalog-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"candidates": {"水": [{"label": "水", "id": "7"}]}}"#).unwrap();

        let catalog = CatalogSource::load(&path).expect("load");
        assert_eq!(catalog.candidates.len(), 1);

        let _ = std::fs::remove_file(&path);
    }
}
