//! Single-entry lookup: resolve one query and collect what its derived
//! entries add.

use hanjadeck_shared::Record;
use hanjadeck_source::{ContentSource, DerivedGraphTraversal, EntryResolver, Resolution};

use crate::pipeline::PipelineConfig;

/// Source-side record of one query.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEntry {
    /// Key field, plus label fields, id, meanings and examples when found.
    pub record: Record,
    pub found: bool,
    /// The derived traversal hit its node cap.
    pub truncated: bool,
}

/// Resolver and traversal configured once, shared by every lookup of a run.
#[derive(Debug, Clone)]
pub struct EntryLookup {
    resolver: EntryResolver,
    traversal: DerivedGraphTraversal,
    key_field: String,
    id_field: String,
    meanings_field: String,
    examples_field: String,
}

impl EntryLookup {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            resolver: EntryResolver::new(config.variants.clone())
                .require_hanja(config.resolve.require_hanja),
            traversal: DerivedGraphTraversal::from_config(&config.traversal),
            key_field: config.resolve.key_field.clone(),
            id_field: config.resolve.id_field.clone(),
            meanings_field: config.traversal.meanings_field.clone(),
            examples_field: config.traversal.examples_field.clone(),
        }
    }

    /// Resolve `query` and, when found, walk its derived entries.
    pub async fn resolve_entry(
        &self,
        source: &dyn ContentSource,
        query: &str,
        must_contain: Option<&str>,
    ) -> ResolvedEntry {
        let resolution = self.resolver.resolve_with(source, query, must_contain).await;
        let collected = match &resolution {
            Resolution::Found { id, detail } => {
                Some(self.traversal.run_seeded(source, id, detail).await)
            }
            Resolution::NotFound => None,
        };

        let found = resolution.is_found();
        let mut record = resolution.into_record(&self.key_field, &self.id_field, query);
        let mut truncated = false;
        if let Some(collected) = collected {
            truncated = collected.truncated;
            record.insert(self.meanings_field.as_str(), collected.meanings);
            record.insert(self.examples_field.as_str(), collected.examples);
        }

        ResolvedEntry {
            record,
            found,
            truncated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hanjadeck_shared::{FieldValue, ResolveConfig};
    use hanjadeck_source::{CatalogSource, EntryDetail};

    fn catalog() -> CatalogSource {
        CatalogSource::new()
            .with_candidate("木", "木", "1001")
            .with_entry(
                "1001",
                EntryDetail {
                    fields: [("reading", "목")].into_iter().collect(),
                    meanings: vec!["나무".into()],
                    ..Default::default()
                },
            )
    }

    #[tokio::test]
    async fn found_entry_carries_source_fields() {
        let lookup = EntryLookup::new(&PipelineConfig::default());
        let entry = lookup.resolve_entry(&catalog(), "木", None).await;

        assert!(entry.found);
        assert!(!entry.truncated);
        assert_eq!(entry.record.get_text("hanja"), Some("木"));
        assert_eq!(entry.record.get_text("entry_id"), Some("1001"));
        assert_eq!(entry.record.get("meanings"), Some(&FieldValue::from(vec!["나무"])));
    }

    #[tokio::test]
    async fn require_hanja_is_honoured() {
        let config = PipelineConfig {
            resolve: ResolveConfig {
                require_hanja: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let source = catalog().with_candidate("나무", "나무", "1001");

        let entry = EntryLookup::new(&config).resolve_entry(&source, "나무", None).await;
        assert!(!entry.found);
        assert_eq!(entry.record.len(), 1);
    }
}
