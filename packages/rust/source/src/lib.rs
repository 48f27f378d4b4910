//! Content sources and the lookups built on them.
//!
//! This crate provides:
//! - [`adapters`]: the [`ContentSource`] contract with HTML and catalog adapters
//! - [`EntryResolver`]: resolves one query to one entry, variant forms included
//! - [`DerivedGraphTraversal`]: collects meanings and examples across derived entries
//! - [`hanja`]: hanja character helpers and the [`VariantTable`]

pub mod adapters;
pub mod hanja;
pub mod resolver;
pub mod traversal;

pub use adapters::{
    Candidate, CatalogSource, ContentSource, EntryDetail, HtmlSource, SourceResult,
};
pub use hanja::{VariantTable, hanja_chars, is_hanja};
pub use resolver::{EntryResolver, Resolution};
pub use traversal::{DEFAULT_REFERENCE_SUFFIX, DerivedCollection, DerivedGraphTraversal};

use std::path::Path;
use std::time::Duration;

use hanjadeck_shared::{HanjaDeckError, Result, SourceConfig, SourceKind};

/// Build the content source selected by `config`.
///
/// The caller owns the returned session and passes it by reference to the
/// resolver and traversal; it is released when dropped.
pub fn source_from_config(config: &SourceConfig) -> Result<Box<dyn ContentSource>> {
    match config.kind {
        SourceKind::Catalog => {
            let path = config.catalog_path.as_deref().ok_or_else(|| {
                HanjaDeckError::configuration("source.catalog_path is required for a catalog source")
            })?;
            Ok(Box::new(CatalogSource::load(Path::new(path))?))
        }
        SourceKind::Html => {
            let html = config.html.as_ref().ok_or_else(|| {
                HanjaDeckError::configuration("[source.html] is required for an html source")
            })?;
            Ok(Box::new(HtmlSource::new(
                html,
                Duration::from_secs(config.timeout_secs),
            )?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_source_needs_a_path() {
        let config = SourceConfig::default();
        let err = source_from_config(&config).err().expect("missing path");
        assert!(matches!(err, HanjaDeckError::Configuration { .. }));
    }

    #[test]
    fn html_source_needs_its_section() {
        let config = SourceConfig {
            kind: SourceKind::Html,
            ..Default::default()
        };
        assert!(source_from_config(&config).is_err());
    }

    #[tokio::test]
    async fn builds_catalog_source_from_file() {
        let path = std::env::temp_dir().join(format!("hanjadeck-src-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"candidates": {"木": [{"label": "木", "id": "1"}]}}"#).unwrap();

        let config = SourceConfig {
            catalog_path: Some(path.to_string_lossy().into_owned()),
            ..Default::default()
        };
        let source = source_from_config(&config).expect("catalog");
        assert_eq!(source.name(), "catalog");
        assert_eq!(source.query("木").await.unwrap().len(), 1);

        let _ = std::fs::remove_file(&path);
    }
}
