//! Query → entry resolution against a [`ContentSource`].

use hanjadeck_shared::{Record, SourceError};
use tracing::{debug, instrument, warn};

use crate::adapters::{ContentSource, EntryDetail};
use crate::hanja::{VariantTable, is_hanja};

/// Outcome of resolving one query.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found { id: String, detail: EntryDetail },
    NotFound,
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found { .. })
    }

    /// Build the source-side record for `query`.
    ///
    /// The record always carries `key_field = query` so it stays aligned
    /// with its input counterpart. A found entry adds its label fields and
    /// `id_field`.
    pub fn into_record(self, key_field: &str, id_field: &str, query: &str) -> Record {
        let mut record = Record::new();
        record.insert(key_field, query);

        if let Resolution::Found { id, detail } = self {
            for (name, value) in detail.fields {
                if name != key_field {
                    record.insert(name, value);
                }
            }
            record.insert(id_field, id);
        }

        record
    }
}

/// Resolves a query to a single entry of a content source.
///
/// The first candidate is accepted only if its label is exactly the
/// normalized query. Source failures never escape: they are logged and
/// reported as [`Resolution::NotFound`].
#[derive(Debug, Clone, Default)]
pub struct EntryResolver {
    variants: VariantTable,
    require_hanja: bool,
}

impl EntryResolver {
    pub fn new(variants: VariantTable) -> Self {
        Self {
            variants,
            require_hanja: false,
        }
    }

    /// Reject queries containing non-hanja characters without asking the source.
    pub fn require_hanja(mut self, require: bool) -> Self {
        self.require_hanja = require;
        self
    }

    pub fn variants(&self) -> &VariantTable {
        &self.variants
    }

    /// Resolve `query`: ask the source with the text as given, accept the
    /// first candidate if its label equals the normalized query.
    pub async fn resolve(&self, source: &dyn ContentSource, query: &str) -> Resolution {
        self.resolve_with(source, query, None).await
    }

    /// Like [`resolve`](Self::resolve), but the accepted entry must also
    /// contain `must_contain` in its label or in one of its text fields.
    #[instrument(skip(self, source), fields(adapter = source.name()))]
    pub async fn resolve_with(
        &self,
        source: &dyn ContentSource,
        query: &str,
        must_contain: Option<&str>,
    ) -> Resolution {
        if query.is_empty() {
            debug!("empty query");
            return Resolution::NotFound;
        }
        if self.require_hanja && !query.chars().all(is_hanja) {
            warn!(query, "query contains non-hanja characters");
            return Resolution::NotFound;
        }

        let normalized = self.variants.normalize(query);
        let resolution = match self.lookup(source, query, &normalized).await {
            Ok(Some(resolution)) => resolution,
            Ok(None) => {
                debug!(query, normalized = %normalized, "no matching candidate");
                return Resolution::NotFound;
            }
            Err(e) => {
                warn!(query, error = %e, "lookup failed");
                return Resolution::NotFound;
            }
        };

        if let (Some(needle), Resolution::Found { id, detail }) = (must_contain, &resolution) {
            if !needle.is_empty() && !contains_text(detail, &normalized, needle) {
                debug!(query, id = %id, must_contain = needle, "entry rejected by criterion");
                return Resolution::NotFound;
            }
        }
        resolution
    }

    /// Query with the text as given; compare the first label against its
    /// normalized form.
    async fn lookup(
        &self,
        source: &dyn ContentSource,
        query: &str,
        normalized: &str,
    ) -> Result<Option<Resolution>, SourceError> {
        let candidates = source.query(query).await?;
        let Some(first) = candidates.into_iter().next() else {
            return Ok(None);
        };
        if first.label != normalized {
            debug!(label = %first.label, "first candidate does not match");
            return Ok(None);
        }

        let detail = source.detail(&first.id).await?;
        Ok(Some(Resolution::Found {
            id: first.id,
            detail,
        }))
    }
}

fn contains_text(detail: &EntryDetail, label: &str, needle: &str) -> bool {
    label.contains(needle)
        || detail
            .fields
            .iter()
            .any(|(_, value)| value.as_text().is_some_and(|text| text.contains(needle)))
}
