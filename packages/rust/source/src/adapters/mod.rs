//! Content source contract and built-in adapters.
//!
//! A content source answers two questions: which entries match a query
//! string, and what does a given entry contain. The resolver and the derived
//! traversal only ever talk to a source through [`ContentSource`], so the
//! HTTP adapter and the offline catalog are interchangeable.

mod catalog;
mod html;

use async_trait::async_trait;
use hanjadeck_shared::{Record, SourceError};
use serde::{Deserialize, Serialize};

pub use catalog::CatalogSource;
pub use html::HtmlSource;

/// Result of a single content source call.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One search hit returned by [`ContentSource::query`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Displayed headword, compared against the normalized query.
    pub label: String,
    /// Identifier accepted by [`ContentSource::detail`].
    pub id: String,
}

impl Candidate {
    pub fn new(label: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            id: id.into(),
        }
    }
}

/// Detail page of a single entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryDetail {
    /// Label fields scraped from the entry (reading, radical, stroke count...).
    #[serde(default)]
    pub fields: Record,

    /// Identifiers of derived sub-entries linked from this entry.
    #[serde(default)]
    pub sub_entry_ids: Vec<String>,

    /// Meaning lines, in page order.
    #[serde(default)]
    pub meanings: Vec<String>,

    /// Example sentences, in page order.
    #[serde(default)]
    pub examples: Vec<String>,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A fallible lookup service.
///
/// Callers issue one request at a time per source; implementations need not
/// support concurrent calls on the same session.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Search for entries matching `text`. An empty list means no hit.
    async fn query(&self, text: &str) -> SourceResult<Vec<Candidate>>;

    /// Fetch the detail of the entry identified by `id`.
    async fn detail(&self, id: &str) -> SourceResult<EntryDetail>;

    /// Human-readable source name for tracing.
    fn name(&self) -> &str;
}
