//! Derived-entry traversal.
//!
//! An entry may link to derived sub-entries (compounds, inflected forms)
//! which in turn link further. The traversal walks that graph depth first
//! from a root id, collecting:
//!
//! - **meanings** once, from the first node that has a real one (entries
//!   that only point at a root word, e.g. `"…의 어근."`, do not count);
//! - **examples** from every node, filtered by word count.
//!
//! Each id is pushed at most once over the whole walk, so cycles and shared
//! children are harmless.

use std::collections::HashSet;

use hanjadeck_shared::TraversalConfig;
use tracing::{debug, instrument, warn};

use crate::adapters::{ContentSource, EntryDetail};

/// Default suffix of reference-only meaning entries.
pub const DEFAULT_REFERENCE_SUFFIX: &str = "의 어근.";

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Meanings and examples collected from a root and its derived entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedCollection {
    /// Meanings of the first node that had any; empty if none did.
    pub meanings: Vec<String>,
    /// Filtered examples of all visited nodes, in visit order.
    pub examples: Vec<String>,
    /// Ids processed, in visit order.
    pub visited: Vec<String>,
    /// Set when the node cap stopped the walk early.
    pub truncated: bool,
}

// ---------------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DerivedGraphTraversal {
    follow_derived: bool,
    reference_suffix: String,
    min_words: usize,
    max_words: usize,
    max_nodes: Option<usize>,
}

impl Default for DerivedGraphTraversal {
    fn default() -> Self {
        Self {
            follow_derived: true,
            reference_suffix: DEFAULT_REFERENCE_SUFFIX.to_string(),
            min_words: 3,
            max_words: 9,
            max_nodes: None,
        }
    }
}

impl DerivedGraphTraversal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &TraversalConfig) -> Self {
        Self {
            follow_derived: config.follow_derived,
            reference_suffix: config.reference_suffix.clone(),
            min_words: config.min_words,
            max_words: config.max_words,
            max_nodes: config.max_nodes.map(|max| max.max(1)),
        }
    }

    /// When off, sub-entry links are ignored and only the root is read.
    pub fn follow_derived(mut self, follow: bool) -> Self {
        self.follow_derived = follow;
        self
    }

    pub fn with_reference_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.reference_suffix = suffix.into();
        self
    }

    /// Inclusive word-count bounds for examples.
    pub fn with_word_bounds(mut self, min: usize, max: usize) -> Self {
        self.min_words = min;
        self.max_words = max;
        self
    }

    /// Stop after processing `max` nodes. The root is always processed.
    pub fn with_max_nodes(mut self, max: usize) -> Self {
        self.max_nodes = Some(max.max(1));
        self
    }

    /// Walk the graph from `root_id`, fetching every node.
    pub async fn run(&self, source: &dyn ContentSource, root_id: &str) -> DerivedCollection {
        self.walk(source, root_id, None).await
    }

    /// Walk the graph from a root whose detail is already known.
    pub async fn run_seeded(
        &self,
        source: &dyn ContentSource,
        root_id: &str,
        root_detail: &EntryDetail,
    ) -> DerivedCollection {
        self.walk(source, root_id, Some(root_detail)).await
    }

    #[instrument(skip(self, source, root_detail), fields(adapter = source.name()))]
    async fn walk(
        &self,
        source: &dyn ContentSource,
        root_id: &str,
        root_detail: Option<&EntryDetail>,
    ) -> DerivedCollection {
        let mut frontier = vec![root_id.to_string()];
        let mut seen: HashSet<String> = HashSet::from([root_id.to_string()]);
        let mut collection = DerivedCollection::default();
        let mut meanings_captured = false;

        while let Some(id) = frontier.pop() {
            if self
                .max_nodes
                .is_some_and(|max| collection.visited.len() >= max)
            {
                warn!(
                    root = root_id,
                    visited = collection.visited.len(),
                    pending = frontier.len() + 1,
                    "derived traversal truncated"
                );
                collection.truncated = true;
                break;
            }

            let fetched;
            let detail = match root_detail {
                Some(detail) if id == root_id => detail,
                _ => {
                    fetched = match source.detail(&id).await {
                        Ok(detail) => detail,
                        Err(e) => {
                            warn!(id = %id, error = %e, "failed to fetch derived entry");
                            EntryDetail::default()
                        }
                    };
                    &fetched
                }
            };

            if self.follow_derived {
                for sub_id in &detail.sub_entry_ids {
                    if seen.insert(sub_id.clone()) {
                        frontier.push(sub_id.clone());
                    }
                }
            }

            if !meanings_captured {
                let meanings: Vec<String> = detail
                    .meanings
                    .iter()
                    .map(|m| m.trim())
                    .filter(|m| !m.is_empty() && !self.is_reference(m))
                    .map(String::from)
                    .collect();
                if !meanings.is_empty() {
                    debug!(id = %id, count = meanings.len(), "captured meanings");
                    collection.meanings = meanings;
                    meanings_captured = true;
                }
            }

            collection.examples.extend(
                detail
                    .examples
                    .iter()
                    .map(|e| e.trim())
                    .filter(|e| self.within_word_bounds(e))
                    .map(String::from),
            );

            collection.visited.push(id);
        }

        debug!(
            visited = collection.visited.len(),
            meanings = collection.meanings.len(),
            examples = collection.examples.len(),
            "derived traversal complete"
        );
        collection
    }

    fn is_reference(&self, meaning: &str) -> bool {
        !self.reference_suffix.is_empty() && meaning.ends_with(self.reference_suffix.as_str())
    }

    fn within_word_bounds(&self, example: &str) -> bool {
        let words = example.split_whitespace().count();
        words > 0 && (self.min_words..=self.max_words).contains(&words)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::adapters::{Candidate, CatalogSource, SourceResult};
    use async_trait::async_trait;

    fn node(subs: &[&str], meanings: &[&str], examples: &[&str]) -> EntryDetail {
        EntryDetail {
            sub_entry_ids: subs.iter().map(|s| s.to_string()).collect(),
            meanings: meanings.iter().map(|s| s.to_string()).collect(),
            examples: examples.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Catalog wrapper that records every detail request.
    struct Recording {
        inner: CatalogSource,
        calls: Mutex<Vec<String>>,
    }

    impl Recording {
        fn new(inner: CatalogSource) -> Self {
            Self {
                inner,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ContentSource for Recording {
        async fn query(&self, text: &str) -> SourceResult<Vec<Candidate>> {
            self.inner.query(text).await
        }

        async fn detail(&self, id: &str) -> SourceResult<EntryDetail> {
            self.calls.lock().unwrap().push(id.to_string());
            self.inner.detail(id).await
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    #[tokio::test]
    async fn meanings_from_first_qualifying_node_examples_from_all() {
        let source = CatalogSource::new()
            .with_entry(
                "root",
                node(&["A", "B"], &[], &["뿌리 예문 하나 입니다"]),
            )
            .with_entry("A", node(&[], &[], &["에이 의 예문 입니다"]))
            .with_entry(
                "B",
                node(&[], &["비의 뜻", "둘째 뜻"], &["비 의 예문 입니다"]),
            );

        let collection = DerivedGraphTraversal::new().run(&source, "root").await;

        assert_eq!(collection.meanings, vec!["비의 뜻", "둘째 뜻"]);
        assert_eq!(collection.examples.len(), 3);
        assert!(collection.examples.contains(&"뿌리 예문 하나 입니다".to_string()));
        assert!(collection.examples.contains(&"에이 의 예문 입니다".to_string()));
        assert!(collection.examples.contains(&"비 의 예문 입니다".to_string()));
        assert!(!collection.truncated);
    }

    #[tokio::test]
    async fn later_meanings_are_ignored() {
        let source = CatalogSource::new()
            .with_entry("root", node(&["A"], &["뿌리 뜻"], &[]))
            .with_entry("A", node(&[], &["파생 뜻"], &[]));

        let collection = DerivedGraphTraversal::new().run(&source, "root").await;
        assert_eq!(collection.meanings, vec!["뿌리 뜻"]);
        assert_eq!(collection.visited, vec!["root", "A"]);
    }

    #[tokio::test]
    async fn reference_only_meanings_defer_capture() {
        let source = CatalogSource::new()
            .with_entry("root", node(&["A"], &["‘나무’의 어근."], &[]))
            .with_entry("A", node(&[], &["나무로 된"], &[]));

        let collection = DerivedGraphTraversal::new().run(&source, "root").await;
        assert_eq!(collection.meanings, vec!["나무로 된"]);
    }

    #[tokio::test]
    async fn no_qualifying_meaning_leaves_list_empty() {
        let source = CatalogSource::new()
            .with_entry("root", node(&["A"], &["‘나무’의 어근."], &[]))
            .with_entry("A", node(&[], &[], &[]));

        let collection = DerivedGraphTraversal::new().run(&source, "root").await;
        assert!(collection.meanings.is_empty());
        assert_eq!(collection.visited.len(), 2);
    }

    #[tokio::test]
    async fn each_id_is_fetched_once() {
        // root -> A, B; A -> B, root; B -> A
        let source = Recording::new(
            CatalogSource::new()
                .with_entry("root", node(&["A", "B"], &[], &[]))
                .with_entry("A", node(&["B", "root"], &[], &[]))
                .with_entry("B", node(&["A"], &["뜻"], &[])),
        );

        let collection = DerivedGraphTraversal::new().run(&source, "root").await;

        let mut calls = source.calls();
        assert_eq!(calls.len(), 3);
        calls.sort();
        calls.dedup();
        assert_eq!(calls.len(), 3);
        // LIFO: B is pushed last, so it is visited right after the root
        assert_eq!(collection.visited, vec!["root", "B", "A"]);
    }

    #[tokio::test]
    async fn seeded_root_is_not_fetched_again() {
        let source = Recording::new(
            CatalogSource::new().with_entry("A", node(&[], &["파생 뜻"], &[])),
        );
        let root = node(&["A"], &[], &["뿌리 예문 하나 입니다"]);

        let collection = DerivedGraphTraversal::new()
            .run_seeded(&source, "root", &root)
            .await;

        assert_eq!(source.calls(), vec!["A"]);
        assert_eq!(collection.meanings, vec!["파생 뜻"]);
        assert_eq!(collection.examples, vec!["뿌리 예문 하나 입니다"]);
    }

    #[tokio::test]
    async fn examples_outside_word_bounds_are_dropped() {
        let source = CatalogSource::new().with_entry(
            "root",
            node(
                &[],
                &[],
                &[
                    "너무 짧다",
                    "  세 단어 예문  ",
                    "하나 둘 셋 넷 다섯 여섯 일곱 여덟 아홉",
                    "하나 둘 셋 넷 다섯 여섯 일곱 여덟 아홉 열",
                ],
            ),
        );

        let collection = DerivedGraphTraversal::new().run(&source, "root").await;
        assert_eq!(
            collection.examples,
            vec!["세 단어 예문", "하나 둘 셋 넷 다섯 여섯 일곱 여덟 아홉"]
        );
    }

    #[tokio::test]
    async fn failed_fetch_counts_as_empty_node() {
        let source = CatalogSource::new()
            .with_entry("root", node(&["missing", "B"], &[], &[]))
            .with_entry("B", node(&[], &["뜻"], &[]));

        let collection = DerivedGraphTraversal::new().run(&source, "root").await;
        assert_eq!(collection.meanings, vec!["뜻"]);
        assert!(collection.visited.contains(&"missing".to_string()));
    }

    #[tokio::test]
    async fn node_cap_truncates() {
        let source = CatalogSource::new()
            .with_entry("root", node(&["A", "B"], &[], &[]))
            .with_entry("A", node(&[], &[], &[]))
            .with_entry("B", node(&[], &[], &[]));

        let collection = DerivedGraphTraversal::new()
            .with_max_nodes(2)
            .run(&source, "root")
            .await;
        assert_eq!(collection.visited.len(), 2);
        assert!(collection.truncated);
    }

    #[tokio::test]
    async fn zero_cap_still_keeps_the_seeded_root() {
        let config = TraversalConfig {
            max_nodes: Some(0),
            ..Default::default()
        };
        let source = CatalogSource::new().with_entry("A", node(&[], &["파생 뜻"], &[]));
        let root = node(&["A"], &["뿌리 뜻"], &["뿌리 예문 하나 입니다"]);

        let collection = DerivedGraphTraversal::from_config(&config)
            .run_seeded(&source, "root", &root)
            .await;
        assert_eq!(collection.visited, vec!["root"]);
        assert_eq!(collection.meanings, vec!["뿌리 뜻"]);
        assert_eq!(collection.examples, vec!["뿌리 예문 하나 입니다"]);
        assert!(collection.truncated);
    }

    #[tokio::test]
    async fn follow_derived_off_reads_only_the_root() {
        let config = TraversalConfig {
            follow_derived: false,
            ..Default::default()
        };
        let source = CatalogSource::new()
            .with_entry("root", node(&["A"], &[], &[]))
            .with_entry("A", node(&[], &["뜻"], &[]));

        let collection = DerivedGraphTraversal::from_config(&config)
            .run(&source, "root")
            .await;
        assert_eq!(collection.visited, vec!["root"]);
        assert!(collection.meanings.is_empty());
        assert!(!collection.truncated);
    }

    #[test]
    fn empty_suffix_never_marks_references() {
        let traversal = DerivedGraphTraversal::new().with_reference_suffix("");
        assert!(!traversal.is_reference("무엇이든"));
        assert!(DerivedGraphTraversal::new().is_reference("‘가’의 어근."));
    }
}
