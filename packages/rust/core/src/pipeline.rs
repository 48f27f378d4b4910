//! End-to-end `run` pipeline: text → extract → resolve → traverse → fuse →
//! modify → tag → project.

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use hanjadeck_extract::{PatternSet, explode, extract_with, parse_key_order};
use hanjadeck_shared::{
    AppConfig, FieldValue, InputConfig, ModifierSpec, Record, ResolveConfig, Result, TagsConfig,
    TraversalConfig, field_union,
};
use hanjadeck_source::{ContentSource, VariantTable};

use crate::fusion::fuse;
use crate::lookup::EntryLookup;
use crate::modifiers::{self, Modifier};
use crate::projection::project;
use crate::tags::build_tags;

/// Settings of a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub input: InputConfig,
    pub resolve: ResolveConfig,
    pub traversal: TraversalConfig,
    pub modifiers: Vec<ModifierSpec>,
    pub tags: Option<TagsConfig>,
    /// Output key order; empty keeps every field.
    pub key_order: Vec<String>,
    pub variants: VariantTable,
}

impl PipelineConfig {
    /// Build from the application config, loading the variant table if one
    /// is configured.
    pub fn from_app(config: &AppConfig) -> Result<Self> {
        let variants = match &config.resolve.variants_path {
            Some(path) => VariantTable::load(Path::new(path))?,
            None => VariantTable::new(),
        };
        let key_order = config
            .output
            .keys
            .as_deref()
            .map(parse_key_order)
            .unwrap_or_default();

        Ok(Self {
            input: config.input.clone(),
            resolve: config.resolve.clone(),
            traversal: config.traversal.clone(),
            modifiers: config.modifiers.clone(),
            tags: config.tags.clone(),
            key_order,
            variants,
        })
    }
}

/// Counters of a completed run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStats {
    /// Records produced by extraction (after explode).
    pub extracted: usize,
    pub resolved: usize,
    pub unresolved: usize,
    /// Derived traversals stopped by the node cap.
    pub truncated: usize,
    pub elapsed: Duration,
}

/// Result of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub records: Vec<Record>,
    /// Column order for sinks.
    pub field_order: Vec<String>,
    pub stats: PipelineStats,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each lookup; `current` is 1-based.
    fn entry_resolved(&self, query: &str, found: bool, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, stats: &PipelineStats);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn entry_resolved(&self, _query: &str, _found: bool, _current: usize, _total: usize) {}
    fn done(&self, _stats: &PipelineStats) {}
}

/// Run the full pipeline over `raw_text`.
///
/// Configuration errors (bad patterns, empty delimiter) abort the run.
/// Everything else degrades per record: unresolved queries keep only their
/// key, failing modifiers are skipped, records missing tag fields get no
/// tags.
#[instrument(skip_all, fields(adapter = source.name(), bytes = raw_text.len()))]
pub async fn run(
    config: &PipelineConfig,
    raw_text: &str,
    source: &dyn ContentSource,
    progress: &dyn ProgressReporter,
) -> Result<PipelineOutput> {
    let start = Instant::now();
    let mut stats = PipelineStats::default();

    // --- Phase 1: Extract ---
    progress.phase("Extracting entries");
    let patterns = PatternSet::compile(&config.input.patterns)?;
    let mut records = extract_with(raw_text, &patterns, &config.input.delimiter)?;
    if let Some(spec) = &config.input.explode {
        records = explode(records, &spec.field, &spec.into);
    }
    stats.extracted = records.len();
    info!(records = records.len(), "extracted entries");

    // --- Phase 2: Resolve ---
    progress.phase("Resolving entries");
    let lookup = EntryLookup::new(config);

    let total = records.len();
    let mut source_records = Vec::with_capacity(total);
    for (index, record) in records.iter().enumerate() {
        let query = match record.get(&config.resolve.query_field) {
            Some(FieldValue::Text(text)) => text.as_str(),
            _ => {
                warn!(
                    record = index,
                    field = %config.resolve.query_field,
                    "entry has no text query field"
                );
                ""
            }
        };
        let must_contain = config
            .resolve
            .must_contain_field
            .as_deref()
            .and_then(|field| record.get_text(field));

        let entry = lookup.resolve_entry(source, query, must_contain).await;
        if entry.truncated {
            stats.truncated += 1;
        }
        if entry.found {
            stats.resolved += 1;
        } else {
            stats.unresolved += 1;
            warn!(record = index, query, "entry not resolved");
        }
        progress.entry_resolved(query, entry.found, index + 1, total);
        source_records.push(entry.record);
    }

    // --- Phase 3: Fuse and shape ---
    progress.phase("Merging entries");
    let fused = fuse(records, source_records)?;

    let modifiers: Vec<Modifier> = config.modifiers.iter().map(Modifier::from_spec).collect();
    let mut records = modifiers::apply(fused, &modifiers);

    if let Some(tags) = &config.tags {
        records = build_tags(records, &tags.template, &tags.fields, &tags.delimiter);
    }

    let field_order = if config.key_order.is_empty() {
        field_union(&records)
    } else {
        records = project(&records, &config.key_order);
        config.key_order.clone()
    };

    stats.elapsed = start.elapsed();
    info!(
        records = records.len(),
        resolved = stats.resolved,
        unresolved = stats.unresolved,
        elapsed_ms = stats.elapsed.as_millis() as u64,
        "pipeline complete"
    );
    progress.done(&stats);

    Ok(PipelineOutput {
        records,
        field_order,
        stats,
    })
}
