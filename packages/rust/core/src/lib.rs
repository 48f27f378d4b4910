//! Core pipeline orchestration and record processing for HanjaDeck.
//!
//! This crate provides:
//! - [`lookup`]: resolving one query and walking its derived entries
//! - [`fusion`]: positional merge of input and source records
//! - [`modifiers`]: the fault-isolating modifier pipeline
//! - [`tags`]: hierarchical tag construction from nested templates
//! - [`projection`]: output key selection and ordering
//! - [`pipeline`]: the end-to-end `run` workflow tying these together

pub mod fusion;
pub mod lookup;
pub mod modifiers;
pub mod pipeline;
pub mod projection;
pub mod tags;

pub use fusion::fuse;
pub use lookup::{EntryLookup, ResolvedEntry};
pub use modifiers::{Modifier, apply};
pub use pipeline::{
    PipelineConfig, PipelineOutput, PipelineStats, ProgressReporter, SilentProgress, run,
};
pub use projection::project;
pub use tags::{TagTemplate, TagValue, build_tags, tags_for};
