//! Shared types, error model, and configuration for HanjaDeck.
//!
//! This crate is the foundation depended on by all other HanjaDeck crates.
//! It provides:
//! - [`HanjaDeckError`]: the unified error type
//! - Domain types ([`Record`], [`FieldValue`])
//! - Configuration ([`AppConfig`] and its sections, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ExplodeConfig, HtmlSourceConfig, InputConfig, ModifierSpec, OutputConfig,
    PatternSpec, ResolveConfig, SourceConfig, SourceKind, TagsConfig, TraversalConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from, render_config,
};
pub use error::{HanjaDeckError, Result, SourceError};
pub use types::{FieldValue, Record, field_union};
