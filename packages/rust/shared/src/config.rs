//! Application configuration for HanjaDeck.
//!
//! User config lives at `~/.hanjadeck/hanjadeck.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{HanjaDeckError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "hanjadeck.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".hanjadeck";

// ---------------------------------------------------------------------------
// Config structs (matching hanjadeck.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Raw text parsing.
    #[serde(default)]
    pub input: InputConfig,

    /// Entry lookup against the content source.
    #[serde(default)]
    pub resolve: ResolveConfig,

    /// Derived sub-entry traversal.
    #[serde(default)]
    pub traversal: TraversalConfig,

    /// Content source adapter settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Output ordering and sinks.
    #[serde(default)]
    pub output: OutputConfig,

    /// Hierarchical tag construction. Omitted means no `tags` field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<TagsConfig>,

    /// Field and collection modifiers, applied in order after fusion.
    #[serde(default)]
    pub modifiers: Vec<ModifierSpec>,
}

/// `[input]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Separator between chunks of the input text.
    #[serde(default = "default_chunk_delimiter")]
    pub delimiter: String,

    /// One pattern per line of a chunk, applied positionally.
    #[serde(default = "default_patterns")]
    pub patterns: Vec<PatternSpec>,

    /// Turn a list field into one record per item before lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explode: Option<ExplodeConfig>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            delimiter: default_chunk_delimiter(),
            patterns: default_patterns(),
            explode: None,
        }
    }
}

fn default_chunk_delimiter() -> String {
    "\n\n".into()
}

fn default_patterns() -> Vec<PatternSpec> {
    vec![
        PatternSpec::Rule(
            r"^(?P<hanja>[^:]+):(?P<meaning>[^:]+)(?::(?P<simplified_char>.+))?$".into(),
        ),
        PatternSpec::Pair(vec![r"^(?P<words>.+)$".into(), ";".into()]),
        PatternSpec::Rule(r"^(?P<reference_idx>.+)$".into()),
    ]
}

/// A single entry of the pattern list.
///
/// Either a regex with named groups, or a `[regex, split_delimiter]` pair.
/// Anything else is kept as-is so the extractor can report its index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternSpec {
    Rule(String),
    Pair(Vec<String>),
    Invalid(serde_json::Value),
}

/// `[input.explode]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplodeConfig {
    /// List field to expand.
    pub field: String,
    /// Field receiving each item.
    pub into: String,
}

/// `[resolve]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveConfig {
    /// Record field whose value is looked up.
    #[serde(default = "default_query_field")]
    pub query_field: String,

    /// Field that carries the query on the resolved record.
    #[serde(default = "default_query_field")]
    pub key_field: String,

    /// Field that receives the source's entry id.
    #[serde(default = "default_id_field")]
    pub id_field: String,

    /// Skip lookups whose query contains non-hanja characters.
    #[serde(default)]
    pub require_hanja: bool,

    /// Variant table file (`canonical:variant:variant` per line).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variants_path: Option<String>,

    /// Record field whose text the resolved entry must contain, in its
    /// label or one of its text fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub must_contain_field: Option<String>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            query_field: default_query_field(),
            key_field: default_query_field(),
            id_field: default_id_field(),
            require_hanja: false,
            variants_path: None,
            must_contain_field: None,
        }
    }
}

fn default_query_field() -> String {
    "hanja".into()
}
fn default_id_field() -> String {
    "entry_id".into()
}

/// `[traversal]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversalConfig {
    /// Follow derived sub-entries; when off only the root entry is read.
    #[serde(default = "default_true")]
    pub follow_derived: bool,

    #[serde(default = "default_meanings_field")]
    pub meanings_field: String,

    #[serde(default = "default_examples_field")]
    pub examples_field: String,

    /// Meanings ending with this suffix only point at another entry.
    #[serde(default = "default_reference_suffix")]
    pub reference_suffix: String,

    /// Minimum example length in words (inclusive).
    #[serde(default = "default_min_words")]
    pub min_words: usize,

    /// Maximum example length in words (inclusive).
    #[serde(default = "default_max_words")]
    pub max_words: usize,

    /// Stop after visiting this many entries. Unbounded when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_nodes: Option<usize>,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            follow_derived: true,
            meanings_field: default_meanings_field(),
            examples_field: default_examples_field(),
            reference_suffix: default_reference_suffix(),
            min_words: default_min_words(),
            max_words: default_max_words(),
            max_nodes: None,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_meanings_field() -> String {
    "meanings".into()
}
fn default_examples_field() -> String {
    "examples".into()
}
fn default_reference_suffix() -> String {
    "의 어근.".into()
}
fn default_min_words() -> usize {
    3
}
fn default_max_words() -> usize {
    9
}

/// Which content source adapter to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Offline JSON catalog file.
    #[default]
    Catalog,
    /// HTML pages fetched over HTTP and read with CSS selectors.
    Html,
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Catalog file for `kind = "catalog"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<String>,

    /// Selectors for `kind = "html"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<HtmlSourceConfig>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            timeout_secs: default_timeout_secs(),
            catalog_path: None,
            html: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

/// `[source.html]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtmlSourceConfig {
    /// Search page URL with a `{query}` placeholder.
    pub search_url: String,

    /// Entry page URL with an `{id}` placeholder.
    pub detail_url: String,

    #[serde(default = "default_candidate_row")]
    pub candidate_row: String,

    /// Label element inside a candidate row.
    #[serde(default = "default_candidate_label")]
    pub candidate_label: String,

    /// Link inside a candidate row; the id is the last path segment of its `href`.
    #[serde(default = "default_candidate_link")]
    pub candidate_link: String,

    #[serde(default = "default_meaning")]
    pub meaning: String,

    #[serde(default = "default_example")]
    pub example: String,

    /// Links to derived sub-entries on an entry page.
    #[serde(default = "default_sub_entry")]
    pub sub_entry: String,

    /// Additional label fields: field name to selector.
    #[serde(default)]
    pub fields: IndexMap<String, String>,
}

fn default_candidate_row() -> String {
    ".row".into()
}
fn default_candidate_label() -> String {
    ".label".into()
}
fn default_candidate_link() -> String {
    "a".into()
}
fn default_meaning() -> String {
    ".meaning".into()
}
fn default_example() -> String {
    ".example".into()
}
fn default_sub_entry() -> String {
    ".derived a".into()
}

/// `[tags]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagsConfig {
    /// Nested literal template with format slots, e.g. `{{'漢字': ['{}', {{'級': '{}'}}]}}`.
    pub template: String,

    /// Values for the template slots; `{field}` entries read the record.
    #[serde(default)]
    pub fields: Vec<String>,

    #[serde(default = "default_tag_delimiter")]
    pub delimiter: String,
}

fn default_tag_delimiter() -> String {
    "::".into()
}

/// `[output]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output key order, `|`-separated. All fields when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<String>,

    /// JSON Lines output file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonl_path: Option<String>,

    /// CSV output file; the header is written when the file is created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv_path: Option<String>,

    /// libSQL database file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
}

/// One `[[modifiers]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ModifierSpec {
    /// Join a list field into text.
    Join { field: String, separator: String },
    /// Split a text field into a list.
    Split { field: String, separator: String },
    /// Keep only the first item of a list field.
    First { field: String },
    /// Trim surrounding whitespace.
    Trim { field: String },
    /// Cut a trailing parenthesized annotation: `漢字(한자)` becomes `漢字`.
    StripParenthetical { field: String },
    /// Number records by position.
    Rank {
        field: String,
        #[serde(default = "default_rank_start")]
        start: i64,
    },
    /// Give records lacking `field` a fixed value.
    Fill { field: String, value: String },
}

fn default_rank_start() -> i64 {
    1
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.hanjadeck/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| HanjaDeckError::configuration("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.hanjadeck/hanjadeck.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| HanjaDeckError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        HanjaDeckError::configuration(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| HanjaDeckError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let content = render_config(&AppConfig::default())?;

    std::fs::write(&path, content).map_err(|e| HanjaDeckError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Serialize a config to pretty TOML.
pub fn render_config(config: &AppConfig) -> Result<String> {
    toml::to_string_pretty(config).map_err(|e| HanjaDeckError::configuration(e.to_string()))
}
