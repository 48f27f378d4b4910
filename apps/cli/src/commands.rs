//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use hanjadeck_core::{EntryLookup, PipelineConfig, PipelineStats, ProgressReporter};
use hanjadeck_extract::{PatternSet, explode, extract_with};
use hanjadeck_shared::{
    AppConfig, OutputConfig, Record, init_config, load_config, load_config_from, render_config,
};
use hanjadeck_source::{hanja_chars, source_from_config};
use hanjadeck_storage::{CsvSink, JsonLinesSink, Sink, Storage};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// hanjadeck: turn hanja word lists into study decks.
#[derive(Parser)]
#[command(
    name = "hanjadeck",
    version,
    about = "Turn hanja word lists into dictionary-enriched study decks.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.hanjadeck/hanjadeck.toml).
    #[arg(long, global = true, env = "HANJADECK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the full pipeline over an input file.
    Run {
        /// Input text file.
        input: PathBuf,

        /// Append records as JSON lines to this file.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Append records as CSV rows to this file.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Store the run in this libSQL database.
        #[arg(long)]
        db: Option<PathBuf>,

        /// Output key order, `|`-separated.
        #[arg(short, long)]
        keys: Option<String>,

        /// Label of the stored run (defaults to the input file stem).
        #[arg(short, long)]
        label: Option<String>,
    },

    /// Extract entries from an input file without looking them up.
    Extract {
        /// Input text file.
        input: PathBuf,
    },

    /// Look up every hanja character of TEXT.
    Lookup {
        /// Text to scan for hanja.
        text: String,
    },

    /// List runs stored in a database.
    Runs {
        /// Database file (defaults to `output.database_path`).
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so that record
/// output on stdout stays machine-readable.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "hanjadeck=info",
        1 => "hanjadeck=debug",
        _ => "hanjadeck=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run {
            input,
            out,
            csv,
            db,
            keys,
            label,
        } => {
            let mut config = resolve_config(config_path)?;
            if let Some(keys) = keys {
                config.output.keys = Some(keys);
            }
            if let Some(out) = out {
                config.output.jsonl_path = Some(out.to_string_lossy().into_owned());
            }
            if let Some(csv) = csv {
                config.output.csv_path = Some(csv.to_string_lossy().into_owned());
            }
            if let Some(db) = db {
                config.output.database_path = Some(db.to_string_lossy().into_owned());
            }
            cmd_run(&config, &input, label).await
        }
        Command::Extract { input } => cmd_extract(&resolve_config(config_path)?, &input),
        Command::Lookup { text } => cmd_lookup(&resolve_config(config_path)?, &text).await,
        Command::Runs { db } => cmd_runs(&resolve_config(config_path)?, db).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

fn read_input(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| eyre!("cannot read '{}': {e}", path.display()))
}

fn print_json_lines(records: &[Record]) -> Result<()> {
    for record in records {
        println!("{}", serde_json::to_string(record)?);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config: &AppConfig, input: &Path, label: Option<String>) -> Result<()> {
    let raw_text = read_input(input)?;
    let pipeline = PipelineConfig::from_app(config)?;
    let source = source_from_config(&config.source)?;

    info!(input = %input.display(), adapter = source.name(), "running pipeline");

    let reporter = CliProgress::new();
    let output = hanjadeck_core::run(&pipeline, &raw_text, source.as_ref(), &reporter).await?;

    let label = label.unwrap_or_else(|| {
        input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| hanjadeck_storage::DEFAULT_RUN_LABEL.to_string())
    });

    let written = write_sinks(&config.output, &label, &output.field_order, &output.records).await;

    let stats = &output.stats;
    eprintln!();
    eprintln!("  Records:    {}", output.records.len());
    eprintln!("  Resolved:   {}", stats.resolved);
    eprintln!("  Unresolved: {}", stats.unresolved);
    if stats.truncated > 0 {
        eprintln!("  Truncated:  {}", stats.truncated);
    }
    eprintln!("  Time:       {:.1}s", stats.elapsed.as_secs_f64());
    eprintln!();

    written
}

/// Write the records to every configured sink, or to stdout when none is
/// configured. A sink that cannot be opened counts as failed; the call
/// errors only when every configured sink failed.
async fn write_sinks(
    output: &OutputConfig,
    label: &str,
    field_order: &[String],
    records: &[Record],
) -> Result<()> {
    let mut sinks: Vec<Box<dyn Sink>> = Vec::new();
    let mut failed = 0usize;

    if let Some(path) = &output.jsonl_path {
        sinks.push(Box::new(JsonLinesSink::new(path)));
    }
    if let Some(path) = &output.csv_path {
        sinks.push(Box::new(CsvSink::new(path)));
    }
    if let Some(path) = &output.database_path {
        match Storage::open(Path::new(path)).await {
            Ok(storage) => sinks.push(Box::new(storage.with_label(label))),
            Err(e) => {
                failed += 1;
                warn!(path = %path, error = %e, "cannot open database");
            }
        }
    }

    let configured = sinks.len() + failed;
    if configured == 0 {
        return print_json_lines(records);
    }

    for sink in &sinks {
        if let Err(e) = sink.write(field_order, records).await {
            failed += 1;
            warn!(sink = sink.name(), error = %e, "sink failed");
        }
    }

    if failed == configured {
        return Err(eyre!("every configured sink failed ({failed} of {configured})"));
    }
    Ok(())
}

fn cmd_extract(config: &AppConfig, input: &Path) -> Result<()> {
    let raw_text = read_input(input)?;
    let patterns = PatternSet::compile(&config.input.patterns)?;
    let mut records = extract_with(&raw_text, &patterns, &config.input.delimiter)?;
    if let Some(spec) = &config.input.explode {
        records = explode(records, &spec.field, &spec.into);
    }

    info!(records = records.len(), "extracted entries");
    print_json_lines(&records)
}

async fn cmd_lookup(config: &AppConfig, text: &str) -> Result<()> {
    let queries = hanja_chars(text);
    if queries.is_empty() {
        return Err(eyre!("no hanja found in '{text}'"));
    }

    let pipeline = PipelineConfig::from_app(config)?;
    let source = source_from_config(&config.source)?;
    let lookup = EntryLookup::new(&pipeline);

    for query in &queries {
        let entry = lookup.resolve_entry(source.as_ref(), query, None).await;
        if !entry.found {
            warn!(query = %query, "entry not resolved");
        }
        println!("{}", serde_json::to_string(&entry.record)?);
    }
    Ok(())
}

async fn cmd_runs(config: &AppConfig, db: Option<PathBuf>) -> Result<()> {
    let path = db
        .or_else(|| config.output.database_path.as_ref().map(PathBuf::from))
        .ok_or_else(|| eyre!("no database given: pass --db or set output.database_path"))?;

    let storage = Storage::open_readonly(&path).await?;
    let runs = storage.list_runs().await?;

    if runs.is_empty() {
        println!("No runs stored in {}", path.display());
        return Ok(());
    }

    for run in runs {
        println!(
            "{}  {:<20} {:>6} records  {}",
            run.id, run.label, run.record_count, run.created_at
        );
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    println!("{}", render_config(&config)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn entry_resolved(&self, query: &str, found: bool, current: usize, total: usize) {
        let mark = if found { "" } else { " (not found)" };
        self.spinner
            .set_message(format!("Resolving [{current}/{total}] {query}{mark}"));
    }

    fn done(&self, _stats: &PipelineStats) {
        self.spinner.finish_and_clear();
    }
}
