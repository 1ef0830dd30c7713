use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use quictrace::config::{Config, ParseMode};
use quictrace::model::TraceState;
use quictrace::report::Report;
use quictrace::tracer::decode_capture;

/// QUIC trace analyzer.
#[derive(Parser)]
#[command(name = "quictrace", about)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Logging verbosity level (trace, debug, info, warn, error).
    /// Overrides `log_level` from the configuration file.
    #[arg(long)]
    log_level: Option<String>,

    /// Parse mode; overrides the configuration file.
    #[arg(long, value_enum)]
    mode: Option<ParseMode>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a capture for possible problems.
    Report {
        /// Capture file to read.
        file: PathBuf,

        /// Emit the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print every decoded event as text.
    Print {
        /// Capture file to read.
        file: PathBuf,
    },
    /// Print version information and exit.
    Version,
}

/// Build-time version info, injected via RUSTFLAGS or the environment.
mod version {
    /// Release version string (set at build time).
    pub const RELEASE: &str = env!("CARGO_PKG_VERSION");

    /// Git commit hash (set at build time via env, or "unknown").
    pub fn git_commit() -> &'static str {
        option_env!("GIT_COMMIT").unwrap_or("unknown")
    }

    /// Full version string with platform info.
    pub fn full() -> String {
        format!(
            "{} (commit: {}, {}/{})",
            RELEASE,
            git_commit(),
            std::env::consts::OS,
            std::env::consts::ARCH,
        )
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle version subcommand before anything else.
    if let Command::Version = &cli.command {
        println!("quictrace {}", version::full());
        return Ok(());
    }

    let cfg = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    // Initialize tracing.
    let level = cfg.log_filter(cli.log_level.as_deref());
    let filter =
        EnvFilter::try_new(level).with_context(|| format!("invalid log level: {level}"))?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = cli.mode.unwrap_or(cfg.parse_mode);

    tracing::debug!(
        version = version::RELEASE,
        commit = version::git_commit(),
        ?mode,
        "starting quictrace",
    );

    match cli.command {
        Command::Report { file, json } => run_report(&cfg, mode, &file, json),
        Command::Print { file } => run_print(mode, &file),
        Command::Version => Ok(()),
    }
}

fn read_capture(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading capture {}", path.display()))
}

fn run_report(cfg: &Config, mode: ParseMode, path: &Path, json: bool) -> Result<()> {
    let data = read_capture(path)?;

    let mut state = TraceState::new(mode).with_trim_trailing(cfg.analysis.trim_trailing);
    let skipped = decode_capture(&data, mode, |evt| state.add_event(evt));
    state.finalize();

    if skipped > 0 {
        tracing::warn!(skipped, "some records could not be decoded");
    }

    let report = Report::build(&state, cfg);
    if json {
        let out = serde_json::to_string_pretty(&report).context("serializing report")?;
        println!("{out}");
    } else {
        print!("{report}");
    }

    Ok(())
}

fn run_print(mode: ParseMode, path: &Path) -> Result<()> {
    let data = read_capture(path)?;

    let mut count = 0u64;
    let skipped = decode_capture(&data, mode, |evt| {
        println!("{evt}");
        count += 1;
    });

    tracing::info!(events = count, skipped, "printed capture");

    Ok(())
}
