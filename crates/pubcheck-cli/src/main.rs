use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{ArgAction, Parser};
use pubcheck_core::orchestrator::RunOutcome;
use pubcheck_core::{Config, ConfigError, HtmlSearch, config_file};
use pubcheck_ingest::IngestError;
use pubcheck_reporting::{Report, ReportError};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod output;

use output::ColorMode;

/// Exit code for a run stopped with Ctrl-C (after the report was saved).
const EXIT_INTERRUPTED: u8 = 130;

/// Check manuscript titles for prior publication using a web search engine
#[derive(Parser, Debug)]
#[command(name = "pubcheck", version, about, long_about = None)]
struct Cli {
    /// A manuscript title, or a CSV / TSV / spreadsheet file of manuscripts
    input: Option<String>,

    /// Minimum partial match score (0-100) for a result to be reported
    #[arg(long)]
    threshold: Option<f64>,

    /// Only score the first N results of each search
    #[arg(long, value_name = "N")]
    top: Option<usize>,

    /// Pause between searches, in milliseconds
    #[arg(long, value_name = "MS")]
    throttle_ms: Option<u64>,

    /// Per-request timeout, in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Only report results whose title contains the manuscript title
    #[arg(long)]
    require_containment: bool,

    /// Do not write the spreadsheet report
    #[arg(long)]
    no_xlsx: bool,

    /// Directory for the spreadsheet report
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// File name prefix for the spreadsheet report
    #[arg(long)]
    prefix: Option<String>,

    /// Leave the Authors and Manuscript Type columns out of the report
    #[arg(long)]
    no_details: bool,

    /// Read settings from this TOML file (on top of the default config files)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Suppress progress and summary output
    #[arg(short, long)]
    quiet: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Dry run: print the titles that would be searched, without searching
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version land here too
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let color = ColorMode(!cli.no_color && std::io::stderr().is_terminal());
    init_tracing(cli.verbose, color);

    match check(cli, color).await {
        Ok(RunOutcome::Completed) => ExitCode::SUCCESS,
        Ok(RunOutcome::Cancelled) => ExitCode::from(EXIT_INTERRUPTED),
        Err(err) => {
            report_error(&err, color);
            ExitCode::from(exit_code(&err))
        }
    }
}

fn init_tracing(verbose: u8, color: ColorMode) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| level.to_string());

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(color.enabled())
                .with_target(false),
        )
        .init();
}

/// Map a top-level failure to the process exit code.
///
/// 1: bad or missing argument, bad configuration, unreadable input.
/// 2: input file of an unsupported type or layout.
/// 3: the report could not be written.
fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(e) = err.downcast_ref::<IngestError>() {
        e.exit_code() as u8
    } else if err.downcast_ref::<ReportError>().is_some() {
        3
    } else {
        1
    }
}

fn report_error(err: &anyhow::Error, color: ColorMode) {
    use owo_colors::OwoColorize;

    let mut stderr = std::io::stderr().lock();
    let _ = if color.enabled() {
        writeln!(stderr, "{} {:#}", "error:".red().bold(), err)
    } else {
        writeln!(stderr, "error: {:#}", err)
    };
}

/// Layer the configuration: defaults, platform file, `./.pubcheck.toml`,
/// `--config`, then flags.
fn resolve_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut config = Config::default();
    config_file::load_config()?.apply(&mut config);
    if let Some(path) = &cli.config {
        config_file::load_required(path)?.apply(&mut config);
    }

    if let Some(threshold) = cli.threshold {
        config.matching.threshold = threshold;
    }
    if cli.top.is_some() {
        config.matching.top_n = cli.top;
    }
    if cli.require_containment {
        config.matching.require_containment = true;
    }
    if let Some(ms) = cli.throttle_ms {
        config.throttle = Duration::from_millis(ms);
    }
    if let Some(secs) = cli.timeout {
        config.search.timeout = Duration::from_secs(secs);
    }
    if cli.no_xlsx {
        config.output.spreadsheet = false;
    }
    if let Some(dir) = &cli.output_dir {
        config.output.directory = dir.clone();
    }
    if let Some(prefix) = &cli.prefix {
        config.output.prefix = prefix.clone();
    }
    if cli.no_details {
        config.output.include_details = false;
    }

    config.validate()?;
    Ok(config)
}

async fn check(cli: Cli, color: ColorMode) -> anyhow::Result<RunOutcome> {
    let config = resolve_config(&cli)?;
    tracing::debug!(?config, "resolved configuration");

    let input = cli.input.as_deref().unwrap_or("");
    let records = pubcheck_ingest::normalize(input, &config.columns)?;

    if cli.dry_run {
        let mut stdout = std::io::stdout().lock();
        output::print_records(&mut stdout, &records, color)?;
        return Ok(RunOutcome::Completed);
    }

    if records.is_empty() {
        if !cli.quiet {
            eprintln!("No titles to check.");
        }
        return Ok(RunOutcome::Completed);
    }

    let backend = HtmlSearch::new(&config.search)?;
    let mut report = Report::open(&config.output, Box::new(std::io::stdout()))?;

    let quiet = cli.quiet;
    let progress = move |event: pubcheck_core::ProgressEvent| {
        if quiet {
            return;
        }
        let mut stderr = std::io::stderr().lock();
        let _ = output::print_progress(&mut stderr, &event, color);
        let _ = stderr.flush();
    };

    let cancel = CancellationToken::new();

    // Set up Ctrl+C handler
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, finishing the report");
            cancel_clone.cancel();
        }
    });

    let summary = pubcheck_core::run(&records, &backend, &config, &mut report, progress, &cancel)
        .await
        .context("run aborted")?;
    let outcome = report.finalize()?;

    if !quiet {
        let mut stderr = std::io::stderr().lock();
        output::print_summary(&mut stderr, &summary, &outcome, color)?;
    }
    Ok(summary.outcome)
}
