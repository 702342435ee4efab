//! FastGets main entry point
//!
//! This is the command-line interface for the FastGets crawl engine.

use anyhow::Context;
use clap::Parser;
use fastgets::config::{load_config_with_hash, Config};
use fastgets::http::{build_http_client, HttpShared};
use fastgets::output::{MarkdownWriter, ResultBuffer, SqliteWriter};
use fastgets::template::SeedListTemplate;
use fastgets::{HaltReason, Instance, LocalEngine, RunReport};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

/// FastGets: a concurrent crawl-and-process engine
///
/// FastGets loads seed URLs from a config file, crawls them on a pool of
/// worker threads under per-category rate limits, and saves the processed
/// pages to SQLite and a markdown summary.
#[derive(Parser, Debug)]
#[command(name = "fastgets")]
#[command(version)]
#[command(about = "A concurrent crawl-and-process engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Override the number of worker threads
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=100))]
    threads: Option<u16>,

    /// Single worker; stop at the first task error
    #[arg(long)]
    testing: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(threads) = cli.threads {
        config.engine.thread_num = threads as usize;
    }
    if cli.testing {
        config.engine.testing = true;
    }

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let report = handle_run(config, config_hash)?;
    print_report(&report);

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("fastgets=info,warn"),
            1 => EnvFilter::new("fastgets=debug,info"),
            2 => EnvFilter::new("fastgets=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the settings and seeds that would be used
fn handle_dry_run(config: &Config) {
    println!("=== FastGets Dry Run ===\n");

    println!("Engine:");
    println!(
        "  Worker threads: {}{}",
        config.engine.effective_thread_num(),
        if config.engine.testing {
            " (testing mode)"
        } else {
            ""
        }
    );
    println!("  Idle sleep: {}ms", config.engine.idle_sleep_ms);
    println!("  Poll interval: {}ms", config.engine.poll_interval_ms);
    println!("  Drain delay: {}ms", config.engine.drain_delay_ms);
    println!("  Seed wait: {}ms", config.engine.seed_wait_ms);

    println!("\nHTTP:");
    println!("  User agent: {}", fastgets::http::user_agent(&config.user_agent));
    println!("  Request timeout: {}s", config.http.request_timeout_secs);
    println!("  Max depth: {}", config.http.max_depth);
    println!("  Same domain only: {}", config.http.same_domain_only);

    println!("\nOutput:");
    match &config.output {
        Some(output) => {
            if let Some(path) = &output.database_path {
                println!("  Database: {}", path);
            }
            if let Some(path) = &output.summary_path {
                println!("  Summary: {}", path);
            }
        }
        None => println!("  (none)"),
    }

    println!("\nSeeds ({}):", config.seed.len());
    for seed in &config.seed {
        match &seed.rate_limit {
            Some(limit) => println!(
                "  - {} [{}] {}: {}/s",
                seed.url, seed.func_name, limit.category, limit.per_second
            ),
            None => println!("  - {} [{}]", seed.url, seed.func_name),
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main run: wires template and writers, runs the engine on its
/// own thread and halts it on Ctrl-C
fn handle_run(config: Config, config_hash: String) -> anyhow::Result<RunReport> {
    let results = ResultBuffer::new();
    let client = build_http_client(&config.user_agent, config.http.request_timeout())
        .context("failed to build HTTP client")?;
    let shared = Arc::new(HttpShared::new(client, results.clone(), &config.http));
    let template = Arc::new(SeedListTemplate::new(config.seed.clone(), shared));

    let mut engine = LocalEngine::new(config.engine.clone(), template);
    if let Some(output) = &config.output {
        if let Some(path) = &output.database_path {
            engine.add_writer(Box::new(SqliteWriter::new(
                path,
                config_hash.clone(),
                results.clone(),
            )));
        }
        if let Some(path) = &output.summary_path {
            engine.add_writer(Box::new(MarkdownWriter::new(path, results.clone())));
        }
    }

    let instance = engine.instance();
    tracing::info!(
        instance = instance.id(),
        seeds = config.seed.len(),
        "Starting run"
    );

    let (done_tx, done_rx) = oneshot::channel();
    thread::Builder::new()
        .name("fastgets-engine".to_string())
        .spawn(move || {
            let _ = done_tx.send(engine.run());
        })
        .context("failed to start engine thread")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    let outcome = runtime.block_on(supervise(done_rx, &instance))?;

    match outcome {
        Ok(report) => Ok(report),
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            Err(e.into())
        }
    }
}

/// Waits for the engine to finish, halting the instance on Ctrl-C
async fn supervise(
    mut done: oneshot::Receiver<fastgets::Result<RunReport>>,
    instance: &Instance,
) -> anyhow::Result<fastgets::Result<RunReport>> {
    tokio::select! {
        result = &mut done => {
            return result.context("engine thread exited without a result");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            tracing::warn!("Interrupt received, finishing in-flight tasks");
            instance.halt(HaltReason::Interrupted);
        }
    }

    done.await.context("engine thread exited without a result")
}

fn print_report(report: &RunReport) {
    let reason = report
        .halt_reason
        .map(|r| r.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    println!("\n=== Run {} ===", report.instance_id);
    println!("  Halt reason: {}", reason);
    if let Some(duration) = report.duration_seconds() {
        println!("  Duration: {:.2}s", duration);
    }
    println!(
        "  Tasks: {} seeded, {} discovered, {} executed",
        report.seeded,
        report.discovered,
        report.stats.executed()
    );
    println!(
        "  Outcomes: {} succeeded, {} crawl errors, {} process errors",
        report.stats.succeeded, report.stats.crawl_errors, report.stats.process_errors
    );
    println!("  Rate limit deferrals: {}", report.stats.rate_limited);
    if report.unprocessed > 0 {
        println!("  Left unprocessed: {}", report.unprocessed);
    }
}
