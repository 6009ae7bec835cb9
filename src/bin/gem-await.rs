//! gem-await CLI
//!
//! Waits until freshly published gems are visible on a registry

use anyhow::Result;
use clap::Parser;
use gem_await::awaiters::AwaiterSelection;
use gem_await::core::{
    AwaitConfig, AwaitError, AwaitersConfig, ConfigLoadOptions, ConfigLoader, Deadline, HttpConfig,
    RetryManager,
};
use gem_await::orchestration::{AwaitReport, BatchAwaiter, WorkerStatus};
use gem_await::registry::HttpRegistryClient;
use gem_await::security::credentials::{api_key_from_env, filter_uri};
use gem_await::validation::IdentifierParser;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Wait until published gems are visible on a registry
#[derive(Parser)]
#[command(name = "gem-await")]
#[command(version)]
#[command(about = "Wait until published gems are visible on a registry", long_about = None)]
struct Cli {
    /// Gems to await, as NAME:VERSION[:PLATFORM]
    #[arg(value_name = "GEM")]
    gems: Vec<String>,

    /// Registry to poll (default: https://rubygems.org/)
    #[arg(short, long)]
    source: Option<String>,

    /// Give up after this many seconds (default: 300)
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Skip an awaiter, e.g. --skip names (repeatable)
    #[arg(long, value_name = "AWAITER")]
    skip: Vec<String>,

    /// Run an awaiter that is skipped by default: "full index", "pre index"
    /// or "dependency api". The two Marshal indexes are not supported by the
    /// HTTP client and abort at once, reporting their gems as missing.
    #[arg(long, value_name = "AWAITER")]
    include: Vec<String>,

    /// Run only the given awaiters (repeatable)
    #[arg(long, value_name = "AWAITER")]
    only: Vec<String>,

    /// Write downloaded .gem files to this directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Accept cached registry responses
    #[arg(long)]
    allow_cached: bool,

    /// Print the final report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Log every poll iteration
    #[arg(short, long, conflicts_with = "silent")]
    verbose: bool,

    /// Only log errors
    #[arg(long)]
    silent: bool,
}

impl Cli {
    /// Command line options as the highest priority config layer
    fn overrides(&self) -> AwaitConfig {
        let awaiters = (!self.only.is_empty()).then(|| AwaitersConfig {
            skip: None,
            only: Some(self.only.clone()),
        });
        let http = (self.cache_dir.is_some() || self.allow_cached).then(|| HttpConfig {
            request_timeout: None,
            bypass_cache: self.allow_cached.then_some(false),
            cache_dir: self.cache_dir.clone(),
        });

        AwaitConfig {
            source: self.source.clone(),
            timeout: self.timeout,
            awaiters,
            backoff: None,
            http,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(cli).await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            eprintln!("{}", e);
            if let Some(error) = e.downcast_ref::<AwaitError>() {
                for action in error.suggested_actions() {
                    eprintln!("  💡 {}", action);
                }
            }
            process::exit(1);
        }
    }
}

fn init_tracing(cli: &Cli) {
    let filter = if cli.silent {
        EnvFilter::new("error")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<i32> {
    let env: HashMap<String, String> = std::env::vars().collect();

    let config = ConfigLoader::load(ConfigLoadOptions {
        project_path: std::env::current_dir()?,
        home_dir: None,
        cli_args: Some(cli.overrides()),
        env: env.clone(),
    })
    .await?;

    let validation = ConfigLoader::validate(&config);
    if !validation.valid {
        eprintln!("{}", ConfigLoader::format_validation_result(&validation));
        return Ok(1);
    }
    for warning in &validation.warnings {
        warn!("[{}] {}", warning.field, warning.message);
    }

    let identifiers = IdentifierParser::new().parse_all(&cli.gems)?;
    let awaiters = AwaiterSelection::from_names(
        config.skip_list(),
        &cli.skip,
        &cli.include,
        config.only_list(),
    )?
    .resolve();

    let client = HttpRegistryClient::builder(config.source())
        .api_key(api_key_from_env(&env))
        .bypass_cache(config.bypass_cache())
        .request_timeout(config.request_timeout())
        .cache_dir(config.cache_dir())
        .build()?;

    let names: Vec<String> = identifiers.iter().map(|id| id.full_name()).collect();
    info!(
        "Awaiting {} on {}",
        names.join(", "),
        filter_uri(client.source())
    );

    let deadline = Deadline::after(config.timeout());
    let batch = BatchAwaiter::new(Arc::new(client), RetryManager::new(config.retry_options()));
    let report = batch.await_all(&identifiers, &awaiters, deadline).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !cli.silent {
        print_summary(&report);
    }

    Ok(if report.success { 0 } else { 1 })
}

fn print_summary(report: &AwaitReport) {
    println!("\n{}", "=".repeat(60));
    println!("📊 Await Summary");
    println!("{}", "=".repeat(60));

    for summary in &report.awaiters {
        let icon = match summary.status {
            WorkerStatus::Success => "✅",
            WorkerStatus::TimedOut => "⏱️ ",
            WorkerStatus::Aborted => "❌",
        };
        println!(
            "{} {:<16} {} iteration(s), {} missing",
            icon, summary.awaiter, summary.iterations, summary.missing
        );
        if let Some(error) = &summary.error {
            println!("   {}", error);
        }
    }

    if !report.missing.is_empty() {
        println!("\nMissing:");
        for name in report.missing_full_names() {
            println!("   - {}", name);
        }
    }

    println!("\n{}", "=".repeat(60));
    println!(
        "Overall Status: {} ({:.2}s)",
        if report.success { "✅ FOUND" } else { "❌ TIMED OUT" },
        report.elapsed_secs
    );
    println!("{}\n", "=".repeat(60));
}
