// Admission Guard - Main Entry Point
//
// Command-line front end for the admission control library:
// - Configuration check (load, validate, print effective TOML)
// - Simulated workload through the full guarded call path

use admission_guard::token_budget::{estimate_tokens, DEFAULT_COMPLETION_ALLOWANCE};
use admission_guard::{AdmissionControl, AdmissionError, Completion, Config, Identity};
use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Config file read when --config is not given
const DEFAULT_CONFIG_FILE: &str = "admission-guard.toml";

/// Admission Guard: rate limits, token budgets and response caching for LLM calls
#[derive(Parser, Debug)]
#[command(name = "admission-guard")]
#[command(author = "Admission Guard Contributors")]
#[command(version)]
#[command(about = "In-process admission control for expensive model calls", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to a TOML config file (missing file means defaults)
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load and validate the configuration, then print it as TOML
    CheckConfig,
    /// Push a synthetic workload through admission control and print the decisions as JSON
    Simulate(SimulateArgs),
}

#[derive(ClapArgs, Debug)]
struct SimulateArgs {
    /// Number of requests to send
    #[arg(short = 'n', long, default_value_t = 20)]
    requests: u32,

    /// Send as an authenticated user instead of an anonymous session
    #[arg(long)]
    authenticated: bool,

    /// Tokens the fake upstream reports per call
    #[arg(long, default_value_t = 1500)]
    tokens_per_call: u64,

    /// Number of distinct inputs to cycle through (repeats hit the cache)
    #[arg(long, default_value_t = 5)]
    distinct_inputs: u32,

    /// Also print Prometheus metrics after the JSON report
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let config = Config::load_from_path(&args.config)
        .with_context(|| format!("Invalid configuration in {:?}", args.config))?;

    init_tracing(args.verbose, &config)?;

    match args.command {
        Some(Commands::CheckConfig) => {
            info!("Configuration is valid");
            print!("{}", config.to_toml()?);
        }
        Some(Commands::Simulate(opts)) => {
            simulate(config, opts).await?;
        }
        None => {
            info!("No command specified. Use \"admission-guard --help\" for usage.");
        }
    }

    Ok(())
}

/// Install the tracing subscriber; logs go to stderr so stdout stays parseable
fn init_tracing(verbose: bool, config: &Config) -> Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else {
        config.log_level()?
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr);

    match config.logging.format.to_lowercase().as_str() {
        "json" => builder.json().init(),
        "pretty" => builder.pretty().init(),
        _ => builder.compact().init(),
    }

    Ok(())
}

/// Stand-in for the expensive model call
async fn fake_upstream(prompt: String, tokens_used: u64) -> Result<Completion<String>> {
    Ok(Completion {
        value: format!("answer to {prompt}"),
        tokens_used,
    })
}

async fn simulate(config: Config, opts: SimulateArgs) -> Result<()> {
    let control: AdmissionControl<String> = AdmissionControl::new(config)?;
    control.start();

    let subject = Uuid::new_v4().to_string();
    let identity = if opts.authenticated {
        Identity::user(&subject)
    } else {
        Identity::session(&subject)
    };
    info!(identity = %identity, requests = opts.requests, "Starting simulation");

    let distinct = opts.distinct_inputs.max(1);
    let mut decisions = Vec::with_capacity(opts.requests as usize);

    for request in 0..opts.requests {
        let prompt = format!("question {}", request % distinct);
        let input = json!({ "question": { "value": prompt } });
        let estimate = estimate_tokens(&prompt, DEFAULT_COMPLETION_ALLOWANCE);

        let result = control
            .execute(&identity, &input, estimate, || {
                fake_upstream(prompt.clone(), opts.tokens_per_call)
            })
            .await;

        decisions.push(describe(request, result));
    }

    let snapshot = control.snapshot().await;
    let metrics = if opts.metrics {
        Some(control.gather_metrics().await?)
    } else {
        None
    };
    control.shutdown().await;

    let report = json!({
        "identity": identity,
        "decisions": decisions,
        "snapshot": snapshot,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(metrics) = metrics {
        print!("{metrics}");
    }

    Ok(())
}

fn describe(request: u32, result: Result<admission_guard::Admitted<String>, AdmissionError>) -> Value {
    match result {
        Ok(admitted) => json!({
            "request": request,
            "outcome": if admitted.cached { "cached" } else { "called" },
            "tokens_used": admitted.tokens_used,
        }),
        Err(err) => {
            let outcome = match &err {
                AdmissionError::RateLimited { .. } => "rate_limited",
                AdmissionError::BudgetExceeded(_) => "budget_exceeded",
                AdmissionError::Upstream(_) => "upstream_error",
            };
            json!({
                "request": request,
                "outcome": outcome,
                "retry_after_secs": err.retry_after_secs(),
                "error": err.to_string(),
            })
        }
    }
}
