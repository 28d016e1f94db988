//! # Cache Configuration Validator
//!
//! Command-line tool for validating cache configuration before deploying.
//! Loads the same layers the library does (environment preset, optional file,
//! `ITEMS_CACHE__*` variables), validates them, and prints the effective
//! settings.

use anyhow::Context;
use clap::Parser;
use items_cache::config::{CacheConfig, ConfigManager};
use std::path::PathBuf;
use std::process;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate items cache configuration")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file to layer over the environment preset
    config: Option<PathBuf>,

    /// Environment preset (development, test, production)
    #[arg(short, long)]
    environment: Option<String>,

    /// Output format (table, json)
    #[arg(long, default_value = "json")]
    format: String,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    if let Err(err) = run(&cli) {
        error!("Configuration validation failed: {err:#}");
        eprintln!("❌ {err:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let manager = match &cli.environment {
        Some(environment) => ConfigManager::load_with_env(cli.config.clone(), environment),
        None => match &cli.config {
            Some(path) => ConfigManager::load_from_file(path),
            None => ConfigManager::load(),
        },
    }
    .context("failed to load configuration")?;

    match cli.format.as_str() {
        "json" => {
            let output = serde_json::json!({
                "environment": manager.environment(),
                "config_path": manager.config_path().map(|path| path.display().to_string()),
                "config": manager.debug_config(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        "table" => print_table(manager.environment(), &manager.config()),
        other => anyhow::bail!("unsupported output format '{other}' (expected json or table)"),
    }

    Ok(())
}

fn print_table(environment: &str, config: &CacheConfig) {
    println!("✅ Configuration valid for environment '{environment}'");
    println!("{:<32} {}", "refresh.interval_ms", config.refresh.interval_ms);
    println!("{:<32} {:?}", "refresh.cursor_policy", config.refresh.cursor_policy);
    println!("{:<32} {}", "retry.max_attempts", config.retry.max_attempts);
    println!("{:<32} {}", "retry.initial_delay_ms", config.retry.initial_delay_ms);
    println!("{:<32} {}", "retry.max_delay_ms", config.retry.max_delay_ms);
    println!(
        "{:<32} {}",
        "retry.operation_timeout_ms", config.retry.operation_timeout_ms
    );
}
