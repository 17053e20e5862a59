//! `api-guard`: operator CLI for cloud API guard configuration.
//!
//! # Commands
//! - `check <CONFIG>`: load and validate a configuration file
//! - `match <CONFIG> <SERVICE> <OPERATION>`: show which limiter rule applies
//! - `schedule <CONFIG>`: print the nominal backoff schedule

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};

use cloud_api_guard::config::{load_config, GuardConfig};
use cloud_api_guard::observability::{logging, metrics};
use cloud_api_guard::throttle::ServiceLimiters;
use cloud_api_guard::{Backoff, TtlLruCache};

#[derive(Parser)]
#[command(name = "api-guard")]
#[command(about = "Inspect cache, backoff and rate limiter configuration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file
    Check {
        config: PathBuf,
        /// Print the effective configuration as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the limiter rule an operation resolves to
    Match {
        config: PathBuf,
        service: String,
        operation: String,
    },
    /// Print the backoff schedule without jitter
    Schedule { config: PathBuf },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config, json } => {
            let config = load(&config)?;
            let limiters = ServiceLimiters::from_config(&config.services)?;
            let cache = TtlLruCache::<String, String>::from_config(&config.cache)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
                return Ok(());
            }

            println!(
                "cache {:?}: capacity {}, ttl {:?}",
                cache.name(),
                cache.capacity(),
                cache.ttl()
            );
            println!(
                "backoff: {} attempts, worst case {:?}",
                config.backoff.steps,
                total(&Backoff::from_config(&config.backoff).schedule())
            );
            for name in limiters.names() {
                if let Some(service) = limiters.get(name) {
                    println!("service {}: {} rules", name, service.limiters().len());
                }
            }
            println!("OK");
        }
        Commands::Match {
            config,
            service,
            operation,
        } => {
            let config = load(&config)?;
            let limiters = ServiceLimiters::from_config(&config.services)?;
            println!("{}", describe_rule(&limiters, &service, &operation)?);
        }
        Commands::Schedule { config } => {
            let config = load(&config)?;
            for line in schedule_lines(&Backoff::from_config(&config.backoff)) {
                println!("{line}");
            }
        }
    }

    Ok(())
}

fn load(path: &Path) -> Result<GuardConfig, Box<dyn std::error::Error>> {
    let config = load_config(path)?;
    logging::init(&config.logging);

    if config.metrics.enabled {
        match config.metrics.address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(address = %config.metrics.address, error = %e, "Failed to parse metrics address"),
        }
    }

    tracing::info!(path = %path.display(), "Configuration loaded");
    Ok(config)
}

/// One line naming the rule `operation` resolves to within `service`.
fn describe_rule(
    limiters: &ServiceLimiters,
    service: &str,
    operation: &str,
) -> Result<String, String> {
    let limiter = limiters
        .get(service)
        .ok_or_else(|| format!("unknown service {service:?}"))?;

    Ok(match limiter.matching(operation) {
        Some(rule) => format!(
            "{operation}: patterns {:?}, refill {}/s, burst {}",
            rule.patterns(),
            rule.refill_rate(),
            rule.burst()
        ),
        None => format!("{operation}: not throttled"),
    })
}

fn schedule_lines(backoff: &Backoff) -> Vec<String> {
    let schedule = backoff.schedule();
    let mut lines: Vec<String> = schedule
        .iter()
        .enumerate()
        .map(|(i, delay)| {
            format!(
                "attempt {} → sleep {:?} (±{:.0}%)",
                i + 1,
                delay,
                backoff.jitter * 100.0
            )
        })
        .collect();
    lines.push(format!("attempt {} → give up", backoff.steps.max(1)));
    lines.push(format!("total {:?}", total(&schedule)));
    lines
}

fn total(schedule: &[Duration]) -> Duration {
    schedule.iter().fold(Duration::ZERO, |acc, d| acc.saturating_add(*d))
}
