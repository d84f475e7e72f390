use std::path::PathBuf;
use std::process::ExitCode;

use cdsync::config::{Config, DEFAULT_CONFIG_PATH};
use cdsync::telemetry::{self, Verbosity};
use cdsync::{Controller, RunOptions, SyncContext};
use clap::Parser;
use tracing::{error, info};

/// Keep the registry's DS records in line with the CDS records a zone publishes.
#[derive(Debug, Parser)]
#[command(name = "cdsync", version, about)]
struct Args {
    /// Configuration file
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Report what would change without touching the registry
    #[arg(long = "dry-run", alias = "dryrun")]
    dry_run: bool,

    /// Skip confirmation prompts
    #[arg(long)]
    force: bool,

    #[arg(long)]
    verbose: bool,

    /// Debug output (implies --verbose)
    #[arg(long)]
    debug: bool,

    /// Domain to process; every domain in the account when omitted
    domain: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    telemetry::init(Verbosity::from_flags(args.verbose, args.debug));

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("Configuration loaded from {}", args.config.display());

    let ctx = match SyncContext::from_config(config) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let controller = Controller::new(
        ctx,
        RunOptions {
            dry_run: args.dry_run,
            force: args.force,
        },
    );

    let domain = args.domain.as_deref().map(|d| d.trim_end_matches('.'));
    match controller.run(domain).await {
        Ok(summary) => {
            for report in &summary.reports {
                println!("{}", report);
            }
            let failed = summary.failed_domains();
            if !failed.is_empty() {
                info!("{} domain(s) reported errors: {}", failed.len(), failed.join(", "));
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: error fetching domains from API: {}", e);
            ExitCode::FAILURE
        }
    }
}
