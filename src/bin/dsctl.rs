use std::path::PathBuf;
use std::process::ExitCode;

use cdsync::config::{Config, DEFAULT_CONFIG_PATH};
use cdsync::report::{Outcome, format_dnskey_listing, format_ds_listing};
use cdsync::telemetry::{self, Verbosity};
use cdsync::{Controller, RunOptions, SyncContext, SyncError};
use clap::{Parser, Subcommand};

/// Manage the DS records of one domain by hand.
#[derive(Debug, Parser)]
#[command(name = "dsctl", version, about)]
struct Args {
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

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

    domain: String,

    #[command(subcommand)]
    action: Option<Action>,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// DS records held by the registry (default)
    #[command(alias = "listds")]
    List,
    /// DNSKEY records published in DNS
    Listkeys,
    /// Both listings
    Listall,
    /// Add a DS derived from the DNSKEY with KEYTAG
    Add {
        #[arg(value_parser = clap::value_parser!(u16).range(1..))]
        keytag: Option<u16>,
    },
    /// Delete the DS with KEYTAG
    Delete {
        #[arg(value_parser = clap::value_parser!(u16).range(1..))]
        keytag: Option<u16>,
    },
}

async fn print_ds(controller: &Controller, domain: &str) -> Result<(), SyncError> {
    println!("Listing DS records in the registry for domain {}", domain);
    println!("{}", format_ds_listing(&controller.list_ds(domain).await?));
    Ok(())
}

async fn print_dnskeys(controller: &Controller, domain: &str) -> Result<(), SyncError> {
    println!("Listing DNSKEY records in DNS for domain {}", domain);
    println!("{}", format_dnskey_listing(&controller.list_dnskeys(domain).await?));
    Ok(())
}

async fn dispatch(
    controller: &Controller,
    domain: &str,
    action: Action,
) -> Result<bool, SyncError> {
    let report = match action {
        Action::List => return print_ds(controller, domain).await.map(|_| true),
        Action::Listkeys => return print_dnskeys(controller, domain).await.map(|_| true),
        Action::Listall => {
            print_ds(controller, domain).await?;
            println!();
            print_dnskeys(controller, domain).await?;
            return Ok(true);
        }
        Action::Add { keytag: None } => {
            println!("Warning: no keytag was supplied for addition");
            print_dnskeys(controller, domain).await?;
            return Ok(true);
        }
        Action::Delete { keytag: None } => {
            println!("Warning: no keytag was supplied for deletion");
            print_ds(controller, domain).await?;
            return Ok(true);
        }
        Action::Add {
            keytag: Some(keytag),
        } => controller.add_keytag(domain, keytag).await?,
        Action::Delete {
            keytag: Some(keytag),
        } => controller.delete_keytag(domain, keytag).await?,
    };

    println!("{}", report);
    match report.outcome {
        Outcome::Created { .. } => {
            println!("Note that it may take some time for the DS record to appear in DNS.");
            Ok(true)
        }
        Outcome::AlreadyPresent { .. } | Outcome::Failed { .. } => Ok(false),
        Outcome::Deleted { .. } | Outcome::DryRun { .. } | Outcome::Aborted => Ok(true),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    telemetry::init(Verbosity::from_flags(args.verbose, args.debug));

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let account = config.account_number.clone();
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

    let domain = args.domain.trim_end_matches('.').to_string();
    match controller.domain_in_account(&domain).await {
        Ok(true) => {}
        Ok(false) => {
            eprintln!("Error: {} does not exist in this account ({})", domain, account);
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("Error: cannot check {} in this account ({}): {}", domain, account, e);
            return ExitCode::FAILURE;
        }
    }

    match dispatch(&controller, &domain, args.action.unwrap_or(Action::List)).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
