mod args;

use std::{str::FromStr, sync::Arc, time::Duration};

use args::GlobalArgs;
use clap::{Parser, Subcommand};
use recapture_lib::{
    constant::lamports_to_sol,
    error::ReclaimError,
    gateway::SolanaRpcGateway,
    ledger::{Ledger, Metrics},
    log::LoggingFormat,
    rpc::get_rpc_client,
    safety::SafetyGate,
    scanner::Scanner,
    signer::load_operator_keypair,
    Config, ReclaimPipeline,
};
use solana_sdk::pubkey::Pubkey;

#[derive(Subcommand)]
enum Commands {
    /// Scan the operator's history for sponsored accounts
    Scan {
        /// Only derive and check accounts for these mints instead of
        /// replaying history
        #[arg(long, value_delimiter = ',')]
        mints: Vec<String>,
    },
    /// Run one full scan, audit and reclaim cycle
    Cycle,
    /// Reclaim a single account
    ReclaimAccount {
        /// Address of the account to close
        account: String,
    },
    /// Show the metrics snapshot
    Stats,
    /// Show recent ledger entries
    Logs {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Whitelist management
    Whitelist {
        #[command(subcommand)]
        whitelist_command: WhitelistCommands,
    },
    /// Emergency stop control
    EmergencyStop {
        #[command(subcommand)]
        stop_command: EmergencyStopCommands,
    },
    /// Run reclaim cycles on an interval until interrupted
    Run {
        /// Time between cycles, e.g. 6h or 30m
        #[arg(long, default_value = "6h")]
        interval: String,
    },
}

#[derive(Subcommand)]
enum WhitelistCommands {
    /// Protect an account from reclaim
    Add {
        account: String,
        /// Treat the address as an owner wallet instead of a single account
        #[arg(long, default_value_t = false)]
        owner: bool,
    },
    /// Remove an account from the whitelist
    Remove {
        account: String,
        #[arg(long, default_value_t = false)]
        owner: bool,
    },
    /// List whitelisted accounts and owners
    List,
}

#[derive(Subcommand)]
enum EmergencyStopCommands {
    /// Halt all reclaim execution
    Enable {
        #[arg(long, default_value = "Manual emergency stop")]
        reason: String,
    },
    /// Resume reclaim execution
    Disable,
    /// Show the current stop state
    Status,
}

#[derive(Parser)]
#[command(author, version, about = "Recapture - automated rent reclaim for fee payers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    pub global_args: GlobalArgs,
}

#[tokio::main]
async fn main() -> Result<(), ReclaimError> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::load_config(&cli.global_args.config).unwrap_or_else(|e| {
        print_error(&format!("Failed to load config: {e}"));
        std::process::exit(1);
    });
    if let Some(rpc_url) = &cli.global_args.rpc_url {
        config.rpc.url = rpc_url.clone();
    }

    setup_logging(&cli.global_args.logging_format);

    let Some(command) = cli.command else {
        println!("No command specified. Use --help for usage information.");
        println!("Available commands:");
        println!("  scan             - Scan history for sponsored accounts");
        println!("  cycle            - Run one scan/audit/reclaim cycle");
        println!("  reclaim-account  - Reclaim a single account");
        println!("  stats            - Show metrics");
        println!("  logs             - Show recent ledger entries");
        println!("  whitelist        - Manage the whitelist");
        println!("  emergency-stop   - Toggle the emergency stop");
        println!("  run              - Reclaim cycles on an interval");
        return Ok(());
    };

    match command {
        Commands::Scan { mints } => {
            let pipeline = build_pipeline(&config);
            println!("Mode: {}", if config.reclaim.dry_run { "DRY RUN" } else { "LIVE" });

            let accounts = if mints.is_empty() {
                let outcome = pipeline.run_scan().await?;
                println!("Total sponsored accounts: {}", outcome.accounts_found);
                return Ok(());
            } else {
                let mints = parse_pubkeys(&mints)?;
                pipeline.discover_for_mints(&mints).await?
            };

            let stats = Scanner::sponsorship_stats(&accounts);
            println!("Total sponsored accounts: {}", stats.total);
            println!("  Confidently classified: {}", stats.confident);
            println!("  Fee-payer fallback:     {}", stats.fallback);
            for account in &accounts {
                println!(
                    "  {} rent {:.6} SOL",
                    account.address,
                    lamports_to_sol(account.rent_lamports)
                );
            }
        }
        Commands::Cycle => {
            let pipeline = build_pipeline(&config);
            println!("Mode: {}", if config.reclaim.dry_run { "DRY RUN" } else { "LIVE" });

            match pipeline.run_reclaim_cycle().await {
                Ok(summary) => print_cycle_summary(&summary, config.reclaim.dry_run),
                Err(ReclaimError::EmergencyStop(reason)) => {
                    println!("Emergency stop is active: {reason}");
                    println!("Skipping reclaim cycle");
                }
                Err(e) => {
                    print_error(&format!("Reclaim cycle failed: {e}"));
                    std::process::exit(1);
                }
            }
        }
        Commands::ReclaimAccount { account } => {
            let pipeline = build_pipeline(&config);
            println!("Mode: {}", if config.reclaim.dry_run { "DRY RUN" } else { "LIVE" });

            let address = Pubkey::from_str(&account)
                .map_err(|e| ReclaimError::ValidationError(format!("Invalid account: {e}")))?;
            let result = pipeline.reclaim_single(&address).await;

            if result.success {
                println!(
                    "Success: reclaimed {:.6} SOL",
                    lamports_to_sol(result.reclaimed_lamports)
                );
                if let Some(signature) = result.signature {
                    println!("Signature: {signature}");
                }
            } else {
                println!("Failed: {}", result.error.unwrap_or_default());
                std::process::exit(1);
            }
        }
        Commands::Stats => {
            let ledger = Ledger::open(&config.storage.ledger_file);
            print_metrics(&ledger.snapshot());
        }
        Commands::Logs { limit } => {
            let ledger = Ledger::open(&config.storage.ledger_file);
            for entry in ledger.recent_entries(limit) {
                match serde_json::to_string(&entry) {
                    Ok(line) => println!("{line}"),
                    Err(e) => print_error(&format!("Failed to render entry: {e}")),
                }
            }
        }
        Commands::Whitelist { whitelist_command } => {
            let safety = SafetyGate::from_config(&config.storage);
            match whitelist_command {
                WhitelistCommands::Add { account, owner } => {
                    let address = Pubkey::from_str(&account).map_err(|e| {
                        ReclaimError::ValidationError(format!("Invalid account: {e}"))
                    })?;
                    let added = if owner {
                        safety.add_owner(&address)?
                    } else {
                        safety.add_account(&address)?
                    };
                    if added {
                        println!("Added {account} to whitelist");
                    } else {
                        println!("{account} already in whitelist");
                    }
                }
                WhitelistCommands::Remove { account, owner } => {
                    let address = Pubkey::from_str(&account).map_err(|e| {
                        ReclaimError::ValidationError(format!("Invalid account: {e}"))
                    })?;
                    let removed = if owner {
                        safety.remove_owner(&address)?
                    } else {
                        safety.remove_account(&address)?
                    };
                    if removed {
                        println!("Removed {account} from whitelist");
                    } else {
                        println!("{account} not found in whitelist");
                    }
                }
                WhitelistCommands::List => {
                    let whitelist = safety.whitelist();
                    println!("Whitelisted accounts ({}):", whitelist.accounts.len());
                    for account in &whitelist.accounts {
                        println!("  {account}");
                    }
                    println!("Whitelisted owners ({}):", whitelist.owners.len());
                    for owner in &whitelist.owners {
                        println!("  {owner}");
                    }
                }
            }
        }
        Commands::EmergencyStop { stop_command } => {
            let safety = SafetyGate::from_config(&config.storage);
            match stop_command {
                EmergencyStopCommands::Enable { reason } => {
                    safety.set_stopped(&reason)?;
                    println!("Emergency stop ENABLED: {reason}");
                }
                EmergencyStopCommands::Disable => {
                    safety.clear_stopped()?;
                    println!("Emergency stop DISABLED");
                }
                EmergencyStopCommands::Status => {
                    let state = safety.emergency_stop();
                    println!("Stopped:    {}", state.stopped);
                    println!(
                        "Stopped at: {}",
                        state
                            .stopped_at
                            .map(|ms| ms.to_string())
                            .unwrap_or_else(|| "n/a".to_string())
                    );
                    println!(
                        "Reason:     {}",
                        if state.reason.is_empty() { "n/a" } else { &state.reason }
                    );
                }
            }
        }
        Commands::Run { interval } => {
            let pipeline = build_pipeline(&config);
            let cycle_duration = humantime::parse_duration(&interval).unwrap_or_else(|e| {
                print_error(&format!("Invalid interval {interval}: {e}"));
                std::process::exit(1);
            });

            println!("Recapture daemon starting");
            println!("  Interval: {interval}");
            println!("  Dry run:  {}", config.reclaim.dry_run);

            loop {
                match pipeline.run_reclaim_cycle().await {
                    Ok(summary) => print_cycle_summary(&summary, config.reclaim.dry_run),
                    Err(ReclaimError::EmergencyStop(reason)) => {
                        log::warn!("Emergency stop is active, skipping cycle: {reason}");
                    }
                    Err(e) => log::error!("Reclaim cycle failed: {e}"),
                }

                sleep_through(cycle_duration).await;
            }
        }
    }

    Ok(())
}

fn build_pipeline(config: &Config) -> ReclaimPipeline {
    let operator = Arc::new(load_operator_keypair(&config.operator).unwrap_or_else(|e| {
        print_error(&format!("Failed to load operator keypair: {e}"));
        std::process::exit(1);
    }));
    let gateway = Arc::new(SolanaRpcGateway::new(get_rpc_client(&config.rpc.url)));
    ReclaimPipeline::new(config, gateway, operator)
}

async fn sleep_through(duration: Duration) {
    log::info!("Sleeping {}s until the next cycle", duration.as_secs());
    tokio::time::sleep(duration).await;
}

fn parse_pubkeys(values: &[String]) -> Result<Vec<Pubkey>, ReclaimError> {
    values
        .iter()
        .map(|value| {
            Pubkey::from_str(value)
                .map_err(|e| ReclaimError::ValidationError(format!("Invalid pubkey {value}: {e}")))
        })
        .collect()
}

fn print_cycle_summary(summary: &recapture_lib::ledger::CycleSummary, dry_run: bool) {
    println!("Cycle summary:");
    println!("  Accounts scanned:       {}", summary.scanned);
    println!("  Eligible for reclaim:   {}", summary.eligible);
    println!("  Successfully reclaimed: {}", summary.reclaimed);
    println!(
        "  Total SOL {}: {:.6}",
        if dry_run { "simulated" } else { "reclaimed" },
        lamports_to_sol(summary.total_lamports)
    );
}

fn print_metrics(metrics: &Metrics) {
    println!("Recapture statistics");
    println!("  Rent locked:        {:.6} SOL", lamports_to_sol(metrics.total_rent_locked));
    println!("  Reclaimable:        {:.6} SOL", lamports_to_sol(metrics.reclaimable_lamports));
    println!("  Accounts monitored: {}", metrics.accounts_monitored);
    println!("  Total reclaimed:    {:.6} SOL", lamports_to_sol(metrics.total_reclaimed));
    println!("  Accounts reclaimed: {}", metrics.accounts_reclaimed);
    println!(
        "  Last scan:          {}",
        metrics.last_scan_time.map(|ms| ms.to_string()).unwrap_or_else(|| "never".to_string())
    );
}

fn print_error(message: &str) {
    eprintln!("Error: {message}");
}

fn setup_logging(format: &LoggingFormat) {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());

    let subscriber = tracing_subscriber::fmt().with_env_filter(env_filter);
    match format {
        LoggingFormat::Standard => subscriber.init(),
        LoggingFormat::Json => subscriber.json().init(),
    }
}
