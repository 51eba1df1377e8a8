use clap::Parser;
use recapture_lib::log::LoggingFormat;

/// Global arguments used by all subcommands
#[derive(Debug, Parser)]
#[command(name = "recapture")]
pub struct GlobalArgs {
    /// Solana RPC endpoint URL (overrides the config file)
    #[arg(long, env = "RPC_URL")]
    pub rpc_url: Option<String>,

    /// Path to the recapture configuration file (TOML format)
    #[arg(long, default_value = "recapture.toml")]
    pub config: String,

    /// Output format for logs (standard or json)
    #[arg(long, default_value = "standard")]
    pub logging_format: LoggingFormat,
}
