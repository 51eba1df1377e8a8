use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::{
    constant::{
        DEFAULT_ALERT_COOLDOWN_MINUTES, DEFAULT_ALERT_THRESHOLD_SOL, DEFAULT_EMERGENCY_STOP_FILE,
        DEFAULT_INACTIVITY_DAYS, DEFAULT_LEDGER_FILE, DEFAULT_MAX_SIGNATURES_PER_SCAN,
        DEFAULT_REQUEST_DELAY_MS, DEFAULT_SCAN_PAGE_SIZE, DEFAULT_WHITELIST_FILE,
    },
    error::ReclaimError,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub rpc: RpcConfig,
    #[serde(default)]
    pub operator: OperatorConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub sponsorship: SponsorshipConfig,
    #[serde(default)]
    pub reclaim: ReclaimConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Path to a JSON keypair file. When absent the key is read from the
    /// OPERATOR_PRIVATE_KEY environment variable (base58).
    pub keypair_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Signatures requested per history page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Delay between consecutive transaction fetches, in milliseconds.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Cumulative signature ceiling per scan. Omit to walk the entire
    /// history, however long that takes.
    #[serde(default = "default_max_signatures")]
    pub max_signatures: Option<u64>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_SCAN_PAGE_SIZE,
            request_delay_ms: DEFAULT_REQUEST_DELAY_MS,
            max_signatures: Some(DEFAULT_MAX_SIGNATURES_PER_SCAN),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SponsorshipConfig {
    /// Program ids whose presence marks a transaction as relayed sponsorship.
    #[serde(default)]
    pub program_ids: Vec<String>,
    /// Substrings matched against memo instruction text.
    #[serde(default)]
    pub memo_markers: Vec<String>,
    /// Known relay-node fee payer addresses.
    #[serde(default)]
    pub relay_nodes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReclaimConfig {
    #[serde(default = "default_true")]
    pub dry_run: bool,
    #[serde(default = "default_inactivity_days")]
    pub inactivity_days: u64,
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self { dry_run: true, inactivity_days: DEFAULT_INACTIVITY_DAYS }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_whitelist_file")]
    pub whitelist_file: String,
    #[serde(default = "default_emergency_stop_file")]
    pub emergency_stop_file: String,
    #[serde(default = "default_ledger_file")]
    pub ledger_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            whitelist_file: DEFAULT_WHITELIST_FILE.to_string(),
            emergency_stop_file: DEFAULT_EMERGENCY_STOP_FILE.to_string(),
            ledger_file: DEFAULT_LEDGER_FILE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_alert_threshold_sol")]
    pub threshold_sol: f64,
    #[serde(default = "default_alert_cooldown_minutes")]
    pub cooldown_minutes: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: None,
            threshold_sol: DEFAULT_ALERT_THRESHOLD_SOL,
            cooldown_minutes: DEFAULT_ALERT_COOLDOWN_MINUTES,
        }
    }
}

fn default_page_size() -> usize {
    DEFAULT_SCAN_PAGE_SIZE
}

fn default_request_delay_ms() -> u64 {
    DEFAULT_REQUEST_DELAY_MS
}

fn default_max_signatures() -> Option<u64> {
    Some(DEFAULT_MAX_SIGNATURES_PER_SCAN)
}

fn default_true() -> bool {
    true
}

fn default_inactivity_days() -> u64 {
    DEFAULT_INACTIVITY_DAYS
}

fn default_whitelist_file() -> String {
    DEFAULT_WHITELIST_FILE.to_string()
}

fn default_emergency_stop_file() -> String {
    DEFAULT_EMERGENCY_STOP_FILE.to_string()
}

fn default_ledger_file() -> String {
    DEFAULT_LEDGER_FILE.to_string()
}

fn default_alert_threshold_sol() -> f64 {
    DEFAULT_ALERT_THRESHOLD_SOL
}

fn default_alert_cooldown_minutes() -> u64 {
    DEFAULT_ALERT_COOLDOWN_MINUTES
}

impl Config {
    pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ReclaimError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ReclaimError::ConfigurationError(format!("Failed to read config file: {e}"))
        })?;

        let config: Config = toml::from_str(&contents).map_err(|e| {
            ReclaimError::ConfigurationError(format!("Failed to parse config file: {e}"))
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReclaimError> {
        if self.rpc.url.is_empty() {
            return Err(ReclaimError::ConfigurationError("rpc.url must not be empty".to_string()));
        }
        if self.scan.page_size == 0 || self.scan.page_size > 1000 {
            return Err(ReclaimError::ConfigurationError(
                "scan.page_size must be between 1 and 1000".to_string(),
            ));
        }
        if self.scan.max_signatures == Some(0) {
            return Err(ReclaimError::ConfigurationError(
                "scan.max_signatures must be positive; omit it to scan the full history"
                    .to_string(),
            ));
        }
        if self.reclaim.inactivity_days == 0 {
            return Err(ReclaimError::ConfigurationError(
                "reclaim.inactivity_days must be positive".to_string(),
            ));
        }
        if self.alerts.enabled && self.alerts.webhook_url.is_none() {
            return Err(ReclaimError::ConfigurationError(
                "alerts.webhook_url is required when alerts are enabled".to_string(),
            ));
        }
        Ok(())
    }
}
