pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

// Scanner pacing
pub const DEFAULT_SCAN_PAGE_SIZE: usize = 1000;
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 100;
pub const DEFAULT_MAX_SIGNATURES_PER_SCAN: u64 = 5000;

// Auditor
pub const DEFAULT_INACTIVITY_DAYS: u64 = 30;

// Persisted state
pub const DEFAULT_WHITELIST_FILE: &str = "data/whitelist.json";
pub const DEFAULT_EMERGENCY_STOP_FILE: &str = "data/emergency.json";
pub const DEFAULT_LEDGER_FILE: &str = "data/ledger.jsonl";

// Alerts
pub const DEFAULT_ALERT_THRESHOLD_SOL: f64 = 10.0;
pub const DEFAULT_ALERT_COOLDOWN_MINUTES: u64 = 60;

// Operator key
pub const OPERATOR_PRIVATE_KEY_ENV: &str = "OPERATOR_PRIVATE_KEY";

// Ledger sentinel for entries not tied to a single account
pub const LEDGER_NO_ACCOUNT: &str = "none";
