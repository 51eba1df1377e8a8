use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::constant::LEDGER_NO_ACCOUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerAction {
    Scan,
    Audit,
    Reclaim,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerStatus {
    Success,
    Failure,
    Skipped,
}

/// One append-only record of a pipeline action. Entries are never mutated or
/// deleted; the metrics snapshot is derived from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub timestamp: i64,
    pub account: String,
    pub action: LedgerAction,
    pub status: LedgerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lamports: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl LedgerEntry {
    pub fn new(action: LedgerAction, status: LedgerStatus) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
            account: LEDGER_NO_ACCOUNT.to_string(),
            action,
            status,
            lamports: None,
            reason: None,
            signature: None,
        }
    }

    pub fn for_account(account: &Pubkey, action: LedgerAction, status: LedgerStatus) -> Self {
        let mut entry = Self::new(action, status);
        entry.account = account.to_string();
        entry
    }

    pub fn with_lamports(mut self, lamports: u64) -> Self {
        self.lamports = Some(lamports);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }
}

/// Running totals derived from ledger entries. A cache over the ledger: the
/// in-memory counters reset on restart while the JSONL file is durable.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub total_rent_locked: u64,
    pub reclaimable_lamports: u64,
    pub accounts_monitored: u64,
    pub total_reclaimed: u64,
    pub accounts_reclaimed: u64,
    pub last_scan_time: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub scanned: u64,
    pub eligible: u64,
    pub reclaimed: u64,
    pub total_lamports: u64,
}

#[derive(Serialize)]
struct CycleRecord {
    timestamp: i64,
    #[serde(rename = "type")]
    kind: &'static str,
    scanned: u64,
    eligible: u64,
    reclaimed: u64,
    #[serde(rename = "totalAmount")]
    total_amount: u64,
}

struct LedgerInner {
    entries: Vec<LedgerEntry>,
    metrics: Metrics,
}

/// Append-only JSONL event log plus the in-memory metrics cache. Constructed
/// once per process and shared by every pipeline stage.
pub struct Ledger {
    path: PathBuf,
    inner: RwLock<LedgerInner>,
}

impl Ledger {
    /// Open the ledger at `path`, reloading prior entries. Corrupt lines are
    /// skipped rather than failing the whole load. The reclaim totals are
    /// refolded from the reloaded entries; the ledger stays the source of
    /// truth for the metrics cache.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = fs::read_to_string(&path)
            .map(|data| {
                data.lines()
                    .filter_map(|line| serde_json::from_str::<LedgerEntry>(line).ok())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let mut metrics = Metrics::default();
        for entry in &entries {
            if entry.action == LedgerAction::Reclaim && entry.status == LedgerStatus::Success {
                if let Some(lamports) = entry.lamports {
                    metrics.total_reclaimed += lamports;
                    metrics.accounts_reclaimed += 1;
                }
            }
        }

        Self { path, inner: RwLock::new(LedgerInner { entries, metrics }) }
    }

    pub fn append(&self, entry: LedgerEntry) {
        match serde_json::to_string(&entry) {
            Ok(line) => {
                if let Err(e) = self.write_line(&line) {
                    log::error!("Failed to write ledger entry: {e}");
                }
            }
            Err(e) => log::error!("Failed to serialize ledger entry: {e}"),
        }

        let mut inner = self.inner.write();
        if entry.action == LedgerAction::Reclaim && entry.status == LedgerStatus::Success {
            if let Some(lamports) = entry.lamports {
                inner.metrics.total_reclaimed += lamports;
                inner.metrics.accounts_reclaimed += 1;
            }
        }
        inner.entries.push(entry);
    }

    /// Most recent `limit` entries, oldest first.
    pub fn recent_entries(&self, limit: usize) -> Vec<LedgerEntry> {
        let inner = self.inner.read();
        let start = inner.entries.len().saturating_sub(limit);
        inner.entries[start..].to_vec()
    }

    pub fn snapshot(&self) -> Metrics {
        self.inner.read().metrics.clone()
    }

    pub fn update_metrics(&self, update: impl FnOnce(&mut Metrics)) {
        update(&mut self.inner.write().metrics);
    }

    /// Write the end-of-cycle summary record.
    pub fn record_cycle(&self, summary: &CycleSummary) {
        let record = CycleRecord {
            timestamp: chrono::Utc::now().timestamp_millis(),
            kind: "cycle_summary",
            scanned: summary.scanned,
            eligible: summary.eligible,
            reclaimed: summary.reclaimed,
            total_amount: summary.total_lamports,
        };
        match serde_json::to_string(&record) {
            Ok(line) => {
                if let Err(e) = self.write_line(&line) {
                    log::error!("Failed to write cycle summary: {e}");
                }
            }
            Err(e) => log::error!("Failed to serialize cycle summary: {e}"),
        }
    }

    fn write_line(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}")
    }
}
