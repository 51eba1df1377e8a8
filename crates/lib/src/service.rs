use std::sync::Arc;

use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};

use crate::{
    alert::Alerter,
    auditor::Auditor,
    config::Config,
    error::ReclaimError,
    gateway::RpcGateway,
    ledger::{CycleSummary, Ledger, LedgerEntry, Metrics},
    reclaimer::{ReclaimResult, Reclaimer},
    safety::SafetyGate,
    scanner::{Scanner, ScanSettings, SponsoredAccount, SponsorshipDetector},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOutcome {
    pub accounts_found: usize,
}

/// Wires the three pipeline stages to the shared ledger and safety gate, and
/// exposes the interface the CLI, scheduler and any future control plane call
/// into. Constructed once per process; every stage gets its collaborators
/// injected here.
pub struct ReclaimPipeline {
    scanner: Scanner,
    auditor: Auditor,
    reclaimer: Reclaimer,
    safety: Arc<SafetyGate>,
    ledger: Arc<Ledger>,
    alerter: Alerter,
}

impl ReclaimPipeline {
    pub fn new(config: &Config, gateway: Arc<dyn RpcGateway>, operator: Arc<Keypair>) -> Self {
        let ledger = Arc::new(Ledger::open(&config.storage.ledger_file));
        let safety = Arc::new(SafetyGate::from_config(&config.storage));
        Self::with_stores(config, gateway, operator, ledger, safety)
    }

    pub fn with_stores(
        config: &Config,
        gateway: Arc<dyn RpcGateway>,
        operator: Arc<Keypair>,
        ledger: Arc<Ledger>,
        safety: Arc<SafetyGate>,
    ) -> Self {
        let operator_pubkey = operator.pubkey();
        let scanner = Scanner::new(
            Arc::clone(&gateway),
            Arc::clone(&ledger),
            SponsorshipDetector::from_config(&config.sponsorship),
            operator_pubkey,
            ScanSettings::from_config(&config.scan),
        );
        let auditor = Auditor::new(
            Arc::clone(&gateway),
            Arc::clone(&safety),
            Arc::clone(&ledger),
            config.reclaim.inactivity_days,
        );
        let reclaimer = Reclaimer::new(
            Arc::clone(&gateway),
            Arc::clone(&safety),
            Arc::clone(&ledger),
            operator,
            config.reclaim.dry_run,
        );

        Self {
            scanner,
            auditor,
            reclaimer,
            safety,
            ledger,
            alerter: Alerter::new(config.alerts.clone()),
        }
    }

    /// Discovery only: scan the operator history and report what was found.
    pub async fn run_scan(&self) -> Result<ScanOutcome, ReclaimError> {
        let accounts = self.scanner.scan().await?;

        self.ledger.update_metrics(|metrics| {
            metrics.accounts_monitored = accounts.len() as u64;
            metrics.last_scan_time = Some(chrono::Utc::now().timestamp_millis());
        });

        Ok(ScanOutcome { accounts_found: accounts.len() })
    }

    /// The full scan → audit → reclaim cycle. Refuses to start while the
    /// emergency stop is active; per-account failures inside the stages never
    /// surface here.
    pub async fn run_reclaim_cycle(&self) -> Result<CycleSummary, ReclaimError> {
        let stop = self.safety.emergency_stop();
        if stop.stopped {
            return Err(ReclaimError::EmergencyStop(stop.reason));
        }

        let accounts = self.scanner.scan().await?;

        let pairs: Vec<(Pubkey, Option<Pubkey>)> =
            accounts.iter().map(|account| (account.address, Some(account.owner))).collect();
        let audits = self.auditor.audit_batch(&pairs).await;

        let eligible: Vec<Pubkey> =
            audits.iter().filter(|audit| audit.eligible).map(|audit| audit.account).collect();

        let results = if eligible.is_empty() {
            Vec::new()
        } else {
            self.reclaimer.reclaim_batch(&eligible).await
        };

        let successful: Vec<&ReclaimResult> = results.iter().filter(|r| r.success).collect();
        let total_lamports: u64 = successful.iter().map(|r| r.reclaimed_lamports).sum();

        let summary = CycleSummary {
            scanned: accounts.len() as u64,
            eligible: eligible.len() as u64,
            reclaimed: successful.len() as u64,
            total_lamports,
        };
        self.ledger.record_cycle(&summary);

        let at_stake: u64 = results.iter().map(|r| r.reclaimed_lamports).sum();
        let dry_run = results.iter().any(|r| r.dry_run);
        self.ledger.update_metrics(|metrics| {
            metrics.accounts_monitored = summary.scanned;
            metrics.last_scan_time = Some(chrono::Utc::now().timestamp_millis());
            metrics.total_rent_locked = at_stake;
            // after a live cycle the successful amounts are recovered, not
            // reclaimable any more
            metrics.reclaimable_lamports = if dry_run { total_lamports } else { 0 };
        });

        self.alerter.check_and_alert(&self.ledger.snapshot()).await;

        Ok(summary)
    }

    pub async fn reclaim_single(&self, address: &Pubkey) -> ReclaimResult {
        self.reclaimer.reclaim_account(address).await
    }

    /// Targeted discovery over a known mint list.
    pub async fn discover_for_mints(
        &self,
        mints: &[Pubkey],
    ) -> Result<Vec<SponsoredAccount>, ReclaimError> {
        self.scanner.find_accounts_for_mints(mints).await
    }

    pub fn metrics(&self) -> Metrics {
        self.ledger.snapshot()
    }

    pub fn recent_logs(&self, limit: usize) -> Vec<LedgerEntry> {
        self.ledger.recent_entries(limit)
    }

    pub fn safety(&self) -> &SafetyGate {
        &self.safety
    }
}
