use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;

use crate::{
    error::ReclaimError,
    gateway::RpcGateway,
    ledger::{Ledger, LedgerAction, LedgerEntry, LedgerStatus},
    safety::SafetyGate,
};

/// Eligibility verdict for one account. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct AuditResult {
    pub account: Pubkey,
    pub eligible: bool,
    pub is_empty: bool,
    pub is_inactive: bool,
    pub is_closeable: bool,
    pub is_not_whitelisted: bool,
    /// Block time of the newest signature, unix milliseconds.
    pub last_activity: Option<i64>,
    /// Token amount for token accounts, lamports otherwise.
    pub balance: u64,
    pub reasons: Vec<String>,
}

impl AuditResult {
    fn failed(account: Pubkey, reason: String) -> Self {
        Self {
            account,
            eligible: false,
            is_empty: false,
            is_inactive: false,
            is_closeable: false,
            is_not_whitelisted: false,
            last_activity: None,
            balance: 0,
            reasons: vec![reason],
        }
    }
}

/// Evaluates the four reclaim-eligibility predicates per account.
pub struct Auditor {
    gateway: Arc<dyn RpcGateway>,
    safety: Arc<SafetyGate>,
    ledger: Arc<Ledger>,
    inactivity_days: u64,
}

impl Auditor {
    pub fn new(
        gateway: Arc<dyn RpcGateway>,
        safety: Arc<SafetyGate>,
        ledger: Arc<Ledger>,
        inactivity_days: u64,
    ) -> Self {
        Self { gateway, safety, ledger, inactivity_days }
    }

    /// Audit a single account. Unexpected errors fold into a failed result
    /// instead of propagating, so a batch is never aborted by one account.
    pub async fn audit(&self, account: &Pubkey, owner: Option<&Pubkey>) -> AuditResult {
        match self.evaluate(account, owner).await {
            Ok(result) => result,
            Err(e) => {
                log::error!("Failed to audit {account}: {e}");
                AuditResult::failed(*account, format!("Error: {e}"))
            }
        }
    }

    async fn evaluate(
        &self,
        account: &Pubkey,
        owner: Option<&Pubkey>,
    ) -> Result<AuditResult, ReclaimError> {
        let mut reasons: Vec<String> = Vec::new();

        let is_not_whitelisted = !self.safety.is_whitelisted(account, owner);
        if !is_not_whitelisted {
            reasons.push("Account is whitelisted".to_string());
        }

        let Some(info) = self.gateway.account_info(*account).await? else {
            reasons.push("Account does not exist".to_string());
            return Ok(AuditResult {
                account: *account,
                eligible: false,
                is_empty: false,
                is_inactive: false,
                is_closeable: false,
                is_not_whitelisted,
                last_activity: None,
                balance: 0,
                reasons,
            });
        };

        let token_account = self.gateway.token_account(*account).await?;
        let is_token_account = token_account.is_some();
        let (is_empty, balance) = match token_account {
            Some(token) => (token.amount == 0, token.amount),
            None => (info.lamports == 0, info.lamports),
        };
        if !is_empty {
            reasons.push(format!("Account has balance: {balance}"));
        }

        let (is_inactive, last_activity) = self.check_inactivity(account, &mut reasons).await;

        // Token accounts the operator funded are always closeable by the
        // operator as payer; other accounts only once drained.
        let is_closeable = if is_token_account { true } else { is_empty };
        if !is_closeable {
            reasons.push("Account cannot be closed by the operator".to_string());
        }

        let eligible = is_empty && is_inactive && is_closeable && is_not_whitelisted;
        if eligible {
            reasons.push("Eligible for reclaim".to_string());
        }

        Ok(AuditResult {
            account: *account,
            eligible,
            is_empty,
            is_inactive,
            is_closeable,
            is_not_whitelisted,
            last_activity,
            balance,
            reasons,
        })
    }

    async fn check_inactivity(
        &self,
        account: &Pubkey,
        reasons: &mut Vec<String>,
    ) -> (bool, Option<i64>) {
        let newest = match self
            .gateway
            .signatures_for_address(*account, None, 1)
            .await
        {
            Ok(records) => records.into_iter().next(),
            Err(e) => {
                log::warn!("Failed to check inactivity for {account}: {e}");
                reasons.push("Could not verify inactivity".to_string());
                return (false, None);
            }
        };

        let Some(record) = newest else {
            reasons.push("No activity on record; treating as inactive".to_string());
            return (true, None);
        };

        let last_activity = record.block_time.unwrap_or(0) * 1000;
        let days = days_since(last_activity);
        if days >= self.inactivity_days as i64 {
            (true, Some(last_activity))
        } else {
            reasons.push(format!(
                "Account active {days} days ago (threshold: {} days)",
                self.inactivity_days
            ));
            (false, Some(last_activity))
        }
    }

    /// Audit accounts one at a time, preserving input order, with one ledger
    /// entry per account.
    pub async fn audit_batch(&self, accounts: &[(Pubkey, Option<Pubkey>)]) -> Vec<AuditResult> {
        log::info!("Auditing {} accounts", accounts.len());

        let mut results = Vec::with_capacity(accounts.len());
        for (account, owner) in accounts {
            let result = self.audit(account, owner.as_ref()).await;

            let status =
                if result.eligible { LedgerStatus::Success } else { LedgerStatus::Skipped };
            self.ledger.append(
                LedgerEntry::for_account(account, LedgerAction::Audit, status)
                    .with_reason(result.reasons.join(", ")),
            );
            results.push(result);
        }

        let eligible = results.iter().filter(|r| r.eligible).count();
        log::info!("Audit complete: {eligible}/{} eligible for reclaim", accounts.len());
        results
    }
}

fn days_since(timestamp_ms: i64) -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    (now - timestamp_ms) / (1000 * 60 * 60 * 24)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        gateway::{AccountView, MockRpcGateway, TokenAccountView},
        tests::fixtures::{
            empty_token_account, ledger_in, old_signature, recent_signature, safety_in,
        },
    };
    use mockall::predicate::eq;

    const INACTIVITY_DAYS: u64 = 30;

    struct Harness {
        _dirs: (tempfile::TempDir, tempfile::TempDir),
        safety: Arc<SafetyGate>,
        ledger: Arc<Ledger>,
    }

    impl Harness {
        fn new() -> Self {
            let (ledger_dir, ledger) = ledger_in();
            let (safety_dir, safety) = safety_in();
            Self { _dirs: (ledger_dir, safety_dir), safety, ledger }
        }

        fn auditor(&self, gateway: MockRpcGateway) -> Auditor {
            Auditor::new(
                Arc::new(gateway),
                Arc::clone(&self.safety),
                Arc::clone(&self.ledger),
                INACTIVITY_DAYS,
            )
        }
    }

    fn eligible_account_gateway(account: Pubkey) -> MockRpcGateway {
        let mut gateway = MockRpcGateway::new();
        gateway.expect_account_info().with(eq(account)).returning(|_| {
            Ok(Some(AccountView { lamports: 2_039_280, owner: spl_token_interface::id() }))
        });
        gateway
            .expect_token_account()
            .with(eq(account))
            .returning(move |address| Ok(Some(empty_token_account(&address))));
        gateway
            .expect_signatures_for_address()
            .returning(|_, _, _| Ok(vec![old_signature()]));
        gateway
    }

    #[tokio::test]
    async fn test_empty_inactive_unlisted_account_is_eligible() {
        let harness = Harness::new();
        let account = Pubkey::new_unique();

        let result =
            harness.auditor(eligible_account_gateway(account)).audit(&account, None).await;

        assert!(result.eligible);
        assert!(result.is_empty);
        assert!(result.is_inactive);
        assert!(result.is_closeable);
        assert!(result.is_not_whitelisted);
        assert!(result.reasons.iter().any(|r| r.contains("Eligible for reclaim")));
    }

    #[tokio::test]
    async fn test_whitelisted_account_is_never_eligible() {
        let harness = Harness::new();
        let account = Pubkey::new_unique();
        harness.safety.add_account(&account).unwrap();

        let result =
            harness.auditor(eligible_account_gateway(account)).audit(&account, None).await;

        assert!(!result.eligible);
        assert!(!result.is_not_whitelisted);
        // the other predicates still pass
        assert!(result.is_empty && result.is_inactive && result.is_closeable);
        assert!(result.reasons.iter().any(|r| r.contains("whitelisted")));
    }

    #[tokio::test]
    async fn test_whitelisted_owner_blocks_eligibility() {
        let harness = Harness::new();
        let account = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        harness.safety.add_owner(&owner).unwrap();

        let result = harness
            .auditor(eligible_account_gateway(account))
            .audit(&account, Some(&owner))
            .await;
        assert!(!result.eligible);
    }

    #[tokio::test]
    async fn test_nonexistent_account_short_circuits() {
        let harness = Harness::new();
        let account = Pubkey::new_unique();

        let mut gateway = MockRpcGateway::new();
        gateway.expect_account_info().with(eq(account)).returning(|_| Ok(None));
        // the remaining predicates must not be evaluated
        gateway.expect_token_account().times(0);
        gateway.expect_signatures_for_address().times(0);

        let result = harness.auditor(gateway).audit(&account, None).await;
        assert!(!result.eligible);
        assert!(!result.is_empty);
        assert!(!result.is_inactive);
        assert!(!result.is_closeable);
        assert!(result.is_not_whitelisted);
        assert_eq!(result.balance, 0);
        assert!(result.reasons.iter().any(|r| r.contains("does not exist")));
    }

    #[tokio::test]
    async fn test_funded_token_account_is_not_empty() {
        let harness = Harness::new();
        let account = Pubkey::new_unique();

        let mut gateway = MockRpcGateway::new();
        gateway.expect_account_info().returning(|_| {
            Ok(Some(AccountView { lamports: 2_039_280, owner: spl_token_interface::id() }))
        });
        gateway.expect_token_account().returning(|address| {
            Ok(Some(TokenAccountView { amount: 1_500, ..empty_token_account(&address) }))
        });
        gateway
            .expect_signatures_for_address()
            .returning(|_, _, _| Ok(vec![old_signature()]));

        let result = harness.auditor(gateway).audit(&account, None).await;
        assert!(!result.eligible);
        assert!(!result.is_empty);
        assert_eq!(result.balance, 1_500);
        assert!(result.reasons.iter().any(|r| r.contains("has balance")));
    }

    #[tokio::test]
    async fn test_recent_activity_blocks_eligibility() {
        let harness = Harness::new();
        let account = Pubkey::new_unique();

        let mut gateway = MockRpcGateway::new();
        gateway.expect_account_info().returning(|_| {
            Ok(Some(AccountView { lamports: 2_039_280, owner: spl_token_interface::id() }))
        });
        gateway
            .expect_token_account()
            .returning(|address| Ok(Some(empty_token_account(&address))));
        gateway
            .expect_signatures_for_address()
            .returning(|_, _, _| Ok(vec![recent_signature()]));

        let result = harness.auditor(gateway).audit(&account, None).await;
        assert!(!result.eligible);
        assert!(!result.is_inactive);
        assert!(result.last_activity.is_some());
        assert!(result.reasons.iter().any(|r| r.contains("threshold")));
    }

    #[tokio::test]
    async fn test_no_history_counts_as_inactive() {
        let harness = Harness::new();
        let account = Pubkey::new_unique();

        let mut gateway = MockRpcGateway::new();
        gateway.expect_account_info().returning(|_| {
            Ok(Some(AccountView { lamports: 2_039_280, owner: spl_token_interface::id() }))
        });
        gateway
            .expect_token_account()
            .returning(|address| Ok(Some(empty_token_account(&address))));
        gateway.expect_signatures_for_address().returning(|_, _, _| Ok(vec![]));

        let result = harness.auditor(gateway).audit(&account, None).await;
        assert!(result.eligible);
        assert!(result.is_inactive);
        assert!(result.last_activity.is_none());
        assert!(result.reasons.iter().any(|r| r.contains("No activity on record")));
    }

    #[tokio::test]
    async fn test_funded_system_account_is_not_closeable() {
        let harness = Harness::new();
        let account = Pubkey::new_unique();

        let mut gateway = MockRpcGateway::new();
        gateway.expect_account_info().returning(|_| {
            Ok(Some(AccountView { lamports: 5_000_000, owner: solana_sdk::pubkey::Pubkey::default() }))
        });
        gateway.expect_token_account().returning(|_| Ok(None));
        gateway.expect_signatures_for_address().returning(|_, _, _| Ok(vec![]));

        let result = harness.auditor(gateway).audit(&account, None).await;
        assert!(!result.eligible);
        assert!(!result.is_empty);
        assert!(!result.is_closeable);
        assert_eq!(result.balance, 5_000_000);
    }

    #[tokio::test]
    async fn test_rpc_error_folds_into_failed_result() {
        let harness = Harness::new();
        let account = Pubkey::new_unique();

        let mut gateway = MockRpcGateway::new();
        gateway
            .expect_account_info()
            .returning(|_| Err(ReclaimError::RpcError("node unreachable".to_string())));

        let result = harness.auditor(gateway).audit(&account, None).await;
        assert!(!result.eligible);
        assert!(!result.is_empty && !result.is_inactive && !result.is_closeable);
        assert!(!result.is_not_whitelisted);
        assert!(result.reasons[0].contains("node unreachable"));
    }

    #[tokio::test]
    async fn test_batch_preserves_order_and_logs() {
        let harness = Harness::new();
        let good = Pubkey::new_unique();
        let missing = Pubkey::new_unique();

        let mut gateway = eligible_account_gateway(good);
        gateway.expect_account_info().with(eq(missing)).returning(|_| Ok(None));

        let auditor = harness.auditor(gateway);
        let results = auditor.audit_batch(&[(good, None), (missing, None)]).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].account, good);
        assert!(results[0].eligible);
        assert_eq!(results[1].account, missing);
        assert!(!results[1].eligible);

        let entries = harness.ledger.recent_entries(10);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, LedgerStatus::Success);
        assert_eq!(entries[1].status, LedgerStatus::Skipped);
        assert_eq!(entries[0].account, good.to_string());
    }
}
