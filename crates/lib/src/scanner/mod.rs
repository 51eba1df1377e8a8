pub mod detect;
pub mod types;

use std::{str::FromStr, sync::Arc, time::Duration};

use solana_sdk::pubkey::Pubkey;

use crate::{
    config::ScanConfig,
    error::ReclaimError,
    gateway::{ParsedTransactionView, RpcGateway},
    ledger::{Ledger, LedgerAction, LedgerEntry, LedgerStatus},
};

pub use detect::SponsorshipDetector;
pub use types::{AccountKind, SponsoredAccount, SponsorshipSignal, SponsorshipStats};

const INITIALIZE_ACCOUNT_KINDS: [&str; 3] =
    ["initializeAccount", "initializeAccount2", "initializeAccount3"];

#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub page_size: usize,
    pub request_delay: Duration,
    /// Cumulative signature ceiling; None walks the whole history.
    pub max_signatures: Option<u64>,
}

impl ScanSettings {
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            page_size: config.page_size,
            request_delay: Duration::from_millis(config.request_delay_ms),
            max_signatures: config.max_signatures,
        }
    }
}

/// Replays the operator wallet's transaction history and extracts the token
/// accounts the operator paid to create.
pub struct Scanner {
    gateway: Arc<dyn RpcGateway>,
    ledger: Arc<Ledger>,
    detector: SponsorshipDetector,
    operator: Pubkey,
    settings: ScanSettings,
}

impl Scanner {
    pub fn new(
        gateway: Arc<dyn RpcGateway>,
        ledger: Arc<Ledger>,
        detector: SponsorshipDetector,
        operator: Pubkey,
        settings: ScanSettings,
    ) -> Self {
        Self { gateway, ledger, detector, operator, settings }
    }

    /// Walk the history backward page by page and collect sponsored-account
    /// candidates. Single-signature failures are skipped, not fatal; the
    /// inter-fetch delay is the only pacing against the RPC rate ceiling.
    pub async fn scan(&self) -> Result<Vec<SponsoredAccount>, ReclaimError> {
        log::info!("Scanning history of {} for sponsored accounts", self.operator);

        let mut candidates: Vec<SponsoredAccount> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut total_signatures: u64 = 0;

        loop {
            let page = self
                .gateway
                .signatures_for_address(self.operator, cursor.clone(), self.settings.page_size)
                .await?;
            if page.is_empty() {
                break;
            }

            total_signatures += page.len() as u64;
            log::debug!("Fetched {} signatures ({total_signatures} total)", page.len());

            for record in &page {
                match self.gateway.parsed_transaction(record.signature.clone()).await {
                    Ok(Some(tx)) => self.extract_sponsored_accounts(&tx, &mut candidates),
                    Ok(None) => {}
                    Err(e) => {
                        log::warn!("Failed to process signature {}: {e}", record.signature)
                    }
                }
                tokio::time::sleep(self.settings.request_delay).await;
            }

            // Oldest signature of the page just processed becomes the cursor.
            cursor = page.last().map(|record| record.signature.clone());

            if page.len() < self.settings.page_size {
                break;
            }
            if let Some(cap) = self.settings.max_signatures {
                if total_signatures >= cap {
                    log::info!("Reached scan ceiling of {cap} signatures");
                    break;
                }
            }
        }

        log::info!(
            "Found {} sponsored accounts across {total_signatures} signatures",
            candidates.len()
        );
        self.ledger.append(
            LedgerEntry::new(LedgerAction::Scan, LedgerStatus::Success).with_reason(format!(
                "Scanned {total_signatures} transactions, found {} accounts",
                candidates.len()
            )),
        );

        Ok(candidates)
    }

    fn extract_sponsored_accounts(
        &self,
        tx: &ParsedTransactionView,
        out: &mut Vec<SponsoredAccount>,
    ) {
        // Inclusion criterion: the operator paid the transaction fees.
        if tx.fee_payer_pubkey() != Some(self.operator) {
            return;
        }
        let sponsorship = self
            .detector
            .detect(tx, &self.operator)
            .unwrap_or(SponsorshipSignal::FeePayerDefault);

        for instruction in &tx.instructions {
            if !is_token_program(&instruction.program_id) {
                continue;
            }
            let Some(kind) = instruction.kind.as_deref() else { continue };
            if !INITIALIZE_ACCOUNT_KINDS.contains(&kind) {
                continue;
            }

            let info = &instruction.info;
            let fields = (
                info.get("account").and_then(|v| v.as_str()),
                info.get("mint").and_then(|v| v.as_str()),
                info.get("owner").and_then(|v| v.as_str()),
            );
            let (Some(account), Some(mint), Some(owner)) = fields else {
                log::warn!("Skipping {kind} instruction with incomplete parsed info");
                continue;
            };
            let parsed = (
                Pubkey::from_str(account),
                Pubkey::from_str(mint),
                Pubkey::from_str(owner),
            );
            let (Ok(address), Ok(mint), Ok(owner)) = parsed else {
                log::warn!("Skipping {kind} instruction with unparsable keys");
                continue;
            };

            out.push(SponsoredAccount {
                address,
                kind: AccountKind::TokenAccount,
                created_at: tx.block_time.map(|t| t * 1000),
                rent_lamports: 0,
                owner,
                mint: Some(mint),
                sponsorship,
            });
        }
    }

    /// Targeted discovery: derive the operator's associated token account for
    /// each known mint and report the ones that exist, with live rent.
    pub async fn find_accounts_for_mints(
        &self,
        mints: &[Pubkey],
    ) -> Result<Vec<SponsoredAccount>, ReclaimError> {
        log::info!("Looking up associated token accounts for {} mints", mints.len());
        let mut accounts = Vec::new();

        for mint in mints {
            let address =
                spl_associated_token_account_interface::address::get_associated_token_address(
                    &self.operator,
                    mint,
                );
            match self.gateway.account_info(address).await {
                Ok(Some(info)) => accounts.push(SponsoredAccount {
                    address,
                    kind: AccountKind::TokenAccount,
                    created_at: None,
                    rent_lamports: info.lamports,
                    owner: self.operator,
                    mint: Some(*mint),
                    sponsorship: SponsorshipSignal::FeePayerDefault,
                }),
                Ok(None) => {}
                Err(e) => log::warn!("Failed to look up token account for mint {mint}: {e}"),
            }
            tokio::time::sleep(self.settings.request_delay).await;
        }

        log::info!("Found {} associated token accounts", accounts.len());
        Ok(accounts)
    }

    /// Confident-vs-fallback classification breakdown for reporting.
    pub fn sponsorship_stats(accounts: &[SponsoredAccount]) -> SponsorshipStats {
        let mut stats = SponsorshipStats { total: accounts.len(), ..Default::default() };
        for account in accounts {
            if account.confident() {
                stats.confident += 1;
                stats.confident_lamports += account.rent_lamports;
            } else {
                stats.fallback += 1;
                stats.fallback_lamports += account.rent_lamports;
            }
        }
        stats
    }
}

fn is_token_program(program_id: &str) -> bool {
    matches!(
        Pubkey::from_str(program_id),
        Ok(program) if program == spl_token_interface::id()
            || program == spl_token_2022_interface::id()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        gateway::MockRpcGateway,
        tests::fixtures::{
            init_account_transaction, ledger_in, plain_transaction, signature_records,
        },
    };
    use mockall::predicate::{always, eq};

    fn scanner_with(
        gateway: MockRpcGateway,
        operator: Pubkey,
        settings: ScanSettings,
    ) -> (tempfile::TempDir, Scanner) {
        let (dir, ledger) = ledger_in();
        let scanner = Scanner::new(
            Arc::new(gateway),
            ledger,
            SponsorshipDetector::default(),
            operator,
            settings,
        );
        (dir, scanner)
    }

    fn fast_settings(page_size: usize, max_signatures: Option<u64>) -> ScanSettings {
        ScanSettings { page_size, request_delay: Duration::from_millis(0), max_signatures }
    }

    #[tokio::test]
    async fn test_short_page_terminates_after_one_fetch() {
        let operator = Pubkey::new_unique();
        let mut gateway = MockRpcGateway::new();

        // 9 signatures against a page size of 10: exactly one page request.
        gateway
            .expect_signatures_for_address()
            .with(eq(operator), eq(None::<String>), eq(10usize))
            .times(1)
            .returning(|_, _, _| Ok(signature_records(9)));
        gateway.expect_parsed_transaction().times(9).returning(|_| Ok(None));

        let (_dir, scanner) = scanner_with(gateway, operator, fast_settings(10, Some(5000)));
        let accounts = scanner.scan().await.unwrap();
        assert!(accounts.is_empty());
    }

    #[tokio::test]
    async fn test_full_page_advances_cursor() {
        let operator = Pubkey::new_unique();
        let mut gateway = MockRpcGateway::new();

        let first_page = signature_records(3);
        let cursor = first_page.last().unwrap().signature.clone();

        gateway
            .expect_signatures_for_address()
            .with(eq(operator), eq(None::<String>), eq(3usize))
            .times(1)
            .return_once(move |_, _, _| Ok(first_page));
        gateway
            .expect_signatures_for_address()
            .with(eq(operator), eq(Some(cursor)), eq(3usize))
            .times(1)
            .returning(|_, _, _| Ok(vec![]));
        gateway.expect_parsed_transaction().times(3).returning(|_| Ok(None));

        let (_dir, scanner) = scanner_with(gateway, operator, fast_settings(3, None));
        scanner.scan().await.unwrap();
    }

    #[tokio::test]
    async fn test_signature_cap_bounds_the_scan() {
        let operator = Pubkey::new_unique();
        let mut gateway = MockRpcGateway::new();

        // Every page is full; the cap of 6 stops the walk after two pages.
        gateway
            .expect_signatures_for_address()
            .times(2)
            .returning(|_, _, _| Ok(signature_records(3)));
        gateway.expect_parsed_transaction().times(6).returning(|_| Ok(None));

        let (_dir, scanner) = scanner_with(gateway, operator, fast_settings(3, Some(6)));
        scanner.scan().await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_signature() {
        let operator = Pubkey::new_unique();
        let mut gateway = MockRpcGateway::new();

        gateway
            .expect_signatures_for_address()
            .times(1)
            .returning(|_, _, _| Ok(signature_records(2)));
        let operator_clone = operator;
        gateway
            .expect_parsed_transaction()
            .with(eq("sig-0".to_string()))
            .times(1)
            .returning(|_| Err(ReclaimError::RpcError("timeout".to_string())));
        gateway
            .expect_parsed_transaction()
            .with(eq("sig-1".to_string()))
            .times(1)
            .returning(move |_| {
                Ok(Some(init_account_transaction(&operator_clone, 1_700_000_000)))
            });

        let (_dir, scanner) = scanner_with(gateway, operator, fast_settings(10, None));
        let accounts = scanner.scan().await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].kind, AccountKind::TokenAccount);
        assert_eq!(accounts[0].sponsorship, SponsorshipSignal::FeePayerDefault);
    }

    #[tokio::test]
    async fn test_foreign_fee_payer_is_not_a_candidate() {
        let operator = Pubkey::new_unique();
        let stranger = Pubkey::new_unique();
        let mut gateway = MockRpcGateway::new();

        gateway
            .expect_signatures_for_address()
            .times(1)
            .returning(|_, _, _| Ok(signature_records(1)));
        gateway
            .expect_parsed_transaction()
            .with(always())
            .times(1)
            .returning(move |_| Ok(Some(init_account_transaction(&stranger, 1_700_000_000))));

        let (_dir, scanner) = scanner_with(gateway, operator, fast_settings(10, None));
        let accounts = scanner.scan().await.unwrap();
        assert!(accounts.is_empty());
    }

    #[tokio::test]
    async fn test_non_token_transactions_yield_nothing() {
        let operator = Pubkey::new_unique();
        let mut gateway = MockRpcGateway::new();

        gateway
            .expect_signatures_for_address()
            .times(1)
            .returning(|_, _, _| Ok(signature_records(1)));
        gateway
            .expect_parsed_transaction()
            .times(1)
            .returning(move |_| Ok(Some(plain_transaction(&operator))));

        let (_dir, scanner) = scanner_with(gateway, operator, fast_settings(10, None));
        let accounts = scanner.scan().await.unwrap();
        assert!(accounts.is_empty());
    }

    #[tokio::test]
    async fn test_scan_writes_summary_ledger_entry() {
        let operator = Pubkey::new_unique();
        let mut gateway = MockRpcGateway::new();

        gateway.expect_signatures_for_address().times(1).returning(|_, _, _| Ok(vec![]));

        let (dir, ledger) = ledger_in();
        let scanner = Scanner::new(
            Arc::new(gateway),
            Arc::clone(&ledger),
            SponsorshipDetector::default(),
            operator,
            fast_settings(10, None),
        );
        scanner.scan().await.unwrap();
        drop(dir);

        let entries = ledger.recent_entries(10);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, LedgerAction::Scan);
        assert_eq!(entries[0].status, LedgerStatus::Success);
        assert_eq!(entries[0].account, crate::constant::LEDGER_NO_ACCOUNT);
    }

    #[tokio::test]
    async fn test_find_accounts_for_mints() {
        let operator = Pubkey::new_unique();
        let mint_hit = Pubkey::new_unique();
        let mint_miss = Pubkey::new_unique();
        let ata =
            spl_associated_token_account_interface::address::get_associated_token_address(
                &operator, &mint_hit,
            );

        let mut gateway = MockRpcGateway::new();
        gateway
            .expect_account_info()
            .with(eq(ata))
            .times(1)
            .returning(|_| {
                Ok(Some(crate::gateway::AccountView {
                    lamports: 2_039_280,
                    owner: spl_token_interface::id(),
                }))
            });
        gateway.expect_account_info().with(always()).returning(|_| Ok(None));

        let (_dir, scanner) = scanner_with(gateway, operator, fast_settings(10, None));
        let accounts = scanner.find_accounts_for_mints(&[mint_hit, mint_miss]).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].address, ata);
        assert_eq!(accounts[0].rent_lamports, 2_039_280);
    }

    #[test]
    fn test_sponsorship_stats() {
        let operator = Pubkey::new_unique();
        let make = |signal, lamports| SponsoredAccount {
            address: Pubkey::new_unique(),
            kind: AccountKind::TokenAccount,
            created_at: None,
            rent_lamports: lamports,
            owner: operator,
            mint: None,
            sponsorship: signal,
        };

        let accounts = vec![
            make(SponsorshipSignal::MemoMarker, 100),
            make(SponsorshipSignal::FeePayerDefault, 50),
            make(SponsorshipSignal::FeePayerDefault, 25),
        ];
        let stats = Scanner::sponsorship_stats(&accounts);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.confident, 1);
        assert_eq!(stats.fallback, 2);
        assert_eq!(stats.confident_lamports, 100);
        assert_eq!(stats.fallback_lamports, 75);
    }
}
