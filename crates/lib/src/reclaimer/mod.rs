use std::sync::Arc;

use solana_sdk::{
    instruction::Instruction, pubkey::Pubkey, signature::Keypair, signer::Signer,
    transaction::Transaction,
};

use crate::{
    error::ReclaimError,
    gateway::RpcGateway,
    ledger::{Ledger, LedgerAction, LedgerEntry, LedgerStatus},
    safety::SafetyGate,
};

/// Terminal record of one close attempt.
#[derive(Debug, Clone)]
pub struct ReclaimResult {
    pub account: Pubkey,
    pub success: bool,
    pub signature: Option<String>,
    pub reclaimed_lamports: u64,
    pub dry_run: bool,
    pub timestamp: i64,
    pub error: Option<String>,
}

impl ReclaimResult {
    fn success(account: Pubkey, signature: Option<String>, lamports: u64, dry_run: bool) -> Self {
        Self {
            account,
            success: true,
            signature,
            reclaimed_lamports: lamports,
            dry_run,
            timestamp: chrono::Utc::now().timestamp_millis(),
            error: None,
        }
    }

    fn failure(account: Pubkey, lamports: u64, dry_run: bool, error: String) -> Self {
        Self {
            account,
            success: false,
            signature: None,
            reclaimed_lamports: lamports,
            dry_run,
            timestamp: chrono::Utc::now().timestamp_millis(),
            error: Some(error),
        }
    }
}

/// Closes eligible accounts and returns their rent to the operator, either
/// simulated (dry run) or submitted and confirmed (live).
pub struct Reclaimer {
    gateway: Arc<dyn RpcGateway>,
    safety: Arc<SafetyGate>,
    ledger: Arc<Ledger>,
    operator: Arc<Keypair>,
    dry_run: bool,
}

impl Reclaimer {
    pub fn new(
        gateway: Arc<dyn RpcGateway>,
        safety: Arc<SafetyGate>,
        ledger: Arc<Ledger>,
        operator: Arc<Keypair>,
        dry_run: bool,
    ) -> Self {
        Self { gateway, safety, ledger, operator, dry_run }
    }

    /// Close one account. The emergency stop is re-read here, fresh for every
    /// account, because an operator may flip it while a batch is running.
    /// Every failure mode becomes a result value; this never raises.
    pub async fn reclaim_account(&self, address: &Pubkey) -> ReclaimResult {
        let stop = self.safety.emergency_stop();
        if stop.stopped {
            let error = ReclaimError::EmergencyStop(stop.reason).to_string();
            log::warn!("Refusing to reclaim {address}: {error}");
            self.ledger.append(
                LedgerEntry::for_account(address, LedgerAction::Reclaim, LedgerStatus::Failure)
                    .with_reason(&error),
            );
            return ReclaimResult::failure(*address, 0, self.dry_run, error);
        }

        log::info!("Reclaiming account {address}{}", if self.dry_run { " (dry run)" } else { "" });

        let info = match self.gateway.account_info(*address).await {
            Ok(Some(info)) => info,
            Ok(None) => {
                let error = "Account does not exist".to_string();
                self.ledger.append(
                    LedgerEntry::for_account(address, LedgerAction::Reclaim, LedgerStatus::Failure)
                        .with_reason(&error),
                );
                return ReclaimResult::failure(*address, 0, self.dry_run, error);
            }
            Err(e) => {
                let error = e.to_string();
                self.ledger.append(
                    LedgerEntry::for_account(address, LedgerAction::Reclaim, LedgerStatus::Failure)
                        .with_reason(&error),
                );
                return ReclaimResult::failure(*address, 0, self.dry_run, error);
            }
        };
        let lamports = info.lamports;

        let transaction = match self.build_close_transaction(address, &info.owner).await {
            Ok(tx) => tx,
            Err(e) => {
                let error = e.to_string();
                self.ledger.append(
                    LedgerEntry::for_account(address, LedgerAction::Reclaim, LedgerStatus::Failure)
                        .with_reason(&error),
                );
                return ReclaimResult::failure(*address, 0, self.dry_run, error);
            }
        };

        if self.dry_run {
            return self.simulate(address, &transaction, lamports).await;
        }
        self.submit(address, &transaction, lamports).await
    }

    async fn simulate(
        &self,
        address: &Pubkey,
        transaction: &Transaction,
        lamports: u64,
    ) -> ReclaimResult {
        match self.gateway.simulate_transaction(transaction).await {
            Ok(outcome) if outcome.is_ok() => {
                log::info!("Simulation successful; would reclaim {lamports} lamports");
                self.ledger.append(
                    LedgerEntry::for_account(address, LedgerAction::Reclaim, LedgerStatus::Success)
                        .with_lamports(lamports)
                        .with_reason("Simulation successful (dry run)"),
                );
                ReclaimResult::success(*address, None, lamports, true)
            }
            Ok(outcome) => {
                let error = format!(
                    "Simulation failed: {}",
                    outcome.error.unwrap_or_else(|| "unknown".to_string())
                );
                log::error!("{error}");
                self.ledger.append(
                    LedgerEntry::for_account(address, LedgerAction::Reclaim, LedgerStatus::Failure)
                        .with_lamports(lamports)
                        .with_reason(&error),
                );
                ReclaimResult::failure(*address, lamports, true, error)
            }
            Err(e) => {
                let error = e.to_string();
                self.ledger.append(
                    LedgerEntry::for_account(address, LedgerAction::Reclaim, LedgerStatus::Failure)
                        .with_lamports(lamports)
                        .with_reason(&error),
                );
                ReclaimResult::failure(*address, lamports, true, error)
            }
        }
    }

    async fn submit(
        &self,
        address: &Pubkey,
        transaction: &Transaction,
        lamports: u64,
    ) -> ReclaimResult {
        match self.gateway.send_and_confirm_transaction(transaction).await {
            Ok(signature) => {
                log::info!("Reclaimed {lamports} lamports from {address} ({signature})");
                self.ledger.append(
                    LedgerEntry::for_account(address, LedgerAction::Reclaim, LedgerStatus::Success)
                        .with_lamports(lamports)
                        .with_signature(signature.to_string()),
                );
                ReclaimResult::success(*address, Some(signature.to_string()), lamports, false)
            }
            Err(e) => {
                let error = e.to_string();
                log::error!("Failed to reclaim {address}: {error}");
                self.ledger.append(
                    LedgerEntry::for_account(address, LedgerAction::Reclaim, LedgerStatus::Failure)
                        .with_lamports(lamports)
                        .with_reason(&error),
                );
                ReclaimResult::failure(*address, lamports, false, error)
            }
        }
    }

    async fn build_close_transaction(
        &self,
        address: &Pubkey,
        owning_program: &Pubkey,
    ) -> Result<Transaction, ReclaimError> {
        let instruction = self.close_instruction(address, owning_program)?;
        let blockhash = self.gateway.latest_blockhash().await?;
        let operator = self.operator.pubkey();

        Ok(Transaction::new_signed_with_payer(
            &[instruction],
            Some(&operator),
            &[self.operator.as_ref()],
            blockhash,
        ))
    }

    /// Close instruction with the operator as both destination and authority.
    fn close_instruction(
        &self,
        address: &Pubkey,
        owning_program: &Pubkey,
    ) -> Result<Instruction, ReclaimError> {
        let operator = self.operator.pubkey();
        let instruction = if *owning_program == spl_token_2022_interface::id() {
            spl_token_2022_interface::instruction::close_account(
                owning_program,
                address,
                &operator,
                &operator,
                &[&operator],
            )
        } else {
            spl_token_interface::instruction::close_account(
                &spl_token_interface::id(),
                address,
                &operator,
                &operator,
                &[&operator],
            )
        };
        instruction.map_err(|e| ReclaimError::InvalidTransaction(e.to_string()))
    }

    /// Close accounts strictly one at a time, in input order. The batch halts
    /// as soon as the emergency stop is observed after a recorded result;
    /// remaining accounts are left unprocessed, not marked failed.
    pub async fn reclaim_batch(&self, addresses: &[Pubkey]) -> Vec<ReclaimResult> {
        log::info!(
            "Reclaiming {} accounts{}",
            addresses.len(),
            if self.dry_run { " (dry run)" } else { "" }
        );

        let mut results = Vec::new();
        for address in addresses {
            results.push(self.reclaim_account(address).await);

            let stop = self.safety.emergency_stop();
            if stop.stopped {
                log::warn!("Emergency stop activated, halting batch reclaim: {}", stop.reason);
                break;
            }
        }

        let successful = results.iter().filter(|r| r.success).count();
        let total: u64 =
            results.iter().filter(|r| r.success).map(|r| r.reclaimed_lamports).sum();
        log::info!(
            "Batch reclaim complete: {successful}/{} successful, {total} lamports",
            addresses.len()
        );
        results
    }
}
