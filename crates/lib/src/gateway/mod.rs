pub mod solana;

use async_trait::async_trait;
use mockall::automock;
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction};

use crate::error::ReclaimError;

pub use solana::SolanaRpcGateway;

/// One entry of an address's signature history.
#[derive(Debug, Clone)]
pub struct SignatureRecord {
    pub signature: String,
    pub block_time: Option<i64>,
}

/// A single instruction of a parsed transaction, reduced to the fields the
/// scanner classifies on.
#[derive(Debug, Clone)]
pub struct ParsedInstructionView {
    pub program_id: String,
    /// Parsed instruction type, e.g. "initializeAccount".
    pub kind: Option<String>,
    /// Parsed instruction info object; Null for instructions the RPC node
    /// could not decode.
    pub info: serde_json::Value,
    /// Memo text for spl-memo instructions.
    pub memo: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ParsedTransactionView {
    /// Static account keys in message order; the first key is the fee payer.
    pub account_keys: Vec<String>,
    pub instructions: Vec<ParsedInstructionView>,
    pub block_time: Option<i64>,
}

impl ParsedTransactionView {
    pub fn fee_payer(&self) -> Option<&str> {
        self.account_keys.first().map(String::as_str)
    }

    pub fn fee_payer_pubkey(&self) -> Option<Pubkey> {
        use std::str::FromStr;
        self.fee_payer().and_then(|key| Pubkey::from_str(key).ok())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AccountView {
    pub lamports: u64,
    pub owner: Pubkey,
}

#[derive(Debug, Clone, Copy)]
pub struct TokenAccountView {
    pub program_id: Pubkey,
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
    pub close_authority: Option<Pubkey>,
}

#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub error: Option<String>,
}

impl SimulationOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Chain access used by the pipeline stages. Everything the scanner, auditor
/// and reclaimer know about the chain goes through this seam, so the stages
/// can be exercised against a mock gateway.
#[automock]
#[async_trait]
pub trait RpcGateway: Send + Sync {
    /// Signature history for an address, newest first. `before` is the
    /// pagination cursor: only signatures older than it are returned.
    async fn signatures_for_address(
        &self,
        address: Pubkey,
        before: Option<String>,
        limit: usize,
    ) -> Result<Vec<SignatureRecord>, ReclaimError>;

    /// Fully parsed transaction detail, or None when the transaction is
    /// unknown to the node or not decodable.
    async fn parsed_transaction(
        &self,
        signature: String,
    ) -> Result<Option<ParsedTransactionView>, ReclaimError>;

    async fn account_info(&self, address: Pubkey) -> Result<Option<AccountView>, ReclaimError>;

    /// SPL token account state (either token program), or None when the
    /// account does not exist or is not a token account.
    async fn token_account(
        &self,
        address: Pubkey,
    ) -> Result<Option<TokenAccountView>, ReclaimError>;

    async fn latest_blockhash(&self) -> Result<Hash, ReclaimError>;

    async fn simulate_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<SimulationOutcome, ReclaimError>;

    async fn send_and_confirm_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<Signature, ReclaimError>;
}
