//! Shared builders for gateway views and file-backed stores used across the
//! stage tests.

use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;

use crate::{
    gateway::{ParsedInstructionView, ParsedTransactionView, SignatureRecord, TokenAccountView},
    ledger::Ledger,
    safety::SafetyGate,
};

pub fn ledger_in() -> (tempfile::TempDir, Arc<Ledger>) {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(Ledger::open(dir.path().join("ledger.jsonl")));
    (dir, ledger)
}

pub fn safety_in() -> (tempfile::TempDir, Arc<SafetyGate>) {
    let dir = tempfile::tempdir().unwrap();
    let gate = Arc::new(SafetyGate::new(
        dir.path().join("whitelist.json"),
        dir.path().join("emergency.json"),
    ));
    (dir, gate)
}

/// `count` history records named sig-0 .. sig-{count-1}, newest first.
pub fn signature_records(count: usize) -> Vec<SignatureRecord> {
    (0..count)
        .map(|i| SignatureRecord {
            signature: format!("sig-{i}"),
            block_time: Some(1_700_000_000 - i as i64),
        })
        .collect()
}

/// A signature far enough in the past to pass any sane inactivity threshold.
pub fn old_signature() -> SignatureRecord {
    let one_year_ago = chrono::Utc::now().timestamp() - 365 * 24 * 60 * 60;
    SignatureRecord { signature: "sig-old".to_string(), block_time: Some(one_year_ago) }
}

/// A signature from an hour ago.
pub fn recent_signature() -> SignatureRecord {
    let an_hour_ago = chrono::Utc::now().timestamp() - 60 * 60;
    SignatureRecord { signature: "sig-recent".to_string(), block_time: Some(an_hour_ago) }
}

pub fn empty_token_account(_address: &Pubkey) -> TokenAccountView {
    TokenAccountView {
        program_id: spl_token_interface::id(),
        mint: Pubkey::new_unique(),
        owner: Pubkey::new_unique(),
        amount: 0,
        close_authority: None,
    }
}

/// A transaction paying fees from `fee_payer` that initializes one token
/// account with fresh keys.
pub fn init_account_transaction(fee_payer: &Pubkey, block_time: i64) -> ParsedTransactionView {
    init_account_transaction_for(
        fee_payer,
        &Pubkey::new_unique(),
        &Pubkey::new_unique(),
        block_time,
    )
}

/// Same, with explicit created account and declared owner.
pub fn init_account_transaction_for(
    fee_payer: &Pubkey,
    account: &Pubkey,
    owner: &Pubkey,
    block_time: i64,
) -> ParsedTransactionView {
    let mint = Pubkey::new_unique();
    let instruction = ParsedInstructionView {
        program_id: spl_token_interface::id().to_string(),
        kind: Some("initializeAccount".to_string()),
        info: serde_json::json!({
            "account": account.to_string(),
            "mint": mint.to_string(),
            "owner": owner.to_string(),
            "rentSysvar": "SysvarRent111111111111111111111111111111111",
        }),
        memo: None,
    };

    ParsedTransactionView {
        account_keys: vec![
            fee_payer.to_string(),
            account.to_string(),
            mint.to_string(),
            owner.to_string(),
        ],
        instructions: vec![instruction],
        block_time: Some(block_time),
    }
}

/// A fee-payer transaction with no token instructions at all.
pub fn plain_transaction(fee_payer: &Pubkey) -> ParsedTransactionView {
    let instruction = ParsedInstructionView {
        program_id: solana_sdk::pubkey::Pubkey::default().to_string(),
        kind: Some("transfer".to_string()),
        info: serde_json::json!({
            "source": fee_payer.to_string(),
            "destination": Pubkey::new_unique().to_string(),
            "lamports": 1,
        }),
        memo: None,
    };

    ParsedTransactionView {
        account_keys: vec![fee_payer.to_string()],
        instructions: vec![instruction],
        block_time: Some(1_700_000_000),
    }
}
