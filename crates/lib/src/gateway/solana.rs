use std::{str::FromStr, sync::Arc};

use async_trait::async_trait;
use solana_client::{
    nonblocking::rpc_client::RpcClient, rpc_client::GetConfirmedSignaturesForAddress2Config,
    rpc_config::RpcTransactionConfig,
};
use solana_sdk::{
    account::Account, hash::Hash, program_pack::Pack, pubkey::Pubkey, signature::Signature,
    transaction::Transaction,
};
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, EncodedTransaction, UiInstruction, UiMessage,
    UiParsedInstruction, UiTransactionEncoding,
};

use crate::{
    error::ReclaimError,
    gateway::{
        AccountView, ParsedInstructionView, ParsedTransactionView, RpcGateway, SignatureRecord,
        SimulationOutcome, TokenAccountView,
    },
};

/// RpcGateway implementation over the nonblocking Solana RPC client.
pub struct SolanaRpcGateway {
    client: Arc<RpcClient>,
}

impl SolanaRpcGateway {
    pub fn new(client: Arc<RpcClient>) -> Self {
        Self { client }
    }

    fn transaction_view(
        encoded: EncodedConfirmedTransactionWithStatusMeta,
    ) -> Option<ParsedTransactionView> {
        let ui_transaction = match encoded.transaction.transaction {
            EncodedTransaction::Json(ui) => ui,
            _ => return None,
        };
        let message = match ui_transaction.message {
            UiMessage::Parsed(parsed) => parsed,
            UiMessage::Raw(_) => return None,
        };

        let account_keys =
            message.account_keys.iter().map(|key| key.pubkey.clone()).collect::<Vec<_>>();
        let instructions =
            message.instructions.iter().filter_map(Self::instruction_view).collect::<Vec<_>>();

        Some(ParsedTransactionView { account_keys, instructions, block_time: encoded.block_time })
    }

    fn instruction_view(instruction: &UiInstruction) -> Option<ParsedInstructionView> {
        match instruction {
            UiInstruction::Parsed(UiParsedInstruction::Parsed(parsed)) => {
                Some(ParsedInstructionView {
                    program_id: parsed.program_id.clone(),
                    kind: parsed
                        .parsed
                        .get("type")
                        .and_then(|v| v.as_str())
                        .map(str::to_string),
                    info: parsed
                        .parsed
                        .get("info")
                        .cloned()
                        .unwrap_or(serde_json::Value::Null),
                    // spl-memo instructions parse to a bare string
                    memo: parsed.parsed.as_str().map(str::to_string),
                })
            }
            UiInstruction::Parsed(UiParsedInstruction::PartiallyDecoded(raw)) => {
                Some(ParsedInstructionView {
                    program_id: raw.program_id.clone(),
                    kind: None,
                    info: serde_json::Value::Null,
                    memo: None,
                })
            }
            UiInstruction::Compiled(_) => None,
        }
    }

    fn token_account_view(address: &Pubkey, account: &Account) -> Option<TokenAccountView> {
        let program_id = account.owner;
        if program_id == spl_token_interface::id() {
            let state = spl_token_interface::state::Account::unpack(&account.data).ok()?;
            return Some(TokenAccountView {
                program_id,
                mint: state.mint,
                owner: state.owner,
                amount: state.amount,
                close_authority: state.close_authority.into(),
            });
        }
        if program_id == spl_token_2022_interface::id() {
            let state = spl_token_2022_interface::state::Account::unpack(&account.data).ok()?;
            return Some(TokenAccountView {
                program_id,
                mint: state.mint,
                owner: state.owner,
                amount: state.amount,
                close_authority: state.close_authority.into(),
            });
        }
        log::debug!("{address} is not owned by a token program");
        None
    }
}

#[async_trait]
impl RpcGateway for SolanaRpcGateway {
    async fn signatures_for_address(
        &self,
        address: Pubkey,
        before: Option<String>,
        limit: usize,
    ) -> Result<Vec<SignatureRecord>, ReclaimError> {
        let before = before
            .map(|s| Signature::from_str(&s))
            .transpose()
            .map_err(|e| ReclaimError::ValidationError(format!("Invalid cursor: {e}")))?;

        let config = GetConfirmedSignaturesForAddress2Config {
            before,
            until: None,
            limit: Some(limit),
            commitment: None,
        };

        let statuses =
            self.client.get_signatures_for_address_with_config(&address, config).await?;

        Ok(statuses
            .into_iter()
            .map(|status| SignatureRecord {
                signature: status.signature,
                block_time: status.block_time,
            })
            .collect())
    }

    async fn parsed_transaction(
        &self,
        signature: String,
    ) -> Result<Option<ParsedTransactionView>, ReclaimError> {
        let signature = Signature::from_str(&signature)
            .map_err(|e| ReclaimError::ValidationError(format!("Invalid signature: {e}")))?;

        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::JsonParsed),
            commitment: None,
            max_supported_transaction_version: Some(0),
        };

        match self.client.get_transaction_with_config(&signature, config).await {
            Ok(encoded) => Ok(Self::transaction_view(encoded)),
            Err(e) => {
                let err = ReclaimError::from(e);
                if matches!(err, ReclaimError::AccountNotFound(_)) {
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn account_info(&self, address: Pubkey) -> Result<Option<AccountView>, ReclaimError> {
        let response = self
            .client
            .get_account_with_commitment(&address, self.client.commitment())
            .await?;
        Ok(response
            .value
            .map(|account| AccountView { lamports: account.lamports, owner: account.owner }))
    }

    async fn token_account(
        &self,
        address: Pubkey,
    ) -> Result<Option<TokenAccountView>, ReclaimError> {
        let response = self
            .client
            .get_account_with_commitment(&address, self.client.commitment())
            .await?;
        Ok(response.value.and_then(|account| Self::token_account_view(&address, &account)))
    }

    async fn latest_blockhash(&self) -> Result<Hash, ReclaimError> {
        Ok(self.client.get_latest_blockhash().await?)
    }

    async fn simulate_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<SimulationOutcome, ReclaimError> {
        let response = self.client.simulate_transaction(transaction).await?;
        Ok(SimulationOutcome { error: response.value.err.map(|e| e.to_string()) })
    }

    async fn send_and_confirm_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<Signature, ReclaimError> {
        self.client
            .send_and_confirm_transaction(transaction)
            .await
            .map_err(|e| ReclaimError::SubmissionFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::program_option::COption;

    fn packed_token_account(amount: u64, close_authority: COption<Pubkey>) -> Vec<u8> {
        let state = spl_token_interface::state::Account {
            mint: Pubkey::new_unique(),
            owner: Pubkey::new_unique(),
            amount,
            delegate: COption::None,
            state: spl_token_interface::state::AccountState::Initialized,
            is_native: COption::None,
            delegated_amount: 0,
            close_authority,
        };
        let mut data = vec![0u8; spl_token_interface::state::Account::LEN];
        spl_token_interface::state::Account::pack(state, &mut data).unwrap();
        data
    }

    #[test]
    fn test_token_account_view_unpacks_spl_account() {
        let authority = Pubkey::new_unique();
        let account = Account {
            lamports: 2_039_280,
            data: packed_token_account(42, COption::Some(authority)),
            owner: spl_token_interface::id(),
            executable: false,
            rent_epoch: 0,
        };

        let view =
            SolanaRpcGateway::token_account_view(&Pubkey::new_unique(), &account).unwrap();
        assert_eq!(view.amount, 42);
        assert_eq!(view.close_authority, Some(authority));
        assert_eq!(view.program_id, spl_token_interface::id());
    }

    #[test]
    fn test_token_account_view_rejects_system_account() {
        let account = Account {
            lamports: 1,
            data: vec![],
            owner: solana_sdk::pubkey::Pubkey::default(),
            executable: false,
            rent_epoch: 0,
        };
        assert!(SolanaRpcGateway::token_account_view(&Pubkey::new_unique(), &account).is_none());
    }
}
