use std::collections::HashSet;

use solana_sdk::pubkey::Pubkey;

use crate::{
    config::SponsorshipConfig, gateway::ParsedTransactionView, scanner::types::SponsorshipSignal,
};

/// Ordered sponsorship detectors. Each configured identifier set is tried in
/// priority order; the fee-payer fallback only applies when nothing stronger
/// matched, and its use is visible in the returned signal.
#[derive(Debug, Clone, Default)]
pub struct SponsorshipDetector {
    program_ids: HashSet<String>,
    memo_markers: Vec<String>,
    relay_nodes: HashSet<String>,
}

impl SponsorshipDetector {
    pub fn from_config(config: &SponsorshipConfig) -> Self {
        Self {
            program_ids: config.program_ids.iter().cloned().collect(),
            memo_markers: config.memo_markers.clone(),
            relay_nodes: config.relay_nodes.iter().cloned().collect(),
        }
    }

    pub fn detect(
        &self,
        tx: &ParsedTransactionView,
        operator: &Pubkey,
    ) -> Option<SponsorshipSignal> {
        if tx.instructions.iter().any(|ix| self.program_ids.contains(&ix.program_id)) {
            return Some(SponsorshipSignal::SponsorProgram);
        }

        let memo_hit = tx.instructions.iter().any(|ix| {
            ix.memo
                .as_deref()
                .is_some_and(|memo| self.memo_markers.iter().any(|marker| memo.contains(marker)))
        });
        if memo_hit {
            return Some(SponsorshipSignal::MemoMarker);
        }

        let fee_payer = tx.fee_payer()?;
        if self.relay_nodes.contains(fee_payer) {
            return Some(SponsorshipSignal::RelayNode);
        }

        if tx.fee_payer_pubkey() == Some(*operator) {
            return Some(SponsorshipSignal::FeePayerDefault);
        }

        None
    }
}
