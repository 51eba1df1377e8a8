use solana_sdk::pubkey::Pubkey;

/// How a discovered account was created on-chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    TokenAccount,
    SystemAccount,
    ProgramDerived,
}

/// Which detector classified a transaction as sponsored. Ordered by
/// decreasing strength; `FeePayerDefault` is the explicit fallback policy
/// (the operator paid, nothing stronger matched).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SponsorshipSignal {
    SponsorProgram,
    MemoMarker,
    RelayNode,
    FeePayerDefault,
}

/// An account whose creation rent was paid by the operator wallet.
/// Produced only by the scanner; immutable afterwards.
#[derive(Debug, Clone)]
pub struct SponsoredAccount {
    pub address: Pubkey,
    pub kind: AccountKind,
    /// Block time of the creating transaction, unix milliseconds.
    pub created_at: Option<i64>,
    pub rent_lamports: u64,
    /// Declared owner of the new account (not the operator).
    pub owner: Pubkey,
    pub mint: Option<Pubkey>,
    pub sponsorship: SponsorshipSignal,
}

impl SponsoredAccount {
    /// True when classification rests on a configured identifier rather than
    /// the fee-payer fallback.
    pub fn confident(&self) -> bool {
        !matches!(self.sponsorship, SponsorshipSignal::FeePayerDefault)
    }
}

/// Confident-vs-fallback breakdown over a scan's candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SponsorshipStats {
    pub total: usize,
    pub confident: usize,
    pub fallback: usize,
    pub confident_lamports: u64,
    pub fallback_lamports: u64,
}
