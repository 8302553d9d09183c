use soroban_sdk::{contracttype, Address};

/// Settlement position record - one per minted position id
#[contracttype]
#[derive(Clone, Debug)]
pub struct PositionData {
    /// Synth this position is bound to for its lifetime
    pub synth: Address,
    /// Redeemable synth balance held in custody for this position
    pub underlying_balance: i128,
    /// Ledger timestamp at which the balance becomes withdrawable
    pub settle_time: u64,
}

/// Read-only position view returned by `token_info`
#[contracttype]
#[derive(Clone, Debug)]
pub struct TokenInfo {
    /// Current position owner
    pub owner: Address,
    /// Bound synth token
    pub synth: Address,
    /// Redeemable synth balance
    pub underlying_balance: i128,
    /// Seconds remaining until withdrawal is allowed (0 when settled)
    pub time_to_settle: u64,
}
