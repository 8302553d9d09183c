use soroban_sdk::{contracttype, Address};

/// Pool configuration - immutable after creation
#[contracttype]
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Registry contract address
    pub registry: Address,
    /// Coin 0: collateral token (e.g. DAI)
    pub token_a: Address,
    /// Coin 1: bridge synth (e.g. sUSD)
    pub token_b: Address,
    /// Multiplier normalizing token_a amounts to 18 decimals
    pub precision_mul_a: u128,
    /// Multiplier normalizing token_b amounts to 18 decimals
    pub precision_mul_b: u128,
    /// Amplification coefficient A
    pub amp: u128,
    /// Swap fee in parts per million
    pub fee: u32,
    /// Admin share of the swap fee in parts per million
    pub admin_fee: u32,
}

/// Current pool state - stored in Instance storage for frequent access
#[contracttype]
#[derive(Clone, Debug)]
pub struct PoolState {
    /// Pool balance of token_a, net of admin fees
    pub balance_a: i128,
    /// Pool balance of token_b, net of admin fees
    pub balance_b: i128,
    /// Accrued admin fees in token_a
    pub admin_fee_a: i128,
    /// Accrued admin fees in token_b
    pub admin_fee_b: i128,
}

impl PoolState {
    pub fn new() -> Self {
        Self {
            balance_a: 0,
            balance_b: 0,
            admin_fee_a: 0,
            admin_fee_b: 0,
        }
    }
}

impl Default for PoolState {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// EXCHANGE COMPUTATION TYPES
// These types separate pure computation from storage and transfers
// ============================================================================

/// Result of a pure exchange computation against a snapshot of balances
#[derive(Clone, Debug)]
pub struct ExchangeResult {
    /// Output amount delivered to the taker (fee already deducted)
    pub dy: u128,
    /// Total fee charged on the output
    pub dy_fee: u128,
    /// Portion of the fee accrued to the admin
    pub dy_admin_fee: u128,
    /// Input-side pool balance after the exchange
    pub new_balance_in: u128,
    /// Output-side pool balance after the exchange
    pub new_balance_out: u128,
}
