#![no_std]

mod pool;
mod position;
mod registry;

pub use pool::*;
pub use position::*;
pub use registry::*;

/// Oracle rates and internal pool balances are normalized to 18 decimals
pub const RATE_PRECISION: i128 = 1_000_000_000_000_000_000;

/// Fee denominator: fees are expressed in parts per million
/// 400 = 0.04%, 3000 = 0.3%, 10000 = 1%
pub const FEE_DENOMINATOR: u32 = 1_000_000;

/// Maximum pool swap fee (5%)
pub const MAX_POOL_FEE: u32 = 50_000;

/// Maximum admin share of the pool swap fee (100%)
pub const MAX_ADMIN_FEE: u32 = 1_000_000;

/// Maximum synth exchange fee (10%)
pub const MAX_EXCHANGE_FEE: u32 = 100_000;

/// Amplification coefficient bounds for stable pools
pub const MIN_AMP: u128 = 1;
pub const MAX_AMP: u128 = 1_000_000;

/// Default settlement delay in seconds after a swap into a position
/// before its synths become withdrawable
pub const DEFAULT_SETTLE_DELAY: u64 = 180;

/// Sentinel position id: swapping with this id mints a new position
pub const NEW_POSITION: u64 = 0;

/// Token amounts are carried as i128 (SEP-41); internal math is unsigned
pub fn amount_to_u128(amount: i128) -> u128 {
    if amount < 0 {
        panic!("Amount must be positive");
    }
    amount as u128
}

/// Precision multiplier normalizing a token's decimals to 18
pub fn precision_mul_for_decimals(decimals: u32) -> u128 {
    if decimals > 18 {
        panic!("Unsupported decimals");
    }
    10u128.pow(18 - decimals)
}
