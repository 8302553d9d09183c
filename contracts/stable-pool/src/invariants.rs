// ============================================================================
// INVARIANTS MODULE - For Formal Verification
// ============================================================================
//
// This module defines invariant checking functions that express critical
// properties of the stable pool contract. These functions are designed to
// be used with formal verification tools and property tests.
//
// INVARIANT CATEGORIES:
//
// 1. CONFIG INVARIANTS
//    - Amplification and fees are within valid bounds
//
// 2. BALANCE INVARIANTS
//    - Recorded balances never go negative
//    - Recorded balances plus admin fees are backed by token holdings
//
// 3. INVARIANT-D PROPERTIES
//    - D grows on deposits
//    - D is preserved by exchanges up to fees and rounding
//
// 4. SHARE INVARIANTS
//    - Share supply is conserved by mint and burn
//    - Virtual price never decreases
//
// ============================================================================

use synth_types::{PoolConfig, PoolState, MAX_ADMIN_FEE, MAX_AMP, MAX_POOL_FEE, MIN_AMP};

// ============================================================================
// CONFIG INVARIANTS
// ============================================================================

/// Invariant: amplification coefficient is within bounds
///
/// Property:
///   MIN_AMP <= amp <= MAX_AMP
pub fn amp_in_range(config: &PoolConfig) -> bool {
    config.amp >= MIN_AMP && config.amp <= MAX_AMP
}

/// Invariant: fee configuration is within bounds
///
/// Property:
///   fee <= MAX_POOL_FEE && admin_fee <= MAX_ADMIN_FEE
pub fn fees_valid(config: &PoolConfig) -> bool {
    config.fee <= MAX_POOL_FEE && config.admin_fee <= MAX_ADMIN_FEE
}

// ============================================================================
// BALANCE INVARIANTS
// ============================================================================

/// Invariant: recorded balances and admin fees are non-negative
pub fn balances_non_negative(state: &PoolState) -> bool {
    state.balance_a >= 0
        && state.balance_b >= 0
        && state.admin_fee_a >= 0
        && state.admin_fee_b >= 0
}

/// Invariant: the books are backed by actual token holdings
///
/// Property:
///   balance + admin_fee <= token.balance(pool)
///
/// The pool's token account holds the working balance plus unclaimed
/// admin fees. Donations can push holdings above the recorded total but
/// never below it.
pub fn recorded_backed_by_holdings(balance: i128, admin_fee: i128, holdings: i128) -> bool {
    balance + admin_fee <= holdings
}

/// Invariant: fee taken from an exchange never exceeds the gross output
///
/// Property:
///   dy_fee <= dy_gross && dy_admin_fee <= dy_fee
pub fn fee_bounded_by_output(dy_gross: u128, dy_fee: u128, dy_admin_fee: u128) -> bool {
    dy_fee <= dy_gross && dy_admin_fee <= dy_fee
}

/// Invariant: an exchange never pays out more than the output-side balance
pub fn output_bounded_by_balance(dy: u128, dy_admin_fee: u128, balance_out: u128) -> bool {
    dy + dy_admin_fee <= balance_out
}

// ============================================================================
// INVARIANT-D PROPERTIES
// ============================================================================

/// Invariant: deposits strictly increase D
///
/// Property:
///   d_after > d_before
pub fn d_increases_on_deposit(d_before: u128, d_after: u128) -> bool {
    d_after > d_before
}

/// Invariant: exchanges preserve D up to fees and rounding
///
/// Property:
///   d_after + tolerance >= d_before
///
/// The output is shaved by one unit against rounding and the retained
/// fee share stays in the pool, so D can only drop by a bounded amount.
pub fn d_preserved_on_exchange(d_before: u128, d_after: u128, tolerance: u128) -> bool {
    d_after + tolerance >= d_before
}

// ============================================================================
// SHARE INVARIANTS
// ============================================================================

/// Invariant: share supply conservation on mint
///
/// Property:
///   total_after == total_before + minted
pub fn shares_conserved_on_mint(total_before: i128, minted: i128, total_after: i128) -> bool {
    total_after == total_before + minted
}

/// Invariant: share supply conservation on burn
///
/// Property:
///   total_after == total_before - burned
pub fn shares_conserved_on_burn(total_before: i128, burned: i128, total_after: i128) -> bool {
    total_after == total_before - burned
}

/// Invariant: virtual price never decreases
///
/// Property:
///   vp_after >= vp_before
///
/// Proportional deposits and withdrawals leave the virtual price
/// unchanged; exchanges add retained fees on top.
pub fn virtual_price_non_decreasing(vp_before: i128, vp_after: i128) -> bool {
    vp_after >= vp_before
}

// ============================================================================
// TESTS
// ============================================================================
