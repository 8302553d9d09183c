use crate::storage::{
    get_config, get_shares, get_state, get_total_shares, set_shares, set_state, set_total_shares,
};
use soroban_sdk::{token, Address, Env};
use synth_math::{get_d, mul_div_down};
use synth_types::amount_to_u128;

/// Deposit tokens and mint LP shares.
///
/// The first deposit must fund both sides and mints shares equal to the
/// invariant D. Later deposits mint `total * (D1 - D0) / D0`.
pub fn add_liquidity(
    env: &Env,
    from: Address,
    amount_a: i128,
    amount_b: i128,
    min_shares: i128,
) -> i128 {
    if amount_a < 0 || amount_b < 0 {
        panic!("Amount must be positive");
    }
    if amount_a == 0 && amount_b == 0 {
        panic!("Amount must be positive");
    }

    let config = get_config(env);
    let mut state = get_state(env);
    let total = get_total_shares(env);

    if total == 0 && (amount_a == 0 || amount_b == 0) {
        panic!("Initial deposit requires both tokens");
    }

    let d0 = if total > 0 {
        get_d(
            env,
            amount_to_u128(state.balance_a) * config.precision_mul_a,
            amount_to_u128(state.balance_b) * config.precision_mul_b,
            config.amp,
        )
    } else {
        0
    };

    let new_balance_a = state.balance_a + amount_a;
    let new_balance_b = state.balance_b + amount_b;
    let d1 = get_d(
        env,
        amount_to_u128(new_balance_a) * config.precision_mul_a,
        amount_to_u128(new_balance_b) * config.precision_mul_b,
        config.amp,
    );
    if d1 <= d0 {
        panic!("D must increase");
    }

    let minted = if total == 0 {
        d1 as i128
    } else {
        mul_div_down(env, total as u128, d1 - d0, d0) as i128
    };
    if minted < min_shares {
        panic!("Slippage limit exceeded");
    }

    // Pull deposits from the provider
    let contract_address = env.current_contract_address();
    if amount_a > 0 {
        token::Client::new(env, &config.token_a).transfer(&from, &contract_address, &amount_a);
    }
    if amount_b > 0 {
        token::Client::new(env, &config.token_b).transfer(&from, &contract_address, &amount_b);
    }

    state.balance_a = new_balance_a;
    state.balance_b = new_balance_b;
    set_state(env, &state);

    set_shares(env, &from, get_shares(env, &from) + minted);
    set_total_shares(env, total + minted);

    minted
}

/// Burn LP shares and withdraw the proportional amounts of both tokens
pub fn remove_liquidity(
    env: &Env,
    from: Address,
    shares: i128,
    min_a: i128,
    min_b: i128,
) -> (i128, i128) {
    if shares <= 0 {
        panic!("Amount must be positive");
    }

    let user_shares = get_shares(env, &from);
    if user_shares < shares {
        panic!("Insufficient shares");
    }

    let config = get_config(env);
    let mut state = get_state(env);
    let total = get_total_shares(env);

    let amount_a = mul_div_down(
        env,
        amount_to_u128(state.balance_a),
        shares as u128,
        total as u128,
    ) as i128;
    let amount_b = mul_div_down(
        env,
        amount_to_u128(state.balance_b),
        shares as u128,
        total as u128,
    ) as i128;
    if amount_a < min_a || amount_b < min_b {
        panic!("Slippage limit exceeded");
    }

    set_shares(env, &from, user_shares - shares);
    set_total_shares(env, total - shares);

    state.balance_a -= amount_a;
    state.balance_b -= amount_b;
    set_state(env, &state);

    let contract_address = env.current_contract_address();
    if amount_a > 0 {
        token::Client::new(env, &config.token_a).transfer(&contract_address, &from, &amount_a);
    }
    if amount_b > 0 {
        token::Client::new(env, &config.token_b).transfer(&contract_address, &from, &amount_b);
    }

    (amount_a, amount_b)
}
