use crate::storage::{get_config, get_state, set_state};
use soroban_sdk::{token, Address, Env};
use synth_math::{get_dy, mul_div_down};
use synth_types::{amount_to_u128, ExchangeResult, PoolConfig, PoolState, FEE_DENOMINATOR};

/// Resolve swap direction from the input token address
pub fn is_token_a(config: &PoolConfig, token_in: &Address) -> bool {
    if *token_in == config.token_a {
        true
    } else if *token_in == config.token_b {
        false
    } else {
        panic!("Token not in pool");
    }
}

/// Compute an exchange against a snapshot of pool balances.
///
/// Balances are normalized to 18 decimals before running the invariant,
/// the fee is taken from the gross output, and results are converted back
/// to raw token amounts.
pub fn compute_exchange(
    env: &Env,
    config: &PoolConfig,
    state: &PoolState,
    a_to_b: bool,
    dx: u128,
) -> ExchangeResult {
    let (balance_in, balance_out, mul_in, mul_out) = if a_to_b {
        (
            amount_to_u128(state.balance_a),
            amount_to_u128(state.balance_b),
            config.precision_mul_a,
            config.precision_mul_b,
        )
    } else {
        (
            amount_to_u128(state.balance_b),
            amount_to_u128(state.balance_a),
            config.precision_mul_b,
            config.precision_mul_a,
        )
    };

    let xp_in = balance_in * mul_in;
    let xp_out = balance_out * mul_out;
    let dx_normalized = dx * mul_in;

    // Gross output in 18-decimal units
    let dy_gross = get_dy(env, config.amp, xp_in, xp_out, dx_normalized);

    // Fee comes out of the output side; the admin share of it is
    // tracked separately and excluded from the working balances
    let dy_fee = mul_div_down(
        env,
        dy_gross,
        config.fee as u128,
        FEE_DENOMINATOR as u128,
    );
    let dy_admin_fee_normalized = mul_div_down(
        env,
        dy_fee,
        config.admin_fee as u128,
        FEE_DENOMINATOR as u128,
    );

    // Back to raw token amounts
    let dy = (dy_gross - dy_fee) / mul_out;
    let dy_admin_fee = dy_admin_fee_normalized / mul_out;

    ExchangeResult {
        dy,
        dy_fee: dy_fee / mul_out,
        dy_admin_fee,
        new_balance_in: balance_in + dx,
        new_balance_out: balance_out - dy - dy_admin_fee,
    }
}

/// Swap `dx` of `token_in` for the paired token, pulling the input
/// from `from` and sending the output to `to`
pub fn exchange(
    env: &Env,
    from: Address,
    token_in: Address,
    dx: i128,
    min_dy: i128,
    to: Address,
) -> i128 {
    if dx <= 0 {
        panic!("Amount must be positive");
    }

    let config = get_config(env);
    let mut state = get_state(env);
    let a_to_b = is_token_a(&config, &token_in);

    let result = compute_exchange(env, &config, &state, a_to_b, dx as u128);
    let dy = result.dy as i128;
    if dy < min_dy {
        panic!("Slippage limit exceeded");
    }

    let contract_address = env.current_contract_address();
    let token_out = if a_to_b {
        config.token_b.clone()
    } else {
        config.token_a.clone()
    };

    token::Client::new(env, &token_in).transfer(&from, &contract_address, &dx);
    token::Client::new(env, &token_out).transfer(&contract_address, &to, &dy);

    apply_result(&mut state, a_to_b, &result);
    set_state(env, &state);

    dy
}

/// Swap using input already transferred to the pool.
///
/// The input amount is measured as the pool's actual token balance minus
/// everything the books account for. This lets a router move tokens
/// straight from the user to the pool without an intermediate hop.
pub fn exchange_received(env: &Env, token_in: Address, min_dy: i128, to: Address) -> i128 {
    let config = get_config(env);
    let mut state = get_state(env);
    let a_to_b = is_token_a(&config, &token_in);

    let contract_address = env.current_contract_address();
    let actual = token::Client::new(env, &token_in).balance(&contract_address);
    let recorded = if a_to_b {
        state.balance_a + state.admin_fee_a
    } else {
        state.balance_b + state.admin_fee_b
    };
    let dx = actual - recorded;
    if dx <= 0 {
        panic!("No new deposit");
    }

    let result = compute_exchange(env, &config, &state, a_to_b, dx as u128);
    let dy = result.dy as i128;
    if dy < min_dy {
        panic!("Slippage limit exceeded");
    }

    let token_out = if a_to_b {
        config.token_b.clone()
    } else {
        config.token_a.clone()
    };
    token::Client::new(env, &token_out).transfer(&contract_address, &to, &dy);

    apply_result(&mut state, a_to_b, &result);
    set_state(env, &state);

    dy
}

/// Fold an exchange result back into the recorded pool state
fn apply_result(state: &mut PoolState, a_to_b: bool, result: &ExchangeResult) {
    if a_to_b {
        state.balance_a = result.new_balance_in as i128;
        state.balance_b = result.new_balance_out as i128;
        state.admin_fee_b += result.dy_admin_fee as i128;
    } else {
        state.balance_b = result.new_balance_in as i128;
        state.balance_a = result.new_balance_out as i128;
        state.admin_fee_a += result.dy_admin_fee as i128;
    }
}
