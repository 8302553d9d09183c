use soroban_sdk::{Env, U256};

/// floor((a * b) / denominator) with a 256-bit intermediate product
pub fn mul_div_down(env: &Env, a: u128, b: u128, denominator: u128) -> u128 {
    if denominator == 0 {
        panic!("Division by zero");
    }

    let product = U256::from_u128(env, a).mul(&U256::from_u128(env, b));
    let quotient = product.div(&U256::from_u128(env, denominator));

    u256_to_u128(env, &quotient)
}

/// Narrow a U256 back to u128, panics if the value does not fit
pub fn u256_to_u128(env: &Env, value: &U256) -> u128 {
    if value.gt(&U256::from_u128(env, u128::MAX)) {
        panic!("Overflow converting to u128");
    }
    value.to_u128().unwrap()
}
