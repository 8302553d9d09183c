use soroban_fixed_point_math::SorobanFixedPoint;
use soroban_sdk::Env;
use synth_types::{FEE_DENOMINATOR, RATE_PRECISION};

/// USD value of `amount` of an asset priced at an 18-decimal `rate`
pub fn to_usd(env: &Env, amount: i128, rate: i128) -> i128 {
    amount.fixed_mul_floor(env, &rate, &RATE_PRECISION)
}

/// Asset amount whose 18-decimal `rate` values it at `usd`
pub fn from_usd(env: &Env, usd: i128, rate: i128) -> i128 {
    usd.fixed_div_floor(env, &rate, &RATE_PRECISION)
}

/// Cross-rate conversion: `amount * src_rate / dst_rate`
pub fn convert(env: &Env, amount: i128, src_rate: i128, dst_rate: i128) -> i128 {
    amount.fixed_mul_floor(env, &src_rate, &dst_rate)
}

/// Split `amount` into `(net, fee)` for a parts-per-million fee
pub fn apply_fee(env: &Env, amount: i128, fee_ppm: u32) -> (i128, i128) {
    let fee = amount.fixed_mul_floor(env, &(fee_ppm as i128), &(FEE_DENOMINATOR as i128));
    (amount - fee, fee)
}
