#![no_std]

mod exchange;
mod invariants;
mod liquidity;
mod storage;

use soroban_sdk::{contract, contractimpl, token, Address, Env, IntoVal, Symbol};
use storage::{
    get_config, get_shares, get_state, get_total_shares, set_config, set_state, DataKey,
};
use synth_math::{get_d, mul_div_down};
use synth_types::{
    amount_to_u128, precision_mul_for_decimals, ExchangeParams, PoolConfig, PoolState,
    MAX_ADMIN_FEE, MAX_AMP, MAX_POOL_FEE, MIN_AMP, RATE_PRECISION,
};

#[contract]
pub struct StablePool;

#[contractimpl]
impl StablePool {
    /// Initialize a new stable pool pairing a collateral token against
    /// the bridge synth. Precision multipliers are derived from the
    /// tokens' reported decimals.
    pub fn initialize(
        env: Env,
        registry: Address,
        token_a: Address,
        token_b: Address,
        amp: u128,
        fee: u32,
        admin_fee: u32,
    ) {
        // Ensure not already initialized
        if env.storage().instance().has(&DataKey::Config) {
            panic!("Already initialized");
        }

        if token_a == token_b {
            panic!("Identical tokens");
        }
        if amp < MIN_AMP || amp > MAX_AMP {
            panic!("Amp out of range");
        }
        if fee > MAX_POOL_FEE {
            panic!("Fee too high");
        }
        if admin_fee > MAX_ADMIN_FEE {
            panic!("Admin fee too high");
        }

        let decimals_a = token::Client::new(&env, &token_a).decimals();
        let decimals_b = token::Client::new(&env, &token_b).decimals();

        let config = PoolConfig {
            registry,
            token_a,
            token_b,
            precision_mul_a: precision_mul_for_decimals(decimals_a),
            precision_mul_b: precision_mul_for_decimals(decimals_b),
            amp,
            fee,
            admin_fee,
        };
        set_config(&env, &config);
        set_state(&env, &PoolState::new());
    }

    /// Deposit both tokens and mint LP shares
    ///
    /// # Returns
    /// Amount of LP shares minted
    pub fn add_liquidity(
        env: Env,
        from: Address,
        amount_a: i128,
        amount_b: i128,
        min_shares: i128,
    ) -> i128 {
        from.require_auth();
        liquidity::add_liquidity(&env, from, amount_a, amount_b, min_shares)
    }

    /// Burn LP shares and withdraw proportional amounts of both tokens
    ///
    /// # Returns
    /// (amount_a, amount_b) - Token amounts withdrawn
    pub fn remove_liquidity(
        env: Env,
        from: Address,
        shares: i128,
        min_a: i128,
        min_b: i128,
    ) -> (i128, i128) {
        from.require_auth();
        liquidity::remove_liquidity(&env, from, shares, min_a, min_b)
    }

    /// Swap `dx` of `token_in` for the paired token.
    /// Input is pulled from `from`, output is sent to `to`.
    ///
    /// # Returns
    /// Output amount delivered, net of fees
    pub fn exchange(
        env: Env,
        from: Address,
        token_in: Address,
        dx: i128,
        min_dy: i128,
        to: Address,
    ) -> i128 {
        from.require_auth();
        exchange::exchange(&env, from, token_in, dx, min_dy, to)
    }

    /// Swap input that was already transferred to the pool.
    ///
    /// The input amount is measured against the recorded balances, so a
    /// caller can move tokens straight from the user into the pool and
    /// invoke this without holding funds itself.
    ///
    /// # Returns
    /// Output amount delivered, net of fees
    pub fn exchange_received(env: Env, token_in: Address, min_dy: i128, to: Address) -> i128 {
        exchange::exchange_received(&env, token_in, min_dy, to)
    }

    /// Claim accrued admin fees to the registry's fee recipient.
    /// Only the registry admin may claim.
    ///
    /// # Returns
    /// (fee_a, fee_b) - Admin fee amounts paid out
    pub fn claim_admin_fees(env: Env) -> (i128, i128) {
        let config = get_config(&env);
        let admin = fetch_registry_admin(&env, &config.registry);
        admin.require_auth();

        let params = fetch_exchange_params(&env, &config.registry);
        let mut state = get_state(&env);
        let (fee_a, fee_b) = (state.admin_fee_a, state.admin_fee_b);

        let contract_address = env.current_contract_address();
        if fee_a > 0 {
            token::Client::new(&env, &config.token_a).transfer(
                &contract_address,
                &params.fee_recipient,
                &fee_a,
            );
        }
        if fee_b > 0 {
            token::Client::new(&env, &config.token_b).transfer(
                &contract_address,
                &params.fee_recipient,
                &fee_b,
            );
        }

        state.admin_fee_a = 0;
        state.admin_fee_b = 0;
        set_state(&env, &state);

        (fee_a, fee_b)
    }

    // === View Functions ===

    /// Quote the output for swapping `dx` of `token_in`, net of fees
    pub fn get_dy(env: Env, token_in: Address, dx: i128) -> i128 {
        if dx <= 0 {
            panic!("Amount must be positive");
        }
        let config = get_config(&env);
        let state = get_state(&env);
        let a_to_b = exchange::is_token_a(&config, &token_in);
        let result = exchange::compute_exchange(&env, &config, &state, a_to_b, dx as u128);
        result.dy as i128
    }

    /// Get the value of one LP share in 18-decimal units
    pub fn get_virtual_price(env: Env) -> i128 {
        let config = get_config(&env);
        let state = get_state(&env);
        let total = get_total_shares(&env);
        if total <= 0 {
            panic!("No liquidity");
        }

        let d = get_d(
            &env,
            amount_to_u128(state.balance_a) * config.precision_mul_a,
            amount_to_u128(state.balance_b) * config.precision_mul_b,
            config.amp,
        );
        mul_div_down(&env, d, RATE_PRECISION as u128, total as u128) as i128
    }

    /// Get pool configuration
    pub fn get_config(env: Env) -> PoolConfig {
        get_config(&env)
    }

    /// Get current pool state
    pub fn get_state(env: Env) -> PoolState {
        get_state(&env)
    }

    /// Get LP share balance of a provider
    pub fn shares_of(env: Env, provider: Address) -> i128 {
        get_shares(&env, &provider)
    }

    /// Get total LP shares outstanding
    pub fn total_shares(env: Env) -> i128 {
        get_total_shares(&env)
    }

    /// Get collateral token address
    pub fn token_a(env: Env) -> Address {
        get_config(&env).token_a
    }

    /// Get bridge synth token address
    pub fn token_b(env: Env) -> Address {
        get_config(&env).token_b
    }
}

// Registry lookups via invoke

fn fetch_registry_admin(env: &Env, registry: &Address) -> Address {
    env.invoke_contract(registry, &Symbol::new(env, "get_admin"), ().into_val(env))
}

fn fetch_exchange_params(env: &Env, registry: &Address) -> ExchangeParams {
    env.invoke_contract(
        registry,
        &Symbol::new(env, "get_exchange_params"),
        ().into_val(env),
    )
}
