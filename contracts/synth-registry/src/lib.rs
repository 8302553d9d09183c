#![no_std]

use soroban_sdk::{contract, contractimpl, contracttype, Address, Env, IntoVal, Symbol, Vec};
use synth_types::{
    ExchangeParams, PoolConfig, SynthInfo, DEFAULT_SETTLE_DELAY, MAX_EXCHANGE_FEE, RATE_PRECISION,
};

#[contract]
pub struct SynthRegistry;

/// Storage keys for Registry contract
#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    /// Admin address
    Admin,
    /// Bridge synth token address (the USD leg every route crosses)
    BridgeSynth,
    /// Exchange fee and settlement parameters
    Params,
    /// currency key -> synth info
    Synth(Symbol),
    /// synth token address -> currency key
    CurrencyKey(Address),
    /// currency key -> USD rate (18 decimals)
    Rate(Symbol),
    /// collateral token address -> stable pool address
    Pool(Address),
    /// Total number of registered synths (counter for indexed storage)
    SynthCount,
    /// Synth token address at index (indexed storage to avoid unbounded Vec)
    SynthAt(u32),
}

// TTL constants
const INSTANCE_TTL_THRESHOLD: u32 = 17280;
const INSTANCE_TTL_EXTEND: u32 = 518400;
const PERSISTENT_TTL_THRESHOLD: u32 = 17280;
const PERSISTENT_TTL_EXTEND: u32 = 518400;

/// Default exchange fee in parts per million (0.3%)
const DEFAULT_EXCHANGE_FEE: u32 = 3_000;
/// Upper bound for the settlement delay (one day of ledger time)
const MAX_SETTLE_DELAY: u64 = 86_400;

#[contractimpl]
impl SynthRegistry {
    /// Initialize registry with admin, bridge synth and fee recipient.
    /// The bridge synth is registered under `bridge_key` with a fixed 1.0 rate.
    pub fn initialize(
        env: Env,
        admin: Address,
        bridge_synth: Address,
        bridge_key: Symbol,
        fee_recipient: Address,
    ) {
        if env.storage().instance().has(&DataKey::Admin) {
            panic!("Already initialized");
        }

        admin.require_auth();

        env.storage().instance().set(&DataKey::Admin, &admin);
        env.storage()
            .instance()
            .set(&DataKey::BridgeSynth, &bridge_synth);
        env.storage().instance().set(
            &DataKey::Params,
            &ExchangeParams {
                exchange_fee: DEFAULT_EXCHANGE_FEE,
                settle_delay: DEFAULT_SETTLE_DELAY,
                fee_recipient,
            },
        );

        // The bridge synth is a registered synth like any other, but its
        // rate is pinned to 1.0 and cannot be changed.
        write_synth(&env, &bridge_synth, &bridge_key);
        let rate_key = DataKey::Rate(bridge_key);
        env.storage().persistent().set(&rate_key, &RATE_PRECISION);
        extend_persistent_ttl(&env, &rate_key);

        extend_instance_ttl(&env);
    }

    /// Register a new synth token under a currency key
    pub fn add_synth(env: Env, synth: Address, currency_key: Symbol) {
        require_admin(&env);

        if env
            .storage()
            .persistent()
            .has(&DataKey::Synth(currency_key.clone()))
        {
            panic!("Currency key already registered");
        }
        if env
            .storage()
            .persistent()
            .has(&DataKey::CurrencyKey(synth.clone()))
        {
            panic!("Token already registered");
        }

        write_synth(&env, &synth, &currency_key);

        env.events().publish(
            (Symbol::new(&env, "synth_added"),),
            (synth, currency_key),
        );

        extend_instance_ttl(&env);
    }

    /// Register a stable pool for its collateral token.
    /// The pool must pair the collateral against the bridge synth and must
    /// have been initialized pointing at this registry.
    pub fn add_pool(env: Env, pool: Address) {
        require_admin(&env);

        let config = fetch_pool_config(&env, &pool);

        if config.registry != env.current_contract_address() {
            panic!("Pool registry mismatch");
        }
        let bridge_synth: Address = env
            .storage()
            .instance()
            .get(&DataKey::BridgeSynth)
            .expect("Not initialized");
        if config.token_b != bridge_synth {
            panic!("Pool bridge mismatch");
        }

        let pool_key = DataKey::Pool(config.token_a.clone());
        if env.storage().persistent().has(&pool_key) {
            panic!("Pool already registered");
        }

        env.storage().persistent().set(&pool_key, &pool);
        extend_persistent_ttl(&env, &pool_key);

        env.events().publish(
            (Symbol::new(&env, "pool_added"),),
            (config.token_a, pool),
        );

        extend_instance_ttl(&env);
    }

    /// Set the USD rate for a currency key (18 decimals)
    pub fn set_rate(env: Env, currency_key: Symbol, rate: i128) {
        require_admin(&env);

        if rate <= 0 {
            panic!("Rate must be positive");
        }
        if !env
            .storage()
            .persistent()
            .has(&DataKey::Synth(currency_key.clone()))
        {
            panic!("Unknown currency key");
        }
        let bridge_synth: Address = env
            .storage()
            .instance()
            .get(&DataKey::BridgeSynth)
            .expect("Not initialized");
        let bridge_key: Symbol = env
            .storage()
            .persistent()
            .get(&DataKey::CurrencyKey(bridge_synth))
            .expect("Not initialized");
        if currency_key == bridge_key {
            panic!("Bridge rate is fixed");
        }

        let rate_key = DataKey::Rate(currency_key.clone());
        env.storage().persistent().set(&rate_key, &rate);
        extend_persistent_ttl(&env, &rate_key);

        env.events().publish(
            (Symbol::new(&env, "rate_updated"),),
            (currency_key, rate),
        );

        extend_instance_ttl(&env);
    }

    /// Get the USD rate for a currency key (18 decimals)
    pub fn get_rate(env: Env, currency_key: Symbol) -> i128 {
        let rate_key = DataKey::Rate(currency_key);
        let rate = env
            .storage()
            .persistent()
            .get(&rate_key)
            .expect("Rate not found");
        extend_persistent_ttl(&env, &rate_key);
        rate
    }

    /// Set the exchange fee in parts per million
    pub fn set_exchange_fee(env: Env, fee: u32) {
        require_admin(&env);

        if fee > MAX_EXCHANGE_FEE {
            panic!("Fee too high");
        }

        let mut params = read_params(&env);
        params.exchange_fee = fee;
        env.storage().instance().set(&DataKey::Params, &params);
        extend_instance_ttl(&env);
    }

    /// Set the settlement delay in seconds
    pub fn set_settle_delay(env: Env, delay: u64) {
        require_admin(&env);

        if delay > MAX_SETTLE_DELAY {
            panic!("Delay too long");
        }

        let mut params = read_params(&env);
        params.settle_delay = delay;
        env.storage().instance().set(&DataKey::Params, &params);
        extend_instance_ttl(&env);
    }

    /// Set the exchange fee recipient
    pub fn set_fee_recipient(env: Env, recipient: Address) {
        require_admin(&env);

        let mut params = read_params(&env);
        params.fee_recipient = recipient;
        env.storage().instance().set(&DataKey::Params, &params);
        extend_instance_ttl(&env);
    }

    /// Transfer admin role to a new address
    pub fn set_admin(env: Env, new_admin: Address) {
        require_admin(&env);

        env.storage().instance().set(&DataKey::Admin, &new_admin);
        extend_instance_ttl(&env);
    }

    /// Get synth token address for a currency key
    pub fn get_synth(env: Env, currency_key: Symbol) -> Option<Address> {
        let info: Option<SynthInfo> = env
            .storage()
            .persistent()
            .get(&DataKey::Synth(currency_key));
        info.map(|i| i.token)
    }

    /// Get full synth info for a currency key
    pub fn get_synth_info(env: Env, currency_key: Symbol) -> Option<SynthInfo> {
        env.storage()
            .persistent()
            .get(&DataKey::Synth(currency_key))
    }

    /// Get currency key for a synth token address
    pub fn get_currency_key(env: Env, token: Address) -> Option<Symbol> {
        env.storage().persistent().get(&DataKey::CurrencyKey(token))
    }

    /// Check whether a token address is a registered synth
    pub fn is_synth(env: Env, token: Address) -> bool {
        env.storage()
            .persistent()
            .has(&DataKey::CurrencyKey(token))
    }

    /// Get the stable pool for a collateral token
    pub fn get_pool(env: Env, token: Address) -> Option<Address> {
        env.storage().persistent().get(&DataKey::Pool(token))
    }

    /// Get the bridge synth token address
    pub fn get_bridge_synth(env: Env) -> Address {
        extend_instance_ttl(&env);
        env.storage()
            .instance()
            .get(&DataKey::BridgeSynth)
            .expect("Not initialized")
    }

    /// Get exchange fee and settlement parameters
    pub fn get_exchange_params(env: Env) -> ExchangeParams {
        extend_instance_ttl(&env);
        read_params(&env)
    }

    /// Get admin address
    pub fn get_admin(env: Env) -> Address {
        extend_instance_ttl(&env);
        env.storage()
            .instance()
            .get(&DataKey::Admin)
            .expect("Not initialized")
    }

    /// Get total number of registered synths
    pub fn get_synth_count(env: Env) -> u32 {
        extend_instance_ttl(&env);
        env.storage()
            .instance()
            .get(&DataKey::SynthCount)
            .unwrap_or(0)
    }

    /// Get synth token address at specific index
    pub fn get_synth_at(env: Env, index: u32) -> Option<Address> {
        env.storage().persistent().get(&DataKey::SynthAt(index))
    }

    /// Get all registered synth token addresses.
    /// Limited to 50 entries to stay within read entry limits.
    pub fn get_synths(env: Env) -> Vec<Address> {
        let count: u32 = env
            .storage()
            .instance()
            .get(&DataKey::SynthCount)
            .unwrap_or(0);

        let safe_count = if count > 50 { 50 } else { count };

        let mut synths: Vec<Address> = Vec::new(&env);
        for i in 0..safe_count {
            if let Some(synth) = env.storage().persistent().get(&DataKey::SynthAt(i)) {
                synths.push_back(synth);
            }
        }
        synths
    }
}

fn require_admin(env: &Env) -> Address {
    let admin: Address = env
        .storage()
        .instance()
        .get(&DataKey::Admin)
        .expect("Not initialized");
    admin.require_auth();
    admin
}

fn read_params(env: &Env) -> ExchangeParams {
    env.storage()
        .instance()
        .get(&DataKey::Params)
        .expect("Not initialized")
}

fn write_synth(env: &Env, synth: &Address, currency_key: &Symbol) {
    let synth_key = DataKey::Synth(currency_key.clone());
    env.storage().persistent().set(
        &synth_key,
        &SynthInfo {
            token: synth.clone(),
            currency_key: currency_key.clone(),
        },
    );
    extend_persistent_ttl(env, &synth_key);

    let currency_entry = DataKey::CurrencyKey(synth.clone());
    env.storage().persistent().set(&currency_entry, currency_key);
    extend_persistent_ttl(env, &currency_entry);

    // Store synth at index (indexed storage - O(1) append)
    let count: u32 = env
        .storage()
        .instance()
        .get(&DataKey::SynthCount)
        .unwrap_or(0);
    let at_key = DataKey::SynthAt(count);
    env.storage().persistent().set(&at_key, synth);
    extend_persistent_ttl(env, &at_key);
    env.storage().instance().set(&DataKey::SynthCount, &(count + 1));
}

fn extend_instance_ttl(env: &Env) {
    env.storage()
        .instance()
        .extend_ttl(INSTANCE_TTL_THRESHOLD, INSTANCE_TTL_EXTEND);
}

fn extend_persistent_ttl(env: &Env, key: &DataKey) {
    env.storage()
        .persistent()
        .extend_ttl(key, PERSISTENT_TTL_THRESHOLD, PERSISTENT_TTL_EXTEND);
}

// Pool config lookup via invoke
fn fetch_pool_config(env: &Env, pool: &Address) -> PoolConfig {
    env.invoke_contract(pool, &Symbol::new(env, "get_config"), ().into_val(env))
}
