use soroban_sdk::{contracttype, Address, Env};
use synth_types::{PoolConfig, PoolState};

// ============================================================================
// POOL STORAGE
// ============================================================================
// Soroban caps a transaction at 100 read entries / 200 KB and 50 write
// entries / 132 KB, with 128 KiB per entry. Config and State each live in
// one instance entry read on every call; LP share balances (~40 bytes) are
// separate persistent entries, removed when they hit zero. An exchange
// writes State plus two token balance entries.
// ============================================================================

/// Storage keys for the pool contract
#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    /// Pool configuration (Instance storage)
    Config,
    /// Current pool balances and accrued admin fees (Instance storage)
    State,
    /// LP share balance per provider (Persistent storage)
    Shares(Address),
    /// Total LP shares outstanding (Instance storage)
    TotalShares,
}

// TTL constants
const INSTANCE_TTL_THRESHOLD: u32 = 17280; // ~1 day
const INSTANCE_TTL_EXTEND: u32 = 518400; // ~30 days
const PERSISTENT_TTL_THRESHOLD: u32 = 17280;
const PERSISTENT_TTL_EXTEND: u32 = 518400;

/// Extend instance storage TTL
pub fn extend_instance_ttl(env: &Env) {
    env.storage()
        .instance()
        .extend_ttl(INSTANCE_TTL_THRESHOLD, INSTANCE_TTL_EXTEND);
}

/// Extend persistent storage TTL for a key
pub fn extend_persistent_ttl(env: &Env, key: &DataKey) {
    env.storage()
        .persistent()
        .extend_ttl(key, PERSISTENT_TTL_THRESHOLD, PERSISTENT_TTL_EXTEND);
}

// === Config ===

pub fn get_config(env: &Env) -> PoolConfig {
    extend_instance_ttl(env);
    env.storage()
        .instance()
        .get(&DataKey::Config)
        .expect("Pool not initialized")
}

pub fn set_config(env: &Env, config: &PoolConfig) {
    env.storage().instance().set(&DataKey::Config, config);
    extend_instance_ttl(env);
}

// === State ===

pub fn get_state(env: &Env) -> PoolState {
    extend_instance_ttl(env);
    env.storage()
        .instance()
        .get(&DataKey::State)
        .expect("Pool not initialized")
}

pub fn set_state(env: &Env, state: &PoolState) {
    env.storage().instance().set(&DataKey::State, state);
    extend_instance_ttl(env);
}

// === Shares ===

pub fn get_shares(env: &Env, provider: &Address) -> i128 {
    let key = DataKey::Shares(provider.clone());
    env.storage().persistent().get(&key).unwrap_or(0)
}

pub fn set_shares(env: &Env, provider: &Address, amount: i128) {
    let key = DataKey::Shares(provider.clone());
    if amount == 0 {
        // Remove empty share entry
        env.storage().persistent().remove(&key);
    } else {
        env.storage().persistent().set(&key, &amount);
        extend_persistent_ttl(env, &key);
    }
}

pub fn get_total_shares(env: &Env) -> i128 {
    env.storage()
        .instance()
        .get(&DataKey::TotalShares)
        .unwrap_or(0)
}

pub fn set_total_shares(env: &Env, total: i128) {
    env.storage().instance().set(&DataKey::TotalShares, &total);
    extend_instance_ttl(env);
}
