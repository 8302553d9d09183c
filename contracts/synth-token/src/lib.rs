#![no_std]

use soroban_sdk::{contract, contractimpl, contracttype, Address, Env, String, Symbol};

#[contract]
pub struct SynthToken;

/// Allowance lookup key
#[contracttype]
#[derive(Clone)]
pub struct AllowanceKey {
    pub from: Address,
    pub spender: Address,
}

/// Stored allowance with its expiration ledger
#[contracttype]
#[derive(Clone)]
pub struct AllowanceValue {
    pub amount: i128,
    pub expiration_ledger: u32,
}

/// Token metadata stored once at initialization
#[contracttype]
#[derive(Clone)]
pub struct TokenMetadata {
    pub decimal: u32,
    pub name: String,
    pub symbol: String,
}

/// Storage keys
#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    /// Mint/admin authority
    Admin,
    /// Token metadata (Instance storage)
    Metadata,
    /// Holder -> balance (Persistent storage)
    Balance(Address),
    /// (from, spender) -> allowance (Temporary storage, expires on its own)
    Allowance(AllowanceKey),
}

// TTL constants
const INSTANCE_TTL_THRESHOLD: u32 = 17280;
const INSTANCE_TTL_EXTEND: u32 = 518400;
const BALANCE_TTL_THRESHOLD: u32 = 17280;
const BALANCE_TTL_EXTEND: u32 = 518400;

#[contractimpl]
impl SynthToken {
    /// Initialize the token with its mint authority and metadata
    pub fn initialize(env: Env, admin: Address, decimal: u32, name: String, symbol: String) {
        if env.storage().instance().has(&DataKey::Admin) {
            panic!("Already initialized");
        }
        if decimal > 18 {
            panic!("Unsupported decimals");
        }

        env.storage().instance().set(&DataKey::Admin, &admin);
        env.storage().instance().set(
            &DataKey::Metadata,
            &TokenMetadata {
                decimal,
                name,
                symbol,
            },
        );
        extend_instance_ttl(&env);
    }

    /// Mint new tokens to `to`; only the admin may call
    pub fn mint(env: Env, to: Address, amount: i128) {
        check_positive(amount);
        let admin = get_admin(&env);
        admin.require_auth();

        receive_balance(&env, &to, amount);

        env.events()
            .publish((Symbol::new(&env, "mint"),), (to, amount));
    }

    /// Hand the mint authority to a new admin
    pub fn set_admin(env: Env, new_admin: Address) {
        let admin = get_admin(&env);
        admin.require_auth();

        env.storage().instance().set(&DataKey::Admin, &new_admin);
        extend_instance_ttl(&env);

        env.events()
            .publish((Symbol::new(&env, "set_admin"),), (admin, new_admin));
    }

    /// Get the current admin
    pub fn admin(env: Env) -> Address {
        get_admin(&env)
    }

    // === SEP-41 Token Interface ===

    /// Remaining allowance from `from` to `spender` (0 once expired)
    pub fn allowance(env: Env, from: Address, spender: Address) -> i128 {
        read_allowance(&env, &from, &spender).amount
    }

    /// Set the allowance from `from` to `spender`, valid until `expiration_ledger`
    pub fn approve(env: Env, from: Address, spender: Address, amount: i128, expiration_ledger: u32) {
        from.require_auth();

        if amount < 0 {
            panic!("Amount must be positive");
        }
        if amount > 0 && expiration_ledger < env.ledger().sequence() {
            panic!("Expiration in the past");
        }

        let key = DataKey::Allowance(AllowanceKey {
            from: from.clone(),
            spender: spender.clone(),
        });
        env.storage().temporary().set(
            &key,
            &AllowanceValue {
                amount,
                expiration_ledger,
            },
        );
        if amount > 0 {
            let live_for = expiration_ledger
                .checked_sub(env.ledger().sequence())
                .unwrap();
            env.storage().temporary().extend_ttl(&key, live_for, live_for);
        }

        env.events().publish(
            (Symbol::new(&env, "approve"),),
            (from, spender, amount, expiration_ledger),
        );
    }

    /// Get the balance of `id`
    pub fn balance(env: Env, id: Address) -> i128 {
        read_balance(&env, &id)
    }

    /// Move `amount` from `from` to `to`
    pub fn transfer(env: Env, from: Address, to: Address, amount: i128) {
        from.require_auth();
        check_positive(amount);

        spend_balance(&env, &from, amount);
        receive_balance(&env, &to, amount);

        env.events()
            .publish((Symbol::new(&env, "transfer"),), (from, to, amount));
    }

    /// Move `amount` from `from` to `to` using `spender`'s allowance
    pub fn transfer_from(env: Env, spender: Address, from: Address, to: Address, amount: i128) {
        spender.require_auth();
        check_positive(amount);

        spend_allowance(&env, &from, &spender, amount);
        spend_balance(&env, &from, amount);
        receive_balance(&env, &to, amount);

        env.events()
            .publish((Symbol::new(&env, "transfer"),), (from, to, amount));
    }

    /// Destroy `amount` of `from`'s tokens
    pub fn burn(env: Env, from: Address, amount: i128) {
        from.require_auth();
        check_positive(amount);

        spend_balance(&env, &from, amount);

        env.events()
            .publish((Symbol::new(&env, "burn"),), (from, amount));
    }

    /// Destroy `amount` of `from`'s tokens using `spender`'s allowance
    pub fn burn_from(env: Env, spender: Address, from: Address, amount: i128) {
        spender.require_auth();
        check_positive(amount);

        spend_allowance(&env, &from, &spender, amount);
        spend_balance(&env, &from, amount);

        env.events()
            .publish((Symbol::new(&env, "burn"),), (from, amount));
    }

    pub fn decimals(env: Env) -> u32 {
        read_metadata(&env).decimal
    }

    pub fn name(env: Env) -> String {
        read_metadata(&env).name
    }

    pub fn symbol(env: Env) -> String {
        read_metadata(&env).symbol
    }
}

// === Helper Functions ===

fn get_admin(env: &Env) -> Address {
    env.storage()
        .instance()
        .get(&DataKey::Admin)
        .expect("Not initialized")
}

fn read_metadata(env: &Env) -> TokenMetadata {
    env.storage()
        .instance()
        .get(&DataKey::Metadata)
        .expect("Not initialized")
}

fn check_positive(amount: i128) {
    if amount <= 0 {
        panic!("Amount must be positive");
    }
}

fn extend_instance_ttl(env: &Env) {
    env.storage()
        .instance()
        .extend_ttl(INSTANCE_TTL_THRESHOLD, INSTANCE_TTL_EXTEND);
}

fn read_balance(env: &Env, id: &Address) -> i128 {
    let key = DataKey::Balance(id.clone());
    if let Some(balance) = env.storage().persistent().get::<_, i128>(&key) {
        env.storage()
            .persistent()
            .extend_ttl(&key, BALANCE_TTL_THRESHOLD, BALANCE_TTL_EXTEND);
        balance
    } else {
        0
    }
}

fn write_balance(env: &Env, id: &Address, amount: i128) {
    let key = DataKey::Balance(id.clone());
    if amount == 0 {
        // Remove empty balance entry
        env.storage().persistent().remove(&key);
    } else {
        env.storage().persistent().set(&key, &amount);
        env.storage()
            .persistent()
            .extend_ttl(&key, BALANCE_TTL_THRESHOLD, BALANCE_TTL_EXTEND);
    }
}

fn receive_balance(env: &Env, id: &Address, amount: i128) {
    let balance = read_balance(env, id);
    write_balance(env, id, balance + amount);
}

fn spend_balance(env: &Env, id: &Address, amount: i128) {
    let balance = read_balance(env, id);
    if balance < amount {
        panic!("Insufficient balance");
    }
    write_balance(env, id, balance - amount);
}

fn read_allowance(env: &Env, from: &Address, spender: &Address) -> AllowanceValue {
    let key = DataKey::Allowance(AllowanceKey {
        from: from.clone(),
        spender: spender.clone(),
    });
    if let Some(allowance) = env.storage().temporary().get::<_, AllowanceValue>(&key) {
        if allowance.expiration_ledger < env.ledger().sequence() {
            AllowanceValue {
                amount: 0,
                expiration_ledger: allowance.expiration_ledger,
            }
        } else {
            allowance
        }
    } else {
        AllowanceValue {
            amount: 0,
            expiration_ledger: 0,
        }
    }
}

fn spend_allowance(env: &Env, from: &Address, spender: &Address, amount: i128) {
    let allowance = read_allowance(env, from, spender);
    if allowance.amount < amount {
        panic!("Insufficient allowance");
    }

    let key = DataKey::Allowance(AllowanceKey {
        from: from.clone(),
        spender: spender.clone(),
    });
    env.storage().temporary().set(
        &key,
        &AllowanceValue {
            amount: allowance.amount - amount,
            expiration_ledger: allowance.expiration_ledger,
        },
    );
}
