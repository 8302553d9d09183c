#![no_std]

mod positions;

use positions::DataKey;
use soroban_sdk::{contract, contractimpl, token, Address, Env, IntoVal, Symbol, Vec};
use synth_math::{apply_fee, from_usd, to_usd};
use synth_types::{ExchangeParams, PositionData, TokenInfo, NEW_POSITION};

#[contract]
pub struct SynthSwap;

#[contractimpl]
impl SynthSwap {
    /// Initialize with registry address
    pub fn initialize(env: Env, registry: Address) {
        if env.storage().instance().has(&DataKey::Registry) {
            panic!("Already initialized");
        }
        env.storage().instance().set(&DataKey::Registry, &registry);
        env.storage().instance().set(&DataKey::NextPositionId, &1u64);
    }

    /// Swap `amount` of `token_in` into `synth_out`, crediting the result
    /// to a settlement position held in custody by this contract.
    ///
    /// `token_in` may be the bridge synth, any registered synth, or a
    /// collateral token with a registered stable pool. Passing `token_id`
    /// of 0 mints a new position owned by `receiver`; any other id must
    /// name an existing position owned by `from`.
    ///
    /// # Returns
    /// The credited position id
    pub fn swap_into_synth(
        env: Env,
        from: Address,
        token_in: Address,
        synth_out: Address,
        amount: i128,
        min_received: i128,
        receiver: Address,
        token_id: u64,
    ) -> u64 {
        from.require_auth();

        if amount <= 0 {
            panic!("Amount must be positive");
        }

        let registry = get_registry_addr(&env);
        let key_out =
            fetch_currency_key(&env, &registry, &synth_out).expect("Not a registered synth");

        // Existing positions only accept deposits from their owner, to
        // their owner, in their bound synth
        if token_id != NEW_POSITION {
            let owner = positions::get_position_owner(&env, token_id);
            if owner != from {
                panic!("Not position owner");
            }
            if receiver != owner {
                panic!("Receiver must be position owner");
            }
            let position = positions::get_position(&env, token_id);
            if position.synth != synth_out {
                panic!("Synth mismatch");
            }
        }

        let bridge = fetch_bridge_synth(&env, &registry);
        let contract_address = env.current_contract_address();

        // Bring the input to its bridge-synth value: synth input is burned
        // outright, collateral is routed through its stable pool first
        let usd_amount = if token_in == bridge {
            token::Client::new(&env, &token_in).burn(&from, &amount);
            amount
        } else if let Some(key_in) = fetch_currency_key(&env, &registry, &token_in) {
            token::Client::new(&env, &token_in).burn(&from, &amount);
            to_usd(&env, amount, fetch_rate(&env, &registry, &key_in))
        } else {
            let pool = fetch_pool(&env, &registry, &token_in).expect("No pool for token");
            token::Client::new(&env, &token_in).transfer(&from, &pool, &amount);
            let bridge_amount =
                invoke_pool_exchange_received(&env, &pool, &token_in, 0, &contract_address);
            token::Client::new(&env, &bridge).burn(&contract_address, &bridge_amount);
            bridge_amount
        };

        let params = fetch_exchange_params(&env, &registry);
        let (net_usd, fee) = apply_fee(&env, usd_amount, params.exchange_fee);
        if fee > 0 {
            mint_synth(&env, &bridge, &params.fee_recipient, fee);
        }

        let amount_out = from_usd(&env, net_usd, fetch_rate(&env, &registry, &key_out));
        if amount_out <= 0 || amount_out < min_received {
            panic!("Insufficient output amount");
        }

        // Custody the minted synths; the position ledger tracks who may
        // withdraw them once settled
        mint_synth(&env, &synth_out, &contract_address, amount_out);

        let settle_time = env.ledger().timestamp() + params.settle_delay;
        let token_id = if token_id == NEW_POSITION {
            let id = positions::next_position_id(&env);
            positions::set_position(
                &env,
                id,
                &PositionData {
                    synth: synth_out.clone(),
                    underlying_balance: amount_out,
                    settle_time,
                },
            );
            positions::set_position_owner(&env, id, &receiver);
            positions::add_position_to_owner(&env, &receiver, id);

            env.events().publish(
                (Symbol::new(&env, "position_minted"),),
                (id, receiver.clone(), synth_out.clone()),
            );
            id
        } else {
            let mut position = positions::get_position(&env, token_id);
            position.underlying_balance += amount_out;
            // Every deposit restarts the settlement window
            position.settle_time = settle_time;
            positions::set_position(&env, token_id, &position);
            token_id
        };

        env.events().publish(
            (Symbol::new(&env, "swapped_into"),),
            (token_id, token_in, synth_out, amount, amount_out),
        );

        positions::extend_instance_ttl(&env);
        token_id
    }

    /// Withdraw settled synths from a position to its owner. Draining the
    /// balance burns the position; its id never accepts deposits again.
    ///
    /// # Returns
    /// Amount withdrawn
    pub fn withdraw(env: Env, from: Address, token_id: u64, amount: i128) -> i128 {
        let owner = positions::get_position_owner(&env, token_id);
        if owner != from {
            panic!("Not position owner");
        }
        from.require_auth();

        if amount <= 0 {
            panic!("Amount must be positive");
        }

        let mut position = positions::get_position(&env, token_id);
        if env.ledger().timestamp() < position.settle_time {
            panic!("Settlement period not elapsed");
        }
        if amount > position.underlying_balance {
            panic!("Insufficient balance");
        }

        token::Client::new(&env, &position.synth).transfer(
            &env.current_contract_address(),
            &from,
            &amount,
        );

        position.underlying_balance -= amount;
        if position.underlying_balance == 0 {
            positions::remove_position(&env, token_id, &owner);
            env.events()
                .publish((Symbol::new(&env, "position_burned"),), (token_id,));
        } else {
            positions::set_position(&env, token_id, &position);
        }

        env.events()
            .publish((Symbol::new(&env, "withdrawn"),), (token_id, amount));

        positions::extend_instance_ttl(&env);
        amount
    }

    /// Swap wallet-held synths back out: burns `synth_in` from the caller
    /// and delivers `token_out` (bridge synth, another synth, or pool
    /// collateral) to `receiver`.
    ///
    /// # Returns
    /// Output amount delivered
    pub fn swap_from_synth(
        env: Env,
        from: Address,
        synth_in: Address,
        token_out: Address,
        amount: i128,
        min_received: i128,
        receiver: Address,
    ) -> i128 {
        from.require_auth();

        if amount <= 0 {
            panic!("Amount must be positive");
        }

        let registry = get_registry_addr(&env);
        let key_in =
            fetch_currency_key(&env, &registry, &synth_in).expect("Not a registered synth");

        token::Client::new(&env, &synth_in).burn(&from, &amount);
        let usd_amount = to_usd(&env, amount, fetch_rate(&env, &registry, &key_in));

        let params = fetch_exchange_params(&env, &registry);
        let (net_usd, fee) = apply_fee(&env, usd_amount, params.exchange_fee);
        let bridge = fetch_bridge_synth(&env, &registry);
        if fee > 0 {
            mint_synth(&env, &bridge, &params.fee_recipient, fee);
        }

        let amount_out = if token_out == bridge {
            if net_usd <= 0 || net_usd < min_received {
                panic!("Insufficient output amount");
            }
            mint_synth(&env, &bridge, &receiver, net_usd);
            net_usd
        } else if let Some(key_out) = fetch_currency_key(&env, &registry, &token_out) {
            let out = from_usd(&env, net_usd, fetch_rate(&env, &registry, &key_out));
            if out <= 0 || out < min_received {
                panic!("Insufficient output amount");
            }
            mint_synth(&env, &token_out, &receiver, out);
            out
        } else {
            // Collateral exit: fund the pool with bridge synth and let it
            // pay the receiver, slippage-checked pool-side
            let pool = fetch_pool(&env, &registry, &token_out).expect("No pool for token");
            mint_synth(&env, &bridge, &pool, net_usd);
            invoke_pool_exchange_received(&env, &pool, &bridge, min_received, &receiver)
        };

        env.events().publish(
            (Symbol::new(&env, "swapped_from"),),
            (from, synth_in, token_out, amount, amount_out),
        );

        positions::extend_instance_ttl(&env);
        amount_out
    }

    /// Transfer position ownership
    pub fn transfer_position(env: Env, from: Address, to: Address, token_id: u64) {
        let owner = positions::get_position_owner(&env, token_id);
        if owner != from {
            panic!("Not position owner");
        }
        from.require_auth();

        positions::set_position_owner(&env, token_id, &to);
        positions::remove_position_from_owner(&env, &from, token_id);
        positions::add_position_to_owner(&env, &to, token_id);

        env.events()
            .publish((Symbol::new(&env, "transfer"),), (from, to, token_id));
    }

    // === View Functions ===

    /// Quote the synth credited for swapping `amount` of `token_in`,
    /// net of fees. No state change.
    pub fn get_swap_into_synth_amount(
        env: Env,
        token_in: Address,
        synth_out: Address,
        amount: i128,
    ) -> i128 {
        if amount <= 0 {
            panic!("Amount must be positive");
        }

        let registry = get_registry_addr(&env);
        let key_out =
            fetch_currency_key(&env, &registry, &synth_out).expect("Not a registered synth");

        let bridge = fetch_bridge_synth(&env, &registry);
        let usd_amount = if token_in == bridge {
            amount
        } else if let Some(key_in) = fetch_currency_key(&env, &registry, &token_in) {
            to_usd(&env, amount, fetch_rate(&env, &registry, &key_in))
        } else {
            let pool = fetch_pool(&env, &registry, &token_in).expect("No pool for token");
            invoke_pool_get_dy(&env, &pool, &token_in, amount)
        };

        let params = fetch_exchange_params(&env, &registry);
        let (net_usd, _) = apply_fee(&env, usd_amount, params.exchange_fee);
        from_usd(&env, net_usd, fetch_rate(&env, &registry, &key_out))
    }

    /// Quote the output for swapping `amount` of a wallet-held synth,
    /// net of fees. No state change.
    pub fn get_swap_from_synth_amount(
        env: Env,
        synth_in: Address,
        token_out: Address,
        amount: i128,
    ) -> i128 {
        if amount <= 0 {
            panic!("Amount must be positive");
        }

        let registry = get_registry_addr(&env);
        let key_in =
            fetch_currency_key(&env, &registry, &synth_in).expect("Not a registered synth");
        let usd_amount = to_usd(&env, amount, fetch_rate(&env, &registry, &key_in));

        let params = fetch_exchange_params(&env, &registry);
        let (net_usd, _) = apply_fee(&env, usd_amount, params.exchange_fee);

        let bridge = fetch_bridge_synth(&env, &registry);
        if token_out == bridge {
            net_usd
        } else if let Some(key_out) = fetch_currency_key(&env, &registry, &token_out) {
            from_usd(&env, net_usd, fetch_rate(&env, &registry, &key_out))
        } else {
            let pool = fetch_pool(&env, &registry, &token_out).expect("No pool for token");
            invoke_pool_get_dy(&env, &pool, &bridge, net_usd)
        }
    }

    /// Get position details
    pub fn token_info(env: Env, token_id: u64) -> TokenInfo {
        let position = positions::get_position(&env, token_id);
        let owner = positions::get_position_owner(&env, token_id);
        TokenInfo {
            owner,
            synth: position.synth,
            underlying_balance: position.underlying_balance,
            time_to_settle: position
                .settle_time
                .saturating_sub(env.ledger().timestamp()),
        }
    }

    /// Whether a position's settlement window has elapsed
    pub fn is_settled(env: Env, token_id: u64) -> bool {
        let position = positions::get_position(&env, token_id);
        env.ledger().timestamp() >= position.settle_time
    }

    /// Get position count for owner
    pub fn balance_of(env: Env, owner: Address) -> u32 {
        positions::owner_position_count(&env, &owner)
    }

    /// Get owner of position
    pub fn owner_of(env: Env, token_id: u64) -> Address {
        positions::get_position_owner(&env, token_id)
    }

    /// Get position ID at index for owner
    pub fn position_at(env: Env, owner: Address, index: u32) -> Option<u64> {
        positions::owner_position_at(&env, &owner, index)
    }

    /// Get position IDs for owner, capped at 50 to stay within read limits
    pub fn positions_of(env: Env, owner: Address) -> Vec<u64> {
        let count = positions::owner_position_count(&env, &owner);
        let safe_count = if count > 50 { 50 } else { count };

        let mut ids: Vec<u64> = Vec::new(&env);
        for i in 0..safe_count {
            if let Some(id) = positions::owner_position_at(&env, &owner, i) {
                ids.push_back(id);
            }
        }
        ids
    }

    /// Count of positions minted over the contract's lifetime
    pub fn total_positions(env: Env) -> u64 {
        positions::total_minted(&env)
    }

    /// Get the registry address
    pub fn get_registry(env: Env) -> Address {
        get_registry_addr(&env)
    }
}

// === Helper Functions ===

fn get_registry_addr(env: &Env) -> Address {
    env.storage()
        .instance()
        .get(&DataKey::Registry)
        .expect("Not initialized")
}

/// Mint a synth this contract holds the mint authority for
fn mint_synth(env: &Env, synth: &Address, to: &Address, amount: i128) {
    token::StellarAssetClient::new(env, synth).mint(to, &amount);
}

fn fetch_currency_key(env: &Env, registry: &Address, token: &Address) -> Option<Symbol> {
    env.invoke_contract(
        registry,
        &Symbol::new(env, "get_currency_key"),
        (token,).into_val(env),
    )
}

fn fetch_rate(env: &Env, registry: &Address, currency_key: &Symbol) -> i128 {
    env.invoke_contract(
        registry,
        &Symbol::new(env, "get_rate"),
        (currency_key,).into_val(env),
    )
}

fn fetch_pool(env: &Env, registry: &Address, token: &Address) -> Option<Address> {
    env.invoke_contract(
        registry,
        &Symbol::new(env, "get_pool"),
        (token,).into_val(env),
    )
}

fn fetch_bridge_synth(env: &Env, registry: &Address) -> Address {
    env.invoke_contract(registry, &Symbol::new(env, "get_bridge_synth"), ().into_val(env))
}

fn fetch_exchange_params(env: &Env, registry: &Address) -> ExchangeParams {
    env.invoke_contract(
        registry,
        &Symbol::new(env, "get_exchange_params"),
        ().into_val(env),
    )
}

fn invoke_pool_get_dy(env: &Env, pool: &Address, token_in: &Address, dx: i128) -> i128 {
    env.invoke_contract(
        pool,
        &Symbol::new(env, "get_dy"),
        (token_in, dx).into_val(env),
    )
}

fn invoke_pool_exchange_received(
    env: &Env,
    pool: &Address,
    token_in: &Address,
    min_dy: i128,
    to: &Address,
) -> i128 {
    env.invoke_contract(
        pool,
        &Symbol::new(env, "exchange_received"),
        (token_in, min_dy, to).into_val(env),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use soroban_sdk::testutils::{Address as _, Ledger as _};
    use soroban_sdk::{vec, String};
    use stable_pool::{StablePool, StablePoolClient};
    use synth_registry::{SynthRegistry, SynthRegistryClient};
    use synth_token::{SynthToken, SynthTokenClient};
    use synth_types::{DEFAULT_SETTLE_DELAY, RATE_PRECISION};

    const MILLION: i128 = 1_000_000 * RATE_PRECISION;
    const SBTC_RATE: i128 = 40_000 * RATE_PRECISION;
    const SETH_RATE: i128 = 2_500 * RATE_PRECISION;

    // Entry of 1000 DAI through the seeded 1M/1M pool (A=100, pool fee
    // 0.4%, admin share 50%), then into sBTC at 40_000 with the default
    // 0.3% exchange fee, all amounts in 18 decimals
    const DX: i128 = 1_000 * RATE_PRECISION;
    const POOL_DY: i128 = 995_990_138_701_831_105_842;
    const DAI_ENTRY_FEE: i128 = 2_987_970_416_105_493_317;
    const DAI_ENTRY_OUT: i128 = 24_825_054_207_143_140;

    // Entry of 100 sUSD straight into sBTC, and 10 sETH (at 2_500)
    // into sBTC
    const SUSD_ENTRY: i128 = 100 * RATE_PRECISION;
    const SUSD_ENTRY_FEE: i128 = 300_000_000_000_000_000;
    const SUSD_ENTRY_OUT: i128 = 2_492_500_000_000_000;
    const SETH_ENTRY: i128 = 10 * RATE_PRECISION;
    const SETH_ENTRY_OUT: i128 = 623_125_000_000_000_000;

    // Exit of the 100-sUSD position's sBTC back out: 99.7 sUSD gross,
    // 0.3% exchange fee, then optionally the pool leg into DAI
    const EXIT_USD_FEE: i128 = 299_100_000_000_000_000;
    const EXIT_USD_NET: i128 = 99_400_900_000_000_000_000;
    const EXIT_DAI_OUT: i128 = 99_003_198_964_285_393_589;
    const EXIT_DAI_ADMIN: i128 = 198_801_604_345_954_605;
    const EXIT_SETH_OUT: i128 = 39_760_360_000_000_000;

    struct Fixture<'a> {
        alice: Address,
        fee_recipient: Address,
        dai: SynthTokenClient<'a>,
        susd: SynthTokenClient<'a>,
        sbtc: SynthTokenClient<'a>,
        seth: SynthTokenClient<'a>,
        registry: SynthRegistryClient<'a>,
        pool: StablePoolClient<'a>,
        router: SynthSwapClient<'a>,
    }

    fn create_token<'a>(
        env: &Env,
        admin: &Address,
        name: &str,
        symbol: &str,
    ) -> SynthTokenClient<'a> {
        let contract_id = env.register(SynthToken, ());
        let client = SynthTokenClient::new(env, &contract_id);
        client.initialize(
            admin,
            &18u32,
            &String::from_str(env, name),
            &String::from_str(env, symbol),
        );
        client
    }

    fn setup<'a>(env: &Env) -> Fixture<'a> {
        let admin = Address::generate(env);
        let alice = Address::generate(env);
        let fee_recipient = Address::generate(env);

        let dai = create_token(env, &admin, "Dai Stablecoin", "DAI");
        let susd = create_token(env, &admin, "Synth USD", "sUSD");
        let sbtc = create_token(env, &admin, "Synth Bitcoin", "sBTC");
        let seth = create_token(env, &admin, "Synth Ether", "sETH");

        let registry_id = env.register(SynthRegistry, ());
        let registry = SynthRegistryClient::new(env, &registry_id);
        registry.initialize(
            &admin,
            &susd.address,
            &Symbol::new(env, "sUSD"),
            &fee_recipient,
        );
        registry.add_synth(&sbtc.address, &Symbol::new(env, "sBTC"));
        registry.add_synth(&seth.address, &Symbol::new(env, "sETH"));
        registry.set_rate(&Symbol::new(env, "sBTC"), &SBTC_RATE);
        registry.set_rate(&Symbol::new(env, "sETH"), &SETH_RATE);

        let pool_id = env.register(StablePool, ());
        let pool = StablePoolClient::new(env, &pool_id);
        pool.initialize(
            &registry.address,
            &dai.address,
            &susd.address,
            &100u128,
            &4_000u32,
            &500_000u32,
        );
        registry.add_pool(&pool.address);

        let router_id = env.register(SynthSwap, ());
        let router = SynthSwapClient::new(env, &router_id);
        router.initialize(&registry.address);

        // Seed the pool and fund alice while the deployer still holds the
        // synth mint authority
        let lp = Address::generate(env);
        dai.mint(&lp, &MILLION);
        susd.mint(&lp, &MILLION);
        pool.add_liquidity(&lp, &MILLION, &MILLION, &0);
        susd.mint(&alice, &(1_000 * RATE_PRECISION));
        seth.mint(&alice, &(100 * RATE_PRECISION));

        // The router mints and burns synths, so it takes over as admin
        susd.set_admin(&router.address);
        sbtc.set_admin(&router.address);
        seth.set_admin(&router.address);

        Fixture {
            alice,
            fee_recipient,
            dai,
            susd,
            sbtc,
            seth,
            registry,
            pool,
            router,
        }
    }

    /// Mint an sBTC position from 100 sUSD, settle it, and withdraw the
    /// synths to alice's wallet
    fn withdraw_sbtc_to_wallet(env: &Env, f: &Fixture) -> u64 {
        let id = f.router.swap_into_synth(
            &f.alice,
            &f.susd.address,
            &f.sbtc.address,
            &SUSD_ENTRY,
            &0,
            &f.alice,
            &NEW_POSITION,
        );
        env.ledger().with_mut(|li| li.timestamp += 300);
        f.router.withdraw(&f.alice, &id, &SUSD_ENTRY_OUT);
        id
    }

    // === Initialization Tests ===

    #[test]
    fn test_initialize() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        assert_eq!(f.router.get_registry(), f.registry.address);
        assert_eq!(f.router.total_positions(), 0);
    }

    #[test]
    #[should_panic(expected = "Already initialized")]
    fn test_initialize_twice_fails() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        f.router.initialize(&f.registry.address);
    }

    // === Quote Tests ===

    #[test]
    fn test_quote_collateral_to_synth() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        let quoted = f
            .router
            .get_swap_into_synth_amount(&f.dai.address, &f.sbtc.address, &DX);
        assert_eq!(quoted, DAI_ENTRY_OUT);
    }

    #[test]
    fn test_quote_bridge_to_synth() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        let quoted =
            f.router
                .get_swap_into_synth_amount(&f.susd.address, &f.sbtc.address, &SUSD_ENTRY);
        assert_eq!(quoted, SUSD_ENTRY_OUT);
    }

    #[test]
    fn test_quote_synth_to_synth() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        let quoted =
            f.router
                .get_swap_into_synth_amount(&f.seth.address, &f.sbtc.address, &SETH_ENTRY);
        assert_eq!(quoted, SETH_ENTRY_OUT);
    }

    #[test]
    #[should_panic(expected = "Not a registered synth")]
    fn test_quote_unregistered_target_fails() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        f.router
            .get_swap_into_synth_amount(&f.susd.address, &f.dai.address, &DX);
    }

    #[test]
    #[should_panic(expected = "No pool for token")]
    fn test_quote_no_pool_fails() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        let admin = Address::generate(&env);
        let wbtc = create_token(&env, &admin, "Wrapped Bitcoin", "WBTC");
        f.router
            .get_swap_into_synth_amount(&wbtc.address, &f.sbtc.address, &DX);
    }

    // === Swap Into Synth Tests ===

    #[test]
    fn test_swap_into_synth_new_position() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        f.dai.mint(&f.alice, &DX);

        let id = f.router.swap_into_synth(
            &f.alice,
            &f.dai.address,
            &f.sbtc.address,
            &DX,
            &0,
            &f.alice,
            &NEW_POSITION,
        );
        assert_eq!(id, 1);

        // Alice spent all her DAI and holds no synths directly
        assert_eq!(f.dai.balance(&f.alice), 0);
        assert_eq!(f.sbtc.balance(&f.alice), 0);

        // The router holds nothing but the position's custody synths
        assert_eq!(f.dai.balance(&f.router.address), 0);
        assert_eq!(f.susd.balance(&f.router.address), 0);
        assert_eq!(f.sbtc.balance(&f.router.address), DAI_ENTRY_OUT);

        // The pool absorbed the DAI and paid out bridge synth
        assert_eq!(f.dai.balance(&f.pool.address), MILLION + DX);
        assert_eq!(f.susd.balance(&f.pool.address), MILLION - POOL_DY);

        // Exchange fee accrues to the fee recipient in bridge synth
        assert_eq!(f.susd.balance(&f.fee_recipient), DAI_ENTRY_FEE);

        let info = f.router.token_info(&id);
        assert_eq!(info.owner, f.alice);
        assert_eq!(info.synth, f.sbtc.address);
        assert_eq!(info.underlying_balance, DAI_ENTRY_OUT);
        assert_eq!(info.time_to_settle, DEFAULT_SETTLE_DELAY);

        assert_eq!(f.router.balance_of(&f.alice), 1);
        assert_eq!(f.router.owner_of(&id), f.alice);
        assert_eq!(f.router.position_at(&f.alice, &0), Some(1));
        assert_eq!(f.router.total_positions(), 1);
    }

    #[test]
    fn test_swap_quote_matches_execution() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        f.dai.mint(&f.alice, &DX);

        let quoted = f
            .router
            .get_swap_into_synth_amount(&f.dai.address, &f.sbtc.address, &DX);
        let id = f.router.swap_into_synth(
            &f.alice,
            &f.dai.address,
            &f.sbtc.address,
            &DX,
            &0,
            &f.alice,
            &NEW_POSITION,
        );
        assert_eq!(f.router.token_info(&id).underlying_balance, quoted);
    }

    #[test]
    fn test_swap_into_synth_existing_position() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        f.dai.mint(&f.alice, &(100_000 * RATE_PRECISION));

        let id = f.router.swap_into_synth(
            &f.alice,
            &f.dai.address,
            &f.sbtc.address,
            &DX,
            &0,
            &f.alice,
            &NEW_POSITION,
        );

        env.ledger().with_mut(|li| li.timestamp += 60);

        // Swap the rest of the balance into the same position
        let remaining = 99_000 * RATE_PRECISION;
        let quoted =
            f.router
                .get_swap_into_synth_amount(&f.dai.address, &f.sbtc.address, &remaining);
        let id2 = f.router.swap_into_synth(
            &f.alice,
            &f.dai.address,
            &f.sbtc.address,
            &remaining,
            &0,
            &f.alice,
            &id,
        );
        assert_eq!(id2, id);

        // No second position was minted
        assert_eq!(f.router.balance_of(&f.alice), 1);
        assert_eq!(f.router.total_positions(), 1);

        assert_eq!(f.dai.balance(&f.alice), 0);
        assert_eq!(f.dai.balance(&f.router.address), 0);
        assert_eq!(f.susd.balance(&f.router.address), 0);

        let info = f.router.token_info(&id);
        assert_eq!(info.underlying_balance, DAI_ENTRY_OUT + quoted);
        assert_eq!(f.sbtc.balance(&f.router.address), DAI_ENTRY_OUT + quoted);

        // The second deposit restarted the settlement window
        assert_eq!(info.time_to_settle, DEFAULT_SETTLE_DELAY);
    }

    #[test]
    fn test_swap_into_synth_mint_to_receiver() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        let bob = Address::generate(&env);

        let id = f.router.swap_into_synth(
            &f.alice,
            &f.susd.address,
            &f.sbtc.address,
            &SUSD_ENTRY,
            &0,
            &bob,
            &NEW_POSITION,
        );

        // Alice paid, bob owns
        assert_eq!(f.router.owner_of(&id), bob);
        assert_eq!(f.router.balance_of(&bob), 1);
        assert_eq!(f.router.balance_of(&f.alice), 0);
    }

    #[test]
    fn test_swap_into_synth_bridge_input() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        let id = f.router.swap_into_synth(
            &f.alice,
            &f.susd.address,
            &f.sbtc.address,
            &SUSD_ENTRY,
            &0,
            &f.alice,
            &NEW_POSITION,
        );

        assert_eq!(f.susd.balance(&f.alice), 900 * RATE_PRECISION);
        assert_eq!(f.susd.balance(&f.fee_recipient), SUSD_ENTRY_FEE);
        assert_eq!(f.router.token_info(&id).underlying_balance, SUSD_ENTRY_OUT);
        assert_eq!(f.sbtc.balance(&f.router.address), SUSD_ENTRY_OUT);
    }

    #[test]
    fn test_swap_into_synth_synth_input() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        let id = f.router.swap_into_synth(
            &f.alice,
            &f.seth.address,
            &f.sbtc.address,
            &SETH_ENTRY,
            &0,
            &f.alice,
            &NEW_POSITION,
        );

        assert_eq!(f.seth.balance(&f.alice), 90 * RATE_PRECISION);
        assert_eq!(f.router.token_info(&id).underlying_balance, SETH_ENTRY_OUT);
        assert_eq!(f.sbtc.balance(&f.router.address), SETH_ENTRY_OUT);
    }

    #[test]
    #[should_panic(expected = "Not position owner")]
    fn test_swap_into_synth_wrong_owner_fails() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        let id = f.router.swap_into_synth(
            &f.alice,
            &f.susd.address,
            &f.sbtc.address,
            &SUSD_ENTRY,
            &0,
            &f.alice,
            &NEW_POSITION,
        );

        let bob = Address::generate(&env);
        f.dai.mint(&bob, &DX);
        f.router
            .swap_into_synth(&bob, &f.dai.address, &f.sbtc.address, &DX, &0, &bob, &id);
    }

    #[test]
    #[should_panic(expected = "Receiver must be position owner")]
    fn test_swap_into_synth_wrong_receiver_fails() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        let id = f.router.swap_into_synth(
            &f.alice,
            &f.susd.address,
            &f.sbtc.address,
            &SUSD_ENTRY,
            &0,
            &f.alice,
            &NEW_POSITION,
        );

        let bob = Address::generate(&env);
        f.router.swap_into_synth(
            &f.alice,
            &f.susd.address,
            &f.sbtc.address,
            &SUSD_ENTRY,
            &0,
            &bob,
            &id,
        );
    }

    #[test]
    #[should_panic(expected = "Synth mismatch")]
    fn test_swap_into_synth_synth_mismatch_fails() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        let id = f.router.swap_into_synth(
            &f.alice,
            &f.susd.address,
            &f.sbtc.address,
            &SUSD_ENTRY,
            &0,
            &f.alice,
            &NEW_POSITION,
        );

        // The position is bound to sBTC; an sETH deposit must not land in it
        f.router.swap_into_synth(
            &f.alice,
            &f.susd.address,
            &f.seth.address,
            &SUSD_ENTRY,
            &0,
            &f.alice,
            &id,
        );
    }

    #[test]
    #[should_panic(expected = "Not a registered synth")]
    fn test_swap_into_synth_unregistered_synth_fails() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        let admin = Address::generate(&env);
        let wbtc = create_token(&env, &admin, "Wrapped Bitcoin", "WBTC");

        f.router.swap_into_synth(
            &f.alice,
            &f.susd.address,
            &wbtc.address,
            &SUSD_ENTRY,
            &0,
            &f.alice,
            &NEW_POSITION,
        );
    }

    #[test]
    #[should_panic(expected = "No pool for token")]
    fn test_swap_into_synth_no_pool_fails() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        let admin = Address::generate(&env);
        let wbtc = create_token(&env, &admin, "Wrapped Bitcoin", "WBTC");
        f.router.swap_into_synth(
            &f.alice,
            &wbtc.address,
            &f.sbtc.address,
            &DX,
            &0,
            &f.alice,
            &NEW_POSITION,
        );
    }

    #[test]
    #[should_panic(expected = "Insufficient output amount")]
    fn test_swap_into_synth_min_received_fails() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        f.dai.mint(&f.alice, &DX);
        f.router.swap_into_synth(
            &f.alice,
            &f.dai.address,
            &f.sbtc.address,
            &DX,
            &(DAI_ENTRY_OUT + 1),
            &f.alice,
            &NEW_POSITION,
        );
    }

    #[test]
    #[should_panic(expected = "Amount must be positive")]
    fn test_swap_into_synth_zero_amount_fails() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        f.router.swap_into_synth(
            &f.alice,
            &f.susd.address,
            &f.sbtc.address,
            &0,
            &0,
            &f.alice,
            &NEW_POSITION,
        );
    }

    #[test]
    #[should_panic(expected = "Position not found")]
    fn test_swap_into_synth_missing_position_fails() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        f.router.swap_into_synth(
            &f.alice,
            &f.susd.address,
            &f.sbtc.address,
            &SUSD_ENTRY,
            &0,
            &f.alice,
            &42,
        );
    }

    // === Withdraw Tests ===

    #[test]
    fn test_withdraw_after_settlement() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        let id = f.router.swap_into_synth(
            &f.alice,
            &f.susd.address,
            &f.sbtc.address,
            &SUSD_ENTRY,
            &0,
            &f.alice,
            &NEW_POSITION,
        );

        env.ledger().with_mut(|li| li.timestamp += 300);
        assert!(f.router.is_settled(&id));

        let half = SUSD_ENTRY_OUT / 2;
        let withdrawn = f.router.withdraw(&f.alice, &id, &half);
        assert_eq!(withdrawn, half);

        assert_eq!(f.sbtc.balance(&f.alice), half);
        assert_eq!(f.sbtc.balance(&f.router.address), SUSD_ENTRY_OUT - half);
        assert_eq!(
            f.router.token_info(&id).underlying_balance,
            SUSD_ENTRY_OUT - half
        );

        // A partial withdrawal leaves the position open
        assert_eq!(f.router.balance_of(&f.alice), 1);
    }

    #[test]
    fn test_withdraw_full_burns_position() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        let id = f.router.swap_into_synth(
            &f.alice,
            &f.susd.address,
            &f.sbtc.address,
            &SUSD_ENTRY,
            &0,
            &f.alice,
            &NEW_POSITION,
        );

        env.ledger().with_mut(|li| li.timestamp += 300);
        f.router.withdraw(&f.alice, &id, &SUSD_ENTRY_OUT);

        assert_eq!(f.sbtc.balance(&f.alice), SUSD_ENTRY_OUT);
        assert_eq!(f.sbtc.balance(&f.router.address), 0);
        assert_eq!(f.router.balance_of(&f.alice), 0);
        assert_eq!(f.router.position_at(&f.alice, &0), None);

        // Minted count never decrements
        assert_eq!(f.router.total_positions(), 1);
    }

    #[test]
    #[should_panic(expected = "Settlement period not elapsed")]
    fn test_withdraw_before_settlement_fails() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        let id = f.router.swap_into_synth(
            &f.alice,
            &f.susd.address,
            &f.sbtc.address,
            &SUSD_ENTRY,
            &0,
            &f.alice,
            &NEW_POSITION,
        );
        f.router.withdraw(&f.alice, &id, &SUSD_ENTRY_OUT);
    }

    #[test]
    #[should_panic(expected = "Not position owner")]
    fn test_withdraw_not_owner_fails() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        let id = f.router.swap_into_synth(
            &f.alice,
            &f.susd.address,
            &f.sbtc.address,
            &SUSD_ENTRY,
            &0,
            &f.alice,
            &NEW_POSITION,
        );

        env.ledger().with_mut(|li| li.timestamp += 300);
        let bob = Address::generate(&env);
        f.router.withdraw(&bob, &id, &SUSD_ENTRY_OUT);
    }

    #[test]
    #[should_panic(expected = "Insufficient balance")]
    fn test_withdraw_insufficient_balance_fails() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        let id = f.router.swap_into_synth(
            &f.alice,
            &f.susd.address,
            &f.sbtc.address,
            &SUSD_ENTRY,
            &0,
            &f.alice,
            &NEW_POSITION,
        );

        env.ledger().with_mut(|li| li.timestamp += 300);
        f.router.withdraw(&f.alice, &id, &(SUSD_ENTRY_OUT + 1));
    }

    #[test]
    #[should_panic(expected = "Amount must be positive")]
    fn test_withdraw_zero_fails() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        let id = f.router.swap_into_synth(
            &f.alice,
            &f.susd.address,
            &f.sbtc.address,
            &SUSD_ENTRY,
            &0,
            &f.alice,
            &NEW_POSITION,
        );

        env.ledger().with_mut(|li| li.timestamp += 300);
        f.router.withdraw(&f.alice, &id, &0);
    }

    #[test]
    #[should_panic(expected = "Position not found")]
    fn test_deposit_after_burn_fails() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        let id = withdraw_sbtc_to_wallet(&env, &f);

        // The burned id is closed to further deposits
        f.router.swap_into_synth(
            &f.alice,
            &f.susd.address,
            &f.sbtc.address,
            &SUSD_ENTRY,
            &0,
            &f.alice,
            &id,
        );
    }

    #[test]
    fn test_settlement_window_boundary() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        let id = f.router.swap_into_synth(
            &f.alice,
            &f.susd.address,
            &f.sbtc.address,
            &SUSD_ENTRY,
            &0,
            &f.alice,
            &NEW_POSITION,
        );

        env.ledger()
            .with_mut(|li| li.timestamp += DEFAULT_SETTLE_DELAY - 1);
        assert!(!f.router.is_settled(&id));
        assert_eq!(f.router.token_info(&id).time_to_settle, 1);

        env.ledger().with_mut(|li| li.timestamp += 1);
        assert!(f.router.is_settled(&id));
        assert_eq!(f.router.token_info(&id).time_to_settle, 0);
    }

    // === Swap From Synth Tests ===

    #[test]
    fn test_swap_from_synth_to_bridge() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        withdraw_sbtc_to_wallet(&env, &f);

        let out = f.router.swap_from_synth(
            &f.alice,
            &f.sbtc.address,
            &f.susd.address,
            &SUSD_ENTRY_OUT,
            &0,
            &f.alice,
        );
        assert_eq!(out, EXIT_USD_NET);

        assert_eq!(f.sbtc.balance(&f.alice), 0);
        assert_eq!(f.susd.balance(&f.alice), 900 * RATE_PRECISION + EXIT_USD_NET);

        // Entry and exit fees both accrued to the fee recipient
        assert_eq!(
            f.susd.balance(&f.fee_recipient),
            SUSD_ENTRY_FEE + EXIT_USD_FEE
        );
    }

    #[test]
    fn test_swap_from_synth_to_collateral() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        withdraw_sbtc_to_wallet(&env, &f);

        let out = f.router.swap_from_synth(
            &f.alice,
            &f.sbtc.address,
            &f.dai.address,
            &SUSD_ENTRY_OUT,
            &0,
            &f.alice,
        );
        assert_eq!(out, EXIT_DAI_OUT);
        assert_eq!(f.dai.balance(&f.alice), EXIT_DAI_OUT);

        // The bridge synth was minted straight into the pool
        assert_eq!(f.susd.balance(&f.router.address), 0);
        assert_eq!(f.susd.balance(&f.pool.address), MILLION + EXIT_USD_NET);
        assert_eq!(f.dai.balance(&f.pool.address), MILLION - EXIT_DAI_OUT);

        let state = f.pool.get_state();
        assert_eq!(state.balance_b, MILLION + EXIT_USD_NET);
        assert_eq!(state.admin_fee_a, EXIT_DAI_ADMIN);
    }

    #[test]
    fn test_swap_from_synth_to_synth() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        withdraw_sbtc_to_wallet(&env, &f);

        let out = f.router.swap_from_synth(
            &f.alice,
            &f.sbtc.address,
            &f.seth.address,
            &SUSD_ENTRY_OUT,
            &0,
            &f.alice,
        );
        assert_eq!(out, EXIT_SETH_OUT);
        assert_eq!(
            f.seth.balance(&f.alice),
            100 * RATE_PRECISION + EXIT_SETH_OUT
        );
    }

    #[test]
    fn test_swap_from_synth_quote_matches() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        withdraw_sbtc_to_wallet(&env, &f);

        let quoted = f.router.get_swap_from_synth_amount(
            &f.sbtc.address,
            &f.dai.address,
            &SUSD_ENTRY_OUT,
        );
        assert_eq!(quoted, EXIT_DAI_OUT);

        let out = f.router.swap_from_synth(
            &f.alice,
            &f.sbtc.address,
            &f.dai.address,
            &SUSD_ENTRY_OUT,
            &0,
            &f.alice,
        );
        assert_eq!(out, quoted);
    }

    #[test]
    #[should_panic(expected = "Not a registered synth")]
    fn test_swap_from_synth_unregistered_fails() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        f.dai.mint(&f.alice, &DX);
        f.router
            .swap_from_synth(&f.alice, &f.dai.address, &f.susd.address, &DX, &0, &f.alice);
    }

    #[test]
    #[should_panic(expected = "Insufficient output amount")]
    fn test_swap_from_synth_min_received_fails() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        withdraw_sbtc_to_wallet(&env, &f);

        f.router.swap_from_synth(
            &f.alice,
            &f.sbtc.address,
            &f.susd.address,
            &SUSD_ENTRY_OUT,
            &(EXIT_USD_NET + 1),
            &f.alice,
        );
    }

    // === Position Ledger Tests ===

    #[test]
    fn test_transfer_position() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        let bob = Address::generate(&env);
        let id = f.router.swap_into_synth(
            &f.alice,
            &f.susd.address,
            &f.sbtc.address,
            &SUSD_ENTRY,
            &0,
            &f.alice,
            &NEW_POSITION,
        );

        f.router.transfer_position(&f.alice, &bob, &id);

        assert_eq!(f.router.owner_of(&id), bob);
        assert_eq!(f.router.balance_of(&f.alice), 0);
        assert_eq!(f.router.balance_of(&bob), 1);
        assert_eq!(f.router.position_at(&bob, &0), Some(1));

        // The new owner can deposit into the position
        f.dai.mint(&bob, &DX);
        f.router
            .swap_into_synth(&bob, &f.dai.address, &f.sbtc.address, &DX, &0, &bob, &id);
        assert!(f.router.token_info(&id).underlying_balance > SUSD_ENTRY_OUT);
    }

    #[test]
    #[should_panic(expected = "Not position owner")]
    fn test_transfer_position_not_owner_fails() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        let bob = Address::generate(&env);
        let id = f.router.swap_into_synth(
            &f.alice,
            &f.susd.address,
            &f.sbtc.address,
            &SUSD_ENTRY,
            &0,
            &f.alice,
            &NEW_POSITION,
        );
        f.router.transfer_position(&bob, &f.alice, &id);
    }

    #[test]
    fn test_swap_and_pop_enumeration() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        for synth in [&f.sbtc, &f.seth, &f.sbtc] {
            f.router.swap_into_synth(
                &f.alice,
                &f.susd.address,
                &synth.address,
                &SUSD_ENTRY,
                &0,
                &f.alice,
                &NEW_POSITION,
            );
        }
        assert_eq!(f.router.balance_of(&f.alice), 3);
        assert_eq!(f.router.positions_of(&f.alice), vec![&env, 1, 2, 3]);

        // Drain the middle position; the last id takes its slot
        env.ledger().with_mut(|li| li.timestamp += 300);
        let seth_balance = f.router.token_info(&2).underlying_balance;
        f.router.withdraw(&f.alice, &2, &seth_balance);

        assert_eq!(f.router.balance_of(&f.alice), 2);
        assert_eq!(f.router.position_at(&f.alice, &0), Some(1));
        assert_eq!(f.router.position_at(&f.alice, &1), Some(3));
        assert_eq!(f.router.positions_of(&f.alice), vec![&env, 1, 3]);
        assert_eq!(f.router.total_positions(), 3);
    }

    #[test]
    fn test_custody_backs_all_positions() {
        let env = Env::default();
        env.mock_all_auths();

        let f = setup(&env);
        let bob = Address::generate(&env);
        let id1 = f.router.swap_into_synth(
            &f.alice,
            &f.susd.address,
            &f.sbtc.address,
            &SUSD_ENTRY,
            &0,
            &f.alice,
            &NEW_POSITION,
        );
        let id2 = f.router.swap_into_synth(
            &f.alice,
            &f.susd.address,
            &f.sbtc.address,
            &(2 * SUSD_ENTRY),
            &0,
            &bob,
            &NEW_POSITION,
        );

        // Custodied synths cover every open position exactly
        let total = f.router.token_info(&id1).underlying_balance
            + f.router.token_info(&id2).underlying_balance;
        assert_eq!(f.sbtc.balance(&f.router.address), total);
    }
}
