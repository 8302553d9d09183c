use soroban_sdk::{contracttype, Address, Symbol};

/// Registered synth entry
#[contracttype]
#[derive(Clone, Debug)]
pub struct SynthInfo {
    /// Synth token contract address
    pub token: Address,
    /// Currency key used by the rate oracle ("sUSD", "sBTC", ...)
    pub currency_key: Symbol,
}

/// Global exchange parameters, admin tunable
#[contracttype]
#[derive(Clone, Debug)]
pub struct ExchangeParams {
    /// Exchange fee in parts per million, charged on every synth conversion
    pub exchange_fee: u32,
    /// Seconds a position must wait after a deposit before withdrawing
    pub settle_delay: u64,
    /// Recipient of exchange fees (paid in bridge synth)
    pub fee_recipient: Address,
}
