use soroban_sdk::{contracttype, Address, Env};
use synth_types::PositionData;

// ============================================================================
// POSITION LEDGER STORAGE
// ============================================================================
// Soroban caps a transaction at 100 read entries / 200 KB and 50 write
// entries / 132 KB, with 128 KiB per entry. An owner's positions are
// therefore kept as count + per-index entries rather than one growing Vec,
// with a reverse index per position so removal is swap-and-pop in O(1).
// Each position record is ~90 bytes; a deposit writes one record and two
// index entries.
// ============================================================================

/// Storage keys
#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    /// Registry address
    Registry,
    /// Id handed to the next minted position
    NextPositionId,
    /// Position id -> PositionData
    Position(u64),
    /// Position id -> owner
    PositionOwner(u64),
    /// Owner -> number of positions held
    OwnerPositionCount(Address),
    /// Owner, slot index -> position id
    OwnerPositionAt(Address, u32),
    /// Position id -> its slot in the owner's list
    PositionIndex(u64),
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

/// Allocate the next position id, starting at 1
pub fn next_position_id(env: &Env) -> u64 {
    let id: u64 = env
        .storage()
        .instance()
        .get(&DataKey::NextPositionId)
        .unwrap_or(1);
    env.storage()
        .instance()
        .set(&DataKey::NextPositionId, &(id + 1));
    id
}

/// Count of positions ever minted; ids are never reused
pub fn total_minted(env: &Env) -> u64 {
    let next_id: u64 = env
        .storage()
        .instance()
        .get(&DataKey::NextPositionId)
        .unwrap_or(1);
    next_id - 1
}

pub fn get_position(env: &Env, position_id: u64) -> PositionData {
    env.storage()
        .persistent()
        .get(&DataKey::Position(position_id))
        .expect("Position not found")
}

pub fn set_position(env: &Env, position_id: u64, position: &PositionData) {
    let key = DataKey::Position(position_id);
    env.storage().persistent().set(&key, position);
    extend_persistent_ttl(env, &key);
}

pub fn get_position_owner(env: &Env, position_id: u64) -> Address {
    env.storage()
        .persistent()
        .get(&DataKey::PositionOwner(position_id))
        .expect("Position not found")
}

pub fn set_position_owner(env: &Env, position_id: u64, owner: &Address) {
    let key = DataKey::PositionOwner(position_id);
    env.storage().persistent().set(&key, owner);
    extend_persistent_ttl(env, &key);
}

/// Delete a position record and unlink it from its owner's index
pub fn remove_position(env: &Env, position_id: u64, owner: &Address) {
    env.storage()
        .persistent()
        .remove(&DataKey::Position(position_id));
    env.storage()
        .persistent()
        .remove(&DataKey::PositionOwner(position_id));
    remove_position_from_owner(env, owner, position_id);
}

/// Number of positions held by `owner`
pub fn owner_position_count(env: &Env, owner: &Address) -> u32 {
    env.storage()
        .persistent()
        .get(&DataKey::OwnerPositionCount(owner.clone()))
        .unwrap_or(0)
}

/// Position id at `index` in the owner's list
pub fn owner_position_at(env: &Env, owner: &Address, index: u32) -> Option<u64> {
    env.storage()
        .persistent()
        .get(&DataKey::OwnerPositionAt(owner.clone(), index))
}

/// Append a position to the owner's indexed list
pub fn add_position_to_owner(env: &Env, owner: &Address, position_id: u64) {
    let count = owner_position_count(env, owner);

    let at_key = DataKey::OwnerPositionAt(owner.clone(), count);
    env.storage().persistent().set(&at_key, &position_id);
    extend_persistent_ttl(env, &at_key);

    env.storage()
        .persistent()
        .set(&DataKey::PositionIndex(position_id), &count);

    let count_key = DataKey::OwnerPositionCount(owner.clone());
    env.storage().persistent().set(&count_key, &(count + 1));
    extend_persistent_ttl(env, &count_key);
}

/// Unlink a position from the owner's indexed list by swap-and-pop
pub fn remove_position_from_owner(env: &Env, owner: &Address, position_id: u64) {
    let count = owner_position_count(env, owner);
    if count == 0 {
        return;
    }

    let index_to_remove: u32 = env
        .storage()
        .persistent()
        .get(&DataKey::PositionIndex(position_id))
        .unwrap_or(0);

    let last_index = count - 1;

    // The last slot's id takes the vacated slot, then the last slot goes
    if index_to_remove != last_index {
        let last_position_id: u64 = env
            .storage()
            .persistent()
            .get(&DataKey::OwnerPositionAt(owner.clone(), last_index))
            .unwrap_or(0);

        env.storage().persistent().set(
            &DataKey::OwnerPositionAt(owner.clone(), index_to_remove),
            &last_position_id,
        );
        env.storage()
            .persistent()
            .set(&DataKey::PositionIndex(last_position_id), &index_to_remove);
    }

    env.storage()
        .persistent()
        .remove(&DataKey::OwnerPositionAt(owner.clone(), last_index));
    env.storage()
        .persistent()
        .remove(&DataKey::PositionIndex(position_id));

    // Count entry disappears with the owner's last position
    if count > 1 {
        env.storage()
            .persistent()
            .set(&DataKey::OwnerPositionCount(owner.clone()), &(count - 1));
    } else {
        env.storage()
            .persistent()
            .remove(&DataKey::OwnerPositionCount(owner.clone()));
    }
}
