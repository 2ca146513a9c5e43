//! Host collaborator interfaces.
//!
//! The lock engine never touches chain state, the masternode registry, the
//! mempool or the relay layer directly; the embedding daemon hands it these
//! views at construction. Implementations must uphold the lock order
//! chain state -> engine -> mempool: every trait method here is called while
//! the engine mutex is held, so none of them may call back into the engine.

use crate::types::{Hash256, MasternodeEntry, MasternodeId, OutPoint, PeerId, Transaction};

/// Read view of the active chain and its UTXO set.
pub trait ChainView: Send + Sync {
    /// Height of the current tip.
    fn height(&self) -> i64;

    /// Height the outpoint's coin was created at, if it is still unspent.
    fn utxo_height(&self, outpoint: &OutPoint) -> Option<i64>;

    /// Value and creation height of an unspent coin.
    fn utxo_coin(&self, outpoint: &OutPoint) -> Option<(u64, i64)>;

    /// Look up a transaction anywhere in the index; the second element is the
    /// hash of the containing block, None while unconfirmed.
    fn transaction(&self, txid: &Hash256) -> Option<(Transaction, Option<Hash256>)>;

    /// Height of a known block.
    fn block_height(&self, block_hash: &Hash256) -> Option<i64>;

    /// Chain finality rule (lock-time / sequence checks) for a transaction.
    fn is_final(&self, tx: &Transaction) -> bool;
}

/// Read view of the masternode registry.
pub trait MasternodeView: Send + Sync {
    fn contains(&self, id: &MasternodeId) -> bool;

    /// Deterministic 1-based rank of a masternode at the given height, among
    /// members running at least `min_protocol`. None when unranked.
    fn rank(&self, id: &MasternodeId, height: i64, min_protocol: u32) -> Option<u32>;

    fn entry(&self, id: &MasternodeId) -> Option<MasternodeEntry>;

    /// Ask `peer` to announce the registry entry for an unknown masternode.
    fn request_entry(&self, peer: &PeerId, id: &MasternodeId);

    /// Whether the local registry has finished syncing with the network.
    /// Lock traffic is ignored until it has.
    fn is_synced(&self) -> bool;
}

/// Read view of the mempool's spend index.
pub trait MempoolView: Send + Sync {
    /// Hash of the mempool transaction spending this outpoint, if any.
    fn spending_tx(&self, outpoint: &OutPoint) -> Option<Hash256>;
}

/// Outbound effects: gossip and wallet notification. Best effort, no retries;
/// peers re-gossip what they miss.
pub trait HostEvents: Send + Sync {
    /// Announce a vote inventory item to peers.
    fn relay_vote(&self, vote_hash: Hash256);

    /// Re-announce a full transaction to peers.
    fn relay_transaction(&self, tx: &Transaction);

    /// Tell the wallet a transaction's lock status changed.
    fn transaction_lock_updated(&self, tx_hash: Hash256);
}
