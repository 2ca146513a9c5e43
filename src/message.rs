//! Wire forms of the lock protocol messages.
//!
//! Two messages travel the network: the full transaction a node wants locked
//! and the per-outpoint votes masternodes answer with. The vote's receive
//! time and confirmation height are local bookkeeping and stay off the wire.

use crate::types::{Hash256, MasternodeId, OutPoint, Transaction};
use crate::vote::LockVote;
use ed25519_dalek::Signature;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MessageError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum LockMessage {
    /// Announce intention to lock the transaction's inputs.
    TxLockRequest(Transaction),
    /// One committee vote for one outpoint of one transaction.
    TxLockVote {
        tx_hash: Hash256,
        outpoint: OutPoint,
        masternode: MasternodeId,
        signature: Signature,
    },
}

impl LockMessage {
    pub fn encode(&self) -> Result<Vec<u8>, MessageError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, MessageError> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Wire form of a signed vote. None if the vote was never signed;
    /// unsigned votes must not leave the node.
    pub fn from_vote(vote: &LockVote) -> Option<Self> {
        Some(Self::TxLockVote {
            tx_hash: vote.tx_hash,
            outpoint: vote.outpoint.clone(),
            masternode: vote.masternode.clone(),
            signature: vote.signature?,
        })
    }
}

/// Rebuild a local vote from its wire form, stamping the receive time.
pub fn vote_from_wire(
    tx_hash: Hash256,
    outpoint: OutPoint,
    masternode: MasternodeId,
    signature: Signature,
) -> LockVote {
    let mut vote = LockVote::new(tx_hash, outpoint, masternode);
    vote.signature = Some(signature);
    vote
}
