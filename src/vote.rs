//! Lock votes and per-outpoint vote buckets.
//!
//! A vote is one masternode's signed statement that one outpoint of one
//! transaction should be locked. Votes are identified by a hash over
//! (tx, outpoint, masternode) only — the signature is excluded so a second
//! submission with a different signature blob still collides with the first.

use crate::constants::lock;
use crate::host::{ChainView, MasternodeView};
use crate::types::{Hash256, MasternodeId, OutPoint, PeerId};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoteError {
    #[error("Unknown masternode {0}")]
    UnknownMasternode(String),

    #[error("Failed to resolve outpoint {0}")]
    OutpointNotFound(String),

    #[error("Masternode {0} has no rank at the selection height")]
    Unranked(String),

    #[error("Masternode rank {rank} is outside the top {max}")]
    NotInCommittee { rank: u32, max: u32 },

    #[error("Vote is not signed")]
    MissingSignature,

    #[error("Invalid signature")]
    InvalidSignature,
}

/// One masternode's vote to lock `outpoint` for the transaction `tx_hash`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LockVote {
    pub tx_hash: Hash256,
    pub outpoint: OutPoint,
    pub masternode: MasternodeId,
    pub signature: Option<Signature>,
    /// Local receive/creation time; never on the wire.
    pub time_created: i64,
    /// Height the voted transaction confirmed at, -1 while unconfirmed.
    pub confirmed_height: i64,
}

impl LockVote {
    pub fn new(tx_hash: Hash256, outpoint: OutPoint, masternode: MasternodeId) -> Self {
        Self {
            tx_hash,
            outpoint,
            masternode,
            signature: None,
            time_created: chrono::Utc::now().timestamp(),
            confirmed_height: -1,
        }
    }

    /// Identity hash over (tx, outpoint, masternode). Signature excluded.
    pub fn vote_hash(&self) -> Hash256 {
        let mut hasher = Sha256::new();
        hasher.update(self.tx_hash);
        hasher.update(self.outpoint.txid);
        hasher.update(self.outpoint.vout.to_le_bytes());
        hasher.update(self.masternode.txid);
        hasher.update(self.masternode.vout.to_le_bytes());
        hasher.finalize().into()
    }

    /// Canonical signed message: hex tx hash followed by the short outpoint form.
    pub fn signing_payload(&self) -> Vec<u8> {
        format!(
            "{}{}",
            hex::encode(self.tx_hash),
            self.outpoint.to_short_string()
        )
        .into_bytes()
    }

    /// Sign with the local masternode key and self-verify the fresh signature.
    pub fn sign(&mut self, signing_key: &SigningKey) -> Result<(), VoteError> {
        let signature = signing_key.sign(&self.signing_payload());
        self.signature = Some(signature);
        self.verify(&signing_key.verifying_key())
    }

    pub fn verify(&self, public_key: &VerifyingKey) -> Result<(), VoteError> {
        let signature = self.signature.as_ref().ok_or(VoteError::MissingSignature)?;
        public_key
            .verify(&self.signing_payload(), signature)
            .map_err(|_| VoteError::InvalidSignature)
    }

    /// Full inbound validation: the claimed masternode must be registered,
    /// the voted outpoint must resolve to a creation height, the masternode
    /// must rank inside the committee at that height + the selection offset,
    /// and the signature must verify against its registered key.
    pub fn validate(
        &self,
        peer: Option<&PeerId>,
        chain: &dyn ChainView,
        masternodes: &dyn MasternodeView,
    ) -> Result<(), VoteError> {
        if !masternodes.contains(&self.masternode) {
            if let Some(peer) = peer {
                masternodes.request_entry(peer, &self.masternode);
            }
            return Err(VoteError::UnknownMasternode(
                self.masternode.to_short_string(),
            ));
        }

        // Votes can arrive after the outpoint was already spent (the lock
        // request may have been mined); fall back to the historical index so
        // legit late votes still count.
        let prevout_height = match chain.utxo_height(&self.outpoint) {
            Some(height) => height,
            None => chain
                .transaction(&self.outpoint.txid)
                .and_then(|(_, block_hash)| block_hash)
                .and_then(|block_hash| chain.block_height(&block_hash))
                .ok_or_else(|| VoteError::OutpointNotFound(self.outpoint.to_short_string()))?,
        };

        let selection_height = prevout_height + lock::RANK_HEIGHT_OFFSET;
        let rank = masternodes
            .rank(
                &self.masternode,
                selection_height,
                lock::MIN_PROTOCOL_VERSION,
            )
            .ok_or_else(|| VoteError::Unranked(self.masternode.to_short_string()))?;

        if rank as usize > lock::SIGNATURES_TOTAL {
            return Err(VoteError::NotInCommittee {
                rank,
                max: lock::SIGNATURES_TOTAL as u32,
            });
        }

        let entry = masternodes.entry(&self.masternode).ok_or_else(|| {
            VoteError::UnknownMasternode(self.masternode.to_short_string())
        })?;
        self.verify(&entry.public_key)
    }

    /// Votes expire with their candidate, a fixed number of blocks after the
    /// voted transaction confirmed.
    pub fn is_expired(&self, tip_height: i64) -> bool {
        self.confirmed_height != -1 && tip_height - self.confirmed_height > lock::KEEP_LOCK_BLOCKS
    }

    pub fn set_confirmed_height(&mut self, height: i64) {
        self.confirmed_height = height;
    }
}

/// All votes received for a single (tx, outpoint) pair, at most one per
/// masternode.
#[derive(Clone, Debug)]
pub struct OutPointLock {
    pub outpoint: OutPoint,
    masternode_votes: BTreeMap<MasternodeId, LockVote>,
}

impl OutPointLock {
    pub fn new(outpoint: OutPoint) -> Self {
        Self {
            outpoint,
            masternode_votes: BTreeMap::new(),
        }
    }

    /// Returns false if this masternode already voted here.
    pub fn add_vote(&mut self, vote: LockVote) -> bool {
        if self.masternode_votes.contains_key(&vote.masternode) {
            return false;
        }
        self.masternode_votes.insert(vote.masternode.clone(), vote);
        true
    }

    pub fn votes(&self) -> impl Iterator<Item = &LockVote> {
        self.masternode_votes.values()
    }

    pub fn has_masternode_voted(&self, id: &MasternodeId) -> bool {
        self.masternode_votes.contains_key(id)
    }

    pub fn count_votes(&self) -> usize {
        self.masternode_votes.len()
    }

    pub fn is_ready(&self) -> bool {
        self.count_votes() >= lock::SIGNATURES_REQUIRED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    fn test_vote(tx: u8, masternode: u8) -> LockVote {
        LockVote::new(
            [tx; 32],
            OutPoint::new([0xaa; 32], 1),
            OutPoint::new([masternode; 32], 0),
        )
    }

    #[test]
    fn test_vote_hash_excludes_signature() {
        let mut first = test_vote(1, 2);
        let mut second = test_vote(1, 2);
        first.sign(&test_key(7)).unwrap();
        second.sign(&test_key(8)).unwrap();
        assert_ne!(first.signature, second.signature);
        assert_eq!(first.vote_hash(), second.vote_hash());
    }

    #[test]
    fn test_sign_then_verify() {
        let key = test_key(3);
        let mut vote = test_vote(1, 2);
        vote.sign(&key).unwrap();
        vote.verify(&key.verifying_key()).unwrap();

        // a different key must not verify
        assert!(matches!(
            vote.verify(&test_key(4).verifying_key()),
            Err(VoteError::InvalidSignature)
        ));
    }

    #[test]
    fn test_unsigned_vote_does_not_verify() {
        let vote = test_vote(1, 2);
        assert!(matches!(
            vote.verify(&test_key(3).verifying_key()),
            Err(VoteError::MissingSignature)
        ));
    }

    #[test]
    fn test_outpoint_lock_quorum() {
        let outpoint = OutPoint::new([0xaa; 32], 1);
        let mut bucket = OutPointLock::new(outpoint.clone());

        for masternode in 0..lock::SIGNATURES_REQUIRED as u8 {
            assert!(!bucket.is_ready());
            assert!(bucket.add_vote(test_vote(1, masternode)));
        }
        assert!(bucket.is_ready());
        assert_eq!(bucket.count_votes(), lock::SIGNATURES_REQUIRED);
    }

    #[test]
    fn test_one_vote_per_masternode() {
        let mut bucket = OutPointLock::new(OutPoint::new([0xaa; 32], 1));
        assert!(bucket.add_vote(test_vote(1, 5)));
        assert!(!bucket.add_vote(test_vote(1, 5)));
        assert_eq!(bucket.count_votes(), 1);
        assert!(bucket.has_masternode_voted(&OutPoint::new([5; 32], 0)));
    }
}
