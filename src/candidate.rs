//! Lock candidates: one request plus the votes collected per spent outpoint.

use crate::constants::lock;
use crate::lock_request::LockRequest;
use crate::types::{Hash256, MasternodeId, OutPoint};
use crate::vote::{LockVote, OutPointLock};
use std::collections::BTreeMap;

/// Aggregate voting state for one lock request. The keys of `outpoint_locks`
/// always equal the request's input outpoints.
#[derive(Clone, Debug)]
pub struct LockCandidate {
    pub request: LockRequest,
    outpoint_locks: BTreeMap<OutPoint, OutPointLock>,
    /// Height the transaction confirmed at; -1 while unconfirmed, 0 marks a
    /// candidate force-expired by conflict resolution.
    pub confirmed_height: i64,
}

impl LockCandidate {
    /// Builds the candidate with an empty vote bucket per input.
    pub fn new(request: LockRequest) -> Self {
        let outpoint_locks = request
            .outpoints()
            .map(|outpoint| (outpoint.clone(), OutPointLock::new(outpoint.clone())))
            .collect();
        Self {
            request,
            outpoint_locks,
            confirmed_height: -1,
        }
    }

    pub fn tx_hash(&self) -> Hash256 {
        self.request.tx_hash()
    }

    pub fn outpoint_locks(&self) -> impl Iterator<Item = &OutPointLock> {
        self.outpoint_locks.values()
    }

    pub fn outpoints(&self) -> impl Iterator<Item = &OutPoint> {
        self.outpoint_locks.keys()
    }

    pub fn outpoint_lock(&self, outpoint: &OutPoint) -> Option<&OutPointLock> {
        self.outpoint_locks.get(outpoint)
    }

    /// Returns false if the vote's outpoint is not one of ours or the
    /// masternode already voted on it.
    pub fn add_vote(&mut self, vote: LockVote) -> bool {
        match self.outpoint_locks.get_mut(&vote.outpoint) {
            Some(bucket) => bucket.add_vote(vote),
            None => false,
        }
    }

    /// Quorum on every input. An empty lock map is never ready.
    pub fn is_all_ready(&self) -> bool {
        !self.outpoint_locks.is_empty()
            && self.outpoint_locks.values().all(|bucket| bucket.is_ready())
    }

    pub fn has_masternode_voted(&self, outpoint: &OutPoint, id: &MasternodeId) -> bool {
        self.outpoint_locks
            .get(outpoint)
            .is_some_and(|bucket| bucket.has_masternode_voted(id))
    }

    /// Total votes across all inputs. Do not use this to decide locked
    /// status; that is `is_all_ready`.
    pub fn count_votes(&self) -> usize {
        self.outpoint_locks
            .values()
            .map(|bucket| bucket.count_votes())
            .sum()
    }

    pub fn is_expired(&self, tip_height: i64) -> bool {
        self.confirmed_height != -1
            && tip_height - self.confirmed_height > lock::KEEP_LOCK_BLOCKS
    }

    pub fn set_confirmed_height(&mut self, height: i64) {
        self.confirmed_height = height;
    }
}
