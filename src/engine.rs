//! The transaction lock engine.
//!
//! Owns every lock candidate, vote, orphan vote and reverse index, and
//! orchestrates the whole flow: request intake, local committee voting,
//! inbound vote handling, quorum finalization with conflict resolution, and
//! height-driven expiry.
//!
//! All state sits behind one mutex; public methods are synchronous, acquire
//! on entry and release on return. Lock order with the host is
//! chain state -> engine -> mempool: host views are only read while the
//! engine mutex is held, and none of them may call back into the engine.

use crate::candidate::LockCandidate;
use crate::config::LockConfig;
use crate::constants::lock;
use crate::host::{ChainView, HostEvents, MasternodeView, MempoolView};
use crate::lock_request::LockRequest;
use crate::notify;
use crate::types::{BlockHeader, Hash256, MasternodeId, OutPoint, PeerId, Transaction};
use crate::vote::LockVote;
use ed25519_dalek::SigningKey;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identity and key of the masternode this node operates, if any. Nodes
/// without one still track locks; they just never vote.
pub struct LocalMasternode {
    pub id: MasternodeId,
    pub signing_key: SigningKey,
}

#[derive(Default)]
struct EngineState {
    /// Active candidates by transaction hash.
    candidates: HashMap<Hash256, LockCandidate>,
    /// Every vote ever accepted, by identity hash. Deduplication index.
    votes: HashMap<Hash256, LockVote>,
    /// Votes whose transaction has no candidate yet.
    orphan_votes: HashMap<Hash256, LockVote>,
    /// Committed locks. The single source of truth for "this outpoint is
    /// locked by this tx".
    locked_outpoints: HashMap<OutPoint, Hash256>,
    /// Every tx that received at least one vote per outpoint.
    voted_outpoints: HashMap<OutPoint, BTreeSet<Hash256>>,
    accepted_requests: HashMap<Hash256, LockRequest>,
    rejected_requests: HashMap<Hash256, LockRequest>,
    /// Spam-suspicion expiry per masternode submitting orphan votes.
    orphan_voter_expiry: HashMap<MasternodeId, i64>,
    tip: Option<BlockHeader>,
}

pub struct LockEngine {
    state: Mutex<EngineState>,
    config: LockConfig,
    chain: Arc<dyn ChainView>,
    masternodes: Arc<dyn MasternodeView>,
    mempool: Arc<dyn MempoolView>,
    events: Arc<dyn HostEvents>,
    local: Option<LocalMasternode>,
    completed_locks: AtomicU64,
}

impl LockEngine {
    pub fn new(
        config: LockConfig,
        chain: Arc<dyn ChainView>,
        masternodes: Arc<dyn MasternodeView>,
        mempool: Arc<dyn MempoolView>,
        events: Arc<dyn HostEvents>,
    ) -> Self {
        Self {
            state: Mutex::new(EngineState::default()),
            config,
            chain,
            masternodes,
            mempool,
            events,
            local: None,
            completed_locks: AtomicU64::new(0),
        }
    }

    /// Enable local voting with this masternode identity.
    pub fn with_local_masternode(mut self, local: LocalMasternode) -> Self {
        self.local = Some(local);
        self
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Completed locks since startup.
    pub fn completed_locks(&self) -> u64 {
        self.completed_locks.load(Ordering::Relaxed)
    }

    // ------------------------------------------------------------------
    // Request intake
    // ------------------------------------------------------------------

    pub fn process_request(&self, request: LockRequest) -> bool {
        if !self.config.enabled || !self.masternodes.is_synced() {
            return false;
        }
        let mut guard = self.state.lock();
        self.process_request_inner(&mut guard, request)
    }

    fn process_request_inner(&self, state: &mut EngineState, request: LockRequest) -> bool {
        let tx_hash = request.tx_hash();

        // A completed lock owned by a different tx on any of our inputs is
        // fatal: there can never be two completed locks for one outpoint.
        for outpoint in request.outpoints() {
            if let Some(locked_by) = state.locked_outpoints.get(outpoint) {
                if *locked_by != tx_hash {
                    tracing::warn!(
                        "⚠️ Lock request {} conflicts with completed lock {} on {}",
                        hex::encode(tx_hash),
                        hex::encode(locked_by),
                        outpoint.to_short_string()
                    );
                    return false;
                }
            }
        }

        // Competing requests with votes on the same outpoint are allowed to
        // race; the committee adjudicates which one reaches quorum.
        for outpoint in request.outpoints() {
            if let Some(hashes) = state.voted_outpoints.get(outpoint) {
                for hash in hashes {
                    if *hash != tx_hash {
                        tracing::warn!(
                            "⚔️ Double-spend attempt on {}: {} competes with {}",
                            outpoint.to_short_string(),
                            hex::encode(tx_hash),
                            hex::encode(hash)
                        );
                    }
                }
            }
        }

        if !self.create_candidate(state, request) {
            return false;
        }

        self.vote_candidate(state, &tx_hash);
        self.process_orphan_votes(state, &tx_hash);

        // Peers sometimes propagate votes before the transaction itself; the
        // replay above may already have completed the quorum.
        self.try_finalize(state, &tx_hash);

        true
    }

    /// Validates the request and instantiates the candidate with one empty
    /// vote bucket per input. Idempotent for a known transaction.
    fn create_candidate(&self, state: &mut EngineState, request: LockRequest) -> bool {
        let tx_hash = request.tx_hash();

        // Normally every input must be unspent, but when reprocessing on the
        // strength of many legit orphan votes the inputs may have been spent
        // by a conflicting path that lost; fall back to the historical index.
        let require_unspent = !self.has_enough_orphan_votes(state, &request);
        if let Err(e) = request.validate(self.chain.as_ref(), require_unspent) {
            tracing::info!(
                "❌ Lock request rejected: txid={} reason={}",
                hex::encode(tx_hash),
                e
            );
            state.rejected_requests.insert(tx_hash, request);
            return false;
        }

        if !state.candidates.contains_key(&tx_hash) {
            tracing::info!("✅ New lock candidate: txid={}", hex::encode(tx_hash));
            state
                .candidates
                .insert(tx_hash, LockCandidate::new(request.clone()));
        } else {
            tracing::debug!("Lock candidate already known: txid={}", hex::encode(tx_hash));
        }
        state.accepted_requests.insert(tx_hash, request);
        true
    }

    // ------------------------------------------------------------------
    // Local voting
    // ------------------------------------------------------------------

    /// Vote for every outpoint of the candidate this node is in the committee
    /// for. A masternode may vote for a given outpoint at most once, ever,
    /// across all competing candidates.
    fn vote_candidate(&self, state: &mut EngineState, tx_hash: &Hash256) {
        let Some(local) = &self.local else { return };

        let outpoints: Vec<OutPoint> = match state.candidates.get(tx_hash) {
            Some(candidate) => candidate.outpoints().cloned().collect(),
            None => return,
        };

        for outpoint in outpoints {
            // An unresolvable outpoint means our UTXO view is incoherent
            // right now; stop the whole loop rather than vote on partial data.
            let Some(prevout_height) = self.chain.utxo_height(&outpoint) else {
                tracing::debug!("Failed to find UTXO {}", outpoint.to_short_string());
                return;
            };

            let selection_height = prevout_height + lock::RANK_HEIGHT_OFFSET;
            let Some(rank) =
                self.masternodes
                    .rank(&local.id, selection_height, lock::MIN_PROTOCOL_VERSION)
            else {
                tracing::debug!(
                    "Local masternode unranked at height {}",
                    selection_height
                );
                continue;
            };
            if rank as usize > lock::SIGNATURES_TOTAL {
                tracing::debug!(
                    "Not in the top {} at height {} (rank {})",
                    lock::SIGNATURES_TOTAL,
                    selection_height,
                    rank
                );
                continue;
            }

            let already_voted = state.voted_outpoints.get(&outpoint).is_some_and(|hashes| {
                hashes.iter().any(|hash| {
                    state
                        .candidates
                        .get(hash)
                        .is_some_and(|c| c.has_masternode_voted(&outpoint, &local.id))
                })
            });
            if already_voted {
                // Signing the same outpoint twice is slashable, even across
                // competing candidates.
                tracing::warn!(
                    "⚠️ Already voted for outpoint {}, skipping",
                    outpoint.to_short_string()
                );
                continue;
            }

            let mut vote = LockVote::new(*tx_hash, outpoint.clone(), local.id.clone());
            if let Err(e) = vote.sign(&local.signing_key) {
                // A fresh signature failing self-verification means the local
                // key is unusable; abort the voting loop.
                tracing::error!("❌ Failed to sign lock vote: {}", e);
                return;
            }

            let vote_hash = vote.vote_hash();
            let attached = state
                .candidates
                .get_mut(tx_hash)
                .is_some_and(|c| c.add_vote(vote.clone()));
            if !attached {
                continue;
            }

            state.votes.insert(vote_hash, vote);
            let voted = state.voted_outpoints.entry(outpoint.clone()).or_default();
            voted.insert(*tx_hash);
            if voted.len() > 1 {
                tracing::warn!(
                    "⚠️ Our vote on {} conflicts with existing votes",
                    outpoint.to_short_string()
                );
            }

            tracing::info!(
                "🗳️ Vote created, relaying: txid={} outpoint={}",
                hex::encode(tx_hash),
                outpoint.to_short_string()
            );
            self.events.relay_vote(vote_hash);
        }
    }

    // ------------------------------------------------------------------
    // Inbound votes
    // ------------------------------------------------------------------

    pub fn process_vote(&self, peer: Option<&PeerId>, vote: LockVote) -> bool {
        if !self.config.enabled || !self.masternodes.is_synced() {
            return false;
        }
        let mut guard = self.state.lock();
        self.process_vote_inner(&mut guard, peer, vote, false)
    }

    fn process_vote_inner(
        &self,
        state: &mut EngineState,
        peer: Option<&PeerId>,
        vote: LockVote,
        replaying: bool,
    ) -> bool {
        let tx_hash = vote.tx_hash;
        let vote_hash = vote.vote_hash();

        // Validation always runs, even for a hash we already hold: the
        // identity hash excludes the signature, so a resend with a bad
        // signature must still be rejected rather than waved through.
        if let Err(e) = vote.validate(peer, self.chain.as_ref(), self.masternodes.as_ref()) {
            tracing::debug!(
                "Invalid lock vote: txid={} masternode={} reason={}",
                hex::encode(tx_hash),
                vote.masternode.to_short_string(),
                e
            );
            return false;
        }

        // A differently-signed duplicate collides here; only the first
        // submission is stored.
        let is_new = !state.votes.contains_key(&vote_hash);
        if !replaying && !is_new && !state.orphan_votes.contains_key(&vote_hash) {
            return true;
        }

        if !state.candidates.contains_key(&tx_hash) {
            return self.handle_orphan_vote(state, vote, is_new);
        }

        // Refuse a vote from a masternode that already voted this outpoint
        // into a different transaction; double-signing is slashable and the
        // vote must not be propagated further.
        if let Some(hashes) = state.voted_outpoints.get(&vote.outpoint) {
            for hash in hashes {
                if *hash != tx_hash {
                    let double_signed = state
                        .candidates
                        .get(hash)
                        .is_some_and(|c| c.has_masternode_voted(&vote.outpoint, &vote.masternode));
                    if double_signed {
                        tracing::warn!(
                            "🚨 Masternode {} sent conflicting votes on {}",
                            vote.masternode.to_short_string(),
                            vote.outpoint.to_short_string()
                        );
                        return false;
                    }
                }
            }
        }
        state
            .voted_outpoints
            .entry(vote.outpoint.clone())
            .or_default()
            .insert(tx_hash);

        let attached = state
            .candidates
            .get_mut(&tx_hash)
            .is_some_and(|c| c.add_vote(vote.clone()));
        if !attached {
            // Foreign outpoint or a duplicate that slipped past the hash
            // check; nothing to count.
            tracing::debug!(
                "Vote not attachable: txid={} outpoint={}",
                hex::encode(tx_hash),
                vote.outpoint.to_short_string()
            );
            return false;
        }

        state.votes.insert(vote_hash, vote);
        state.orphan_votes.remove(&vote_hash);

        if let Some(candidate) = state.candidates.get(&tx_hash) {
            tracing::debug!(
                "Lock signatures: {}/{} txid={}",
                candidate.count_votes(),
                candidate.request.max_signatures(),
                hex::encode(tx_hash)
            );
        }

        self.try_finalize(state, &tx_hash);
        self.events.relay_vote(vote_hash);

        true
    }

    /// A vote for a transaction we have no candidate for: stash it, maybe
    /// reprocess a remembered request it completes, and throttle masternodes
    /// that keep sending orphans.
    fn handle_orphan_vote(&self, state: &mut EngineState, vote: LockVote, is_new: bool) -> bool {
        let tx_hash = vote.tx_hash;
        let vote_hash = vote.vote_hash();
        let masternode = vote.masternode.clone();

        if is_new {
            tracing::debug!(
                "Orphan vote: txid={} masternode={} new",
                hex::encode(tx_hash),
                masternode.to_short_string()
            );
            state.votes.insert(vote_hash, vote.clone());
            state.orphan_votes.insert(vote_hash, vote);

            let remembered = state
                .accepted_requests
                .get(&tx_hash)
                .or_else(|| state.rejected_requests.get(&tx_hash))
                .cloned();
            if let Some(request) = remembered {
                if self.has_enough_orphan_votes(state, &request) {
                    // Enough orphan evidence to complete the lock; run the
                    // request through intake again.
                    tracing::info!(
                        "🔁 Enough orphan votes, reprocessing lock request: txid={}",
                        hex::encode(tx_hash)
                    );
                    self.process_request_inner(state, request);
                    return true;
                }
            }
        } else {
            tracing::debug!(
                "Orphan vote: txid={} masternode={} seen",
                hex::encode(tx_hash),
                masternode.to_short_string()
            );
        }

        // Throttle: a masternode whose previous suspicion window is still
        // open and above the table average is flooding us with orphans.
        let now = chrono::Utc::now().timestamp();
        let refreshed = now + lock::ORPHAN_VOTER_SECONDS;
        match state.orphan_voter_expiry.get(&masternode).copied() {
            None => {
                state.orphan_voter_expiry.insert(masternode, refreshed);
            }
            Some(previous) => {
                if previous > now && previous > Self::average_orphan_voter_expiry(state) {
                    tracing::debug!(
                        "Masternode {} is spamming orphan lock votes: txid={}",
                        masternode.to_short_string(),
                        hex::encode(tx_hash)
                    );
                    return false;
                }
                state.orphan_voter_expiry.insert(masternode, refreshed);
            }
        }

        true
    }

    fn average_orphan_voter_expiry(state: &EngineState) -> i64 {
        if state.orphan_voter_expiry.is_empty() {
            return 0;
        }
        let total: i64 = state.orphan_voter_expiry.values().sum();
        total / state.orphan_voter_expiry.len() as i64
    }

    /// Replay stashed orphan votes against a freshly created candidate,
    /// dropping the ones that were consumed.
    fn process_orphan_votes(&self, state: &mut EngineState, tx_hash: &Hash256) {
        let orphan_hashes: Vec<Hash256> = state
            .orphan_votes
            .iter()
            .filter(|(_, vote)| vote.tx_hash == *tx_hash)
            .map(|(hash, _)| *hash)
            .collect();

        for vote_hash in orphan_hashes {
            let Some(vote) = state.orphan_votes.get(&vote_hash).cloned() else {
                continue;
            };
            if self.process_vote_inner(state, None, vote, true) {
                state.orphan_votes.remove(&vote_hash);
            }
        }
    }

    /// Every input of the request has quorum-many orphan votes stashed.
    fn has_enough_orphan_votes(&self, state: &EngineState, request: &LockRequest) -> bool {
        let tx_hash = request.tx_hash();
        for outpoint in request.outpoints() {
            let count = state
                .orphan_votes
                .values()
                .filter(|vote| vote.tx_hash == tx_hash && vote.outpoint == *outpoint)
                .count();
            if count < lock::SIGNATURES_REQUIRED {
                return false;
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // Finalization and conflict resolution
    // ------------------------------------------------------------------

    fn try_finalize(&self, state: &mut EngineState, tx_hash: &Hash256) {
        let all_ready = state
            .candidates
            .get(tx_hash)
            .is_some_and(|c| c.is_all_ready());
        if !all_ready || Self::is_locked_inner(state, tx_hash) {
            return;
        }

        tracing::debug!(
            "Transaction lock ready to complete: txid={}",
            hex::encode(tx_hash)
        );
        if self.resolve_conflicts(state, tx_hash) {
            self.lock_inputs(state, tx_hash);
            self.update_locked_transaction(state, tx_hash);
        }
    }

    /// Checks a quorum-complete candidate against committed locks, the
    /// mempool and the UTXO set. On a double-lock both candidates are
    /// force-expired and rejected; any other conflict just fails this
    /// attempt (finalize retries as the mempool shifts).
    fn resolve_conflicts(&self, state: &mut EngineState, tx_hash: &Hash256) -> bool {
        let outpoints: Vec<OutPoint> = match state.candidates.get(tx_hash) {
            Some(candidate) if candidate.is_all_ready() => {
                candidate.outpoints().cloned().collect()
            }
            _ => return false,
        };

        for outpoint in &outpoints {
            let conflicting = state.locked_outpoints.get(outpoint).copied();
            if let Some(conflicting) = conflicting.filter(|hash| hash != tx_hash) {
                // Two completed locks over one outpoint: a majority of the
                // committee for this input was malicious. Drop both
                // candidates; the inputs fall back to normal mempool rules.
                let request = state.candidates.get(tx_hash).map(|c| c.request.clone());
                let conflicting_request = state
                    .candidates
                    .get(&conflicting)
                    .map(|c| c.request.clone());
                let (Some(request), Some(conflicting_request)) =
                    (request, conflicting_request)
                else {
                    tracing::error!(
                        "❌ Conflicting completed lock with missing candidate: txid={} conflicting={}",
                        hex::encode(tx_hash),
                        hex::encode(conflicting)
                    );
                    return false;
                };

                tracing::error!(
                    "🚨 Conflicting completed transaction locks, dropping both: txid={} conflicting={}",
                    hex::encode(tx_hash),
                    hex::encode(conflicting)
                );
                if let Some(candidate) = state.candidates.get_mut(tx_hash) {
                    candidate.set_confirmed_height(0);
                }
                if let Some(candidate) = state.candidates.get_mut(&conflicting) {
                    candidate.set_confirmed_height(0);
                }
                self.check_and_remove_inner(state);
                // already_have must keep answering true for both of them.
                state.rejected_requests.insert(*tx_hash, request);
                state
                    .rejected_requests
                    .insert(conflicting, conflicting_request);
                return false;
            }

            if conflicting.is_none() {
                if let Some(spender) = self.mempool.spending_tx(outpoint) {
                    if spender != *tx_hash {
                        tracing::warn!(
                            "⚠️ Lock conflicts with mempool spend of {}: txid={}",
                            outpoint.to_short_string(),
                            hex::encode(tx_hash)
                        );
                        return false;
                    }
                }
            }
        }

        // Already mined: the lock is trivially consistent with the chain.
        if let Some((_, Some(_))) = self.chain.transaction(tx_hash) {
            tracing::debug!(
                "Transaction already included in a block: txid={}",
                hex::encode(tx_hash)
            );
            return true;
        }

        // Not mined yet: every input must still be unspent, otherwise a
        // conflicting tx was mined while votes were in flight.
        for outpoint in &outpoints {
            if self.chain.utxo_coin(outpoint).is_none() {
                tracing::warn!(
                    "⚠️ Failed to find UTXO {}, can't complete lock: txid={}",
                    outpoint.to_short_string(),
                    hex::encode(tx_hash)
                );
                return false;
            }
        }

        true
    }

    /// Commit every outpoint of a quorum-complete candidate into the locked
    /// set.
    fn lock_inputs(&self, state: &mut EngineState, tx_hash: &Hash256) {
        let outpoints: Vec<OutPoint> = match state.candidates.get(tx_hash) {
            Some(candidate) if candidate.is_all_ready() => {
                candidate.outpoints().cloned().collect()
            }
            _ => return,
        };
        for outpoint in outpoints {
            state.locked_outpoints.insert(outpoint, *tx_hash);
        }
        tracing::info!("🔒 Transaction inputs locked: txid={}", hex::encode(tx_hash));
    }

    /// Post-commit side effects: wallet event, completed-lock counter and the
    /// configured external notification command.
    fn update_locked_transaction(&self, state: &EngineState, tx_hash: &Hash256) {
        if !Self::is_locked_inner(state, tx_hash) {
            return;
        }
        self.events.transaction_lock_updated(*tx_hash);
        self.completed_locks.fetch_add(1, Ordering::Relaxed);
        notify::spawn_lock_notify(&self.config.notify_command, *tx_hash);
        tracing::info!(
            "✅ Transaction lock completed: txid={}",
            hex::encode(tx_hash)
        );
    }

    fn is_locked_inner(state: &EngineState, tx_hash: &Hash256) -> bool {
        let Some(candidate) = state.candidates.get(tx_hash) else {
            return false;
        };
        let mut outpoints = candidate.outpoints().peekable();
        if outpoints.peek().is_none() {
            return false;
        }
        outpoints.all(|outpoint| state.locked_outpoints.get(outpoint) == Some(tx_hash))
    }

    // ------------------------------------------------------------------
    // Expiry and chain sync
    // ------------------------------------------------------------------

    pub fn updated_block_tip(&self, header: BlockHeader) {
        let mut guard = self.state.lock();
        tracing::debug!("Chain tip updated: height={}", header.height);
        guard.tip = Some(header);
    }

    /// Drop candidates, votes and bookkeeping that aged out of the keep
    /// window, orphan votes past their wall-clock expiry, and spent
    /// suspicion timers.
    pub fn check_and_remove(&self) {
        let mut guard = self.state.lock();
        self.check_and_remove_inner(&mut guard);
    }

    fn check_and_remove_inner(&self, state: &mut EngineState) {
        let Some(tip_height) = state.tip.as_ref().map(|tip| tip.height) else {
            return;
        };

        // Partition expired candidates from live, then drop everything the
        // expired ones own.
        let expired: Vec<Hash256> = state
            .candidates
            .iter()
            .filter(|(_, candidate)| candidate.is_expired(tip_height))
            .map(|(hash, _)| *hash)
            .collect();
        for tx_hash in expired {
            if let Some(candidate) = state.candidates.remove(&tx_hash) {
                tracing::info!(
                    "🧹 Removing expired lock candidate: txid={}",
                    hex::encode(tx_hash)
                );
                for outpoint in candidate.outpoints() {
                    state.locked_outpoints.remove(outpoint);
                    state.voted_outpoints.remove(outpoint);
                }
                state.accepted_requests.remove(&tx_hash);
                state.rejected_requests.remove(&tx_hash);
            }
        }

        state.votes.retain(|_, vote| !vote.is_expired(tip_height));

        let now = chrono::Utc::now().timestamp();
        let stale: Vec<Hash256> = state
            .orphan_votes
            .iter()
            .filter(|(_, vote)| now - vote.time_created > lock::ORPHAN_VOTE_SECONDS)
            .map(|(hash, _)| *hash)
            .collect();
        for vote_hash in stale {
            tracing::debug!("Removing expired orphan vote");
            state.votes.remove(&vote_hash);
            state.orphan_votes.remove(&vote_hash);
        }

        state.orphan_voter_expiry.retain(|_, expiry| *expiry >= now);
    }

    /// Track confirmation height changes for a transaction observed in a
    /// block, a reorg, or a disconnect back to the mempool. No block means
    /// the tx went back to unconfirmed (-1).
    pub fn sync_transaction(&self, tx: &Transaction, block_hash: Option<&Hash256>) {
        if tx.is_coinbase() {
            return;
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let tx_hash = tx.txid();
        let new_height = block_hash
            .and_then(|hash| self.chain.block_height(hash))
            .unwrap_or(-1);

        if let Some(candidate) = state.candidates.get_mut(&tx_hash) {
            tracing::debug!(
                "Lock candidate confirmed height updated: txid={} height={}",
                hex::encode(tx_hash),
                new_height
            );
            candidate.set_confirmed_height(new_height);
            let vote_hashes: Vec<Hash256> = candidate
                .outpoint_locks()
                .flat_map(|bucket| bucket.votes().map(|vote| vote.vote_hash()))
                .collect();
            for vote_hash in vote_hashes {
                if let Some(vote) = state.votes.get_mut(&vote_hash) {
                    vote.set_confirmed_height(new_height);
                }
            }
        }

        let orphan_hashes: Vec<Hash256> = state
            .orphan_votes
            .iter()
            .filter(|(_, vote)| vote.tx_hash == tx_hash)
            .map(|(hash, _)| *hash)
            .collect();
        for vote_hash in orphan_hashes {
            if let Some(vote) = state.votes.get_mut(&vote_hash) {
                vote.set_confirmed_height(new_height);
            }
            if let Some(vote) = state.orphan_votes.get_mut(&vote_hash) {
                vote.set_confirmed_height(new_height);
            }
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Whether this request or vote hash was already seen (accepted,
    /// rejected, or stored as a vote).
    pub fn already_have(&self, hash: &Hash256) -> bool {
        let guard = self.state.lock();
        guard.accepted_requests.contains_key(hash)
            || guard.rejected_requests.contains_key(hash)
            || guard.votes.contains_key(hash)
    }

    pub fn tx_lock_request(&self, tx_hash: &Hash256) -> Option<LockRequest> {
        let guard = self.state.lock();
        guard
            .candidates
            .get(tx_hash)
            .map(|candidate| candidate.request.clone())
    }

    pub fn tx_lock_vote(&self, vote_hash: &Hash256) -> Option<LockVote> {
        let guard = self.state.lock();
        guard.votes.get(vote_hash).cloned()
    }

    /// Quorum reached on every input (the lock may not be committed yet).
    pub fn is_ready_to_lock(&self, tx_hash: &Hash256) -> bool {
        let guard = self.state.lock();
        guard
            .candidates
            .get(tx_hash)
            .is_some_and(|candidate| candidate.is_all_ready())
    }

    /// The transaction's inputs are committed in the locked set.
    pub fn is_locked(&self, tx_hash: &Hash256) -> bool {
        let guard = self.state.lock();
        Self::is_locked_inner(&guard, tx_hash)
    }

    /// Which transaction holds the completed lock on this outpoint, if any.
    pub fn locked_outpoint_tx(&self, outpoint: &OutPoint) -> Option<Hash256> {
        let guard = self.state.lock();
        guard.locked_outpoints.get(outpoint).copied()
    }

    /// Total votes across the candidate's inputs; -1 when locking is
    /// disabled or the transaction is unknown.
    pub fn signatures_count(&self, tx_hash: &Hash256) -> i32 {
        if !self.config.enabled {
            return -1;
        }
        let guard = self.state.lock();
        match guard.candidates.get(tx_hash) {
            Some(candidate) => candidate.count_votes() as i32,
            None => -1,
        }
    }

    /// A known candidate that never reached quorum within the wall-clock
    /// window.
    pub fn is_timed_out(&self, tx_hash: &Hash256) -> bool {
        if !self.config.enabled {
            return false;
        }
        let guard = self.state.lock();
        guard.candidates.get(tx_hash).is_some_and(|candidate| {
            !candidate.is_all_ready() && candidate.request.is_timed_out()
        })
    }

    /// Re-announce a candidate: the full transaction plus every stored vote.
    pub fn relay(&self, tx_hash: &Hash256) {
        let guard = self.state.lock();
        let Some(candidate) = guard.candidates.get(tx_hash) else {
            return;
        };
        self.events.relay_transaction(&candidate.request.tx);
        for bucket in candidate.outpoint_locks() {
            for vote in bucket.votes() {
                self.events.relay_vote(vote.vote_hash());
            }
        }
    }

    /// Number of orphan votes currently stashed. Diagnostic surface.
    pub fn orphan_vote_count(&self) -> usize {
        self.state.lock().orphan_votes.len()
    }
}
