//! Consensus-level constants for the transaction lock protocol.
//!
//! These are deployment parameters: every node on a network must agree on
//! them for lock quorums to be meaningful.

/// Transaction lock voting parameters
pub mod lock {
    /// Size of the eligible committee per outpoint: the masternodes ranked
    /// 1..=SIGNATURES_TOTAL at the selection height may vote.
    pub const SIGNATURES_TOTAL: usize = 10;

    /// Votes required per outpoint before it is considered locked.
    pub const SIGNATURES_REQUIRED: usize = 6;

    /// Input maturity the user surface advertises. The request validator
    /// enforces one confirmation less so a block propagating at send time
    /// does not spuriously reject the request.
    pub const CONFIRMATIONS_REQUIRED: i64 = 6;

    /// Flat fee floor in satoshis; a request must pay at least
    /// max(MIN_FEE, inputs * MIN_FEE).
    pub const MIN_FEE: u64 = 100_000;

    /// Warn (non-fatal) when a request spends more inputs than this.
    pub const WARN_MANY_INPUTS: usize = 100;

    /// A request that has not reached quorum within this wall-clock age is
    /// reported as timed out.
    pub const TIMEOUT_SECONDS: i64 = 5 * 60;

    /// Orphan votes (votes seen before their transaction) are dropped after
    /// this many seconds.
    pub const ORPHAN_VOTE_SECONDS: i64 = 60;

    /// Suspicion window per masternode that keeps submitting orphan votes;
    /// drives the spam throttle.
    pub const ORPHAN_VOTER_SECONDS: i64 = 10 * 60;

    /// Locks and votes expire this many blocks after the block their
    /// transaction was confirmed in.
    pub const KEEP_LOCK_BLOCKS: i64 = 24;

    /// Committee rank is evaluated this many blocks after the spent outpoint
    /// was created, pinning membership to a consensus-agreed snapshot.
    pub const RANK_HEIGHT_OFFSET: i64 = 4;

    /// Minimum protocol version a masternode must run for its votes to count.
    pub const MIN_PROTOCOL_VERSION: u32 = 2;
}
