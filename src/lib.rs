//! SwiftLock: quorum-voted transaction locking for masternode networks.
//!
//! A node announces a transaction it wants locked; the top-ranked
//! masternodes per spent outpoint answer with signed votes; once every
//! outpoint has quorum the inputs are committed as locked and conflicting
//! spends are refused ahead of confirmation. The engine is in-memory only
//! and rebuilds from network traffic after a restart.
//!
//! The host daemon embeds [`engine::LockEngine`] and feeds it requests,
//! votes, tip updates and observed transactions; chain state, the
//! masternode registry, the mempool and the relay layer are supplied
//! through the traits in [`host`].

pub mod candidate;
pub mod config;
pub mod constants;
pub mod engine;
pub mod host;
pub mod lock_request;
pub mod message;
pub mod notify;
pub mod types;
pub mod vote;

pub use candidate::LockCandidate;
pub use config::LockConfig;
pub use engine::{LocalMasternode, LockEngine};
pub use lock_request::LockRequest;
pub use message::LockMessage;
pub use types::{BlockHeader, Hash256, MasternodeEntry, MasternodeId, OutPoint, Transaction};
pub use vote::{LockVote, OutPointLock};
