//! Lock requests and their admission checks.
//!
//! A lock request is a full transaction a node wants quorum-locked before it
//! confirms. The validator gates what the engine will even create a candidate
//! for: structural shape, chain finality, recognized output scripts, mature
//! inputs and a fee floor scaled by input count.

use crate::constants::lock;
use crate::host::ChainView;
use crate::types::{Hash256, OutPoint, Transaction};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Transaction has no outputs")]
    NoOutputs,

    #[error("Transaction is not final")]
    NotFinal,

    #[error("Output {0} has an unrecognized script form")]
    NonStandardScript(usize),

    #[error("Failed to find outpoint {0}")]
    OutpointNotFound(String),

    #[error("Outpoint {0} index out of range")]
    OutpointOutOfRange(String),

    #[error("Input {outpoint} too new: age {age}, need {required}")]
    ImmatureInput {
        outpoint: String,
        age: i64,
        required: i64,
    },

    #[error("Insufficient fee: {fee} paid, {required} required")]
    InsufficientFee { fee: u64, required: u64 },
}

/// A transaction submitted for locking, stamped with its intake time.
#[derive(Clone, Debug)]
pub struct LockRequest {
    pub tx: Transaction,
    /// When this node first saw the request; drives the quorum timeout.
    pub received_at: i64,
}

impl LockRequest {
    pub fn new(tx: Transaction) -> Self {
        Self {
            tx,
            received_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn tx_hash(&self) -> Hash256 {
        self.tx.txid()
    }

    pub fn outpoints(&self) -> impl Iterator<Item = &OutPoint> {
        self.tx.inputs.iter().map(|input| &input.previous_output)
    }

    /// Flat floor, scaled per input so many-input requests pay for the vote
    /// traffic they cause.
    pub fn min_fee(&self) -> u64 {
        lock::MIN_FEE.max(self.tx.inputs.len() as u64 * lock::MIN_FEE)
    }

    /// Upper bound on the votes this request can ever collect.
    pub fn max_signatures(&self) -> usize {
        self.tx.inputs.len() * lock::SIGNATURES_TOTAL
    }

    pub fn is_timed_out(&self) -> bool {
        chrono::Utc::now().timestamp() - self.received_at > lock::TIMEOUT_SECONDS
    }

    /// Admission checks against the current chain view.
    ///
    /// `require_unspent` is relaxed only when reprocessing a request backed by
    /// enough orphan votes: the inputs may have been spent by a conflicting
    /// path that ultimately lost, and the historical index is consulted
    /// instead of the live UTXO set.
    pub fn validate(&self, chain: &dyn ChainView, require_unspent: bool) -> Result<(), RequestError> {
        if self.tx.outputs.is_empty() {
            return Err(RequestError::NoOutputs);
        }

        if self.tx.inputs.len() > lock::WARN_MANY_INPUTS {
            tracing::warn!(
                "⚠️ Lock request {} spends {} inputs",
                hex::encode(self.tx_hash()),
                self.tx.inputs.len()
            );
        }

        if !chain.is_final(&self.tx) {
            return Err(RequestError::NotFinal);
        }

        for (index, output) in self.tx.outputs.iter().enumerate() {
            // Normal payments and data carriers only; anything fancier cannot
            // be vote-locked.
            if !output.is_normal_payment_script() && !output.is_unspendable() {
                return Err(RequestError::NonStandardScript(index));
            }
        }

        let mut value_in: u64 = 0;

        for input in &self.tx.inputs {
            let outpoint = &input.previous_output;

            let (value, prevout_height) = match chain.utxo_coin(outpoint) {
                Some(coin) => coin,
                None => {
                    if require_unspent {
                        return Err(RequestError::OutpointNotFound(outpoint.to_short_string()));
                    }
                    self.resolve_spent_outpoint(chain, outpoint)?
                }
            };

            let age = chain.height() - prevout_height + 1;
            // One less than the user surface requires, in case a block is
            // propagating the network at send time.
            let required = lock::CONFIRMATIONS_REQUIRED - 1;
            if age < required {
                return Err(RequestError::ImmatureInput {
                    outpoint: outpoint.to_short_string(),
                    age,
                    required,
                });
            }

            value_in += value;
        }

        let fee = value_in.saturating_sub(self.tx.value_out());
        if fee < self.min_fee() {
            return Err(RequestError::InsufficientFee {
                fee,
                required: self.min_fee(),
            });
        }

        Ok(())
    }

    /// Historical lookup for an outpoint no longer in the UTXO set: the
    /// producing transaction must exist, be confirmed, and actually have the
    /// referenced output.
    fn resolve_spent_outpoint(
        &self,
        chain: &dyn ChainView,
        outpoint: &OutPoint,
    ) -> Result<(u64, i64), RequestError> {
        let (produced, block_hash) = chain
            .transaction(&outpoint.txid)
            .ok_or_else(|| RequestError::OutpointNotFound(outpoint.to_short_string()))?;
        let block_hash =
            block_hash.ok_or_else(|| RequestError::OutpointNotFound(outpoint.to_short_string()))?;
        let height = chain
            .block_height(&block_hash)
            .ok_or_else(|| RequestError::OutpointNotFound(outpoint.to_short_string()))?;

        let output = produced
            .outputs
            .get(outpoint.vout as usize)
            .ok_or_else(|| RequestError::OutpointOutOfRange(outpoint.to_short_string()))?;

        Ok((output.value, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TxInput;

    fn request_with_inputs(count: usize) -> LockRequest {
        let inputs = (0..count)
            .map(|i| TxInput {
                previous_output: OutPoint::new([i as u8; 32], 0),
                script_sig: vec![],
                sequence: u32::MAX,
            })
            .collect();
        LockRequest::new(Transaction {
            version: 1,
            inputs,
            outputs: vec![],
            lock_time: 0,
            timestamp: 0,
        })
    }

    #[test]
    fn test_min_fee_scales_with_inputs() {
        assert_eq!(request_with_inputs(0).min_fee(), lock::MIN_FEE);
        assert_eq!(request_with_inputs(1).min_fee(), lock::MIN_FEE);
        assert_eq!(request_with_inputs(4).min_fee(), 4 * lock::MIN_FEE);
    }

    #[test]
    fn test_max_signatures() {
        assert_eq!(
            request_with_inputs(3).max_signatures(),
            3 * lock::SIGNATURES_TOTAL
        );
    }

    #[test]
    fn test_timeout_uses_receive_time() {
        let mut request = request_with_inputs(1);
        assert!(!request.is_timed_out());
        request.received_at -= lock::TIMEOUT_SECONDS + 1;
        assert!(request.is_timed_out());
    }
}
