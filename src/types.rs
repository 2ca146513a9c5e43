//! Core data types shared by the lock engine and its host interfaces.

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub type Hash256 = [u8; 32];

/// Collateral outpoint naming one masternode. The registry keys members by
/// the outpoint their collateral sits in, so identity and outpoint share a type.
pub type MasternodeId = OutPoint;

/// Peer address ("ip:port") as the host's connection layer reports it.
pub type PeerId = String;

// Script opcodes the request validator cares about
const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;
const OP_RETURN: u8 = 0x6a;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutPoint {
    pub txid: Hash256,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: Hash256, vout: u32) -> Self {
        Self { txid, vout }
    }

    /// Null outpoint, only ever spent by a coinbase input.
    pub fn null() -> Self {
        Self {
            txid: [0u8; 32],
            vout: u32::MAX,
        }
    }

    pub fn is_null(&self) -> bool {
        self.txid == [0u8; 32] && self.vout == u32::MAX
    }

    /// Compact display form, also part of the vote signing payload.
    pub fn to_short_string(&self) -> String {
        format!("{}-{}", hex::encode(self.txid), self.vout)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TxInput {
    pub previous_output: OutPoint,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    pub script_pubkey: Vec<u8>,
}

impl TxOutput {
    /// Pay-to-pubkey-hash: OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG.
    pub fn is_normal_payment_script(&self) -> bool {
        let s = &self.script_pubkey;
        s.len() == 25
            && s[0] == OP_DUP
            && s[1] == OP_HASH160
            && s[2] == 0x14
            && s[23] == OP_EQUALVERIFY
            && s[24] == OP_CHECKSIG
    }

    /// Data-carrier outputs start with OP_RETURN and can never be spent.
    pub fn is_unspendable(&self) -> bool {
        self.script_pubkey.first() == Some(&OP_RETURN)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
    pub timestamp: i64,
}

impl Transaction {
    pub fn txid(&self) -> Hash256 {
        // Use JSON serialization for canonical, network-compatible hashing
        let json = serde_json::to_string(self).expect("JSON serialization should succeed");
        Sha256::digest(json.as_bytes()).into()
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }

    pub fn value_out(&self) -> u64 {
        self.outputs.iter().map(|o| o.value).sum()
    }
}

/// Minimal header view of the chain tip; height drives candidate expiry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: i64,
    pub hash: Hash256,
    pub timestamp: i64,
}

/// Registry entry for one masternode, as returned by the host's registry view.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MasternodeEntry {
    pub id: MasternodeId,
    pub public_key: VerifyingKey,
    pub protocol_version: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p2pkh_script() -> Vec<u8> {
        let mut s = vec![OP_DUP, OP_HASH160, 0x14];
        s.extend_from_slice(&[0u8; 20]);
        s.push(OP_EQUALVERIFY);
        s.push(OP_CHECKSIG);
        s
    }

    #[test]
    fn test_script_classification() {
        let payment = TxOutput {
            value: 1,
            script_pubkey: p2pkh_script(),
        };
        assert!(payment.is_normal_payment_script());
        assert!(!payment.is_unspendable());

        let data = TxOutput {
            value: 0,
            script_pubkey: vec![OP_RETURN, 0x04, 0xde, 0xad, 0xbe, 0xef],
        };
        assert!(data.is_unspendable());
        assert!(!data.is_normal_payment_script());

        let garbage = TxOutput {
            value: 1,
            script_pubkey: vec![0x51],
        };
        assert!(!garbage.is_normal_payment_script());
        assert!(!garbage.is_unspendable());
    }

    #[test]
    fn test_coinbase_detection() {
        let coinbase = Transaction {
            version: 1,
            inputs: vec![TxInput {
                previous_output: OutPoint::null(),
                script_sig: vec![],
                sequence: u32::MAX,
            }],
            outputs: vec![],
            lock_time: 0,
            timestamp: 0,
        };
        assert!(coinbase.is_coinbase());

        let normal = Transaction {
            version: 1,
            inputs: vec![TxInput {
                previous_output: OutPoint::new([7u8; 32], 0),
                script_sig: vec![],
                sequence: u32::MAX,
            }],
            outputs: vec![],
            lock_time: 0,
            timestamp: 0,
        };
        assert!(!normal.is_coinbase());
    }

    #[test]
    fn test_txid_is_stable() {
        let tx = Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![TxOutput {
                value: 42,
                script_pubkey: p2pkh_script(),
            }],
            lock_time: 0,
            timestamp: 1_700_000_000,
        };
        assert_eq!(tx.txid(), tx.txid());
        let mut other = tx.clone();
        other.timestamp += 1;
        assert_ne!(tx.txid(), other.txid());
    }
}
