//! Core ledger types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hash type: 256-bit hash
pub type Hash = [u8; 32];

/// Byte string type
pub type ByteString = Vec<u8>;

/// Transaction Input: a reference to output `vout` of transaction `txid`
/// plus the material proving the spender owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub txid: Hash,
    pub vout: u32,
    pub signature: ByteString,
    pub pub_key: ByteString,
}

/// Transaction Output: a value locked to a recipient's public-key hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    pub pub_key_hash: ByteString,
}

/// Transaction: identifier plus ordered inputs and outputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Hash,
    pub vin: Vec<TxInput>,
    pub vout: Vec<TxOutput>,
}

/// Block: a mined, immutable batch of transactions.
///
/// `prev_block_hash` is `None` only for the genesis block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub timestamp: i64,
    pub transactions: Vec<Transaction>,
    pub prev_block_hash: Option<Hash>,
    pub hash: Hash,
    pub nonce: u64,
    pub target_bits: u32,
}

/// An unspent output together with its index in the owning transaction.
///
/// Holds an owned copy of the output; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutIndexAndData {
    pub index: u32,
    pub output: TxOutput,
}

/// Previous transactions referenced by a transaction's inputs, keyed by id
pub type PrevTransactions = BTreeMap<Hash, Transaction>;

/// Result of accumulating spendable outputs toward an amount.
///
/// `accumulated` may be less than the requested amount; callers decide
/// whether that is an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpendableOutputs {
    pub accumulated: u64,
    pub outputs: BTreeMap<Hash, Vec<u32>>,
}
