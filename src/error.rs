//! Error types for the ledger engine

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("No existing blockchain found at {path:?}. Create one first.")]
    LedgerNotFound { path: PathBuf },

    #[error("Blockchain already exists at {path:?}")]
    LedgerExists { path: PathBuf },

    #[error("Bucket {0:?} is missing from the store")]
    MissingBucket(&'static str),

    #[error("Tip key is missing from an initialized ledger")]
    MissingTip,

    #[error("Corrupt chain: block {hash} is referenced but not stored")]
    CorruptChain { hash: String },

    #[error("Transaction {id} is not found")]
    TransactionNotFound { id: String },

    #[error("Invalid transaction {id}: {reason}")]
    InvalidTransaction { id: String, reason: String },

    #[error("Invalid proof of work for block {0}")]
    InvalidProofOfWork(String),

    #[error("Not enough funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: u64, available: u64 },

    #[error("Value overflow while summing {0}")]
    ValueOverflow(String),

    #[error("Tip moved from {expected} to {found} while the block was being built")]
    TipMoved { expected: String, found: String },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LedgerError {
    /// Whether the condition means the persisted ledger or its store is
    /// unusable for the current operation, as opposed to an expected
    /// negative result or a denied precondition.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LedgerError::Storage(_)
                | LedgerError::Serialization(_)
                | LedgerError::MissingBucket(_)
                | LedgerError::MissingTip
                | LedgerError::CorruptChain { .. }
                | LedgerError::InvalidTransaction { .. }
                | LedgerError::InvalidProofOfWork(_)
                | LedgerError::ValueOverflow(_)
                | LedgerError::TipMoved { .. }
        )
    }
}

impl From<redb::DatabaseError> for LedgerError {
    fn from(e: redb::DatabaseError) -> Self {
        LedgerError::Storage(e.to_string())
    }
}

impl From<redb::TransactionError> for LedgerError {
    fn from(e: redb::TransactionError) -> Self {
        LedgerError::Storage(e.to_string())
    }
}

impl From<redb::TableError> for LedgerError {
    fn from(e: redb::TableError) -> Self {
        LedgerError::Storage(e.to_string())
    }
}

impl From<redb::StorageError> for LedgerError {
    fn from(e: redb::StorageError) -> Self {
        LedgerError::Storage(e.to_string())
    }
}

impl From<redb::CommitError> for LedgerError {
    fn from(e: redb::CommitError) -> Self {
        LedgerError::Storage(e.to_string())
    }
}

impl From<bincode::Error> for LedgerError {
    fn from(e: bincode::Error) -> Self {
        LedgerError::Serialization(e.to_string())
    }
}

impl From<secp256k1::Error> for LedgerError {
    fn from(e: secp256k1::Error) -> Self {
        LedgerError::InvalidKey(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
