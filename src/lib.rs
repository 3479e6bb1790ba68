//! # utxo-ledger
//!
//! A minimal UTXO ledger: an append-only chain of proof-of-work blocks
//! holding value-transfer transactions, persisted in a transactional
//! key-value store.
//!
//! ## Architecture
//!
//! Leaf first:
//! - [`store`]: byte-keyed buckets under scoped read and read-write transactions
//! - [`types`], [`transaction`], [`block`], [`pow`], [`address`]: the records and their hashing, signing and encoding
//! - [`iter`]: backward traversal from the tip to genesis
//! - [`utxo`]: unspent-output resolution by full chain replay
//! - [`chain`]: the [`Blockchain`] controller tying them together
//!
//! ## Design Principles
//!
//! 1. **Replay, not index**: every balance or spend query re-scans the persisted chain
//! 2. **One writer**: a block and the new tip are written in one store transaction
//! 3. **Errors, not aborts**: every failure is a [`LedgerError`]; only the binary exits
//!
//! ## Usage
//!
//! ```rust
//! use utxo_ledger::{address_from_secret_key, Blockchain, LedgerConfig, Store};
//! use utxo_ledger::transaction::new_utxo_transaction;
//! use secp256k1::SecretKey;
//!
//! # fn main() -> utxo_ledger::Result<()> {
//! let alice = SecretKey::from_slice(&[1u8; 32])?;
//! let bob = SecretKey::from_slice(&[2u8; 32])?;
//! let alice_addr = address_from_secret_key(&alice);
//! let bob_addr = address_from_secret_key(&bob);
//!
//! let config = LedgerConfig::default().with_target_bits(8);
//! let mut chain = Blockchain::create_in(Store::in_memory()?, &alice_addr, config)?;
//!
//! let tx = new_utxo_transaction(&chain, &alice, &bob_addr, 4)?;
//! chain.mine_block(vec![tx])?;
//!
//! assert_eq!(chain.get_balance(&alice_addr)?, 6);
//! assert_eq!(chain.get_balance(&bob_addr)?, 4);
//! # Ok(())
//! # }
//! ```

pub mod types;
pub mod constants;
pub mod error;
pub mod address;
pub mod transaction;
pub mod pow;
pub mod block;
pub mod store;
pub mod iter;
pub mod utxo;
pub mod config;
pub mod chain;

// Re-export commonly used types
pub use types::*;
pub use constants::*;
pub use error::{LedgerError, Result};
pub use address::{address_from_secret_key, decode_address, encode_address, hash_pub_key};
pub use chain::Blockchain;
pub use config::{LedgerConfig, OnExisting};
pub use iter::ChainIterator;
pub use store::Store;
pub use utxo::UnspentOutputs;
