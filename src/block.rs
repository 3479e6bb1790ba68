//! Block construction and encoding

use crate::error::{LedgerError, Result};
use crate::pow;
use crate::types::*;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

impl Block {
    /// Genesis is the unique block without a previous hash
    pub fn is_genesis(&self) -> bool {
        self.prev_block_hash.is_none()
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// NewBlock: build a block on top of `prev_block_hash` and run proof of work
pub fn new_block(
    transactions: Vec<Transaction>,
    prev_block_hash: Option<Hash>,
    target_bits: u32,
) -> Result<Block> {
    let mut block = Block {
        timestamp: current_timestamp(),
        transactions,
        prev_block_hash,
        hash: [0u8; 32],
        nonce: 0,
        target_bits,
    };

    let (nonce, hash) = pow::run(&block)?;
    block.nonce = nonce;
    block.hash = hash;

    Ok(block)
}

/// NewGenesisBlock: the first block, holding only `coinbase`
pub fn new_genesis_block(coinbase: Transaction, target_bits: u32) -> Result<Block> {
    new_block(vec![coinbase], None, target_bits)
}

/// Merkle root over transaction ids.
///
/// Levels with an odd count pair the last hash with itself.
pub fn hash_transactions(transactions: &[Transaction]) -> Result<Hash> {
    if transactions.is_empty() {
        return Err(LedgerError::InvalidProofOfWork(
            "Cannot calculate merkle root for empty transaction list".to_string(),
        ));
    }

    let mut hashes: Vec<Hash> = transactions.iter().map(|tx| tx.id).collect();

    while hashes.len() > 1 {
        let mut next_level = Vec::with_capacity((hashes.len() + 1) / 2);

        for chunk in hashes.chunks(2) {
            let right = chunk.get(1).unwrap_or(&chunk[0]);
            let mut combined = Vec::with_capacity(64);
            combined.extend_from_slice(&chunk[0]);
            combined.extend_from_slice(right);
            next_level.push(sha256_hash(&combined));
        }

        hashes = next_level;
    }

    Ok(hashes[0])
}

pub(crate) fn sha256_hash(data: &[u8]) -> Hash {
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&Sha256::digest(data));
    hash
}

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::address_from_secret_key;
    use crate::transaction::new_coinbase_transaction;
    use secp256k1::SecretKey;

    const TEST_BITS: u32 = 8;

    fn coinbase(byte: u8, data: &[u8]) -> Transaction {
        let key = SecretKey::from_slice(&[byte; 32]).unwrap();
        new_coinbase_transaction(&address_from_secret_key(&key), data, 10).unwrap()
    }

    #[test]
    fn test_genesis_block() {
        let block = new_genesis_block(coinbase(1, b"genesis"), TEST_BITS).unwrap();
        assert!(block.is_genesis());
        assert_eq!(block.transactions.len(), 1);
        assert!(pow::validate(&block).unwrap());
    }

    #[test]
    fn test_block_links_previous() {
        let genesis = new_genesis_block(coinbase(1, b"genesis"), TEST_BITS).unwrap();
        let next = new_block(vec![coinbase(2, b"one")], Some(genesis.hash), TEST_BITS).unwrap();
        assert!(!next.is_genesis());
        assert_eq!(next.prev_block_hash, Some(genesis.hash));
        assert!(pow::validate(&next).unwrap());
    }

    #[test]
    fn test_tampered_block_fails_validation() {
        let mut block = new_genesis_block(coinbase(1, b"genesis"), TEST_BITS).unwrap();
        block.transactions[0].vout[0].value = 1_000;
        block.transactions[0].id = block.transactions[0].hash().unwrap();
        assert!(!pow::validate(&block).unwrap());
    }

    #[test]
    fn test_serialize_deserialize() {
        let block = new_genesis_block(coinbase(1, b"genesis"), TEST_BITS).unwrap();
        let bytes = block.serialize().unwrap();
        assert_eq!(Block::deserialize(&bytes).unwrap(), block);
    }

    #[test]
    fn test_deserialize_garbage() {
        assert!(matches!(Block::deserialize(&[1, 2, 3]), Err(LedgerError::Serialization(_))));
    }

    #[test]
    fn test_merkle_root_single() {
        let tx = coinbase(1, b"a");
        assert_eq!(hash_transactions(&[tx.clone()]).unwrap(), tx.id);
    }

    #[test]
    fn test_merkle_root_odd_duplicates_last() {
        let a = coinbase(1, b"a");
        let b = coinbase(1, b"b");
        let c = coinbase(1, b"c");

        let three = hash_transactions(&[a.clone(), b.clone(), c.clone()]).unwrap();
        let four = hash_transactions(&[a, b, c.clone(), c]).unwrap();
        assert_eq!(three, four);
    }

    #[test]
    fn test_merkle_root_order_sensitive() {
        let a = coinbase(1, b"a");
        let b = coinbase(1, b"b");
        assert_ne!(
            hash_transactions(&[a.clone(), b.clone()]).unwrap(),
            hash_transactions(&[b, a]).unwrap()
        );
    }

    #[test]
    fn test_merkle_root_empty() {
        assert!(hash_transactions(&[]).is_err());
    }

    #[test]
    fn test_sha256_hash_deterministic() {
        assert_eq!(sha256_hash(b"ledger"), sha256_hash(b"ledger"));
        assert_ne!(sha256_hash(b"ledger"), sha256_hash(b"ledgers"));
    }
}
