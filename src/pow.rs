//! Proof of work

use crate::block::{hash_transactions, sha256_hash};
use crate::constants::*;
use crate::error::{LedgerError, Result};
use crate::types::*;
use tracing::debug;

/// Target: 2^(256 - target_bits), as a big-endian 256-bit integer.
///
/// A block hash is valid when, read big-endian, it is strictly below the target.
pub fn target(target_bits: u32) -> Result<Hash> {
    if target_bits == 0 || target_bits > MAX_TARGET_BITS {
        return Err(LedgerError::Config(format!(
            "target_bits must be in 1..={}, got {}",
            MAX_TARGET_BITS, target_bits
        )));
    }

    let shift = (256 - target_bits) as usize;
    let mut target = [0u8; 32];
    target[31 - shift / 8] = 1 << (shift % 8);
    Ok(target)
}

/// Header bytes hashed for a given nonce:
/// prev ‖ merkle_root ‖ timestamp ‖ target_bits ‖ nonce (integers big-endian)
fn prepare_data(block: &Block, merkle_root: &Hash, nonce: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(32 + 32 + 8 + 4 + 8);
    if let Some(prev) = &block.prev_block_hash {
        data.extend_from_slice(prev);
    }
    data.extend_from_slice(merkle_root);
    data.extend_from_slice(&block.timestamp.to_be_bytes());
    data.extend_from_slice(&block.target_bits.to_be_bytes());
    data.extend_from_slice(&nonce.to_be_bytes());
    data
}

/// Search nonces from zero until the header hash falls below the target.
///
/// Returns the winning nonce and hash.
pub fn run(block: &Block) -> Result<(u64, Hash)> {
    let target = target(block.target_bits)?;
    let merkle_root = hash_transactions(&block.transactions)?;

    for nonce in 0..u64::MAX {
        let hash = sha256_hash(&prepare_data(block, &merkle_root, nonce));
        if hash < target {
            debug!(nonce, hash = %hex::encode(hash), "proof of work found");
            return Ok((nonce, hash));
        }
    }

    Err(LedgerError::InvalidProofOfWork("nonce space exhausted".to_string()))
}

/// Whether the block's stored nonce and hash satisfy its own target
pub fn validate(block: &Block) -> Result<bool> {
    let target = target(block.target_bits)?;
    let merkle_root = hash_transactions(&block.transactions)?;
    let hash = sha256_hash(&prepare_data(block, &merkle_root, block.nonce));
    Ok(hash == block.hash && hash < target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_one_bit() {
        let t = target(1).unwrap();
        assert_eq!(t[0], 0x80);
        assert!(t[1..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_target_sixteen_bits() {
        let t = target(16).unwrap();
        assert_eq!(t[0], 0);
        assert_eq!(t[1], 1);
        assert!(t[2..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_target_bounds() {
        assert!(target(0).is_err());
        assert!(target(MAX_TARGET_BITS).is_ok());
        assert!(target(MAX_TARGET_BITS + 1).is_err());
    }

    #[test]
    fn test_harder_target_is_smaller() {
        assert!(target(12).unwrap() < target(8).unwrap());
    }
}
