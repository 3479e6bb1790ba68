//! Public-key hashing and base-58-check addresses

use crate::constants::*;
use crate::error::{LedgerError, Result};
use bitcoin_hashes::{sha256d, Hash as BitcoinHash};
use ripemd::Ripemd160;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

/// HASH160: RIPEMD160(SHA256(pub_key))
pub fn hash_pub_key(pub_key: &[u8]) -> [u8; PUB_KEY_HASH_LEN] {
    let sha256_hash = Sha256::digest(pub_key);
    let ripemd160_hash = Ripemd160::digest(&sha256_hash);
    let mut out = [0u8; PUB_KEY_HASH_LEN];
    out.copy_from_slice(&ripemd160_hash);
    out
}

/// First `ADDRESS_CHECKSUM_LEN` bytes of SHA256d(payload)
fn checksum(payload: &[u8]) -> [u8; ADDRESS_CHECKSUM_LEN] {
    let digest = sha256d::Hash::hash(payload).into_inner();
    let mut out = [0u8; ADDRESS_CHECKSUM_LEN];
    out.copy_from_slice(&digest[..ADDRESS_CHECKSUM_LEN]);
    out
}

/// Encode a public-key hash as base58(version ‖ pkh ‖ checksum)
pub fn encode_address(pub_key_hash: &[u8]) -> String {
    let mut payload = Vec::with_capacity(1 + pub_key_hash.len() + ADDRESS_CHECKSUM_LEN);
    payload.push(ADDRESS_VERSION);
    payload.extend_from_slice(pub_key_hash);
    let check = checksum(&payload);
    payload.extend_from_slice(&check);
    bs58::encode(payload).into_string()
}

/// Decode an address to its public-key hash, stripping the version byte
/// and checksum suffix.
pub fn decode_address(address: &str) -> Result<Vec<u8>> {
    let bytes = bs58::decode(address)
        .into_vec()
        .map_err(|e| LedgerError::InvalidAddress(format!("{}: {}", address, e)))?;

    if bytes.len() != 1 + PUB_KEY_HASH_LEN + ADDRESS_CHECKSUM_LEN {
        return Err(LedgerError::InvalidAddress(format!(
            "{}: decoded length {}",
            address,
            bytes.len()
        )));
    }

    let (payload, check) = bytes.split_at(bytes.len() - ADDRESS_CHECKSUM_LEN);
    if checksum(payload).as_slice() != check {
        return Err(LedgerError::InvalidAddress(format!("{}: checksum mismatch", address)));
    }
    if payload[0] != ADDRESS_VERSION {
        return Err(LedgerError::InvalidAddress(format!(
            "{}: unknown version byte {:#04x}",
            address, payload[0]
        )));
    }

    Ok(payload[1..].to_vec())
}

pub fn validate_address(address: &str) -> bool {
    decode_address(address).is_ok()
}

/// Compressed SEC1 public key for a secret key
pub fn public_key_bytes(secret_key: &SecretKey) -> Vec<u8> {
    let secp = Secp256k1::signing_only();
    PublicKey::from_secret_key(&secp, secret_key).serialize().to_vec()
}

/// Address owned by a secret key
pub fn address_from_secret_key(secret_key: &SecretKey) -> String {
    encode_address(&hash_pub_key(&public_key_bytes(secret_key)))
}
