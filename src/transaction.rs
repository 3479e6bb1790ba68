//! Transaction construction, signing and verification

use crate::address::{decode_address, hash_pub_key, public_key_bytes};
use crate::chain::Blockchain;
use crate::constants::*;
use crate::error::{LedgerError, Result};
use crate::types::*;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};
use tracing::debug;

impl TxOutput {
    /// Output of `value` locked to the public-key hash behind `address`
    pub fn new(value: u64, address: &str) -> Result<Self> {
        Ok(TxOutput {
            value,
            pub_key_hash: decode_address(address)?,
        })
    }

    pub fn is_locked_with_key(&self, pub_key_hash: &[u8]) -> bool {
        self.pub_key_hash == pub_key_hash
    }
}

impl TxInput {
    /// Whether this input's public key hashes to `pub_key_hash`
    pub fn uses_key(&self, pub_key_hash: &[u8]) -> bool {
        hash_pub_key(&self.pub_key).as_slice() == pub_key_hash
    }
}

impl Transaction {
    /// Build a transaction and derive its id from the inputs and outputs
    pub fn new(vin: Vec<TxInput>, vout: Vec<TxOutput>) -> Result<Self> {
        let mut tx = Transaction { id: [0u8; 32], vin, vout };
        tx.id = tx.hash()?;
        Ok(tx)
    }

    /// SHA256 over the serialized inputs and outputs.
    ///
    /// Signatures and the id field are not covered, so signing leaves the
    /// id valid; input public keys are.
    pub fn hash(&self) -> Result<Hash> {
        let inputs: Vec<(&Hash, u32, &ByteString)> = self
            .vin
            .iter()
            .map(|input| (&input.txid, input.vout, &input.pub_key))
            .collect();
        let data = bincode::serialize(&(&inputs, &self.vout))?;
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&Sha256::digest(&data));
        Ok(hash)
    }

    /// A coinbase has no inputs, or exactly one input carrying the zero
    /// txid and the sentinel output index.
    pub fn is_coinbase(&self) -> bool {
        self.vin.is_empty()
            || (self.vin.len() == 1
                && self.vin[0].txid == [0u8; 32]
                && self.vin[0].vout == COINBASE_VOUT)
    }

    /// Copy with every signature and public key cleared
    pub fn trimmed_copy(&self) -> Transaction {
        let vin = self
            .vin
            .iter()
            .map(|input| TxInput {
                txid: input.txid,
                vout: input.vout,
                signature: Vec::new(),
                pub_key: Vec::new(),
            })
            .collect();

        Transaction {
            id: self.id,
            vin,
            vout: self.vout.clone(),
        }
    }

    /// Sum of output values; a sum past `u64::MAX` makes the transaction invalid
    pub fn total_output_value(&self) -> Result<u64> {
        self.vout
            .iter()
            .try_fold(0u64, |total, output| total.checked_add(output.value))
            .ok_or_else(|| LedgerError::InvalidTransaction {
                id: hex::encode(self.id),
                reason: "output value overflow".to_string(),
            })
    }

    /// Sign every input with `secret_key`.
    ///
    /// Each input signs the trimmed copy with its own public-key slot set
    /// to the hash locking the output it consumes, so `prev_txs` must hold
    /// every transaction the inputs reference.
    pub fn sign(&mut self, secret_key: &SecretKey, prev_txs: &PrevTransactions) -> Result<()> {
        if self.is_coinbase() {
            return Ok(());
        }

        let secp = Secp256k1::signing_only();
        let pub_key = public_key_bytes(secret_key);
        let mut trimmed = self.trimmed_copy();

        for index in 0..self.vin.len() {
            let referenced = referenced_output(&self.vin[index], prev_txs)?.ok_or_else(|| {
                LedgerError::InvalidTransaction {
                    id: hex::encode(self.id),
                    reason: format!("input {} references a missing output", index),
                }
            })?;

            let message = signature_message(&mut trimmed, index, &referenced.pub_key_hash)?;
            let signature = secp.sign_ecdsa(&message, secret_key);

            self.vin[index].signature = signature.serialize_compact().to_vec();
            self.vin[index].pub_key = pub_key.clone();
        }

        Ok(())
    }

    /// Verify every input's signature against the outputs it consumes.
    ///
    /// A previous transaction missing from `prev_txs` is an error, not a
    /// failed verification.
    pub fn verify(&self, prev_txs: &PrevTransactions) -> Result<bool> {
        if self.is_coinbase() {
            return Ok(true);
        }

        let secp = Secp256k1::verification_only();
        let mut trimmed = self.trimmed_copy();

        for (index, input) in self.vin.iter().enumerate() {
            let referenced = match referenced_output(input, prev_txs)? {
                Some(output) => output,
                None => {
                    debug!(tx = %hex::encode(self.id), index, "input references a missing output");
                    return Ok(false);
                }
            };

            if !input.uses_key(&referenced.pub_key_hash) {
                debug!(tx = %hex::encode(self.id), index, "input key does not own the output");
                return Ok(false);
            }

            let pub_key = match PublicKey::from_slice(&input.pub_key) {
                Ok(pk) => pk,
                Err(_) => return Ok(false),
            };
            let signature = match Signature::from_compact(&input.signature) {
                Ok(sig) => sig,
                Err(_) => return Ok(false),
            };

            let message = signature_message(&mut trimmed, index, &referenced.pub_key_hash)?;
            if secp.verify_ecdsa(&message, &signature, &pub_key).is_err() {
                debug!(tx = %hex::encode(self.id), index, "signature does not verify");
                return Ok(false);
            }
        }

        Ok(true)
    }
}

/// The output an input consumes, or `None` when the index is out of range
fn referenced_output<'a>(
    input: &TxInput,
    prev_txs: &'a PrevTransactions,
) -> Result<Option<&'a TxOutput>> {
    let prev = prev_txs
        .get(&input.txid)
        .ok_or_else(|| LedgerError::TransactionNotFound { id: hex::encode(input.txid) })?;
    Ok(prev.vout.get(input.vout as usize))
}

/// Digest signed by input `index`; leaves `trimmed` as it found it
fn signature_message(trimmed: &mut Transaction, index: usize, pub_key_hash: &[u8]) -> Result<Message> {
    trimmed.vin[index].pub_key = pub_key_hash.to_vec();
    let digest = trimmed.hash();
    trimmed.vin[index].pub_key = Vec::new();
    Ok(Message::from_digest_slice(&digest?)?)
}

/// NewCoinbaseTX: mint `subsidy` to `to`.
///
/// The single input carries `data` in its public-key slot. Empty data
/// defaults to "Reward to '<to>'".
pub fn new_coinbase_transaction(to: &str, data: &[u8], subsidy: u64) -> Result<Transaction> {
    let data = if data.is_empty() {
        format!("Reward to '{}'", to).into_bytes()
    } else {
        data.to_vec()
    };

    let input = TxInput {
        txid: [0u8; 32],
        vout: COINBASE_VOUT,
        signature: Vec::new(),
        pub_key: data,
    };
    let output = TxOutput::new(subsidy, to)?;

    Transaction::new(vec![input], vec![output])
}

/// NewUTXOTransaction: transfer `amount` from the owner of `secret_key` to `to`.
///
/// Spends enough of the sender's unspent outputs to cover `amount`,
/// returns any excess as change, and signs against the chain's history.
pub fn new_utxo_transaction(
    chain: &Blockchain,
    secret_key: &SecretKey,
    to: &str,
    amount: u64,
) -> Result<Transaction> {
    if amount == 0 {
        return Err(LedgerError::InvalidTransaction {
            id: String::new(),
            reason: "transfer amount must be positive".to_string(),
        });
    }

    let pub_key = public_key_bytes(secret_key);
    let from_pkh = hash_pub_key(&pub_key);
    let to_pkh = decode_address(to)?;

    let spendable = chain.find_spendable_outputs_by_key(&from_pkh, amount)?;
    if spendable.accumulated < amount {
        return Err(LedgerError::InsufficientFunds {
            requested: amount,
            available: spendable.accumulated,
        });
    }

    let mut inputs = Vec::new();
    for (txid, indices) in &spendable.outputs {
        for &vout in indices {
            inputs.push(TxInput {
                txid: *txid,
                vout,
                signature: Vec::new(),
                pub_key: pub_key.clone(),
            });
        }
    }

    let mut outputs = vec![TxOutput { value: amount, pub_key_hash: to_pkh }];
    if spendable.accumulated > amount {
        outputs.push(TxOutput {
            value: spendable.accumulated - amount,
            pub_key_hash: from_pkh.to_vec(),
        });
    }

    let mut tx = Transaction::new(inputs, outputs)?;
    chain.sign_transaction(&mut tx, secret_key)?;
    Ok(tx)
}
