//! UTXO resolution by full chain replay.
//!
//! Unspent outputs are never indexed. Every query folds over the whole
//! chain newest to oldest, so a spend is always seen before the output it
//! consumes: an input can only reference an output created at or before
//! its own block. Within a block, transactions are visited last to first
//! for the same reason.
//!
//! Each call costs one full scan of the chain.

use crate::error::{LedgerError, Result};
use crate::types::*;
use std::collections::{BTreeMap, BTreeSet};

/// Output indices referenced by some input, per source transaction id
pub type SpentOutputs = BTreeMap<Hash, BTreeSet<u32>>;

/// Unspent outputs per transaction id, as produced by a chain scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnspentOutputs {
    by_transaction: BTreeMap<Hash, Vec<OutIndexAndData>>,
}

impl UnspentOutputs {
    pub fn by_transaction(&self) -> &BTreeMap<Hash, Vec<OutIndexAndData>> {
        &self.by_transaction
    }

    pub fn is_empty(&self) -> bool {
        self.by_transaction.is_empty()
    }

    /// Flat list of outputs without index or transaction metadata
    pub fn outputs(&self) -> Vec<TxOutput> {
        self.by_transaction
            .values()
            .flatten()
            .map(|entry| entry.output.clone())
            .collect()
    }

    pub fn balance(&self) -> Result<u64> {
        self.by_transaction
            .values()
            .flatten()
            .try_fold(0u64, |total, entry| total.checked_add(entry.output.value))
            .ok_or_else(|| LedgerError::ValueOverflow("unspent balance".to_string()))
    }

    /// Greedily collect outputs until their sum reaches `amount`.
    ///
    /// Never fails: when the outputs do not cover `amount`, everything is
    /// returned and `accumulated` stays below it.
    pub fn accumulate(&self, amount: u64) -> Result<SpendableOutputs> {
        let mut selected = SpendableOutputs::default();

        'work: for (txid, entries) in &self.by_transaction {
            for entry in entries {
                if selected.accumulated >= amount {
                    break 'work;
                }
                selected.accumulated = selected
                    .accumulated
                    .checked_add(entry.output.value)
                    .ok_or_else(|| LedgerError::ValueOverflow("spendable outputs".to_string()))?;
                selected.outputs.entry(*txid).or_default().push(entry.index);
            }
        }

        Ok(selected)
    }
}

/// Record every output consumed by a non-coinbase transaction in `tx`
fn mark_spent(spent: &mut SpentOutputs, tx: &Transaction) {
    if tx.is_coinbase() {
        return;
    }
    for input in &tx.vin {
        spent.entry(input.txid).or_default().insert(input.vout);
    }
}

/// Fold the chain into the spent map and the unspent outputs accepted by `owned`
fn scan<I, F>(blocks: I, owned: F) -> Result<(SpentOutputs, UnspentOutputs)>
where
    I: IntoIterator<Item = Result<Block>>,
    F: Fn(&TxOutput) -> bool,
{
    blocks.into_iter().try_fold(
        (SpentOutputs::new(), UnspentOutputs::default()),
        |(mut spent, mut unspent), block| {
            let block = block?;

            for tx in block.transactions.iter().rev() {
                let spent_here = spent.get(&tx.id);

                for (index, output) in tx.vout.iter().enumerate() {
                    let index = index as u32;
                    if !owned(output) {
                        continue;
                    }
                    if spent_here.map_or(false, |indices| indices.contains(&index)) {
                        continue;
                    }
                    unspent
                        .by_transaction
                        .entry(tx.id)
                        .or_default()
                        .push(OutIndexAndData { index, output: output.clone() });
                }

                mark_spent(&mut spent, tx);
            }

            Ok((spent, unspent))
        },
    )
}

/// FindUTXOInTransactions: unspent outputs locked to `pub_key_hash`
pub fn find_unspent<I>(blocks: I, pub_key_hash: &[u8]) -> Result<UnspentOutputs>
where
    I: IntoIterator<Item = Result<Block>>,
{
    let (_, unspent) = scan(blocks, |output| output.is_locked_with_key(pub_key_hash))?;
    Ok(unspent)
}

/// Unspent outputs of every owner
pub fn find_all_unspent<I>(blocks: I) -> Result<UnspentOutputs>
where
    I: IntoIterator<Item = Result<Block>>,
{
    let (_, unspent) = scan(blocks, |_| true)?;
    Ok(unspent)
}

/// Spent outputs and transaction ids of a chain, gathered in one scan
#[derive(Debug, Clone, Default)]
pub struct History {
    pub spent: SpentOutputs,
    pub ids: BTreeSet<Hash>,
}

pub fn find_history<I>(blocks: I) -> Result<History>
where
    I: IntoIterator<Item = Result<Block>>,
{
    blocks.into_iter().try_fold(History::default(), |mut history, block| {
        for tx in &block?.transactions {
            mark_spent(&mut history.spent, tx);
            history.ids.insert(tx.id);
        }
        Ok(history)
    })
}

/// Every output referenced by an input anywhere in the chain
pub fn find_spent<I>(blocks: I) -> Result<SpentOutputs>
where
    I: IntoIterator<Item = Result<Block>>,
{
    Ok(find_history(blocks)?.spent)
}
