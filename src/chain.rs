//! Ledger controller.
//!
//! `Blockchain` owns the store handle and the current tip. Every query
//! re-reads the persisted chain through a [`ChainIterator`]; the only state
//! kept in memory is the tip hash, which is updated after the write
//! transaction that advances the persisted tip has committed.

use crate::address::decode_address;
use crate::block::{new_block, new_genesis_block};
use crate::config::{LedgerConfig, OnExisting};
use crate::constants::*;
use crate::error::{LedgerError, Result};
use crate::iter::ChainIterator;
use crate::store::Store;
use crate::transaction::new_coinbase_transaction;
use crate::types::*;
use crate::utxo::{self, UnspentOutputs};
use secp256k1::SecretKey;
use std::path::PathBuf;
use tracing::{info, warn};

pub struct Blockchain {
    tip: Hash,
    store: Store,
    config: LedgerConfig,
}

impl Blockchain {
    /// NewBlockchain: open the ledger at `config.db_path`.
    ///
    /// The store must exist and hold a tip.
    pub fn open(config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        let store = Store::open(&config.db_path)?;
        Self::from_store(store, config)
    }

    /// Adopt an already initialized store
    pub fn from_store(store: Store, config: LedgerConfig) -> Result<Self> {
        let tip = read_tip(&store)?.ok_or(LedgerError::MissingTip)?;
        info!(tip = %hex::encode(tip), "loaded ledger");
        Ok(Blockchain { tip, store, config })
    }

    /// CreateBlockchain: create the ledger at `config.db_path` with a
    /// genesis block paying the subsidy to `address`.
    ///
    /// An existing store is refused or reused according to
    /// `config.on_existing`.
    pub fn create(address: &str, config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        decode_address(address)?;

        if Store::exists(&config.db_path) && config.on_existing == OnExisting::Fail {
            return Err(LedgerError::LedgerExists { path: config.db_path.clone() });
        }

        let store = Store::create(&config.db_path)?;
        Self::create_in(store, address, config)
    }

    /// Initialize `store` as a ledger, applying `config.on_existing` when
    /// it already holds one.
    pub fn create_in(store: Store, address: &str, config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        decode_address(address)?;

        let (has_bucket, entries) = store.view(|r| {
            let has_bucket = r.has_bucket(BLOCKS_BUCKET)?;
            let entries = if has_bucket { r.len(BLOCKS_BUCKET)? } else { 0 };
            Ok((has_bucket, entries))
        })?;

        if has_bucket && entries > 0 {
            if config.on_existing == OnExisting::Fail {
                let path = store
                    .path()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("<memory>"));
                return Err(LedgerError::LedgerExists { path });
            }
            info!("blocks bucket present, reusing existing ledger");
            return Self::from_store(store, config);
        }

        let coinbase = new_coinbase_transaction(
            address,
            GENESIS_COINBASE_DATA.as_bytes(),
            config.subsidy,
        )?;
        let genesis = new_genesis_block(coinbase, config.target_bits)?;
        let encoded = genesis.serialize()?;

        store.update(|w| {
            w.create_bucket_if_absent(BLOCKS_BUCKET)?;
            w.put(BLOCKS_BUCKET, &genesis.hash, &encoded)?;
            w.put(BLOCKS_BUCKET, TIP_KEY, &genesis.hash)
        })?;

        info!(hash = %hex::encode(genesis.hash), address, "created ledger with genesis block");
        Ok(Blockchain { tip: genesis.hash, store, config })
    }

    pub fn tip(&self) -> Hash {
        self.tip
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Release the store handle
    pub fn into_store(self) -> Store {
        self.store
    }

    /// Tip as currently persisted, which may be ahead of `tip()` if another
    /// handle appended to the same store.
    pub fn persisted_tip(&self) -> Result<Hash> {
        read_tip(&self.store)?.ok_or(LedgerError::MissingTip)
    }

    /// Chain traversal from the current tip
    pub fn iter(&self) -> ChainIterator<'_> {
        ChainIterator::new(self.tip, &self.store)
    }

    /// Number of blocks, genesis included
    pub fn height(&self) -> Result<u64> {
        height_from(ChainIterator::new(self.tip, &self.store))
    }

    /// Every block, newest first
    pub fn blocks(&self) -> Result<Vec<Block>> {
        self.iter().collect()
    }

    /// MineBlock: verify `transactions`, build a block on the persisted tip
    /// and append it.
    ///
    /// Any invalid transaction aborts the append; nothing is written and
    /// the tip is unchanged.
    pub fn mine_block(&mut self, transactions: Vec<Transaction>) -> Result<Block> {
        if transactions.is_empty() {
            return Err(LedgerError::InvalidTransaction {
                id: String::new(),
                reason: "block has no transactions".to_string(),
            });
        }

        let prev = self.persisted_tip()?;
        self.validate_candidates(prev, &transactions)?;

        let block = new_block(transactions, Some(prev), self.config.target_bits)?;
        let encoded = block.serialize()?;

        self.store.update(|w| {
            let current = w.get(BLOCKS_BUCKET, TIP_KEY)?;
            if current.as_deref() != Some(&prev[..]) {
                return Err(LedgerError::TipMoved {
                    expected: hex::encode(prev),
                    found: current.map(hex::encode).unwrap_or_default(),
                });
            }
            w.put(BLOCKS_BUCKET, &block.hash, &encoded)?;
            w.put(BLOCKS_BUCKET, TIP_KEY, &block.hash)
        })?;
        self.tip = block.hash;

        info!(
            hash = %hex::encode(block.hash),
            transactions = block.transactions.len(),
            nonce = block.nonce,
            "appended block"
        );
        Ok(block)
    }

    /// Mine `transactions` behind a coinbase paying the subsidy to `miner`.
    ///
    /// The coinbase data carries the new block's height so that repeated
    /// rewards to the same address get distinct ids.
    pub fn mine_with_reward(&mut self, miner: &str, transactions: Vec<Transaction>) -> Result<Block> {
        let height = height_from(ChainIterator::new(self.persisted_tip()?, &self.store))?;
        let data = format!("Reward to '{}' at height {}", miner, height);
        let coinbase = new_coinbase_transaction(miner, data.as_bytes(), self.config.subsidy)?;

        let mut candidates = Vec::with_capacity(transactions.len() + 1);
        candidates.push(coinbase);
        candidates.extend(transactions);
        self.mine_block(candidates)
    }

    /// Reject the candidate set unless, against the chain ending at `prev`:
    /// every id is the hash of its transaction and appears nowhere else,
    /// every transaction is signed by the owners of the outputs it consumes,
    /// every consumed output exists and is consumed exactly once, no
    /// transaction creates value, and at most one coinbase mints at most
    /// the subsidy.
    fn validate_candidates(&self, prev: Hash, transactions: &[Transaction]) -> Result<()> {
        let utxo::History { mut spent, mut ids } =
            utxo::find_history(ChainIterator::new(prev, &self.store))?;
        let mut coinbase_seen = false;

        for tx in transactions {
            if tx.id != tx.hash()? {
                return Err(rejected(tx, "id does not match content"));
            }
            if !ids.insert(tx.id) {
                return Err(rejected(tx, "duplicate transaction id"));
            }
            let output_value = tx
                .total_output_value()
                .map_err(|_| rejected(tx, "output value overflow"))?;

            if tx.is_coinbase() {
                if coinbase_seen {
                    return Err(rejected(tx, "more than one coinbase"));
                }
                coinbase_seen = true;
                if output_value > self.config.subsidy {
                    return Err(rejected(tx, "coinbase exceeds the subsidy"));
                }
                continue;
            }

            let prev_txs = self.previous_transactions_from(prev, tx)?;
            if !tx.verify(&prev_txs)? {
                return Err(rejected(tx, "signature verification failed"));
            }

            let mut input_value: u64 = 0;
            for input in &tx.vin {
                let referenced = prev_txs
                    .get(&input.txid)
                    .and_then(|prev| prev.vout.get(input.vout as usize))
                    .ok_or_else(|| rejected(tx, "input references a missing output"))?;

                if !spent.entry(input.txid).or_default().insert(input.vout) {
                    return Err(rejected(
                        tx,
                        &format!("output {}:{} is already spent", hex::encode(input.txid), input.vout),
                    ));
                }
                input_value = input_value
                    .checked_add(referenced.value)
                    .ok_or_else(|| rejected(tx, "input value overflow"))?;
            }

            if output_value > input_value {
                return Err(rejected(tx, "outputs exceed inputs"));
            }
        }

        Ok(())
    }

    /// FindTransaction: the first transaction with `id`, walking from the tip
    pub fn find_transaction(&self, id: &Hash) -> Result<Transaction> {
        self.find_transaction_from(self.tip, id)
    }

    fn find_transaction_from(&self, start: Hash, id: &Hash) -> Result<Transaction> {
        for block in ChainIterator::new(start, &self.store) {
            if let Some(tx) = block?.transactions.into_iter().find(|tx| tx.id == *id) {
                return Ok(tx);
            }
        }
        Err(LedgerError::TransactionNotFound { id: hex::encode(id) })
    }

    /// Unspent outputs owned by `address`, grouped by transaction id
    pub fn find_unspent_transactions(&self, address: &str) -> Result<UnspentOutputs> {
        let pub_key_hash = decode_address(address)?;
        utxo::find_unspent(self.iter(), &pub_key_hash)
    }

    /// FindUTXO: unspent outputs owned by `address`, flattened
    pub fn find_utxo(&self, address: &str) -> Result<Vec<TxOutput>> {
        Ok(self.find_unspent_transactions(address)?.outputs())
    }

    pub fn get_balance(&self, address: &str) -> Result<u64> {
        self.find_unspent_transactions(address)?.balance()
    }

    /// FindSpendableOutputs: outputs of `address` covering `amount` when
    /// possible. Insufficient funds show as `accumulated < amount`.
    pub fn find_spendable_outputs(&self, address: &str, amount: u64) -> Result<SpendableOutputs> {
        let pub_key_hash = decode_address(address)?;
        self.find_spendable_outputs_by_key(&pub_key_hash, amount)
    }

    pub fn find_spendable_outputs_by_key(
        &self,
        pub_key_hash: &[u8],
        amount: u64,
    ) -> Result<SpendableOutputs> {
        utxo::find_unspent(self.iter(), pub_key_hash)?.accumulate(amount)
    }

    /// Unspent outputs of every owner
    pub fn find_all_unspent(&self) -> Result<UnspentOutputs> {
        utxo::find_all_unspent(self.iter())
    }

    /// Every transaction referenced by `tx`'s inputs, keyed by id
    pub fn previous_transactions(&self, tx: &Transaction) -> Result<PrevTransactions> {
        self.previous_transactions_from(self.tip, tx)
    }

    fn previous_transactions_from(&self, start: Hash, tx: &Transaction) -> Result<PrevTransactions> {
        let mut prev_txs = PrevTransactions::new();
        if tx.is_coinbase() {
            return Ok(prev_txs);
        }
        for input in &tx.vin {
            if !prev_txs.contains_key(&input.txid) {
                let prev = self.find_transaction_from(start, &input.txid)?;
                prev_txs.insert(prev.id, prev);
            }
        }
        Ok(prev_txs)
    }

    pub fn sign_transaction(&self, tx: &mut Transaction, secret_key: &SecretKey) -> Result<()> {
        let prev_txs = self.previous_transactions(tx)?;
        tx.sign(secret_key, &prev_txs)
    }

    /// Verify `tx` against the transactions it spends from.
    ///
    /// A referenced transaction missing from the chain is an error, not a
    /// failed verification.
    pub fn verify_transaction(&self, tx: &Transaction) -> Result<bool> {
        if tx.is_coinbase() {
            return Ok(true);
        }
        let prev_txs = self.previous_transactions(tx)?;
        tx.verify(&prev_txs)
    }
}

fn rejected(tx: &Transaction, reason: &str) -> LedgerError {
    warn!(tx = %hex::encode(tx.id), reason, "rejected transaction");
    LedgerError::InvalidTransaction {
        id: hex::encode(tx.id),
        reason: reason.to_string(),
    }
}

fn height_from(mut blocks: ChainIterator<'_>) -> Result<u64> {
    blocks.try_fold(0, |count, block| block.map(|_| count + 1))
}

/// Persisted tip; `None` when the bucket holds no tip key
fn read_tip(store: &Store) -> Result<Option<Hash>> {
    let bytes = store.view(|r| r.get(BLOCKS_BUCKET, TIP_KEY))?;
    match bytes {
        None => Ok(None),
        Some(bytes) => {
            let tip: Hash = bytes
                .as_slice()
                .try_into()
                .map_err(|_| LedgerError::CorruptChain { hash: hex::encode(&bytes) })?;
            Ok(Some(tip))
        }
    }
}
