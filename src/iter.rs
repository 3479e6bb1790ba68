//! Backward chain traversal

use crate::constants::BLOCKS_BUCKET;
use crate::error::{LedgerError, Result};
use crate::store::Store;
use crate::types::{Block, Hash};
use tracing::error;

/// Iterator over the persisted chain from a fixed starting hash to genesis.
///
/// Each step opens its own read transaction. The starting hash is fixed at
/// construction, so appends made during traversal are not observed. The
/// sequence ends after the genesis block is yielded. A hash with no stored
/// block yields `CorruptChain` once and ends the sequence.
pub struct ChainIterator<'a> {
    current_hash: Option<Hash>,
    store: &'a Store,
}

impl<'a> ChainIterator<'a> {
    pub fn new(tip: Hash, store: &'a Store) -> Self {
        ChainIterator {
            current_hash: Some(tip),
            store,
        }
    }

    fn fetch(&self, hash: &Hash) -> Result<Block> {
        let encoded = self.store.view(|tx| tx.get(BLOCKS_BUCKET, hash))?;
        match encoded {
            Some(bytes) => Block::deserialize(&bytes),
            None => {
                error!(hash = %hex::encode(hash), "chain references a block that is not stored");
                Err(LedgerError::CorruptChain { hash: hex::encode(hash) })
            }
        }
    }
}

impl<'a> Iterator for ChainIterator<'a> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.current_hash.take()?;
        match self.fetch(&hash) {
            Ok(block) => {
                self.current_hash = block.prev_block_hash;
                Some(Ok(block))
            }
            Err(e) => Some(Err(e)),
        }
    }
}
