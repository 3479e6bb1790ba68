//! Transactional byte-keyed store.
//!
//! A thin layer over a `redb` database exposing named buckets of
//! `&[u8] -> &[u8]` entries, accessed only inside scoped read or
//! read-write transactions. A write scope commits when its closure returns
//! `Ok` and aborts when it returns `Err`, so a failed update leaves the
//! store exactly as it was. redb admits a single writer at a time and any
//! number of concurrent readers.

use crate::error::{LedgerError, Result};
use redb::backends::InMemoryBackend;
use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, ReadableTableMetadata,
    TableDefinition, TableError, WriteTransaction,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

fn bucket_table(bucket: &str) -> TableDefinition<'_, &'static [u8], &'static [u8]> {
    TableDefinition::new(bucket)
}

/// Handle to an opened store
pub struct Store {
    db: Database,
    path: Option<PathBuf>,
}

impl Store {
    /// Whether a store file exists at `path`
    pub fn exists(path: impl AsRef<Path>) -> bool {
        path.as_ref().exists()
    }

    /// Open an existing store; fails if nothing exists at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !Self::exists(path) {
            return Err(LedgerError::LedgerNotFound { path: path.to_path_buf() });
        }
        let db = Database::open(path)?;
        info!(path = %path.display(), "opened store");
        Ok(Store { db, path: Some(path.to_path_buf()) })
    }

    /// Create a store at `path`, or open the one already there
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = Database::create(path)?;
        info!(path = %path.display(), "created store");
        Ok(Store { db, path: Some(path.to_path_buf()) })
    }

    /// Store backed by memory only; contents vanish on drop
    pub fn in_memory() -> Result<Self> {
        let db = Database::builder().create_with_backend(InMemoryBackend::new())?;
        Ok(Store { db, path: None })
    }

    /// Filesystem location, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` inside a read transaction
    pub fn view<T>(&self, f: impl FnOnce(&ReadScope) -> Result<T>) -> Result<T> {
        let scope = ReadScope { txn: self.db.begin_read()? };
        f(&scope)
    }

    /// Run `f` inside a read-write transaction, committing on `Ok` and
    /// aborting on `Err`
    pub fn update<T>(&self, f: impl FnOnce(&mut WriteScope) -> Result<T>) -> Result<T> {
        let mut scope = WriteScope { txn: self.db.begin_write()? };
        match f(&mut scope) {
            Ok(value) => {
                scope.txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                debug!(error = %e, "aborting write transaction");
                scope.txn.abort()?;
                Err(e)
            }
        }
    }
}

/// Read-only view of the store
pub struct ReadScope {
    txn: ReadTransaction,
}

impl ReadScope {
    pub fn has_bucket(&self, bucket: &'static str) -> Result<bool> {
        match self.txn.open_table(bucket_table(bucket)) {
            Ok(_) => Ok(true),
            Err(TableError::TableDoesNotExist(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Value under `key`; a missing bucket is `MissingBucket`
    pub fn get(&self, bucket: &'static str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let table = match self.txn.open_table(bucket_table(bucket)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Err(LedgerError::MissingBucket(bucket)),
            Err(e) => return Err(e.into()),
        };
        let value = table.get(key)?.map(|value| value.value().to_vec());
        Ok(value)
    }

    /// Number of entries in `bucket`
    pub fn len(&self, bucket: &'static str) -> Result<u64> {
        let table = match self.txn.open_table(bucket_table(bucket)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let len = table.len()?;
        Ok(len)
    }

    /// Every key in `bucket`, in byte order
    pub fn keys(&self, bucket: &'static str) -> Result<Vec<Vec<u8>>> {
        let table = match self.txn.open_table(bucket_table(bucket)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut keys = Vec::new();
        for entry in table.iter()? {
            let (key, _) = entry?;
            keys.push(key.value().to_vec());
        }
        Ok(keys)
    }
}

/// Read-write view of the store
pub struct WriteScope {
    txn: WriteTransaction,
}

impl WriteScope {
    pub fn create_bucket_if_absent(&mut self, bucket: &'static str) -> Result<()> {
        self.txn.open_table(bucket_table(bucket))?;
        Ok(())
    }

    pub fn get(&self, bucket: &'static str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let table = self.txn.open_table(bucket_table(bucket))?;
        let value = table.get(key)?.map(|value| value.value().to_vec());
        Ok(value)
    }

    pub fn put(&mut self, bucket: &'static str, key: &[u8], value: &[u8]) -> Result<()> {
        let mut table = self.txn.open_table(bucket_table(bucket))?;
        table.insert(key, value)?;
        Ok(())
    }
}
