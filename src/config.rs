//! Ledger configuration.
//!
//! `LedgerConfig` gathers everything needed to open or create a ledger:
//! where the store lives, what to do when creating over an existing store,
//! and the mining parameters. It can be built from defaults, from the
//! builder-style setters, or from a JSON document.

use crate::constants::*;
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Behavior of ledger creation when a store already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnExisting {
    /// Refuse to create over an existing store
    #[default]
    Fail,
    /// Create the blocks bucket only if absent, otherwise adopt the stored tip
    Reuse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub db_path: PathBuf,
    pub on_existing: OnExisting,
    /// Proof-of-work difficulty in leading zero bits
    pub target_bits: u32,
    /// Coinbase reward per mined block
    pub subsidy: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE),
            on_existing: OnExisting::Fail,
            target_bits: DEFAULT_TARGET_BITS,
            subsidy: SUBSIDY,
        }
    }
}

impl LedgerConfig {
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    pub fn with_on_existing(mut self, on_existing: OnExisting) -> Self {
        self.on_existing = on_existing;
        self
    }

    pub fn with_target_bits(mut self, target_bits: u32) -> Self {
        self.target_bits = target_bits;
        self
    }

    pub fn with_subsidy(mut self, subsidy: u64) -> Self {
        self.subsidy = subsidy;
        self
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: LedgerConfig =
            serde_json::from_str(json).map_err(|e| LedgerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| LedgerError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_bits == 0 || self.target_bits > MAX_TARGET_BITS {
            return Err(LedgerError::Config(format!(
                "target_bits must be in 1..={}, got {}",
                MAX_TARGET_BITS, self.target_bits
            )));
        }
        if self.subsidy == 0 {
            return Err(LedgerError::Config("subsidy must be positive".to_string()));
        }
        Ok(())
    }
}
