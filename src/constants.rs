//! Ledger constants

/// Default database file
pub const DEFAULT_DB_FILE: &str = "blockchain.db";

/// Name of the keyed collection holding blocks and the tip
pub const BLOCKS_BUCKET: &str = "blocks";

/// Reserved key holding the hash of the most recently appended block
pub const TIP_KEY: &[u8] = b"l";

/// Coinbase reward paid per mined block
pub const SUBSIDY: u64 = 10;

/// Coinbase data embedded in the genesis block
pub const GENESIS_COINBASE_DATA: &str =
    "The Times 03/Jan/2009 Chancellor on brink of second bailout for banks";

/// Sentinel output index carried by the single coinbase input
pub const COINBASE_VOUT: u32 = 0xffffffff;

/// Address version byte
pub const ADDRESS_VERSION: u8 = 0x00;

/// Length of the address checksum suffix
pub const ADDRESS_CHECKSUM_LEN: usize = 4;

/// Length of a public-key hash: RIPEMD160 output
pub const PUB_KEY_HASH_LEN: usize = 20;

/// Default proof-of-work difficulty in leading zero bits
pub const DEFAULT_TARGET_BITS: u32 = 16;

/// Upper bound on difficulty; 256 would leave no valid hash
pub const MAX_TARGET_BITS: u32 = 255;
