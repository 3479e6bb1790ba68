//! Ledger behaviour across process restarts, using on-disk stores

use secp256k1::SecretKey;
use tempfile::TempDir;
use utxo_ledger::transaction::new_utxo_transaction;
use utxo_ledger::*;

fn key(byte: u8) -> SecretKey {
    SecretKey::from_slice(&[byte; 32]).unwrap()
}

fn addr(byte: u8) -> String {
    address_from_secret_key(&key(byte))
}

fn config_in(dir: &TempDir) -> LedgerConfig {
    LedgerConfig::default()
        .with_db_path(dir.path().join(DEFAULT_DB_FILE))
        .with_target_bits(8)
}

#[test]
fn test_open_missing_store() {
    let dir = TempDir::new().unwrap();
    let result = Blockchain::open(config_in(&dir));
    assert!(matches!(result, Err(LedgerError::LedgerNotFound { .. })));
}

#[test]
fn test_tip_survives_restart() {
    let dir = TempDir::new().unwrap();

    let tip = {
        let mut chain = Blockchain::create(&addr(1), config_in(&dir)).unwrap();
        let tx = new_utxo_transaction(&chain, &key(1), &addr(2), 6).unwrap();
        chain.mine_with_reward(&addr(1), vec![tx]).unwrap();
        chain.tip()
    };

    let chain = Blockchain::open(config_in(&dir)).unwrap();
    assert_eq!(chain.tip(), tip);
    assert_eq!(chain.height().unwrap(), 2);
    assert_eq!(chain.get_balance(&addr(1)).unwrap(), 4 + SUBSIDY);
    assert_eq!(chain.get_balance(&addr(2)).unwrap(), 6);
}

#[test]
fn test_appends_continue_after_restart() {
    let dir = TempDir::new().unwrap();
    let genesis = Blockchain::create(&addr(1), config_in(&dir)).unwrap().tip();

    let mut chain = Blockchain::open(config_in(&dir)).unwrap();
    let block = chain.mine_with_reward(&addr(2), vec![]).unwrap();
    assert_eq!(block.prev_block_hash, Some(genesis));
    drop(chain);

    let chain = Blockchain::open(config_in(&dir)).unwrap();
    assert_eq!(chain.tip(), block.hash);
    assert_eq!(chain.get_balance(&addr(2)).unwrap(), SUBSIDY);
}

#[test]
fn test_create_existing_fails_by_default() {
    let dir = TempDir::new().unwrap();
    let tip = Blockchain::create(&addr(1), config_in(&dir)).unwrap().tip();

    let result = Blockchain::create(&addr(2), config_in(&dir));
    assert!(matches!(result, Err(LedgerError::LedgerExists { .. })));

    // the refused call left the ledger alone
    let chain = Blockchain::open(config_in(&dir)).unwrap();
    assert_eq!(chain.tip(), tip);
}

#[test]
fn test_create_existing_reuses_when_configured() {
    let dir = TempDir::new().unwrap();
    let tip = Blockchain::create(&addr(1), config_in(&dir)).unwrap().tip();

    let config = config_in(&dir).with_on_existing(OnExisting::Reuse);
    let chain = Blockchain::create(&addr(2), config).unwrap();
    assert_eq!(chain.tip(), tip);
    assert_eq!(chain.height().unwrap(), 1);
    assert_eq!(chain.get_balance(&addr(2)).unwrap(), 0);
}

#[test]
fn test_reuse_on_fresh_path_creates() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir).with_on_existing(OnExisting::Reuse);
    let chain = Blockchain::create(&addr(1), config).unwrap();
    assert_eq!(chain.height().unwrap(), 1);
    assert_eq!(chain.get_balance(&addr(1)).unwrap(), SUBSIDY);
}

#[test]
fn test_store_without_blocks_bucket() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    drop(Store::create(&config.db_path).unwrap());

    let result = Blockchain::open(config);
    assert!(matches!(result, Err(LedgerError::MissingBucket(BLOCKS_BUCKET))));
}

#[test]
fn test_dangling_tip_is_corrupt_chain() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    let store = Store::create(&config.db_path).unwrap();
    store
        .update(|w| {
            w.create_bucket_if_absent(BLOCKS_BUCKET)?;
            w.put(BLOCKS_BUCKET, TIP_KEY, &[0xab; 32])
        })
        .unwrap();
    drop(store);

    let chain = Blockchain::open(config).unwrap();
    let mut blocks = chain.iter();
    let first = blocks.next().unwrap();
    match first {
        Err(err @ LedgerError::CorruptChain { .. }) => assert!(err.is_fatal()),
        other => panic!("unexpected {:?}", other.map(|b| b.hash)),
    }
    assert!(blocks.next().is_none());
    assert!(chain.get_balance(&addr(1)).is_err());
}

#[test]
fn test_config_file_drives_ledger() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("ledger.redb");
    let config_path = dir.path().join("ledger.json");
    let json = serde_json::json!({
        "db_path": db_path,
        "target_bits": 6,
        "subsidy": 25,
    });
    std::fs::write(&config_path, json.to_string()).unwrap();

    let config = LedgerConfig::from_json_file(&config_path).unwrap();
    assert_eq!(config.on_existing, OnExisting::Fail);

    let chain = Blockchain::create(&addr(1), config).unwrap();
    assert_eq!(chain.get_balance(&addr(1)).unwrap(), 25);
    assert!(db_path.exists());
}
