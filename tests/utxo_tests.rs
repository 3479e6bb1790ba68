//! Resolver properties checked against mined chains

use std::collections::BTreeSet;

use secp256k1::SecretKey;
use utxo_ledger::transaction::new_utxo_transaction;
use utxo_ledger::utxo::{find_all_unspent, find_spent, find_unspent};
use utxo_ledger::*;

fn key(byte: u8) -> SecretKey {
    SecretKey::from_slice(&[byte; 32]).unwrap()
}

fn addr(byte: u8) -> String {
    address_from_secret_key(&key(byte))
}

/// Genesis to 1, then a handful of transfers and rewards among 1..=3
fn busy_chain() -> Blockchain {
    let config = LedgerConfig::default().with_target_bits(6);
    let mut chain = Blockchain::create_in(Store::in_memory().unwrap(), &addr(1), config).unwrap();

    let tx = new_utxo_transaction(&chain, &key(1), &addr(2), 4).unwrap();
    chain.mine_with_reward(&addr(3), vec![tx]).unwrap();

    let a = new_utxo_transaction(&chain, &key(1), &addr(3), 6).unwrap();
    let b = new_utxo_transaction(&chain, &key(2), &addr(1), 4).unwrap();
    chain.mine_with_reward(&addr(2), vec![a, b]).unwrap();

    let tx = new_utxo_transaction(&chain, &key(3), &addr(2), 13).unwrap();
    chain.mine_with_reward(&addr(1), vec![tx]).unwrap();
    chain
}

#[test]
fn test_output_unspent_iff_never_referenced() {
    let chain = busy_chain();
    let blocks = chain.blocks().unwrap();

    let referenced: BTreeSet<(Hash, u32)> = blocks
        .iter()
        .flat_map(|b| b.transactions.iter())
        .filter(|tx| !tx.is_coinbase())
        .flat_map(|tx| tx.vin.iter().map(|i| (i.txid, i.vout)))
        .collect();

    let unspent = find_all_unspent(chain.iter()).unwrap();
    let unspent_keys: BTreeSet<(Hash, u32)> = unspent
        .by_transaction()
        .iter()
        .flat_map(|(txid, outs)| outs.iter().map(move |o| (*txid, o.index)))
        .collect();

    for tx in blocks.iter().flat_map(|b| b.transactions.iter()) {
        for index in 0..tx.vout.len() as u32 {
            let key = (tx.id, index);
            assert_eq!(unspent_keys.contains(&key), !referenced.contains(&key));
        }
    }
}

#[test]
fn test_spent_map_matches_inputs() {
    let chain = busy_chain();
    let spent = find_spent(chain.iter()).unwrap();

    let inputs: usize = chain
        .blocks()
        .unwrap()
        .iter()
        .flat_map(|b| b.transactions.iter())
        .filter(|tx| !tx.is_coinbase())
        .map(|tx| tx.vin.len())
        .sum();
    let recorded: usize = spent.values().map(BTreeSet::len).sum();
    assert_eq!(recorded, inputs);
}

#[test]
fn test_conservation_over_busy_chain() {
    let chain = busy_chain();
    let minted = SUBSIDY * chain.height().unwrap();

    assert_eq!(find_all_unspent(chain.iter()).unwrap().balance().unwrap(), minted);
    let per_owner: u64 = (1..=3).map(|k| chain.get_balance(&addr(k)).unwrap()).sum();
    assert_eq!(per_owner, minted);
}

#[test]
fn test_resolver_agrees_with_controller() {
    let chain = busy_chain();
    for k in 1..=3 {
        let pkh = decode_address(&addr(k)).unwrap();
        let direct = find_unspent(chain.iter(), &pkh).unwrap();
        assert_eq!(direct.outputs(), chain.find_utxo(&addr(k)).unwrap());
        assert!(direct
            .outputs()
            .iter()
            .all(|out| out.is_locked_with_key(&pkh)));
    }
}

#[test]
fn test_accumulate_covers_amount_when_funds_allow() {
    let chain = busy_chain();
    let balance = chain.get_balance(&addr(2)).unwrap();

    let exact = chain.find_spendable_outputs(&addr(2), balance).unwrap();
    assert_eq!(exact.accumulated, balance);

    let short = chain.find_spendable_outputs(&addr(2), balance + 1).unwrap();
    assert_eq!(short.accumulated, balance);

    let partial = chain.find_spendable_outputs(&addr(2), 1).unwrap();
    assert!(partial.accumulated >= 1);
    assert_eq!(partial.outputs.values().map(Vec::len).sum::<usize>(), 1);
}
