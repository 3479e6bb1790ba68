// src/main.rs
//
// Command-line front end for the ledger:
//
// - createblockchain: initialize the store with a genesis block
// - getbalance:       sum of unspent outputs for an address
// - send:             build, sign and mine a transfer
// - printchain:       dump every block from the tip back to genesis
// - address:          derive the address owned by a secret key

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use secp256k1::SecretKey;
use tracing_subscriber::EnvFilter;

use utxo_ledger::transaction::new_utxo_transaction;
use utxo_ledger::{address_from_secret_key, pow, Blockchain, LedgerConfig};

/// A UTXO ledger persisted in a local store.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store location, overrides the configuration
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a ledger whose genesis reward goes to ADDRESS
    #[command(name = "createblockchain")]
    CreateBlockchain {
        #[arg(long)]
        address: String,
    },

    /// Print the balance of ADDRESS
    #[command(name = "getbalance")]
    GetBalance {
        #[arg(long)]
        address: String,
    },

    /// Transfer AMOUNT from the owner of FROM_KEY to TO and mine it
    Send {
        /// Sender's secret key (hex-encoded); the block reward goes to its address
        #[arg(long)]
        from_key: String,

        #[arg(long)]
        to: String,

        #[arg(long)]
        amount: u64,
    },

    /// Print every block from the tip back to genesis
    #[command(name = "printchain")]
    PrintChain,

    /// Print the address owned by KEY
    Address {
        /// Secret key (hex-encoded)
        #[arg(long)]
        key: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    if let Err(err) = run(args) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = load_config(args.config, args.db)?;

    match args.command {
        Command::CreateBlockchain { address } => {
            let chain = Blockchain::create(&address, config)?;
            println!("Done! Tip: {}", hex::encode(chain.tip()));
        }
        Command::GetBalance { address } => {
            let chain = Blockchain::open(config)?;
            println!("Balance of '{}': {}", address, chain.get_balance(&address)?);
        }
        Command::Send { from_key, to, amount } => {
            let key = parse_key(&from_key)?;
            let mut chain = Blockchain::open(config)?;
            let tx = new_utxo_transaction(&chain, &key, &to, amount)?;
            let from = address_from_secret_key(&key);
            let block = chain.mine_with_reward(&from, vec![tx])?;
            println!("Success! Block {}", hex::encode(block.hash));
        }
        Command::PrintChain => {
            let chain = Blockchain::open(config)?;
            for block in chain.iter() {
                let block = block?;
                println!("============ Block {} ============", hex::encode(block.hash));
                match block.prev_block_hash {
                    Some(prev) => println!("Prev. block: {}", hex::encode(prev)),
                    None => println!("Prev. block: (genesis)"),
                }
                println!("PoW: {}", pow::validate(&block)?);
                for tx in &block.transactions {
                    println!("--- Transaction {}:", hex::encode(tx.id));
                    for (i, input) in tx.vin.iter().enumerate() {
                        println!("    Input {}: {}:{}", i, hex::encode(input.txid), input.vout);
                    }
                    for (i, output) in tx.vout.iter().enumerate() {
                        println!("    Output {}: {} -> {}", i, output.value, hex::encode(&output.pub_key_hash));
                    }
                }
                println!();
            }
        }
        Command::Address { key } => {
            let key = parse_key(&key)?;
            println!("{}", address_from_secret_key(&key));
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>, db: Option<PathBuf>) -> Result<LedgerConfig> {
    let mut config = match path {
        Some(path) => LedgerConfig::from_json_file(path)?,
        None => LedgerConfig::default(),
    };
    if let Some(db) = db {
        config = config.with_db_path(db);
    }
    Ok(config)
}

fn parse_key(hex_key: &str) -> Result<SecretKey> {
    let bytes = hex::decode(hex_key).context("secret key must be hex")?;
    SecretKey::from_slice(&bytes).context("invalid secret key")
}
