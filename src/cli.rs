use clap::{Parser, Subcommand};
use log::info;

use pow_ledger::wallet::validate_address;
use pow_ledger::{Ledger, LedgerConfig, LedgerError, Result, Wallets};

/// Single-node proof-of-work ledger.
#[derive(Parser, Debug)]
#[command(name = "pow-ledger", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new chain whose genesis reward goes to ADDRESS.
    #[command(name = "createblockchain")]
    CreateBlockchain {
        #[arg(long)]
        address: String,
    },
    /// Generate a key pair and store it in the wallet file.
    #[command(name = "createwallet")]
    CreateWallet,
    /// List addresses in the wallet file.
    #[command(name = "listaddresses")]
    ListAddresses,
    /// Print the spendable balance of ADDRESS.
    #[command(name = "getbalance")]
    GetBalance {
        #[arg(long)]
        address: String,
    },
    /// Send AMOUNT from FROM to TO and mine a block containing the transfer.
    Send {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: u64,
    },
    /// Print every block from the tip back to genesis.
    #[command(name = "printchain")]
    PrintChain,
    /// Rebuild the UTXO set from the chain.
    #[command(name = "reindexutxo")]
    ReindexUtxo,
    /// Check hashes, proof-of-work, linkage and transactions of the whole chain.
    #[command(name = "validatechain")]
    ValidateChain,
    /// Serve the JSON API over HTTP.
    Serve,
}

pub fn run(cli: Cli, config: &LedgerConfig) -> Result<()> {
    match cli.command {
        Command::CreateBlockchain { address } => {
            let ledger = Ledger::create_from_config(config, &address)?;
            println!(
                "Created blockchain, genesis {} (reward {} to {})",
                hex::encode(ledger.tip()),
                config.genesis_reward,
                address
            );
        }
        Command::CreateWallet => {
            let mut wallets = Wallets::load(&config.wallet_file)?;
            let address = wallets.create_wallet();
            wallets.save(&config.wallet_file)?;
            println!("Your new address: {address}");
        }
        Command::ListAddresses => {
            let wallets = Wallets::load(&config.wallet_file)?;
            for address in wallets.addresses() {
                println!("{address}");
            }
        }
        Command::GetBalance { address } => {
            let ledger = Ledger::open_from_config(config)?;
            let balance = ledger.balance(&address)?;
            println!("Balance of '{address}': {balance}");
        }
        Command::Send { from, to, amount } => {
            if !validate_address(&from) {
                return Err(LedgerError::InvalidAddress(from));
            }
            if !validate_address(&to) {
                return Err(LedgerError::InvalidAddress(to));
            }
            let wallets = Wallets::load(&config.wallet_file)?;
            let wallet = wallets.require(&from)?;
            let ledger = Ledger::open_from_config(config)?;
            let block = ledger.send(wallet, &to, amount)?;
            info!("send mined into block #{}", block.height);
            println!("Success! Block #{} {}", block.height, block.hash_hex());
        }
        Command::PrintChain => {
            let ledger = Ledger::open_from_config(config)?;
            for block in ledger.blocks() {
                print_block(&block?);
            }
        }
        Command::ReindexUtxo => {
            let ledger = Ledger::open_from_config(config)?;
            let count = ledger.reindex()?;
            println!("Done! There are {count} transactions in the UTXO set.");
        }
        Command::ValidateChain => {
            let ledger = Ledger::open_from_config(config)?;
            let blocks = ledger.validate_chain()?;
            println!("Chain is valid ({blocks} blocks).");
        }
        Command::Serve => {
            let ledger = Ledger::open_from_config(config)?;
            actix_web::rt::System::new().block_on(crate::api::serve(ledger, config.clone()))?;
        }
    }
    Ok(())
}

fn print_block(block: &pow_ledger::Block) {
    println!("============ Block {} ============", block.hash_hex());
    println!("Height: {}", block.height);
    println!("Prev. hash: {}", hex::encode(block.prev_hash));
    println!("Timestamp: {}", block.timestamp);
    println!("Nonce: {}", block.nonce);
    for tx in &block.transactions {
        println!("--- Transaction {}", tx.id_hex());
        for (i, input) in tx.inputs.iter().enumerate() {
            println!(
                "  Input {i}: {}:{} pubkey={}",
                hex::encode(input.outpoint.txid),
                input.outpoint.vout,
                hex::encode(&input.pubkey)
            );
        }
        for (i, output) in tx.outputs.iter().enumerate() {
            println!(
                "  Output {i}: {} -> {}",
                output.value,
                pow_ledger::wallet::encode_address(&output.pubkey_hash)
            );
        }
    }
    println!();
}
