mod api;
mod cli;

use clap::Parser;
use dotenvy::dotenv;
use std::process::ExitCode;

use pow_ledger::LedgerConfig;

fn main() -> ExitCode {
    let _ = dotenv();
    env_logger::init();

    let cli = cli::Cli::parse();
    let result = LedgerConfig::from_env().and_then(|config| cli::run(cli, &config));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
