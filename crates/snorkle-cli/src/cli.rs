//! Command-line interface definitions and parsing

use clap::{Args, Parser, Subcommand};
use snorkle_core::{Network, TransferType};
use std::path::PathBuf;

use crate::state::EndpointPreset;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Data directory for the key vault, history and network settings
    #[arg(short, long)]
    pub data_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Query the explorer REST API
    Rest {
        #[command(subcommand)]
        query: RestQuery,
    },
    /// Manage stored keys
    Keys {
        #[command(subcommand)]
        action: KeyAction,
    },
    /// Derive, sign, verify and decrypt with account keys
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },
    /// Show or prune the transaction history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Show or change the selected network and endpoint
    Network {
        #[command(subcommand)]
        action: NetworkAction,
    },
    /// Deploy a program from a file
    Deploy {
        /// Program source file
        program: PathBuf,
        #[command(flatten)]
        signer: SignerArgs,
        #[command(flatten)]
        fee: FeeArgs,
    },
    /// Execute a program function locally or on chain
    Execute {
        /// Program id on chain, or a source file with --local
        target: String,
        /// Function name
        function: String,
        /// Function inputs
        inputs: Vec<String>,
        /// Run offline against a local source file
        #[arg(long)]
        local: bool,
        #[command(flatten)]
        signer: SignerArgs,
        #[command(flatten)]
        fee: FeeArgs,
    },
    /// Estimate the fee for executing a deployed function
    EstimateFee {
        program_id: String,
        function: String,
        inputs: Vec<String>,
        #[command(flatten)]
        signer: SignerArgs,
    },
    /// Estimate the fee for deploying a program file
    EstimateDeployFee {
        program: PathBuf,
    },
    /// Transfer credits
    Transfer {
        recipient: String,
        /// Amount in credits
        #[arg(default_value_t = 1.0)]
        amount: f64,
        /// private, private_to_public, public or public_to_private
        #[arg(short = 't', long, default_value = "private")]
        transfer_type: TransferType,
        /// Record to spend for private transfers
        #[arg(long)]
        amount_record: Option<String>,
        #[command(flatten)]
        signer: SignerArgs,
        #[command(flatten)]
        fee: FeeArgs,
    },
    /// Split a credits record in two
    Split {
        record: String,
        /// Amount in credits for the first output record
        amount: f64,
        #[command(flatten)]
        signer: SignerArgs,
    },
    /// Join two credits records
    Join {
        record_one: String,
        record_two: String,
        #[command(flatten)]
        signer: SignerArgs,
        #[command(flatten)]
        fee: FeeArgs,
    },
}

#[derive(Subcommand)]
pub enum RestQuery {
    LatestBlock,
    LatestHeight,
    /// Block by height or hash
    Block { id: String },
    Program { program_id: String },
    MappingNames { program_id: String },
    MappingValue {
        program_id: String,
        mapping: String,
        key: String,
    },
    Transaction { transaction_id: String },
}

#[derive(Subcommand)]
pub enum KeyAction {
    List,
    /// Store an existing private key; missing parts are derived by the SDK
    Add {
        name: String,
        #[arg(long)]
        private_key: String,
        #[arg(long)]
        view_key: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },
    /// Generate a fresh account and store it
    Generate {
        /// Defaults to `Account <address prefix>`
        name: Option<String>,
    },
    /// Rename a key or replace its parts
    Edit {
        /// Current name of the key
        name: String,
        #[arg(long)]
        rename: Option<String>,
        #[arg(long)]
        private_key: Option<String>,
        #[arg(long)]
        view_key: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },
    Remove { name: String },
    Clear,
}

#[derive(Subcommand)]
pub enum AccountAction {
    /// Show the view key and address of a private key, or the address of a view key
    Derive {
        #[arg(long)]
        private_key: Option<String>,
        #[arg(long, conflicts_with = "private_key")]
        view_key: Option<String>,
    },
    /// Sign a message
    Sign {
        message: String,
        #[command(flatten)]
        signer: SignerArgs,
    },
    /// Check a signature against an address
    Verify {
        message: String,
        signature: String,
        #[arg(long)]
        address: Option<String>,
        /// Use the address of a vault key
        #[arg(short, long, conflicts_with = "address")]
        key: Option<String>,
    },
    /// Decrypt a record ciphertext
    Decrypt {
        ciphertext: String,
        #[arg(long)]
        view_key: Option<String>,
        /// Use the view key of a vault key
        #[arg(short, long, conflicts_with = "view_key")]
        key: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum HistoryAction {
    List,
    Remove { id: String },
    Clear,
}

#[derive(Subcommand)]
pub enum NetworkAction {
    Show,
    Set {
        #[arg(long)]
        network: Option<Network>,
        /// provable, devnet or custom
        #[arg(long)]
        endpoint: Option<EndpointPreset>,
        /// Base URL used with `--endpoint custom`
        #[arg(long)]
        url: Option<String>,
    },
}

/// Which private key signs the operation
#[derive(Args, Debug, Clone)]
pub struct SignerArgs {
    /// Name of a key in the vault
    #[arg(short, long)]
    pub key: Option<String>,
    /// Raw private key
    #[arg(long, conflicts_with = "key")]
    pub private_key: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct FeeArgs {
    /// Priority fee in credits
    #[arg(long, default_value_t = 0.0)]
    pub fee: f64,
    /// Pay the fee from a private record
    #[arg(long)]
    pub private_fee: bool,
    /// Record paying the fee when --private-fee is set
    #[arg(long)]
    pub fee_record: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_add_needs_only_the_private_key() {
        let cli = Cli::try_parse_from(["snorkle", "keys", "add", "alice", "--private-key", "APrivateKey1a"])
            .unwrap();
        match cli.command {
            Commands::Keys {
                action: KeyAction::Add {
                    name,
                    view_key,
                    address,
                    ..
                },
            } => {
                assert_eq!(name, "alice");
                assert!(view_key.is_none());
                assert!(address.is_none());
            }
            _ => panic!("expected keys add"),
        }

        assert!(Cli::try_parse_from(["snorkle", "keys", "add", "alice"]).is_err());
    }

    #[test]
    fn test_account_verify_takes_address_or_key() {
        let cli = Cli::try_parse_from(["snorkle", "account", "verify", "hi", "sign1abc", "-k", "alice"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Account {
                action: AccountAction::Verify { key: Some(_), address: None, .. }
            }
        ));

        let both = Cli::try_parse_from([
            "snorkle", "account", "verify", "hi", "sign1abc", "-k", "alice", "--address", "aleo1a",
        ]);
        assert!(both.is_err());
    }
}
