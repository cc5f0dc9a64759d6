//! Command-line interface definition.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Signer key tool for da-client.
#[derive(Parser, Debug)]
#[command(name = "da-keygen")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log level.
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Keygen commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a new secp256k1 signer key.
    Generate {
        /// Directory to write the key file into.
        #[arg(long, short, env = "DA_KEY_DIR")]
        output_dir: Option<PathBuf>,

        /// Also write a client configuration using the new key.
        #[arg(long)]
        write_config: Option<PathBuf>,

        /// Disperser address for the written configuration.
        #[arg(long, default_value = "localhost:32001", env = "DA_DISPERSER_RPC")]
        rpc: String,

        /// Overwrite an existing key file.
        #[arg(long)]
        force: bool,
    },

    /// Print the account id of an existing key.
    Account {
        /// Hex-encoded private key.
        #[arg(long, env = "DA_SIGNER_KEY", conflicts_with = "key_file")]
        key: Option<String>,

        /// File holding a hex-encoded private key.
        #[arg(long)]
        key_file: Option<PathBuf>,
    },

    /// Sign a disperser auth challenge and print the signature.
    SignChallenge {
        /// Challenge nonce.
        #[arg(long)]
        nonce: u32,

        /// Hex-encoded private key.
        #[arg(long, env = "DA_SIGNER_KEY", conflicts_with = "key_file")]
        key: Option<String>,

        /// File holding a hex-encoded private key.
        #[arg(long)]
        key_file: Option<PathBuf>,
    },
}
