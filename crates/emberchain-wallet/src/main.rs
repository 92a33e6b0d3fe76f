//! emberchain-wallet
//!
//! Offline CLI wallet: generates secp256k1 keypairs and signs
//! transactions without talking to a running node. There is no RPC
//! client here — submitting a signed transaction to the network is the
//! gossip layer's job (or an external façade's), not the wallet's.
//!
//! Usage:
//!   emberchain-wallet keygen  [--keyfile <path>]
//!   emberchain-wallet address [--keyfile <path>]
//!   emberchain-wallet sign-tx --keyfile <path> --receiver <pub_hex> --amount <u64>

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use emberchain_core::types::PublicKeyHex;
use emberchain_core::Transaction;
use emberchain_crypto::KeyPair;

#[derive(Parser, Debug)]
#[command(
    name = "emberchain-wallet",
    version,
    about = "emberchain wallet — generate keys and sign transactions offline"
)]
struct Args {
    /// Path to the keyfile (JSON).
    #[arg(long, global = true, default_value = "~/.emberchain/wallet.json")]
    keyfile: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new secp256k1 keypair and save it to the keyfile.
    Keygen,

    /// Print the public key of the local keyfile.
    Address,

    /// Build and sign a transfer transaction, printing it as JSON.
    SignTx {
        /// Recipient public key (hex).
        #[arg(long)]
        receiver: String,
        /// Amount to send.
        #[arg(long)]
        amount: u64,
    },
}

/// Everything persisted to a keyfile. `KeyPair` itself is not
/// serializable (its private key is zeroized on drop, not serialized
/// by design elsewhere) — this is the wallet's own on-disk format.
#[derive(Serialize, Deserialize)]
struct Keyfile {
    public_key_hex: String,
    private_key_hex: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("warn,emberchain_wallet=info")
        .init();

    let args = Args::parse();
    let keyfile = expand_tilde(&args.keyfile);

    match args.command {
        Command::Keygen => cmd_keygen(&keyfile),
        Command::Address => cmd_address(&keyfile),
        Command::SignTx { receiver, amount } => cmd_sign_tx(&keyfile, &receiver, amount),
    }
}

fn cmd_keygen(keyfile: &Path) -> anyhow::Result<()> {
    if keyfile.exists() {
        bail!(
            "Keyfile {} already exists. Delete it first to generate a new key.",
            keyfile.display()
        );
    }
    if let Some(parent) = keyfile.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let kp = KeyPair::generate();
    let stored = Keyfile {
        public_key_hex: kp.public_key_hex.clone(),
        private_key_hex: kp.private_key_hex.clone(),
    };
    std::fs::write(keyfile, serde_json::to_string_pretty(&stored)?)
        .with_context(|| format!("writing keyfile to {}", keyfile.display()))?;
    info!(keyfile = %keyfile.display(), "keypair generated");

    println!("Generated new keypair.");
    println!("Public key: {}", kp.public_key_hex);
    println!("Keyfile:    {}", keyfile.display());
    println!("\nBACK UP YOUR KEYFILE. Loss = permanent loss of funds.");
    Ok(())
}

fn cmd_address(keyfile: &Path) -> anyhow::Result<()> {
    let stored = load_keyfile(keyfile)?;
    println!("{}", stored.public_key_hex);
    Ok(())
}

fn cmd_sign_tx(keyfile: &Path, receiver: &str, amount: u64) -> anyhow::Result<()> {
    let stored = load_keyfile(keyfile)?;
    let mut tx = Transaction::new(
        Some(PublicKeyHex::from(stored.public_key_hex)),
        PublicKeyHex::from(receiver),
        amount,
    );
    tx.sign(&stored.private_key_hex)
        .context("signing transaction")?;
    debug!(receiver, amount, "transaction signed");
    println!("{}", serde_json::to_string_pretty(&tx)?);
    Ok(())
}

fn load_keyfile(keyfile: &Path) -> anyhow::Result<Keyfile> {
    let json = std::fs::read_to_string(keyfile)
        .with_context(|| format!("reading keyfile {}", keyfile.display()))?;
    serde_json::from_str(&json).context("parsing keyfile — is it a valid emberchain keyfile?")
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
