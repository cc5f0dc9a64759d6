//! da-keygen entry point.

mod cli;

use clap::Parser;
use cli::{Cli, Command};
use color_eyre::eyre::{bail, eyre, WrapErr};
use da_client::auth::{sign_challenge, verify_challenge};
use da_client::config::default_key_dir;
use da_client::{BlobRequestSigner, ClientConfig, LocalBlobRequestSigner};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const KEY_FILE_NAME: &str = "signer.key";

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    debug!("da-keygen v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Generate {
            output_dir,
            write_config,
            rpc,
            force,
        } => generate(output_dir, write_config, rpc, force),
        Command::Account { key, key_file } => {
            let signer = load_signer(key, key_file)?;
            println!("{}", signer.account_id()?);
            Ok(())
        }
        Command::SignChallenge {
            nonce,
            key,
            key_file,
        } => {
            let signer = load_signer(key, key_file)?;
            let signature = sign_challenge(&signer, nonce)?;
            verify_challenge(nonce, &signature, &signer.account_id()?)?;
            println!("0x{}", hex::encode(signature));
            Ok(())
        }
    }
}

fn generate(
    output_dir: Option<PathBuf>,
    write_config: Option<PathBuf>,
    rpc: String,
    force: bool,
) -> color_eyre::Result<()> {
    let output_dir = output_dir.unwrap_or_else(default_key_dir);
    fs::create_dir_all(&output_dir)
        .wrap_err_with(|| format!("creating {}", output_dir.display()))?;

    let key_path = output_dir.join(KEY_FILE_NAME);
    if key_path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite",
            key_path.display()
        );
    }

    let signer = LocalBlobRequestSigner::random();
    let account_id = signer.account_id()?;

    let contents = format!(
        "# da-client signer key\n# account: {account_id}\n# generated: {}\n{}\n",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
        signer.private_key_hex()
    );
    write_secret(&key_path, &contents)?;
    info!("Key written to {}", key_path.display());

    if let Some(config_path) = write_config {
        let config = ClientConfig {
            rpc,
            signer_private_key_hex: signer.private_key_hex(),
            ..Default::default()
        };
        config.validate()?;
        config.to_file(&config_path)?;
        info!("Client configuration written to {}", config_path.display());
    }

    println!("Account id: {account_id}");
    println!("Key file:   {}", key_path.display());
    println!("\nKeep the key file secret; anyone holding it can spend this account's balance.");
    Ok(())
}

fn load_signer(
    key: Option<String>,
    key_file: Option<PathBuf>,
) -> color_eyre::Result<LocalBlobRequestSigner> {
    let hex_key = match (key, key_file) {
        (Some(key), _) => key,
        (None, Some(path)) => read_key_file(&path)?,
        (None, None) => read_key_file(&default_key_dir().join(KEY_FILE_NAME))?,
    };
    Ok(LocalBlobRequestSigner::from_hex(hex_key.trim())?)
}

fn read_key_file(path: &Path) -> color_eyre::Result<String> {
    let contents =
        fs::read_to_string(path).wrap_err_with(|| format!("reading {}", path.display()))?;
    contents
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .ok_or_else(|| eyre!("{} holds no key", path.display()))
}

#[cfg(unix)]
fn write_secret(path: &Path, contents: &str) -> color_eyre::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .wrap_err_with(|| format!("writing {}", path.display()))?;
    file.write_all(contents.as_bytes())?;
    Ok(())
}

#[cfg(not(unix))]
fn write_secret(path: &Path, contents: &str) -> color_eyre::Result<()> {
    fs::write(path, contents).wrap_err_with(|| format!("writing {}", path.display()))
}
