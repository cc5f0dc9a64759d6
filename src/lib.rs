//! # da-client
//!
//! Write-path client for a data-availability network.
//!
//! This crate provides:
//! - Client-side admission control over a leased reservation, a one-time
//!   overflow allowance and a prepaid on-demand balance
//! - Authenticated blob dispersal with a secp256k1 nonce-signing handshake
//! - Status polling until the network certifies the blob
//!
//! ## Architecture
//!
//! - [`payment`]: the [`Accountant`] and its rotating usage bins
//! - [`auth`]: request signing and signature verification
//! - [`disperser`]: wire messages, the [`DisperserRpc`] transport seam and
//!   the handshake
//! - [`client`]: [`DaClient`], the high-level `put_blob` entry point
//!
//! The transport itself is supplied by the caller through [`DisperserRpc`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use da_client::{ClientConfig, DaClient, DisperserRpc};
//! use std::sync::Arc;
//!
//! async fn store(rpc: Arc<dyn DisperserRpc>) -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig {
//!         rpc: "disperser.example.org:443".to_string(),
//!         signer_private_key_hex: std::env::var("DA_SIGNER_KEY")?,
//!         ..Default::default()
//!     };
//!     let client = DaClient::new(config, rpc)?;
//!     let info = client.put_blob(b"hello world".to_vec()).await?;
//!     println!("certified in batch {}", info.batch_header_hash_hex());
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod auth;
pub mod client;
pub mod codec;
pub mod config;
pub mod disperser;
pub mod error;
pub mod event;
pub mod payment;

pub use auth::{BlobRequestSigner, LocalBlobRequestSigner};
pub use client::{DaClient, PendingDispersal};
pub use codec::{decode_blob, encode_blob};
pub use config::ClientConfig;
pub use disperser::{BlobInfo, BlobStatus, DisperserClient, DisperserConfig, DisperserRpc};
pub use error::{Error, Result};
pub use event::{DispersalEvent, DispersalEventsChannel};
pub use payment::{
    Accountant, AccountantStats, BillingParams, OnDemandPayment, PaymentAuthorization,
    Reservation,
};
