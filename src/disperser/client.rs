//! Low-level disperser client.
//!
//! Wraps a [`DisperserRpc`] with request validation, the nonce-signing
//! handshake and metered dispersal. Status polling lives one level up in
//! [`DaClient`](crate::client::DaClient).

use super::messages::{
    AuthenticatedReply, AuthenticatedRequest, AuthenticationData, BlobStatus, BlobStatusReply,
    BlobStatusRequest, DisperseBlobReply, DisperseBlobRequest,
};
use super::rpc::DisperserRpc;
use crate::auth::{sign_challenge, BlobRequestSigner};
use crate::error::{Error, Result};
use crate::payment::Accountant;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Bytes per symbol (one BN254 field element).
pub const BYTES_PER_SYMBOL: usize = 32;

/// BN254 scalar field modulus, big-endian.
const BN254_MODULUS: [u8; BYTES_PER_SYMBOL] = [
    0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29, 0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81, 0x58, 0x5d,
    0x28, 0x33, 0xe8, 0x48, 0x79, 0xb9, 0x70, 0x91, 0x43, 0xe1, 0xf5, 0x93, 0xf0, 0x00, 0x00, 0x01,
];

/// Configuration for the disperser client.
#[derive(Debug, Clone)]
pub struct DisperserConfig {
    /// Disperser hostname.
    pub hostname: String,
    /// Disperser port.
    pub port: u16,
    /// Deadline for a single dispersal call, handshake included.
    pub timeout: Duration,
    /// Whether the transport should use TLS.
    pub use_secure_grpc: bool,
}

impl Default for DisperserConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            port: 32001,
            timeout: Duration::from_secs(30),
            use_secure_grpc: true,
        }
    }
}

impl DisperserConfig {
    /// `host:port` of the disperser.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

/// Number of symbols an encoded blob occupies.
#[must_use]
pub fn symbol_count(data: &[u8]) -> u64 {
    data.len().div_ceil(BYTES_PER_SYMBOL) as u64
}

/// Check that `data` is non-empty and that every 32-byte chunk, zero-padded
/// on the right, is a canonical BN254 field element.
///
/// # Errors
///
/// Returns an invalid-argument error naming the first offending chunk.
pub fn check_field_elements(data: &[u8]) -> Result<()> {
    if data.is_empty() {
        return Err(Error::InvalidArgument("blob data is empty".to_string()));
    }
    for (index, chunk) in data.chunks(BYTES_PER_SYMBOL).enumerate() {
        let mut element = [0u8; BYTES_PER_SYMBOL];
        element[..chunk.len()].copy_from_slice(chunk);
        if element >= BN254_MODULUS {
            return Err(Error::InvalidArgument(format!(
                "encountered an error to convert a 32-bytes into a valid field element, \
                 please use the correct format where every 32bytes(big-endian) is less than \
                 21888242871839275222246405745257275088548364400416034343698204186575808495617 \
                 (chunk {index})"
            )));
        }
    }
    Ok(())
}

/// Client for the disperser's dispersal and status calls.
pub struct DisperserClient {
    config: DisperserConfig,
    rpc: Arc<dyn DisperserRpc>,
    signer: Option<Arc<dyn BlobRequestSigner>>,
    accountant: Option<Arc<Accountant>>,
}

impl DisperserClient {
    /// Create a client over an established transport.
    #[must_use]
    pub fn new(config: DisperserConfig, rpc: Arc<dyn DisperserRpc>) -> Self {
        debug!("Creating disperser client for {}", config.endpoint());
        Self {
            config,
            rpc,
            signer: None,
            accountant: None,
        }
    }

    /// Attach the signer used for authenticated and metered dispersal.
    #[must_use]
    pub fn with_signer(mut self, signer: Arc<dyn BlobRequestSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Attach the accountant used for metered dispersal.
    #[must_use]
    pub fn with_accountant(mut self, accountant: Arc<Accountant>) -> Self {
        self.accountant = Some(accountant);
        self
    }

    /// Client configuration.
    #[must_use]
    pub fn config(&self) -> &DisperserConfig {
        &self.config
    }

    /// Whether a signer is attached.
    #[must_use]
    pub fn has_signer(&self) -> bool {
        self.signer.is_some()
    }

    /// The attached accountant, if any.
    #[must_use]
    pub fn accountant(&self) -> Option<&Arc<Accountant>> {
        self.accountant.as_ref()
    }

    /// Disperse without authentication.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob is invalid, the call fails or times out.
    pub async fn disperse_blob(
        &self,
        data: Bytes,
        quorums: &[u8],
    ) -> Result<(BlobStatus, Vec<u8>)> {
        check_field_elements(&data)?;
        let request = DisperseBlobRequest {
            data,
            custom_quorum_numbers: widen(quorums),
            account_id: String::new(),
            payment: None,
        };
        let reply = self.with_deadline(self.rpc.disperse_blob(request)).await?;
        Ok((reply.result, reply.request_id))
    }

    /// Disperse with the nonce-signing handshake.
    ///
    /// Sends the request, signs the returned challenge, and expects the
    /// disperser to accept the blob as [`BlobStatus::Processing`].
    ///
    /// # Errors
    ///
    /// Returns an invalid-argument error if no signer is attached or the blob
    /// is invalid, a protocol error on an unexpected reply, or the transport
    /// or RPC error that interrupted the exchange.
    pub async fn disperse_blob_authenticated(
        &self,
        data: Bytes,
        quorums: &[u8],
    ) -> Result<(BlobStatus, Vec<u8>)> {
        let signer = self.signer.as_ref().ok_or_else(|| {
            Error::InvalidArgument("uninitialized signer for authenticated dispersal".to_string())
        })?;
        check_field_elements(&data)?;

        let request = DisperseBlobRequest {
            data,
            custom_quorum_numbers: widen(quorums),
            account_id: signer.account_id()?,
            payment: None,
        };
        let reply = self
            .with_deadline(self.handshake(signer.as_ref(), request))
            .await?;
        accepted(reply)
    }

    /// Disperse a blob paid for through the local accountant.
    ///
    /// # Errors
    ///
    /// Returns an invalid-argument error if no signer or accountant is
    /// attached, an admission denial if the blob cannot be paid for, or the
    /// error of the dispersal call.
    pub async fn disperse_paid_blob(
        &self,
        data: Bytes,
        quorums: &[u8],
    ) -> Result<(BlobStatus, Vec<u8>)> {
        let signer = self.signer.as_ref().ok_or_else(|| {
            Error::InvalidArgument("uninitialized signer for paid dispersal".to_string())
        })?;
        let accountant = self.accountant.as_ref().ok_or_else(|| {
            Error::InvalidArgument("no accountant configured for paid dispersal".to_string())
        })?;
        check_field_elements(&data)?;

        let payment = accountant.account_blob(symbol_count(&data), quorums)?;
        debug!(
            "Paid dispersal authorized: bin={}, cumulative={}",
            payment.bin_index, payment.cumulative_payment
        );

        let request = DisperseBlobRequest {
            data,
            custom_quorum_numbers: widen(quorums),
            account_id: signer.account_id()?,
            payment: Some(payment),
        };
        let reply = self.with_deadline(self.rpc.disperse_blob(request)).await?;
        accepted(reply)
    }

    /// Query the status of a dispersed blob.
    ///
    /// # Errors
    ///
    /// Returns the transport or RPC error of the call.
    pub async fn get_blob_status(&self, request_id: &[u8]) -> Result<BlobStatusReply> {
        self.rpc
            .get_blob_status(BlobStatusRequest {
                request_id: request_id.to_vec(),
            })
            .await
    }

    async fn handshake(
        &self,
        signer: &dyn BlobRequestSigner,
        request: DisperseBlobRequest,
    ) -> Result<DisperseBlobReply> {
        let mut stream = self.rpc.disperse_blob_authenticated().await?;

        stream
            .send(AuthenticatedRequest::DisperseRequest(request))
            .await?;

        let header = match stream.recv().await? {
            AuthenticatedReply::BlobAuthHeader(header) => header,
            AuthenticatedReply::DisperseReply(_) => {
                return Err(Error::Protocol(
                    "expected auth header, got disperse reply".to_string(),
                ))
            }
        };
        debug!("Received auth challenge {}", header.challenge_parameter);

        let signature = sign_challenge(signer, header.challenge_parameter)?;
        stream
            .send(AuthenticatedRequest::AuthenticationData(AuthenticationData {
                authentication_data: signature.to_vec(),
            }))
            .await?;

        match stream.recv().await? {
            AuthenticatedReply::DisperseReply(reply) => Ok(reply),
            AuthenticatedReply::BlobAuthHeader(_) => Err(Error::Protocol(
                "expected disperse reply, got auth header".to_string(),
            )),
        }
    }

    async fn with_deadline<T>(
        &self,
        call: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.config.timeout, call)
            .await
            .map_err(|_| {
                Error::Transport(format!(
                    "dispersal to {} timed out after {:?}",
                    self.config.endpoint(),
                    self.config.timeout
                ))
            })?
    }
}

fn accepted(reply: DisperseBlobReply) -> Result<(BlobStatus, Vec<u8>)> {
    if reply.result != BlobStatus::Processing {
        return Err(Error::Protocol(format!(
            "expected processing status after dispersal, got {:?}",
            reply.result
        )));
    }
    info!(
        "Blob accepted by disperser (request id={})",
        hex::encode(&reply.request_id)
    );
    Ok((reply.result, reply.request_id))
}

fn widen(quorums: &[u8]) -> Vec<u32> {
    quorums.iter().map(|&q| u32::from(q)).collect()
}
