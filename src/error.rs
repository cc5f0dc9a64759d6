//! Error types for da-client.

use crate::disperser::BlobStatus;
use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in da-client.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error, caught at construction and never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller supplied something unusable (bad blob, missing signer, bad quorums).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Connection or stream failure while talking to the disperser.
    #[error("transport error: {0}")]
    Transport(String),

    /// Error status returned by the disperser, passed through verbatim.
    #[error("disperser rejected request ({code}): {message}")]
    Rpc {
        /// Status code reported by the server.
        code: String,
        /// Message reported by the server.
        message: String,
    },

    /// Neither the reservation nor the on-demand balance covers the blob.
    #[error("admission denied: {0}")]
    AdmissionDenied(String),

    /// Unexpected message shape or status from the disperser.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Overall status-query deadline expired before a terminal status.
    #[error("timed out waiting for blob (request id={request_id}) in status {last_status:?}")]
    Timeout {
        /// Hex-encoded request id.
        request_id: String,
        /// Last status observed before the deadline, if any poll succeeded.
        last_status: Option<BlobStatus>,
    },

    /// The blob was still processing or dispersing when the confirmation
    /// timeout expired; the network may be down.
    #[error("timed out waiting for blob (request id={request_id}) to be confirmed, still {last_status:?}")]
    ConfirmationTimeout {
        /// Hex-encoded request id.
        request_id: String,
        /// Status observed when the timer fired.
        last_status: BlobStatus,
    },

    /// The network reported FAILED for the blob.
    #[error("blob dispersal (request id={request_id}) reached failed status, please resubmit the blob")]
    DispersalFailed {
        /// Hex-encoded request id.
        request_id: String,
    },

    /// A quorum could not attest to the blob.
    #[error("blob dispersal (request id={request_id}) failed with insufficient signatures")]
    InsufficientSignatures {
        /// Hex-encoded request id.
        request_id: String,
    },

    /// Cryptographic error.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// The caller cancelled the dispersal before the handshake completed.
    #[error("dispersal cancelled")]
    Cancelled,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the caller may reasonably retry the same request later.
    ///
    /// Transport failures and deadline expiry say nothing about the blob
    /// itself; everything else will fail the same way again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout { .. } | Self::ConfirmationTimeout { .. }
        )
    }
}
