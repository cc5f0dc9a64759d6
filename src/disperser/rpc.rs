//! Transport seam to the disperser.
//!
//! The client only needs three calls. Implementations wrap whatever RPC stack
//! talks to the disperser and map failures onto [`Error::Transport`] (could
//! not reach the server) or [`Error::Rpc`] (the server answered with an error).
//!
//! [`Error::Transport`]: crate::Error::Transport
//! [`Error::Rpc`]: crate::Error::Rpc

use super::messages::{
    AuthenticatedReply, AuthenticatedRequest, BlobStatusReply, BlobStatusRequest,
    DisperseBlobReply, DisperseBlobRequest,
};
use crate::error::Result;
use async_trait::async_trait;

/// Remote disperser API.
#[async_trait]
pub trait DisperserRpc: Send + Sync {
    /// Unary dispersal, relying on server-side admission only.
    async fn disperse_blob(&self, request: DisperseBlobRequest) -> Result<DisperseBlobReply>;

    /// Open the bidirectional stream used by the authentication handshake.
    async fn disperse_blob_authenticated(&self) -> Result<Box<dyn AuthenticatedStream>>;

    /// Query the status of a previously dispersed blob.
    async fn get_blob_status(&self, request: BlobStatusRequest) -> Result<BlobStatusReply>;
}

/// One authenticated dispersal exchange.
#[async_trait]
pub trait AuthenticatedStream: Send {
    /// Send the next client message.
    async fn send(&mut self, request: AuthenticatedRequest) -> Result<()>;

    /// Receive the next server message.
    async fn recv(&mut self) -> Result<AuthenticatedReply>;
}
