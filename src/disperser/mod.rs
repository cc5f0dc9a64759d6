//! Disperser protocol: messages, transport seam and the low-level client.
//!
//! The authenticated dispersal exchange:
//!
//! ```text
//! client                                   disperser
//!   │  DisperseRequest{data, quorums, account} │
//!   │ ───────────────────────────────────────▶ │
//!   │           BlobAuthHeader{nonce}          │
//!   │ ◀─────────────────────────────────────── │
//!   │  AuthenticationData{sign(keccak(nonce))} │
//!   │ ───────────────────────────────────────▶ │
//!   │   DisperseReply{PROCESSING, request_id}  │
//!   │ ◀─────────────────────────────────────── │
//! ```

mod client;
mod messages;
mod rpc;

pub use client::{
    check_field_elements, symbol_count, DisperserClient, DisperserConfig, BYTES_PER_SYMBOL,
};
pub use messages::{
    AuthenticatedReply, AuthenticatedRequest, AuthenticationData, BatchHeader, BatchMetadata,
    BlobAuthHeader, BlobHeader, BlobInfo, BlobQuorumParam, BlobStatus, BlobStatusReply,
    BlobStatusRequest, BlobVerificationProof, DisperseBlobReply, DisperseBlobRequest,
    G1Commitment,
};
pub use rpc::{AuthenticatedStream, DisperserRpc};
