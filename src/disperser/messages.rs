//! Messages exchanged with the disperser.
//!
//! These mirror the disperser's RPC schema. Serialization onto the wire is
//! left to the [`DisperserRpc`](super::DisperserRpc) implementation.

use crate::payment::PaymentAuthorization;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Status of a blob as reported by the disperser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlobStatus {
    /// Unrecognized status.
    #[default]
    Unknown,
    /// Accepted, not yet batched.
    Processing,
    /// Being sent to network nodes.
    Dispersing,
    /// Included in a batch, awaiting finalization.
    Confirmed,
    /// Irreversible; certificate available.
    Finalized,
    /// The network rejected the blob.
    Failed,
    /// A quorum could not attest to the blob.
    InsufficientSignatures,
}

impl BlobStatus {
    /// Decode the wire enum value. Unknown codes map to [`BlobStatus::Unknown`].
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Processing,
            2 => Self::Confirmed,
            3 => Self::Failed,
            4 => Self::Finalized,
            5 => Self::InsufficientSignatures,
            6 => Self::Dispersing,
            _ => Self::Unknown,
        }
    }

    /// The wire enum value.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Unknown => 0,
            Self::Processing => 1,
            Self::Confirmed => 2,
            Self::Failed => 3,
            Self::Finalized => 4,
            Self::InsufficientSignatures => 5,
            Self::Dispersing => 6,
        }
    }

    /// Whether polling stops at this status regardless of configuration.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Finalized | Self::Failed | Self::InsufficientSignatures | Self::Unknown
        )
    }
}

/// Initial dispersal request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisperseBlobRequest {
    /// Encoded blob; every 32-byte chunk is a valid field element.
    pub data: Bytes,
    /// Quorums beyond the network's required ones.
    pub custom_quorum_numbers: Vec<u32>,
    /// Account submitting the blob; empty for unauthenticated dispersal.
    pub account_id: String,
    /// Payment for metered dispersal.
    pub payment: Option<PaymentAuthorization>,
}

/// Challenge issued by the disperser during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobAuthHeader {
    /// Nonce to sign, hashed as 4 big-endian bytes.
    pub challenge_parameter: u32,
}

/// Signed response to a [`BlobAuthHeader`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationData {
    /// 65-byte recoverable signature.
    pub authentication_data: Vec<u8>,
}

/// Client-to-server message on the authenticated stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthenticatedRequest {
    /// Opens the exchange.
    DisperseRequest(DisperseBlobRequest),
    /// Answers the challenge.
    AuthenticationData(AuthenticationData),
}

/// Server-to-client message on the authenticated stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthenticatedReply {
    /// The challenge.
    BlobAuthHeader(BlobAuthHeader),
    /// The final result.
    DisperseReply(DisperseBlobReply),
}

/// Result of a dispersal request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisperseBlobReply {
    /// Initial status of the blob.
    pub result: BlobStatus,
    /// Identifier used for status queries.
    pub request_id: Vec<u8>,
}

/// Status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobStatusRequest {
    /// Identifier returned at dispersal.
    pub request_id: Vec<u8>,
}

/// Status query result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobStatusReply {
    /// Current status.
    pub status: BlobStatus,
    /// Certificate, present once the blob is confirmed.
    pub info: Option<BlobInfo>,
}

/// Certificate proving a blob's inclusion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobInfo {
    /// Header as committed in the batch.
    pub blob_header: BlobHeader,
    /// Inclusion proof against the batch.
    pub blob_verification_proof: BlobVerificationProof,
}

impl BlobInfo {
    /// Hex encoding of the batch header hash, `0x`-prefixed.
    #[must_use]
    pub fn batch_header_hash_hex(&self) -> String {
        format!(
            "0x{}",
            hex::encode(
                &self
                    .blob_verification_proof
                    .batch_metadata
                    .batch_header_hash
            )
        )
    }
}

/// G1 point commitment coordinates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct G1Commitment {
    /// X coordinate bytes.
    pub x: Vec<u8>,
    /// Y coordinate bytes.
    pub y: Vec<u8>,
}

/// Header of a dispersed blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobHeader {
    /// Polynomial commitment to the blob.
    pub commitment: G1Commitment,
    /// Length in symbols.
    pub data_length: u32,
    /// Per-quorum security parameters.
    pub blob_quorum_params: Vec<BlobQuorumParam>,
}

/// Security parameters for one quorum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobQuorumParam {
    /// Quorum id.
    pub quorum_number: u32,
    /// Adversary threshold in percent.
    pub adversary_threshold_percentage: u32,
    /// Confirmation threshold in percent.
    pub confirmation_threshold_percentage: u32,
    /// Chunk length in symbols.
    pub chunk_length: u32,
}

/// Proof that a blob is part of a confirmed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobVerificationProof {
    /// On-chain batch id.
    pub batch_id: u32,
    /// Position of the blob in the batch.
    pub blob_index: u32,
    /// Batch metadata.
    pub batch_metadata: BatchMetadata,
    /// Merkle inclusion proof.
    pub inclusion_proof: Vec<u8>,
    /// Index of each blob quorum within the batch quorums.
    pub quorum_indexes: Vec<u8>,
}

/// Metadata of a confirmed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMetadata {
    /// Batch header.
    pub batch_header: BatchHeader,
    /// Hash of the non-signer record.
    pub signatory_record_hash: Vec<u8>,
    /// Fee paid for the batch.
    pub fee: Vec<u8>,
    /// Block the batch was confirmed in.
    pub confirmation_block_number: u32,
    /// Hash of the batch header.
    pub batch_header_hash: Vec<u8>,
}

/// Header of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchHeader {
    /// Merkle root of the blob headers.
    pub batch_root: Vec<u8>,
    /// Quorums in the batch.
    pub quorum_numbers: Vec<u8>,
    /// Signed stake percentage per quorum.
    pub quorum_signed_percentages: Vec<u8>,
    /// Block the operator set was read at.
    pub reference_block_number: u32,
}
