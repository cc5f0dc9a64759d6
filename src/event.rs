//! Dispersal event system.

use crate::disperser::BlobStatus;
use tokio::sync::broadcast;

/// Events emitted while blobs move through dispersal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispersalEvent {
    /// The disperser accepted the blob.
    Accepted {
        /// Hex-encoded request id.
        request_id: String,
    },

    /// A status poll observed a new status.
    StatusChanged {
        /// Hex-encoded request id.
        request_id: String,
        /// Newly observed status.
        status: BlobStatus,
    },

    /// The blob reached terminal success.
    Finalized {
        /// Hex-encoded request id.
        request_id: String,
        /// Hex-encoded batch header hash of the certificate.
        batch_header_hash: String,
    },

    /// Dispersal ended with an error.
    Failed {
        /// Hex-encoded request id, if the blob was accepted.
        request_id: Option<String>,
        /// Error message.
        message: String,
    },
}

/// Channel for receiving dispersal events.
pub type DispersalEventsChannel = broadcast::Receiver<DispersalEvent>;

/// Sender for dispersal events.
pub type DispersalEventsSender = broadcast::Sender<DispersalEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel() -> (DispersalEventsSender, DispersalEventsChannel) {
    broadcast::channel(256)
}
