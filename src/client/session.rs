//! Status tracking for one dispersed blob.

use crate::disperser::{BlobInfo, BlobStatus, BlobStatusReply};
use crate::error::{Error, Result};
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How a dispersal ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    /// Certificate obtained.
    Certified(Box<BlobInfo>),
    /// The network reported FAILED.
    Failed,
    /// A quorum could not attest to the blob.
    InsufficientSignatures,
    /// The disperser sent something that cannot be acted on.
    ProtocolViolation(String),
}

impl Terminal {
    /// Convert into the caller-facing result.
    ///
    /// # Errors
    ///
    /// Returns the error matching the failure kind.
    pub fn into_result(self, request_id: &str) -> Result<BlobInfo> {
        match self {
            Self::Certified(info) => Ok(*info),
            Self::Failed => Err(Error::DispersalFailed {
                request_id: request_id.to_string(),
            }),
            Self::InsufficientSignatures => Err(Error::InsufficientSignatures {
                request_id: request_id.to_string(),
            }),
            Self::ProtocolViolation(message) => Err(Error::Protocol(message)),
        }
    }
}

/// Polling state for one request id.
///
/// Once a terminal outcome is reached further observations are ignored and
/// the same outcome is returned.
#[derive(Debug)]
pub struct DispersalSession {
    request_id: String,
    status: Option<BlobStatus>,
    deadline: Instant,
    confirmation_deadline: Instant,
    poll_interval: Duration,
    wait_for_finalization: bool,
    terminal: Option<Terminal>,
    logged_processing: bool,
    logged_confirmed: bool,
}

impl DispersalSession {
    /// Start tracking `request_id`; the deadline runs from now.
    #[must_use]
    pub fn new(
        request_id: &[u8],
        poll_interval: Duration,
        status_query_timeout: Duration,
        wait_for_finalization: bool,
    ) -> Self {
        let deadline = Instant::now() + status_query_timeout;
        Self {
            request_id: hex::encode(request_id),
            status: None,
            deadline,
            confirmation_deadline: deadline,
            poll_interval,
            wait_for_finalization,
            terminal: None,
            logged_processing: false,
            logged_confirmed: false,
        }
    }

    /// Give up earlier if the blob has not left PROCESSING or DISPERSING
    /// within `confirmation_timeout`. Values past the overall deadline are
    /// clamped to it.
    #[must_use]
    pub fn with_confirmation_timeout(mut self, confirmation_timeout: Duration) -> Self {
        self.confirmation_deadline = (Instant::now() + confirmation_timeout).min(self.deadline);
        self
    }

    /// Hex-encoded request id.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Last observed status.
    #[must_use]
    pub fn status(&self) -> Option<BlobStatus> {
        self.status
    }

    /// When polling gives up.
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// When a blob still waiting to be confirmed is given up on.
    #[must_use]
    pub fn confirmation_deadline(&self) -> Instant {
        self.confirmation_deadline
    }

    /// Time between polls.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// The terminal outcome, if reached.
    #[must_use]
    pub fn terminal(&self) -> Option<&Terminal> {
        self.terminal.as_ref()
    }

    /// Feed one status reply. Returns the terminal outcome once reached.
    pub fn observe(&mut self, reply: BlobStatusReply) -> Option<&Terminal> {
        if self.terminal.is_some() {
            return self.terminal.as_ref();
        }
        self.status = Some(reply.status);

        let outcome = match reply.status {
            BlobStatus::Processing | BlobStatus::Dispersing => {
                if self.logged_processing {
                    debug!("Blob {} is still being processed", self.request_id);
                } else {
                    info!(
                        "Blob submitted, waiting for dispersal (request id={})",
                        self.request_id
                    );
                    self.logged_processing = true;
                }
                None
            }
            BlobStatus::Confirmed if self.wait_for_finalization => {
                if self.logged_confirmed {
                    debug!("Blob {} still waiting for finalization", self.request_id);
                } else {
                    info!(
                        "Blob confirmed, waiting for finalization (request id={})",
                        self.request_id
                    );
                    self.logged_confirmed = true;
                }
                None
            }
            BlobStatus::Confirmed | BlobStatus::Finalized => Some(certified(reply)),
            BlobStatus::Failed => {
                warn!("Blob {} failed dispersal", self.request_id);
                Some(Terminal::Failed)
            }
            BlobStatus::InsufficientSignatures => {
                warn!("Blob {} got insufficient signatures", self.request_id);
                Some(Terminal::InsufficientSignatures)
            }
            BlobStatus::Unknown => Some(Terminal::ProtocolViolation(format!(
                "received unknown blob status for request id {}",
                self.request_id
            ))),
        };

        self.terminal = outcome;
        self.terminal.as_ref()
    }

    /// Error to return when the confirmation deadline passes.
    ///
    /// `None` unless the last status seen was PROCESSING or DISPERSING; a
    /// blob that is confirmed, or has not been polled yet, keeps going.
    #[must_use]
    pub fn confirmation_timeout_error(&self) -> Option<Error> {
        if self.terminal.is_some() {
            return None;
        }
        match self.status {
            Some(status @ (BlobStatus::Processing | BlobStatus::Dispersing)) => {
                Some(Error::ConfirmationTimeout {
                    request_id: self.request_id.clone(),
                    last_status: status,
                })
            }
            _ => None,
        }
    }

    /// Error returned when the deadline expires first.
    #[must_use]
    pub fn timeout_error(&self) -> Error {
        Error::Timeout {
            request_id: self.request_id.clone(),
            last_status: self.status,
        }
    }
}

fn certified(reply: BlobStatusReply) -> Terminal {
    match reply.info {
        Some(info) => Terminal::Certified(Box::new(info)),
        None => Terminal::ProtocolViolation(format!(
            "blob status {:?} carried no certificate",
            reply.status
        )),
    }
}
