//! High-level dispersal client.
//!
//! [`DaClient`] takes raw payloads, encodes them, disperses them through the
//! authenticated handshake (or the metered path when an accountant is
//! attached) and polls until the network certifies the blob.
//!
//! # Example
//!
//! ```rust,ignore
//! use da_client::{ClientConfig, DaClient};
//!
//! let client = DaClient::new(ClientConfig::from_file(path)?, rpc)?;
//! let mut events = client.subscribe_events();
//!
//! let pending = client.put_blob_async(b"hello world".to_vec());
//! let info = pending.wait().await?;
//! println!("certified in batch {}", info.batch_header_hash_hex());
//! ```
//!
//! # Lifecycle
//!
//! ```text
//! handshake ──▶ PROCESSING ──▶ DISPERSING ──▶ CONFIRMED ──▶ FINALIZED
//!     │              │              │              │
//!  cancel()       FAILED / INSUFFICIENT_SIGNATURES / UNKNOWN
//! ```
//!
//! Cancellation only interrupts the handshake. After acceptance polling
//! ends early only through the confirmation timeout (blob still PROCESSING
//! or DISPERSING) or the overall status deadline.

mod pending;
mod session;

pub use pending::PendingDispersal;
pub use session::{DispersalSession, Terminal};

use crate::codec::encode_blob;
use crate::config::ClientConfig;
use crate::disperser::{BlobInfo, DisperserClient, DisperserRpc};
use crate::error::{Error, Result};
use crate::event::{
    create_event_channel, DispersalEvent, DispersalEventsChannel, DispersalEventsSender,
};
use crate::payment::{Accountant, REQUIRED_QUORUMS};
use bytes::Bytes;
use pending::{cancelled, dispersal_channels};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Dispersal settings shared by every blob.
#[derive(Debug, Clone)]
struct DispersalSettings {
    custom_quorum_ids: Vec<u8>,
    status_query_timeout: std::time::Duration,
    confirmation_timeout: std::time::Duration,
    status_query_retry_interval: std::time::Duration,
    response_timeout: std::time::Duration,
    wait_for_finalization: bool,
}

struct Inner {
    settings: DispersalSettings,
    disperser: DisperserClient,
    events_tx: DispersalEventsSender,
}

/// Client for dispersing blobs and waiting for their certificates.
#[derive(Clone)]
pub struct DaClient {
    inner: Arc<Inner>,
}

impl DaClient {
    /// Create a client from configuration over an established transport.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configuration is invalid.
    pub fn new(config: ClientConfig, rpc: Arc<dyn DisperserRpc>) -> Result<Self> {
        Self::build(config, rpc, None)
    }

    /// Create a client that pays for blobs through `accountant`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configuration is invalid or has
    /// no signer key.
    pub fn with_accountant(
        config: ClientConfig,
        rpc: Arc<dyn DisperserRpc>,
        accountant: Arc<Accountant>,
    ) -> Result<Self> {
        if config.signer_private_key_hex.is_empty() {
            return Err(Error::Config(
                "paid dispersal requires a signer private key".to_string(),
            ));
        }
        Self::build(config, rpc, Some(accountant))
    }

    fn build(
        config: ClientConfig,
        rpc: Arc<dyn DisperserRpc>,
        accountant: Option<Arc<Accountant>>,
    ) -> Result<Self> {
        config.validate()?;

        let mut disperser = DisperserClient::new(config.disperser_config()?, rpc);
        if let Some(signer) = config.signer()? {
            disperser = disperser.with_signer(signer);
        } else {
            warn!("No signer key configured; dispersal will fail until one is set");
        }
        if let Some(accountant) = accountant {
            disperser = disperser.with_accountant(accountant);
        }

        let (events_tx, _) = create_event_channel();
        info!("DA client created for {}", config.rpc);

        Ok(Self {
            inner: Arc::new(Inner {
                settings: DispersalSettings {
                    custom_quorum_ids: config.custom_quorum_ids.clone(),
                    status_query_timeout: config.status_query_timeout(),
                    confirmation_timeout: config.confirmation_timeout(),
                    status_query_retry_interval: config.status_query_retry_interval(),
                    response_timeout: config.response_timeout(),
                    wait_for_finalization: config.wait_for_finalization,
                },
                disperser,
                events_tx,
            }),
        })
    }

    /// Subscribe to dispersal events.
    #[must_use]
    pub fn subscribe_events(&self) -> DispersalEventsChannel {
        self.inner.events_tx.subscribe()
    }

    /// The underlying disperser client.
    #[must_use]
    pub fn disperser(&self) -> &DisperserClient {
        &self.inner.disperser
    }

    /// Disperse `data` and wait for its certificate.
    ///
    /// # Errors
    ///
    /// See [`PendingDispersal::wait`].
    pub async fn put_blob(&self, data: impl Into<Bytes>) -> Result<BlobInfo> {
        self.put_blob_async(data).wait().await
    }

    /// Start dispersing `data` in the background.
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn put_blob_async(&self, data: impl Into<Bytes>) -> PendingDispersal {
        let data = data.into();
        let (slots, parts) = dispersal_channels();
        let inner = Arc::clone(&self.inner);
        let cancel_rx = parts.cancel_rx.clone();

        let task = tokio::spawn(async move {
            let outcome = inner.disperse(data, cancel_rx).await;
            slots.complete(outcome);
        });
        parts.into_pending(task)
    }
}

impl Inner {
    async fn disperse(&self, data: Bytes, cancel_rx: watch::Receiver<bool>) -> Result<BlobInfo> {
        let outcome = self.try_disperse(data, cancel_rx).await;
        match &outcome {
            Ok(info) => debug!(
                "Blob certified in batch {}",
                info.batch_header_hash_hex()
            ),
            Err(e) => {
                let request_id = match e {
                    Error::Timeout { request_id, .. }
                    | Error::ConfirmationTimeout { request_id, .. }
                    | Error::DispersalFailed { request_id }
                    | Error::InsufficientSignatures { request_id } => Some(request_id.clone()),
                    _ => None,
                };
                self.emit(DispersalEvent::Failed {
                    request_id,
                    message: e.to_string(),
                });
            }
        }
        outcome
    }

    async fn try_disperse(
        &self,
        data: Bytes,
        cancel_rx: watch::Receiver<bool>,
    ) -> Result<BlobInfo> {
        let encoded = encode_blob(&data)?;
        debug!(
            "Dispersing blob ({} bytes raw, {} encoded)",
            data.len(),
            encoded.len()
        );

        let custom = &self.settings.custom_quorum_ids;
        let handshake = async {
            if self.disperser.accountant().is_some() {
                // Payments are accounted against every quorum the blob lands in.
                let mut quorums = REQUIRED_QUORUMS.to_vec();
                quorums.extend_from_slice(custom);
                self.disperser.disperse_paid_blob(encoded, &quorums).await
            } else {
                self.disperser
                    .disperse_blob_authenticated(encoded, custom)
                    .await
            }
        };

        let (_, request_id) = tokio::select! {
            result = handshake => result?,
            () = cancelled(cancel_rx) => {
                info!("Dispersal cancelled during handshake");
                return Err(Error::Cancelled);
            }
        };

        let mut session = DispersalSession::new(
            &request_id,
            self.settings.status_query_retry_interval,
            self.settings.status_query_timeout,
            self.settings.wait_for_finalization,
        )
        .with_confirmation_timeout(self.settings.confirmation_timeout);
        self.emit(DispersalEvent::Accepted {
            request_id: session.request_id().to_string(),
        });

        let info = self.poll(&request_id, &mut session).await?;
        self.emit(DispersalEvent::Finalized {
            request_id: session.request_id().to_string(),
            batch_header_hash: info.batch_header_hash_hex(),
        });
        Ok(info)
    }

    async fn poll(&self, request_id: &[u8], session: &mut DispersalSession) -> Result<BlobInfo> {
        let deadline = session.deadline();
        let interval = session.poll_interval();
        let confirmation = tokio::time::sleep_until(session.confirmation_deadline());

        let polling = async {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tokio::pin!(confirmation);
            let mut confirmation_armed = true;

            loop {
                tokio::select! {
                    () = &mut confirmation, if confirmation_armed => {
                        confirmation_armed = false;
                        if let Some(err) = session.confirmation_timeout_error() {
                            warn!("{err}");
                            return Err(err);
                        }
                        continue;
                    }
                    _ = ticker.tick() => {}
                }

                let reply = match tokio::time::timeout(
                    self.settings.response_timeout,
                    self.disperser.get_blob_status(request_id),
                )
                .await
                {
                    Ok(Ok(reply)) => reply,
                    Ok(Err(e)) => {
                        warn!(
                            "Unable to retrieve blob dispersal status, will retry (request id={}): {e}",
                            session.request_id()
                        );
                        continue;
                    }
                    Err(_) => {
                        warn!(
                            "Blob status query timed out after {:?}, will retry (request id={})",
                            self.settings.response_timeout,
                            session.request_id()
                        );
                        continue;
                    }
                };

                if session.status() != Some(reply.status) {
                    self.emit(DispersalEvent::StatusChanged {
                        request_id: session.request_id().to_string(),
                        status: reply.status,
                    });
                }

                if let Some(terminal) = session.observe(reply) {
                    return terminal.clone().into_result(session.request_id());
                }
            }
        };

        match tokio::time::timeout_at(deadline, polling).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let err = session.timeout_error();
                warn!("{err}");
                Err(err)
            }
        }
    }

    fn emit(&self, event: DispersalEvent) {
        // No subscribers is fine.
        let _ = self.events_tx.send(event);
    }
}
