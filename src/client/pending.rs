//! Handle to an in-flight dispersal.

use crate::disperser::BlobInfo;
use crate::error::{Error, Result};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

/// Result of [`DaClient::put_blob_async`](super::DaClient::put_blob_async).
///
/// Exactly one of the result and error slots is filled, once, when the
/// dispersal task ends.
#[derive(Debug)]
pub struct PendingDispersal {
    result_rx: oneshot::Receiver<BlobInfo>,
    error_rx: oneshot::Receiver<Error>,
    cancel_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Task-side half of a [`PendingDispersal`].
pub(crate) struct DispersalSlots {
    result_tx: oneshot::Sender<BlobInfo>,
    error_tx: oneshot::Sender<Error>,
}

impl DispersalSlots {
    /// Fill the slot matching `outcome`; the other is dropped unfilled.
    pub(crate) fn complete(self, outcome: Result<BlobInfo>) {
        // The caller may have dropped the handle; nothing to deliver to then.
        match outcome {
            Ok(info) => {
                let _ = self.result_tx.send(info);
            }
            Err(e) => {
                let _ = self.error_tx.send(e);
            }
        }
    }
}

/// Create the channels shared by a dispersal task and its handle.
pub(crate) fn dispersal_channels() -> (DispersalSlots, PendingParts) {
    let (result_tx, result_rx) = oneshot::channel();
    let (error_tx, error_rx) = oneshot::channel();
    let (cancel_tx, cancel_rx) = watch::channel(false);
    (
        DispersalSlots {
            result_tx,
            error_tx,
        },
        PendingParts {
            result_rx,
            error_rx,
            cancel_tx,
            cancel_rx,
        },
    )
}

/// Handle-side channels before the task is spawned.
pub(crate) struct PendingParts {
    result_rx: oneshot::Receiver<BlobInfo>,
    error_rx: oneshot::Receiver<Error>,
    cancel_tx: watch::Sender<bool>,
    pub(crate) cancel_rx: watch::Receiver<bool>,
}

impl PendingParts {
    pub(crate) fn into_pending(self, task: JoinHandle<()>) -> PendingDispersal {
        PendingDispersal {
            result_rx: self.result_rx,
            error_rx: self.error_rx,
            cancel_tx: self.cancel_tx,
            task,
        }
    }
}

impl PendingDispersal {
    /// Abort the dispersal if it is still in the handshake. Once the blob is
    /// accepted only the status deadline ends polling.
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    /// Whether the dispersal task has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the outcome.
    ///
    /// # Errors
    ///
    /// Returns the dispersal error, or a protocol error if the task ended
    /// without reporting.
    pub async fn wait(self) -> Result<BlobInfo> {
        let Self {
            mut result_rx,
            mut error_rx,
            cancel_tx,
            task: _,
        } = self;
        // Keep the cancel channel open so waiting is not mistaken for cancelling.
        let _cancel_tx = cancel_tx;

        tokio::select! {
            Ok(info) = &mut result_rx => Ok(info),
            Ok(err) = &mut error_rx => Err(err),
            else => Err(Error::Protocol(
                "dispersal task ended without reporting an outcome".to_string(),
            )),
        }
    }
}

/// Resolves once cancellation is requested. Never resolves if the handle is
/// dropped without cancelling.
pub(crate) async fn cancelled(mut cancel_rx: watch::Receiver<bool>) {
    loop {
        if *cancel_rx.borrow_and_update() {
            return;
        }
        if cancel_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
