//! Mock disperser and test harness.

use async_trait::async_trait;
use da_client::auth::{keccak256, verify_challenge};
use da_client::disperser::{
    AuthenticatedReply, AuthenticatedRequest, AuthenticatedStream, BlobAuthHeader,
    BlobStatusReply, BlobStatusRequest, DisperseBlobReply, DisperseBlobRequest,
};
use da_client::{
    Accountant, BlobInfo, BlobRequestSigner, BlobStatus, ClientConfig, DaClient, DisperserRpc,
    Error, LocalBlobRequestSigner, Result,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Behaviour of the mock disperser.
#[derive(Debug, Clone)]
pub struct MockDisperserConfig {
    /// Statuses a new blob reports on successive polls; the last one sticks.
    pub progression: Vec<BlobStatus>,
    /// Number of status polls to fail before answering.
    pub failing_polls: usize,
    /// Number of status polls to stall for an hour before answering.
    pub slow_polls: usize,
    /// Delay before each handshake reply.
    pub handshake_delay: Duration,
    /// Offset added to the nonce when checking signatures. Non-zero makes
    /// the server reject every signature.
    pub nonce_skew: u32,
}

impl Default for MockDisperserConfig {
    fn default() -> Self {
        Self {
            progression: vec![
                BlobStatus::Processing,
                BlobStatus::Dispersing,
                BlobStatus::Confirmed,
                BlobStatus::Finalized,
            ],
            failing_polls: 0,
            slow_polls: 0,
            handshake_delay: Duration::ZERO,
            nonce_skew: 0,
        }
    }
}

#[derive(Debug)]
struct BlobRecord {
    progression: VecDeque<BlobStatus>,
    current: BlobStatus,
    symbols: u32,
    polls: usize,
}

#[derive(Debug, Default)]
struct MockState {
    next_id: u64,
    next_nonce: u32,
    failing_polls: usize,
    slow_polls: usize,
    stalled_polls: usize,
    blobs: HashMap<Vec<u8>, BlobRecord>,
    accepted: Vec<DisperseBlobRequest>,
    rejected_handshakes: usize,
}

#[derive(Debug)]
struct Shared {
    config: MockDisperserConfig,
    state: Mutex<MockState>,
}

impl Shared {
    fn next_nonce(&self) -> u32 {
        let mut state = self.state.lock();
        state.next_nonce = state.next_nonce.wrapping_add(7);
        state.next_nonce
    }

    fn register(&self, request: DisperseBlobRequest) -> Vec<u8> {
        let mut state = self.state.lock();
        state.next_id += 1;
        let request_id = format!("blob-{}", state.next_id).into_bytes();
        let symbols = u32::try_from(request.data.len().div_ceil(32)).unwrap_or(u32::MAX);
        state.blobs.insert(
            request_id.clone(),
            BlobRecord {
                progression: self.config.progression.iter().copied().collect(),
                current: BlobStatus::Processing,
                symbols,
                polls: 0,
            },
        );
        state.accepted.push(request);
        debug!("Mock disperser accepted {}", hex::encode(&request_id));
        request_id
    }
}

/// In-process disperser speaking the authenticated dispersal protocol.
#[derive(Debug, Clone)]
pub struct MockDisperser {
    shared: Arc<Shared>,
}

impl MockDisperser {
    /// Create a mock disperser.
    pub fn new(config: MockDisperserConfig) -> Self {
        let failing_polls = config.failing_polls;
        let slow_polls = config.slow_polls;
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(MockState {
                    next_nonce: 1000,
                    failing_polls,
                    slow_polls,
                    ..Default::default()
                }),
            }),
        }
    }

    /// Requests accepted so far, in order.
    pub fn accepted(&self) -> Vec<DisperseBlobRequest> {
        self.shared.state.lock().accepted.clone()
    }

    /// Handshakes rejected for a bad signature.
    pub fn rejected_handshakes(&self) -> usize {
        self.shared.state.lock().rejected_handshakes
    }

    /// Status polls that were stalled.
    pub fn stalled_polls(&self) -> usize {
        self.shared.state.lock().stalled_polls
    }

    /// Status polls answered for a hex-encoded request id.
    pub fn polls(&self, request_id: &str) -> usize {
        let id = hex::decode(request_id).unwrap_or_default();
        self.shared
            .state
            .lock()
            .blobs
            .get(&id)
            .map_or(0, |b| b.polls)
    }
}

fn certificate(request_id: &[u8], symbols: u32) -> BlobInfo {
    let mut info = BlobInfo::default();
    info.blob_header.data_length = symbols;
    info.blob_verification_proof.batch_metadata.batch_header_hash =
        keccak256(request_id).to_vec();
    info
}

fn unauthenticated(message: impl Into<String>) -> Error {
    Error::Rpc {
        code: "Unauthenticated".to_string(),
        message: message.into(),
    }
}

#[async_trait]
impl DisperserRpc for MockDisperser {
    async fn disperse_blob(&self, request: DisperseBlobRequest) -> Result<DisperseBlobReply> {
        if let Some(payment) = &request.payment {
            if payment.account_id != request.account_id {
                return Err(unauthenticated("payment account does not match request"));
            }
            payment
                .verify()
                .map_err(|e| unauthenticated(format!("invalid payment signature: {e}")))?;
        }
        let request_id = self.shared.register(request);
        Ok(DisperseBlobReply {
            result: BlobStatus::Processing,
            request_id,
        })
    }

    async fn disperse_blob_authenticated(&self) -> Result<Box<dyn AuthenticatedStream>> {
        Ok(Box::new(MockStream {
            shared: Arc::clone(&self.shared),
            request: None,
            nonce: 0,
            outbox: VecDeque::new(),
        }))
    }

    async fn get_blob_status(&self, request: BlobStatusRequest) -> Result<BlobStatusReply> {
        let stall = {
            let mut state = self.shared.state.lock();
            if state.slow_polls > 0 {
                state.slow_polls -= 1;
                state.stalled_polls += 1;
                true
            } else {
                false
            }
        };
        if stall {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        let mut state = self.shared.state.lock();
        if state.failing_polls > 0 {
            state.failing_polls -= 1;
            return Err(Error::Transport("connection reset by peer".to_string()));
        }
        let record = state
            .blobs
            .get_mut(&request.request_id)
            .ok_or_else(|| Error::Rpc {
                code: "NotFound".to_string(),
                message: "unknown request id".to_string(),
            })?;
        record.polls += 1;
        if let Some(next) = record.progression.pop_front() {
            record.current = next;
        }
        let status = record.current;
        let info = matches!(status, BlobStatus::Confirmed | BlobStatus::Finalized)
            .then(|| certificate(&request.request_id, record.symbols));
        Ok(BlobStatusReply { status, info })
    }
}

/// Server side of one authenticated exchange.
struct MockStream {
    shared: Arc<Shared>,
    request: Option<DisperseBlobRequest>,
    nonce: u32,
    outbox: VecDeque<Result<AuthenticatedReply>>,
}

#[async_trait]
impl AuthenticatedStream for MockStream {
    async fn send(&mut self, request: AuthenticatedRequest) -> Result<()> {
        match request {
            AuthenticatedRequest::DisperseRequest(request) if self.request.is_none() => {
                self.nonce = self.shared.next_nonce();
                self.request = Some(request);
                self.outbox
                    .push_back(Ok(AuthenticatedReply::BlobAuthHeader(BlobAuthHeader {
                        challenge_parameter: self.nonce,
                    })));
            }
            AuthenticatedRequest::AuthenticationData(auth) => {
                let Some(request) = self.request.take() else {
                    return Err(Error::Protocol(
                        "authentication data before dispersal request".to_string(),
                    ));
                };
                let expected = self.nonce.wrapping_add(self.shared.config.nonce_skew);
                let reply = match verify_challenge(
                    expected,
                    &auth.authentication_data,
                    &request.account_id,
                ) {
                    Ok(()) => {
                        let request_id = self.shared.register(request);
                        Ok(AuthenticatedReply::DisperseReply(DisperseBlobReply {
                            result: BlobStatus::Processing,
                            request_id,
                        }))
                    }
                    Err(e) => {
                        self.shared.state.lock().rejected_handshakes += 1;
                        Err(unauthenticated(format!("failed to authenticate blob request: {e}")))
                    }
                };
                self.outbox.push_back(reply);
            }
            AuthenticatedRequest::DisperseRequest(_) => {
                return Err(Error::Protocol("duplicate dispersal request".to_string()));
            }
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<AuthenticatedReply> {
        tokio::time::sleep(self.shared.config.handshake_delay).await;
        self.outbox
            .pop_front()
            .unwrap_or_else(|| Err(Error::Transport("stream closed by server".to_string())))
    }
}

/// Test environment: a mock disperser plus a funded signer.
pub struct TestHarness {
    disperser: MockDisperser,
    signer: Arc<LocalBlobRequestSigner>,
}

impl TestHarness {
    /// Harness with the default status progression.
    pub fn setup() -> Self {
        Self::setup_with_config(MockDisperserConfig::default())
    }

    /// Harness with a custom mock disperser.
    pub fn setup_with_config(config: MockDisperserConfig) -> Self {
        Self {
            disperser: MockDisperser::new(config),
            signer: Arc::new(LocalBlobRequestSigner::random()),
        }
    }

    /// The mock disperser.
    pub fn disperser(&self) -> &MockDisperser {
        &self.disperser
    }

    /// The harness signer.
    pub fn signer(&self) -> Arc<dyn BlobRequestSigner> {
        self.signer.clone()
    }

    /// Account id of the harness signer.
    pub fn account_id(&self) -> String {
        self.signer.account_id().unwrap_or_default()
    }

    /// Client configuration with short timings for paused-clock tests.
    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            rpc: "mock-disperser:32001".to_string(),
            status_query_timeout_secs: 120,
            confirmation_timeout_secs: 60,
            status_query_retry_interval_ms: 1_000,
            response_timeout_secs: 10,
            signer_private_key_hex: self.signer.private_key_hex(),
            ..Default::default()
        }
    }

    /// Client over the mock disperser.
    pub fn client(&self, config: ClientConfig) -> Result<DaClient> {
        DaClient::new(config, Arc::new(self.disperser.clone()))
    }

    /// Paying client over the mock disperser.
    pub fn paying_client(&self, config: ClientConfig, accountant: Arc<Accountant>) -> Result<DaClient> {
        DaClient::with_accountant(config, Arc::new(self.disperser.clone()), accountant)
    }
}
