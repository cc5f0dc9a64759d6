//! Dispersal flows against the mock disperser.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use super::{MockDisperserConfig, TestHarness};
use da_client::auth::keccak256;
use da_client::{decode_blob, BlobStatus, ClientConfig, DispersalEvent, Error};
use std::collections::HashSet;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_put_blob_reaches_finalized() {
    let harness = TestHarness::setup();
    let client = harness.client(harness.config()).unwrap();

    let payload = b"the quick brown fox jumps over the lazy dog".repeat(10);
    let info = client.put_blob(payload.clone()).await.unwrap();

    let accepted = harness.disperser().accepted();
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].account_id, harness.account_id());
    assert!(accepted[0].custom_quorum_numbers.is_empty());
    assert_eq!(decode_blob(&accepted[0].data).unwrap().as_ref(), payload.as_slice());

    assert_eq!(
        info.blob_verification_proof.batch_metadata.batch_header_hash,
        keccak256(b"blob-1").to_vec()
    );
    assert_eq!(
        info.blob_header.data_length as usize,
        accepted[0].data.len().div_ceil(32)
    );
    assert_eq!(harness.disperser().polls(&hex::encode(b"blob-1")), 4);
}

#[tokio::test(start_paused = true)]
async fn test_confirmation_is_enough_without_finalization() {
    let harness = TestHarness::setup();
    let client = harness
        .client(ClientConfig {
            wait_for_finalization: false,
            ..harness.config()
        })
        .unwrap();

    client.put_blob(b"payload".to_vec()).await.unwrap();
    assert_eq!(harness.disperser().polls(&hex::encode(b"blob-1")), 3);
}

#[tokio::test(start_paused = true)]
async fn test_custom_quorums_are_forwarded() {
    let harness = TestHarness::setup();
    let client = harness
        .client(ClientConfig {
            custom_quorum_ids: vec![2, 5],
            ..harness.config()
        })
        .unwrap();

    client.put_blob(b"payload".to_vec()).await.unwrap();
    assert_eq!(
        harness.disperser().accepted()[0].custom_quorum_numbers,
        vec![2, 5]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_blob_is_terminal() {
    let harness = TestHarness::setup_with_config(MockDisperserConfig {
        progression: vec![BlobStatus::Processing, BlobStatus::Failed, BlobStatus::Finalized],
        ..Default::default()
    });
    let client = harness.client(harness.config()).unwrap();

    let err = client.put_blob(b"payload".to_vec()).await.unwrap_err();
    assert!(matches!(err, Error::DispersalFailed { .. }));
    assert!(!err.is_retryable());
    assert_eq!(harness.disperser().polls(&hex::encode(b"blob-1")), 2);
}

#[tokio::test(start_paused = true)]
async fn test_insufficient_signatures_is_terminal() {
    let harness = TestHarness::setup_with_config(MockDisperserConfig {
        progression: vec![BlobStatus::Dispersing, BlobStatus::InsufficientSignatures],
        ..Default::default()
    });
    let client = harness.client(harness.config()).unwrap();

    let err = client.put_blob(b"payload".to_vec()).await.unwrap_err();
    assert!(matches!(
        err,
        Error::InsufficientSignatures { ref request_id } if *request_id == hex::encode(b"blob-1")
    ));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_status_is_protocol_error() {
    let harness = TestHarness::setup_with_config(MockDisperserConfig {
        progression: vec![BlobStatus::Unknown],
        ..Default::default()
    });
    let client = harness.client(harness.config()).unwrap();

    let err = client.put_blob(b"payload".to_vec()).await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
}

#[tokio::test(start_paused = true)]
async fn test_transient_poll_failures_are_retried() {
    let harness = TestHarness::setup_with_config(MockDisperserConfig {
        failing_polls: 3,
        ..Default::default()
    });
    let client = harness.client(harness.config()).unwrap();

    client.put_blob(b"payload".to_vec()).await.unwrap();
    assert_eq!(harness.disperser().polls(&hex::encode(b"blob-1")), 4);
}

#[tokio::test(start_paused = true)]
async fn test_confirmation_timeout_while_dispersing() {
    let harness = TestHarness::setup_with_config(MockDisperserConfig {
        progression: vec![BlobStatus::Processing, BlobStatus::Dispersing],
        ..Default::default()
    });
    let client = harness
        .client(ClientConfig {
            confirmation_timeout_secs: 15,
            status_query_timeout_secs: 30,
            ..harness.config()
        })
        .unwrap();
    let started = tokio::time::Instant::now();

    let err = client.put_blob(b"payload".to_vec()).await.unwrap_err();
    match err {
        Error::ConfirmationTimeout {
            ref request_id,
            last_status,
        } => {
            assert_eq!(*request_id, hex::encode(b"blob-1"));
            assert_eq!(last_status, BlobStatus::Dispersing);
        }
        ref other => panic!("expected confirmation timeout, got {other}"),
    }
    assert!(err.is_retryable());
    assert!(started.elapsed() < Duration::from_secs(16));
}

#[tokio::test(start_paused = true)]
async fn test_status_deadline_reports_last_status() {
    // Lands onchain before the confirmation timeout but never finalizes.
    let harness = TestHarness::setup_with_config(MockDisperserConfig {
        progression: vec![BlobStatus::Processing, BlobStatus::Confirmed],
        ..Default::default()
    });
    let client = harness
        .client(ClientConfig {
            confirmation_timeout_secs: 15,
            status_query_timeout_secs: 30,
            ..harness.config()
        })
        .unwrap();
    let started = tokio::time::Instant::now();

    let err = client.put_blob(b"payload".to_vec()).await.unwrap_err();
    match err {
        Error::Timeout {
            request_id,
            last_status,
        } => {
            assert_eq!(request_id, hex::encode(b"blob-1"));
            assert_eq!(last_status, Some(BlobStatus::Confirmed));
        }
        other => panic!("expected timeout, got {other}"),
    }
    assert!(started.elapsed() >= Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_slow_status_query_is_skipped() {
    let harness = TestHarness::setup_with_config(MockDisperserConfig {
        slow_polls: 1,
        ..Default::default()
    });
    let config = harness.config();
    let response_timeout = config.response_timeout();
    let client = harness.client(config).unwrap();
    let started = tokio::time::Instant::now();

    client.put_blob(b"payload".to_vec()).await.unwrap();

    assert_eq!(harness.disperser().stalled_polls(), 1);
    assert_eq!(harness.disperser().polls(&hex::encode(b"blob-1")), 4);
    let elapsed = started.elapsed();
    assert!(elapsed >= response_timeout);
    assert!(elapsed < response_timeout + Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_rejected_signature_surfaces_server_error() {
    let harness = TestHarness::setup_with_config(MockDisperserConfig {
        nonce_skew: 1,
        ..Default::default()
    });
    let client = harness.client(harness.config()).unwrap();

    let err = client.put_blob(b"payload".to_vec()).await.unwrap_err();
    match err {
        Error::Rpc { code, message } => {
            assert_eq!(code, "Unauthenticated");
            assert!(message.contains("failed to authenticate"));
        }
        other => panic!("expected rpc error, got {other}"),
    }
    assert_eq!(harness.disperser().rejected_handshakes(), 1);
    assert!(harness.disperser().accepted().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_handshake() {
    let harness = TestHarness::setup_with_config(MockDisperserConfig {
        handshake_delay: Duration::from_secs(5),
        ..Default::default()
    });
    let client = harness
        .client(ClientConfig {
            response_timeout_secs: 60,
            ..harness.config()
        })
        .unwrap();

    let pending = client.put_blob_async(b"payload".to_vec());
    tokio::time::sleep(Duration::from_secs(1)).await;
    pending.cancel();

    assert!(matches!(pending.wait().await, Err(Error::Cancelled)));
    assert!(harness.disperser().accepted().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_acceptance_is_ignored() {
    let harness = TestHarness::setup();
    let client = harness.client(harness.config()).unwrap();
    let mut events = client.subscribe_events();

    let pending = client.put_blob_async(b"payload".to_vec());
    assert!(matches!(
        events.recv().await.unwrap(),
        DispersalEvent::Accepted { .. }
    ));
    pending.cancel();

    assert!(pending.wait().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_slow_handshake_times_out() {
    let harness = TestHarness::setup_with_config(MockDisperserConfig {
        handshake_delay: Duration::from_secs(20),
        ..Default::default()
    });
    let client = harness.client(harness.config()).unwrap();

    let err = client.put_blob(b"payload".to_vec()).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
    assert!(err.is_retryable());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_dispersals() {
    let harness = TestHarness::setup();
    let client = harness.client(harness.config()).unwrap();

    let pending: Vec<_> = (0..10u8)
        .map(|i| client.put_blob_async(vec![i; 100 + usize::from(i)]))
        .collect();
    let results = futures::future::join_all(pending.into_iter().map(|p| p.wait())).await;

    let hashes: HashSet<_> = results
        .into_iter()
        .map(|r| r.unwrap().batch_header_hash_hex())
        .collect();
    assert_eq!(hashes.len(), 10);
    assert_eq!(harness.disperser().accepted().len(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_event_sequence() {
    let harness = TestHarness::setup();
    let client = harness.client(harness.config()).unwrap();
    let mut events = client.subscribe_events();

    client.put_blob(b"payload".to_vec()).await.unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    let request_id = hex::encode(b"blob-1");
    let statuses: Vec<_> = seen
        .iter()
        .filter_map(|e| match e {
            DispersalEvent::StatusChanged { status, .. } => Some(*status),
            _ => None,
        })
        .collect();

    assert_eq!(
        seen.first(),
        Some(&DispersalEvent::Accepted {
            request_id: request_id.clone()
        })
    );
    assert_eq!(
        statuses,
        vec![
            BlobStatus::Processing,
            BlobStatus::Dispersing,
            BlobStatus::Confirmed,
            BlobStatus::Finalized
        ]
    );
    assert!(matches!(
        seen.last(),
        Some(DispersalEvent::Finalized { request_id: id, .. }) if *id == request_id
    ));
}

#[tokio::test(start_paused = true)]
async fn test_failure_event_carries_request_id() {
    let harness = TestHarness::setup_with_config(MockDisperserConfig {
        progression: vec![BlobStatus::Failed],
        ..Default::default()
    });
    let client = harness.client(harness.config()).unwrap();
    let mut events = client.subscribe_events();

    assert!(client.put_blob(b"payload".to_vec()).await.is_err());

    let mut failed = None;
    while let Ok(event) = events.try_recv() {
        if let DispersalEvent::Failed { request_id, .. } = event {
            failed = Some(request_id);
        }
    }
    assert_eq!(failed, Some(Some(hex::encode(b"blob-1"))));
}
