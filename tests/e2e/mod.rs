//! End-to-end tests for da-client.
//!
//! The suite drives [`da_client::DaClient`] against an in-process mock
//! disperser that runs the real authentication handshake, verifies
//! signatures and payment authorizations, and walks each blob through a
//! scripted status progression.

mod harness;
mod integration_tests;

pub use harness::{MockDisperser, MockDisperserConfig, TestHarness};
