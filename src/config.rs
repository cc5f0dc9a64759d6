//! Configuration for da-client.

use crate::auth::{BlobRequestSigner, LocalBlobRequestSigner, PRIVATE_KEY_HEX_LEN};
use crate::disperser::DisperserConfig;
use crate::error::{Error, Result};
use crate::payment::REQUIRED_QUORUMS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Disperser address as `host:port`.
    #[serde(default = "default_rpc")]
    pub rpc: String,

    /// Overall deadline for a blob to reach a terminal status, in seconds.
    #[serde(default = "default_status_query_timeout")]
    pub status_query_timeout_secs: u64,

    /// How long a blob may stay in PROCESSING or DISPERSING before the
    /// client gives up on it, in seconds. At most `status_query_timeout_secs`.
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,

    /// Interval between status polls, in milliseconds.
    #[serde(default = "default_status_query_retry_interval")]
    pub status_query_retry_interval_ms: u64,

    /// Deadline for a single disperser call, in seconds.
    #[serde(default = "default_response_timeout")]
    pub response_timeout_secs: u64,

    /// Quorums to disperse to in addition to the required ones.
    #[serde(default)]
    pub custom_quorum_ids: Vec<u8>,

    /// Hex-encoded secp256k1 key; empty disables authenticated dispersal.
    #[serde(default)]
    pub signer_private_key_hex: String,

    /// Wait for finalization instead of returning at confirmation.
    #[serde(default = "default_wait_for_finalization")]
    pub wait_for_finalization: bool,

    /// Connect without TLS.
    #[serde(default)]
    pub disable_tls: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc: default_rpc(),
            status_query_timeout_secs: default_status_query_timeout(),
            confirmation_timeout_secs: default_confirmation_timeout(),
            status_query_retry_interval_ms: default_status_query_retry_interval(),
            response_timeout_secs: default_response_timeout(),
            custom_quorum_ids: Vec::new(),
            signer_private_key_hex: String::new(),
            wait_for_finalization: default_wait_for_finalization(),
            disable_tls: false,
        }
    }
}

fn default_rpc() -> String {
    "localhost:32001".to_string()
}

const fn default_status_query_timeout() -> u64 {
    25 * 60 // 25 minutes
}

const fn default_confirmation_timeout() -> u64 {
    15 * 60 // 15 minutes
}

const fn default_status_query_retry_interval() -> u64 {
    5_000
}

const fn default_response_timeout() -> u64 {
    30
}

const fn default_wait_for_finalization() -> bool {
    true
}

/// Default directory for signer keys.
#[must_use]
pub fn default_key_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "da-client")
        .map(|dirs| dirs.data_dir().join("keys"))
        .unwrap_or_else(|| PathBuf::from(".da-client/keys"))
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &std::path::Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check the configuration before building a client.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.host_port()?;

        if self.status_query_timeout_secs == 0 {
            return Err(Error::Config(
                "status query timeout must be non-zero".to_string(),
            ));
        }
        if self.confirmation_timeout_secs == 0 {
            return Err(Error::Config(
                "confirmation timeout must be non-zero".to_string(),
            ));
        }
        if self.confirmation_timeout_secs > self.status_query_timeout_secs {
            return Err(Error::Config(format!(
                "confirmation timeout ({}s) exceeds status query timeout ({}s)",
                self.confirmation_timeout_secs, self.status_query_timeout_secs
            )));
        }
        if self.status_query_retry_interval_ms == 0 {
            return Err(Error::Config(
                "status query retry interval must be non-zero".to_string(),
            ));
        }
        if self.response_timeout_secs == 0 {
            return Err(Error::Config("response timeout must be non-zero".to_string()));
        }

        if let Some(q) = self
            .custom_quorum_ids
            .iter()
            .find(|q| REQUIRED_QUORUMS.contains(q))
        {
            return Err(Error::Config(format!(
                "custom quorum {q} is a required quorum and is always included"
            )));
        }

        let key = self
            .signer_private_key_hex
            .strip_prefix("0x")
            .unwrap_or(&self.signer_private_key_hex);
        if !key.is_empty() && key.len() != PRIVATE_KEY_HEX_LEN {
            return Err(Error::Config(format!(
                "signer private key must be {PRIVATE_KEY_HEX_LEN} hex characters or empty, got {}",
                key.len()
            )));
        }

        Ok(())
    }

    /// Split `rpc` into host and port.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `rpc` is not `host:port`.
    pub fn host_port(&self) -> Result<(String, u16)> {
        let (host, port) = self
            .rpc
            .rsplit_once(':')
            .ok_or_else(|| Error::Config(format!("rpc address {:?} is not host:port", self.rpc)))?;
        if host.is_empty() {
            return Err(Error::Config(format!("rpc address {:?} has no host", self.rpc)));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| Error::Config(format!("rpc port {port:?} is invalid: {e}")))?;
        Ok((host.to_string(), port))
    }

    /// Overall status polling deadline.
    #[must_use]
    pub fn status_query_timeout(&self) -> Duration {
        Duration::from_secs(self.status_query_timeout_secs)
    }

    /// How long a blob may wait to be confirmed.
    #[must_use]
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    /// Interval between status polls.
    #[must_use]
    pub fn status_query_retry_interval(&self) -> Duration {
        Duration::from_millis(self.status_query_retry_interval_ms)
    }

    /// Deadline for a single disperser call.
    #[must_use]
    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }

    /// Disperser client settings derived from this configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `rpc` is not `host:port`.
    pub fn disperser_config(&self) -> Result<DisperserConfig> {
        let (hostname, port) = self.host_port()?;
        Ok(DisperserConfig {
            hostname,
            port,
            timeout: self.response_timeout(),
            use_secure_grpc: !self.disable_tls,
        })
    }

    /// Build the configured signer, if a key is set.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the key is malformed.
    pub fn signer(&self) -> Result<Option<Arc<dyn BlobRequestSigner>>> {
        if self.signer_private_key_hex.is_empty() {
            return Ok(None);
        }
        let signer = LocalBlobRequestSigner::from_hex(&self.signer_private_key_hex)?;
        Ok(Some(Arc::new(signer)))
    }
}
