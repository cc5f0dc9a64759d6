//! Payment data types shared between the accountant and the dispersal request.

use crate::auth::{keccak256, verify_signature, BlobRequestSigner};
use crate::error::{Error, Result};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Quorums every blob must be dispersed to; on-demand payments cover only these.
pub const REQUIRED_QUORUMS: [u8; 2] = [0, 1];

/// A leased bandwidth grant issued by the network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Reserved throughput.
    pub symbols_per_second: u64,
    /// Start of the lease (unix seconds, inclusive).
    pub start_timestamp: u64,
    /// End of the lease (unix seconds, exclusive).
    pub end_timestamp: u64,
    /// Quorums the lease covers.
    pub quorum_numbers: Vec<u8>,
    /// Percentage allocation per quorum, parallel to `quorum_numbers`.
    pub quorum_split: Vec<u8>,
}

impl Reservation {
    /// Whether the lease covers the given unix timestamp.
    #[must_use]
    pub fn is_active(&self, now: u64) -> bool {
        self.start_timestamp <= now && now < self.end_timestamp
    }

    /// Symbols allowed per bin of `window_secs` while the lease is active.
    #[must_use]
    pub fn bin_limit(&self, window_secs: u32, now: u64) -> u64 {
        if self.is_active(now) {
            self.symbols_per_second
                .saturating_mul(u64::from(window_secs))
        } else {
            0
        }
    }
}

/// A prepaid, monotonically consumed on-demand balance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnDemandPayment {
    /// Total deposited, in the network's smallest billing unit.
    pub cumulative_payment: BigUint,
}

impl OnDemandPayment {
    /// Balance of `amount` billing units.
    #[must_use]
    pub fn new(amount: impl Into<BigUint>) -> Self {
        Self {
            cumulative_payment: amount.into(),
        }
    }
}

/// Billing parameters, refreshable from network state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingParams {
    /// Length of one accounting bin in seconds.
    pub reservation_window_secs: u32,
    /// Price of one symbol in billing units.
    pub price_per_symbol: u32,
    /// Minimum billable symbols; charges round up to a multiple of this.
    pub min_chargeable_symbols: u32,
}

impl BillingParams {
    /// Check the parameters can be used for accounting.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the window or the minimum charge is zero.
    pub fn validate(&self) -> Result<()> {
        if self.reservation_window_secs == 0 {
            return Err(Error::Config(
                "reservation window must be at least one second".to_string(),
            ));
        }
        if self.min_chargeable_symbols == 0 {
            return Err(Error::Config(
                "minimum chargeable symbols must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Symbols billed for a blob of `num_symbols`: rounded up to a multiple of
    /// `min_chargeable_symbols`, never less than one multiple.
    #[must_use]
    pub fn symbols_charged(&self, num_symbols: u64) -> u64 {
        let min = u64::from(self.min_chargeable_symbols).max(1);
        num_symbols.div_ceil(min).max(1).saturating_mul(min)
    }

    /// On-demand price of a blob of `num_symbols`.
    #[must_use]
    pub fn payment_for(&self, num_symbols: u64) -> BigUint {
        BigUint::from(self.symbols_charged(num_symbols)) * self.price_per_symbol
    }
}

/// Outcome of an admission decision, attached to the dispersal request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAuthorization {
    /// Account the charge is made against.
    pub account_id: String,
    /// Reservation bin the blob landed in; zero when paid on-demand.
    pub bin_index: u32,
    /// Running on-demand total; zero when covered by the reservation.
    pub cumulative_payment: BigUint,
    /// Signature over [`PaymentAuthorization::digest`].
    pub signature: Option<Vec<u8>>,
}

impl PaymentAuthorization {
    /// Whether the blob rides on the reservation.
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.cumulative_payment == BigUint::default()
    }

    /// Digest binding the authorization to the account.
    #[must_use]
    pub fn digest(&self) -> [u8; 32] {
        let mut buf = Vec::with_capacity(self.account_id.len() + 4 + 32);
        buf.extend_from_slice(self.account_id.as_bytes());
        buf.extend_from_slice(&self.bin_index.to_be_bytes());
        buf.extend_from_slice(&self.cumulative_payment.to_bytes_be());
        keccak256(&buf)
    }

    /// Sign the authorization in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the signer fails.
    pub fn sign(&mut self, signer: &dyn BlobRequestSigner) -> Result<()> {
        let signature = signer.sign(&self.digest())?;
        self.signature = Some(signature.to_vec());
        Ok(())
    }

    /// Verify the attached signature against `account_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the authorization is unsigned or the signature
    /// does not recover to the account.
    pub fn verify(&self) -> Result<()> {
        let signature = self
            .signature
            .as_deref()
            .ok_or_else(|| Error::Crypto("payment authorization is not signed".to_string()))?;
        verify_signature(&self.digest(), signature, &self.account_id)
    }
}

/// Reject empty quorum lists and quorums outside `allowed`.
///
/// # Errors
///
/// Returns an invalid-argument error naming the first offending quorum.
pub fn quorum_check(quorum_numbers: &[u8], allowed: &[u8]) -> Result<()> {
    if quorum_numbers.is_empty() {
        return Err(Error::InvalidArgument(
            "no quorum numbers provided".to_string(),
        ));
    }
    if let Some(q) = quorum_numbers.iter().find(|q| !allowed.contains(q)) {
        return Err(Error::InvalidArgument(format!(
            "provided quorum number {q} not allowed"
        )));
    }
    Ok(())
}
