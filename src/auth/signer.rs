//! secp256k1 request signing for authenticated dispersal.
//!
//! Signatures are 65 bytes (`r ‖ s ‖ v`, `v` in `{0, 1}`) over a Keccak-256
//! digest. Account ids are Ethereum-style addresses: the last 20 bytes of
//! the Keccak-256 hash of the uncompressed public key, `0x`-prefixed hex.

use crate::error::{Error, Result};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha3::{Digest, Keccak256};
use tracing::debug;

/// Recoverable signature size in bytes.
pub const SIGNATURE_SIZE: usize = 65;

/// Length of a hex-encoded private key (no `0x` prefix).
pub const PRIVATE_KEY_HEX_LEN: usize = 64;

/// Signs digests on behalf of one account.
///
/// Implementors may hold the key locally or delegate to a remote signer.
pub trait BlobRequestSigner: Send + Sync {
    /// Sign a 32-byte digest, returning a 65-byte recoverable signature.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying key cannot produce a signature.
    fn sign(&self, digest: &[u8; 32]) -> Result<[u8; SIGNATURE_SIZE]>;

    /// The public account identifier derived from the signing key.
    ///
    /// # Errors
    ///
    /// Returns an error if the account id cannot be derived.
    fn account_id(&self) -> Result<String>;
}

/// Signer backed by an in-memory secp256k1 key.
pub struct LocalBlobRequestSigner {
    key: SigningKey,
    account_id: String,
}

impl LocalBlobRequestSigner {
    /// Create a signer from a hex-encoded private key (optionally `0x`-prefixed).
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not 32 bytes of valid hex or is not a
    /// valid secp256k1 scalar.
    pub fn from_hex(private_key_hex: &str) -> Result<Self> {
        let trimmed = private_key_hex
            .strip_prefix("0x")
            .unwrap_or(private_key_hex);
        if trimmed.len() != PRIVATE_KEY_HEX_LEN {
            return Err(Error::Config(format!(
                "invalid signer private key length: expected {PRIVATE_KEY_HEX_LEN} hex chars, got {}",
                trimmed.len()
            )));
        }
        let bytes = hex::decode(trimmed)
            .map_err(|e| Error::Config(format!("invalid signer private key hex: {e}")))?;
        let key = SigningKey::from_slice(&bytes)
            .map_err(|e| Error::Config(format!("invalid signer private key: {e}")))?;
        Ok(Self::from_signing_key(key))
    }

    /// Create a signer from an existing signing key.
    #[must_use]
    pub fn from_signing_key(key: SigningKey) -> Self {
        let account_id = account_id_from_key(key.verifying_key());
        Self { key, account_id }
    }

    /// Generate a fresh random key.
    #[must_use]
    pub fn random() -> Self {
        Self::from_signing_key(SigningKey::random(&mut rand::rngs::OsRng))
    }

    /// Hex encoding of the private key, for persisting generated keys.
    #[must_use]
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.key.to_bytes())
    }
}

impl std::fmt::Debug for LocalBlobRequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBlobRequestSigner")
            .field("account_id", &self.account_id)
            .finish_non_exhaustive()
    }
}

impl BlobRequestSigner for LocalBlobRequestSigner {
    fn sign(&self, digest: &[u8; 32]) -> Result<[u8; SIGNATURE_SIZE]> {
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(digest)
            .map_err(|e| Error::Crypto(format!("signing failed: {e}")))?;

        let mut out = [0u8; SIGNATURE_SIZE];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = recovery_id.to_byte();
        Ok(out)
    }

    fn account_id(&self) -> Result<String> {
        Ok(self.account_id.clone())
    }
}

/// Keccak-256 of arbitrary bytes.
#[must_use]
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Digest signed in response to an auth challenge: Keccak-256 of the nonce's
/// 4 big-endian bytes.
#[must_use]
pub fn challenge_digest(nonce: u32) -> [u8; 32] {
    keccak256(&nonce.to_be_bytes())
}

/// Sign an auth challenge nonce.
///
/// # Errors
///
/// Returns an error if the signer fails.
pub fn sign_challenge(
    signer: &dyn BlobRequestSigner,
    nonce: u32,
) -> Result<[u8; SIGNATURE_SIZE]> {
    signer.sign(&challenge_digest(nonce))
}

/// Verify a recoverable signature over `digest` against a claimed account id.
///
/// # Errors
///
/// Returns an error if the signature is malformed, recovery fails, or the
/// recovered address differs from `account_id`.
pub fn verify_signature(digest: &[u8; 32], signature: &[u8], account_id: &str) -> Result<()> {
    if signature.len() != SIGNATURE_SIZE {
        return Err(Error::Crypto(format!(
            "Invalid signature size: expected {SIGNATURE_SIZE}, got {}",
            signature.len()
        )));
    }

    let sig = Signature::from_slice(&signature[..64])
        .map_err(|e| Error::Crypto(format!("Invalid signature format: {e}")))?;
    let recovery_id = RecoveryId::from_byte(signature[64])
        .ok_or_else(|| Error::Crypto(format!("Invalid recovery id: {}", signature[64])))?;

    let recovered = VerifyingKey::recover_from_prehash(digest, &sig, recovery_id)
        .map_err(|e| Error::Crypto(format!("Public key recovery failed: {e}")))?;

    let recovered_id = account_id_from_key(&recovered);
    if recovered_id.eq_ignore_ascii_case(account_id) {
        debug!("Signature verified for account {account_id}");
        Ok(())
    } else {
        Err(Error::Crypto(format!(
            "Signature verification failed: recovered {recovered_id}, expected {account_id}"
        )))
    }
}

/// Verify a signed auth challenge.
///
/// # Errors
///
/// See [`verify_signature`].
pub fn verify_challenge(nonce: u32, signature: &[u8], account_id: &str) -> Result<()> {
    verify_signature(&challenge_digest(nonce), signature, account_id)
}

fn account_id_from_key(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    // Skip the 0x04 SEC1 tag.
    let hash = keccak256(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&hash[12..]))
}
