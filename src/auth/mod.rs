//! Request authentication.
//!
//! The disperser authenticates a dispersal by issuing a nonce and checking
//! that the returned signature recovers to the account id claimed in the
//! request. The same signer also binds payment authorizations to the account.

mod signer;

pub use signer::{
    challenge_digest, keccak256, sign_challenge, verify_challenge, verify_signature,
    BlobRequestSigner, LocalBlobRequestSigner, PRIVATE_KEY_HEX_LEN, SIGNATURE_SIZE,
};
