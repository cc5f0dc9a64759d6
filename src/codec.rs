//! Blob encoding.
//!
//! Raw payloads are not valid field-element sequences in general. The
//! encoding prepends a 32-byte header and splits the payload into 31-byte
//! pieces, each prefixed with a zero byte, so that every 32-byte chunk of the
//! result starts with `0x00` and is below the BN254 modulus.
//!
//! ```text
//! [0x00][version][len: u32 BE][0x00 x 26] [0x00][31 bytes] [0x00][31 bytes] ...
//! ```

use crate::error::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// Current encoding version.
pub const DEFAULT_BLOB_ENCODING_VERSION: u8 = 0;

const HEADER_LEN: usize = 32;
const PIECE_LEN: usize = 31;

/// Encode a raw payload for dispersal.
///
/// # Errors
///
/// Returns an invalid-argument error if the payload is longer than
/// `u32::MAX` bytes.
pub fn encode_blob(raw: &[u8]) -> Result<Bytes> {
    let len = u32::try_from(raw.len()).map_err(|_| {
        Error::InvalidArgument(format!("blob of {} bytes is too large", raw.len()))
    })?;

    let pieces = raw.len().div_ceil(PIECE_LEN);
    let mut out = BytesMut::with_capacity(HEADER_LEN + pieces * (PIECE_LEN + 1));

    out.put_u8(0x00);
    out.put_u8(DEFAULT_BLOB_ENCODING_VERSION);
    out.put_u32(len);
    out.put_bytes(0x00, HEADER_LEN - 6);

    for piece in raw.chunks(PIECE_LEN) {
        out.put_u8(0x00);
        out.put_slice(piece);
    }

    Ok(out.freeze())
}

/// Decode a blob produced by [`encode_blob`].
///
/// # Errors
///
/// Returns an invalid-argument error for a truncated header, an unknown
/// version, or a declared length the body cannot hold.
pub fn decode_blob(encoded: &[u8]) -> Result<Bytes> {
    if encoded.len() < HEADER_LEN {
        return Err(Error::InvalidArgument(format!(
            "encoded blob too short: {} bytes",
            encoded.len()
        )));
    }
    let version = encoded[1];
    if version != DEFAULT_BLOB_ENCODING_VERSION {
        return Err(Error::InvalidArgument(format!(
            "unsupported blob encoding version {version}"
        )));
    }
    let declared = u32::from_be_bytes([encoded[2], encoded[3], encoded[4], encoded[5]]) as usize;

    let body = &encoded[HEADER_LEN..];
    let mut out = BytesMut::with_capacity(body.len());
    for chunk in body.chunks(PIECE_LEN + 1) {
        out.put_slice(&chunk[1..]);
    }

    if out.len() < declared {
        return Err(Error::InvalidArgument(format!(
            "encoded blob declares {declared} bytes but holds {}",
            out.len()
        )));
    }
    out.truncate(declared);
    Ok(out.freeze())
}
