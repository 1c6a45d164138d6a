//! Signed image framing.
//!
//! A signed image is the firmware payload followed directly by its
//! signature:
//!
//! ```text
//! [ payload: N bytes ][ signature: SIGNATURE_LEN bytes ]
//! ```
//!
//! There is no header, length prefix or magic number. The split point is
//! always `total_len - SIGNATURE_LEN`, which keeps the format compatible
//! with images produced by earlier tooling.

use std::fmt::Write as _;

use crate::error::ImageError;

/// Signature length for a 2048-bit RSA modulus.
pub const SIGNATURE_LEN: usize = 256;

/// Splits a signed image into `(payload, signature)`.
///
/// Fails with `MalformedImage` unless there is room for a non-empty payload.
pub fn split_signed(bytes: &[u8]) -> Result<(&[u8], &[u8]), ImageError> {
    if bytes.len() <= SIGNATURE_LEN {
        return Err(ImageError::MalformedImage {
            len: bytes.len(),
            min: SIGNATURE_LEN,
        });
    }
    Ok(bytes.split_at(bytes.len() - SIGNATURE_LEN))
}

/// A payload with its trailing signature attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedImage {
    bytes: Vec<u8>,
}

impl SignedImage {
    pub(crate) fn assemble(payload: &[u8], signature: &[u8]) -> Self {
        debug_assert_eq!(signature.len(), SIGNATURE_LEN);
        let mut bytes = Vec::with_capacity(payload.len() + signature.len());
        bytes.extend_from_slice(payload);
        bytes.extend_from_slice(signature);
        Self { bytes }
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[..self.bytes.len() - SIGNATURE_LEN]
    }

    pub fn signature(&self) -> &[u8] {
        &self.bytes[self.bytes.len() - SIGNATURE_LEN..]
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl AsRef<[u8]> for SignedImage {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Renders bytes as lowercase hex, 16 space-separated bytes per line.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, line) in bytes.chunks(16).enumerate() {
        if i > 0 {
            out.push('\n');
        }
        for (j, byte) in line.iter().enumerate() {
            if j > 0 {
                out.push(' ');
            }
            write!(out, "{byte:02x}").expect("writing to String");
        }
    }
    out
}
