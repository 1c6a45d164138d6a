//! Incremental verification for images that arrive in chunks.
//!
//! The signature sits at the end of the image and nothing announces the
//! total length up front, so the most recent `SIGNATURE_LEN` bytes are held
//! back from the hasher until the input ends.

use serde::Serialize;

use crate::digest::{Digest, ImageHasher};
use crate::error::ImageError;
use crate::image::SIGNATURE_LEN;
use crate::verifier::ImageVerifier;

/// Outcome of a successful streaming verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VerifiedImage {
    /// Payload length, excluding the signature trailer.
    pub payload_len: u64,
    #[serde(serialize_with = "hex::serde::serialize")]
    pub digest: Digest,
}

/// Feeds a signed image through in arbitrary chunks.
pub struct StreamVerifier<'a> {
    verifier: &'a ImageVerifier,
    hasher: ImageHasher,
    trailer: Vec<u8>,
}

impl<'a> StreamVerifier<'a> {
    pub fn new(verifier: &'a ImageVerifier) -> Self {
        Self {
            verifier,
            hasher: ImageHasher::new(),
            trailer: Vec::with_capacity(2 * SIGNATURE_LEN),
        }
    }

    /// Total bytes consumed so far, trailer included.
    pub fn bytes_seen(&self) -> u64 {
        self.hasher.len() + self.trailer.len() as u64
    }

    pub fn update(&mut self, chunk: &[u8]) {
        // Anything that cannot be part of the final trailer goes straight
        // to the hasher.
        if chunk.len() >= SIGNATURE_LEN {
            let (body, tail) = chunk.split_at(chunk.len() - SIGNATURE_LEN);
            self.hasher.update(&self.trailer);
            self.hasher.update(body);
            self.trailer.clear();
            self.trailer.extend_from_slice(tail);
            return;
        }

        self.trailer.extend_from_slice(chunk);
        if self.trailer.len() > SIGNATURE_LEN {
            let excess = self.trailer.len() - SIGNATURE_LEN;
            self.hasher.update(&self.trailer[..excess]);
            self.trailer.drain(..excess);
        }
    }

    pub fn finalize(self) -> Result<VerifiedImage, ImageError> {
        let payload_len = self.hasher.len();
        if self.trailer.len() < SIGNATURE_LEN || payload_len == 0 {
            return Err(ImageError::MalformedImage {
                len: usize::try_from(self.bytes_seen()).unwrap_or(usize::MAX),
                min: SIGNATURE_LEN,
            });
        }
        let digest = self.hasher.finalize();
        self.verifier.check_signature(&digest, &self.trailer)?;
        Ok(VerifiedImage {
            payload_len,
            digest,
        })
    }
}
