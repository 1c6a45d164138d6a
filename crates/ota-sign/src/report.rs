//! Human and machine readable summaries of sign/verify runs.

use std::fmt;
use std::path::Path;

use serde::Serialize;
use sha2::{Digest as _, Sha256};

use crate::digest::{Digest, digest};
use crate::error::ImageError;
use crate::image::{SignedImage, hex_dump};
use crate::signer::ImageSigner;
use crate::stream::VerifiedImage;

#[derive(Debug, Clone, Serialize)]
pub struct SigningReport {
    pub input: String,
    pub input_len: u64,
    pub output: String,
    pub output_len: u64,
    pub algorithm: String,
    pub key_fingerprint: String,
    #[serde(serialize_with = "hex::serde::serialize")]
    pub digest: Digest,
    #[serde(serialize_with = "hex::serde::serialize")]
    pub signature: Vec<u8>,
}

impl SigningReport {
    pub fn new(
        input: &Path,
        output: &Path,
        image: &SignedImage,
        signer: &dyn ImageSigner,
    ) -> Result<Self, ImageError> {
        Ok(Self {
            input: input.display().to_string(),
            input_len: image.payload().len() as u64,
            output: output.display().to_string(),
            output_len: image.len() as u64,
            algorithm: signer.algorithm().to_string(),
            key_fingerprint: hex::encode(Sha256::digest(signer.public_key_der()?)),
            digest: digest(image.payload()),
            signature: image.signature().to_vec(),
        })
    }
}

impl fmt::Display for SigningReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "digest:\n{}", hex_dump(&self.digest))?;
        writeln!(f, "signature:\n{}", hex_dump(&self.signature))?;
        writeln!(f, "input:  {} ({} bytes)", self.input, self.input_len)?;
        writeln!(f, "output: {} ({} bytes)", self.output, self.output_len)?;
        write!(f, "key:    {} {}", self.algorithm, self.key_fingerprint)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub input: String,
    pub payload_len: u64,
    #[serde(serialize_with = "hex::serde::serialize")]
    pub digest: Digest,
    pub key_fingerprint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_output: Option<String>,
}

impl VerificationReport {
    pub fn new(input: &Path, verified: &VerifiedImage, key_fingerprint: String) -> Self {
        Self {
            input: input.display().to_string(),
            payload_len: verified.payload_len,
            digest: verified.digest,
            key_fingerprint,
            payload_output: None,
        }
    }

    pub fn with_payload_output(mut self, path: &Path) -> Self {
        self.payload_output = Some(path.display().to_string());
        self
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "signature valid")?;
        writeln!(f, "digest:\n{}", hex_dump(&self.digest))?;
        writeln!(f, "input:   {} ({} payload bytes)", self.input, self.payload_len)?;
        if let Some(path) = &self.payload_output {
            writeln!(f, "payload: {path}")?;
        }
        write!(f, "key:     {}", self.key_fingerprint)
    }
}
