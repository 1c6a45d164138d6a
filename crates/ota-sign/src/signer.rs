use std::path::Path;

use rsa::RsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::EncodePublicKey;
use rsa::signature::SignatureEncoding;
use rsa::signature::hazmat::PrehashSigner;
use sha2::Sha256;
use tracing::debug;

use crate::digest::{Digest, digest};
use crate::error::ImageError;
use crate::image::{SIGNATURE_LEN, SignedImage, hex_dump};
use crate::keys::{self, check_modulus};

/// Algorithm identifier for RSASSA-PKCS1-v1_5 over a SHA-256 digest.
pub const RSA_PKCS1V15_SHA256: &str = "rsa-pkcs1v15-sha256";

/// Signs firmware digests.
///
/// Implementations are sync; signing is CPU-bound and single-shot.
pub trait ImageSigner: Send + Sync {
    /// Sign a precomputed image digest. Returns exactly `SIGNATURE_LEN` bytes.
    fn sign_digest(&self, digest: &Digest) -> Result<Vec<u8>, ImageError>;

    /// DER SubjectPublicKeyInfo of the matching public key.
    fn public_key_der(&self) -> Result<Vec<u8>, ImageError>;

    /// Algorithm identifier string (e.g. "rsa-pkcs1v15-sha256").
    fn algorithm(&self) -> &str;
}

/// Digests `raw`, signs the digest and appends the signature.
///
/// `raw` is never modified; on error no image is produced.
pub fn sign_image(signer: &dyn ImageSigner, raw: &[u8]) -> Result<SignedImage, ImageError> {
    if raw.is_empty() {
        return Err(ImageError::EmptyImage);
    }
    let digest = digest(raw);
    debug!(len = raw.len(), "image digest:\n{}", hex_dump(&digest));

    let signature = signer.sign_digest(&digest)?;
    if signature.len() != SIGNATURE_LEN {
        return Err(ImageError::Key(format!(
            "{} signer produced {} signature bytes, expected {SIGNATURE_LEN}",
            signer.algorithm(),
            signature.len()
        )));
    }
    debug!("image signature:\n{}", hex_dump(&signature));

    Ok(SignedImage::assemble(raw, &signature))
}

/// RSA PKCS#1 v1.5 signer over SHA-256 image digests.
pub struct RsaImageSigner {
    signing_key: SigningKey<Sha256>,
    private_key: RsaPrivateKey,
}

impl RsaImageSigner {
    pub fn new(private_key: RsaPrivateKey) -> Result<Self, ImageError> {
        check_modulus(&private_key)?;
        let signing_key = SigningKey::<Sha256>::new(private_key.clone());
        Ok(Self {
            signing_key,
            private_key,
        })
    }

    pub fn from_pem(pem: &str) -> Result<Self, ImageError> {
        Self::new(keys::parse_private_key_pem(pem)?)
    }

    pub fn from_pem_file(path: &Path) -> Result<Self, ImageError> {
        Self::new(keys::load_private_key(path)?)
    }

    pub fn sign(&self, raw: &[u8]) -> Result<SignedImage, ImageError> {
        sign_image(self, raw)
    }

    pub fn fingerprint(&self) -> Result<String, ImageError> {
        keys::fingerprint(&self.private_key.to_public_key())
    }
}

impl ImageSigner for RsaImageSigner {
    fn sign_digest(&self, digest: &Digest) -> Result<Vec<u8>, ImageError> {
        let signature = self
            .signing_key
            .sign_prehash(digest)
            .map_err(|e| ImageError::Key(format!("RSA signing failed: {e}")))?;
        Ok(signature.to_vec())
    }

    fn public_key_der(&self) -> Result<Vec<u8>, ImageError> {
        Ok(self
            .private_key
            .to_public_key()
            .to_public_key_der()?
            .into_vec())
    }

    fn algorithm(&self) -> &str {
        RSA_PKCS1V15_SHA256
    }
}
