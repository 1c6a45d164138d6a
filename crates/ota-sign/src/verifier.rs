//! Device-side acceptance check for signed images.
//!
//! Steps:
//! 1. Reject anything too short to hold a payload and a signature
//! 2. Split off the trailing `SIGNATURE_LEN` bytes
//! 3. Recompute the SHA-256 digest of the payload
//! 4. Check the PKCS#1 v1.5 signature over that digest
//!
//! Every cryptographic failure collapses into `SignatureMismatch`.

use std::io::Read;
use std::path::Path;

use futures::io::{AsyncRead, AsyncReadExt};
use rsa::RsaPublicKey;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::signature::hazmat::PrehashVerifier;
use sha2::Sha256;
use tracing::{debug, warn};

use crate::digest::{Digest, READ_BLOCK_LEN, digest};
use crate::error::ImageError;
use crate::image::{hex_dump, split_signed};
use crate::keys::{self, check_modulus};
use crate::stream::{StreamVerifier, VerifiedImage};

/// Verifies signed images against one trusted public key.
pub struct ImageVerifier {
    verifying_key: VerifyingKey<Sha256>,
    public_key: RsaPublicKey,
}

impl ImageVerifier {
    pub fn new(public_key: RsaPublicKey) -> Result<Self, ImageError> {
        check_modulus(&public_key)?;
        let verifying_key = VerifyingKey::<Sha256>::new(public_key.clone());
        Ok(Self {
            verifying_key,
            public_key,
        })
    }

    pub fn from_pem(pem: &str) -> Result<Self, ImageError> {
        Self::new(keys::parse_public_key_pem(pem)?)
    }

    pub fn from_pem_file(path: &Path) -> Result<Self, ImageError> {
        Self::new(keys::load_public_key(path)?)
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    pub fn fingerprint(&self) -> Result<String, ImageError> {
        keys::fingerprint(&self.public_key)
    }

    /// Verifies `signed` and returns the payload it carries.
    pub fn verify<'a>(&self, signed: &'a [u8]) -> Result<&'a [u8], ImageError> {
        let (payload, signature) = split_signed(signed)?;
        self.check_signature(&digest(payload), signature)?;
        Ok(payload)
    }

    /// Like [`verify`](Self::verify), but reuses the buffer for the payload.
    pub fn verify_owned(&self, mut signed: Vec<u8>) -> Result<Vec<u8>, ImageError> {
        let payload_len = self.verify(&signed)?.len();
        signed.truncate(payload_len);
        Ok(signed)
    }

    /// Verifies an image read to EOF without holding it in memory.
    pub fn verify_reader<R: Read>(&self, mut reader: R) -> Result<VerifiedImage, ImageError> {
        let mut stream = StreamVerifier::new(self);
        let mut block = [0u8; READ_BLOCK_LEN];
        loop {
            let n = match reader.read(&mut block) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            stream.update(&block[..n]);
        }
        stream.finalize()
    }

    /// Async counterpart of [`verify_reader`](Self::verify_reader).
    ///
    /// Only reading awaits; the final signature check runs inline.
    pub async fn verify_async_reader<R>(&self, mut reader: R) -> Result<VerifiedImage, ImageError>
    where
        R: AsyncRead + Unpin,
    {
        let mut stream = StreamVerifier::new(self);
        let mut block = [0u8; READ_BLOCK_LEN];
        loop {
            let n = reader.read(&mut block).await?;
            if n == 0 {
                break;
            }
            stream.update(&block[..n]);
        }
        stream.finalize()
    }

    pub(crate) fn check_signature(&self, digest: &Digest, signature: &[u8]) -> Result<(), ImageError> {
        debug!("payload digest:\n{}", hex_dump(digest));
        let result = Signature::try_from(signature)
            .and_then(|signature| self.verifying_key.verify_prehash(digest, &signature));
        if result.is_err() {
            warn!("rejecting image: signature does not match payload");
            return Err(ImageError::SignatureMismatch);
        }
        Ok(())
    }
}

impl std::fmt::Debug for ImageVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageVerifier")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}
