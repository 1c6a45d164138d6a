//! RSA key generation, persistence and loading.
//!
//! Generating a key pair is a rare administrative action: every image
//! signed with the old private key stops verifying against the new public
//! key. Nothing in this crate generates keys implicitly, and saving never
//! overwrites an existing key file.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use rand_core::{CryptoRngCore, OsRng};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::ImageError;
use crate::image::SIGNATURE_LEN;

/// Smallest modulus accepted for new keys.
pub const MIN_KEY_BITS: usize = 2048;

/// Modulus size whose signatures fit the image trailer.
pub const KEY_BITS: usize = SIGNATURE_LEN * 8;

/// A private key together with its public half.
#[derive(Clone)]
pub struct KeyPair {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
}

impl KeyPair {
    pub fn from_private_key(private_key: RsaPrivateKey) -> Self {
        let public_key = private_key.to_public_key();
        Self {
            private_key,
            public_key,
        }
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Writes both halves as PEM. Fails without touching either file if
    /// one of them already exists, and removes the private key again if the
    /// public key cannot be written.
    pub fn save(&self, private_path: &Path, public_path: &Path) -> Result<(), ImageError> {
        for path in [private_path, public_path] {
            if path.exists() {
                return Err(already_exists(path));
            }
        }
        save_private_key(private_path, &self.private_key)?;
        if let Err(e) = save_public_key(public_path, &self.public_key) {
            if let Err(cleanup) = fs::remove_file(private_path) {
                warn!(
                    private_key = %private_path.display(),
                    "could not remove private key after failed save: {cleanup}"
                );
            }
            return Err(e);
        }
        info!(
            private_key = %private_path.display(),
            public_key = %public_path.display(),
            "wrote RSA key pair"
        );
        Ok(())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("bits", &(self.public_key.size() * 8))
            .finish_non_exhaustive()
    }
}

/// Generates a key pair from the operating system's random source.
pub fn generate_key_pair(bits: usize) -> Result<KeyPair, ImageError> {
    generate_key_pair_with_rng(&mut OsRng, bits)
}

/// Generates a key pair from a caller-supplied CSPRNG.
///
/// Only tests should pass anything other than `OsRng`.
pub fn generate_key_pair_with_rng<R>(rng: &mut R, bits: usize) -> Result<KeyPair, ImageError>
where
    R: CryptoRngCore + ?Sized,
{
    if bits < MIN_KEY_BITS {
        return Err(ImageError::Key(format!(
            "refusing to generate a {bits}-bit key, minimum is {MIN_KEY_BITS}"
        )));
    }
    let private_key = RsaPrivateKey::new(rng, bits)
        .map_err(|e| ImageError::Key(format!("generating RSA key: {e}")))?;
    Ok(KeyPair::from_private_key(private_key))
}

/// Writes a private key as PKCS#1 PEM, readable by the owner only.
pub fn save_private_key(path: &Path, key: &RsaPrivateKey) -> Result<(), ImageError> {
    let pem = key.to_pkcs1_pem(LineEnding::LF)?;
    write_new_file(path, pem.as_bytes(), 0o600)
}

/// Writes a public key as SubjectPublicKeyInfo PEM.
pub fn save_public_key(path: &Path, key: &RsaPublicKey) -> Result<(), ImageError> {
    let pem = key.to_public_key_pem(LineEnding::LF)?;
    write_new_file(path, pem.as_bytes(), 0o644)
}

pub fn load_private_key(path: &Path) -> Result<RsaPrivateKey, ImageError> {
    let pem = fs::read_to_string(path)?;
    parse_private_key_pem(&pem)
}

pub fn load_public_key(path: &Path) -> Result<RsaPublicKey, ImageError> {
    let pem = fs::read_to_string(path)?;
    parse_public_key_pem(&pem)
}

/// Parses a PKCS#1 or PKCS#8 private key.
pub fn parse_private_key_pem(pem: &str) -> Result<RsaPrivateKey, ImageError> {
    let key = if pem.contains("BEGIN RSA PRIVATE KEY") {
        RsaPrivateKey::from_pkcs1_pem(pem)?
    } else {
        RsaPrivateKey::from_pkcs8_pem(pem)?
    };
    key.validate()
        .map_err(|e| ImageError::Key(format!("inconsistent RSA private key: {e}")))?;
    Ok(key)
}

/// Parses a SubjectPublicKeyInfo or PKCS#1 public key.
pub fn parse_public_key_pem(pem: &str) -> Result<RsaPublicKey, ImageError> {
    if pem.contains("BEGIN RSA PUBLIC KEY") {
        Ok(RsaPublicKey::from_pkcs1_pem(pem)?)
    } else {
        Ok(RsaPublicKey::from_public_key_pem(pem)?)
    }
}

/// Hex SHA-256 of the key's SubjectPublicKeyInfo DER encoding.
pub fn fingerprint(key: &RsaPublicKey) -> Result<String, ImageError> {
    let der = key.to_public_key_der()?;
    Ok(hex::encode(Sha256::digest(der.as_bytes())))
}

/// Rejects keys whose signatures would not fill the image trailer exactly.
pub(crate) fn check_modulus(key: &impl PublicKeyParts) -> Result<(), ImageError> {
    let size = key.size();
    if size != SIGNATURE_LEN {
        return Err(ImageError::Key(format!(
            "{}-bit modulus, signed images require {KEY_BITS}-bit keys",
            size * 8
        )));
    }
    Ok(())
}

fn write_new_file(path: &Path, contents: &[u8], mode: u32) -> Result<(), ImageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    let mut file = options.open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::AlreadyExists {
            already_exists(path)
        } else {
            e.into()
        }
    })?;
    file.write_all(contents)?;
    file.sync_all()?;
    Ok(())
}

fn already_exists(path: &Path) -> ImageError {
    ImageError::Io(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!("key file already exists at {}", path.display()),
    ))
}

#[cfg(test)]
pub(crate) mod test_keys {
    use std::sync::OnceLock;

    use rand_chacha::ChaCha20Rng;
    use rand_chacha::rand_core::SeedableRng;

    use super::*;

    fn seeded(seed: u8) -> KeyPair {
        let mut rng = ChaCha20Rng::from_seed([seed; 32]);
        generate_key_pair_with_rng(&mut rng, KEY_BITS).unwrap()
    }

    /// Deterministic key pair shared by unit tests.
    pub fn primary() -> &'static KeyPair {
        static KEYS: OnceLock<KeyPair> = OnceLock::new();
        KEYS.get_or_init(|| seeded(1))
    }

    /// A second, unrelated key pair.
    pub fn secondary() -> &'static KeyPair {
        static KEYS: OnceLock<KeyPair> = OnceLock::new();
        KEYS.get_or_init(|| seeded(2))
    }
}
