//! Signing and verification of firmware images for OTA updates.
//!
//! A signed image is the raw firmware followed by a 256-byte RSASSA-PKCS1-v1_5
//! signature over the SHA-256 digest of the firmware:
//!
//! ```no_run
//! use ota_sign::{ImageVerifier, RsaImageSigner, generate_key_pair};
//!
//! let keys = generate_key_pair(2048)?;
//! let signer = RsaImageSigner::new(keys.private_key().clone())?;
//! let verifier = ImageVerifier::new(keys.public_key().clone())?;
//!
//! let signed = signer.sign(b"firmware")?;
//! assert_eq!(verifier.verify(signed.as_bytes())?, b"firmware");
//! # Ok::<(), ota_sign::ImageError>(())
//! ```

pub mod digest;
pub mod error;
pub mod image;
pub mod keys;
pub mod report;
pub mod signer;
pub mod stream;
pub mod verifier;

pub use digest::{DIGEST_LEN, Digest, ImageHasher, digest, digest_reader};
pub use error::ImageError;
pub use image::{SIGNATURE_LEN, SignedImage, hex_dump, split_signed};
pub use keys::{KeyPair, generate_key_pair, generate_key_pair_with_rng};
pub use report::{SigningReport, VerificationReport};
pub use signer::{ImageSigner, RSA_PKCS1V15_SHA256, RsaImageSigner, sign_image};
pub use stream::{StreamVerifier, VerifiedImage};
pub use verifier::ImageVerifier;
