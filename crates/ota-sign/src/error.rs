use std::io;

/// Errors from signing, verifying and key handling.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("invalid key material: {0}")]
    Key(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("refusing to sign an empty firmware image")]
    EmptyImage,
    #[error("malformed signed image: {len} bytes, need more than {min}")]
    MalformedImage { len: usize, min: usize },
    /// Deliberately carries no detail about which check failed.
    #[error("signature verification failed")]
    SignatureMismatch,
}

impl ImageError {
    /// True for the verifier's verdicts, as opposed to operational failures.
    ///
    /// A rejection is permanent for that exact byte sequence.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ImageError::MalformedImage { .. } | ImageError::SignatureMismatch
        )
    }
}

impl From<rsa::pkcs1::Error> for ImageError {
    fn from(error: rsa::pkcs1::Error) -> Self {
        Self::Key(error.to_string())
    }
}

impl From<rsa::pkcs8::Error> for ImageError {
    fn from(error: rsa::pkcs8::Error) -> Self {
        Self::Key(error.to_string())
    }
}

impl From<rsa::pkcs8::spki::Error> for ImageError {
    fn from(error: rsa::pkcs8::spki::Error) -> Self {
        Self::Key(error.to_string())
    }
}
