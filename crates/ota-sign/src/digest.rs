use std::io::{self, Read};

use sha2::{Digest as _, Sha256};

/// Length of an image digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// Block size used when hashing from a reader.
///
/// Matches the buffer the device updater reads update partitions with.
pub const READ_BLOCK_LEN: usize = 1024;

/// SHA-256 digest of a firmware payload.
pub type Digest = [u8; DIGEST_LEN];

/// Hashes a whole in-memory image.
pub fn digest(bytes: &[u8]) -> Digest {
    Sha256::digest(bytes).into()
}

/// Hashes everything `reader` yields until EOF.
pub fn digest_reader<R: Read>(mut reader: R) -> io::Result<Digest> {
    let mut hasher = ImageHasher::new();
    let mut block = [0u8; READ_BLOCK_LEN];
    loop {
        let n = match reader.read(&mut block) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&block[..n]);
    }
    Ok(hasher.finalize())
}

/// Incremental image hasher, for payloads that arrive in pieces.
#[derive(Clone, Default)]
pub struct ImageHasher {
    inner: Sha256,
    len: u64,
}

impl ImageHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
        self.len += bytes.len() as u64;
    }

    /// Number of bytes hashed so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn finalize(self) -> Digest {
        self.inner.finalize().into()
    }
}
