//! Dataset fingerprinting, so operators can tell which capture is replaying

use sha2::{Digest, Sha256};

/// Number of digest bytes shown in logs
pub const SHORT_LEN: usize = 8;

/// SHA-256 digest of a source file's raw bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetFingerprint([u8; 32]);

impl DatasetFingerprint {
    /// Hash raw source bytes
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((data.len() as u64).to_le_bytes());
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Abbreviated hex form
    pub fn short(&self) -> String {
        hex::encode(&self.0[..SHORT_LEN])
    }
}

impl std::fmt::Display for DatasetFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
