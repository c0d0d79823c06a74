//! Write-ahead log record shape and the no-op default implementation.

use crate::error::Result;
use crate::interfaces::Wal;
use crate::version::Version;

/// One write-ahead log entry describing a single key update.
#[derive(Debug, Clone)]
pub struct DataRecord {
    /// The affected key.
    pub key: Vec<u8>,
    /// The new value, or `None` for a removal.
    pub value: Option<Vec<u8>>,
    /// The version the update was committed at.
    pub version: Version,
    /// CRC32 checksum of `key` and `value`, computed at construction.
    pub checksum: u32,
}

impl DataRecord {
    /// Builds a record and computes its checksum, mirroring the teacher's
    /// `crc32fast`-checksummed WAL frames.
    pub fn new(key: Vec<u8>, value: Option<Vec<u8>>, version: Version) -> Self {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&key);
        if let Some(v) = &value {
            hasher.update(v);
        }
        let checksum = hasher.finalize();
        Self {
            key,
            value,
            version,
            checksum,
        }
    }

    /// Recomputes the checksum and compares it against the stored one.
    pub fn verify(&self) -> bool {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.key);
        if let Some(v) = &self.value {
            hasher.update(v);
        }
        hasher.finalize() == self.checksum
    }
}

/// A [`Wal`] that discards every record, for configurations without
/// durability (e.g. `AtomicityMode::EventuallyConsistent` test setups).
#[derive(Debug, Default)]
pub struct NoopWal;

impl Wal for NoopWal {
    fn append(&self, _record: &DataRecord) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_detects_tampering() {
        let mut record = DataRecord::new(b"k".to_vec(), Some(b"v".to_vec()), Version::zero());
        assert!(record.verify());
        record.value = Some(b"tampered".to_vec());
        assert!(!record.verify());
    }

    #[test]
    fn noop_wal_accepts_every_record() {
        let wal = NoopWal;
        let record = DataRecord::new(b"k".to_vec(), None, Version::zero());
        assert!(wal.append(&record).is_ok());
    }
}
