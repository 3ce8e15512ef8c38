//! On-disk position record.

use crate::error::PersistenceError;

/// Sentinel of a record written at clean shutdown.
pub const GOOD_MAGIC: i32 = 0xBAAD_DAAD_u32 as i32;

/// Sentinel written before the first step of a run.
pub const BAD_MAGIC: i32 = 0xDEAD_BEEF_u32 as i32;

/// Size of an encoded record in bytes.
pub const RECORD_LEN: usize = 12;

/// Byte offset of each field.
pub(crate) const CURRENT_POS_OFFSET: u64 = 0;
pub(crate) const HOME_POS_OFFSET: u64 = 4;
pub(crate) const MAGIC_OFFSET: u64 = 8;

/// Stage position as stored between runs.
///
/// Three little-endian `i32`s: current position, home position, sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistedRecord {
    /// Absolute stage position in steps.
    pub current_pos: i32,
    /// Operator-defined home in steps.
    pub home_pos: i32,
    /// [`GOOD_MAGIC`] if the position can be trusted.
    pub valid_magic: i32,
}

impl PersistedRecord {
    /// A trustworthy record.
    pub fn valid(current_pos: i32, home_pos: i32) -> Self {
        Self {
            current_pos,
            home_pos,
            valid_magic: GOOD_MAGIC,
        }
    }

    /// Whether the sentinel marks a clean shutdown.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid_magic == GOOD_MAGIC
    }

    /// Serialize to the on-disk layout.
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        out[0..4].copy_from_slice(&self.current_pos.to_le_bytes());
        out[4..8].copy_from_slice(&self.home_pos.to_le_bytes());
        out[8..12].copy_from_slice(&self.valid_magic.to_le_bytes());
        out
    }

    /// Parse the on-disk layout.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::SizeMismatch` unless `bytes` is exactly one record.
    pub fn decode(bytes: &[u8]) -> Result<Self, PersistenceError> {
        let bytes: &[u8; RECORD_LEN] =
            bytes.try_into().map_err(|_| PersistenceError::SizeMismatch {
                found: bytes.len() as u64,
                expected: RECORD_LEN as u64,
            })?;
        let field = |at: usize| i32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        Ok(Self {
            current_pos: field(0),
            home_pos: field(4),
            valid_magic: field(8),
        })
    }
}
