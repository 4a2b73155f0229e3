//! Error types for `serviceability`.

use std::path::PathBuf;

use crate::validate::ValidationError;

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Coarse error classes callers branch on.
///
/// Every [`IndexError`] falls into exactly one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed merchant id or pincode. Recovered locally, nothing was mutated.
    Validation,
    /// Synthetic generation could not run with the requested parameters.
    Generation,
    /// Reading or writing durable storage failed (missing, corrupt, or unwritable files).
    Io,
    /// The coordinator is not in a state that allows the operation, or an invariant broke.
    State,
}

/// Why a generation request was refused.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// More unique pincodes were requested than exist in the 6-digit space.
    #[error("requested {requested} unique pincodes but only {space} 6-digit values exist")]
    PoolExceedsSpace {
        /// Requested pool size.
        requested: usize,
        /// Size of the pincode space.
        space: usize,
    },

    /// `min > max` for the per-merchant pincode count.
    #[error("invalid pincodes-per-merchant range {min}..={max}")]
    InvalidRange {
        /// Lower bound.
        min: usize,
        /// Upper bound.
        max: usize,
    },

    /// A merchant could be asked for more distinct pincodes than the pool holds.
    #[error("cannot assign up to {per_merchant} distinct pincodes from a pool of {pool}")]
    PoolTooSmall {
        /// Upper bound of pincodes per merchant.
        per_merchant: usize,
        /// Pool size.
        pool: usize,
    },
}

/// Errors returned by the `serviceability` crate.
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// Input rejected by the validator.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Bulk generation refused its parameters.
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Format error (corrupt, unexpected, unsupported).
    #[error("format error: {0}")]
    Format(String),

    /// CRC mismatch (data corruption detected).
    #[error("crc mismatch (expected {expected:#010x}, got {actual:#010x})")]
    CrcMismatch {
        /// CRC stored in the file/record header.
        expected: u32,
        /// CRC computed from the bytes that were read.
        actual: u32,
    },

    /// Encoding error.
    #[error("encode error: {0}")]
    Encode(String),

    /// Decoding error.
    #[error("decode error: {0}")]
    Decode(String),

    /// Invalid state (operation not allowed in current state).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation not supported by the storage backend.
    #[error("operation not supported: {0}")]
    NotSupported(String),

    /// Lock acquisition failed.
    #[error("lock failed on {resource}: {reason}")]
    LockFailed {
        /// What we were trying to lock.
        resource: String,
        /// Human-readable reason (poisoned lock, etc.).
        reason: String,
    },

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Requested path does not exist.
    #[error("missing path: {0}")]
    MissingPath(PathBuf),
}

impl IndexError {
    /// The class this error belongs to.
    pub fn class(&self) -> ErrorClass {
        match self {
            IndexError::Validation(_) => ErrorClass::Validation,
            IndexError::Generation(_) => ErrorClass::Generation,
            IndexError::InvalidState(_) | IndexError::InvalidConfig(_) => ErrorClass::State,
            IndexError::Io(_)
            | IndexError::Format(_)
            | IndexError::CrcMismatch { .. }
            | IndexError::Encode(_)
            | IndexError::Decode(_)
            | IndexError::NotSupported(_)
            | IndexError::LockFailed { .. }
            | IndexError::NotFound(_)
            | IndexError::MissingPath(_) => ErrorClass::Io,
        }
    }

    /// True when the error means "the file is not there" rather than "the file is bad".
    pub fn is_missing(&self) -> bool {
        match self {
            IndexError::MissingPath(_) | IndexError::NotFound(_) => true,
            IndexError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    pub(crate) fn poisoned(resource: &str) -> Self {
        IndexError::LockFailed {
            resource: resource.to_string(),
            reason: "lock poisoned".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_follow_error_kinds() {
        let v = IndexError::from(ValidationError::MalformedPincode("12".into()));
        assert_eq!(v.class(), ErrorClass::Validation);

        let g = IndexError::from(GenerationError::PoolExceedsSpace {
            requested: 1_000_000,
            space: 900_000,
        });
        assert_eq!(g.class(), ErrorClass::Generation);

        let io = IndexError::from(std::io::Error::other("disk full"));
        assert_eq!(io.class(), ErrorClass::Io);
        assert_eq!(IndexError::Decode("x".into()).class(), ErrorClass::Io);
        assert_eq!(IndexError::InvalidState("x".into()).class(), ErrorClass::State);
    }

    #[test]
    fn missing_is_distinct_from_corrupt() {
        assert!(IndexError::MissingPath(PathBuf::from("merchant.json")).is_missing());
        assert!(IndexError::NotFound("merchant.json".into()).is_missing());
        assert!(
            IndexError::from(std::io::Error::from(std::io::ErrorKind::NotFound)).is_missing()
        );
        assert!(!IndexError::Decode("trailing characters".into()).is_missing());
    }
}
