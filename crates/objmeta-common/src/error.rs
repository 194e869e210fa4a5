//! Error types for objmeta
//!
//! This module defines the domain error taxonomy produced by the metadata
//! engine. The protocol layer maps these to wire-level status codes.

use thiserror::Error;

/// Common result type for objmeta operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for objmeta
#[derive(Debug, Error)]
pub enum Error {
    // Domain errors
    #[error("no such bucket: {0}")]
    NoSuchBucket(String),

    #[error("no such key: {bucket}/{key}")]
    NoSuchKey { bucket: String, key: String },

    #[error("no such upload: {upload_id}")]
    NoSuchUpload { upload_id: String },

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("internal error: {0}")]
    Internal(String),

    // Store errors
    #[error("metadata store error: {0}")]
    Store(String),

    #[error("transaction conflict: {0}")]
    TransactionConflict(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Create a `NoSuchKey` error
    pub fn no_such_key(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NoSuchKey {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a not implemented error
    pub fn not_implemented(feature: impl Into<String>) -> Self {
        Self::NotImplemented(feature.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Check if this is a not found error
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NoSuchBucket(_) | Self::NoSuchKey { .. } | Self::NoSuchUpload { .. }
        )
    }

    /// Get S3 error code for API compatibility
    #[must_use]
    pub const fn s3_error_code(&self) -> &'static str {
        match self {
            Self::NoSuchBucket(_) => "NoSuchBucket",
            Self::NoSuchKey { .. } => "NoSuchKey",
            Self::NoSuchUpload { .. } => "NoSuchUpload",
            Self::NotImplemented(_) => "NotImplemented",
            Self::TransactionConflict(_) => "OperationAborted",
            _ => "InternalError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_not_found() {
        assert!(Error::NoSuchBucket("b".into()).is_not_found());
        assert!(Error::no_such_key("b", "k").is_not_found());
        assert!(!Error::internal("boom").is_not_found());
        assert!(!Error::store("io").is_not_found());
    }

    #[test]
    fn test_error_s3_code() {
        assert_eq!(Error::no_such_key("b", "k").s3_error_code(), "NoSuchKey");
        assert_eq!(Error::NoSuchBucket("b".into()).s3_error_code(), "NoSuchBucket");
        assert_eq!(
            Error::not_implemented("suspended versioning").s3_error_code(),
            "NotImplemented"
        );
        assert_eq!(Error::store("disk").s3_error_code(), "InternalError");
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::no_such_key("photos", "cat.png").to_string(),
            "no such key: photos/cat.png"
        );
    }
}
