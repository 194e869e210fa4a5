//! Bucket usage accounting

use crate::client::MetaClient;
use objmeta_common::{Object, Result};

/// A signed change to a bucket's byte usage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageDelta {
    bucket: String,
    bytes: i64,
}

impl UsageDelta {
    /// Usage released by removing `object`
    #[must_use]
    pub fn removal(object: &Object) -> Self {
        Self {
            bucket: object.bucket_name.clone(),
            bytes: -object.size,
        }
    }

    /// Usage charged for a new `object`
    #[must_use]
    pub fn creation(object: &Object) -> Self {
        Self {
            bucket: object.bucket_name.clone(),
            bytes: object.size,
        }
    }

    /// Usage change when `new` supersedes `old`
    #[must_use]
    pub fn replacement(old: &Object, new: &Object) -> Self {
        Self {
            bucket: new.bucket_name.clone(),
            bytes: new.size - old.size,
        }
    }

    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    #[must_use]
    pub const fn bytes(&self) -> i64 {
        self.bytes
    }

    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.bytes == 0
    }

    /// Stage the change in `tx`
    pub fn apply<C: MetaClient + ?Sized>(&self, client: &C, tx: &C::Tx) -> Result<()> {
        if self.is_zero() {
            return Ok(());
        }
        client.update_usage(&self.bucket, self.bytes, tx)
    }
}
