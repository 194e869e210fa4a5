//! Metadata store client abstraction
//!
//! The engine talks to persistent storage only through [`MetaClient`].
//! Methods taking a transaction handle stage their writes in it; nothing
//! they do is visible until [`MetaClient::commit_trans`] succeeds, and
//! [`MetaClient::abort_trans`] discards all of it. Methods without a
//! handle are atomic on their own.

use objmeta_common::{
    Freezer, GarbageCollection, Multipart, Object, Result, VersionId,
};

/// Transactional access to object, multipart, GC, freezer and usage records
pub trait MetaClient: Send + Sync {
    /// Transaction handle
    type Tx;

    fn new_trans(&self) -> Result<Self::Tx>;

    fn commit_trans(&self, tx: Self::Tx) -> Result<()>;

    fn abort_trans(&self, tx: Self::Tx) -> Result<()>;

    /// Fetch one version, or the newest version when `version` is `None`
    fn get_object(&self, bucket: &str, name: &str, version: Option<&VersionId>) -> Result<Object>;

    /// Create a record. A given multipart upload is consumed; with
    /// `update_usage` the bucket is charged the object's size.
    fn put_object(
        &self,
        object: &Object,
        multipart: Option<&Multipart>,
        update_usage: bool,
    ) -> Result<()>;

    /// Overwrite `prior` (same key) with `object`. The superseded payload
    /// is queued for garbage collection and usage moves by the size delta.
    fn update_object(
        &self,
        object: &Object,
        prior: &Object,
        multipart: Option<&Multipart>,
        update_usage: bool,
    ) -> Result<()>;

    /// Store the grown record of an appendable object
    fn update_append_object(&self, object: &Object) -> Result<()>;

    /// Write a record inside `tx` without touching usage
    fn put_object_in(&self, object: &Object, tx: &Self::Tx) -> Result<()>;

    fn delete_object(&self, object: &Object, tx: &Self::Tx) -> Result<()>;

    fn put_object_to_garbage_collection(&self, object: &Object, tx: &Self::Tx) -> Result<()>;

    fn delete_freezer(&self, bucket: &str, name: &str, tx: &Self::Tx) -> Result<()>;

    /// Overwrite an existing record with its restored copy
    fn update_freezer_object(&self, object: &Object, tx: &Self::Tx) -> Result<()>;

    /// Add `delta` bytes (possibly negative) to the bucket's usage
    fn update_usage(&self, bucket: &str, delta: i64, tx: &Self::Tx) -> Result<()>;

    fn update_object_acl(&self, object: &Object) -> Result<()>;

    fn update_object_attrs(&self, object: &Object) -> Result<()>;

    /// Move the record stored under `source_name` to `object.name`
    fn rename_object(&self, object: &Object, source_name: &str) -> Result<()>;

    /// Replace content type and user metadata
    fn replace_object_metas(&self, object: &Object) -> Result<()>;

    fn put_multipart(&self, multipart: &Multipart) -> Result<()>;

    fn get_multipart(&self, bucket: &str, name: &str, upload_id: &str) -> Result<Multipart>;

    fn delete_multipart(&self, multipart: &Multipart) -> Result<()>;

    fn put_freezer(&self, freezer: &Freezer) -> Result<()>;

    fn get_freezer(&self, bucket: &str, name: &str) -> Result<Freezer>;

    /// Bytes currently charged to `bucket`
    fn get_usage(&self, bucket: &str) -> Result<i64>;

    /// Oldest-key-first page of pending GC entries
    fn list_garbage_collection(&self, limit: usize) -> Result<Vec<GarbageCollection>>;

    fn remove_garbage_collection(&self, entry: &GarbageCollection) -> Result<()>;
}
