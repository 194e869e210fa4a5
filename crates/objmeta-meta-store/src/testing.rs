//! Failure-injecting [`MetaClient`] for engine tests

use crate::client::MetaClient;
use crate::store::RedbMetaStore;
use objmeta_common::{
    Error, Freezer, GarbageCollection, Multipart, Object, Result, VersionId,
};
use parking_lot::Mutex;
use redb::WriteTransaction;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Client call that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    DeleteObject,
    GarbageCollection,
    Usage,
    FreezerUpdate,
    FreezerDelete,
    PutIn,
    Commit,
}

/// Wraps a [`RedbMetaStore`], counting transaction outcomes and store
/// writes, and failing one chosen step on demand
pub struct FaultyClient {
    inner: RedbMetaStore,
    fail_at: Mutex<Option<Step>>,
    commits: AtomicUsize,
    aborts: AtomicUsize,
    writes: AtomicUsize,
}

impl FaultyClient {
    pub fn new(inner: RedbMetaStore) -> Self {
        Self {
            inner,
            fail_at: Mutex::new(None),
            commits: AtomicUsize::new(0),
            aborts: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub const fn inner(&self) -> &RedbMetaStore {
        &self.inner
    }

    pub fn fail_at(&self, step: Step) {
        *self.fail_at.lock() = Some(step);
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn aborts(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }

    /// Writes attempted through this client, transactional or not
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check(&self, step: Step) -> Result<()> {
        if *self.fail_at.lock() == Some(step) {
            return Err(Error::store(format!("injected failure at {step:?}")));
        }
        Ok(())
    }

    fn write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

impl MetaClient for FaultyClient {
    type Tx = WriteTransaction;

    fn new_trans(&self) -> Result<WriteTransaction> {
        self.inner.new_trans()
    }

    fn commit_trans(&self, tx: WriteTransaction) -> Result<()> {
        if let Err(e) = self.check(Step::Commit) {
            self.inner.abort_trans(tx)?;
            return Err(e);
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.inner.commit_trans(tx)
    }

    fn abort_trans(&self, tx: WriteTransaction) -> Result<()> {
        self.aborts.fetch_add(1, Ordering::SeqCst);
        self.inner.abort_trans(tx)
    }

    fn get_object(&self, bucket: &str, name: &str, version: Option<&VersionId>) -> Result<Object> {
        self.inner.get_object(bucket, name, version)
    }

    fn put_object(
        &self,
        object: &Object,
        multipart: Option<&Multipart>,
        update_usage: bool,
    ) -> Result<()> {
        self.write();
        self.inner.put_object(object, multipart, update_usage)
    }

    fn update_object(
        &self,
        object: &Object,
        prior: &Object,
        multipart: Option<&Multipart>,
        update_usage: bool,
    ) -> Result<()> {
        self.write();
        self.inner
            .update_object(object, prior, multipart, update_usage)
    }

    fn update_append_object(&self, object: &Object) -> Result<()> {
        self.write();
        self.inner.update_append_object(object)
    }

    fn put_object_in(&self, object: &Object, tx: &WriteTransaction) -> Result<()> {
        self.write();
        self.check(Step::PutIn)?;
        self.inner.put_object_in(object, tx)
    }

    fn delete_object(&self, object: &Object, tx: &WriteTransaction) -> Result<()> {
        self.write();
        self.check(Step::DeleteObject)?;
        self.inner.delete_object(object, tx)
    }

    fn put_object_to_garbage_collection(&self, object: &Object, tx: &WriteTransaction) -> Result<()> {
        self.write();
        self.check(Step::GarbageCollection)?;
        self.inner.put_object_to_garbage_collection(object, tx)
    }

    fn delete_freezer(&self, bucket: &str, name: &str, tx: &WriteTransaction) -> Result<()> {
        self.write();
        self.check(Step::FreezerDelete)?;
        self.inner.delete_freezer(bucket, name, tx)
    }

    fn update_freezer_object(&self, object: &Object, tx: &WriteTransaction) -> Result<()> {
        self.write();
        self.check(Step::FreezerUpdate)?;
        self.inner.update_freezer_object(object, tx)
    }

    fn update_usage(&self, bucket: &str, delta: i64, tx: &WriteTransaction) -> Result<()> {
        self.write();
        self.check(Step::Usage)?;
        self.inner.update_usage(bucket, delta, tx)
    }

    fn update_object_acl(&self, object: &Object) -> Result<()> {
        self.write();
        self.inner.update_object_acl(object)
    }

    fn update_object_attrs(&self, object: &Object) -> Result<()> {
        self.write();
        self.inner.update_object_attrs(object)
    }

    fn rename_object(&self, object: &Object, source_name: &str) -> Result<()> {
        self.write();
        self.inner.rename_object(object, source_name)
    }

    fn replace_object_metas(&self, object: &Object) -> Result<()> {
        self.write();
        self.inner.replace_object_metas(object)
    }

    fn put_multipart(&self, multipart: &Multipart) -> Result<()> {
        self.write();
        self.inner.put_multipart(multipart)
    }

    fn get_multipart(&self, bucket: &str, name: &str, upload_id: &str) -> Result<Multipart> {
        self.inner.get_multipart(bucket, name, upload_id)
    }

    fn delete_multipart(&self, multipart: &Multipart) -> Result<()> {
        self.write();
        self.inner.delete_multipart(multipart)
    }

    fn put_freezer(&self, freezer: &Freezer) -> Result<()> {
        self.write();
        self.inner.put_freezer(freezer)
    }

    fn get_freezer(&self, bucket: &str, name: &str) -> Result<Freezer> {
        self.inner.get_freezer(bucket, name)
    }

    fn get_usage(&self, bucket: &str) -> Result<i64> {
        self.inner.get_usage(bucket)
    }

    fn list_garbage_collection(&self, limit: usize) -> Result<Vec<GarbageCollection>> {
        self.inner.list_garbage_collection(limit)
    }

    fn remove_garbage_collection(&self, entry: &GarbageCollection) -> Result<()> {
        self.write();
        self.inner.remove_garbage_collection(entry)
    }
}
