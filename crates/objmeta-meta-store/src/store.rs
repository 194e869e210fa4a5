//! Persistent metadata store backed by redb.
//!
//! Implements [`MetaClient`] on a single redb database. Methods without a
//! transaction handle open their own write txn and commit it before
//! returning, so each of them is atomic. The transaction handle is a plain
//! `redb::WriteTransaction`; redb serializes write transactions, which is
//! the only ordering the engine relies on.

use crate::client::MetaClient;
use crate::tables;
use crate::usage::UsageDelta;
use objmeta_common::{
    Error, Freezer, GarbageCollection, Multipart, Object, Result, VersionId, now_nanos,
};
use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::{debug, error};

/// Error type for metadata store operations
#[derive(Debug, thiserror::Error)]
pub enum MetaStoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::DatabaseError),
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("redb transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redb::TransactionError> for MetaStoreError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Transaction(Box::new(e))
    }
}

impl From<MetaStoreError> for Error {
    fn from(e: MetaStoreError) -> Self {
        match e {
            MetaStoreError::Bincode(e) => Self::Deserialization(e.to_string()),
            MetaStoreError::Io(e) => Self::Io(e),
            other => Self::Store(other.to_string()),
        }
    }
}

pub type MetaStoreResult<T> = std::result::Result<T, MetaStoreError>;

/// Persistent metadata store backed by redb.
pub struct RedbMetaStore {
    db: Database,
}

impl RedbMetaStore {
    /// Open (or create) the redb database at the given path.
    pub fn open(path: impl AsRef<Path>) -> MetaStoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Create all tables eagerly so later read txns don't fail
        let write_txn = db.begin_write()?;
        {
            let _t = write_txn.open_table(tables::OBJECTS)?;
            let _t = write_txn.open_table(tables::MULTIPARTS)?;
            let _t = write_txn.open_table(tables::GARBAGE_COLLECTION)?;
            let _t = write_txn.open_table(tables::FREEZER)?;
            let _t = write_txn.open_table(tables::USAGE)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Run `f` in a fresh write txn and commit it
    fn write<T>(&self, f: impl FnOnce(&WriteTransaction) -> Result<T>) -> Result<T> {
        let txn = self.db.begin_write().map_err(MetaStoreError::from)?;
        match f(&txn) {
            Ok(value) => {
                txn.commit().map_err(MetaStoreError::from)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort_err) = txn.abort() {
                    error!("Failed to abort metadata write: {}", abort_err);
                }
                Err(e)
            }
        }
    }

    fn read_record<T: DeserializeOwned>(
        &self,
        table_def: TableDefinition<&str, &[u8]>,
        key: &str,
    ) -> Result<Option<T>> {
        let read_txn = self.db.begin_read().map_err(MetaStoreError::from)?;
        let table = read_txn
            .open_table(table_def)
            .map_err(MetaStoreError::from)?;
        let bytes = table
            .get(key)
            .map_err(MetaStoreError::from)?
            .map(|v| v.value().to_vec());
        bytes.map(|b| decode(key, &b)).transpose()
    }

    /// Load `key` inside `txn`, apply `f` and write it back
    fn modify_object(&self, object: &Object, f: impl FnOnce(&mut Object)) -> Result<()> {
        self.write(|txn| {
            let key = tables::object_key_of(object);
            let mut stored: Object = get_in(txn, tables::OBJECTS, &key)?
                .ok_or_else(|| Error::no_such_key(&object.bucket_name, &object.name))?;
            f(&mut stored);
            stored.last_modified = now_nanos();
            put_in(txn, tables::OBJECTS, &key, &stored)
        })
    }
}

impl MetaClient for RedbMetaStore {
    type Tx = WriteTransaction;

    fn new_trans(&self) -> Result<WriteTransaction> {
        Ok(self.db.begin_write().map_err(MetaStoreError::from)?)
    }

    fn commit_trans(&self, tx: WriteTransaction) -> Result<()> {
        Ok(tx.commit().map_err(MetaStoreError::from)?)
    }

    fn abort_trans(&self, tx: WriteTransaction) -> Result<()> {
        Ok(tx.abort().map_err(MetaStoreError::from)?)
    }

    fn get_object(&self, bucket: &str, name: &str, version: Option<&VersionId>) -> Result<Object> {
        let found: Option<Object> = match version {
            Some(version) => {
                self.read_record(tables::OBJECTS, &tables::object_key(bucket, name, version))?
            }
            None => {
                let prefix = tables::object_prefix(bucket, name);
                let read_txn = self.db.begin_read().map_err(MetaStoreError::from)?;
                let table = read_txn
                    .open_table(tables::OBJECTS)
                    .map_err(MetaStoreError::from)?;
                // Version tokens sort newest first, so the first key under
                // the prefix is the latest version
                let newest = table
                    .range(prefix.as_str()..)
                    .map_err(MetaStoreError::from)?
                    .next()
                    .transpose()
                    .map_err(MetaStoreError::from)?
                    .and_then(|(k, v)| {
                        let key = k.value();
                        key.starts_with(prefix.as_str())
                            .then(|| (key.to_string(), v.value().to_vec()))
                    });
                newest.map(|(key, bytes)| decode(&key, &bytes)).transpose()?
            }
        };
        found.ok_or_else(|| Error::no_such_key(bucket, name))
    }

    fn put_object(
        &self,
        object: &Object,
        multipart: Option<&Multipart>,
        update_usage: bool,
    ) -> Result<()> {
        self.write(|txn| {
            put_in(txn, tables::OBJECTS, &tables::object_key_of(object), object)?;
            if let Some(multipart) = multipart {
                remove_multipart_in(txn, multipart)?;
            }
            if update_usage {
                add_usage_in(txn, &UsageDelta::creation(object))?;
            }
            Ok(())
        })?;
        debug!(bucket = %object.bucket_name, object = %object.name, version = %object.version_id, "Put object");
        Ok(())
    }

    fn update_object(
        &self,
        object: &Object,
        prior: &Object,
        multipart: Option<&Multipart>,
        update_usage: bool,
    ) -> Result<()> {
        self.write(|txn| {
            put_in(txn, tables::OBJECTS, &tables::object_key_of(object), object)?;
            if !prior.delete_marker && prior.object_id != object.object_id {
                put_gc_in(txn, prior)?;
            }
            if let Some(multipart) = multipart {
                remove_multipart_in(txn, multipart)?;
            }
            if update_usage {
                add_usage_in(txn, &UsageDelta::replacement(prior, object))?;
            }
            Ok(())
        })?;
        debug!(bucket = %object.bucket_name, object = %object.name, version = %object.version_id, "Updated object");
        Ok(())
    }

    fn update_append_object(&self, object: &Object) -> Result<()> {
        self.write(|txn| {
            let key = tables::object_key_of(object);
            let stored: Object = get_in(txn, tables::OBJECTS, &key)?
                .ok_or_else(|| Error::no_such_key(&object.bucket_name, &object.name))?;
            put_in(txn, tables::OBJECTS, &key, object)?;
            add_usage_in(txn, &UsageDelta::replacement(&stored, object))
        })
    }

    fn put_object_in(&self, object: &Object, tx: &WriteTransaction) -> Result<()> {
        put_in(tx, tables::OBJECTS, &tables::object_key_of(object), object)
    }

    fn delete_object(&self, object: &Object, tx: &WriteTransaction) -> Result<()> {
        let key = tables::object_key_of(object);
        let removed = {
            let mut table = tx.open_table(tables::OBJECTS).map_err(MetaStoreError::from)?;
            table
                .remove(key.as_str())
                .map_err(MetaStoreError::from)?
                .is_some()
        };
        if removed {
            Ok(())
        } else {
            Err(Error::no_such_key(&object.bucket_name, &object.name))
        }
    }

    fn put_object_to_garbage_collection(&self, object: &Object, tx: &WriteTransaction) -> Result<()> {
        put_gc_in(tx, object)
    }

    fn delete_freezer(&self, bucket: &str, name: &str, tx: &WriteTransaction) -> Result<()> {
        let mut table = tx.open_table(tables::FREEZER).map_err(MetaStoreError::from)?;
        table
            .remove(tables::freezer_key(bucket, name).as_str())
            .map_err(MetaStoreError::from)?;
        Ok(())
    }

    fn update_freezer_object(&self, object: &Object, tx: &WriteTransaction) -> Result<()> {
        let key = tables::object_key_of(object);
        if get_in::<Object>(tx, tables::OBJECTS, &key)?.is_none() {
            return Err(Error::no_such_key(&object.bucket_name, &object.name));
        }
        put_in(tx, tables::OBJECTS, &key, object)
    }

    fn update_usage(&self, bucket: &str, delta: i64, tx: &WriteTransaction) -> Result<()> {
        let mut table = tx.open_table(tables::USAGE).map_err(MetaStoreError::from)?;
        let current = table
            .get(bucket)
            .map_err(MetaStoreError::from)?
            .map_or(0, |v| v.value());
        table
            .insert(bucket, current + delta)
            .map_err(MetaStoreError::from)?;
        Ok(())
    }

    fn update_object_acl(&self, object: &Object) -> Result<()> {
        self.modify_object(object, |stored| stored.acl = object.acl)
    }

    fn update_object_attrs(&self, object: &Object) -> Result<()> {
        self.modify_object(object, |stored| {
            stored.custom_attributes.clone_from(&object.custom_attributes);
        })
    }

    fn rename_object(&self, object: &Object, source_name: &str) -> Result<()> {
        self.write(|txn| {
            let source_key =
                tables::object_key(&object.bucket_name, source_name, &object.version_id);
            let removed = {
                let mut table = txn.open_table(tables::OBJECTS).map_err(MetaStoreError::from)?;
                table
                    .remove(source_key.as_str())
                    .map_err(MetaStoreError::from)?
                    .is_some()
            };
            if !removed {
                return Err(Error::no_such_key(&object.bucket_name, source_name));
            }
            put_in(txn, tables::OBJECTS, &tables::object_key_of(object), object)
        })
    }

    fn replace_object_metas(&self, object: &Object) -> Result<()> {
        self.modify_object(object, |stored| {
            stored.content_type.clone_from(&object.content_type);
            stored.custom_attributes.clone_from(&object.custom_attributes);
        })
    }

    fn put_multipart(&self, multipart: &Multipart) -> Result<()> {
        let key = tables::multipart_key(
            &multipart.bucket_name,
            &multipart.object_name,
            &multipart.upload_id,
        );
        self.write(|txn| put_in(txn, tables::MULTIPARTS, &key, multipart))
    }

    fn get_multipart(&self, bucket: &str, name: &str, upload_id: &str) -> Result<Multipart> {
        self.read_record(tables::MULTIPARTS, &tables::multipart_key(bucket, name, upload_id))?
            .ok_or_else(|| Error::NoSuchUpload {
                upload_id: upload_id.to_string(),
            })
    }

    fn delete_multipart(&self, multipart: &Multipart) -> Result<()> {
        self.write(|txn| remove_multipart_in(txn, multipart))
    }

    fn put_freezer(&self, freezer: &Freezer) -> Result<()> {
        let key = tables::freezer_key(&freezer.object.bucket_name, &freezer.object.name);
        self.write(|txn| put_in(txn, tables::FREEZER, &key, freezer))
    }

    fn get_freezer(&self, bucket: &str, name: &str) -> Result<Freezer> {
        self.read_record(tables::FREEZER, &tables::freezer_key(bucket, name))?
            .ok_or_else(|| Error::no_such_key(bucket, name))
    }

    fn get_usage(&self, bucket: &str) -> Result<i64> {
        let read_txn = self.db.begin_read().map_err(MetaStoreError::from)?;
        let table = read_txn
            .open_table(tables::USAGE)
            .map_err(MetaStoreError::from)?;
        Ok(table
            .get(bucket)
            .map_err(MetaStoreError::from)?
            .map_or(0, |v| v.value()))
    }

    fn list_garbage_collection(&self, limit: usize) -> Result<Vec<GarbageCollection>> {
        let read_txn = self.db.begin_read().map_err(MetaStoreError::from)?;
        let table = read_txn
            .open_table(tables::GARBAGE_COLLECTION)
            .map_err(MetaStoreError::from)?;
        let mut result = Vec::new();
        for entry in table.iter().map_err(MetaStoreError::from)?.take(limit) {
            let (k, v) = entry.map_err(MetaStoreError::from)?;
            result.push(decode(k.value(), v.value())?);
        }
        Ok(result)
    }

    fn remove_garbage_collection(&self, entry: &GarbageCollection) -> Result<()> {
        let key = tables::gc_key(
            &entry.bucket_name,
            &entry.object_name,
            &entry.version_id,
            &entry.object_id,
        );
        self.write(|txn| {
            let mut table = txn
                .open_table(tables::GARBAGE_COLLECTION)
                .map_err(MetaStoreError::from)?;
            table.remove(key.as_str()).map_err(MetaStoreError::from)?;
            Ok(())
        })
    }
}

// ---- Generic helpers ----

fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| {
        error!("Failed to decode entry '{}': {}", key.replace('\0', "/"), e);
        MetaStoreError::from(e).into()
    })
}

fn get_in<T: DeserializeOwned>(
    txn: &WriteTransaction,
    table_def: TableDefinition<&str, &[u8]>,
    key: &str,
) -> Result<Option<T>> {
    let table = txn.open_table(table_def).map_err(MetaStoreError::from)?;
    let bytes = table
        .get(key)
        .map_err(MetaStoreError::from)?
        .map(|v| v.value().to_vec());
    bytes.map(|b| decode(key, &b)).transpose()
}

fn put_in<T: Serialize>(
    txn: &WriteTransaction,
    table_def: TableDefinition<&str, &[u8]>,
    key: &str,
    value: &T,
) -> Result<()> {
    let bytes = bincode::serialize(value).map_err(|e| Error::Serialization(e.to_string()))?;
    let mut table = txn.open_table(table_def).map_err(MetaStoreError::from)?;
    table
        .insert(key, bytes.as_slice())
        .map_err(MetaStoreError::from)?;
    Ok(())
}

fn put_gc_in(txn: &WriteTransaction, object: &Object) -> Result<()> {
    let key = tables::gc_key(
        &object.bucket_name,
        &object.name,
        &object.version_id,
        &object.object_id,
    );
    put_in(
        txn,
        tables::GARBAGE_COLLECTION,
        &key,
        &GarbageCollection::from(object),
    )
}

fn remove_multipart_in(txn: &WriteTransaction, multipart: &Multipart) -> Result<()> {
    let key = tables::multipart_key(
        &multipart.bucket_name,
        &multipart.object_name,
        &multipart.upload_id,
    );
    let mut table = txn
        .open_table(tables::MULTIPARTS)
        .map_err(MetaStoreError::from)?;
    table.remove(key.as_str()).map_err(MetaStoreError::from)?;
    Ok(())
}

fn add_usage_in(txn: &WriteTransaction, delta: &UsageDelta) -> Result<()> {
    if delta.is_zero() {
        return Ok(());
    }
    let mut table = txn.open_table(tables::USAGE).map_err(MetaStoreError::from)?;
    let current = table
        .get(delta.bucket())
        .map_err(MetaStoreError::from)?
        .map_or(0, |v| v.value());
    table
        .insert(delta.bucket(), current + delta.bytes())
        .map_err(MetaStoreError::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use objmeta_common::{CannedAcl, FreezerStatus, StorageClass};
    use tempfile::TempDir;

    fn open_store() -> (TempDir, RedbMetaStore) {
        let dir = TempDir::new().unwrap();
        let store = RedbMetaStore::open(dir.path().join("meta").join("meta.redb")).unwrap();
        (dir, store)
    }

    fn versioned(bucket: &str, name: &str, size: i64, nanos: u64) -> Object {
        let mut object = Object::new(bucket, name, size);
        object.version_id = VersionId::from_nanos(nanos);
        object
    }

    #[test]
    fn test_open_creates_parent_and_reopens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("meta.redb");
        {
            let store = RedbMetaStore::open(&path).unwrap();
            store.put_object(&Object::new("b", "k", 5), None, true).unwrap();
        }
        let store = RedbMetaStore::open(&path).unwrap();
        assert_eq!(store.get_object("b", "k", None).unwrap().size, 5);
        assert_eq!(store.get_usage("b").unwrap(), 5);
    }

    #[test]
    fn test_get_latest_and_specific_version() {
        let (_dir, store) = open_store();
        let v1 = versioned("b", "k", 1, 1_000);
        let v2 = versioned("b", "k", 2, 2_000);
        store.put_object(&v1, None, false).unwrap();
        store.put_object(&v2, None, false).unwrap();
        store.put_object(&Object::new("b", "k2", 9), None, false).unwrap();

        assert_eq!(store.get_object("b", "k", None).unwrap(), v2);
        assert_eq!(store.get_object("b", "k", Some(&v1.version_id)).unwrap(), v1);
        assert!(store.get_object("b", "k", Some(&VersionId::null())).unwrap_err().is_not_found());
        assert!(store.get_object("b", "missing", None).unwrap_err().is_not_found());
        assert!(store.get_object("b", "", None).unwrap_err().is_not_found());
    }

    #[test]
    fn test_put_consumes_multipart_and_charges_usage() {
        let (_dir, store) = open_store();
        let multipart = Multipart::new("b", "big");
        store.put_multipart(&multipart).unwrap();

        store.put_object(&Object::new("b", "big", 300), Some(&multipart), true).unwrap();

        assert_eq!(store.get_usage("b").unwrap(), 300);
        let err = store.get_multipart("b", "big", &multipart.upload_id).unwrap_err();
        assert!(matches!(err, Error::NoSuchUpload { .. }));
    }

    #[test]
    fn test_update_object_collects_prior_payload() {
        let (_dir, store) = open_store();
        let first = Object::new("b", "k", 100);
        store.put_object(&first, None, true).unwrap();

        let second = Object::new("b", "k", 30);
        store.update_object(&second, &first, None, true).unwrap();

        assert_eq!(store.get_object("b", "k", None).unwrap().object_id, second.object_id);
        assert_eq!(store.get_usage("b").unwrap(), 30);
        let gc = store.list_garbage_collection(10).unwrap();
        assert_eq!(gc.len(), 1);
        assert_eq!(gc[0].object_id, first.object_id);

        store.remove_garbage_collection(&gc[0]).unwrap();
        assert!(store.list_garbage_collection(10).unwrap().is_empty());
    }

    #[test]
    fn test_aborted_transaction_leaves_nothing() {
        let (_dir, store) = open_store();
        let object = Object::new("b", "k", 10);

        let tx = store.new_trans().unwrap();
        store.put_object_in(&object, &tx).unwrap();
        store.put_object_to_garbage_collection(&object, &tx).unwrap();
        store.update_usage("b", 10, &tx).unwrap();
        store.abort_trans(tx).unwrap();

        assert!(store.get_object("b", "k", None).is_err());
        assert!(store.list_garbage_collection(10).unwrap().is_empty());
        assert_eq!(store.get_usage("b").unwrap(), 0);
    }

    #[test]
    fn test_delete_missing_object_fails() {
        let (_dir, store) = open_store();
        let tx = store.new_trans().unwrap();
        let err = store.delete_object(&Object::new("b", "nope", 1), &tx).unwrap_err();
        assert!(err.is_not_found());
        store.abort_trans(tx).unwrap();
    }

    #[test]
    fn test_single_record_mutations() {
        let (_dir, store) = open_store();
        let mut object = Object::new("b", "k", 10);
        object.content_type = "text/plain".into();
        store.put_object(&object, None, false).unwrap();

        object.acl = CannedAcl::PublicRead;
        store.update_object_acl(&object).unwrap();

        object.custom_attributes.insert("X-Amz-Meta-A".into(), "1".into());
        store.update_object_attrs(&object).unwrap();

        object.content_type = "application/json".into();
        store.replace_object_metas(&object).unwrap();

        let stored = store.get_object("b", "k", None).unwrap();
        assert_eq!(stored.acl, CannedAcl::PublicRead);
        assert_eq!(stored.custom_attributes["X-Amz-Meta-A"], "1");
        assert_eq!(stored.content_type, "application/json");

        assert!(store.update_object_acl(&Object::new("b", "other", 0)).unwrap_err().is_not_found());
    }

    #[test]
    fn test_rename_moves_record() {
        let (_dir, store) = open_store();
        let object = Object::new("b", "old", 4);
        store.put_object(&object, None, false).unwrap();

        let mut renamed = object.clone();
        renamed.name = "new".into();
        store.rename_object(&renamed, "old").unwrap();

        assert!(store.get_object("b", "old", None).unwrap_err().is_not_found());
        assert_eq!(store.get_object("b", "new", None).unwrap().object_id, object.object_id);
        assert!(store.rename_object(&renamed, "old").unwrap_err().is_not_found());
    }

    #[test]
    fn test_append_update_adjusts_usage() {
        let (_dir, store) = open_store();
        let mut object = Object::new("b", "log", 10);
        store.put_object(&object, None, true).unwrap();

        object.size = 25;
        store.update_append_object(&object).unwrap();

        assert_eq!(store.get_object("b", "log", None).unwrap().size, 25);
        assert_eq!(store.get_usage("b").unwrap(), 25);
        assert!(store.update_append_object(&Object::new("b", "none", 1)).is_err());
    }

    #[test]
    fn test_freezer_records() {
        let (_dir, store) = open_store();
        let mut object = Object::new("b", "cold", 8);
        object.storage_class = StorageClass::Glacier;
        let freezer = Freezer {
            object: object.clone(),
            status: FreezerStatus::Restoring,
        };
        store.put_freezer(&freezer).unwrap();
        assert_eq!(store.get_freezer("b", "cold").unwrap(), freezer);

        let tx = store.new_trans().unwrap();
        store.delete_freezer("b", "cold", &tx).unwrap();
        store.commit_trans(tx).unwrap();
        assert!(store.get_freezer("b", "cold").unwrap_err().is_not_found());
    }
}
