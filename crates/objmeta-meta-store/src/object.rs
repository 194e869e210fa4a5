//! Object metadata engine
//!
//! [`Meta`] is the single entry point the protocol layer uses to read and
//! mutate object metadata. Reads go through the read-through cache; every
//! write invalidates the cache keys it touches. Mutations spanning more
//! than one record run inside one store transaction via
//! [`Meta::in_transaction`], so they either fully apply or leave no trace.

use crate::client::MetaClient;
use crate::store::RedbMetaStore;
use crate::txn::TxGuard;
use crate::usage::UsageDelta;
use crate::version::VersionClock;
use objmeta_cache::{OBJECT_TABLE, ReadThroughCache, ShardedCache, latest_key, version_key};
use objmeta_common::{
    Config, Error, Multipart, Object, RequestContext, Result, VersionId, Versioning,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Object metadata engine
pub struct Meta<C: MetaClient> {
    client: Arc<C>,
    cache: ReadThroughCache<Object>,
    clock: VersionClock,
}

impl Meta<RedbMetaStore> {
    /// Open the redb store and build the cache described by `config`
    pub fn open(config: &Config) -> Result<Self> {
        let store = RedbMetaStore::open(&config.store.path)?;
        let cache = ShardedCache::from_config(&config.cache, &config.ring)?;
        info!(path = %config.store.path.display(), shards = cache.shard_count(), "Opened metadata store");
        Ok(Self::new(Arc::new(store), cache))
    }
}

impl<C: MetaClient> Meta<C> {
    pub fn new(client: Arc<C>, cache: ShardedCache) -> Self {
        Self {
            client,
            cache: ReadThroughCache::new(cache),
            clock: VersionClock::new(),
        }
    }

    pub const fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub const fn cache(&self) -> &ReadThroughCache<Object> {
        &self.cache
    }

    /// Run `f` inside a store transaction.
    ///
    /// Commits when `f` succeeds; any error from `f` aborts the transaction
    /// exactly once and is returned unchanged.
    ///
    /// `f` may only use the [`MetaClient`] methods that take the handle.
    /// The others open their own write transaction, and the store allows
    /// one writer at a time, so calling one from `f` never returns.
    pub fn in_transaction<T>(&self, f: impl FnOnce(&C::Tx) -> Result<T>) -> Result<T> {
        let guard = TxGuard::begin(self.client.as_ref())?;
        let value = f(guard.tx()?)?;
        guard.commit()?;
        Ok(value)
    }

    /// Latest version of `name`.
    ///
    /// A delete marker as the latest version reads as a missing key.
    pub fn get_object(&self, bucket: &str, name: &str, will_need: bool) -> Result<Object> {
        let object = self.cache.get(
            OBJECT_TABLE,
            &latest_key(bucket, name),
            || self.fetch(bucket, name, None),
            will_need,
        )?;
        if object.delete_marker {
            return Err(Error::no_such_key(bucket, name));
        }
        Ok(object)
    }

    /// One specific version of `name`, delete markers included
    pub fn get_object_version(
        &self,
        bucket: &str,
        name: &str,
        version: &VersionId,
        will_need: bool,
    ) -> Result<Object> {
        self.cache.get(
            OBJECT_TABLE,
            &version_key(bucket, name, version),
            || self.fetch(bucket, name, Some(version)),
            will_need,
        )
    }

    fn fetch(&self, bucket: &str, name: &str, version: Option<&VersionId>) -> Result<Object> {
        let object = self.client.get_object(bucket, name, version)?;
        if object.name != name {
            return Err(Error::no_such_key(bucket, name));
        }
        Ok(object)
    }

    /// Persist a new object version.
    ///
    /// The version id is assigned here from the bucket's versioning state.
    /// When the request context carries a record with the same version id,
    /// that record is overwritten and its payload queued for collection.
    pub fn put_object(
        &self,
        ctx: &RequestContext,
        object: &mut Object,
        multipart: Option<&Multipart>,
        update_usage: bool,
    ) -> Result<()> {
        let bucket = ctx
            .bucket_info
            .as_ref()
            .ok_or_else(|| Error::NoSuchBucket(ctx.bucket_name.clone()))?;
        object.version_id = self.next_version(bucket.versioning, object)?;

        let prior = ctx
            .object_info
            .as_ref()
            .filter(|prior| prior.version_id == object.version_id);
        match prior {
            Some(prior) => self
                .client
                .update_object(object, prior, multipart, update_usage)?,
            None => self.client.put_object(object, multipart, update_usage)?,
        }

        self.invalidate(object);
        debug!(
            request_id = %ctx.request_id,
            bucket = %object.bucket_name,
            object = %object.name,
            version = %object.version_id,
            overwrite = prior.is_some(),
            "Stored object metadata"
        );
        Ok(())
    }

    fn next_version(&self, versioning: Versioning, object: &mut Object) -> Result<VersionId> {
        match versioning {
            Versioning::Disabled => Ok(VersionId::null()),
            Versioning::Enabled => {
                let nanos = self.clock.next();
                object.last_modified = nanos;
                Ok(VersionId::from_nanos(nanos))
            }
            Versioning::Suspended => Err(Error::not_implemented("suspended bucket versioning")),
        }
    }

    /// Hide `ctx.object_name` behind a delete marker, keeping older
    /// versions readable by version id
    pub fn add_delete_marker(&self, ctx: &RequestContext) -> Result<Object> {
        let bucket = ctx
            .bucket_info
            .as_ref()
            .ok_or_else(|| Error::NoSuchBucket(ctx.bucket_name.clone()))?;
        if bucket.versioning != Versioning::Enabled {
            return Err(Error::not_implemented(
                "delete markers require versioning enabled",
            ));
        }

        let mut marker =
            Object::new_delete_marker(&ctx.bucket_name, &ctx.object_name, &bucket.owner_id);
        marker.version_id = self.next_version(bucket.versioning, &mut marker)?;
        self.client.put_object(&marker, None, false)?;
        self.invalidate(&marker);
        Ok(marker)
    }

    /// Swap in the restored or promoted copy of an archived object and
    /// queue `source` for collection, all in one transaction
    pub fn update_glacier_object(
        &self,
        target: &Object,
        source: &Object,
        is_freezer: bool,
    ) -> Result<()> {
        self.in_transaction(|tx| {
            if is_freezer {
                self.client.update_freezer_object(target, tx)?;
                self.client
                    .delete_freezer(&source.bucket_name, &source.name, tx)?;
            } else {
                self.client.put_object_in(target, tx)?;
                UsageDelta::creation(target).apply(self.client.as_ref(), tx)?;
            }
            self.client.put_object_to_garbage_collection(source, tx)
        })?;
        self.invalidate(target);
        Ok(())
    }

    pub fn update_object_acl(&self, object: &Object) -> Result<()> {
        self.client.update_object_acl(object)?;
        self.invalidate(object);
        Ok(())
    }

    pub fn update_object_attrs(&self, object: &Object) -> Result<()> {
        self.client.update_object_attrs(object)?;
        self.invalidate(object);
        Ok(())
    }

    /// Move `source_name` to `object.name`
    pub fn rename_object(&self, object: &Object, source_name: &str) -> Result<()> {
        self.client.rename_object(object, source_name)?;
        self.invalidate(object);
        self.invalidate_keys(&object.bucket_name, source_name, &object.version_id);
        Ok(())
    }

    pub fn replace_object_metas(&self, object: &Object) -> Result<()> {
        self.client.replace_object_metas(object)?;
        self.invalidate(object);
        Ok(())
    }

    /// Release the usage of a superseded version
    pub fn delete_old_object(&self, object: &Object) -> Result<()> {
        self.in_transaction(|tx| UsageDelta::removal(object).apply(self.client.as_ref(), tx))
    }

    /// Remove a version, queue its payload for collection and release its
    /// usage, atomically
    pub fn delete_object(&self, object: &Object) -> Result<()> {
        self.in_transaction(|tx| {
            self.client.delete_object(object, tx)?;
            if !object.delete_marker {
                self.client.put_object_to_garbage_collection(object, tx)?;
            }
            UsageDelta::removal(object).apply(self.client.as_ref(), tx)
        })?;
        self.invalidate(object);
        Ok(())
    }

    /// Create (`is_exist == false`) or grow an appendable object
    pub fn append_object(&self, object: &Object, is_exist: bool) -> Result<()> {
        if is_exist {
            self.client.update_append_object(object)?;
        } else {
            self.client.put_object(object, None, true)?;
        }
        self.invalidate(object);
        Ok(())
    }

    pub fn create_multipart(&self, ctx: &RequestContext, multipart: &Multipart) -> Result<()> {
        if ctx.bucket_info.is_none() {
            return Err(Error::NoSuchBucket(ctx.bucket_name.clone()));
        }
        self.client.put_multipart(multipart)
    }

    pub fn get_multipart(&self, bucket: &str, name: &str, upload_id: &str) -> Result<Multipart> {
        self.client.get_multipart(bucket, name, upload_id)
    }

    pub fn abort_multipart(&self, multipart: &Multipart) -> Result<()> {
        self.client.delete_multipart(multipart)
    }

    fn invalidate(&self, object: &Object) {
        self.invalidate_keys(&object.bucket_name, &object.name, &object.version_id);
    }

    fn invalidate_keys(&self, bucket: &str, name: &str, version: &VersionId) {
        self.cache.invalidate(OBJECT_TABLE, &latest_key(bucket, name));
        self.cache
            .invalidate(OBJECT_TABLE, &version_key(bucket, name, version));
    }
}
