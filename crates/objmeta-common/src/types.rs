//! Core type definitions for objmeta
//!
//! This module defines the metadata records tracked by the control plane:
//! objects and their versions, multipart uploads, garbage collection
//! entries, freezer (tiered) copies, buckets and the request context handed
//! in by the protocol layer.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Version id used for objects written while versioning is disabled
pub const NULL_VERSION: &str = "null";

/// Current wall-clock time as nanoseconds since the unix epoch
#[must_use]
pub fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
}

/// Identifier of an object's payload in the data plane
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// Generate a new random payload ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get as bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Object version identifier.
///
/// Either the null-version sentinel or a 20-digit decimal token equal to
/// `u64::MAX - nanos`. Tokens are fixed width, so lexical order equals
/// numeric order and the newest version sorts first.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct VersionId(String);

impl VersionId {
    /// The null-version sentinel
    #[must_use]
    pub fn null() -> Self {
        Self(NULL_VERSION.to_string())
    }

    /// Version token for a write issued at `nanos`
    #[must_use]
    pub fn from_nanos(nanos: u64) -> Self {
        Self(format!("{:020}", u64::MAX - nanos))
    }

    /// Wrap a version id received from a client (no validation)
    #[must_use]
    pub fn new_unchecked(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == NULL_VERSION
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VersionId {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Debug for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionId({:?})", self.0)
    }
}

/// Bucket versioning state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Versioning {
    /// Versioning was never enabled; every write uses the null version
    #[default]
    Disabled,
    /// Every write gets a fresh version token
    Enabled,
    /// Versioning was enabled and later suspended
    Suspended,
}

/// Storage tier of an object's payload
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageClass {
    #[default]
    Standard,
    StandardIa,
    /// Frozen tier; payload must be restored before it can be read
    Glacier,
}

impl StorageClass {
    /// S3 storage class name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::StandardIa => "STANDARD_IA",
            Self::Glacier => "GLACIER",
        }
    }
}

/// Canned ACL attached to an object or upload
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CannedAcl {
    #[default]
    Private,
    PublicRead,
    PublicReadWrite,
    AuthenticatedRead,
    BucketOwnerRead,
    BucketOwnerFullControl,
}

/// How an object's payload was written
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectType {
    /// Single-shot put
    #[default]
    Normal,
    /// Completed multipart upload
    Multipart,
    /// Object grown through append writes
    Appendable,
}

/// One part of a multipart object
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    /// Part number (1-based)
    pub part_number: u32,
    /// Size in bytes
    pub size: i64,
    /// Payload id of this part
    pub object_id: ObjectId,
    /// Offset of this part within the assembled object
    pub offset: i64,
    pub etag: String,
    /// Unix nanos
    pub last_modified: u64,
}

/// Metadata record of one object version
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    pub bucket_name: String,
    pub name: String,
    pub version_id: VersionId,
    /// Payload id in the data plane
    pub object_id: ObjectId,
    /// Data-plane cluster holding the payload
    pub location: String,
    /// Pool within the cluster
    pub pool: String,
    pub owner_id: String,
    /// Size in bytes, used for usage accounting
    pub size: i64,
    /// Unix nanos
    pub last_modified: u64,
    pub etag: String,
    pub content_type: String,
    pub acl: CannedAcl,
    /// User and system attributes
    pub custom_attributes: HashMap<String, String>,
    pub storage_class: StorageClass,
    pub object_type: ObjectType,
    /// Parts of a completed multipart upload, keyed by part number
    pub parts: BTreeMap<u32, Part>,
    pub delete_marker: bool,
}

impl Object {
    /// Create a single-shot object record stamped with the current time
    #[must_use]
    pub fn new(bucket_name: impl Into<String>, name: impl Into<String>, size: i64) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            name: name.into(),
            size,
            last_modified: now_nanos(),
            ..Self::default()
        }
    }

    /// Create a delete marker for `name`
    #[must_use]
    pub fn new_delete_marker(
        bucket_name: impl Into<String>,
        name: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            delete_marker: true,
            ..Self::new(bucket_name, name, 0)
        }
    }

    /// Whether this object is the result of a completed multipart upload
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        !self.parts.is_empty()
    }
}

/// In-progress multipart upload
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Multipart {
    pub bucket_name: String,
    pub object_name: String,
    pub upload_id: String,
    pub initiator_id: String,
    /// Unix nanos
    pub initiated: u64,
    pub content_type: String,
    pub acl: CannedAcl,
    pub custom_attributes: HashMap<String, String>,
    pub storage_class: StorageClass,
    pub parts: BTreeMap<u32, Part>,
}

impl Multipart {
    /// Start a new upload with a fresh upload id
    #[must_use]
    pub fn new(bucket_name: impl Into<String>, object_name: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            object_name: object_name.into(),
            upload_id: Uuid::new_v4().simple().to_string(),
            initiated: now_nanos(),
            ..Self::default()
        }
    }

    /// Total size of all uploaded parts
    #[must_use]
    pub fn size(&self) -> i64 {
        self.parts.values().map(|p| p.size).sum()
    }
}

/// Payload waiting to be reclaimed by the garbage collection sweeper
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GarbageCollection {
    pub bucket_name: String,
    pub object_name: String,
    pub version_id: VersionId,
    pub object_id: ObjectId,
    pub location: String,
    pub pool: String,
    pub size: i64,
    pub storage_class: StorageClass,
    pub parts: BTreeMap<u32, Part>,
    /// Unix nanos
    pub enqueued_at: u64,
}

impl From<&Object> for GarbageCollection {
    fn from(object: &Object) -> Self {
        Self {
            bucket_name: object.bucket_name.clone(),
            object_name: object.name.clone(),
            version_id: object.version_id.clone(),
            object_id: object.object_id,
            location: object.location.clone(),
            pool: object.pool.clone(),
            size: object.size,
            storage_class: object.storage_class,
            parts: object.parts.clone(),
            enqueued_at: now_nanos(),
        }
    }
}

/// Progress of a tiered copy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FreezerStatus {
    #[default]
    Init,
    Restoring,
    Finished,
}

/// Tiered (glacier) copy of an object
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Freezer {
    pub object: Object,
    pub status: FreezerStatus,
}

/// Bucket information resolved by the protocol layer
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub name: String,
    pub owner_id: String,
    pub versioning: Versioning,
}

impl Bucket {
    #[must_use]
    pub fn new(name: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner_id: owner_id.into(),
            versioning: Versioning::Disabled,
        }
    }

    #[must_use]
    pub const fn with_versioning(mut self, versioning: Versioning) -> Self {
        self.versioning = versioning;
        self
    }
}

/// Parsed request state handed to the engine by the protocol layer
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub request_id: String,
    pub bucket_name: String,
    pub object_name: String,
    /// `None` when the bucket does not exist
    pub bucket_info: Option<Bucket>,
    /// `Some` when a version of the object already exists
    pub object_info: Option<Object>,
}

impl RequestContext {
    #[must_use]
    pub fn new(
        request_id: impl Into<String>,
        bucket_name: impl Into<String>,
        object_name: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            bucket_name: bucket_name.into(),
            object_name: object_name.into(),
            bucket_info: None,
            object_info: None,
        }
    }

    #[must_use]
    pub fn with_bucket(mut self, bucket: Bucket) -> Self {
        self.bucket_info = Some(bucket);
        self
    }

    #[must_use]
    pub fn with_object(mut self, object: Object) -> Self {
        self.object_info = Some(object);
        self
    }
}
