//! Redb table definitions and key layout for persistent metadata storage.
//!
//! Composite keys join their components with `\x00`, so a prefix scan over
//! `bucket\x00name\x00` visits every version of one object.

use objmeta_common::{Object, ObjectId, VersionId};
use redb::TableDefinition;

// Key: "bucket\x00name\x00version", Value: bincode Object
pub const OBJECTS: TableDefinition<&str, &[u8]> = TableDefinition::new("objects");
// Key: "bucket\x00name\x00upload_id", Value: bincode Multipart
pub const MULTIPARTS: TableDefinition<&str, &[u8]> = TableDefinition::new("multiparts");
// Key: "bucket\x00name\x00version\x00object_id", Value: bincode GarbageCollection
pub const GARBAGE_COLLECTION: TableDefinition<&str, &[u8]> =
    TableDefinition::new("garbage_collection");
// Key: "bucket\x00name", Value: bincode Freezer
pub const FREEZER: TableDefinition<&str, &[u8]> = TableDefinition::new("freezer");
// Key: bucket name, Value: bytes in use
pub const USAGE: TableDefinition<&str, i64> = TableDefinition::new("usage");

pub fn object_prefix(bucket: &str, name: &str) -> String {
    format!("{bucket}\x00{name}\x00")
}

pub fn object_key(bucket: &str, name: &str, version: &VersionId) -> String {
    format!("{bucket}\x00{name}\x00{version}")
}

pub fn object_key_of(object: &Object) -> String {
    object_key(&object.bucket_name, &object.name, &object.version_id)
}

pub fn multipart_key(bucket: &str, name: &str, upload_id: &str) -> String {
    format!("{bucket}\x00{name}\x00{upload_id}")
}

pub fn gc_key(bucket: &str, name: &str, version: &VersionId, object_id: &ObjectId) -> String {
    format!("{bucket}\x00{name}\x00{version}\x00{object_id}")
}

pub fn freezer_key(bucket: &str, name: &str) -> String {
    format!("{bucket}\x00{name}")
}
