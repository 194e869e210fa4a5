//! objmeta Common - Shared types and utilities
//!
//! This crate provides the metadata record types, the error taxonomy,
//! configuration and the compression capability used across all objmeta
//! components.

pub mod compression;
pub mod config;
pub mod error;
pub mod types;

pub use compression::{CompressedWrite, Compression, ZstdCompression};
pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
