//! Provider contracts
//!
//! [`StorageProvider`] is the persistence side: the record of every alias
//! this tool manages. [`EmailProvider`] is the live mail system. The CLI
//! and the sync engine only ever talk to these traits.
//!
//! [`ObjectStore`] is the narrower seam under the S3 storage provider, so
//! the reconciliation engine can run against an in-memory bucket in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use jiff::Timestamp;

use crate::alias::{Alias, Aliases};
use crate::error::Result;
use crate::filter::Filter;

/// Persistent alias storage
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Short type name used in configuration (`s3`, `files`, ...)
    fn type_name(&self) -> &'static str;

    /// Human readable description
    fn description(&self) -> &'static str;

    /// Open the backend. Mutating calls fail after a read-only open.
    async fn open(&mut self, read_only: bool) -> Result<()>;

    /// Flush and release the backend.
    async fn close(&mut self) -> Result<()>;

    /// Fetch one alias; `Ok(None)` when it does not exist.
    async fn get(&self, alias: &str, domain: &str) -> Result<Option<Alias>>;

    /// Store a new alias. Sets the modified time to now when `update_modified`.
    async fn put(&mut self, alias: Alias, update_modified: bool) -> Result<()>;

    /// Replace an existing alias.
    async fn update(&mut self, alias: Alias, update_modified: bool) -> Result<()>;

    /// Aliases matching `filter`, sorted by domain then alias.
    async fn search(&self, filter: &Filter, match_any: bool) -> Result<Aliases>;

    async fn suspend(&mut self, alias: &str, domain: &str) -> Result<()>;

    async fn unsuspend(&mut self, alias: &str, domain: &str) -> Result<()>;

    async fn delete(&mut self, alias: &str, domain: &str) -> Result<()>;
}

/// Live mail system holding the aliases
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailProvider: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Create `alias@domain` delivering to `addresses`.
    async fn alias_create(&self, alias: &str, domain: &str, addresses: &[String]) -> Result<()>;

    async fn alias_delete(&self, alias: &str, domain: &str) -> Result<()>;

    /// Aliases in `domain`, optionally limited to those delivering to one of
    /// `address_filter`.
    async fn alias_list(&self, domain: &str, address_filter: &[String]) -> Result<Aliases>;
}

/// Object descriptor from a bucket listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,

    pub last_modified: Option<Timestamp>,

    /// ETag without surrounding quotes
    pub etag: Option<String>,
}

impl ObjectInfo {
    pub fn new(key: impl Into<String>, last_modified: Option<Timestamp>) -> Self {
        Self {
            key: key.into(),
            last_modified,
            etag: None,
        }
    }
}

/// One page of a bucket listing
#[derive(Debug, Clone, Default)]
pub struct ListResult {
    pub items: Vec<ObjectInfo>,

    /// Whether more pages are available
    pub truncated: bool,

    pub continuation_token: Option<String>,
}

/// Object body with its ETag
#[derive(Debug, Clone, Default)]
pub struct ObjectData {
    pub body: Vec<u8>,
    pub etag: Option<String>,
}

/// Bucket operations needed by the S3 storage provider
///
/// Implementations are bound to a single bucket. Metadata keys are returned
/// lower-cased.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List one page of objects.
    async fn list_objects(
        &self,
        max_keys: i32,
        continuation_token: Option<String>,
    ) -> Result<ListResult>;

    /// User metadata of one object; `Ok(None)` when it does not exist.
    async fn head_object(&self, key: &str) -> Result<Option<HashMap<String, String>>>;

    /// Object body; `Ok(None)` when it does not exist.
    async fn get_object(&self, key: &str) -> Result<Option<ObjectData>>;

    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        metadata: HashMap<String, String>,
    ) -> Result<()>;

    async fn delete_object(&self, key: &str) -> Result<()>;
}
