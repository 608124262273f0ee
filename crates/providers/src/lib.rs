//! aliasman-providers: storage and email providers other than S3
//!
//! Storage: a directory of JSON files and a SQLite table.
//! Email: the GSuite Admin Directory API and the Rackspace Email API.

pub mod files;
pub mod gsuite;
mod http;
pub mod rackspace;
pub mod sqlite;

pub use files::{FilesStorageFactory, FilesStorer};
pub use gsuite::{GsuiteEmailFactory, GsuiteEmailer};
pub use rackspace::{RackspaceEmailFactory, RackspaceEmailer};
pub use sqlite::{SqliteStorageFactory, SqliteStorer};
