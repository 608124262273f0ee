//! aliasman-core: Core library for the aliasman email alias manager
//!
//! This crate provides:
//! - The alias record model and its keyed collections
//! - Filters and the field descriptor table
//! - StorageProvider / EmailProvider contracts and the provider registry
//! - The ObjectStore seam used by the S3 storage provider
//! - The sync and audit engine
//! - Configuration management
//!
//! It does not depend on any provider SDK, so everything here can be
//! exercised with in-memory fakes.

pub mod alias;
pub mod clock;
pub mod config;
pub mod error;
pub mod field;
pub mod filter;
pub mod registry;
pub mod sync;
pub mod timestamp;
pub mod traits;

pub use alias::{Alias, Aliases, AliasesMap};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Config, ConfigManager};
pub use error::{Error, Result};
pub use field::Field;
pub use filter::Filter;
pub use registry::{EmailFactory, ProviderRegistry, StorageFactory};
pub use sync::{AssumeYes, AuditReport, Confirm, SyncAction, SyncMode, SyncPlan, SyncReport};
pub use traits::{EmailProvider, ListResult, ObjectData, ObjectInfo, ObjectStore, StorageProvider};
