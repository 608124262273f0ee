//! aliasman-s3: S3 backed alias storage
//!
//! Each alias lives in its own empty object whose metadata carries the
//! record, plus an `index` object that caches the whole set. This is the
//! only crate that directly depends on the AWS SDK.

use std::sync::Arc;

use async_trait::async_trait;

use aliasman_core::{Clock, Config, Result, StorageFactory, StorageProvider};

pub mod client;
pub mod record;
pub mod scan;
pub mod storer;

#[cfg(test)]
mod testing;

pub use client::S3Client;
pub use scan::ScanConfig;
pub use storer::{LoadSource, S3Storer};

/// Registers the `s3` storage type
pub struct S3StorageFactory;

#[async_trait]
impl StorageFactory for S3StorageFactory {
    fn type_name(&self) -> &'static str {
        "s3"
    }

    fn description(&self) -> &'static str {
        "S3 backed alias storage"
    }

    async fn create(
        &self,
        config: &Config,
        clock: Arc<dyn Clock>,
    ) -> Result<Box<dyn StorageProvider>> {
        let client = S3Client::new(&config.s3).await?;
        let storer = S3Storer::new(Arc::new(client), clock).with_config(&config.s3);
        Ok(Box::new(storer))
    }
}
