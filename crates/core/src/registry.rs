//! Provider registry
//!
//! Maps provider type names to factories. The binary builds one registry at
//! startup and hands it to the command layer by reference.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::traits::{EmailProvider, StorageProvider};

/// Builds storage providers of one type
#[async_trait]
pub trait StorageFactory: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    async fn create(&self, config: &Config, clock: Arc<dyn Clock>)
    -> Result<Box<dyn StorageProvider>>;
}

/// Builds email providers of one type
#[async_trait]
pub trait EmailFactory: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    async fn create(&self, config: &Config) -> Result<Box<dyn EmailProvider>>;
}

/// Registered provider factories, keyed by type name
#[derive(Default)]
pub struct ProviderRegistry {
    storage: BTreeMap<&'static str, Box<dyn StorageFactory>>,
    email: BTreeMap<&'static str, Box<dyn EmailFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a storage factory. Type names must be unique.
    pub fn register_storage(&mut self, factory: impl StorageFactory + 'static) -> Result<()> {
        let name = factory.type_name();
        if self.storage.contains_key(name) {
            return Err(Error::Config(format!(
                "storage provider {name} registered twice"
            )));
        }
        self.storage.insert(name, Box::new(factory));
        Ok(())
    }

    /// Register an email factory. Type names must be unique.
    pub fn register_email(&mut self, factory: impl EmailFactory + 'static) -> Result<()> {
        let name = factory.type_name();
        if self.email.contains_key(name) {
            return Err(Error::Config(format!(
                "email provider {name} registered twice"
            )));
        }
        self.email.insert(name, Box::new(factory));
        Ok(())
    }

    pub fn storage(&self, name: &str) -> Result<&dyn StorageFactory> {
        self.storage
            .get(name)
            .map(Box::as_ref)
            .ok_or_else(|| Error::UnknownProvider(format!("storage provider {name:?}")))
    }

    pub fn email(&self, name: &str) -> Result<&dyn EmailFactory> {
        self.email
            .get(name)
            .map(Box::as_ref)
            .ok_or_else(|| Error::UnknownProvider(format!("email provider {name:?}")))
    }

    /// Storage factories, ordered by type name
    pub fn storage_factories(&self) -> impl Iterator<Item = &dyn StorageFactory> {
        self.storage.values().map(Box::as_ref)
    }

    /// Email factories, ordered by type name
    pub fn email_factories(&self) -> impl Iterator<Item = &dyn EmailFactory> {
        self.email.values().map(Box::as_ref)
    }

    /// Instantiate the named storage provider.
    pub async fn create_storage(
        &self,
        name: &str,
        config: &Config,
        clock: Arc<dyn Clock>,
    ) -> Result<Box<dyn StorageProvider>> {
        self.storage(name)?.create(config, clock).await
    }

    /// Instantiate the named email provider.
    pub async fn create_email(&self, name: &str, config: &Config) -> Result<Box<dyn EmailProvider>> {
        self.email(name)?.create(config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::traits::{MockEmailProvider, MockStorageProvider};

    struct FakeStorage(&'static str);

    #[async_trait]
    impl StorageFactory for FakeStorage {
        fn type_name(&self) -> &'static str {
            self.0
        }

        fn description(&self) -> &'static str {
            "fake storage"
        }

        async fn create(
            &self,
            _config: &Config,
            _clock: Arc<dyn Clock>,
        ) -> Result<Box<dyn StorageProvider>> {
            let mut mock = MockStorageProvider::new();
            let name = self.0;
            mock.expect_type_name().return_const(name);
            Ok(Box::new(mock))
        }
    }

    struct FakeEmail;

    #[async_trait]
    impl EmailFactory for FakeEmail {
        fn type_name(&self) -> &'static str {
            "fake"
        }

        fn description(&self) -> &'static str {
            "fake email"
        }

        async fn create(&self, _config: &Config) -> Result<Box<dyn EmailProvider>> {
            Ok(Box::new(MockEmailProvider::new()))
        }
    }

    #[test]
    fn test_register_and_list() {
        let mut registry = ProviderRegistry::new();
        registry.register_storage(FakeStorage("zeta")).unwrap();
        registry.register_storage(FakeStorage("alpha")).unwrap();
        registry.register_email(FakeEmail).unwrap();

        let names: Vec<_> = registry.storage_factories().map(|f| f.type_name()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(registry.email_factories().count(), 1);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = ProviderRegistry::new();
        registry.register_storage(FakeStorage("files")).unwrap();
        assert!(registry.register_storage(FakeStorage("files")).is_err());
        registry.register_email(FakeEmail).unwrap();
        assert!(registry.register_email(FakeEmail).is_err());
    }

    #[test]
    fn test_unknown_provider() {
        let registry = ProviderRegistry::new();
        assert!(matches!(
            registry.storage("nope"),
            Err(Error::UnknownProvider(_))
        ));
        assert!(matches!(registry.email("nope"), Err(Error::UnknownProvider(_))));
    }

    #[tokio::test]
    async fn test_create_storage() {
        let mut registry = ProviderRegistry::new();
        registry.register_storage(FakeStorage("files")).unwrap();

        let provider = registry
            .create_storage("files", &Config::default(), Arc::new(SystemClock))
            .await
            .unwrap();
        assert_eq!(provider.type_name(), "files");
    }
}
