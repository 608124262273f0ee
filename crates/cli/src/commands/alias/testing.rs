//! Fakes shared by the alias command tests

use std::sync::{Arc, Mutex};

use aliasman_core::{
    Alias, Aliases, EmailProvider, Error, FixedClock, Result, StorageProvider,
};
use aliasman_providers::FilesStorer;
use async_trait::async_trait;
use tempfile::TempDir;

pub fn now() -> jiff::Timestamp {
    "2024-05-06T07:08:09Z".parse().unwrap()
}

/// Opened files storage in a fresh directory
pub async fn files_storage(dir: &TempDir) -> Box<dyn StorageProvider> {
    let mut storage: Box<dyn StorageProvider> = Box::new(FilesStorer::new(
        dir.path().join("aliases"),
        Arc::new(FixedClock(now())),
    ));
    storage.open(false).await.unwrap();
    storage
}

pub fn alias(name: &str, domain: &str, addresses: &[&str]) -> Alias {
    let mut a = Alias::new(name, domain);
    a.email_addresses = addresses.iter().map(|s| s.to_string()).collect();
    a
}

/// Mail system that records every call and can be told to fail
#[derive(Default)]
pub struct RecordingEmail {
    pub calls: Mutex<Vec<String>>,
    pub aliases: Aliases,
    pub fail: bool,
}

impl RecordingEmail {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailProvider for RecordingEmail {
    fn type_name(&self) -> &'static str {
        "recording"
    }

    fn description(&self) -> &'static str {
        "records calls"
    }

    async fn alias_create(&self, alias: &str, domain: &str, addresses: &[String]) -> Result<()> {
        if self.fail {
            return Err(Error::Network("mail system down".into()));
        }
        self.calls
            .lock()
            .unwrap()
            .push(format!("create {alias}@{domain} {}", addresses.join(",")));
        Ok(())
    }

    async fn alias_delete(&self, alias: &str, domain: &str) -> Result<()> {
        if self.fail {
            return Err(Error::Network("mail system down".into()));
        }
        self.calls
            .lock()
            .unwrap()
            .push(format!("delete {alias}@{domain}"));
        Ok(())
    }

    async fn alias_list(&self, domain: &str, address_filter: &[String]) -> Result<Aliases> {
        Ok(self
            .aliases
            .iter()
            .filter(|a| a.domain == domain)
            .filter(|a| {
                address_filter.is_empty()
                    || a.email_addresses.iter().any(|e| address_filter.contains(e))
            })
            .cloned()
            .collect())
    }
}
