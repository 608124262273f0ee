//! Directory-of-files alias storage
//!
//! Each alias is a pretty-printed JSON document named
//! `alias-<alias>-<domain>`. The whole directory is read into memory on
//! open; writes go straight to disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use aliasman_core::{
    Alias, Aliases, AliasesMap, Clock, Config, Error, Filter, Result, StorageFactory,
    StorageProvider,
};

const TYPE_NAME: &str = "files";
const DESCRIPTION: &str = "Files-based backed alias storage";

fn file_name(alias: &str, domain: &str) -> String {
    format!("alias-{alias}-{domain}")
}

/// Storage provider backed by a directory of JSON files
pub struct FilesStorer {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    read_only: bool,
    open: bool,
    aliases: AliasesMap,
}

impl FilesStorer {
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
            read_only: false,
            open: false,
            aliases: AliasesMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn alias_path(&self, alias: &str, domain: &str) -> PathBuf {
        self.path.join(file_name(alias, domain))
    }

    fn writable(&self) -> Result<()> {
        if !self.open {
            return Err(Error::NotOpen(TYPE_NAME.to_string()));
        }
        if self.read_only {
            return Err(Error::ReadOnly("files provider".to_string()));
        }
        Ok(())
    }

    async fn write(&self, alias: &Alias) -> Result<()> {
        let body = serde_json::to_vec_pretty(alias)?;
        tokio::fs::write(self.alias_path(&alias.alias, &alias.domain), body).await?;
        Ok(())
    }

    async fn set_suspended(&mut self, alias: &str, domain: &str, suspended: bool) -> Result<()> {
        self.writable()?;
        let mut record = self
            .aliases
            .get(alias, domain)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("alias {alias}@{domain} does not exist")))?;

        let now = self.clock.now();
        record.suspended = suspended;
        record.suspended_ts = suspended.then_some(now);
        record.modified_ts = Some(now);

        self.write(&record).await?;
        self.aliases.replace(record)
    }
}

#[async_trait]
impl StorageProvider for FilesStorer {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn description(&self) -> &'static str {
        DESCRIPTION
    }

    async fn open(&mut self, read_only: bool) -> Result<()> {
        self.read_only = read_only;

        match tokio::fs::metadata(&self.path).await {
            Ok(meta) if !meta.is_dir() => {
                return Err(Error::Storage(format!(
                    "{} is a file and not a directory",
                    self.path.display()
                )));
            }
            Ok(_) => {}
            Err(_) if read_only => {
                return Err(Error::Storage(format!(
                    "files opened read-only and files path does not exist: {}",
                    self.path.display()
                )));
            }
            Err(_) => {
                create_private_dir(&self.path)?;
                debug!(path = %self.path.display(), "created files directory");
            }
        }

        let mut aliases = AliasesMap::new();
        let mut entries = tokio::fs::read_dir(&self.path).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let body = tokio::fs::read(entry.path()).await?;
            let alias: Alias = serde_json::from_slice(&body).map_err(|e| {
                Error::Storage(format!("{}: {e}", entry.path().display()))
            })?;
            aliases.add(alias)?;
        }

        debug!(aliases = aliases.len(), "loaded files storage");
        self.aliases = aliases;
        self.open = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }

    async fn get(&self, alias: &str, domain: &str) -> Result<Option<Alias>> {
        match tokio::fs::read(self.alias_path(alias, domain)).await {
            Ok(body) => Ok(Some(serde_json::from_slice(&body)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&mut self, mut alias: Alias, update_modified: bool) -> Result<()> {
        self.writable()?;
        if self.aliases.contains(&alias.alias, &alias.domain) {
            return Err(Error::AliasExists(alias.key()));
        }

        let now = self.clock.now();
        if update_modified {
            alias.modified_ts = Some(now);
        }
        alias.created_ts.get_or_insert(now);

        self.write(&alias).await?;
        self.aliases.add(alias)
    }

    async fn update(&mut self, mut alias: Alias, update_modified: bool) -> Result<()> {
        self.writable()?;
        if update_modified {
            alias.modified_ts = Some(self.clock.now());
        }
        self.write(&alias).await?;
        self.aliases.replace(alias)
    }

    async fn search(&self, filter: &Filter, match_any: bool) -> Result<Aliases> {
        Ok(self.aliases.search(filter, match_any))
    }

    async fn suspend(&mut self, alias: &str, domain: &str) -> Result<()> {
        self.set_suspended(alias, domain, true).await
    }

    async fn unsuspend(&mut self, alias: &str, domain: &str) -> Result<()> {
        self.set_suspended(alias, domain, false).await
    }

    async fn delete(&mut self, alias: &str, domain: &str) -> Result<()> {
        self.writable()?;
        tokio::fs::remove_file(self.alias_path(alias, domain)).await?;
        self.aliases.del(alias, domain);
        Ok(())
    }
}

fn create_private_dir(path: &Path) -> Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(path)?;
    Ok(())
}

/// Registers the `files` storage type
pub struct FilesStorageFactory;

#[async_trait]
impl StorageFactory for FilesStorageFactory {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn description(&self) -> &'static str {
        DESCRIPTION
    }

    async fn create(
        &self,
        config: &Config,
        clock: Arc<dyn Clock>,
    ) -> Result<Box<dyn StorageProvider>> {
        Ok(Box::new(FilesStorer::new(config.files_path(), clock)))
    }
}
