//! SQLite alias storage

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::debug;

use aliasman_core::timestamp::parse_optional;
use aliasman_core::{
    Alias, Aliases, Clock, Config, Error, Filter, Result, StorageFactory, StorageProvider,
};

const TYPE_NAME: &str = "sqlite3";
const DESCRIPTION: &str = "SQLite backed alias storage";

const CREATE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS alias (
    alias         VARCHAR(64),
    addresses     VARCHAR(255),
    domain        VARCHAR(255),
    description   VARCHAR(255),
    suspended     TINYINT(1) NOT NULL DEFAULT 0,
    created_ts    TEXT,
    modified_ts   TEXT,
    suspended_ts  TEXT DEFAULT NULL,
    PRIMARY KEY   (alias, domain)
)
";

const SELECT_COLUMNS: &str = r"
SELECT alias, domain, addresses, description, suspended,
       created_ts, modified_ts, suspended_ts
FROM alias
";

fn db_error(e: sqlx::Error) -> Error {
    Error::Storage(format!("sqlite: {e}"))
}

fn to_text(ts: Option<Timestamp>) -> Option<String> {
    ts.map(|t| t.to_string())
}

/// Decode one row; a column of the wrong type is a storage error, not a panic.
fn row_to_alias(row: &SqliteRow) -> Result<Alias> {
    let text = |name: &str| -> Result<String> {
        Ok(row
            .try_get::<Option<String>, _>(name)
            .map_err(db_error)?
            .unwrap_or_default())
    };
    let ts = |name: &str| -> Result<Option<Timestamp>> {
        Ok(row
            .try_get::<Option<String>, _>(name)
            .map_err(db_error)?
            .as_deref()
            .and_then(parse_optional))
    };

    Ok(Alias {
        alias: text("alias")?,
        domain: text("domain")?,
        email_addresses: text("addresses")?
            .split(',')
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect(),
        description: text("description")?,
        suspended: row.try_get::<i64, _>("suspended").map_err(db_error)? != 0,
        created_ts: ts("created_ts")?,
        modified_ts: ts("modified_ts")?,
        suspended_ts: ts("suspended_ts")?,
    })
}

/// Storage provider backed by a single SQLite table
pub struct SqliteStorer {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    read_only: bool,
    pool: Option<SqlitePool>,
}

impl SqliteStorer {
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
            read_only: false,
            pool: None,
        }
    }

    fn pool(&self) -> Result<&SqlitePool> {
        self.pool
            .as_ref()
            .ok_or_else(|| Error::NotOpen(TYPE_NAME.to_string()))
    }

    fn writable(&self) -> Result<&SqlitePool> {
        let pool = self.pool()?;
        if self.read_only {
            return Err(Error::ReadOnly("SQLite DB".to_string()));
        }
        Ok(pool)
    }

    async fn write(&self, mut alias: Alias, update_modified: bool) -> Result<()> {
        let pool = self.writable()?;
        let now = self.clock.now();
        alias.created_ts.get_or_insert(now);
        if update_modified {
            alias.modified_ts = Some(now);
        }

        sqlx::query(
            r"
            INSERT OR REPLACE INTO alias (
                alias, addresses, domain, description, suspended,
                created_ts, modified_ts, suspended_ts
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&alias.alias)
        .bind(alias.email_addresses.join(","))
        .bind(&alias.domain)
        .bind(&alias.description)
        .bind(alias.suspended)
        .bind(to_text(alias.created_ts))
        .bind(to_text(alias.modified_ts))
        .bind(to_text(alias.suspended_ts))
        .execute(pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn set_suspended(&self, alias: &str, domain: &str, suspended: bool) -> Result<()> {
        let pool = self.writable()?;
        let now = to_text(Some(self.clock.now()));
        let suspended_ts = if suspended { now.clone() } else { None };

        let result = sqlx::query(
            r"
            UPDATE alias
            SET suspended = ?, modified_ts = ?, suspended_ts = ?
            WHERE alias = ? AND domain = ?
            ",
        )
        .bind(suspended)
        .bind(now)
        .bind(suspended_ts)
        .bind(alias)
        .bind(domain)
        .execute(pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "alias {alias}@{domain} does not exist"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageProvider for SqliteStorer {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn description(&self) -> &'static str {
        DESCRIPTION
    }

    async fn open(&mut self, read_only: bool) -> Result<()> {
        self.read_only = read_only;

        let options = SqliteConnectOptions::new()
            .filename(&self.path)
            .read_only(read_only)
            .create_if_missing(!read_only);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(db_error)?;

        if !read_only {
            sqlx::query(CREATE_TABLE)
                .execute(&pool)
                .await
                .map_err(db_error)?;
        }

        debug!(path = %self.path.display(), read_only, "opened sqlite storage");
        self.pool = Some(pool);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
        }
        Ok(())
    }

    async fn get(&self, alias: &str, domain: &str) -> Result<Option<Alias>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE alias = ? AND domain = ?"))
            .bind(alias)
            .bind(domain)
            .fetch_optional(self.pool()?)
            .await
            .map_err(db_error)?;

        row.as_ref().map(row_to_alias).transpose()
    }

    async fn put(&mut self, alias: Alias, update_modified: bool) -> Result<()> {
        self.writable()?;
        if self.get(&alias.alias, &alias.domain).await?.is_some() {
            return Err(Error::AliasExists(alias.key()));
        }
        self.write(alias, update_modified).await
    }

    async fn update(&mut self, alias: Alias, update_modified: bool) -> Result<()> {
        self.write(alias, update_modified).await
    }

    async fn search(&self, filter: &Filter, match_any: bool) -> Result<Aliases> {
        let rows = sqlx::query(SELECT_COLUMNS)
            .fetch_all(self.pool()?)
            .await
            .map_err(db_error)?;

        let mut aliases = Aliases::new();
        for row in &rows {
            let alias = row_to_alias(row)?;
            if alias.matches(filter, match_any) {
                aliases.push(alias);
            }
        }
        Ok(aliases.sorted())
    }

    async fn suspend(&mut self, alias: &str, domain: &str) -> Result<()> {
        self.set_suspended(alias, domain, true).await
    }

    async fn unsuspend(&mut self, alias: &str, domain: &str) -> Result<()> {
        self.set_suspended(alias, domain, false).await
    }

    async fn delete(&mut self, alias: &str, domain: &str) -> Result<()> {
        let pool = self.writable()?;
        sqlx::query("DELETE FROM alias WHERE alias = ? AND domain = ?")
            .bind(alias)
            .bind(domain)
            .execute(pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }
}

/// Registers the `sqlite3` storage type
pub struct SqliteStorageFactory;

#[async_trait]
impl StorageFactory for SqliteStorageFactory {
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
        Ok(Box::new(SqliteStorer::new(config.sqlite_path(), clock)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aliasman_core::FixedClock;
    use tempfile::TempDir;

    fn now() -> Timestamp {
        "2024-01-02T03:04:05Z".parse().unwrap()
    }

    fn storer(dir: &TempDir) -> SqliteStorer {
        SqliteStorer::new(dir.path().join("aliases.db"), Arc::new(FixedClock(now())))
    }

    fn sample(name: &str, domain: &str) -> Alias {
        Alias {
            email_addresses: vec!["a@example.net".into(), "b@example.net".into()],
            description: "sqlite".into(),
            created_ts: Some("2020-01-01T00:00:00.25Z".parse().unwrap()),
            ..Alias::new(name, domain)
        }
    }

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut db = storer(&dir);
        db.open(false).await.unwrap();
        db.put(sample("a", "x.com"), true).await.unwrap();

        let got = db.get("a", "x.com").await.unwrap().unwrap();
        let mut expected = sample("a", "x.com");
        expected.modified_ts = Some(now());
        assert_eq!(got, expected);

        assert_eq!(db.get("missing", "x.com").await.unwrap(), None);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_put_existing_fails_update_replaces() {
        let dir = TempDir::new().unwrap();
        let mut db = storer(&dir);
        db.open(false).await.unwrap();
        db.put(sample("a", "x.com"), false).await.unwrap();

        assert!(matches!(
            db.put(sample("a", "x.com"), false).await,
            Err(Error::AliasExists(_))
        ));

        let mut changed = sample("a", "x.com");
        changed.description = "changed".into();
        db.update(changed, false).await.unwrap();
        let got = db.get("a", "x.com").await.unwrap().unwrap();
        assert_eq!(got.description, "changed");
        assert_eq!(got.modified_ts, None);
    }

    #[tokio::test]
    async fn test_search_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        let mut db = storer(&dir);
        db.open(false).await.unwrap();
        db.put(sample("zeta", "b.com"), true).await.unwrap();
        db.put(sample("beta", "a.com"), true).await.unwrap();
        db.put(sample("alpha", "a.com"), true).await.unwrap();

        let all = db.search(&Filter::new(), false).await.unwrap();
        let keys: Vec<String> = all.iter().map(Alias::key).collect();
        assert_eq!(keys, vec!["alpha@a.com", "beta@a.com", "zeta@b.com"]);

        let filter = Filter::new().with_alias("^z").unwrap();
        assert_eq!(db.search(&filter, false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_suspend_cycle_and_delete() {
        let dir = TempDir::new().unwrap();
        let mut db = storer(&dir);
        db.open(false).await.unwrap();
        db.put(sample("a", "x.com"), false).await.unwrap();

        db.suspend("a", "x.com").await.unwrap();
        let got = db.get("a", "x.com").await.unwrap().unwrap();
        assert!(got.suspended);
        assert_eq!(got.suspended_ts, Some(now()));
        assert_eq!(got.modified_ts, Some(now()));

        db.unsuspend("a", "x.com").await.unwrap();
        let got = db.get("a", "x.com").await.unwrap().unwrap();
        assert!(!got.suspended);
        assert_eq!(got.suspended_ts, None);

        assert!(matches!(
            db.suspend("missing", "x.com").await,
            Err(Error::NotFound(_))
        ));

        db.delete("a", "x.com").await.unwrap();
        assert_eq!(db.get("a", "x.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_only_reopen() {
        let dir = TempDir::new().unwrap();
        let mut db = storer(&dir);
        db.open(false).await.unwrap();
        db.put(sample("a", "x.com"), true).await.unwrap();
        db.close().await.unwrap();

        let mut db = storer(&dir);
        db.open(true).await.unwrap();
        assert_eq!(db.search(&Filter::new(), false).await.unwrap().len(), 1);
        assert!(matches!(
            db.put(sample("b", "x.com"), true).await,
            Err(Error::ReadOnly(_))
        ));
        assert!(matches!(
            db.delete("a", "x.com").await,
            Err(Error::ReadOnly(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_row_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let mut db = storer(&dir);
        db.open(false).await.unwrap();
        sqlx::query("INSERT INTO alias (alias, domain, suspended) VALUES ('a', 'x.com', 'yes')")
            .execute(db.pool().unwrap())
            .await
            .unwrap();

        assert!(matches!(db.get("a", "x.com").await, Err(Error::Storage(_))));
        assert!(matches!(
            db.search(&Filter::new(), false).await,
            Err(Error::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_requires_open() {
        let dir = TempDir::new().unwrap();
        let db = storer(&dir);
        assert!(matches!(
            db.search(&Filter::new(), false).await,
            Err(Error::NotOpen(_))
        ));
    }
}
