//! S3 backed alias storage
//!
//! On open the bucket listing decides whether the `index` object can be
//! trusted. The index is used only when it is newer than every alias object
//! and holds exactly as many records as there are alias objects; otherwise
//! the aliases are rebuilt from object metadata with a full scan. On close
//! the index is rewritten when its content changed.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use aliasman_core::config::S3Config;
use aliasman_core::timestamp::{format_rfc3339, truncate_to_second};
use aliasman_core::{
    Alias, Aliases, AliasesMap, Clock, Error, Filter, ObjectInfo, ObjectStore, Result,
    StorageProvider,
};

use crate::record::{
    ALIAS_PREFIX, INDEX_KEY, checksum, decode_index, encode_index, from_metadata, object_key,
    to_metadata,
};
use crate::scan::{ScanConfig, full_scan};

/// Keys requested per listing page
const LIST_PAGE_SIZE: i32 = 100;

const TYPE_NAME: &str = "s3";
const DESCRIPTION: &str = "S3 backed alias storage";

/// Where the aliases of an opened bucket came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Index,
    FullScan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Unopened,
    Ready { source: LoadSource },
    Closed,
}

/// Outcome of scanning a sorted listing for the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingSummary {
    /// The index object is newer than every alias object
    pub index_first: bool,

    /// Alias object keys, newest first
    pub alias_keys: Vec<String>,
}

/// Sort newest first, ties broken by key ascending. Objects without a
/// modification time sort last.
///
/// An index written in the same second as an alias object sorts after it
/// and is not trusted, so the next open does a full scan.
pub fn sort_listing(objects: &mut [ObjectInfo]) {
    objects.sort_by(|a, b| match b.last_modified.cmp(&a.last_modified) {
        Ordering::Equal => a.key.cmp(&b.key),
        other => other,
    });
}

/// Walk a sorted listing: is there an index before the first alias object,
/// and which alias objects exist.
pub fn summarize_listing(objects: &[ObjectInfo]) -> ListingSummary {
    let mut index_first = false;
    let mut alias_keys = Vec::new();

    for object in objects {
        if object.key == INDEX_KEY && alias_keys.is_empty() {
            index_first = true;
        } else if object.key.starts_with(ALIAS_PREFIX) {
            alias_keys.push(object.key.clone());
        }
    }

    ListingSummary {
        index_first,
        alias_keys,
    }
}

/// S3 storage provider
pub struct S3Storer<S: ObjectStore + ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    scan: ScanConfig,
    read_only: bool,
    state: State,
    aliases: AliasesMap,
    /// ETag of the index at open time
    index_checksum: Option<String>,
}

impl<S: ObjectStore + ?Sized + 'static> S3Storer<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            scan: ScanConfig::default(),
            read_only: false,
            state: State::Unopened,
            aliases: AliasesMap::new(),
            index_checksum: None,
        }
    }

    /// Apply the scan settings from configuration
    pub fn with_config(self, config: &S3Config) -> Self {
        let deadline = (config.scan_timeout_secs > 0)
            .then(|| Duration::from_secs(config.scan_timeout_secs));
        let scan = ScanConfig::default()
            .concurrency(config.concurrent_heads)
            .queue_depth(config.channel_depth)
            .fetch_timeout(Duration::from_secs(config.head_timeout_secs.max(1)))
            .deadline(deadline);
        self.with_scan_config(scan)
    }

    pub fn with_scan_config(mut self, scan: ScanConfig) -> Self {
        self.scan = scan;
        self
    }

    /// How the aliases were loaded, once open
    pub fn load_source(&self) -> Option<LoadSource> {
        match self.state {
            State::Ready { source } => Some(source),
            _ => None,
        }
    }

    /// Every object in the bucket, sorted newest first
    async fn list_all(&self) -> Result<Vec<ObjectInfo>> {
        let mut objects = Vec::new();
        let mut token = None;

        loop {
            let page = self.store.list_objects(LIST_PAGE_SIZE, token).await?;
            objects.extend(page.items);

            match page.continuation_token {
                Some(next) if page.truncated => token = Some(next),
                _ => break,
            }
        }

        sort_listing(&mut objects);
        Ok(objects)
    }

    /// Try the index; `None` means it cannot be trusted.
    async fn load_index(&self, expected: usize) -> Result<Option<(AliasesMap, Option<String>)>> {
        let Some(data) = self.store.get_object(INDEX_KEY).await? else {
            debug!("index object disappeared after listing");
            return Ok(None);
        };

        let records = match decode_index(&data.body) {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "index is unreadable, falling back to full scan");
                return Ok(None);
            }
        };

        if records.len() != expected {
            debug!(
                indexed = records.len(),
                objects = expected,
                "index count does not match alias objects"
            );
            return Ok(None);
        }

        let mut aliases = AliasesMap::new();
        for alias in records {
            if let Err(e) = aliases.add(alias) {
                warn!(error = %e, "index holds duplicate records, falling back to full scan");
                return Ok(None);
            }
        }

        Ok(Some((aliases, data.etag)))
    }

    fn ready(&self) -> Result<()> {
        match self.state {
            State::Ready { .. } => Ok(()),
            _ => Err(Error::NotOpen(TYPE_NAME.to_string())),
        }
    }

    fn writable(&self) -> Result<()> {
        self.ready()?;
        if self.read_only {
            return Err(Error::ReadOnly("S3".to_string()));
        }
        Ok(())
    }

    /// Write the alias object and return the record as stored.
    async fn put_alias(&self, mut alias: Alias, update_modified: bool) -> Result<Alias> {
        let now = truncate_to_second(self.clock.now());
        if update_modified {
            alias.modified_ts = Some(now);
        }
        if alias.created_ts.is_none() {
            alias.created_ts = Some(now);
        }
        alias.created_ts = alias.created_ts.map(truncate_to_second);
        alias.modified_ts = alias.modified_ts.map(truncate_to_second);
        alias.suspended_ts = alias.suspended_ts.map(truncate_to_second);

        self.store
            .put_object(
                &object_key(&alias.alias, &alias.domain),
                Vec::new(),
                to_metadata(&alias),
            )
            .await?;
        Ok(alias)
    }

    fn existing(&self, alias: &str, domain: &str) -> Result<Alias> {
        self.aliases
            .get(alias, domain)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("alias {alias}@{domain} does not exist")))
    }
}

#[async_trait]
impl<S: ObjectStore + ?Sized + 'static> StorageProvider for S3Storer<S> {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn description(&self) -> &'static str {
        DESCRIPTION
    }

    async fn open(&mut self, read_only: bool) -> Result<()> {
        self.read_only = read_only;

        let objects = self.list_all().await?;
        let summary = summarize_listing(&objects);
        let expected = summary.alias_keys.len();

        let indexed = if summary.index_first {
            self.load_index(expected).await?
        } else {
            debug!("index missing or older than alias objects");
            None
        };

        match indexed {
            Some((aliases, etag)) => {
                debug!(aliases = aliases.len(), "loaded aliases from index");
                self.aliases = aliases;
                self.index_checksum = etag;
                self.state = State::Ready {
                    source: LoadSource::Index,
                };
            }
            None => {
                info!(objects = expected, "rebuilding aliases with a full scan");
                self.aliases = full_scan(
                    Arc::clone(&self.store),
                    Arc::clone(&self.clock),
                    summary.alias_keys,
                    &self.scan,
                )
                .await?;
                self.index_checksum = None;
                self.state = State::Ready {
                    source: LoadSource::FullScan,
                };
            }
        }

        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.ready()?;

        if self.read_only {
            debug!("read-only open, leaving index untouched");
        } else {
            let body = encode_index(self.aliases.values())?;
            let sum = checksum(&body);
            if self.index_checksum.as_deref() == Some(sum.as_str()) {
                debug!("index unchanged");
            } else {
                let metadata = HashMap::from([(
                    "creation_ts".to_string(),
                    format_rfc3339(self.clock.now()),
                )]);
                self.store.put_object(INDEX_KEY, body, metadata).await?;
                info!(aliases = self.aliases.len(), "wrote index");
                self.index_checksum = Some(sum);
            }
        }

        self.state = State::Closed;
        Ok(())
    }

    async fn get(&self, alias: &str, domain: &str) -> Result<Option<Alias>> {
        self.ready()?;
        match self.store.head_object(&object_key(alias, domain)).await? {
            Some(metadata) => Ok(Some(from_metadata(&metadata, self.clock.as_ref())?)),
            None => Ok(None),
        }
    }

    async fn put(&mut self, alias: Alias, update_modified: bool) -> Result<()> {
        self.writable()?;
        if self.aliases.contains(&alias.alias, &alias.domain) {
            return Err(Error::AliasExists(alias.key()));
        }
        let stored = self.put_alias(alias, update_modified).await?;
        self.aliases.add(stored)
    }

    async fn update(&mut self, alias: Alias, update_modified: bool) -> Result<()> {
        self.writable()?;
        let stored = self.put_alias(alias, update_modified).await?;
        self.aliases.replace(stored)
    }

    async fn search(&self, filter: &Filter, match_any: bool) -> Result<Aliases> {
        self.ready()?;
        Ok(self.aliases.search(filter, match_any))
    }

    async fn suspend(&mut self, alias: &str, domain: &str) -> Result<()> {
        self.writable()?;
        let mut record = self.existing(alias, domain)?;
        record.suspended = true;
        record.suspended_ts = Some(self.clock.now());
        let stored = self.put_alias(record, true).await?;
        self.aliases.replace(stored)
    }

    async fn unsuspend(&mut self, alias: &str, domain: &str) -> Result<()> {
        self.writable()?;
        let mut record = self.existing(alias, domain)?;
        record.suspended = false;
        record.suspended_ts = None;
        let stored = self.put_alias(record, true).await?;
        self.aliases.replace(stored)
    }

    async fn delete(&mut self, alias: &str, domain: &str) -> Result<()> {
        self.writable()?;
        self.store.delete_object(&object_key(alias, domain)).await?;
        self.aliases.del(alias, domain);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering as AtomicOrdering;

    use jiff::Timestamp;

    use super::*;
    use crate::testing::MemoryStore;
    use aliasman_core::FixedClock;

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(ts("2024-03-04T05:06:07.123Z")))
    }

    fn alias(name: &str, domain: &str) -> Alias {
        Alias {
            email_addresses: vec!["me@example.net".into()],
            description: format!("{name} description"),
            created_ts: Some(ts("2020-01-01T00:00:00Z")),
            modified_ts: Some(ts("2020-01-02T00:00:00Z")),
            ..Alias::new(name, domain)
        }
    }

    fn storer(store: &Arc<MemoryStore>) -> S3Storer<MemoryStore> {
        S3Storer::new(Arc::clone(store), clock())
    }

    fn info(key: &str, second: i64) -> ObjectInfo {
        ObjectInfo::new(key, Some(Timestamp::from_second(second).unwrap()))
    }

    #[test]
    fn test_sort_listing_newest_first_with_key_tie_break() {
        let mut objects = vec![
            info("alias-b@x.com", 10),
            info("alias-a@x.com", 10),
            info("index", 20),
            ObjectInfo::new("alias-z@x.com", None),
            info("alias-c@x.com", 5),
        ];
        sort_listing(&mut objects);
        let keys: Vec<&str> = objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "index",
                "alias-a@x.com",
                "alias-b@x.com",
                "alias-c@x.com",
                "alias-z@x.com"
            ]
        );
    }

    #[test]
    fn test_index_tied_with_alias_is_not_trusted() {
        let mut objects = vec![info("index", 10), info("alias-a@x.com", 10)];
        sort_listing(&mut objects);
        assert_eq!(objects[0].key, "alias-a@x.com");
        assert!(!summarize_listing(&objects).index_first);
    }

    #[test]
    fn test_summarize_listing() {
        let fresh = summarize_listing(&[info("index", 3), info("alias-a@x.com", 2)]);
        assert!(fresh.index_first);
        assert_eq!(fresh.alias_keys, vec!["alias-a@x.com"]);

        let stale = summarize_listing(&[info("alias-a@x.com", 3), info("index", 2)]);
        assert!(!stale.index_first);

        let missing = summarize_listing(&[info("alias-a@x.com", 3), info("other", 2)]);
        assert!(!missing.index_first);
        assert_eq!(missing.alias_keys.len(), 1);
    }

    #[tokio::test]
    async fn test_fresh_index_is_used_without_heads() {
        let store = Arc::new(MemoryStore::new());
        let aliases = vec![alias("a", "x.com"), alias("b", "x.com")];
        for a in &aliases {
            store.insert_alias(a);
        }
        store.insert_index(&aliases);

        let mut s3 = storer(&store);
        s3.open(true).await.unwrap();

        assert_eq!(s3.load_source(), Some(LoadSource::Index));
        assert_eq!(store.heads(), 0);
        let found = s3.search(&Filter::new(), false).await.unwrap();
        assert_eq!(found.into_vec(), aliases);
    }

    #[tokio::test]
    async fn test_stale_index_triggers_full_scan() {
        let store = Arc::new(MemoryStore::new());
        let first = alias("a", "x.com");
        store.insert_alias(&first);
        store.insert_index(std::slice::from_ref(&first));
        // written after the index, so the index is stale
        let second = alias("b", "x.com");
        store.insert_alias(&second);

        let mut s3 = storer(&store);
        s3.open(true).await.unwrap();

        assert_eq!(s3.load_source(), Some(LoadSource::FullScan));
        assert_eq!(store.heads(), 2);
        let found = s3.search(&Filter::new(), false).await.unwrap();
        assert_eq!(found.into_vec(), vec![first, second]);
    }

    #[tokio::test]
    async fn test_count_mismatch_triggers_full_scan() {
        let store = Arc::new(MemoryStore::new());
        let a = alias("a", "x.com");
        let b = alias("b", "x.com");
        store.insert_alias(&a);
        store.insert_alias(&b);
        // newest object but only covers one of two aliases
        store.insert_index(std::slice::from_ref(&a));

        let mut s3 = storer(&store);
        s3.open(true).await.unwrap();
        assert_eq!(s3.load_source(), Some(LoadSource::FullScan));
        assert_eq!(s3.search(&Filter::new(), false).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_index_triggers_full_scan() {
        let store = Arc::new(MemoryStore::new());
        store.insert_alias(&alias("a", "x.com"));
        store.insert_raw(INDEX_KEY, b"{not json".to_vec());

        let mut s3 = storer(&store);
        s3.open(true).await.unwrap();
        assert_eq!(s3.load_source(), Some(LoadSource::FullScan));
        assert_eq!(s3.search(&Filter::new(), false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_head_is_left_out() {
        let store = Arc::new(MemoryStore::new());
        store.insert_alias(&alias("a", "x.com"));
        store.insert_alias(&alias("b", "x.com"));
        store.insert_alias(&alias("c", "x.com"));
        store.fail_head("alias-b@x.com");

        let mut s3 = storer(&store);
        s3.open(true).await.unwrap();

        let keys: Vec<String> = s3
            .search(&Filter::new(), false)
            .await
            .unwrap()
            .iter()
            .map(Alias::key)
            .collect();
        assert_eq!(keys, vec!["a@x.com", "c@x.com"]);
    }

    #[tokio::test]
    async fn test_full_scan_pages_through_listing() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..150 {
            store.insert_alias(&alias(&format!("a{i:03}"), "x.com"));
        }

        let mut s3 = storer(&store);
        s3.open(true).await.unwrap();
        assert_eq!(store.heads(), 150);
        assert_eq!(s3.search(&Filter::new(), false).await.unwrap().len(), 150);
    }

    #[tokio::test]
    async fn test_full_scan_respects_concurrency() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..20 {
            store.insert_alias(&alias(&format!("a{i}"), "x.com"));
        }
        store.set_head_delay(Duration::from_millis(5));

        let mut s3 = storer(&store).with_scan_config(ScanConfig::default().concurrency(3));
        s3.open(true).await.unwrap();

        assert_eq!(s3.search(&Filter::new(), false).await.unwrap().len(), 20);
        let peak = store.max_in_flight.load(AtomicOrdering::SeqCst);
        assert!(peak >= 1 && peak <= 3, "peak in-flight was {peak}");
    }

    #[tokio::test]
    async fn test_full_scan_deadline() {
        let store = Arc::new(MemoryStore::new());
        store.insert_alias(&alias("a", "x.com"));
        store.set_head_delay(Duration::from_millis(500));

        let scan = ScanConfig::default().deadline(Some(Duration::from_millis(20)));
        let mut s3 = storer(&store).with_scan_config(scan);
        assert!(matches!(s3.open(true).await, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_close_writes_index_only_when_changed() {
        let store = Arc::new(MemoryStore::new());
        store.insert_alias(&alias("a", "x.com"));

        let mut s3 = storer(&store);
        s3.open(false).await.unwrap();
        s3.close().await.unwrap();
        assert_eq!(store.puts(), 1);
        assert!(store.contains(INDEX_KEY));

        // the index is now fresh and unchanged
        let mut s3 = storer(&store);
        s3.open(false).await.unwrap();
        assert_eq!(s3.load_source(), Some(LoadSource::Index));
        s3.close().await.unwrap();
        assert_eq!(store.puts(), 1);

        let mut s3 = storer(&store);
        s3.open(false).await.unwrap();
        s3.put(alias("b", "x.com"), true).await.unwrap();
        s3.close().await.unwrap();
        assert_eq!(store.puts(), 3);

        let decoded = decode_index(&store.body(INDEX_KEY).unwrap()).unwrap();
        assert_eq!(decoded.len(), 2);
    }

    #[tokio::test]
    async fn test_read_only_rejects_writes_and_skips_index() {
        let store = Arc::new(MemoryStore::new());
        store.insert_alias(&alias("a", "x.com"));

        let mut s3 = storer(&store);
        s3.open(true).await.unwrap();

        let err = s3.put(alias("b", "x.com"), true).await.unwrap_err();
        assert!(matches!(err, Error::ReadOnly(_)));
        assert!(matches!(
            s3.suspend("a", "x.com").await,
            Err(Error::ReadOnly(_))
        ));
        assert!(matches!(
            s3.delete("a", "x.com").await,
            Err(Error::ReadOnly(_))
        ));

        s3.close().await.unwrap();
        assert_eq!(store.puts(), 0);
        assert!(!store.contains(INDEX_KEY));
    }

    #[tokio::test]
    async fn test_operations_require_open() {
        let store = Arc::new(MemoryStore::new());
        let mut s3 = storer(&store);
        assert!(matches!(
            s3.search(&Filter::new(), false).await,
            Err(Error::NotOpen(_))
        ));
        assert!(matches!(s3.close().await, Err(Error::NotOpen(_))));
    }

    #[tokio::test]
    async fn test_put_stamps_and_truncates() {
        let store = Arc::new(MemoryStore::new());
        let mut s3 = storer(&store);
        s3.open(false).await.unwrap();

        let new = Alias::new("shop", "x.com");
        s3.put(new, true).await.unwrap();

        let now = ts("2024-03-04T05:06:07Z");
        let stored = s3.get("shop", "x.com").await.unwrap().unwrap();
        assert_eq!(stored.created_ts, Some(now));
        assert_eq!(stored.modified_ts, Some(now));
        assert_eq!(stored.suspended_ts, None);

        let found = s3.search(&Filter::new(), false).await.unwrap();
        assert_eq!(found.into_vec(), vec![stored]);
    }

    #[tokio::test]
    async fn test_put_existing_alias_fails() {
        let store = Arc::new(MemoryStore::new());
        store.insert_alias(&alias("a", "x.com"));

        let mut s3 = storer(&store);
        s3.open(false).await.unwrap();
        let err = s3.put(alias("a", "x.com"), true).await.unwrap_err();
        assert!(matches!(err, Error::AliasExists(_)));
        assert_eq!(store.puts(), 0);
    }

    #[tokio::test]
    async fn test_get_missing_alias() {
        let store = Arc::new(MemoryStore::new());
        let mut s3 = storer(&store);
        s3.open(true).await.unwrap();
        assert_eq!(s3.get("nope", "x.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_suspend_and_unsuspend() {
        let store = Arc::new(MemoryStore::new());
        store.insert_alias(&alias("a", "x.com"));

        let mut s3 = storer(&store);
        s3.open(false).await.unwrap();

        s3.suspend("a", "x.com").await.unwrap();
        let suspended = s3.get("a", "x.com").await.unwrap().unwrap();
        assert!(suspended.suspended);
        assert_eq!(suspended.suspended_ts, Some(ts("2024-03-04T05:06:07Z")));
        assert_eq!(suspended.modified_ts, Some(ts("2024-03-04T05:06:07Z")));

        s3.unsuspend("a", "x.com").await.unwrap();
        let enabled = s3.get("a", "x.com").await.unwrap().unwrap();
        assert!(!enabled.suspended);
        assert_eq!(enabled.suspended_ts, None);

        assert!(matches!(
            s3.suspend("missing", "x.com").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_replaces_record() {
        let store = Arc::new(MemoryStore::new());
        store.insert_alias(&alias("a", "x.com"));

        let mut s3 = storer(&store);
        s3.open(false).await.unwrap();

        let mut changed = alias("a", "x.com");
        changed.description = "changed".into();
        s3.update(changed, false).await.unwrap();

        let found = s3.search(&Filter::new(), false).await.unwrap();
        assert_eq!(found[0].description, "changed");
        assert_eq!(found[0].modified_ts, Some(ts("2020-01-02T00:00:00Z")));
    }

    #[tokio::test]
    async fn test_delete_removes_object_and_entry() {
        let store = Arc::new(MemoryStore::new());
        store.insert_alias(&alias("a", "x.com"));
        store.insert_alias(&alias("b", "x.com"));

        let mut s3 = storer(&store);
        s3.open(false).await.unwrap();
        s3.delete("a", "x.com").await.unwrap();

        assert!(!store.contains("alias-a@x.com"));
        let found = s3.search(&Filter::new(), false).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].alias, "b");
    }

    #[tokio::test]
    async fn test_search_sorted_across_domains() {
        let store = Arc::new(MemoryStore::new());
        let mut s3 = storer(&store);
        s3.open(false).await.unwrap();

        s3.put(alias("zeta", "b.com"), true).await.unwrap();
        s3.put(alias("beta", "a.com"), true).await.unwrap();
        s3.put(alias("alpha", "a.com"), true).await.unwrap();

        let all = s3.search(&Filter::new(), false).await.unwrap();
        let keys: Vec<String> = all.iter().map(Alias::key).collect();
        assert_eq!(keys, vec!["alpha@a.com", "beta@a.com", "zeta@b.com"]);

        let filter = Filter::for_domain("a.com").unwrap();
        assert_eq!(s3.search(&filter, false).await.unwrap().len(), 2);
        s3.close().await.unwrap();

        // a reopen sees the same set through the index
        let mut s3 = storer(&store);
        s3.open(true).await.unwrap();
        assert_eq!(s3.load_source(), Some(LoadSource::Index));
        assert_eq!(s3.search(&Filter::new(), false).await.unwrap(), all);
    }
}
