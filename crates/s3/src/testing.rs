//! In-memory bucket for exercising the storage engine

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;

use aliasman_core::{Alias, Error, ListResult, ObjectData, ObjectInfo, ObjectStore, Result};

use crate::record::{checksum, encode_index, object_key, to_metadata, INDEX_KEY};

#[derive(Debug, Clone)]
struct Object {
    body: Vec<u8>,
    metadata: HashMap<String, String>,
    last_modified: Timestamp,
}

/// Bucket held in memory. Every write gets a modification time one second
/// after the previous one, so later writes always sort as newer.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Object>>,
    tick: AtomicUsize,
    failing: Mutex<HashSet<String>>,
    head_delay: Mutex<Option<Duration>>,
    pub heads: AtomicUsize,
    pub puts: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_time(&self) -> Timestamp {
        let tick = self.tick.fetch_add(1, Ordering::SeqCst) as i64;
        Timestamp::from_second(1_600_000_000 + tick).unwrap()
    }

    /// Store an alias object directly, bypassing the engine
    pub fn insert_alias(&self, alias: &Alias) {
        let object = Object {
            body: Vec::new(),
            metadata: to_metadata(alias),
            last_modified: self.next_time(),
        };
        self.objects
            .lock()
            .unwrap()
            .insert(object_key(&alias.alias, &alias.domain), object);
    }

    /// Store an index covering `aliases`
    pub fn insert_index(&self, aliases: &[Alias]) {
        let body = encode_index(aliases.iter()).unwrap();
        self.insert_raw(INDEX_KEY, body);
    }

    pub fn insert_raw(&self, key: &str, body: Vec<u8>) {
        let object = Object {
            body,
            metadata: HashMap::new(),
            last_modified: self.next_time(),
        };
        self.objects.lock().unwrap().insert(key.to_string(), object);
    }

    pub fn remove(&self, key: &str) {
        self.objects.lock().unwrap().remove(key);
    }

    /// Make metadata fetches of `key` fail
    pub fn fail_head(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_string());
    }

    pub fn set_head_delay(&self, delay: Duration) {
        *self.head_delay.lock().unwrap() = Some(delay);
    }

    pub fn body(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).map(|o| o.body.clone())
    }

    pub fn metadata(&self, key: &str) -> Option<HashMap<String, String>> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|o| o.metadata.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn heads(&self) -> usize {
        self.heads.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_objects(
        &self,
        max_keys: i32,
        continuation_token: Option<String>,
    ) -> Result<ListResult> {
        let start: usize = continuation_token
            .map(|t| t.parse().unwrap())
            .unwrap_or_default();
        let objects = self.objects.lock().unwrap();
        let items: Vec<ObjectInfo> = objects
            .iter()
            .skip(start)
            .take(max_keys as usize)
            .map(|(key, o)| ObjectInfo {
                key: key.clone(),
                last_modified: Some(o.last_modified),
                etag: Some(checksum(&o.body)),
            })
            .collect();
        let end = start + items.len();
        let truncated = end < objects.len();

        Ok(ListResult {
            items,
            truncated,
            continuation_token: truncated.then(|| end.to_string()),
        })
    }

    async fn head_object(&self, key: &str) -> Result<Option<HashMap<String, String>>> {
        self.heads.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.head_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = if self.failing.lock().unwrap().contains(key) {
            Err(Error::Network(format!("HEAD {key} failed")))
        } else {
            Ok(self.metadata(key))
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn get_object(&self, key: &str) -> Result<Option<ObjectData>> {
        Ok(self.body(key).map(|body| ObjectData {
            etag: Some(checksum(&body)),
            body,
        }))
    }

    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        metadata: HashMap<String, String>,
    ) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let object = Object {
            body,
            metadata,
            last_modified: self.next_time(),
        };
        self.objects.lock().unwrap().insert(key.to_string(), object);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.remove(key);
        Ok(())
    }
}
