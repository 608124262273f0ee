//! Full metadata scan of the bucket
//!
//! A producer feeds alias object keys into a bounded queue. A fixed pool of
//! workers takes keys off the queue, fetches each object's metadata and
//! sends the decoded alias to a collector task, which is the only writer to
//! the resulting map. A key that cannot be fetched or decoded is logged and
//! left out; it never fails the scan.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use aliasman_core::{Alias, AliasesMap, Clock, Error, ObjectStore, Result};

use crate::record::from_metadata;

/// Default number of concurrent metadata fetches
pub const DEFAULT_CONCURRENCY: usize = 25;

/// Default depth of the work queue
pub const DEFAULT_QUEUE_DEPTH: usize = 50;

/// Default timeout for one metadata fetch
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Full scan configuration
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Number of workers
    pub concurrency: usize,

    /// Capacity of the key and result queues
    pub queue_depth: usize,

    /// Timeout for a single metadata fetch
    pub fetch_timeout: Duration,

    /// Deadline for the whole scan
    pub deadline: Option<Duration>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            deadline: None,
        }
    }
}

impl ScanConfig {
    /// Set the number of workers (at least one)
    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Set the queue depth (at least one)
    pub fn queue_depth(mut self, n: usize) -> Self {
        self.queue_depth = n.max(1);
        self
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }
}

/// Fetch and decode the metadata of every key in `keys`.
pub async fn full_scan<S>(
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    keys: Vec<String>,
    config: &ScanConfig,
) -> Result<AliasesMap>
where
    S: ObjectStore + ?Sized + 'static,
{
    match config.deadline {
        Some(deadline) => tokio::time::timeout(deadline, run(store, clock, keys, config))
            .await
            .map_err(|_| Error::Network(format!("full scan exceeded {deadline:?}")))?,
        None => run(store, clock, keys, config).await,
    }
}

async fn run<S>(
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    keys: Vec<String>,
    config: &ScanConfig,
) -> Result<AliasesMap>
where
    S: ObjectStore + ?Sized + 'static,
{
    let total = keys.len();
    let (key_tx, key_rx) = mpsc::channel::<String>(config.queue_depth);
    let (alias_tx, mut alias_rx) = mpsc::channel::<Alias>(config.queue_depth);
    let key_rx = Arc::new(Mutex::new(key_rx));

    // Dropping the set aborts whatever is still running, so an expired
    // deadline does not leave workers behind.
    let mut tasks = JoinSet::new();

    tasks.spawn(async move {
        for key in keys {
            if key_tx.send(key).await.is_err() {
                break;
            }
        }
    });

    for _ in 0..config.concurrency {
        let store = Arc::clone(&store);
        let clock = Arc::clone(&clock);
        let key_rx = Arc::clone(&key_rx);
        let alias_tx = alias_tx.clone();
        let fetch_timeout = config.fetch_timeout;
        tasks.spawn(async move {
            loop {
                let key = key_rx.lock().await.recv().await;
                let Some(key) = key else { break };

                match tokio::time::timeout(fetch_timeout, store.head_object(&key)).await {
                    Ok(Ok(Some(metadata))) => match from_metadata(&metadata, clock.as_ref()) {
                        Ok(alias) => {
                            if alias_tx.send(alias).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(key = %key, error = %e, "skipping alias object"),
                    },
                    Ok(Ok(None)) => debug!(key = %key, "alias object vanished during scan"),
                    Ok(Err(e)) => warn!(key = %key, error = %e, "failed to fetch alias metadata"),
                    Err(_) => warn!(key = %key, "timed out fetching alias metadata"),
                }
            }
        });
    }
    drop(key_rx);
    drop(alias_tx);

    let mut collector = JoinSet::new();
    collector.spawn(async move {
        let mut aliases = AliasesMap::new();
        while let Some(alias) = alias_rx.recv().await {
            aliases.add(alias)?;
        }
        Ok::<_, Error>(aliases)
    });

    let aliases = match collector.join_next().await {
        Some(joined) => joined.map_err(|e| Error::General(format!("scan collector failed: {e}")))??,
        None => AliasesMap::new(),
    };

    while let Some(joined) = tasks.join_next().await {
        joined.map_err(|e| Error::General(format!("scan worker failed: {e}")))?;
    }

    debug!(
        scanned = total,
        loaded = aliases.len(),
        "full scan finished"
    );
    Ok(aliases)
}
