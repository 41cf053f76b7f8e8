// Storage engine seam and the RocksDB-backed local implementation

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use rocksdb::{DB, Options, WriteBatch};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use ravenhost_common::{RavenHostError, Result};

/// Node-level configuration handed to the engine and front-end factories.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Data directory on the mounted volume; always ends with the path separator
    pub data_directory: String,
    /// Client-facing service port
    pub port: u16,
    /// Address the front end binds to
    pub bind_address: String,
}

/// Transaction boundary for configuration-entry writes.
///
/// Operations buffered under the same transaction id become visible as one
/// unit when the transaction is committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransactionInformation {
    pub id: Uuid,
}

impl TransactionInformation {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }
}

impl Default for TransactionInformation {
    fn default() -> Self {
        Self::new()
    }
}

/// Document-store engine contract.
///
/// Writes are buffered per transaction and applied atomically on commit.
/// Etags are accepted for contract fidelity but not enforced: the topology
/// reconciler is the sole writer of the keys it owns.
pub trait StorageEngine: Send + Sync {
    fn put(
        &self,
        key: &str,
        etag: Option<&str>,
        document: Value,
        metadata: Value,
        txn: &TransactionInformation,
    ) -> Result<()>;

    fn delete(&self, key: &str, etag: Option<&str>, txn: &TransactionInformation) -> Result<()>;

    fn commit(&self, txn_id: Uuid) -> Result<()>;

    /// Read the raw persisted bytes of an entry. Read seam used by the front
    /// end; returns `None` for keys that were never written or were deleted.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Start background maintenance work. Must be called from within a
    /// runtime; the workers stop when the engine is disposed.
    fn spin_background_workers(&self);

    fn dispose(&self);
}

/// Factory seam for constructing the storage engine during node start.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn create(&self, config: &NodeConfig) -> Result<Arc<dyn StorageEngine>>;
}

/// Persisted envelope for one configuration entry.
#[derive(Serialize, Deserialize)]
struct StoredDocument {
    document: Value,
    metadata: Value,
}

enum TxnOp {
    Put { key: String, value: Vec<u8> },
    Delete { key: String },
}

/// How often the background worker flushes the write-ahead log.
const WAL_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

/// RocksDB-backed storage engine.
///
/// Transactions are buffered in memory and turned into a single RocksDB
/// `WriteBatch` on commit, so the delete-then-put replace used by the
/// reconciler lands as one atomic write.
pub struct RocksEngine {
    db: Arc<DB>,
    txns: DashMap<Uuid, Vec<TxnOp>>,
    workers_running: Arc<AtomicBool>,
    // Signals the worker task to exit immediately on dispose. The task holds
    // an Arc<DB>; it must drop it right away or the next open of the same
    // directory hits the RocksDB lock.
    worker_shutdown: watch::Sender<bool>,
}

impl RocksEngine {
    pub fn open(config: &NodeConfig) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let path = Path::new(&config.data_directory).join("documents");
        let db = DB::open(&opts, path).map_err(|e| RavenHostError::Engine(e.to_string()))?;

        let (worker_shutdown, _) = watch::channel(false);
        Ok(Self {
            db: Arc::new(db),
            txns: DashMap::new(),
            workers_running: Arc::new(AtomicBool::new(false)),
            worker_shutdown,
        })
    }
}

impl StorageEngine for RocksEngine {
    fn put(
        &self,
        key: &str,
        _etag: Option<&str>,
        document: Value,
        metadata: Value,
        txn: &TransactionInformation,
    ) -> Result<()> {
        let stored = StoredDocument { document, metadata };
        let value = serde_json::to_vec(&stored)?;
        self.txns.entry(txn.id).or_default().push(TxnOp::Put {
            key: key.to_string(),
            value,
        });
        Ok(())
    }

    fn delete(&self, key: &str, _etag: Option<&str>, txn: &TransactionInformation) -> Result<()> {
        self.txns.entry(txn.id).or_default().push(TxnOp::Delete {
            key: key.to_string(),
        });
        Ok(())
    }

    fn commit(&self, txn_id: Uuid) -> Result<()> {
        let (_, ops) = self.txns.remove(&txn_id).ok_or_else(|| {
            RavenHostError::IllegalState(format!("unknown transaction: {}", txn_id))
        })?;

        let mut batch = WriteBatch::default();
        for op in ops {
            match op {
                TxnOp::Put { key, value } => batch.put(key.as_bytes(), &value),
                TxnOp::Delete { key } => batch.delete(key.as_bytes()),
            }
        }

        self.db
            .write(batch)
            .map_err(|e| RavenHostError::Engine(e.to_string()))
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.db
            .get(key.as_bytes())
            .map_err(|e| RavenHostError::Engine(e.to_string()))
    }

    fn spin_background_workers(&self) {
        if self.workers_running.swap(true, Ordering::SeqCst) {
            return;
        }

        let db = self.db.clone();
        let mut shutdown = self.worker_shutdown.subscribe();
        tokio::spawn(async move {
            debug!("storage engine background workers started");
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(WAL_FLUSH_INTERVAL) => {
                        if let Err(e) = db.flush_wal(true) {
                            warn!("background WAL flush failed: {}", e);
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
            debug!("storage engine background workers stopped");
        });
    }

    fn dispose(&self) {
        self.workers_running.store(false, Ordering::SeqCst);
        let _ = self.worker_shutdown.send(true);
        self.txns.clear();
        if let Err(e) = self.db.flush() {
            warn!("flush on dispose failed: {}", e);
        }
    }
}

/// Factory wiring `RocksEngine` under the node's data directory.
pub struct RocksEngineFactory;

#[async_trait]
impl EngineFactory for RocksEngineFactory {
    async fn create(&self, config: &NodeConfig) -> Result<Arc<dyn StorageEngine>> {
        Ok(Arc::new(RocksEngine::open(config)?))
    }
}
