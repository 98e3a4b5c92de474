//! Durable scan progress per bridge
//!
//! The store maps `(chain id, lower-cased bridge address)` to the last block
//! whose deposits were fully processed. It lives in memory and is written to
//! disk as a whole-file bincode snapshot (temp file + rename) by the manager's
//! ticker and once more on shutdown. On startup a missing file means a fresh
//! start; a file that exists but does not decode is a fatal error.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::RelayerError;
use crate::validation::Validator;

/// Bumped whenever [`Snapshot`] changes shape
const SNAPSHOT_VERSION: u32 = 1;

/// Identifies one bridge contract on one chain
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CheckpointKey {
    pub chain_id: u64,
    /// Always lower-case, `0x`-prefixed
    pub address: String,
}

impl CheckpointKey {
    pub fn new(chain_id: u64, address: &str) -> Self {
        Self {
            chain_id,
            address: address.to_lowercase(),
        }
    }
}

/// On-disk representation
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    taken_at: DateTime<Utc>,
    blocks: Vec<(CheckpointKey, u64)>,
}

/// In-memory checkpoint map with snapshot/restore
pub struct CheckpointStore {
    path: PathBuf,
    blocks: RwLock<HashMap<CheckpointKey, u64>>,
    /// Serializes snapshot writers so they never share the temp file
    write_lock: Mutex<()>,
}

impl CheckpointStore {
    /// Open the store backed by `path`, restoring any existing snapshot.
    ///
    /// A snapshot that cannot be decoded, has an unknown version or contains
    /// invalid keys yields [`RelayerError::CorruptState`].
    pub async fn open(path: impl Into<PathBuf>, validator: Arc<Validator>) -> Result<Self, RelayerError> {
        let path = path.into();
        let blocks = restore(&path, &validator).await?;
        Ok(Self {
            path,
            blocks: RwLock::new(blocks),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Upsert progress for a bridge; last write wins
    pub async fn record_progress(&self, chain_id: u64, address: &str, block: u64) {
        let key = CheckpointKey::new(chain_id, address);
        let mut blocks = self.blocks.write().await;
        if let Some(previous) = blocks.insert(key, block) {
            if previous > block {
                warn!(
                    chain_id,
                    bridge = %address,
                    previous,
                    block,
                    "Checkpoint moved backwards"
                );
            }
        }
    }

    /// Last processed block for a bridge
    pub async fn get_progress(&self, chain_id: u64, address: &str) -> Result<u64, RelayerError> {
        let key = CheckpointKey::new(chain_id, address);
        self.blocks
            .read()
            .await
            .get(&key)
            .copied()
            .ok_or_else(|| RelayerError::checkpoint_not_found(chain_id, &key.address))
    }

    /// Copy of every entry, ordered by key
    pub async fn entries(&self) -> Vec<(CheckpointKey, u64)> {
        let mut entries: Vec<_> = self
            .blocks
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        entries.sort();
        entries
    }

    pub async fn len(&self) -> usize {
        self.blocks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blocks.read().await.is_empty()
    }

    /// Write the whole map to disk, replacing the previous snapshot atomically.
    ///
    /// Returns the snapshot timestamp.
    pub async fn snapshot(&self) -> Result<DateTime<Utc>, RelayerError> {
        let _writer = self.write_lock.lock().await;

        let (bytes, taken_at, count) = {
            let blocks = self.blocks.read().await;
            let mut entries: Vec<_> = blocks.iter().map(|(k, v)| (k.clone(), *v)).collect();
            entries.sort();
            let snapshot = Snapshot {
                version: SNAPSHOT_VERSION,
                taken_at: Utc::now(),
                blocks: entries,
            };
            let bytes = bincode::serialize(&snapshot).map_err(|e| RelayerError::CorruptState {
                path: self.path.clone(),
                reason: format!("failed to encode snapshot: {}", e),
            })?;
            (bytes, snapshot.taken_at, snapshot.blocks.len())
        };

        let tmp = self.path.with_extension("tmp");
        write_file(&tmp, &bytes).await.map_err(|source| RelayerError::Io {
            path: tmp.clone(),
            source,
        })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| RelayerError::Io {
                path: self.path.clone(),
                source,
            })?;

        debug!(path = %self.path.display(), entries = count, "Checkpoint snapshot written");
        Ok(taken_at)
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

async fn restore(
    path: &Path,
    validator: &Validator,
) -> Result<HashMap<CheckpointKey, u64>, RelayerError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No checkpoint file, starting fresh");
            return Ok(HashMap::new());
        }
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Checkpoint file unreadable, starting fresh"
            );
            return Ok(HashMap::new());
        }
    };

    let corrupt = |reason: String| RelayerError::CorruptState {
        path: path.to_path_buf(),
        reason,
    };

    let snapshot: Snapshot =
        bincode::deserialize(&bytes).map_err(|e| corrupt(format!("decode failed: {}", e)))?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(corrupt(format!(
            "unsupported snapshot version {}",
            snapshot.version
        )));
    }

    let mut blocks = HashMap::with_capacity(snapshot.blocks.len());
    for (key, block) in snapshot.blocks {
        validator
            .check(&key)
            .map_err(|e| corrupt(e.to_string()))?;
        blocks.insert(key, block);
    }

    info!(
        path = %path.display(),
        entries = blocks.len(),
        taken_at = %snapshot.taken_at,
        "Restored checkpoints"
    );
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BRIDGE: &str = "0xAbCdEf0123456789abcdef0123456789ABCDEF01";

    async fn store_in(dir: &tempfile::TempDir) -> CheckpointStore {
        CheckpointStore::open(dir.path().join("checkpoints.bin"), Arc::new(Validator::default()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_record_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;

        store.record_progress(56, BRIDGE, 1000).await;
        assert_eq!(store.get_progress(56, BRIDGE).await.unwrap(), 1000);

        store.record_progress(56, BRIDGE, 1029).await;
        assert_eq!(store.get_progress(56, BRIDGE).await.unwrap(), 1029);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_address_case_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;

        store.record_progress(1, BRIDGE, 5).await;
        assert_eq!(store.get_progress(1, &BRIDGE.to_lowercase()).await.unwrap(), 5);
        assert_eq!(store.get_progress(1, &BRIDGE.to_uppercase().replacen("0X", "0x", 1)).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_missing_entry_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;

        store.record_progress(1, BRIDGE, 5).await;
        let err = store.get_progress(2, BRIDGE).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_snapshot_restore_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        store.record_progress(1, BRIDGE, 929).await;
        store
            .record_progress(56, "0x1111111111111111111111111111111111111111", 77)
            .await;
        store.snapshot().await.unwrap();

        let restored = store_in(&dir).await;
        assert_eq!(restored.entries().await, store.entries().await);
        assert_eq!(restored.get_progress(1, BRIDGE).await.unwrap(), 929);
        assert!(!dir.path().join("checkpoints.tmp").exists());
    }

    #[tokio::test]
    async fn test_snapshot_of_empty_store_restores_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        store.snapshot().await.unwrap();
        assert!(dir.path().join("checkpoints.bin").exists());

        let restored = store_in(&dir).await;
        assert!(restored.is_empty().await);
    }

    #[tokio::test]
    async fn test_snapshot_replaces_previous() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        store.record_progress(1, BRIDGE, 10).await;
        store.snapshot().await.unwrap();
        store.record_progress(1, BRIDGE, 20).await;
        store.snapshot().await.unwrap();

        let restored = store_in(&dir).await;
        assert_eq!(restored.get_progress(1, BRIDGE).await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_unreadable_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.bin");
        std::fs::create_dir(&path).unwrap();

        let store = CheckpointStore::open(&path, Arc::new(Validator::default()))
            .await
            .unwrap();
        assert!(store.is_empty().await);
        assert!(store.get_progress(1, BRIDGE).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("checkpoints.bin"), b"definitely not bincode").unwrap();

        let result = CheckpointStore::open(
            dir.path().join("checkpoints.bin"),
            Arc::new(Validator::default()),
        )
        .await;
        assert!(matches!(result, Err(RelayerError::CorruptState { .. })));
    }

    #[tokio::test]
    async fn test_invalid_key_in_snapshot_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            taken_at: Utc::now(),
            blocks: vec![(
                CheckpointKey {
                    chain_id: 0,
                    address: "0x1111111111111111111111111111111111111111".to_string(),
                },
                5,
            )],
        };
        std::fs::write(
            dir.path().join("checkpoints.bin"),
            bincode::serialize(&snapshot).unwrap(),
        )
        .unwrap();

        let result = CheckpointStore::open(
            dir.path().join("checkpoints.bin"),
            Arc::new(Validator::default()),
        )
        .await;
        assert!(matches!(result, Err(RelayerError::CorruptState { .. })));
    }

    #[tokio::test]
    async fn test_unknown_version_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION + 1,
            taken_at: Utc::now(),
            blocks: vec![],
        };
        std::fs::write(
            dir.path().join("checkpoints.bin"),
            bincode::serialize(&snapshot).unwrap(),
        )
        .unwrap();

        let result = CheckpointStore::open(
            dir.path().join("checkpoints.bin"),
            Arc::new(Validator::default()),
        )
        .await;
        assert!(matches!(result, Err(RelayerError::CorruptState { .. })));
    }
}
