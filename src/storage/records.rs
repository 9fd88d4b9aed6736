use std::collections::HashMap as StdHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use super::paths::snapshot_path;
use super::StoreError;

type Table = StdHashMap<String, JsonValue>;

#[derive(Serialize, Deserialize)]
struct SnapEntry { table: String, key: String, json: Vec<u8> }

#[derive(Serialize, Deserialize)]
struct Snapshot { version: u32, created_ms: i64, entries: Vec<SnapEntry> }

const SNAPSHOT_VERSION: u32 = 1;

/// Named tables of JSON rows keyed by entity id.
#[derive(Clone)]
pub struct RecordStore {
    /// Snapshot folder; `None` keeps everything in memory only.
    dir: Option<PathBuf>,
    tables: Arc<parking_lot::RwLock<StdHashMap<String, Table>>>,
    /// Guard to ensure we only spawn one snapshot task
    persist_started: Arc<parking_lot::Mutex<bool>>,
}

impl RecordStore {
    pub fn in_memory() -> Self {
        Self { dir: None, tables: Arc::new(parking_lot::RwLock::new(StdHashMap::new())), persist_started: Arc::new(parking_lot::Mutex::new(false)) }
    }

    /// Open a store backed by `dir`, loading the last snapshot if one exists.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        let mut s = Self::in_memory();
        s.dir = Some(dir);
        s.load_snapshot()?;
        Ok(s)
    }

    pub fn get<T: DeserializeOwned>(&self, table: &str, key: &str) -> Result<Option<T>, StoreError> {
        let r = self.tables.read();
        let Some(val) = r.get(table).and_then(|t| t.get(key)) else { return Ok(None); };
        let out = T::deserialize(val).map_err(|e| StoreError::Codec { table: table.into(), key: key.into(), source: e })?;
        Ok(Some(out))
    }

    pub fn contains(&self, table: &str, key: &str) -> bool {
        self.tables.read().get(table).map(|t| t.contains_key(key)).unwrap_or(false)
    }

    /// Insert or overwrite a row.
    pub fn put<T: Serialize>(&self, table: &str, key: &str, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_value(value).map_err(|e| StoreError::Codec { table: table.into(), key: key.into(), source: e })?;
        let mut w = self.tables.write();
        w.entry(table.to_string()).or_default().insert(key.to_string(), json);
        Ok(())
    }

    /// Apply `f` to an existing row under the table write lock. Returns false when
    /// the row does not exist; nothing is created in that case.
    pub fn update<T, F>(&self, table: &str, key: &str, f: F) -> Result<bool, StoreError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T),
    {
        let codec_err = |e| StoreError::Codec { table: table.into(), key: key.into(), source: e };
        let mut w = self.tables.write();
        let Some(slot) = w.get_mut(table).and_then(|t| t.get_mut(key)) else { return Ok(false); };
        let mut row = T::deserialize(&*slot).map_err(codec_err)?;
        f(&mut row);
        *slot = serde_json::to_value(&row).map_err(codec_err)?;
        Ok(true)
    }

    pub fn len(&self, table: &str) -> usize { self.tables.read().get(table).map(|t| t.len()).unwrap_or(0) }

    pub fn is_empty(&self) -> bool { self.tables.read().values().all(|t| t.is_empty()) }

    /// Write all tables to `<dir>/snapshot.bin` via a temp file and rename.
    /// In-memory stores have nowhere to write and return Ok.
    pub fn save_snapshot(&self) -> Result<(), StoreError> {
        let Some(dir) = self.dir.as_ref() else { return Ok(()); };
        let now_ms = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0);
        let mut entries: Vec<SnapEntry> = Vec::new();
        for (table, rows) in self.tables.read().iter() {
            for (k, v) in rows.iter() {
                let json = serde_json::to_vec(v).map_err(|e| StoreError::Codec { table: table.clone(), key: k.clone(), source: e })?;
                entries.push(SnapEntry { table: table.clone(), key: k.clone(), json });
            }
        }
        let count = entries.len();
        let snap = Snapshot { version: SNAPSHOT_VERSION, created_ms: now_ms, entries };
        let bytes = bincode::serialize(&snap)?;
        let path = snapshot_path(dir);
        let tmp = path.with_extension("bin.tmp");
        std::fs::write(&tmp, bytes).map_err(|e| StoreError::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| StoreError::io(&path, e))?;
        debug!(target: "storage", rows = count, "record snapshot written");
        Ok(())
    }

    fn load_snapshot(&self) -> Result<(), StoreError> {
        let Some(dir) = self.dir.as_ref() else { return Ok(()); };
        let path = snapshot_path(dir);
        if !path.exists() { return Ok(()); }
        let bytes = std::fs::read(&path).map_err(|e| StoreError::io(&path, e))?;
        let snap: Snapshot = bincode::deserialize(&bytes)?;
        if snap.version != SNAPSHOT_VERSION {
            return Err(StoreError::Unavailable(format!("unsupported snapshot version {}", snap.version)));
        }
        let mut w = self.tables.write();
        w.clear();
        let mut loaded = 0usize;
        for e in snap.entries.into_iter() {
            match serde_json::from_slice::<JsonValue>(&e.json) {
                Ok(v) => {
                    w.entry(e.table).or_default().insert(e.key, v);
                    loaded += 1;
                }
                Err(err) => warn!(target: "storage", table = %e.table, key = %e.key, "skipping unreadable snapshot row: {}", err),
            }
        }
        info!(target: "storage", rows = loaded, created_ms = snap.created_ms, "record snapshot loaded from {:?}", path);
        Ok(())
    }

    /// Spawn a background task writing a snapshot every `interval`. Only the first call spawns.
    pub fn spawn_snapshot_loop(&self, interval: Duration) -> Option<tokio::task::JoinHandle<()>> {
        if self.dir.is_none() || interval.is_zero() { return None; }
        let mut started = self.persist_started.lock();
        if *started { return None; }
        *started = true;
        drop(started);
        let this = self.clone();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = this.save_snapshot() {
                    warn!(target: "storage", "record snapshot failed: {}", e);
                }
            }
        }))
    }
}
