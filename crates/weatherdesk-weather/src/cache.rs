//! Filesystem-backed response cache.
//!
//! One JSON file per fingerprint, holding the write timestamp and the opaque
//! payload. There is no in-memory index: every lookup re-reads the file and
//! re-checks freshness, so entries written by an earlier process are honoured
//! and expired ones are never served. Expired files stay on disk until
//! [`WeatherCache::sweep_expired`] or [`WeatherCache::clear`] runs.
//!
//! The cache is an accelerator only. Read failures degrade to a miss and
//! write failures are logged and dropped.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

const ENTRY_EXTENSION: &str = "json";
const TMP_EXTENSION_PREFIX: &str = "tmp-";

/// Longest file stem used verbatim. Hashed stems are always longer, so the
/// two forms never collide.
const MAX_PLAIN_STEM_LEN: usize = 180;
/// Readable part kept in front of the hash for long fingerprints
const HASHED_PREFIX_LEN: usize = 120;

/// Temp files older than this belong to an interrupted write.
const STALE_TMP_AGE: Duration = Duration::from_secs(300);

/// Source of the current time for freshness checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for exercising expiry without sleeping.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let Ok(by) = chrono::Duration::from_std(by) else {
            return;
        };
        let mut now = self.now.lock();
        if let Some(next) = now.checked_add_signed(by) {
            *now = next;
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// On-disk layout of a single entry
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    timestamp: DateTime<Utc>,
    data: Value,
}

/// Persistent TTL cache keyed by request fingerprint
pub struct WeatherCache {
    cache_dir: PathBuf,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    write_seq: AtomicU64,
}

impl std::fmt::Debug for WeatherCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherCache")
            .field("cache_dir", &self.cache_dir)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl WeatherCache {
    /// Create a cache rooted at `cache_dir` using the wall clock.
    pub fn new(cache_dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self::with_clock(cache_dir, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(cache_dir: impl Into<PathBuf>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let cache_dir = cache_dir.into();
        if let Err(e) = std::fs::create_dir_all(&cache_dir) {
            tracing::warn!(
                "Failed to create cache directory {}: {}",
                cache_dir.display(),
                e
            );
        }
        Self {
            cache_dir,
            ttl,
            clock,
            write_seq: AtomicU64::new(0),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Path of the entry file for a fingerprint.
    ///
    /// Fingerprints are percent-encoded so distinct keys never share a file.
    /// Encodings too long for a file name are cut to a readable prefix and
    /// suffixed with the SHA-256 of the full fingerprint.
    fn entry_path(&self, fingerprint: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{}", entry_stem(fingerprint), ENTRY_EXTENSION))
    }

    fn is_fresh(&self, stored_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match (now - stored_at).to_std() {
            Ok(age) => age < self.ttl,
            // Stored in the future relative to our clock; age is effectively zero.
            Err(_) => !self.ttl.is_zero(),
        }
    }

    fn read_entry(path: &Path) -> Result<CacheEntry, String> {
        let contents = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        serde_json::from_str(&contents).map_err(|e| e.to_string())
    }

    /// Fetch a fresh payload, or `None` on miss, expiry, or unreadable entry.
    pub fn get(&self, fingerprint: &str) -> Option<Value> {
        let path = self.entry_path(fingerprint);
        if !path.exists() {
            tracing::debug!("Cache miss: {}", fingerprint);
            return None;
        }

        let entry = match Self::read_entry(&path) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Failed to read cache entry {}: {}", path.display(), e);
                return None;
            }
        };

        if self.is_fresh(entry.timestamp, self.clock.now()) {
            tracing::debug!("Cache hit: {}", fingerprint);
            Some(entry.data)
        } else {
            tracing::debug!("Cache entry expired: {}", fingerprint);
            None
        }
    }

    /// Store a payload, replacing any prior entry for the fingerprint.
    pub fn set(&self, fingerprint: &str, payload: &Value) {
        if let Err(e) = self.try_set(fingerprint, payload) {
            tracing::warn!("Failed to write cache entry {}: {}", fingerprint, e);
        }
    }

    fn try_set(&self, fingerprint: &str, payload: &Value) -> std::io::Result<()> {
        let entry = CacheEntry {
            timestamp: self.clock.now(),
            data: payload.clone(),
        };
        let contents = serde_json::to_string_pretty(&entry)?;

        std::fs::create_dir_all(&self.cache_dir)?;
        let path = self.entry_path(fingerprint);

        // Write then rename so readers never observe a partial file.
        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!(
            "{}{}-{}",
            TMP_EXTENSION_PREFIX,
            std::process::id(),
            seq
        ));
        std::fs::write(&tmp, contents)?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
        tracing::debug!("Cached {}", fingerprint);
        Ok(())
    }

    fn files_with_extension<F>(&self, matches: F) -> Vec<PathBuf>
    where
        F: Fn(&str) -> bool,
    {
        let dir = match std::fs::read_dir(&self.cache_dir) {
            Ok(dir) => dir,
            Err(e) => {
                tracing::warn!(
                    "Failed to list cache directory {}: {}",
                    self.cache_dir.display(),
                    e
                );
                return Vec::new();
            }
        };

        dir.filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(&matches)
            })
            .collect()
    }

    fn entry_files(&self) -> Vec<PathBuf> {
        self.files_with_extension(|ext| ext == ENTRY_EXTENSION)
    }

    fn tmp_files(&self) -> Vec<PathBuf> {
        self.files_with_extension(|ext| ext.starts_with(TMP_EXTENSION_PREFIX))
    }

    /// Remove leftover temp files from interrupted writes. With `stale_only`,
    /// files younger than [`STALE_TMP_AGE`] are assumed to be in flight and kept.
    fn remove_tmp_files(&self, stale_only: bool) -> usize {
        let now = SystemTime::now();
        let mut removed = 0;
        for path in self.tmp_files() {
            if stale_only {
                let age = std::fs::metadata(&path)
                    .and_then(|meta| meta.modified())
                    .ok()
                    .and_then(|modified| now.duration_since(modified).ok());
                match age {
                    Some(age) if age >= STALE_TMP_AGE => {}
                    _ => continue,
                }
            }
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
        if removed > 0 {
            tracing::debug!("Removed {} leftover cache temp files", removed);
        }
        removed
    }

    /// Remove every entry, along with any temp files. Returns the number of
    /// entries removed.
    pub fn clear(&self) -> usize {
        self.remove_tmp_files(false);
        let mut removed = 0;
        for path in self.entry_files() {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
        tracing::info!("Cleared {} cache entries", removed);
        removed
    }

    /// Remove entries whose age has reached the TTL.
    ///
    /// Unreadable entries are skipped and left in place. Stale temp files are
    /// deleted as well. Returns the number of entries removed.
    pub fn sweep_expired(&self) -> usize {
        self.remove_tmp_files(true);
        let now = self.clock.now();
        let mut removed = 0;

        for path in self.entry_files() {
            let entry = match Self::read_entry(&path) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable cache entry {}: {}", path.display(), e);
                    continue;
                }
            };

            if self.is_fresh(entry.timestamp, now) {
                continue;
            }

            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
            }
        }

        tracing::debug!("Swept {} expired cache entries", removed);
        removed
    }
}

/// File stem for a fingerprint: the percent-encoding, or a truncated
/// encoding plus a hash when the encoding is too long.
fn entry_stem(fingerprint: &str) -> String {
    let encoded = urlencoding::encode(fingerprint);
    if encoded.len() <= MAX_PLAIN_STEM_LEN {
        return encoded.into_owned();
    }

    // The encoding is ASCII, so any byte index is a char boundary.
    let mut prefix = &encoded[..HASHED_PREFIX_LEN];
    if let Some(pos) = prefix.rfind('%') {
        if pos + 3 > prefix.len() {
            prefix = &prefix[..pos];
        }
    }
    let digest = hex::encode(Sha256::digest(fingerprint.as_bytes()));
    format!("{}-{}", prefix, digest)
}
