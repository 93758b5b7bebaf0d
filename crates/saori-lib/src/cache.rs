//! On-disk cache of synthesized audio, keyed by request content.
//!
//! Entries are plain `<sha256>.wav` files. Writes go to a `.partial` file
//! first and are renamed into place, so a reader never sees half an entry.
//! A periodic sweep deletes the least recently used entries once the
//! directory outgrows its byte budget; a cache hit refreshes the entry's
//! modification time.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use saori_core::types::CacheConfig;

/// Distinguishes in-flight writes so concurrent `put`s never share a scratch file.
static PARTIAL_SEQ: AtomicU64 = AtomicU64::new(0);

/// Cache key for one synthesis request.
pub fn cache_key(user_id: &str, voice_name: &str, text: &str, speed: f32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(voice_name.as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    hasher.update([0u8]);
    hasher.update(speed.to_string().as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Result of one cache sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub files_removed: usize,
    pub bytes_freed: u64,
}

#[derive(Debug, Clone)]
pub struct AudioCache {
    dir: PathBuf,
}

impl AudioCache {
    /// Open (and create if needed) a cache rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.wav"))
    }

    /// Cached bytes for `key`, if present.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!("cache: hit {key}");
                if let Err(e) = touch(&path).await {
                    debug!("cache: failed to refresh {key}: {e}");
                }
                Some(bytes)
            }
            Err(_) => None,
        }
    }

    /// Store `bytes` under `key`.
    pub async fn put(&self, key: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let dest = self.path_for(key);
        let seq = PARTIAL_SEQ.fetch_add(1, Ordering::Relaxed);
        let partial = self
            .dir
            .join(format!("{key}.wav.{}-{seq}.partial", std::process::id()));
        tokio::fs::write(&partial, bytes).await?;
        if let Err(e) = tokio::fs::rename(&partial, &dest).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }
        debug!("cache: stored {key} ({} bytes)", bytes.len());
        Ok(dest)
    }

    /// Delete the oldest `*.wav` entries until the total fits `max_bytes`.
    pub async fn sweep(&self, max_bytes: u64) -> std::io::Result<SweepStats> {
        let mut entries: Vec<(PathBuf, u64, SystemTime)> = Vec::new();
        let mut total: u64 = 0;

        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("wav") {
                continue;
            }
            let meta = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };
            let stamp = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            total += meta.len();
            entries.push((path, meta.len(), stamp));
        }

        // Oldest first
        entries.sort_by_key(|(_, _, stamp)| *stamp);

        let mut stats = SweepStats::default();
        for (path, size, _) in entries {
            if total <= max_bytes {
                break;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    total -= size;
                    stats.files_removed += 1;
                    stats.bytes_freed += size;
                }
                Err(e) => error!("cache: failed to remove {}: {e}", path.display()),
            }
        }

        Ok(stats)
    }
}

async fn touch(path: &Path) -> std::io::Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)?
            .set_modified(SystemTime::now())
    })
    .await
    .map_err(std::io::Error::other)?
}

/// Run [`AudioCache::sweep`] every `config.sweep_interval` until the task is
/// aborted. The first sweep happens one interval after start.
pub fn spawn_sweeper(cache: AudioCache, config: CacheConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.sweep_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            info!("cache: starting cleanup");
            match cache.sweep(config.max_bytes).await {
                Ok(stats) if stats.files_removed > 0 => info!(
                    "cache: cleanup removed {} files, freed {:.2} MB",
                    stats.files_removed,
                    stats.bytes_freed as f64 / (1024.0 * 1024.0)
                ),
                Ok(_) => info!("cache: cleanup completed, no files removed"),
                Err(e) => warn!("cache: cleanup failed: {e}"),
            }
        }
    })
}
