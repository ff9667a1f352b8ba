// Durable config document
//
// Locates config.yaml (next to the executable, then the working directory)
// and rewrites it wholesale from registry snapshots.
//
// Numan Thabit 2025 Nov

use crate::config::AppConfig;
use crate::errors::PersistError;
use crate::metrics;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Full document captured under the registry lock.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Monotonic per-registry counter, higher is newer
    pub generation: u64,
    pub document: AppConfig,
}

#[derive(Debug, Clone)]
struct Locations {
    exe_dir: Option<PathBuf>,
    work_dir: PathBuf,
}

impl Locations {
    fn candidates(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.exe_dir
            .iter()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .chain(std::iter::once(self.work_dir.join(CONFIG_FILE_NAME)))
    }

    async fn resolve(&self) -> PathBuf {
        for path in self.candidates() {
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return path;
            }
        }
        self.work_dir.join(CONFIG_FILE_NAME)
    }
}

pub struct ConfigStore {
    locations: Arc<Locations>,
    timeout: Duration,
    /// generation of the last snapshot written to disk; held for the whole
    /// write so a timed-out caller cannot race the next writer
    last_written: Arc<Mutex<u64>>,
}

impl ConfigStore {
    pub fn new(exe_dir: Option<PathBuf>, work_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            locations: Arc::new(Locations {
                exe_dir,
                work_dir: work_dir.into(),
            }),
            timeout,
            last_written: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Store rooted at the running executable and the current directory.
    pub fn discover(timeout: Duration) -> std::io::Result<Self> {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        let work_dir = std::env::current_dir()?;
        Ok(Self::new(exe_dir, work_dir, timeout))
    }

    /// First config file that already exists, if any.
    pub fn existing_path(&self) -> Option<PathBuf> {
        self.locations.candidates().find(|p| p.is_file())
    }

    /// Path the next write goes to: an existing file, else a new one in
    /// the working directory.
    pub async fn resolve_path(&self) -> PathBuf {
        self.locations.resolve().await
    }

    /// Write `snapshot` unless a newer one already reached disk.
    ///
    /// The write runs on its own task. On timeout the caller gets
    /// [`PersistError::Timeout`] while the task keeps the generation lock
    /// until the file write settles, so later snapshots queue behind it.
    pub async fn write(&self, snapshot: Snapshot) -> Result<PathBuf, PersistError> {
        let task = tokio::spawn(write_locked(
            self.locations.clone(),
            self.last_written.clone(),
            snapshot,
        ));
        let result = match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(written)) => written,
            Ok(Err(join)) => Err(PersistError::Task(join.to_string())),
            Err(_) => Err(PersistError::Timeout(self.timeout)),
        };
        if let Err(err) = &result {
            metrics::PERSIST_FAILURES.inc();
            error!(error = %err, "failed to save config");
        }
        result
    }
}

async fn write_locked(
    locations: Arc<Locations>,
    last_written: Arc<Mutex<u64>>,
    snapshot: Snapshot,
) -> Result<PathBuf, PersistError> {
    let mut last = last_written.lock().await;
    let path = locations.resolve().await;
    if snapshot.generation <= *last {
        debug!(
            generation = snapshot.generation,
            written = *last,
            "skipping stale config snapshot"
        );
        return Ok(path);
    }
    let yaml = serde_yaml::to_string(&snapshot.document)?;
    tokio::fs::write(&path, yaml).await?;
    *last = snapshot.generation;
    info!(path = %path.display(), generation = snapshot.generation, "config saved");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(generation: u64, address: &str) -> Snapshot {
        Snapshot {
            generation,
            document: AppConfig {
                address: address.to_string(),
                ..AppConfig::default()
            },
        }
    }

    #[tokio::test]
    async fn creates_file_in_work_dir_when_none_exists() {
        let exe = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(
            Some(exe.path().to_path_buf()),
            work.path(),
            Duration::from_secs(5),
        );
        assert_eq!(store.existing_path(), None);

        let path = store.write(snapshot(1, "127.0.0.1:1")).await.unwrap();
        assert_eq!(path, work.path().join(CONFIG_FILE_NAME));
        let loaded = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.address, "127.0.0.1:1");
    }

    #[tokio::test]
    async fn prefers_file_next_to_executable() {
        let exe = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        std::fs::write(exe.path().join(CONFIG_FILE_NAME), "address: old\n").unwrap();
        std::fs::write(work.path().join(CONFIG_FILE_NAME), "address: other\n").unwrap();
        let store = ConfigStore::new(
            Some(exe.path().to_path_buf()),
            work.path(),
            Duration::from_secs(5),
        );

        let path = store.write(snapshot(1, "new")).await.unwrap();
        assert_eq!(path, exe.path().join(CONFIG_FILE_NAME));
        let untouched = std::fs::read_to_string(work.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(untouched, "address: other\n");
    }

    #[tokio::test]
    async fn falls_back_to_existing_work_dir_file() {
        let exe = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        std::fs::write(work.path().join(CONFIG_FILE_NAME), "address: old\n").unwrap();
        let store = ConfigStore::new(
            Some(exe.path().to_path_buf()),
            work.path(),
            Duration::from_secs(5),
        );
        assert_eq!(
            store.existing_path(),
            Some(work.path().join(CONFIG_FILE_NAME))
        );
    }

    #[tokio::test]
    async fn stale_snapshot_does_not_overwrite_newer() {
        let work = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(None, work.path(), Duration::from_secs(5));
        store.write(snapshot(2, "newer")).await.unwrap();
        store.write(snapshot(1, "older")).await.unwrap();

        let loaded = AppConfig::load(Some(&work.path().join(CONFIG_FILE_NAME))).unwrap();
        assert_eq!(loaded.address, "newer");
    }

    #[tokio::test]
    async fn timed_out_write_keeps_lock_until_it_lands() {
        let work = tempfile::tempdir().unwrap();
        let path = work.path().join(CONFIG_FILE_NAME);
        let store = ConfigStore::new(None, work.path(), Duration::from_millis(20));

        let guard = store.last_written.clone().lock_owned().await;
        let err = store.write(snapshot(1, "first")).await.unwrap_err();
        assert!(matches!(err, PersistError::Timeout(_)));
        assert!(!path.exists());
        drop(guard);

        // the abandoned write still completes on its own task
        for _ in 0..200 {
            if *store.last_written.lock().await == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(*store.last_written.lock().await, 1);
        assert_eq!(AppConfig::load(Some(&path)).unwrap().address, "first");

        let store = store.with_timeout(Duration::from_secs(5));
        store.write(snapshot(2, "second")).await.unwrap();
        assert_eq!(AppConfig::load(Some(&path)).unwrap().address, "second");
    }

    #[tokio::test]
    async fn unwritable_directory_reports_io_error() {
        let work = tempfile::tempdir().unwrap();
        let missing = work.path().join("does-not-exist");
        let store = ConfigStore::new(None, missing, Duration::from_secs(5));
        assert!(matches!(
            store.write(snapshot(1, "x")).await,
            Err(PersistError::Io(_))
        ));
    }
}
