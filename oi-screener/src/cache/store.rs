use super::MarketSnapshot;
use crate::error::ScreenerError;
use parking_lot::Mutex;
use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::warn;

/// Default file the [`FileSnapshotStore`] persists to.
pub const DEFAULT_CACHE_PATH: &str = "coingecko_market_data.json";

/// Persistence for the single [`MarketSnapshot`], independent of any freshness policy.
pub trait SnapshotStore: Send + Sync {
    /// Load the persisted snapshot, if one exists.
    fn load(&self) -> Result<Option<MarketSnapshot>, ScreenerError>;

    /// Replace the persisted snapshot. Readers never observe a partially written snapshot.
    fn store(&self, snapshot: &MarketSnapshot) -> Result<(), ScreenerError>;
}

/// [`SnapshotStore`] persisting the snapshot as a JSON file.
///
/// Writes go to a uniquely named sibling temporary file that is then renamed over the target,
/// so a crash mid-write leaves the previous snapshot intact and concurrent writers never share
/// a temporary file.
#[derive(Clone, Debug)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }
}

impl Default for FileSnapshotStore {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_PATH)
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> Result<Option<MarketSnapshot>, ScreenerError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        match serde_json::from_slice(&bytes) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(error) => {
                warn!(
                    path = %self.path.display(),
                    %error,
                    "market cap cache unreadable, treating as absent"
                );
                Ok(None)
            }
        }
    }

    fn store(&self, snapshot: &MarketSnapshot) -> Result<(), ScreenerError> {
        let dir = self.dir();
        fs::create_dir_all(dir)?;

        let bytes = serde_json::to_vec(snapshot)
            .map_err(|error| ScreenerError::Cache(error.to_string()))?;

        // Atomic write: write to a unique temp file in the same directory, then rename.
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|error| error.error)?;
        Ok(())
    }
}

/// [`SnapshotStore`] holding the snapshot in process memory.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    slot: Mutex<Option<MarketSnapshot>>,
}

impl InMemorySnapshotStore {
    pub fn new(snapshot: Option<MarketSnapshot>) -> Self {
        Self {
            slot: Mutex::new(snapshot),
        }
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn load(&self) -> Result<Option<MarketSnapshot>, ScreenerError> {
        Ok(self.slot.lock().clone())
    }

    fn store(&self, snapshot: &MarketSnapshot) -> Result<(), ScreenerError> {
        *self.slot.lock() = Some(snapshot.clone());
        Ok(())
    }
}
