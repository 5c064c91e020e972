//! json-file-adapter — JSON file implementation of the `KeyValueStore` port.
//!
//! Purpose
//! - Persist records in a single JSON object on disk, keyed by id:
//!   `{"1": {"name": "John"}}`.
//! - Implements the `KeyValueStore` trait from the `domain` crate.
//!
//! Notes
//! - No caching: every call re-reads the file, so edits made by other
//!   programs between calls are always observed.
//! - Every write loads the whole document, applies the change and commits
//!   the new document through a sibling temp file plus `rename`. A failed
//!   write leaves the previous content in place.
//! - Two writers racing on the same file can still lose updates; there is no
//!   locking.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use domain::{KeyValueStore, Record, RecordId, Records, StoreError};
use tracing::debug;
use uuid::Uuid;

/// Store location used when no path is configured.
pub const DEFAULT_DB_PATH: &str = "./data/db.json";

/// File-backed store. A missing file reads as an empty store and is created
/// on the first write.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn load(&self) -> Result<Records, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "store file missing, treating as empty");
                return Ok(Records::new());
            }
            Err(e) => return Err(self.io_err(e)),
        };
        serde_json::from_str(&content).map_err(|e| StoreError::Format {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    /// Read-modify-write of the whole document. `apply` returns whether it
    /// changed anything; unchanged documents are not rewritten.
    fn update<F>(&self, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Records) -> bool,
    {
        let mut records = self.load()?;
        if !apply(&mut records) {
            return Ok(());
        }
        self.commit(&records)
    }

    fn commit(&self, records: &Records) -> Result<(), StoreError> {
        let temp_path = self.temp_path()?;
        self.commit_via(&temp_path, records)
    }

    fn commit_via(&self, temp_path: &Path, records: &Records) -> Result<(), StoreError> {
        let body = serde_json::to_string_pretty(records)
            .map_err(|e| StoreError::Backend(format!("failed to encode records: {e}")))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }

        let written = write_synced(temp_path, body.as_bytes())
            .and_then(|()| self.copy_permissions_to(temp_path))
            .and_then(|()| fs::rename(temp_path, &self.path));
        if let Err(e) = written {
            let _ = fs::remove_file(temp_path);
            return Err(self.io_err(e));
        }
        debug!(path = %self.path.display(), records = records.len(), "store file written");
        Ok(())
    }

    // The rename replaces the inode, so the existing file's mode has to be
    // carried over explicitly. A first write keeps the process default.
    fn copy_permissions_to(&self, temp_path: &Path) -> io::Result<()> {
        match fs::metadata(&self.path) {
            Ok(meta) => fs::set_permissions(temp_path, meta.permissions()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// `<file>.tmp.<uuid>` next to the target, so the final rename stays on
    /// one filesystem.
    fn temp_path(&self) -> Result<PathBuf, StoreError> {
        let file_name = self.path.file_name().ok_or_else(|| {
            self.io_err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "store path has no file name",
            ))
        })?;
        let temp_name = format!("{}.tmp.{}", file_name.to_string_lossy(), Uuid::new_v4());
        Ok(self.path.with_file_name(temp_name))
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

impl KeyValueStore for JsonFileStore {
    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.load()?.len())
    }

    fn list(&self) -> Result<Records, StoreError> {
        self.load()
    }

    fn get(&self, id: &RecordId) -> Result<Option<Record>, StoreError> {
        Ok(self.load()?.remove(id))
    }

    fn add(&self, id: RecordId, data: Record) -> Result<(), StoreError> {
        self.update(|records| {
            records.insert(id, data);
            true
        })
    }

    fn remove(&self, id: &RecordId) -> Result<(), StoreError> {
        self.update(|records| records.remove(id).is_some())
    }
}
