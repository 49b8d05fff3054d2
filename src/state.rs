use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use tokio::sync::Mutex;

use crate::domain::Document;

#[derive(Debug)]
pub enum StoreError {
    Io(io::Error),
    SerdeJson(serde_json::Error),
    Corrupt {
        path: PathBuf,
        reason: String,
    },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::SerdeJson(e) => write!(f, "json error: {e}"),
            Self::Corrupt { path, reason } => {
                write!(f, "raffle store is corrupt ({}): {reason}", path.display())
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::SerdeJson(e) => Some(e),
            Self::Corrupt { .. } => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::SerdeJson(value)
    }
}

/// Result of a mutation closure: `Save` persists the document, `Keep`
/// returns the value without touching the file.
#[derive(Debug)]
pub enum Commit<T> {
    Save(T),
    Keep(T),
}

/// File-backed raffle store.
///
/// Nothing is cached between operations: every call reads the file under the
/// lock, so a failed write can never leave memory ahead of disk.
pub struct RaffleStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl RaffleStore {
    /// Opens the store at `path`, seeding an empty collection if the file does
    /// not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let bytes = serde_json::to_vec_pretty(&Document::empty())?;
        create_if_absent(&path, &bytes)?;
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Document, StoreError> {
        let _guard = self.lock.lock().await;
        self.read_document()
    }

    /// Runs `f` against the current document as one load, apply, save unit.
    /// Errors from `f` abort the unit and leave the file untouched.
    pub async fn mutate<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Document) -> Result<Commit<T>, E>,
        E: From<StoreError>,
    {
        let _guard = self.lock.lock().await;
        let mut doc = self.read_document()?;
        match f(&mut doc)? {
            Commit::Save(value) => {
                self.write_document(&doc)?;
                Ok(value)
            }
            Commit::Keep(value) => Ok(value),
        }
    }

    fn read_document(&self) -> Result<Document, StoreError> {
        let bytes = fs::read(&self.path).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn write_document(&self, doc: &Document) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(doc)?;
        write_atomic(&self.path, &bytes)?;
        Ok(())
    }
}

fn tmp_sibling(path: &Path, suffix: &str) -> Result<PathBuf, io::Error> {
    let dir = path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "path has no parent directory")
    })?;
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    Ok(dir.join(format!("{}.{suffix}", file_name.to_string_lossy())))
}

/// Writes and fsyncs `tmp_path`, removing it again if any step fails.
fn write_tmp(tmp_path: &Path, bytes: &[u8]) -> Result<(), io::Error> {
    let written = (|| {
        let mut file = fs::File::create(tmp_path)?;
        file.write_all(bytes)?;
        file.write_all(b"\n")?;
        file.sync_all()
    })();
    if written.is_err() {
        let _ = fs::remove_file(tmp_path);
    }
    written
}

/// Publishes a fully written seed file with `hard_link`, which fails instead
/// of replacing a file another initializer created first.
fn create_if_absent(path: &Path, bytes: &[u8]) -> Result<(), io::Error> {
    if path.exists() {
        return Ok(());
    }
    let tmp_path = tmp_sibling(path, &format!("{}.init", ulid::Ulid::new()))?;
    write_tmp(&tmp_path, bytes)?;
    let linked = fs::hard_link(&tmp_path, path);
    let _ = fs::remove_file(&tmp_path);
    match linked {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), io::Error> {
    let tmp_path = tmp_sibling(path, "tmp")?;
    write_tmp(&tmp_path, bytes)?;

    #[cfg(windows)]
    {
        if path.exists() {
            let _ = fs::remove_file(path);
        }
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(())
}
