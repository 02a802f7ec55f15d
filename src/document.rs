// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Persisted JSON documents.
//!
//! All state that fontsync keeps between runs is stored as human-editable
//! UTF-8 JSON documents inside the data directory. Reading is forgiving:
//! a missing or malformed document is treated as if no prior state existed,
//! so hand-edits gone wrong never leave the program unable to start. Writing
//! is strict: the document is serialized into a uniquely named sibling
//! temporary file that is then renamed over the target, so a crash mid-write
//! leaves the previous valid document in place.
//!
//! Several fontsync processes may share one data directory. Read-modify-write
//! cycles on a document therefore happen while holding a [`DocumentLock`], an
//! advisory lock on a `<document>.lock` file next to the document.

use fs4::FileExt;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs::{read_to_string, File, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Load document at target path, or fall back to its default value.
///
/// Missing documents are expected on first run. Unreadable or malformed
/// documents are logged and replaced by the default.
pub fn load_or_default<T>(path: impl AsRef<Path>) -> T
where
    T: DeserializeOwned + Default,
{
    let path = path.as_ref();
    let data = match read_to_string(path) {
        Ok(data) => data,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            debug!("no document at {:?}, starting empty", path.display());
            return T::default();
        }
        Err(error) => {
            warn!("cannot read {:?}, starting empty: {error}", path.display());
            return T::default();
        }
    };

    match serde_json::from_str(&data) {
        Ok(value) => value,
        Err(error) => {
            warn!("corrupt document {:?}, starting empty: {error}", path.display());
            T::default()
        }
    }
}

/// Save document to target path by write-then-rename.
///
/// Creates parent directories if needed. Every call writes through its own
/// temporary file, so concurrent writers never publish each other's partial
/// output.
///
/// # Errors
///
/// - Return [`DocumentError::CreateDir`] if parent directory cannot be made.
/// - Return [`DocumentError::Serialize`] if value cannot be serialized.
/// - Return [`DocumentError::Write`] if temporary file cannot be written or
///   renamed over the target.
pub fn save<T>(path: impl AsRef<Path>, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let path = path.as_ref();
    let parent = parent_dir(path)?;

    let mut payload = serde_json::to_string_pretty(value)?;
    payload.push('\n');

    let write_error = |source| DocumentError::Write {
        source,
        path: path.into(),
    };
    let mut temp = NamedTempFile::new_in(parent).map_err(write_error)?;
    temp.write_all(payload.as_bytes()).map_err(write_error)?;
    temp.persist(path).map_err(|error| write_error(error.error))?;
    debug!("saved document {:?}", path.display());

    Ok(())
}

/// Exclusive advisory lock guarding one document.
///
/// Released when dropped.
#[derive(Debug)]
pub struct DocumentLock {
    _file: File,
    path: PathBuf,
}

impl DocumentLock {
    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }
}

/// Lock document at target path, waiting for other holders to let go.
///
/// # Errors
///
/// - Return [`DocumentError::CreateDir`] if parent directory cannot be made.
/// - Return [`DocumentError::Lock`] if lock file cannot be opened or locked.
pub fn lock(path: impl AsRef<Path>) -> Result<DocumentLock> {
    let (file, path) = open_lock_file(path.as_ref())?;
    file.lock_exclusive().map_err(|source| DocumentError::Lock {
        source,
        path: path.clone(),
    })?;

    Ok(DocumentLock { _file: file, path })
}

/// Lock document at target path unless somebody else holds it.
///
/// Returns `None` if the lock is currently held elsewhere.
///
/// # Errors
///
/// - Return [`DocumentError::CreateDir`] if parent directory cannot be made.
/// - Return [`DocumentError::Lock`] if lock file cannot be opened or locked.
pub fn try_lock(path: impl AsRef<Path>) -> Result<Option<DocumentLock>> {
    let (file, path) = open_lock_file(path.as_ref())?;
    match file.try_lock_exclusive() {
        Ok(()) => Ok(Some(DocumentLock { _file: file, path })),
        Err(error) if error.kind() == ErrorKind::WouldBlock => {
            debug!("{:?} is held elsewhere", path.display());
            Ok(None)
        }
        Err(source) => Err(DocumentError::Lock { source, path }),
    }
}

fn open_lock_file(path: &Path) -> Result<(File, PathBuf)> {
    parent_dir(path)?;
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    let path = path.with_file_name(name);
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(&path)
        .map_err(|source| DocumentError::Lock {
            source,
            path: path.clone(),
        })?;

    Ok((file, path))
}

fn parent_dir(path: &Path) -> Result<&Path> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    mkdirp::mkdirp(parent).map_err(|source| DocumentError::CreateDir {
        source,
        path: parent.into(),
    })?;

    Ok(parent)
}

/// All possible error types for document persistence.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Parent directory of document cannot be created.
    #[error("failed to create directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Document cannot be serialized.
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),

    /// Document cannot be written to disk.
    #[error("failed to write document {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Lock file of document cannot be opened or locked.
    #[error("failed to lock {:?}", path.display())]
    Lock {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = DocumentError> = std::result::Result<T, E>;
