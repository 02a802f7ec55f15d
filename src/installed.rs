// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Installed font ledger.
//!
//! Keeps track of which catalog fonts have been materialized on this machine.
//! The ledger is pure bookkeeping: it never checks the file system, it only
//! remembers what the installer reported. It is persisted independently of
//! the catalog, so it outlives catalog refreshes and source removal. Like
//! the source registry, every change is applied on top of the latest persisted
//! ledger while holding its document lock.

use crate::document::{self, DocumentError};

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tracing::debug;

/// One installed font file.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct InstalledRecord {
    /// File name on disk.
    pub filename: String,

    /// Registry key of the source it came from.
    pub source: String,

    /// Catalog identity of the font.
    pub id: String,
}

/// Persisted ledger of installed font files.
#[derive(Debug)]
pub struct InstalledSet {
    path: PathBuf,
    records: BTreeMap<String, InstalledRecord>,
}

impl InstalledSet {
    /// Open ledger document at target path.
    ///
    /// Missing or corrupt documents yield an empty ledger.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = document::load_or_default(&path);
        Self { path, records }
    }

    /// Path of backing ledger document.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Record installation of one file under target key.
    ///
    /// An existing record under the same key is replaced.
    ///
    /// # Errors
    ///
    /// - Return [`InstalledError::Document`] if ledger cannot be persisted.
    pub fn record_install(
        &mut self,
        key: impl Into<String>,
        filename: impl Into<String>,
        source: impl Into<String>,
        id: impl Into<String>,
    ) -> Result<()> {
        let key = key.into();
        let record = InstalledRecord {
            filename: filename.into(),
            source: source.into(),
            id: id.into(),
        };
        debug!("record install of {key} as {}", record.filename);

        self.update(|records| {
            records.insert(key, record);
            ((), true)
        })
    }

    /// Forget record under target key.
    ///
    /// Returns the forgotten record, if any.
    ///
    /// # Errors
    ///
    /// - Return [`InstalledError::Document`] if ledger cannot be persisted.
    pub fn record_uninstall(&mut self, key: impl AsRef<str>) -> Result<Option<InstalledRecord>> {
        let key = key.as_ref();
        let removed = self.update(|records| {
            let removed = records.remove(key);
            let changed = removed.is_some();
            (removed, changed)
        })?;
        if removed.is_some() {
            debug!("record uninstall of {key}");
        }

        Ok(removed)
    }

    /// Forget every record whose file name is listed.
    ///
    /// Returns the keys that were forgotten.
    ///
    /// # Errors
    ///
    /// - Return [`InstalledError::Document`] if ledger cannot be persisted.
    pub fn forget_filenames(
        &mut self,
        filenames: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Result<Vec<String>> {
        let filenames = filenames
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .collect::<Vec<_>>();
        self.update(|records| {
            let (forgotten, kept): (BTreeMap<_, _>, BTreeMap<_, _>) = std::mem::take(records)
                .into_iter()
                .partition(|(_, record)| filenames.contains(&record.filename));
            *records = kept;
            let changed = !forgotten.is_empty();
            (forgotten.into_keys().collect(), changed)
        })
    }

    /// Lookup record by key.
    pub fn get(&self, key: impl AsRef<str>) -> Option<&InstalledRecord> {
        self.records.get(key.as_ref())
    }

    /// All records keyed by display key.
    pub fn list(&self) -> &BTreeMap<String, InstalledRecord> {
        &self.records
    }

    /// Apply change to the latest persisted ledger, saving it only when the
    /// change reports that something changed.
    fn update<T>(
        &mut self,
        change: impl FnOnce(&mut BTreeMap<String, InstalledRecord>) -> (T, bool),
    ) -> Result<T> {
        let _lock = document::lock(&self.path)?;
        let mut next = document::load_or_default(&self.path);
        let (outcome, changed) = change(&mut next);
        if changed {
            document::save(&self.path, &next)?;
        }
        self.records = next;

        Ok(outcome)
    }
}

/// All possible error types for installed ledger interaction.
#[derive(Debug, thiserror::Error)]
pub enum InstalledError {
    /// Ledger document cannot be persisted.
    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Friendly result alias :3
type Result<T, E = InstalledError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn install_and_uninstall_round_trip_through_disk() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("installed.json");
        let mut ledger = InstalledSet::open(&path);

        ledger.record_install("Regular (1)", "Inter-Regular.ttf", "acme/fonts", "Inter_Regular")?;
        ledger.record_install("Bold (2)", "Inter-Bold.ttf", "acme/fonts", "Inter_Bold")?;
        let removed = ledger.record_uninstall("Regular (1)")?;

        assert_eq!(
            removed.map(|record| record.filename),
            Some("Inter-Regular.ttf".to_string())
        );
        let reopened = InstalledSet::open(&path);
        assert_eq!(reopened.list(), ledger.list());
        assert_eq!(
            std::fs::read_to_string(&path)?,
            indoc! {r#"
                {
                  "Bold (2)": {
                    "filename": "Inter-Bold.ttf",
                    "source": "acme/fonts",
                    "id": "Inter_Bold"
                  }
                }
            "#}
        );

        Ok(())
    }

    #[test]
    fn uninstall_unknown_key_is_noop() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut ledger = InstalledSet::open(dir.path().join("installed.json"));

        assert_eq!(ledger.record_uninstall("ghost")?, None);
        assert!(!ledger.path().exists());

        Ok(())
    }

    #[test]
    fn forget_filenames_removes_every_match() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut ledger = InstalledSet::open(dir.path().join("installed.json"));
        ledger.record_install("a", "Shared.ttf", "acme/fonts", "x")?;
        ledger.record_install("b", "Shared.ttf", "bolt/type", "x")?;
        ledger.record_install("c", "Other.ttf", "acme/fonts", "y")?;

        let forgotten = ledger.forget_filenames(["Shared.ttf", "Missing.ttf"])?;

        assert_eq!(forgotten, vec!["a", "b"]);
        assert_eq!(ledger.list().keys().collect::<Vec<_>>(), vec!["c"]);
        assert_eq!(InstalledSet::open(ledger.path()).list().len(), 1);

        Ok(())
    }

    #[test]
    fn reinstall_replaces_record() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut ledger = InstalledSet::open(dir.path().join("installed.json"));

        ledger.record_install("Inter", "Inter-Regular.ttf", "acme/fonts", "Inter_Regular")?;
        ledger.record_install("Inter", "Inter-Regular.otf", "bolt/type", "Inter_Regular")?;

        let expect = InstalledRecord {
            filename: "Inter-Regular.otf".into(),
            source: "bolt/type".into(),
            id: "Inter_Regular".into(),
        };
        assert_eq!(ledger.get("Inter"), Some(&expect));
        assert_eq!(ledger.list().len(), 1);

        Ok(())
    }

    #[test]
    fn ledgers_sharing_a_document_keep_each_others_records() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("installed.json");
        let mut first = InstalledSet::open(&path);
        let mut second = InstalledSet::open(&path);

        first.record_install("Inter_Regular (1)", "Inter-Regular.ttf", "acme/fonts", "Inter_Regular")?;
        second.record_install("Mono_Bold (1)", "Mono-Bold.otf", "bolt/type", "Mono_Bold")?;

        assert_eq!(
            InstalledSet::open(&path).list().keys().collect::<Vec<_>>(),
            vec!["Inter_Regular (1)", "Mono_Bold (1)"]
        );

        Ok(())
    }
}
