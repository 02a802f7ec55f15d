// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Font installation workflow.
//!
//! Installing a catalog font means downloading every file its chosen source
//! lists, handing each downloaded file to a [`FontInstaller`], and recording
//! the result in the [`InstalledSet`] ledger. Files are processed one after
//! another. A file that fails to download or install is reported and skipped,
//! the remaining files still get their turn.
//!
//! How a file actually becomes usable by the operating system is up to the
//! [`FontInstaller`]. [`DirectoryInstaller`] is the portable fallback: it
//! copies files into a per-user font directory and deletes them again on
//! uninstall.

use crate::{
    catalog::{CatalogEntry, FontMeta, SourceRecord},
    fetch::{FetchError, Retrieve},
    installed::{InstalledError, InstalledRecord, InstalledSet},
};

use std::{
    fs::{copy, remove_file},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{info, instrument, warn};

/// Capability to make a downloaded font file available to the system.
pub trait FontInstaller {
    /// Install staged font file under display name.
    ///
    /// Returns the file name the font ended up with.
    fn install(&self, staged: &Path, display_name: &str) -> Result<String>;

    /// Uninstall font file previously installed under display name.
    fn uninstall(&self, display_name: &str, filename: &str) -> Result<()>;
}

/// Installs fonts by copying them into a directory.
#[derive(Debug, Clone)]
pub struct DirectoryInstaller {
    fonts_dir: PathBuf,
}

impl DirectoryInstaller {
    /// Construct new directory installer targeting `fonts_dir`.
    pub fn new(fonts_dir: impl Into<PathBuf>) -> Self {
        Self {
            fonts_dir: fonts_dir.into(),
        }
    }
}

impl FontInstaller for DirectoryInstaller {
    fn install(&self, staged: &Path, display_name: &str) -> Result<String> {
        let filename = file_name(&staged.to_string_lossy())?;
        let target = self.fonts_dir.join(&filename);
        mkdirp::mkdirp(&self.fonts_dir).map_err(|source| InstallError::Io {
            source,
            path: self.fonts_dir.clone(),
        })?;
        copy(staged, &target).map_err(|source| InstallError::Io {
            source,
            path: target.clone(),
        })?;
        info!("installed {display_name} to {:?}", target.display());

        Ok(filename)
    }

    fn uninstall(&self, display_name: &str, filename: &str) -> Result<()> {
        let target = self.fonts_dir.join(file_name(filename)?);
        match remove_file(&target) {
            Ok(()) => info!("uninstalled {display_name} from {:?}", target.display()),
            Err(error) if error.kind() == ErrorKind::NotFound => {
                warn!("{:?} already gone", target.display());
            }
            Err(source) => return Err(InstallError::Io { source, path: target }),
        }

        Ok(())
    }
}

/// Ledger key for the `ordinal`-th of `total` files of a font.
///
/// Shaped `"{id} ({style})"`, where style falls back to the one-based
/// ordinal. A styled font with several files gets the ordinal appended to its
/// style. Keys of different catalog identities never collide.
pub fn display_key(meta: &FontMeta, ordinal: usize, total: usize) -> String {
    let id = meta.id.as_str();
    match meta.style.as_deref() {
        Some(style) if total > 1 => format!("{id} ({style} {ordinal})"),
        Some(style) => format!("{id} ({style})"),
        None => format!("{id} ({ordinal})"),
    }
}

/// Progress notification, sent before each file is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress<'a> {
    /// One-based index of current file.
    pub index: usize,

    /// Number of files to process.
    pub total: usize,

    /// Remote path of current file.
    pub file: &'a str,
}

/// Outcome of installing one font.
#[derive(Debug, Default)]
pub struct InstallReport {
    /// Ledger keys of installed files.
    pub installed: Vec<String>,

    /// Files that could not be installed.
    pub failed: Vec<FileFailure>,
}

/// File skipped during installation.
#[derive(Debug)]
pub struct FileFailure {
    /// Remote path of skipped file.
    pub file: String,

    /// Why it was skipped.
    pub error: InstallError,
}

/// Install workflow over a retrieval capability and a font installer.
#[derive(Debug)]
pub struct Installer<R, I>
where
    R: Retrieve,
    I: FontInstaller,
{
    retriever: R,
    installer: I,
    staging_dir: PathBuf,
}

impl<R, I> Installer<R, I>
where
    R: Retrieve,
    I: FontInstaller,
{
    /// Construct new install workflow staging downloads in `staging_dir`.
    pub fn new(retriever: R, installer: I, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            retriever,
            installer,
            staging_dir: staging_dir.into(),
        }
    }

    /// Install every file that `source` lists for catalog `entry`.
    ///
    /// Each installed file is recorded in the ledger right away, so an
    /// interrupted install keeps track of what already landed.
    ///
    /// # Errors
    ///
    /// - Return [`InstallError::NoFiles`] if source lists no files.
    ///
    /// Per-file failures are reported in [`InstallReport::failed`].
    #[instrument(skip_all, fields(font = %entry.meta.id, source = %source.repo_key))]
    pub fn install_entry(
        &self,
        entry: &CatalogEntry,
        source: &SourceRecord,
        ledger: &mut InstalledSet,
        mut progress: impl FnMut(Progress<'_>),
    ) -> Result<InstallReport> {
        if source.files.is_empty() {
            return Err(InstallError::NoFiles {
                key: source.repo_key.clone(),
            });
        }

        let mut report = InstallReport::default();
        let total = source.files.len();
        for (index, file) in source.files.iter().enumerate() {
            let ordinal = index + 1;
            progress(Progress {
                index: ordinal,
                total,
                file,
            });

            let key = display_key(&entry.meta, ordinal, total);
            match self.install_file(entry, source, file, key, ledger) {
                Ok(key) => report.installed.push(key),
                Err(error) => {
                    warn!("cannot install {file}: {error}");
                    report.failed.push(FileFailure {
                        file: file.clone(),
                        error,
                    });
                }
            }
        }

        Ok(report)
    }

    fn install_file(
        &self,
        entry: &CatalogEntry,
        source: &SourceRecord,
        file: &str,
        key: String,
        ledger: &mut InstalledSet,
    ) -> Result<String> {
        let staged = self
            .staging_dir
            .join(format!("{}_{}", source.owner, source.repo))
            .join(file_name(file)?);
        self.retriever
            .fetch_file(&source.owner, &source.repo, file, &staged)?;

        let filename = self.installer.install(&staged, &key)?;
        ledger.record_install(&key, filename, &source.repo_key, &entry.meta.id)?;

        Ok(key)
    }

    /// Uninstall font recorded under ledger key.
    ///
    /// See [`uninstall`].
    pub fn uninstall(
        &self,
        key: impl AsRef<str>,
        ledger: &mut InstalledSet,
    ) -> Result<InstalledRecord> {
        uninstall(&self.installer, key, ledger)
    }
}

/// Uninstall font recorded under ledger key through target installer.
///
/// # Errors
///
/// - Return [`InstallError::UnknownInstall`] if key is not in the ledger.
/// - Return [`InstallError::Io`] if font file cannot be removed.
/// - Return [`InstallError::Ledger`] if ledger cannot be persisted.
#[instrument(skip_all)]
pub fn uninstall<I>(
    installer: &I,
    key: impl AsRef<str>,
    ledger: &mut InstalledSet,
) -> Result<InstalledRecord>
where
    I: FontInstaller + ?Sized,
{
    let key = key.as_ref();
    let record = ledger
        .get(key)
        .cloned()
        .ok_or_else(|| InstallError::UnknownInstall { key: key.into() })?;
    installer.uninstall(key, &record.filename)?;
    ledger.record_uninstall(key)?;

    Ok(record)
}

fn file_name(path: &str) -> Result<String> {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| InstallError::InvalidFileName { path: path.into() })
}

/// All possible error types for font installation.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// Chosen source lists no files for the font.
    #[error("source {key} lists no files for this font")]
    NoFiles { key: String },

    /// Ledger has no record under key.
    #[error("nothing installed under {key:?}")]
    UnknownInstall { key: String },

    /// Remote path does not end in a file name.
    #[error("{path:?} does not name a file")]
    InvalidFileName { path: String },

    /// Font file cannot be downloaded.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Font file cannot be copied or removed.
    #[error("font file operation failed at {:?}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Ledger cannot be persisted.
    #[error(transparent)]
    Ledger(#[from] InstalledError),
}

/// Friendly result alias :3
type Result<T, E = InstallError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;
    use std::collections::HashMap;

    struct CannedFiles(HashMap<String, &'static str>);

    impl Retrieve for CannedFiles {
        fn fetch_file(
            &self,
            owner: &str,
            repo: &str,
            path: &str,
            destination: &Path,
        ) -> fetch::Result<()> {
            let key = format!("{owner}/{repo}/{path}");
            let body = self.0.get(&key).ok_or(FetchError::NotFound { url: key })?;
            fetch::write_staged(destination, body.as_bytes())
        }
    }

    fn inter_entry(files: &[&str]) -> CatalogEntry {
        let files = files.iter().map(|file| file.to_string()).collect::<Vec<_>>();
        CatalogEntry {
            meta: FontMeta {
                id: "Inter_Regular".into(),
                name: Some("Inter".into()),
                family: Some("Inter".into()),
                files: files.clone(),
                ..Default::default()
            },
            sources: vec![SourceRecord {
                repo_key: "acme/fonts".into(),
                owner: "acme".into(),
                repo: "fonts".into(),
                descriptor: "fonts.json".into(),
                files,
            }],
        }
    }

    #[test_case(Some("Italic"), 1, 1, "Inter_Regular (Italic)"; "single styled file")]
    #[test_case(Some("Italic"), 3, 4, "Inter_Regular (Italic 3)"; "styled with several files")]
    #[test_case(None, 2, 2, "Inter_Regular (2)"; "ordinal without style")]
    #[test]
    fn display_key_shape(style: Option<&str>, ordinal: usize, total: usize, expect: &str) {
        let meta = FontMeta {
            id: "Inter_Regular".into(),
            style: style.map(Into::into),
            ..Default::default()
        };
        pretty_assertions::assert_eq!(display_key(&meta, ordinal, total), expect);
    }

    #[test]
    fn install_entry_continues_past_failed_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let fonts_dir = dir.path().join("fonts");
        let retriever = CannedFiles(HashMap::from([
            ("acme/fonts/ttf/Inter-Regular.ttf".to_string(), "regular"),
            ("acme/fonts/ttf/Inter-Italic.ttf".to_string(), "italic"),
        ]));
        let installer = Installer::new(
            retriever,
            DirectoryInstaller::new(&fonts_dir),
            dir.path().join("staging"),
        );
        let mut ledger = InstalledSet::open(dir.path().join("installed.json"));
        let entry = inter_entry(&[
            "ttf/Inter-Regular.ttf",
            "ttf/Inter-Missing.ttf",
            "ttf/Inter-Italic.ttf",
        ]);
        let mut seen = Vec::new();

        let report = installer.install_entry(&entry, &entry.sources[0], &mut ledger, |p| {
            seen.push((p.index, p.total, p.file.to_string()))
        })?;

        assert_eq!(report.installed, vec!["Inter_Regular (1)", "Inter_Regular (3)"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].file, "ttf/Inter-Missing.ttf");
        assert!(matches!(report.failed[0].error, InstallError::Fetch(..)));
        assert_eq!(
            seen,
            vec![
                (1, 3, "ttf/Inter-Regular.ttf".to_string()),
                (2, 3, "ttf/Inter-Missing.ttf".to_string()),
                (3, 3, "ttf/Inter-Italic.ttf".to_string()),
            ]
        );
        assert_eq!(std::fs::read_to_string(fonts_dir.join("Inter-Italic.ttf"))?, "italic");
        let expect = InstalledRecord {
            filename: "Inter-Regular.ttf".into(),
            source: "acme/fonts".into(),
            id: "Inter_Regular".into(),
        };
        assert_eq!(ledger.get("Inter_Regular (1)"), Some(&expect));
        assert_eq!(InstalledSet::open(ledger.path()).list().len(), 2);

        Ok(())
    }

    #[test]
    fn install_entry_requires_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let installer = Installer::new(
            CannedFiles(HashMap::new()),
            DirectoryInstaller::new(dir.path().join("fonts")),
            dir.path().join("staging"),
        );
        let mut ledger = InstalledSet::open(dir.path().join("installed.json"));
        let entry = inter_entry(&[]);

        let result = installer.install_entry(&entry, &entry.sources[0], &mut ledger, |_| {});

        assert!(matches!(result, Err(InstallError::NoFiles { .. })));

        Ok(())
    }

    #[test]
    fn uninstall_removes_file_and_record() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let fonts_dir = dir.path().join("fonts");
        let retriever = CannedFiles(HashMap::from([(
            "acme/fonts/Inter-Regular.ttf".to_string(),
            "regular",
        )]));
        let installer = Installer::new(
            retriever,
            DirectoryInstaller::new(&fonts_dir),
            dir.path().join("staging"),
        );
        let mut ledger = InstalledSet::open(dir.path().join("installed.json"));
        let entry = inter_entry(&["Inter-Regular.ttf"]);
        installer.install_entry(&entry, &entry.sources[0], &mut ledger, |_| {})?;
        assert!(fonts_dir.join("Inter-Regular.ttf").exists());

        // Uninstalling needs no retrieval capability.
        let directory = DirectoryInstaller::new(&fonts_dir);
        let record = uninstall(&directory, "Inter_Regular (1)", &mut ledger)?;

        assert_eq!(record.filename, "Inter-Regular.ttf");
        assert!(!fonts_dir.join("Inter-Regular.ttf").exists());
        assert!(ledger.list().is_empty());
        assert!(matches!(
            installer.uninstall("Inter_Regular (1)", &mut ledger),
            Err(InstallError::UnknownInstall { .. })
        ));

        Ok(())
    }

    #[test]
    fn same_named_fonts_keep_separate_records() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let fonts_dir = dir.path().join("fonts");
        let retriever = CannedFiles(HashMap::from([
            ("acme/fonts/Inter-Regular.ttf".to_string(), "inter"),
            ("acme/fonts/Mono-Regular.ttf".to_string(), "mono"),
        ]));
        let installer = Installer::new(
            retriever,
            DirectoryInstaller::new(&fonts_dir),
            dir.path().join("staging"),
        );
        let mut ledger = InstalledSet::open(dir.path().join("installed.json"));
        let inter = inter_entry(&["Inter-Regular.ttf"]);
        let mut mono = inter_entry(&["Mono-Regular.ttf"]);
        mono.meta.id = "Mono_Regular".into();
        mono.meta.family = Some("Mono".into());
        assert_eq!(inter.display_name(), mono.display_name());

        let first = installer.install_entry(&inter, &inter.sources[0], &mut ledger, |_| {})?;
        let second = installer.install_entry(&mono, &mono.sources[0], &mut ledger, |_| {})?;

        assert_eq!(first.installed, vec!["Inter_Regular (1)"]);
        assert_eq!(second.installed, vec!["Mono_Regular (1)"]);
        assert_eq!(ledger.list().len(), 2);

        installer.uninstall("Inter_Regular (1)", &mut ledger)?;

        assert!(!fonts_dir.join("Inter-Regular.ttf").exists());
        assert!(fonts_dir.join("Mono-Regular.ttf").exists());
        assert_eq!(
            ledger.get("Mono_Regular (1)").map(|record| record.filename.as_str()),
            Some("Mono-Regular.ttf")
        );

        Ok(())
    }

    #[test]
    fn uninstall_tolerates_file_already_gone() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let installer = DirectoryInstaller::new(dir.path());

        installer.uninstall("Inter_Regular (1)", "Inter-Regular.ttf")?;

        Ok(())
    }
}
