// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Source registry management.
//!
//! A __source__ is a remote repository that publishes a descriptor document
//! listing the fonts it offers. The __source registry__ is the durable,
//! ordered list of sources the user has added. Insertion order matters: the
//! catalog merger walks sources in registry order, so the first source to
//! declare a font decides that font's displayed metadata.
//!
//! # Registry Document Layout
//!
//! The registry is persisted as a JSON array of objects with the fields
//! `key`, `owner`, `repo`, `descriptor`, and `enabled`. Entries missing a
//! descriptor path fall back to `fonts.json`, and entries missing the enabled
//! flag are considered enabled.

use crate::document::{self, DocumentError};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Descriptor path used when none is given.
pub const DEFAULT_DESCRIPTOR: &str = "fonts.json";

/// Remote catalog provider.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Source {
    /// Unique `owner/repo` key.
    pub key: String,

    /// Owner of remote repository.
    pub owner: String,

    /// Name of remote repository.
    pub repo: String,

    /// Path of descriptor document inside remote repository.
    #[serde(default = "default_descriptor")]
    pub descriptor: String,

    /// Whether refresh should consult this source.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

impl Source {
    /// Construct new enabled source.
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        let owner = owner.into();
        let repo = repo.into();
        Self {
            key: source_key(&owner, &repo),
            owner,
            repo,
            descriptor: descriptor.into(),
            enabled: true,
        }
    }
}

/// Compose the registry key of a source.
pub fn source_key(owner: &str, repo: &str) -> String {
    format!("{owner}/{repo}")
}

fn default_descriptor() -> String {
    DEFAULT_DESCRIPTOR.into()
}

fn enabled_by_default() -> bool {
    true
}

/// Durable ordered list of sources.
///
/// Every mutating call locks the registry document, applies its change on
/// top of the latest persisted state, and persists the full registry before
/// returning. If persisting fails, the in-memory registry is left untouched,
/// so callers never observe a change that did not make it to disk.
#[derive(Debug)]
pub struct SourceRegistry {
    path: PathBuf,
    sources: Vec<Source>,
}

impl SourceRegistry {
    /// Open registry document at target path.
    ///
    /// Missing or corrupt documents yield an empty registry.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let sources = document::load_or_default(&path);
        Self { path, sources }
    }

    /// Path of backing registry document.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Add new source to the end of the registry.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::InvalidName`] if owner or repo are empty or
    ///   contain a slash.
    /// - Return [`RegistryError::DuplicateSource`] if `owner/repo` is already
    ///   registered.
    /// - Return [`RegistryError::Document`] if registry cannot be persisted.
    #[instrument(skip(self, owner, repo, descriptor), level = "debug")]
    pub fn add(
        &mut self,
        owner: impl AsRef<str>,
        repo: impl AsRef<str>,
        descriptor: impl AsRef<str>,
    ) -> Result<Source> {
        let owner = owner.as_ref().trim();
        let repo = repo.as_ref().trim();
        for name in [owner, repo] {
            if name.is_empty() || name.contains('/') {
                return Err(RegistryError::InvalidName { name: name.into() });
            }
        }

        let descriptor = match descriptor.as_ref().trim() {
            "" => DEFAULT_DESCRIPTOR,
            path => path,
        };
        let source = Source::new(owner, repo, descriptor);
        self.update(|sources| {
            if sources.iter().any(|known| known.key == source.key) {
                return Err(RegistryError::DuplicateSource {
                    key: source.key.clone(),
                });
            }
            sources.push(source.clone());

            Ok(())
        })?;
        info!("added source {}", source.key);

        Ok(source)
    }

    /// Remove source by key.
    ///
    /// Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::Document`] if registry cannot be persisted.
    #[instrument(skip(self, key), level = "debug")]
    pub fn remove(&mut self, key: impl AsRef<str>) -> Result<()> {
        let key = key.as_ref();
        let removed = self.update(|sources| {
            let before = sources.len();
            sources.retain(|source| source.key != key);

            Ok(sources.len() != before)
        })?;
        if removed {
            info!("removed source {key}");
        } else {
            debug!("source {key} not registered, nothing to remove");
        }

        Ok(())
    }

    /// Enable or disable source by key.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::UnknownSource`] if key is not registered.
    /// - Return [`RegistryError::Document`] if registry cannot be persisted.
    pub fn set_enabled(&mut self, key: impl AsRef<str>, enabled: bool) -> Result<()> {
        let key = key.as_ref();
        self.update(|sources| {
            let source = sources
                .iter_mut()
                .find(|source| source.key == key)
                .ok_or_else(|| RegistryError::UnknownSource { key: key.into() })?;
            source.enabled = enabled;

            Ok(())
        })?;
        info!("source {key} enabled: {enabled}");

        Ok(())
    }

    /// Lookup source by key.
    pub fn get(&self, key: impl AsRef<str>) -> Option<&Source> {
        self.sources.iter().find(|source| source.key == key.as_ref())
    }

    /// List all sources in insertion order.
    pub fn list(&self) -> &[Source] {
        self.sources.as_slice()
    }

    /// Iterate enabled sources in insertion order.
    pub fn enabled(&self) -> impl Iterator<Item = &Source> + '_ {
        self.sources.iter().filter(|source| source.enabled)
    }

    fn update<T>(&mut self, change: impl FnOnce(&mut Vec<Source>) -> Result<T>) -> Result<T> {
        let _lock = document::lock(&self.path)?;
        let mut next: Vec<Source> = document::load_or_default(&self.path);
        let outcome = change(&mut next)?;
        document::save(&self.path, &next)?;
        self.sources = next;

        Ok(outcome)
    }
}

/// All possible error types for source registry interaction.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Source with same key already registered.
    #[error("source {key} already registered")]
    DuplicateSource { key: String },

    /// No source registered under key.
    #[error("source {key} is not registered")]
    UnknownSource { key: String },

    /// Owner or repository name is unusable.
    #[error("invalid owner or repository name {name:?}")]
    InvalidName { name: String },

    /// Registry document cannot be persisted.
    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Friendly result alias :3
type Result<T, E = RegistryError> = std::result::Result<T, E>;
