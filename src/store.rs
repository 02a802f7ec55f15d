// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Catalog store management.
//!
//! The __catalog store__ owns the current catalog snapshot and its persisted
//! document. Readers grab the snapshot through [`CatalogStore::get`], which
//! hands out a shared pointer to an immutable catalog. A refresh builds the
//! next catalog off to the side, persists it, and only then swaps the shared
//! pointer. Thus readers observe either the old catalog or the new one, never
//! a catalog that is still being built.
//!
//! Only one refresh may run at a time, whether it was triggered by this
//! process or by another one sharing the data directory. Triggering a refresh
//! while another is in flight is rejected rather than queued, so the
//! persisted document never has two writers.

use crate::{
    catalog::{self, Catalog, SourceFailure},
    document::{self, DocumentError},
    fetch::DescriptorFetcher,
    registry::SourceRegistry,
};

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError, RwLock, TryLockError},
};
use tracing::{debug, info, instrument};

/// Persisted catalog with guarded snapshot access.
#[derive(Debug)]
pub struct CatalogStore {
    path: PathBuf,
    current: RwLock<Arc<Catalog>>,
    refreshing: Mutex<()>,
}

impl CatalogStore {
    /// Open catalog store backed by document at target path.
    ///
    /// Missing or corrupt catalog documents yield an empty catalog.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let catalog = Self::load(&path);
        debug!(
            "loaded catalog of {} fonts from {:?}",
            catalog.len(),
            path.display()
        );

        Self {
            path,
            current: RwLock::new(Arc::new(catalog)),
            refreshing: Mutex::new(()),
        }
    }

    /// Load catalog document at target path.
    ///
    /// Never fails, corruption counts as no prior state.
    pub fn load(path: impl AsRef<Path>) -> Catalog {
        document::load_or_default(path)
    }

    /// Path of backing catalog document.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Current catalog snapshot.
    pub fn get(&self) -> Arc<Catalog> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Persist catalog and publish it as the current snapshot.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Document`] if catalog cannot be persisted. The
    ///   previous snapshot stays current.
    pub fn save(&self, catalog: Catalog) -> Result<Arc<Catalog>> {
        document::save(&self.path, &catalog)?;
        let catalog = Arc::new(catalog);
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::clone(&catalog);

        Ok(catalog)
    }

    /// Rebuild catalog from every enabled source in the registry.
    ///
    /// Per-source fetch failures never fail the refresh, they are reported in
    /// the returned [`Refreshed`] instead.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::RefreshInProgress`] if another refresh is
    ///   running in this or any other process.
    /// - Return [`StoreError::Document`] if the catalog lock cannot be taken.
    /// - Return [`StoreError::Document`] if new catalog cannot be persisted.
    ///   The previous snapshot stays current.
    #[instrument(skip(self, registry, fetcher), level = "debug")]
    pub fn refresh<F>(&self, registry: &SourceRegistry, fetcher: &F) -> Result<Refreshed>
    where
        F: DescriptorFetcher + ?Sized,
    {
        let _guard = match self.refreshing.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return Err(StoreError::RefreshInProgress),
        };
        let Some(_lock) = document::try_lock(&self.path)? else {
            return Err(StoreError::RefreshInProgress);
        };

        info!("refresh catalog from {} sources", registry.list().len());
        let rebuild = catalog::rebuild(registry.list(), fetcher);
        let catalog = self.save(rebuild.catalog)?;

        Ok(Refreshed {
            catalog,
            merged: rebuild.merged,
            failures: rebuild.failures,
        })
    }
}

/// Outcome of a completed refresh.
#[derive(Debug)]
pub struct Refreshed {
    /// Newly published catalog snapshot.
    pub catalog: Arc<Catalog>,

    /// Number of sources whose descriptor was folded in.
    pub merged: usize,

    /// Sources skipped this cycle because fetching failed.
    pub failures: Vec<SourceFailure>,
}

/// All possible error types for catalog store interaction.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Another refresh holds the refresh guard.
    #[error("a catalog refresh is already in progress")]
    RefreshInProgress,

    /// Catalog document cannot be persisted.
    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Friendly result alias :3
type Result<T, E = StoreError> = std::result::Result<T, E>;
