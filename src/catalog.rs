// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Merged font catalog.
//!
//! The __catalog__ is the union of every font declared by every enabled
//! source, keyed by canonical font identity (see
//! [`RawFontEntry::identity`]). When several sources declare the same
//! identity, they share one catalog entry that carries one source record per
//! source. File lists are never merged across sources: each source record
//! keeps the exact files its own descriptor listed, since the same font name
//! can map to different concrete files in different repositories.
//!
//! # Merge Policy
//!
//! A catalog is always rebuilt from scratch. Sources are visited in registry
//! order, and the first source to declare an identity provides the entry's
//! displayed metadata. Later sources only append their source records. A
//! source whose descriptor cannot be fetched contributes nothing to the new
//! catalog, exactly as if it had been disabled, and never aborts the rebuild.
//!
//! # Catalog Document Layout
//!
//! The catalog serializes as a JSON object mapping identity to
//! `{ "meta": {...}, "sources": [...] }`. Identities are kept sorted, so two
//! rebuilds over the same inputs produce byte-identical documents.

use crate::{
    descriptor::{Descriptor, RawFontEntry},
    fetch::{DescriptorFetcher, FetchError},
    registry::Source,
};

use serde::{Deserialize, Serialize};
use std::collections::{btree_map::Entry, BTreeMap};
use tracing::{debug, info, instrument, warn};

/// Identity-keyed union of fonts offered by all sources.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Catalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl Catalog {
    /// Construct new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold every font entry of a source's descriptor into the catalog.
    ///
    /// New identities take their metadata from this source. Existing
    /// identities gain a source record. An identity declared twice by the
    /// same descriptor keeps only its first declaration.
    pub fn absorb(&mut self, source: &Source, descriptor: Descriptor) {
        for raw in descriptor.fonts {
            let identity = raw.identity();
            let entry = match self.entries.entry(identity) {
                Entry::Vacant(vacant) => {
                    let meta = FontMeta::from_raw(vacant.key().clone(), &raw);
                    vacant.insert(CatalogEntry::new(meta))
                }
                Entry::Occupied(occupied) => occupied.into_mut(),
            };

            if entry.source(&source.key).is_some() {
                warn!(
                    "{} declares {} more than once, keeping first declaration",
                    source.key, entry.meta.id
                );
                continue;
            }

            entry.sources.push(SourceRecord::new(source, raw.files));
        }
    }

    /// Lookup entry by identity.
    pub fn get(&self, identity: impl AsRef<str>) -> Option<&CatalogEntry> {
        self.entries.get(identity.as_ref())
    }

    /// Iterate entries in identity order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CatalogEntry)> + '_ {
        self.entries
            .iter()
            .map(|(identity, entry)| (identity.as_str(), entry))
    }

    /// Number of distinct identities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if catalog holds no fonts.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Search entries by display name or family.
    ///
    /// Matching is a case-insensitive substring test. A blank query matches
    /// every entry.
    pub fn search(&self, query: impl AsRef<str>) -> Vec<(&str, &CatalogEntry)> {
        let query = query.as_ref().trim().to_lowercase();
        self.iter()
            .filter(|(_, entry)| {
                query.is_empty()
                    || entry.display_name().to_lowercase().contains(&query)
                    || entry
                        .meta
                        .family
                        .as_deref()
                        .is_some_and(|family| family.to_lowercase().contains(&query))
            })
            .collect()
    }
}

/// Single merged font.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct CatalogEntry {
    /// Metadata of the first declaration seen.
    pub meta: FontMeta,

    /// One record per source offering this font, in registry order.
    pub sources: Vec<SourceRecord>,
}

impl CatalogEntry {
    fn new(meta: FontMeta) -> Self {
        Self {
            meta,
            sources: Vec::new(),
        }
    }

    /// Name to show users, falls back to identity.
    pub fn display_name(&self) -> &str {
        self.meta.name.as_deref().unwrap_or(self.meta.id.as_str())
    }

    /// Lookup source record by source key.
    pub fn source(&self, key: impl AsRef<str>) -> Option<&SourceRecord> {
        self.sources
            .iter()
            .find(|record| record.repo_key == key.as_ref())
    }

    /// Pick source record to install from.
    ///
    /// With a requested key, only that source qualifies. Without one, the
    /// choice is only made when a single source offers the font.
    pub fn choose_source(&self, key: Option<&str>) -> Option<&SourceRecord> {
        match key {
            Some(key) => self.source(key),
            None if self.sources.len() == 1 => self.sources.first(),
            None => None,
        }
    }
}

/// Displayed metadata of a merged font.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct FontMeta {
    /// Canonical identity.
    pub id: String,
    pub name: Option<String>,
    pub family: Option<String>,
    pub style: Option<String>,
    pub version: Option<String>,
    pub license: Option<String>,

    /// Files listed by the declaration the metadata was taken from.
    #[serde(default)]
    pub files: Vec<String>,
}

impl FontMeta {
    fn from_raw(id: String, raw: &RawFontEntry) -> Self {
        Self {
            id,
            name: raw.name.clone(),
            family: raw.family.clone(),
            style: raw.style.clone(),
            version: raw.version.clone(),
            license: raw.license.clone(),
            files: raw.files.clone(),
        }
    }
}

/// Offer of a font by one source.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct SourceRecord {
    /// Registry key of the offering source.
    pub repo_key: String,
    pub owner: String,
    pub repo: String,
    pub descriptor: String,

    /// Files this source lists for the font.
    #[serde(default)]
    pub files: Vec<String>,
}

impl SourceRecord {
    fn new(source: &Source, files: Vec<String>) -> Self {
        Self {
            repo_key: source.key.clone(),
            owner: source.owner.clone(),
            repo: source.repo.clone(),
            descriptor: source.descriptor.clone(),
            files,
        }
    }
}

/// Outcome of one catalog rebuild.
#[derive(Debug)]
pub struct Rebuild {
    /// Freshly built catalog.
    pub catalog: Catalog,

    /// Number of sources whose descriptor was folded in.
    pub merged: usize,

    /// Sources skipped this cycle because fetching failed.
    pub failures: Vec<SourceFailure>,
}

/// Source skipped during a rebuild.
#[derive(Debug)]
pub struct SourceFailure {
    /// Registry key of the failed source.
    pub key: String,

    /// Why fetching failed.
    pub error: FetchError,
}

/// Build a fresh catalog from every enabled source.
///
/// Sources are fetched one at a time in the given order. Disabled sources
/// are skipped. Fetch failures are logged, recorded in the returned
/// [`Rebuild`], and otherwise ignored. Zero enabled sources, or all of them
/// failing, yields an empty catalog.
#[instrument(skip(sources, fetcher), level = "debug")]
pub fn rebuild<'a, F>(sources: impl IntoIterator<Item = &'a Source>, fetcher: &F) -> Rebuild
where
    F: DescriptorFetcher + ?Sized,
{
    let mut catalog = Catalog::new();
    let mut merged = 0;
    let mut failures = Vec::new();

    for source in sources.into_iter().filter(|source| source.enabled) {
        match fetcher.fetch(source) {
            Ok(descriptor) => {
                debug!("{} declares {} fonts", source.key, descriptor.fonts.len());
                catalog.absorb(source, descriptor);
                merged += 1;
            }
            Err(error) => {
                warn!(
                    "skipping {} this cycle ({} failure): {error}",
                    source.key,
                    error.kind()
                );
                failures.push(SourceFailure {
                    key: source.key.clone(),
                    error,
                });
            }
        }
    }

    info!(
        "catalog rebuilt with {} fonts from {merged} sources, {} failed",
        catalog.len(),
        failures.len()
    );

    Rebuild {
        catalog,
        merged,
        failures,
    }
}
