// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Font catalog synchronization.
//!
//! Fontsync aggregates font metadata published by any number of remote
//! repositories into one searchable catalog, and installs catalog fonts onto
//! the local machine.
//!
//! # Moving Parts
//!
//! - The [`SourceRegistry`] is the durable list of repositories to read from.
//! - Each repository publishes a [`Descriptor`] listing its fonts, obtained
//!   through a [`DescriptorFetcher`].
//! - The [`CatalogStore`] rebuilds the merged [`Catalog`] from all enabled
//!   sources on refresh, tolerating any subset of them being unreachable.
//! - The [`Installer`] downloads the files of a chosen font and records them
//!   in the [`InstalledSet`] ledger.

pub mod catalog;
pub mod config;
pub mod descriptor;
pub mod document;
pub mod fetch;
pub mod install;
pub mod installed;
pub mod path;
pub mod registry;
pub mod store;

pub use catalog::{Catalog, CatalogEntry, FontMeta, SourceRecord};
pub use config::Settings;
pub use descriptor::{Descriptor, RawFontEntry};
pub use fetch::{DescriptorFetcher, EnvCredentials, FetchError, GithubRaw, Retrieve, StagedFetcher};
pub use install::{DirectoryInstaller, FontInstaller, Installer};
pub use installed::{InstalledRecord, InstalledSet};
pub use registry::{Source, SourceRegistry};
pub use store::CatalogStore;
