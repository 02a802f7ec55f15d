// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine default locations for the settings file, the data directory that
//! holds every persisted document, and the directory fonts get copied into.
//! None of these functions check whether the returned path actually exists.

use std::path::PathBuf;

/// Determine default absolute path to the data directory.
///
/// Uses XDG Base Directory path `$XDG_DATA_HOME/fontsync`. The source
/// registry, merged catalog, and installed-set ledger all live here.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|path| path.join("fontsync"))
        .ok_or(NoWayHome)
}

/// Determine default absolute path to the settings file.
///
/// Uses `$XDG_CONFIG_HOME/fontsync/config.toml`.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_config_file() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("fontsync").join("config.toml"))
        .ok_or(NoWayHome)
}

/// Determine default absolute path to the per-user font directory.
///
/// Uses `$XDG_DATA_HOME/fonts`, which fontconfig scans by default.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_fonts_dir() -> Result<PathBuf> {
    dirs::font_dir()
        .or_else(|| dirs::data_dir().map(|path| path.join("fonts")))
        .ok_or(NoWayHome)
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
