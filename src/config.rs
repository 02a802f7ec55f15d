// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the settings file that fontsync reads at startup.
//! Every key is optional, so an empty or missing settings file simply yields
//! the defaults.

use crate::path::{default_data_dir, default_fonts_dir};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Settings layout.
///
/// # General Layout
///
/// Settings are a flat TOML table. The data directory houses the source
/// registry, merged catalog, and installed-set ledger documents, plus a
/// staging area for downloads. The fonts directory is where installed font
/// files end up. Both paths go through shell expansion at parse time, so
/// values like `$HOME/fonts` or `~/fonts` work as expected.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Directory containing every persisted document.
    pub data_dir: PathBuf,

    /// Directory installed font files get copied into.
    pub fonts_dir: PathBuf,

    /// Branch to read descriptors and font files from.
    pub branch: String,

    /// Base URL of the raw file host.
    pub raw_base_url: String,

    /// Request timeout in seconds for every download.
    pub timeout_secs: u64,

    /// Environment variable to read the access token from.
    pub token_var: String,
}

impl Settings {
    /// Load settings from target path.
    ///
    /// A missing settings file is not an error, defaults are used instead.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if settings file exists but cannot be
    ///   read.
    /// - Return [`ConfigError::Deserialize`] if settings file is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match read_to_string(path) {
            Ok(data) => data.parse(),
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!("no settings at {:?}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                source,
                path: path.into(),
            }),
        }
    }

    /// Path to the source registry document.
    pub fn sources_file(&self) -> PathBuf {
        self.data_dir.join("sources.json")
    }

    /// Path to the merged catalog document.
    pub fn catalog_file(&self) -> PathBuf {
        self.data_dir.join("catalog.json")
    }

    /// Path to the installed-set ledger document.
    pub fn installed_file(&self) -> PathBuf {
        self.data_dir.join("installed.json")
    }

    /// Path to the download staging area.
    pub fn staging_dir(&self) -> PathBuf {
        self.data_dir.join("staging")
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().unwrap_or_else(|_| PathBuf::from("fontsync")),
            fonts_dir: default_fonts_dir().unwrap_or_else(|_| PathBuf::from("fonts")),
            branch: "main".into(),
            raw_base_url: "https://raw.githubusercontent.com".into(),
            timeout_secs: 30,
            token_var: "GITHUB_TOKEN".into(),
        }
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        settings.data_dir = expand_path(&settings.data_dir)?;
        settings.fonts_dir = expand_path(&settings.fonts_dir)?;

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read settings file.
    #[error("failed to read settings at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
