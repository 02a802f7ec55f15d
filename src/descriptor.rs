// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Descriptor document layout.
//!
//! Every source publishes a __descriptor__: a JSON document listing the fonts
//! that source offers. Descriptors are written by hand by whoever maintains
//! the remote repository, so parsing is deliberately lenient. Every field of
//! a font entry is optional, `null` counts as absent, and scalar values like
//! `"version": 2.1` are accepted as text. A single file may be given as a
//! plain string instead of a list. Entries of the font list that are not
//! objects are skipped with a warning. Only a document that is not a JSON
//! object at all is rejected.
//!
//! ```json
//! {
//!   "fonts": [
//!     { "family": "Inter", "name": "Regular", "files": ["Inter-Regular.ttf"] }
//!   ]
//! }
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::str::FromStr;
use tracing::warn;

/// Parsed descriptor document.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Descriptor {
    /// Font entries in document order.
    #[serde(default, deserialize_with = "lenient_fonts")]
    pub fonts: Vec<RawFontEntry>,
}

impl FromStr for Descriptor {
    type Err = serde_json::Error;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        // INVARIANT: Top-level must be an object, arrays and scalars are malformed.
        let value: Value = serde_json::from_str(data)?;
        if !value.is_object() {
            return Err(serde::de::Error::custom("descriptor must be a JSON object"));
        }

        serde_json::from_value(value)
    }
}

/// Single font entry as declared by a descriptor.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct RawFontEntry {
    /// Explicit identity, derived from family and name when absent.
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: Option<String>,

    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "lenient_text")]
    pub family: Option<String>,

    #[serde(default, deserialize_with = "lenient_text")]
    pub style: Option<String>,

    #[serde(default, deserialize_with = "lenient_text")]
    pub version: Option<String>,

    #[serde(default, deserialize_with = "lenient_text")]
    pub license: Option<String>,

    /// File paths relative to the root of the source repository.
    #[serde(default, deserialize_with = "lenient_files")]
    pub files: Vec<String>,
}

impl RawFontEntry {
    /// Canonical identity of this font.
    ///
    /// An explicit non-empty `id` is used verbatim. Otherwise the identity is
    /// `family + "_" + name` with every space replaced by an underscore, where
    /// a missing family or name counts as empty text.
    pub fn identity(&self) -> String {
        match self.id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => derive_identity(
                self.family.as_deref().unwrap_or_default(),
                self.name.as_deref().unwrap_or_default(),
            ),
        }
    }
}

/// Derive identity from family and name.
pub fn derive_identity(family: &str, name: &str) -> String {
    format!("{family}_{name}").replace(' ', "_")
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    })
}

fn lenient_files<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(file) => vec![file],
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(file) => Some(file),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

fn lenient_fonts<'de, D>(deserializer: D) -> Result<Vec<RawFontEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        Value::Null => return Ok(Vec::new()),
        other => {
            warn!("ignoring font list that is not an array: {other}");
            return Ok(Vec::new());
        }
    };

    // INVARIANT: One odd entry never costs the rest of the descriptor.
    let mut fonts = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        if !item.is_object() {
            warn!("skipping font entry {index}, not an object: {item}");
            continue;
        }

        match serde_json::from_value(item) {
            Ok(entry) => fonts.push(entry),
            Err(error) => warn!("skipping font entry {index}: {error}"),
        }
    }

    Ok(fonts)
}
