use std::{
    io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SETTINGS_FILE_NAME: &str = "relink.json";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("error parsing settings file {path}")]
    Json {
        source: serde_json::Error,
        path: PathBuf,
    },
}

/// Engine-wide settings, read from `relink.json` when one is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct SyncSettings {
    /// Facet type describing a node's placement relative to its parent. It
    /// is never recorded for a replica's root and is always rewritten when a
    /// sync moves a node.
    pub placement_facet: String,

    /// Facet type that stores a replica's persistent link.
    pub link_facet: String,

    /// Global switch for syncing in response to upstream changes. Each link
    /// can still opt out on its own.
    pub auto_sync_enabled: bool,

    /// Facet types whose state is a JSON document.
    pub json_facets: Vec<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            placement_facet: "Placement".to_owned(),
            link_facet: "SyncLink".to_owned(),
            auto_sync_enabled: true,
            json_facets: Vec::new(),
        }
    }
}

impl SyncSettings {
    pub fn load_from_slice(contents: &[u8], path: &Path) -> Result<Self, SettingsError> {
        serde_json::from_slice(contents).map_err(|source| SettingsError::Json {
            source,
            path: path.to_owned(),
        })
    }

    /// Loads settings from `path`, which may name the settings file itself or
    /// a directory containing one. A missing file yields the defaults.
    pub fn load_fuzzy(path: &Path) -> Result<Self, SettingsError> {
        let file_path = if path.is_dir() {
            path.join(SETTINGS_FILE_NAME)
        } else {
            path.to_owned()
        };

        match fs_err::read(&file_path) {
            Ok(contents) => {
                log::debug!("Loading settings from {}", file_path.display());
                Self::load_from_slice(&contents, &file_path)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::debug!("No settings file at {}, using defaults", file_path.display());
                Ok(Self::default())
            }
            Err(err) => Err(err.into()),
        }
    }
}
