//! Where external assets are read from and where replicas are kept.

use std::{
    collections::BTreeMap,
    fmt,
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    model::JsonModel,
    snapshot::{NodeTree, TreeError},
};

const MODEL_EXTENSION: &str = ".model.json";

/// Names an asset in a provider or store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetHandle(String);

impl AssetHandle {
    pub fn new(name: impl Into<String>) -> Self {
        AssetHandle(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetHandle {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for AssetHandle {
    fn from(name: &str) -> Self {
        AssetHandle::new(name)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no asset named {handle}")]
    NotFound { handle: AssetHandle },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("{} is not a valid model file", .path.display())]
    MalformedModel {
        source: serde_json::Error,
        path: PathBuf,
    },

    #[error("could not replace {}", .path.display())]
    Persist { source: io::Error, path: PathBuf },

    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Read access to external assets.
pub trait AssetProvider {
    fn load(&self, handle: &AssetHandle) -> Result<NodeTree, StoreError>;
}

/// Persistent storage for replicas. Replicas are never edited in place: a
/// sync works on a copy from `instantiate` and hands it back through
/// `commit`, which must replace the stored replica all at once.
pub trait AssetStore {
    fn instantiate(&self, handle: &AssetHandle) -> Result<NodeTree, StoreError>;

    fn commit(&mut self, handle: &AssetHandle, working_copy: NodeTree) -> Result<(), StoreError>;

    fn handles(&self) -> Result<Vec<AssetHandle>, StoreError>;
}

/// Keeps assets in memory. Useful both as a provider and as a store.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    assets: BTreeMap<AssetHandle, NodeTree>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: impl Into<AssetHandle>, tree: NodeTree) -> Option<NodeTree> {
        self.assets.insert(handle.into(), tree)
    }

    pub fn get(&self, handle: &AssetHandle) -> Option<&NodeTree> {
        self.assets.get(handle)
    }

    pub fn get_mut(&mut self, handle: &AssetHandle) -> Option<&mut NodeTree> {
        self.assets.get_mut(handle)
    }

    pub fn remove(&mut self, handle: &AssetHandle) -> Option<NodeTree> {
        self.assets.remove(handle)
    }
}

impl AssetProvider for MemoryAssets {
    fn load(&self, handle: &AssetHandle) -> Result<NodeTree, StoreError> {
        self.instantiate(handle)
    }
}

impl AssetStore for MemoryAssets {
    fn instantiate(&self, handle: &AssetHandle) -> Result<NodeTree, StoreError> {
        self.assets
            .get(handle)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                handle: handle.clone(),
            })
    }

    fn commit(&mut self, handle: &AssetHandle, working_copy: NodeTree) -> Result<(), StoreError> {
        self.assets.insert(handle.clone(), working_copy);
        Ok(())
    }

    fn handles(&self) -> Result<Vec<AssetHandle>, StoreError> {
        Ok(self.assets.keys().cloned().collect())
    }
}

/// A directory of `<handle>.model.json` files.
#[derive(Debug, Clone)]
pub struct FsAssets {
    root: PathBuf,
}

impl FsAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsAssets { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, handle: &AssetHandle) -> PathBuf {
        self.root.join(format!("{}{}", handle, MODEL_EXTENSION))
    }

    fn read(&self, handle: &AssetHandle) -> Result<NodeTree, StoreError> {
        let path = self.path_for(handle);

        let contents = match fs_err::read(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    handle: handle.clone(),
                })
            }
            Err(err) => return Err(err.into()),
        };

        let model: JsonModel = serde_json::from_slice(&contents)
            .map_err(|source| StoreError::MalformedModel { source, path })?;

        Ok(model.into_tree()?)
    }
}

impl AssetProvider for FsAssets {
    fn load(&self, handle: &AssetHandle) -> Result<NodeTree, StoreError> {
        self.read(handle)
    }
}

impl AssetStore for FsAssets {
    fn instantiate(&self, handle: &AssetHandle) -> Result<NodeTree, StoreError> {
        self.read(handle)
    }

    /// Writes the model next to its destination and renames it into place, so
    /// a reader sees either the old replica or the new one.
    fn commit(&mut self, handle: &AssetHandle, working_copy: NodeTree) -> Result<(), StoreError> {
        let path = self.path_for(handle);

        let model = working_copy
            .to_model()
            .ok_or_else(|| TreeError::NodeNotFound(working_copy.root_id()))?;

        let contents = serde_json::to_vec_pretty(&model).map_err(|source| {
            StoreError::MalformedModel {
                source,
                path: path.clone(),
            }
        })?;

        fs_err::create_dir_all(&self.root)?;

        let mut temp_file = tempfile::NamedTempFile::new_in(&self.root)?;
        temp_file.write_all(&contents)?;
        temp_file.flush()?;

        temp_file
            .persist(&path)
            .map_err(|err| StoreError::Persist {
                source: err.error,
                path: path.clone(),
            })?;

        log::debug!("Committed {} to {}", handle, path.display());
        Ok(())
    }

    fn handles(&self) -> Result<Vec<AssetHandle>, StoreError> {
        let entries = match fs_err::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut handles = Vec::new();
        for entry in entries {
            let file_name = entry?.file_name();

            if let Some(stem) = file_name
                .to_str()
                .and_then(|name| name.strip_suffix(MODEL_EXTENSION))
            {
                handles.push(AssetHandle::new(stem));
            }
        }

        handles.sort();
        Ok(handles)
    }
}
