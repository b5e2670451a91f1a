//! relink keeps replicas of a node tree in step with the external asset they
//! were made from, carrying upstream changes over without discarding what was
//! edited locally.

pub mod cli;
pub mod error;
pub mod facet;
pub mod link;
pub mod model;
pub mod settings;
pub mod snapshot;
pub mod store;
pub mod sync_controller;

mod multimap;

pub use crate::error::{LinkStateError, SyncError};
pub use crate::facet::{Facet, FacetRegistry};
pub use crate::link::{NameOverride, PersistentLink};
pub use crate::settings::SyncSettings;
pub use crate::store::{AssetHandle, AssetProvider, AssetStore, FsAssets, MemoryAssets};
pub use crate::sync_controller::{SyncApplied, SyncController, SyncOutcome, SyncReport};
