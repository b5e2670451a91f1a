//! This module defines the snapshot subsystem of relink.
//!
//! A replica is kept in step with an external asset by comparing three
//! snapshots: the asset as it was when the replica was last synced, the asset
//! as it is now, and the replica itself. Snapshots are plain name-keyed trees
//! of opaque facet values, so they can be stored as text next to the replica
//! and compared without knowing anything about what the facets mean.
//!
//! The upstream change between the first two snapshots is turned into a
//! `PatchSet`, with every part the replica has already reached on its own
//! dropped. Applying that patch set to the live tree is a separate step, so
//! the same patch can be inspected, logged, or thrown away before anything is
//! mutated.
//!
//! Nodes are identified by name alone. Names must therefore be unique across
//! a whole snapshot, which capture enforces.

mod error;
mod flat_index;
mod node_snapshot;
mod patch;
mod patch_apply;
mod patch_compute;
mod text;
mod tree;

#[cfg(test)]
mod tests;

pub use error::{FormatError, SnapshotError};
pub use flat_index::{FlatIndex, ROOT_NAME};
pub use node_snapshot::NodeSnapshot;
pub use patch::*;
pub use patch_apply::{apply_patch_set, ApplyError};
pub use patch_compute::compute_patch_set;
pub use tree::*;
