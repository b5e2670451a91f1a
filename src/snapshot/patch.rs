//! Defines the data structures used for describing replica patches.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::NodeId;

/// The changes needed to bring a replica in line with an upstream change.
/// Nodes are referred to by name; the root is the empty name.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PatchSet {
    /// Nodes that appeared upstream and are missing from the replica.
    pub created_nodes: BTreeSet<String>,

    /// Nodes that disappeared upstream and are still in the replica.
    pub destroyed_nodes: BTreeSet<String>,

    /// Replica nodes to rename before anything else refers to them, keyed by
    /// their current (local) name.
    pub renamed_nodes: BTreeMap<String, String>,

    /// Node name to the name of its new parent.
    pub reparented_nodes: BTreeMap<String, String>,

    pub removed_facets: Vec<PatchRemoveFacet>,
    pub updated_facets: Vec<PatchUpdateFacet>,
}

impl PatchSet {
    pub fn new() -> PatchSet {
        PatchSet::default()
    }

    pub fn needs_update(&self) -> bool {
        !self.created_nodes.is_empty()
            || !self.destroyed_nodes.is_empty()
            || !self.renamed_nodes.is_empty()
            || !self.reparented_nodes.is_empty()
            || !self.removed_facets.is_empty()
            || !self.updated_facets.is_empty()
    }
}

/// Remove the facet at position `index` among the node's facets of
/// `facet_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchRemoveFacet {
    pub node: String,
    pub facet_type: String,
    pub index: usize,
}

/// Set the facet at position `index` among the node's facets of `facet_type`
/// to `value`, creating it if needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchUpdateFacet {
    pub node: String,
    pub facet_type: String,
    pub index: usize,
    pub value: String,
}

/// What applying a `PatchSet` actually did to a live tree.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedPatchSet {
    pub created: Vec<NodeId>,
    pub renamed: Vec<NodeId>,
    pub reparented: Vec<NodeId>,
    pub facets_changed: Vec<NodeId>,

    /// Names of destroyed nodes. Their IDs are gone from the tree.
    pub destroyed: Vec<String>,
}

impl AppliedPatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every surviving node the patch created, renamed, moved, or whose
    /// facets it changed.
    pub fn touched_nodes(&self) -> BTreeSet<NodeId> {
        self.created
            .iter()
            .chain(&self.renamed)
            .chain(&self.reparented)
            .chain(&self.facets_changed)
            .copied()
            .collect()
    }
}
