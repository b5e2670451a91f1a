//! Defines the structure of a node snapshot.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::{facet::FacetRegistry, multimap::MultiMap};

use super::{error::SnapshotError, text::CHILD_SIGIL, NodeId, NodeTree};

/// A canonical capture of a named tree at one point in time.
///
/// The snapshot itself is nameless: names live in the parent's `children`
/// map, and the root's name is never recorded. Facet values are the opaque
/// strings produced by each facet type's codec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSnapshot {
    children: BTreeMap<String, NodeSnapshot>,
    facets: MultiMap<String, String>,
}

impl NodeSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_child(mut self, name: impl Into<String>, child: NodeSnapshot) -> Self {
        self.children.insert(name.into(), child);
        self
    }

    pub fn with_facet(mut self, type_name: impl Into<String>, value: impl Into<String>) -> Self {
        self.facets.push(type_name.into(), value.into());
        self
    }

    /// Adds a child, handing back any child previously stored under the same
    /// name.
    pub fn insert_child(&mut self, name: String, child: NodeSnapshot) -> Option<NodeSnapshot> {
        self.children.insert(name, child)
    }

    pub fn push_facet(&mut self, type_name: String, value: String) {
        self.facets.push(type_name, value);
    }

    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    pub fn child(&self, name: &str) -> Option<&NodeSnapshot> {
        self.children.get(name)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &NodeSnapshot)> {
        self.children
            .iter()
            .map(|(name, child)| (name.as_str(), child))
    }

    pub fn facet_types(&self) -> impl Iterator<Item = &str> {
        self.facets.keys().map(String::as_str)
    }

    /// Values of one facet type in attachment order, or an empty slice.
    pub fn facet_values(&self, type_name: &str) -> &[String] {
        self.facets.get(type_name)
    }

    pub fn facets(&self) -> &MultiMap<String, String> {
        &self.facets
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty() && self.facets.is_empty()
    }

    /// Number of nodes in this snapshot, including itself.
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .values()
            .map(NodeSnapshot::node_count)
            .sum::<usize>()
    }

    pub(crate) fn collect_facet_types(&self, type_names: &mut BTreeSet<String>) {
        type_names.extend(self.facets.keys().cloned());

        for child in self.children.values() {
            child.collect_facet_types(type_names);
        }
    }

    /// Captures the subtree of `tree` rooted at `id`.
    ///
    /// The link facet is never recorded, and the placement facet is skipped on
    /// the root so a replica can be placed independently of its source. Node
    /// names must be unique across the whole captured tree; a duplicate fails
    /// the capture, as does a facet type that would read back as a child.
    pub fn capture(
        tree: &NodeTree,
        id: NodeId,
        registry: &FacetRegistry,
    ) -> Result<NodeSnapshot, SnapshotError> {
        let mut seen_names = HashSet::new();
        capture_internal(tree, id, true, registry, &mut seen_names)
    }

    /// Returns a copy with children renamed through `renames` (old name to new
    /// name). Names without an entry are kept.
    pub fn relabel(&self, renames: &HashMap<String, String>) -> NodeSnapshot {
        if renames.is_empty() {
            return self.clone();
        }

        let children = self
            .children
            .iter()
            .map(|(name, child)| {
                let name = renames.get(name).unwrap_or(name).clone();
                (name, child.relabel(renames))
            })
            .collect();

        NodeSnapshot {
            children,
            facets: self.facets.clone(),
        }
    }
}

fn capture_internal(
    tree: &NodeTree,
    id: NodeId,
    is_root: bool,
    registry: &FacetRegistry,
    seen_names: &mut HashSet<String>,
) -> Result<NodeSnapshot, SnapshotError> {
    let node = tree
        .get_node(id)
        .ok_or_else(|| SnapshotError::MissingNode { id })?;

    let mut snapshot = NodeSnapshot::new();

    for facet in &node.facets {
        if facet.type_name == registry.link_type() {
            continue;
        }

        if is_root && facet.type_name == registry.placement_type() {
            continue;
        }

        if facet.type_name.starts_with(CHILD_SIGIL) {
            return Err(SnapshotError::ReservedFacetType {
                id,
                facet_type: facet.type_name.clone(),
            });
        }

        snapshot.push_facet(facet.type_name.clone(), registry.encode(facet));
    }

    for &child_id in node.children() {
        let child_name = match tree.get_node(child_id) {
            Some(child) => child.name.clone(),
            None => return Err(SnapshotError::MissingNode { id: child_id }),
        };

        if child_name.is_empty() {
            return Err(SnapshotError::EmptyName { id: child_id });
        }

        if !seen_names.insert(child_name.clone()) {
            return Err(SnapshotError::DuplicateName { name: child_name });
        }

        let child = capture_internal(tree, child_id, false, registry, seen_names)?;
        snapshot.insert_child(child_name, child);
    }

    Ok(snapshot)
}
