//! Defines the algorithm for applying computed patches to a live replica.
//!
//! The order of operations matters. Nodes are created before anything refers
//! to them, moved before anything is destroyed, and moved in two passes so a
//! swap of parent and child never forms a cycle in between.

use std::collections::{BTreeMap, HashMap, HashSet};

use thiserror::Error;

use crate::{
    error::LinkStateError,
    facet::{CodecError, FacetKinds},
};

use super::{
    flat_index::ROOT_NAME,
    patch::{AppliedPatchSet, PatchRemoveFacet, PatchSet, PatchUpdateFacet},
    NodeId, NodeTree,
};

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error(transparent)]
    LinkState(#[from] LinkStateError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Applies `patch_set` to the subtree of `tree` rooted at `root_id`, which
/// plays the part of the unnamed root.
pub fn apply_patch_set(
    tree: &mut NodeTree,
    root_id: NodeId,
    patch_set: &PatchSet,
    kinds: &FacetKinds,
) -> Result<AppliedPatchSet, ApplyError> {
    let mut context = PatchApplyContext::new(tree, root_id);
    let mut applied = AppliedPatchSet::new();

    apply_created(&mut context, tree, patch_set, &mut applied)?;
    apply_renamed(&mut context, tree, patch_set, &mut applied)?;
    apply_reparented(&context, tree, patch_set, &mut applied)?;
    apply_destroyed(&mut context, tree, patch_set, &mut applied)?;
    apply_removed_facets(&context, tree, &patch_set.removed_facets, &mut applied)?;
    apply_updated_facets(&context, tree, &patch_set.updated_facets, kinds, &mut applied)?;

    Ok(applied)
}

struct PatchApplyContext {
    name_to_id: HashMap<String, NodeId>,

    /// Names of nodes that went away because an ancestor was destroyed.
    removed_names: HashSet<String>,
}

impl PatchApplyContext {
    fn new(tree: &NodeTree, root_id: NodeId) -> Self {
        let mut name_to_id = HashMap::new();

        for id in tree.descendants(root_id) {
            if id == root_id {
                name_to_id.insert(ROOT_NAME.to_owned(), id);
            } else if let Some(node) = tree.get_node(id) {
                name_to_id.insert(node.name.clone(), id);
            }
        }

        PatchApplyContext {
            name_to_id,
            removed_names: HashSet::new(),
        }
    }

    fn lookup(&self, name: &str) -> Result<NodeId, LinkStateError> {
        self.name_to_id
            .get(name)
            .copied()
            .ok_or_else(|| LinkStateError::MissingNode {
                name: name.to_owned(),
            })
    }

    /// Like `lookup`, but yields `None` for nodes that were removed along with
    /// a destroyed ancestor.
    fn lookup_surviving(&self, name: &str) -> Result<Option<NodeId>, LinkStateError> {
        if self.removed_names.contains(name) {
            return Ok(None);
        }

        self.lookup(name).map(Some)
    }

    fn forget(&mut self, removed: &[NodeId]) {
        let removed: HashSet<NodeId> = removed.iter().copied().collect();
        let removed_names = &mut self.removed_names;

        self.name_to_id.retain(|name, id| {
            if removed.contains(id) {
                removed_names.insert(name.clone());
                false
            } else {
                true
            }
        });
    }
}

fn apply_created(
    context: &mut PatchApplyContext,
    tree: &mut NodeTree,
    patch_set: &PatchSet,
    applied: &mut AppliedPatchSet,
) -> Result<(), ApplyError> {
    for name in &patch_set.created_nodes {
        let id = tree
            .insert_node(name.clone(), None)
            .map_err(LinkStateError::from)?;

        if context.name_to_id.insert(name.clone(), id).is_some() {
            log::warn!("Created node {} shadows an existing node of that name", name);
        }

        log::trace!("{}: created as {}", name, id);
        applied.created.push(id);
    }

    Ok(())
}

fn apply_renamed(
    context: &mut PatchApplyContext,
    tree: &mut NodeTree,
    patch_set: &PatchSet,
    applied: &mut AppliedPatchSet,
) -> Result<(), ApplyError> {
    for (local_name, external_name) in &patch_set.renamed_nodes {
        let id = context.lookup(local_name)?;

        let node = tree
            .get_node_mut(id)
            .ok_or(LinkStateError::MissingNode {
                name: local_name.clone(),
            })?;
        node.name = external_name.clone();

        context.name_to_id.remove(local_name);
        context.name_to_id.insert(external_name.clone(), id);

        log::trace!("renamed {} to {}", local_name, external_name);
        applied.renamed.push(id);
    }

    Ok(())
}

fn apply_reparented(
    context: &PatchApplyContext,
    tree: &mut NodeTree,
    patch_set: &PatchSet,
    applied: &mut AppliedPatchSet,
) -> Result<(), ApplyError> {
    let mut moves = Vec::with_capacity(patch_set.reparented_nodes.len());

    for (name, parent_name) in &patch_set.reparented_nodes {
        let id = context.lookup(name)?;
        let parent_id = context.lookup(parent_name)?;
        moves.push((name, id, parent_name, parent_id));
    }

    // Everything is detached first. Attaching as we go could briefly put a
    // node under its own descendant when two nodes trade places.
    for (_, id, _, _) in &moves {
        tree.detach(*id).map_err(LinkStateError::from)?;
    }

    let root_id = context.lookup(ROOT_NAME)?;

    for (name, id, parent_name, parent_id) in moves {
        // The replica may have moved the new parent somewhere under this
        // node. Upstream wins, so that branch is lifted out to the root first.
        if tree.is_ancestor_of(id, parent_id) {
            let branch = branch_containing(tree, id, parent_id)
                .ok_or(LinkStateError::MissingNode {
                    name: parent_name.clone(),
                })?;

            log::warn!(
                "{}: new parent {:?} was moved under it locally; moving that branch back to the root",
                name,
                parent_name
            );

            tree.detach(branch).map_err(LinkStateError::from)?;
            tree.attach(branch, root_id).map_err(LinkStateError::from)?;
            applied.reparented.push(branch);
        }

        tree.attach(id, parent_id).map_err(LinkStateError::from)?;

        log::trace!("{}: parent changed to {:?}", name, parent_name);
        applied.reparented.push(id);
    }

    Ok(())
}

/// The child of `ancestor` whose subtree holds `id`.
fn branch_containing(tree: &NodeTree, ancestor: NodeId, id: NodeId) -> Option<NodeId> {
    let mut current = id;

    loop {
        let parent = tree.get_node(current)?.parent()?;
        if parent == ancestor {
            return Some(current);
        }
        current = parent;
    }
}

fn apply_destroyed(
    context: &mut PatchApplyContext,
    tree: &mut NodeTree,
    patch_set: &PatchSet,
    applied: &mut AppliedPatchSet,
) -> Result<(), ApplyError> {
    for name in &patch_set.destroyed_nodes {
        let id = match context.lookup_surviving(name)? {
            Some(id) => id,
            None => {
                log::trace!("{}: already removed with an ancestor", name);
                applied.destroyed.push(name.clone());
                continue;
            }
        };

        let removed = tree.remove_node(id).map_err(LinkStateError::from)?;
        context.forget(&removed);

        log::trace!("{}: destroyed ({} nodes removed)", name, removed.len());
        applied.destroyed.push(name.clone());
    }

    applied.created.retain(|id| tree.get_node(*id).is_some());
    applied.renamed.retain(|id| tree.get_node(*id).is_some());
    applied.reparented.retain(|id| tree.get_node(*id).is_some());

    Ok(())
}

fn apply_removed_facets(
    context: &PatchApplyContext,
    tree: &mut NodeTree,
    removals: &[PatchRemoveFacet],
    applied: &mut AppliedPatchSet,
) -> Result<(), ApplyError> {
    let mut by_node: BTreeMap<&str, Vec<&PatchRemoveFacet>> = BTreeMap::new();
    for removal in removals {
        by_node.entry(removal.node.as_str()).or_default().push(removal);
    }

    for (name, mut removals) in by_node {
        let id = match context.lookup_surviving(name)? {
            Some(id) => id,
            None => continue,
        };

        let node = tree
            .get_node_mut(id)
            .ok_or_else(|| LinkStateError::MissingNode {
                name: name.to_owned(),
            })?;

        // Highest positions first, so lower positions of the same type stay
        // where the patch expects them.
        removals.sort_by(|a, b| {
            a.facet_type
                .cmp(&b.facet_type)
                .then(b.index.cmp(&a.index))
        });

        for removal in removals {
            let position = node
                .facets
                .iter()
                .enumerate()
                .filter(|(_, facet)| facet.type_name == removal.facet_type)
                .map(|(position, _)| position)
                .nth(removal.index);

            if let Some(position) = position {
                node.facets.remove(position);
                log::trace!(
                    "{}: removed facet {} #{}",
                    name,
                    removal.facet_type,
                    removal.index
                );
            }
        }

        applied.facets_changed.push(id);
    }

    Ok(())
}

fn apply_updated_facets(
    context: &PatchApplyContext,
    tree: &mut NodeTree,
    updates: &[PatchUpdateFacet],
    kinds: &FacetKinds,
    applied: &mut AppliedPatchSet,
) -> Result<(), ApplyError> {
    let mut by_node: BTreeMap<&str, Vec<&PatchUpdateFacet>> = BTreeMap::new();
    for update in updates {
        by_node.entry(update.node.as_str()).or_default().push(update);
    }

    for (name, updates) in by_node {
        let id = match context.lookup_surviving(name)? {
            Some(id) => id,
            None => {
                log::warn!(
                    "{}: facet updates dropped, the node was removed with a destroyed ancestor",
                    name
                );
                continue;
            }
        };

        let node = tree
            .get_node_mut(id)
            .ok_or_else(|| LinkStateError::MissingNode {
                name: name.to_owned(),
            })?;

        // Existing facets each pair with at most one update.
        let mut matched = vec![false; node.facets.len()];

        for update in updates {
            let kind = kinds
                .get(&update.facet_type)
                .ok_or_else(|| LinkStateError::UnknownFacetType {
                    facet_type: update.facet_type.clone(),
                })?;

            let positions: Vec<usize> = node
                .facets
                .iter()
                .enumerate()
                .filter(|(_, facet)| facet.type_name == update.facet_type)
                .map(|(position, _)| position)
                .collect();

            let target = positions
                .get(update.index)
                .copied()
                .filter(|&position| !matched[position])
                .or_else(|| positions.iter().copied().find(|&position| !matched[position]));

            match target {
                Some(position) => {
                    kind.apply_value(&mut node.facets[position], &update.value)?;
                    matched[position] = true;

                    log::trace!("{}: updated facet {}", name, update.facet_type);
                }
                None => {
                    let mut facet = kind.construct();
                    kind.apply_value(&mut facet, &update.value)?;
                    node.facets.push(facet);
                    matched.push(true);

                    log::trace!("{}: created facet {}", name, update.facet_type);
                }
            }
        }

        applied.facets_changed.push(id);
    }

    Ok(())
}
