//! Defines the three-way classification of upstream changes against a replica.
//!
//! Three indexes take part: `old` is the external asset as it was at the last
//! sync, `new` is the external asset now, and `replica` is the live replica.
//! Only differences between `old` and `new` are acted upon, and each one is
//! skipped if the replica has already converged on its own. Anything present
//! only in the replica is never touched.

use std::collections::{BTreeMap, BTreeSet};

use super::{
    flat_index::ROOT_NAME,
    patch::{PatchRemoveFacet, PatchSet, PatchUpdateFacet},
    FlatIndex,
};

/// Computes the patch that carries the `old` to `new` change over to the
/// replica. `placement_type` names the facet that must be rewritten whenever
/// its node changes parent.
pub fn compute_patch_set(
    old: &FlatIndex,
    new: &FlatIndex,
    replica: &FlatIndex,
    placement_type: &str,
) -> PatchSet {
    let mut patch_set = PatchSet::new();

    compute_created_destroyed(old, new, replica, &mut patch_set);

    let live_names = live_names(replica, &patch_set);

    compute_reparenting(old, new, replica, &mut patch_set);
    compute_facet_patches(old, new, replica, &live_names, placement_type, &mut patch_set);

    patch_set
}

fn compute_created_destroyed(
    old: &FlatIndex,
    new: &FlatIndex,
    replica: &FlatIndex,
    patch_set: &mut PatchSet,
) {
    let all_names: BTreeSet<&str> = old.names().chain(new.names()).collect();

    for name in all_names {
        let in_old = old.contains(name);
        let in_new = new.contains(name);

        if in_old == in_new {
            continue;
        }

        let in_replica = replica.contains(name);

        if !in_new && in_replica {
            patch_set.destroyed_nodes.insert(name.to_owned());
        } else if in_new && !in_replica {
            patch_set.created_nodes.insert(name.to_owned());
        }
    }
}

/// Names the replica will hold once creation and destruction are done.
fn live_names(replica: &FlatIndex, patch_set: &PatchSet) -> BTreeSet<String> {
    let mut names: BTreeSet<String> = replica
        .names()
        .chain(patch_set.created_nodes.iter().map(String::as_str))
        .filter(|name| !patch_set.destroyed_nodes.contains(*name))
        .map(str::to_owned)
        .collect();

    names.insert(ROOT_NAME.to_owned());
    names
}

// Cases for a node's parent, per index (x means absent):
//   old  new  replica
//    a    a     a      no action
//    a    b     a      move to b
//    a    b     b      no action, the replica already moved
//    a    b     c      move to b; the replica's own choice is lost
//    x    a     x      created, then moved to a
//    x    a     a      no action
fn compute_reparenting(
    old: &FlatIndex,
    new: &FlatIndex,
    replica: &FlatIndex,
    patch_set: &mut PatchSet,
) {
    let mut reparented = BTreeMap::new();

    for name in replica.names() {
        if name == ROOT_NAME || patch_set.destroyed_nodes.contains(name) {
            continue;
        }

        let replica_parent = replica.parent(name);
        let old_parent = old.parent(name);
        let new_parent = new.parent(name);

        if old_parent != new_parent && replica_parent != new_parent {
            reparented.insert(name.to_owned(), new_parent.to_owned());
        }
    }

    for name in &patch_set.created_nodes {
        reparented.insert(name.clone(), new.parent(name).to_owned());
    }

    patch_set.reparented_nodes = reparented;
}

fn compute_facet_patches(
    old: &FlatIndex,
    new: &FlatIndex,
    replica: &FlatIndex,
    live_names: &BTreeSet<String>,
    placement_type: &str,
    patch_set: &mut PatchSet,
) {
    for name in live_names {
        let name = name.as_str();

        if !new.contains(name) {
            continue;
        }

        let is_reparented = patch_set.reparented_nodes.contains_key(name);
        let facet_types: BTreeSet<&str> = old
            .facet_types(name)
            .chain(new.facet_types(name))
            .collect();

        for facet_type in facet_types {
            let old_values = old.facet_values(name, facet_type);
            let new_values = new.facet_values(name, facet_type);
            let replica_values = replica.facet_values(name, facet_type);

            let forced = is_reparented && facet_type == placement_type;

            for index in 0..old_values.len().max(new_values.len()) {
                match new_values.get(index) {
                    Some(new_value) => {
                        let unchanged_upstream = old_values.get(index) == Some(new_value);
                        let already_applied = replica_values.get(index) == Some(new_value);

                        if !forced && (unchanged_upstream || already_applied) {
                            continue;
                        }

                        patch_set.updated_facets.push(PatchUpdateFacet {
                            node: name.to_owned(),
                            facet_type: facet_type.to_owned(),
                            index,
                            value: new_value.clone(),
                        });
                    }
                    None => {
                        // Only reachable while old has a value at this index.
                        if index < replica_values.len() {
                            patch_set.removed_facets.push(PatchRemoveFacet {
                                node: name.to_owned(),
                                facet_type: facet_type.to_owned(),
                                index,
                            });
                        }
                    }
                }
            }
        }
    }
}
