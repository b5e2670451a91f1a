
use crate::facet::{Facet, FacetRegistry};

use super::{NodeId, NodeSnapshot, NodeTree};

fn registry() -> FacetRegistry {
    FacetRegistry::new("Placement", "SyncLink")
}

/// Builds a live tree whose root matches `snapshot`. Facet values are stored
/// verbatim, which is what the default codec expects.
fn tree_from(root_name: &str, snapshot: &NodeSnapshot) -> NodeTree {
    let mut tree = NodeTree::new(root_name);
    let root = tree.root_id();
    fill(&mut tree, root, snapshot);
    tree
}

fn fill(tree: &mut NodeTree, id: NodeId, snapshot: &NodeSnapshot) {
    if let Some(node) = tree.get_node_mut(id) {
        for (type_name, values) in snapshot.facets().iter() {
            for value in values {
                node.facets.push(Facet::new(type_name.clone(), value.clone()));
            }
        }
    }

    for (name, child) in snapshot.children() {
        let child_id = tree.insert_node(name, Some(id)).unwrap();
        fill(tree, child_id, child);
    }
}

fn capture(tree: &NodeTree) -> NodeSnapshot {
    NodeSnapshot::capture(tree, tree.root_id(), &registry()).unwrap()
}
