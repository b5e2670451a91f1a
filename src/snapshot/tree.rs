use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::facet::Facet;

/// Identifies a node inside one `NodeTree`. IDs are never reused by the tree
/// that handed them out, but carry no meaning across trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl fmt::Display for NodeId {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "node-{}", self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("{0} does not exist in the tree")]
    NodeNotFound(NodeId),

    #[error("{0} already has a parent and must be detached first")]
    AlreadyParented(NodeId),

    #[error("attaching {child} to {parent} would create a cycle")]
    WouldCycle { child: NodeId, parent: NodeId },

    #[error("the root node cannot be moved")]
    CannotMoveRoot,
}

/// A named hierarchy element with its ordered facet list.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: NodeId,
    parent: Option<NodeId>,
    children: Vec<NodeId>,

    pub name: String,

    /// Facets in attachment order. Several facets may share a type.
    pub facets: Vec<Facet>,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn facets_of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a Facet> {
        self.facets
            .iter()
            .filter(move |facet| facet.type_name == type_name)
    }
}

/// A live, mutable node hierarchy. Both external assets and replicas are
/// represented with this type.
///
/// Nodes may exist without a parent; those are not reachable from the root
/// until attached, which lets a patch create nodes before deciding where they
/// go.
#[derive(Debug, Clone)]
pub struct NodeTree {
    nodes: HashMap<NodeId, Node>,
    root_id: NodeId,
    next_id: u64,
}

impl NodeTree {
    pub fn new(root_name: impl Into<String>) -> NodeTree {
        let root_id = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            root_id,
            Node {
                id: root_id,
                parent: None,
                children: Vec::new(),
                name: root_name.into(),
                facets: Vec::new(),
            },
        );

        NodeTree {
            nodes,
            root_id,
            next_id: 1,
        }
    }

    pub fn root_id(&self) -> NodeId {
        self.root_id
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Inserts a new, facet-less node. Passing `None` as the parent leaves the
    /// node detached.
    pub fn insert_node(
        &mut self,
        name: impl Into<String>,
        parent: Option<NodeId>,
    ) -> Result<NodeId, TreeError> {
        if let Some(parent_id) = parent {
            if !self.nodes.contains_key(&parent_id) {
                return Err(TreeError::NodeNotFound(parent_id));
            }
        }

        let id = NodeId(self.next_id);
        self.next_id += 1;

        self.nodes.insert(
            id,
            Node {
                id,
                parent,
                children: Vec::new(),
                name: name.into(),
                facets: Vec::new(),
            },
        );

        if let Some(parent_id) = parent {
            if let Some(parent_node) = self.nodes.get_mut(&parent_id) {
                parent_node.children.push(id);
            }
        }

        Ok(id)
    }

    /// Unlinks a node from its parent. The node keeps its own subtree.
    /// Detaching an already detached node is a no-op.
    pub fn detach(&mut self, id: NodeId) -> Result<(), TreeError> {
        if id == self.root_id {
            return Err(TreeError::CannotMoveRoot);
        }

        let node = self.nodes.get_mut(&id).ok_or(TreeError::NodeNotFound(id))?;

        if let Some(parent_id) = node.parent.take() {
            if let Some(parent) = self.nodes.get_mut(&parent_id) {
                parent.children.retain(|&child| child != id);
            }
        }

        Ok(())
    }

    /// Links a detached node under `parent_id`, appending it to the parent's
    /// children.
    pub fn attach(&mut self, id: NodeId, parent_id: NodeId) -> Result<(), TreeError> {
        if id == self.root_id {
            return Err(TreeError::CannotMoveRoot);
        }

        let node = self.nodes.get(&id).ok_or(TreeError::NodeNotFound(id))?;
        if node.parent.is_some() {
            return Err(TreeError::AlreadyParented(id));
        }

        if !self.nodes.contains_key(&parent_id) {
            return Err(TreeError::NodeNotFound(parent_id));
        }

        if id == parent_id || self.is_ancestor_of(id, parent_id) {
            return Err(TreeError::WouldCycle {
                child: id,
                parent: parent_id,
            });
        }

        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = Some(parent_id);
        }
        if let Some(parent) = self.nodes.get_mut(&parent_id) {
            parent.children.push(id);
        }

        Ok(())
    }

    /// Removes a node and its whole subtree, returning the IDs of every
    /// removed node (the node itself first).
    pub fn remove_node(&mut self, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        if id == self.root_id {
            return Err(TreeError::CannotMoveRoot);
        }

        self.detach(id)?;

        let removed: Vec<NodeId> = self.descendants(id).collect();
        for removed_id in &removed {
            self.nodes.remove(removed_id);
        }

        Ok(removed)
    }

    /// Depth-first traversal starting at (and including) `id`.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let stack = if self.nodes.contains_key(&id) {
            vec![id]
        } else {
            Vec::new()
        };

        Descendants { tree: self, stack }
    }

    /// Whether `ancestor` appears on the parent chain of `id`.
    pub fn is_ancestor_of(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.nodes.get(&id).and_then(|node| node.parent);

        while let Some(current_id) = current {
            if current_id == ancestor {
                return true;
            }
            current = self.nodes.get(&current_id).and_then(|node| node.parent);
        }

        false
    }

    /// Finds the first node, in depth-first order from the root, carrying a
    /// facet of the given type.
    pub fn find_facet_owner(&self, type_name: &str) -> Option<NodeId> {
        self.descendants(self.root_id).find(|id| {
            self.nodes
                .get(id)
                .map(|node| node.facets_of_type(type_name).next().is_some())
                .unwrap_or(false)
        })
    }

    /// Finds a node by name within the subtree rooted at `root`.
    pub fn find_by_name(&self, root: NodeId, name: &str) -> Option<NodeId> {
        self.descendants(root)
            .find(|id| self.nodes.get(id).map(|node| node.name == name) == Some(true))
    }
}

pub struct Descendants<'a> {
    tree: &'a NodeTree,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;

        if let Some(node) = self.tree.nodes.get(&id) {
            // Reversed so that children come out in their stored order.
            self.stack.extend(node.children.iter().rev().copied());
        }

        Some(id)
    }
}
