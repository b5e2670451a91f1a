//! JSON model files: the on-disk form of a `NodeTree`.

use serde::{Deserialize, Serialize};

use crate::{
    facet::Facet,
    snapshot::{NodeId, NodeTree, TreeError},
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonModel {
    #[serde(alias = "Name")]
    pub name: String,

    #[serde(
        alias = "Facets",
        default = "Vec::new",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub facets: Vec<Facet>,

    #[serde(
        alias = "Children",
        default = "Vec::new",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub children: Vec<JsonModel>,
}

impl JsonModel {
    /// Captures the subtree rooted at `id`. Unknown IDs produce `None`.
    pub fn from_tree(tree: &NodeTree, id: NodeId) -> Option<JsonModel> {
        let node = tree.get_node(id)?;

        let children = node
            .children()
            .iter()
            .filter_map(|&child_id| JsonModel::from_tree(tree, child_id))
            .collect();

        Some(JsonModel {
            name: node.name.clone(),
            facets: node.facets.clone(),
            children,
        })
    }

    pub fn into_tree(self) -> Result<NodeTree, TreeError> {
        let mut tree = NodeTree::new(self.name);
        let root_id = tree.root_id();

        if let Some(root) = tree.get_node_mut(root_id) {
            root.facets = self.facets;
        }

        for child in self.children {
            child.insert_into(&mut tree, root_id)?;
        }

        Ok(tree)
    }

    fn insert_into(self, tree: &mut NodeTree, parent_id: NodeId) -> Result<(), TreeError> {
        let id = tree.insert_node(self.name, Some(parent_id))?;

        if let Some(node) = tree.get_node_mut(id) {
            node.facets = self.facets;
        }

        for child in self.children {
            child.insert_into(tree, id)?;
        }

        Ok(())
    }
}

impl NodeTree {
    pub fn to_model(&self) -> Option<JsonModel> {
        JsonModel::from_tree(self, self.root_id())
    }

    pub fn from_model(model: JsonModel) -> Result<NodeTree, TreeError> {
        model.into_tree()
    }
}
