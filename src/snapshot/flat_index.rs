//! Flattened, name-keyed view of a snapshot used for three-way diffing.

use std::collections::HashMap;

use crate::multimap::MultiMap;

use super::NodeSnapshot;

/// The name under which the root of every snapshot is indexed.
pub const ROOT_NAME: &str = "";

/// Maps every node name in a snapshot to its parent's name and to its facet
/// values. Relies on node names being unique across the entire snapshot; a
/// repeated name overwrites the earlier entry.
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    parents: HashMap<String, String>,
    facets: HashMap<String, MultiMap<String, String>>,
}

impl FlatIndex {
    pub fn build(snapshot: &NodeSnapshot) -> FlatIndex {
        let mut index = FlatIndex::default();
        index.parents.insert(ROOT_NAME.to_owned(), ROOT_NAME.to_owned());
        index.build_internal(snapshot, ROOT_NAME);
        index
    }

    fn build_internal(&mut self, snapshot: &NodeSnapshot, name: &str) {
        if !snapshot.facets().is_empty() {
            self.facets
                .insert(name.to_owned(), snapshot.facets().clone());
        }

        for (child_name, child) in snapshot.children() {
            let previous = self
                .parents
                .insert(child_name.to_owned(), name.to_owned());

            if previous.is_some() {
                log::warn!(
                    "Node name {:?} appears more than once in a snapshot; later occurrences win",
                    child_name
                );
            }

            self.build_internal(child, child_name);
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parents.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parents.contains_key(name)
    }

    /// The parent of `name`, or the root name if `name` is the root, a direct
    /// child of the root, or unknown.
    pub fn parent(&self, name: &str) -> &str {
        self.parents
            .get(name)
            .map(String::as_str)
            .unwrap_or(ROOT_NAME)
    }

    pub fn facet_types(&self, name: &str) -> impl Iterator<Item = &str> {
        self.facets
            .get(name)
            .into_iter()
            .flat_map(|facets| facets.keys().map(String::as_str))
    }

    pub fn facet_values(&self, name: &str, type_name: &str) -> &[String] {
        match self.facets.get(name) {
            Some(facets) => facets.get(type_name),
            None => &[],
        }
    }

    /// Number of indexed nodes, including the root.
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}
