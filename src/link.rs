//! The durable record that binds a replica to the external asset it follows.
//!
//! A link lives inside the replica itself, as the state of a facet whose type
//! is configured by `SyncSettings::link_facet`. It is stored as JSON and
//! rewritten at the end of every successful sync cycle, so committing the
//! replica and recording the new history happen in one step.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::LinkStateError,
    facet::Facet,
    snapshot::{FlatIndex, NodeId, NodeTree},
    store::AssetHandle,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentLink {
    /// The external asset this replica follows. `None` while unbound; the
    /// history below is kept so that binding again resumes where it left off.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<AssetHandle>,

    /// Snapshot text of the external asset as of the last successful sync.
    /// Empty if the replica has never been synced.
    #[serde(default)]
    pub last_synced_snapshot: String,

    #[serde(default = "default_auto_sync")]
    pub auto_sync: bool,

    /// Declares that an external name and a local name refer to the same
    /// node for the next cycle.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name_overrides: Vec<NameOverride>,
}

fn default_auto_sync() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameOverride {
    pub external_name: String,
    pub local_name: String,
}

impl Default for PersistentLink {
    fn default() -> Self {
        PersistentLink {
            external_ref: None,
            last_synced_snapshot: String::new(),
            auto_sync: default_auto_sync(),
            name_overrides: Vec::new(),
        }
    }
}

impl PersistentLink {
    pub fn new(external_ref: Option<AssetHandle>) -> Self {
        PersistentLink {
            external_ref,
            ..Default::default()
        }
    }

    /// Decodes a link from facet state. A freshly constructed facet has empty
    /// state, which reads as an unbound link.
    pub fn from_facet_state(state: &str) -> Result<Self, LinkStateError> {
        if state.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_str(state).map_err(|source| LinkStateError::MalformedLink { source })
    }

    pub fn to_facet_state(&self) -> Result<String, LinkStateError> {
        serde_json::to_string(self).map_err(|source| LinkStateError::MalformedLink { source })
    }

    /// Finds the node carrying a link facet, searching depth-first from the
    /// root, and decodes its link.
    pub fn locate(tree: &NodeTree, link_type: &str) -> Result<(NodeId, Self), LinkStateError> {
        let id = tree
            .find_facet_owner(link_type)
            .ok_or_else(|| LinkStateError::MissingLink {
                link_type: link_type.to_owned(),
            })?;

        Ok((id, Self::read_from(tree, id, link_type)?))
    }

    pub fn read_from(tree: &NodeTree, id: NodeId, link_type: &str) -> Result<Self, LinkStateError> {
        let missing = || LinkStateError::MissingLink {
            link_type: link_type.to_owned(),
        };

        let facet = tree
            .get_node(id)
            .ok_or_else(missing)?
            .facets_of_type(link_type)
            .next()
            .ok_or_else(missing)?;

        Self::from_facet_state(&facet.state)
    }

    /// Stores this link in the first link facet on `id`, attaching one if the
    /// node has none.
    pub fn write_to(&self, tree: &mut NodeTree, id: NodeId, link_type: &str) -> Result<(), LinkStateError> {
        let state = self.to_facet_state()?;

        let node = tree
            .get_node_mut(id)
            .ok_or_else(|| LinkStateError::MissingLink {
                link_type: link_type.to_owned(),
            })?;

        match node.facets.iter_mut().find(|facet| facet.type_name == link_type) {
            Some(facet) => facet.state = state,
            None => node.facets.push(Facet::new(link_type, state)),
        }

        Ok(())
    }

    pub fn local_name_for<'a>(&'a self, external_name: &'a str) -> &'a str {
        self.name_overrides
            .iter()
            .find(|entry| entry.external_name == external_name)
            .map(|entry| entry.local_name.as_str())
            .unwrap_or(external_name)
    }

    pub fn external_name_for<'a>(&'a self, local_name: &'a str) -> &'a str {
        self.name_overrides
            .iter()
            .find(|entry| entry.local_name == local_name)
            .map(|entry| entry.external_name.as_str())
            .unwrap_or(local_name)
    }

    /// Records that `external_name` upstream is `local_name` in the replica.
    /// Any override already mentioning either name is replaced.
    pub fn add_override(&mut self, external_name: impl Into<String>, local_name: impl Into<String>) {
        let external_name = external_name.into();
        let local_name = local_name.into();

        self.name_overrides.retain(|entry| {
            entry.external_name != external_name && entry.local_name != local_name
        });
        self.name_overrides.push(NameOverride {
            external_name,
            local_name,
        });
    }

    pub fn remove_override_by_external(&mut self, external_name: &str) -> bool {
        let before = self.name_overrides.len();
        self.name_overrides
            .retain(|entry| entry.external_name != external_name);
        self.name_overrides.len() != before
    }

    pub fn remove_override_by_local(&mut self, local_name: &str) -> bool {
        let before = self.name_overrides.len();
        self.name_overrides.retain(|entry| entry.local_name != local_name);
        self.name_overrides.len() != before
    }

    /// Turns the overrides into a local-to-external rename map. An override
    /// only applies if its local name is in the replica, its external name is
    /// upstream, the two differ, and the external name is not already taken
    /// in the replica.
    pub fn resolve_renames(&self, replica: &FlatIndex, new: &FlatIndex) -> HashMap<String, String> {
        let mut renames = HashMap::new();

        for entry in &self.name_overrides {
            if entry.local_name == entry.external_name
                || !replica.contains(&entry.local_name)
                || !new.contains(&entry.external_name)
            {
                continue;
            }

            if replica.contains(&entry.external_name) {
                log::warn!(
                    "Not renaming {} to {}: the replica already has a node with that name",
                    entry.local_name,
                    entry.external_name
                );
                continue;
            }

            renames.insert(entry.local_name.clone(), entry.external_name.clone());
        }

        renames
    }
}
