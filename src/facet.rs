//! Facets are typed, possibly repeated pieces of state attached to nodes. The
//! sync engine never looks inside a facet: it only moves opaque encoded values
//! around, using a `FacetCodec` to turn live facets into strings and back.

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{settings::SyncSettings, snapshot::NodeSnapshot};

/// A single facet instance on a live node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facet {
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(default)]
    pub state: String,
}

impl Facet {
    pub fn new(type_name: impl Into<String>, state: impl Into<String>) -> Self {
        Facet {
            type_name: type_name.into(),
            state: state.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("value for facet type {type_name} is not valid JSON")]
    InvalidJson {
        type_name: String,
        source: serde_json::Error,
    },
}

/// Converts facet instances to canonical opaque strings and overwrites
/// instances from such strings.
pub trait FacetCodec: fmt::Debug + Send + Sync {
    fn encode(&self, facet: &Facet) -> String;

    fn overwrite(&self, facet: &mut Facet, value: &str) -> Result<(), CodecError>;

    /// State given to freshly constructed instances before any value is
    /// applied.
    fn default_state(&self) -> String {
        String::new()
    }
}

/// Stores values verbatim.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpaqueCodec;

impl FacetCodec for OpaqueCodec {
    fn encode(&self, facet: &Facet) -> String {
        facet.state.clone()
    }

    fn overwrite(&self, facet: &mut Facet, value: &str) -> Result<(), CodecError> {
        facet.state = value.to_owned();
        Ok(())
    }
}

/// Treats state as a JSON document. Encoding is canonical (sorted keys, no
/// whitespace) so that equal documents compare equal as strings. Overwriting an
/// object with an object only replaces the keys present in the new value.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl FacetCodec for JsonCodec {
    fn encode(&self, facet: &Facet) -> String {
        match serde_json::from_str::<serde_json::Value>(&facet.state) {
            Ok(value) => value.to_string(),
            Err(_) => facet.state.clone(),
        }
    }

    fn overwrite(&self, facet: &mut Facet, value: &str) -> Result<(), CodecError> {
        let incoming: serde_json::Value =
            serde_json::from_str(value).map_err(|source| CodecError::InvalidJson {
                type_name: facet.type_name.clone(),
                source,
            })?;

        let current = serde_json::from_str::<serde_json::Value>(&facet.state).ok();

        let merged = match (current, incoming) {
            (Some(serde_json::Value::Object(mut current)), serde_json::Value::Object(incoming)) => {
                current.extend(incoming);
                serde_json::Value::Object(current)
            }
            (_, incoming) => incoming,
        };

        facet.state = merged.to_string();
        Ok(())
    }

    fn default_state(&self) -> String {
        "{}".to_owned()
    }
}

/// Maps facet type names to the codec that handles them. Types without an
/// explicit registration use the default codec.
#[derive(Debug, Clone)]
pub struct FacetRegistry {
    default_codec: Arc<dyn FacetCodec>,
    codecs: HashMap<String, Arc<dyn FacetCodec>>,
    placement_type: String,
    link_type: String,
}

impl FacetRegistry {
    pub fn new(placement_type: impl Into<String>, link_type: impl Into<String>) -> Self {
        FacetRegistry {
            default_codec: Arc::new(OpaqueCodec),
            codecs: HashMap::new(),
            placement_type: placement_type.into(),
            link_type: link_type.into(),
        }
    }

    pub fn from_settings(settings: &SyncSettings) -> Self {
        let mut registry = Self::new(&settings.placement_facet, &settings.link_facet);

        for type_name in &settings.json_facets {
            registry.register(type_name.clone(), JsonCodec);
        }

        registry
    }

    pub fn register(&mut self, type_name: impl Into<String>, codec: impl FacetCodec + 'static) {
        self.codecs.insert(type_name.into(), Arc::new(codec));
    }

    pub fn codec_for(&self, type_name: &str) -> &dyn FacetCodec {
        self.codecs
            .get(type_name)
            .unwrap_or(&self.default_codec)
            .as_ref()
    }

    pub fn encode(&self, facet: &Facet) -> String {
        self.codec_for(&facet.type_name).encode(facet)
    }

    /// The facet type describing a node's placement relative to its parent.
    pub fn placement_type(&self) -> &str {
        &self.placement_type
    }

    /// The facet type that embeds a replica's persistent link.
    pub fn link_type(&self) -> &str {
        &self.link_type
    }

    /// Builds the capability map for one sync cycle, covering every facet type
    /// that appears anywhere in the given snapshots.
    pub fn kinds_for<'a>(&self, snapshots: impl IntoIterator<Item = &'a NodeSnapshot>) -> FacetKinds {
        let mut type_names = BTreeSet::new();
        for snapshot in snapshots {
            snapshot.collect_facet_types(&mut type_names);
        }

        let kinds = type_names
            .into_iter()
            .map(|type_name| {
                let codec = self
                    .codecs
                    .get(&type_name)
                    .unwrap_or(&self.default_codec)
                    .clone();

                (type_name.clone(), FacetKind { type_name, codec })
            })
            .collect();

        FacetKinds { kinds }
    }
}

impl Default for FacetRegistry {
    fn default() -> Self {
        Self::from_settings(&SyncSettings::default())
    }
}

/// What the patch applier may do with one facet type.
#[derive(Debug, Clone)]
pub struct FacetKind {
    type_name: String,
    codec: Arc<dyn FacetCodec>,
}

impl FacetKind {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn construct(&self) -> Facet {
        Facet::new(self.type_name.clone(), self.codec.default_state())
    }

    pub fn apply_value(&self, facet: &mut Facet, value: &str) -> Result<(), CodecError> {
        self.codec.overwrite(facet, value)
    }
}

/// Per-cycle map from facet type name to its capabilities.
#[derive(Debug, Clone, Default)]
pub struct FacetKinds {
    kinds: HashMap<String, FacetKind>,
}

impl FacetKinds {
    pub fn get(&self, type_name: &str) -> Option<&FacetKind> {
        self.kinds.get(type_name)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
