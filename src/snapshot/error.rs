use thiserror::Error;

use super::NodeId;

/// Snapshot text that does not follow the snapshot grammar.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("malformed snapshot text at index {index}: {context}")]
pub struct FormatError {
    /// Byte offset into the text where reading stopped.
    pub index: usize,
    pub context: String,
}

impl FormatError {
    pub(crate) fn new(index: usize, context: impl Into<String>) -> Self {
        FormatError {
            index,
            context: context.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("node name {name:?} appears more than once in the captured tree")]
    DuplicateName { name: String },

    #[error("facet type {facet_type:?} on {id} starts with '-', which marks children in snapshot text")]
    ReservedFacetType { id: NodeId, facet_type: String },

    #[error("{id} has an empty name, which is reserved for the root")]
    EmptyName { id: NodeId },

    #[error("{id} was referenced while capturing but is not in the tree")]
    MissingNode { id: NodeId },
}
