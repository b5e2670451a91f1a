use std::{error::Error, fmt};

use thiserror::Error;

use crate::{
    snapshot::{ApplyError, FormatError, SnapshotError, TreeError},
    store::StoreError,
};

/// Wrapper type to print errors with source-chasing.
pub struct ErrorDisplay<E>(pub E);

impl<E: Error> fmt::Display for ErrorDisplay<E> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "{}", self.0)?;

        let mut current_err: &dyn Error = &self.0;
        while let Some(source) = current_err.source() {
            write!(formatter, "\n  caused by {}", source)?;
            current_err = source;
        }

        Ok(())
    }
}

/// The replica's link or structure does not agree with what a sync cycle
/// expects of it.
#[derive(Debug, Error)]
pub enum LinkStateError {
    #[error("the replica carries no {link_type} facet")]
    MissingLink { link_type: String },

    #[error("the replica's link facet could not be read")]
    MalformedLink {
        #[source]
        source: serde_json::Error,
    },

    #[error("node {name:?} was expected in the replica but is not there")]
    MissingNode { name: String },

    #[error("no facet kind is available for facet type {facet_type}")]
    UnknownFacetType { facet_type: String },

    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Anything that can abort a sync cycle. A cycle that fails leaves the stored
/// replica as it was.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("the last synced snapshot is unreadable")]
    Format(#[from] FormatError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    LinkState(#[from] LinkStateError),

    #[error("patch could not be applied")]
    Apply(#[from] ApplyError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
