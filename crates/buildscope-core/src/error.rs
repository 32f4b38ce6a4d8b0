//! Error taxonomy for graph construction and analysis.

use crate::model::Attr;

/// Structural and I/O failures raised by the graph store and metric engine.
///
/// These are fatal for the operation that raised them; the graph keeps
/// whatever state was committed before the failing call (no rollback).
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("duplicated node for label \"{0}\"")]
    DuplicateLabel(String),

    #[error("dependency node parent \"{parent}\" not found for label \"{label}\"")]
    MissingParent { parent: String, label: String },

    #[error("node \"{0}\" not found")]
    NotFound(String),

    #[error("precompiled header \"{name}\" created by both \"{first}\" and \"{second}\"")]
    DuplicatePch {
        name: String,
        first: String,
        second: String,
    },

    #[error("node \"{label}\" has no \"{key}\" attribute")]
    MissingAttribute { label: String, key: Attr },

    #[error("cannot stat \"{path}\": {source}")]
    Stat {
        path: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("graph document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed graph file: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;
