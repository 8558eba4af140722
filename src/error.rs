//! Error types for schema resolution, field ids, array operations and loading.

use std::path::PathBuf;
use thiserror::Error;

/// Structural schema errors.
///
/// Fatal to the subtree being resolved; callers render an "unsupported field"
/// placeholder for that subtree instead of aborting the whole form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("unresolved reference \"{reference}\"")]
    UnresolvedRef { reference: String },

    #[error("cyclic reference: {}", chain.join(" -> "))]
    CyclicRef { chain: Vec<String> },

    #[error("invalid schema at {path}: {message}")]
    InvalidSchema { path: String, message: String },
}

/// Errors mapping between data paths and field id strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// A path segment cannot be encoded without breaking the id inverse.
    #[error("property name \"{segment}\" collides with the id scheme: {reason}")]
    Collision { segment: String, reason: &'static str },

    #[error("malformed field id \"{id}\"")]
    Malformed { id: String },
}

/// Array operations the caller was not allowed to make.
///
/// These are caller-contract violations, never silent no-ops.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationRejected {
    #[error("cannot add an item at length {len}")]
    AddNotPermitted { len: usize },

    #[error("item {index} cannot be removed")]
    RemoveNotPermitted { index: usize },

    #[error("item {index} cannot be reordered")]
    ReorderNotPermitted { index: usize },

    #[error("item {index} is already at the {boundary} boundary")]
    AtBoundary { index: usize, boundary: &'static str },

    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("value at {path} is not an array field")]
    NotAnArray { path: String },

    #[error("{operation} does not apply to {mode} arrays")]
    NotApplicable {
        operation: &'static str,
        mode: &'static str,
    },

    #[error("{value} is not one of the allowed options")]
    NotAnOption { value: String },
}

/// Errors while encoding selected files into data URLs.
#[derive(Debug, Error)]
pub enum FileEncodeError {
    #[error("cannot read {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("field is not a file array")]
    NotAFileArray,

    #[error("malformed data URL: {message}")]
    MalformedDataUrl { message: String },
}

/// Errors while loading schema, UI or data documents.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },
}

/// Any error surfaced by [`FormState`](crate::FormState) operations.
#[derive(Debug, Error)]
pub enum FormError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Id(#[from] IdError),

    #[error(transparent)]
    Rejected(#[from] OperationRejected),

    #[error(transparent)]
    File(#[from] FileEncodeError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

impl SchemaError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            LoadError::InvalidJson { .. } => 2,
        }
    }
}

impl FormError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            FormError::Load(e) => e.exit_code(),
            FormError::File(FileEncodeError::Read { .. }) => 3,
            _ => 2,
        }
    }
}
