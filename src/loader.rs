//! Document loading and in-document pointer navigation.
//!
//! Schema, UI and data documents are plain JSON; the engine itself never
//! touches the filesystem, so these helpers exist for callers and the CLI.

use std::path::Path;

use serde_json::Value;

use crate::error::LoadError;
use crate::types::FormOptions;

/// Load a JSON document from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_document(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    load_document_str(&content)
}

/// Load a JSON document from a string.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` if the string isn't valid JSON.
pub fn load_document_str(content: &str) -> Result<Value, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
}

/// Load [`FormOptions`] from a JSON file. Missing keys take their defaults.
pub fn load_options(path: &Path) -> Result<FormOptions, LoadError> {
    let value = load_document(path)?;
    serde_json::from_value(value).map_err(|source| LoadError::InvalidJson { source })
}

/// Navigate a JSON Pointer fragment (e.g., "#/definitions/foo").
///
/// Returns `None` when any step of the pointer is missing. `"#"` is the
/// document itself.
pub fn navigate_fragment<'a>(document: &'a Value, fragment: &str) -> Option<&'a Value> {
    let path = fragment.strip_prefix('#')?;
    let path = path.strip_prefix('/').unwrap_or(path);
    if path.is_empty() {
        return Some(document);
    }

    let mut current = document;
    for part in path.split('/') {
        // Unescape JSON Pointer encoding (~1 = /, ~0 = ~)
        let key = part.replace("~1", "/").replace("~0", "~");
        current = match current {
            Value::Array(arr) => arr.get(key.parse::<usize>().ok()?)?,
            other => other.get(&key)?,
        };
    }
    Some(current)
}
