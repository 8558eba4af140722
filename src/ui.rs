//! Read-only access to the UI options document.
//!
//! The UI document mirrors the schema's property and index names. The engine
//! only reads behavior flags from it; presentation is the rendering layer's job.

use serde::Serialize;
use serde_json::Value;

use crate::id_path::{IdPath, PathSegment};

/// Reserved UI key naming a custom field override.
pub const UI_FIELD: &str = "ui:field";
/// Reserved UI key naming a custom widget override.
pub const UI_WIDGET: &str = "ui:widget";
/// Reserved UI key holding behavior options.
pub const UI_OPTIONS: &str = "ui:options";

/// Behavior flags for an array field.
///
/// Each flag defaults to `true` unless the UI document says otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArrayUiOptions {
    pub addable: bool,
    pub removable: bool,
    pub orderable: bool,
}

impl Default for ArrayUiOptions {
    fn default() -> Self {
        Self {
            addable: true,
            removable: true,
            orderable: true,
        }
    }
}

impl ArrayUiOptions {
    /// Read flags from a UI node's `ui:options`.
    ///
    /// Only an explicit `false` disables a flag.
    pub fn from_ui(ui: Option<&Value>) -> Self {
        let options = ui.and_then(|u| u.get(UI_OPTIONS));
        let flag = |name: &str| {
            !matches!(
                options.and_then(|o| o.get(name)),
                Some(Value::Bool(false))
            )
        };
        Self {
            addable: flag("addable"),
            removable: flag("removable"),
            orderable: flag("orderable"),
        }
    }
}

/// Which kind of override the caller registered for a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "name")]
pub enum Override {
    Field(String),
    Widget(String),
}

/// Locate the UI node for a data path.
///
/// Array indices address the UI node's `items` entry: a sequence is indexed
/// positionally, a single node applies to every index.
pub fn ui_for_path<'a>(ui: &'a Value, path: &IdPath) -> Option<&'a Value> {
    let mut current = ui;
    for segment in path.segments() {
        current = match segment {
            PathSegment::Key(key) => current.get(key.as_str())?,
            PathSegment::Index(i) => match current.get("items")? {
                Value::Array(per_index) => per_index.get(*i)?,
                single => single,
            },
        };
    }
    Some(current)
}

/// Report whether the caller registered a custom field or widget for a path.
///
/// A field override wins over a widget override.
pub fn has_override(ui: &Value, path: &IdPath) -> Option<Override> {
    let node = ui_for_path(ui, path)?;
    if let Some(field) = node.get(UI_FIELD).and_then(Value::as_str) {
        return Some(Override::Field(field.to_string()));
    }
    node.get(UI_WIDGET)
        .and_then(Value::as_str)
        .map(|w| Override::Widget(w.to_string()))
}
