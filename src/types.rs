//! Core types shared by the form engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key of the marker node that replaces a subtree whose schema cannot be resolved.
pub const UNSUPPORTED_KEY: &str = "$unsupported";

/// Default root segment for field ids.
pub const DEFAULT_ID_PREFIX: &str = "root";

/// Default separator between field id segments.
pub const DEFAULT_ID_SEPARATOR: &str = "_";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Concrete shape of a resolved schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    String,
    Number,
    Integer,
    Boolean,
    Null,
    Object,
    Array,
    /// No `type` and nothing to infer one from.
    Any,
    /// Subtree replaced by the unsupported marker.
    Unsupported,
}

impl SchemaKind {
    /// Tag a resolved schema node.
    ///
    /// A `type` array holding one type plus `"null"` collapses to that type.
    /// A missing `type` is inferred from `properties`, `items`, `enum` or `const`.
    pub fn of(schema: &Value) -> Self {
        let Some(map) = schema.as_object() else {
            return SchemaKind::Any;
        };
        if map.contains_key(UNSUPPORTED_KEY) {
            return SchemaKind::Unsupported;
        }

        match map.get("type") {
            Some(Value::String(t)) => return Self::parse(t),
            Some(Value::Array(types)) => {
                let named: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
                let non_null: Vec<&str> = named.iter().copied().filter(|t| *t != "null").collect();
                return match (non_null.as_slice(), named.is_empty()) {
                    ([single], _) => Self::parse(single),
                    ([], false) => SchemaKind::Null,
                    _ => SchemaKind::Any,
                };
            }
            _ => {}
        }

        if map.contains_key("properties") || map.contains_key("additionalProperties") {
            return SchemaKind::Object;
        }
        if map.contains_key("items") {
            return SchemaKind::Array;
        }
        let sample = map
            .get("const")
            .or_else(|| map.get("enum").and_then(|e| e.as_array()?.first()));
        match sample {
            Some(Value::String(_)) => SchemaKind::String,
            Some(Value::Bool(_)) => SchemaKind::Boolean,
            Some(Value::Number(n)) if n.is_i64() || n.is_u64() => SchemaKind::Integer,
            Some(Value::Number(_)) => SchemaKind::Number,
            Some(Value::Null) => SchemaKind::Null,
            _ => SchemaKind::Any,
        }
    }

    fn parse(name: &str) -> Self {
        match name {
            "string" => SchemaKind::String,
            "number" => SchemaKind::Number,
            "integer" => SchemaKind::Integer,
            "boolean" => SchemaKind::Boolean,
            "null" => SchemaKind::Null,
            "object" => SchemaKind::Object,
            "array" => SchemaKind::Array,
            _ => SchemaKind::Any,
        }
    }

    /// Placeholder used when an array slot must exist but its schema has no default.
    pub fn placeholder(&self) -> Value {
        match self {
            SchemaKind::String => Value::String(String::new()),
            SchemaKind::Number | SchemaKind::Integer => Value::from(0),
            SchemaKind::Boolean => Value::Bool(false),
            SchemaKind::Object => Value::Object(Default::default()),
            SchemaKind::Array => Value::Array(Vec::new()),
            SchemaKind::Null | SchemaKind::Any | SchemaKind::Unsupported => Value::Null,
        }
    }
}

/// Form-wide configuration.
///
/// Deserializes from camelCase JSON with every field optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormOptions {
    /// Re-validate on every change instead of only on submit.
    pub live_validate: bool,
    /// Skip validation entirely, including on submit.
    pub no_validate: bool,
    /// Root segment of every field id.
    pub id_prefix: String,
    /// Separator between field id segments.
    pub id_separator: String,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            live_validate: false,
            no_validate: false,
            id_prefix: DEFAULT_ID_PREFIX.to_string(),
            id_separator: DEFAULT_ID_SEPARATOR.to_string(),
        }
    }
}

impl FormOptions {
    /// Set live validation.
    pub fn live_validate(mut self, live: bool) -> Self {
        self.live_validate = live;
        self
    }

    /// Disable validation.
    pub fn no_validate(mut self, skip: bool) -> Self {
        self.no_validate = skip;
        self
    }

    /// Override the id root segment.
    pub fn id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_from_type_string() {
        assert_eq!(SchemaKind::of(&json!({"type": "string"})), SchemaKind::String);
        assert_eq!(SchemaKind::of(&json!({"type": "integer"})), SchemaKind::Integer);
        assert_eq!(SchemaKind::of(&json!({"type": "array"})), SchemaKind::Array);
    }

    #[test]
    fn kind_nullable_pair_collapses() {
        let schema = json!({"type": ["string", "null"]});
        assert_eq!(SchemaKind::of(&schema), SchemaKind::String);

        let schema = json!({"type": ["string", "number"]});
        assert_eq!(SchemaKind::of(&schema), SchemaKind::Any);
    }

    #[test]
    fn kind_inferred_without_type() {
        assert_eq!(SchemaKind::of(&json!({"properties": {}})), SchemaKind::Object);
        assert_eq!(SchemaKind::of(&json!({"items": {}})), SchemaKind::Array);
        assert_eq!(SchemaKind::of(&json!({"enum": ["a", "b"]})), SchemaKind::String);
        assert_eq!(SchemaKind::of(&json!({"const": 3})), SchemaKind::Integer);
        assert_eq!(SchemaKind::of(&json!({})), SchemaKind::Any);
    }

    #[test]
    fn kind_unsupported_marker() {
        let schema = json!({ UNSUPPORTED_KEY: "unresolved reference" });
        assert_eq!(SchemaKind::of(&schema), SchemaKind::Unsupported);
    }

    #[test]
    fn placeholders() {
        assert_eq!(SchemaKind::String.placeholder(), json!(""));
        assert_eq!(SchemaKind::Integer.placeholder(), json!(0));
        assert_eq!(SchemaKind::Object.placeholder(), json!({}));
        assert_eq!(SchemaKind::Any.placeholder(), Value::Null);
    }

    #[test]
    fn form_options_defaults_from_partial_json() {
        let opts: FormOptions = serde_json::from_value(json!({"liveValidate": true})).unwrap();
        assert!(opts.live_validate);
        assert!(!opts.no_validate);
        assert_eq!(opts.id_prefix, "root");
        assert_eq!(opts.id_separator, "_");
    }
}
