//! Form data validation and the error tree.
//!
//! The JSON Schema validator produces a flat list of errors. Each one is
//! placed into an [`ErrorTree`] node addressed by the data path it refers to,
//! so the rendering layer can look errors up field by field. A custom
//! validation function may then inject its own errors anywhere in the tree.

use std::collections::BTreeMap;

use jsonschema::error::ValidationErrorKind;
use log::debug;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::SchemaError;
use crate::id_path::{IdPath, PathSegment};
use crate::loader::navigate_fragment;
use crate::resolver::{property_schema, resolve, ArrayShape};
use crate::types::SchemaKind;

/// Key holding a node's own errors in [`ErrorTree::to_error_schema`] output.
pub const ERRORS_KEY: &str = "__errors";

/// User-supplied validation hook: receives the data and the validator's tree,
/// returns the final tree.
pub type CustomValidator = dyn Fn(&Value, ErrorTree) -> ErrorTree + Send + Sync;

/// Who produced an error entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSource {
    Validator,
    Custom,
}

/// One validation failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEntry {
    pub path: IdPath,
    pub keyword: String,
    pub message: String,
    pub params: Map<String, Value>,
    pub source: ErrorSource,
}

/// Errors arranged by data path.
///
/// Every node holds the errors at exactly its path plus child nodes keyed by
/// property name or array index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorTree {
    path: IdPath,
    errors: Vec<ErrorEntry>,
    children: BTreeMap<PathSegment, ErrorTree>,
}

impl ErrorTree {
    /// Empty tree rooted at the data root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Path this node stands for.
    pub fn path(&self) -> &IdPath {
        &self.path
    }

    /// Errors at exactly this node.
    pub fn errors(&self) -> &[ErrorEntry] {
        &self.errors
    }

    /// Messages at exactly this node.
    pub fn messages(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.message.as_str()).collect()
    }

    /// Append a manually injected error at this node.
    pub fn add_error(&mut self, message: impl Into<String>) -> &mut Self {
        self.errors.push(ErrorEntry {
            path: self.path.clone(),
            keyword: "custom".to_string(),
            message: message.into(),
            params: Map::new(),
            source: ErrorSource::Custom,
        });
        self
    }

    /// Child node for a property, created when missing.
    pub fn field_mut(&mut self, key: &str) -> &mut ErrorTree {
        self.child_mut(PathSegment::Key(key.to_string()))
    }

    /// Child node for an array index, created when missing.
    pub fn item_mut(&mut self, index: usize) -> &mut ErrorTree {
        self.child_mut(PathSegment::Index(index))
    }

    /// Child node for any segment, created when missing.
    pub fn child_mut(&mut self, segment: PathSegment) -> &mut ErrorTree {
        let path = self.path.clone().child(segment.clone());
        self.children.entry(segment).or_insert_with(|| ErrorTree {
            path,
            ..ErrorTree::default()
        })
    }

    /// Child node for a segment, if one exists.
    pub fn get(&self, segment: &PathSegment) -> Option<&ErrorTree> {
        self.children.get(segment)
    }

    pub fn field(&self, key: &str) -> Option<&ErrorTree> {
        self.get(&PathSegment::Key(key.to_string()))
    }

    pub fn item(&self, index: usize) -> Option<&ErrorTree> {
        self.get(&PathSegment::Index(index))
    }

    /// Node at a path relative to this one, if anything was recorded there.
    pub fn at(&self, path: &IdPath) -> Option<&ErrorTree> {
        path.segments()
            .iter()
            .try_fold(self, |node, segment| node.get(segment))
    }

    /// Node at a path relative to this one, created when missing.
    pub fn at_mut(&mut self, path: &IdPath) -> &mut ErrorTree {
        path.segments()
            .iter()
            .fold(self, |node, segment| node.child_mut(segment.clone()))
    }

    /// Store an entry at the node matching its path.
    pub fn insert(&mut self, entry: ErrorEntry) {
        let node = self.at_mut(&entry.path.clone());
        node.errors.push(entry);
    }

    /// Every entry below and including this node, depth first.
    pub fn flatten(&self) -> Vec<&ErrorEntry> {
        let mut out: Vec<&ErrorEntry> = self.errors.iter().collect();
        for child in self.children.values() {
            out.extend(child.flatten());
        }
        out
    }

    /// Number of entries in this node and below.
    pub fn len(&self) -> usize {
        self.errors.len() + self.children.values().map(ErrorTree::len).sum::<usize>()
    }

    /// True when no entry exists anywhere in the tree.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nested `{"__errors": [...], "<child>": {...}}` document.
    ///
    /// Nodes without any entry below them are left out.
    pub fn to_error_schema(&self) -> Value {
        let mut node = Map::new();
        if !self.errors.is_empty() {
            let messages = self.errors.iter().map(|e| json!(e.message)).collect();
            node.insert(ERRORS_KEY.to_string(), Value::Array(messages));
        }
        for (segment, child) in &self.children {
            if !child.is_empty() {
                node.insert(segment.to_string(), child.to_error_schema());
            }
        }
        Value::Object(node)
    }
}

/// Validate form data against the root schema and build the error tree.
///
/// When `custom` is given it receives the validator's tree and its return
/// value is the result.
///
/// # Errors
///
/// Returns `SchemaError::InvalidSchema` if the validator cannot compile the schema.
pub fn validate_form_data(
    root: &Value,
    data: &Value,
    custom: Option<&CustomValidator>,
) -> Result<ErrorTree, SchemaError> {
    let validator = jsonschema::options()
        .with_draft(jsonschema::Draft::Draft7)
        .build(root)
        .map_err(|e| SchemaError::InvalidSchema {
            path: "#".to_string(),
            message: e.to_string(),
        })?;

    let mut tree = ErrorTree::new();
    for error in validator.iter_errors(data) {
        let schema_path = error.schema_path.to_string();
        let tokens = pointer_tokens(&error.instance_path.to_string());
        let mut path = data_path(root, data, &tokens);

        let keyword = pointer_tokens(&schema_path)
            .pop()
            .unwrap_or_default();
        if let ValidationErrorKind::Required { property } = &error.kind {
            if let Some(name) = property.as_str() {
                path = path.key(name);
            }
        }
        let params = error_params(root, &schema_path, &keyword, &error.kind);

        tree.insert(ErrorEntry {
            path,
            keyword,
            message: error.to_string(),
            params,
            source: ErrorSource::Validator,
        });
    }
    debug!("validation produced {} error(s)", tree.len());

    Ok(match custom {
        Some(custom) => custom(data, tree),
        None => tree,
    })
}

/// Convert instance pointer tokens into a data path by walking the schema.
///
/// A numeric token is an index when the data there is an array, or when the
/// governing schema is an array schema.
fn data_path(root: &Value, data: &Value, tokens: &[String]) -> IdPath {
    let mut path = IdPath::root();
    let mut schema = resolve(root, root, Some(data)).ok();
    let mut current = Some(data);

    for token in tokens {
        let is_array = matches!(current, Some(Value::Array(_)))
            || schema
                .as_ref()
                .map_or(false, |s| SchemaKind::of(s) == SchemaKind::Array);
        let segment = match token.parse::<usize>() {
            Ok(index) if is_array => PathSegment::Index(index),
            _ => PathSegment::Key(token.clone()),
        };

        current = current.and_then(|d| segment.lookup(d));
        let sub = schema.as_ref().and_then(|s| match &segment {
            PathSegment::Key(key) => property_schema(s, key),
            PathSegment::Index(i) => {
                ArrayShape::of(s).and_then(|shape| shape.item_schema(*i).cloned())
            }
        });
        schema = sub.and_then(|sub| resolve(&sub, root, current).ok());
        path = path.child(segment);
    }
    path
}

/// Parameters of an error, read from the keyword's value in the schema.
fn error_params(
    root: &Value,
    schema_path: &str,
    keyword: &str,
    kind: &ValidationErrorKind,
) -> Map<String, Value> {
    let mut params = Map::new();
    if let ValidationErrorKind::Required { property } = kind {
        params.insert("missingProperty".to_string(), property.clone());
        return params;
    }

    let Some(value) = keyword_value(root, schema_path) else {
        return params;
    };
    let name = match keyword {
        "minItems" | "maxItems" | "minLength" | "maxLength" | "minProperties"
        | "maxProperties" | "minimum" | "maximum" | "exclusiveMinimum"
        | "exclusiveMaximum" => "limit",
        "enum" => "allowedValues",
        "const" => "allowedValue",
        other => other,
    };
    params.insert(name.to_string(), value);
    params
}

/// Value at a validator schema path, following `$ref` hops recorded in it.
fn keyword_value(root: &Value, schema_path: &str) -> Option<Value> {
    let mut current = root;
    for token in pointer_tokens(schema_path) {
        current = if token == "$ref" {
            let reference = current.get("$ref")?.as_str()?;
            navigate_fragment(root, reference)?
        } else {
            match current {
                Value::Object(map) => map.get(&token)?,
                Value::Array(arr) => arr.get(token.parse::<usize>().ok()?)?,
                _ => return None,
            }
        };
    }
    Some(current.clone())
}

fn pointer_tokens(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|t| t.replace("~1", "/").replace("~0", "~"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // === Error Tree Tests ===

    #[test]
    fn add_error_at_nested_paths() {
        let mut tree = ErrorTree::new();
        tree.add_error("container");
        tree.field_mut("list").item_mut(2).add_error("bad item");

        assert_eq!(tree.messages(), vec!["container"]);
        let item = tree.at(&IdPath::root().key("list").index(2)).unwrap();
        assert_eq!(item.messages(), vec!["bad item"]);
        assert_eq!(item.errors()[0].path, IdPath::root().key("list").index(2));
        assert_eq!(item.errors()[0].source, ErrorSource::Custom);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn error_schema_export() {
        let mut tree = ErrorTree::new();
        tree.add_error("top");
        tree.field_mut("foo").add_error("missing");
        tree.field_mut("empty");

        assert_eq!(
            tree.to_error_schema(),
            json!({ "__errors": ["top"], "foo": { "__errors": ["missing"] } })
        );
    }

    #[test]
    fn empty_tree() {
        let mut tree = ErrorTree::new();
        tree.field_mut("foo").item_mut(0);
        assert!(tree.is_empty());
        assert!(tree.flatten().is_empty());
    }

    // === Validation Tests ===

    #[test]
    fn valid_data_has_no_errors() {
        let schema = json!({ "type": "object", "properties": { "name": { "type": "string" } } });
        let tree = validate_form_data(&schema, &json!({ "name": "x" }), None).unwrap();
        assert!(tree.is_empty());
    }

    #[test]
    fn type_error_lands_on_field() {
        let schema = json!({ "type": "object", "properties": { "foo": { "type": "string" } } });
        let tree = validate_form_data(&schema, &json!({ "foo": 42 }), None).unwrap();

        let foo = tree.field("foo").unwrap();
        assert_eq!(foo.errors().len(), 1);
        assert_eq!(foo.errors()[0].keyword, "type");
        assert_eq!(foo.errors()[0].params["type"], json!("string"));
        assert_eq!(foo.errors()[0].source, ErrorSource::Validator);
    }

    #[test]
    fn required_error_points_at_missing_property() {
        let schema = json!({
            "type": "object",
            "required": ["name"],
            "properties": { "name": { "type": "string" } }
        });
        let tree = validate_form_data(&schema, &json!({}), None).unwrap();
        let name = tree.field("name").unwrap();
        assert_eq!(name.errors()[0].keyword, "required");
        assert_eq!(name.errors()[0].params["missingProperty"], json!("name"));
    }

    #[test]
    fn array_indices_become_index_segments() {
        let schema = json!({
            "type": "object",
            "properties": {
                "list": { "type": "array", "items": { "type": "string", "minLength": 2 } }
            }
        });
        let data = json!({ "list": ["ok", "x"] });
        let tree = validate_form_data(&schema, &data, None).unwrap();

        let entry = &tree.flatten()[0];
        assert_eq!(entry.path, IdPath::root().key("list").index(1));
        assert_eq!(entry.params["limit"], json!(2));
    }

    #[test]
    fn multi_type_array_indices_become_index_segments() {
        let schema = json!({
            "type": "object",
            "properties": {
                "list": {
                    "type": ["array", "string"],
                    "items": { "type": "string", "minLength": 2 }
                }
            }
        });
        let tree = validate_form_data(&schema, &json!({ "list": ["x"] }), None).unwrap();

        let item = tree.field("list").and_then(|list| list.item(0)).unwrap();
        assert_eq!(item.errors()[0].keyword, "minLength");
        assert_eq!(item.errors()[0].path, IdPath::root().key("list").index(0));
    }

    #[test]
    fn numeric_property_names_stay_keys() {
        let schema = json!({
            "type": "object",
            "properties": { "2024": { "type": "integer" } }
        });
        let tree = validate_form_data(&schema, &json!({ "2024": "x" }), None).unwrap();
        assert!(tree.field("2024").is_some());
    }

    #[test]
    fn params_follow_refs() {
        let schema = json!({
            "definitions": { "short": { "type": "string", "maxLength": 3 } },
            "type": "object",
            "properties": { "code": { "$ref": "#/definitions/short" } }
        });
        let tree = validate_form_data(&schema, &json!({ "code": "toolong" }), None).unwrap();
        let code = tree.field("code").unwrap();
        assert_eq!(code.errors()[0].keyword, "maxLength");
        assert_eq!(code.errors()[0].params["limit"], json!(3));
    }

    #[test]
    fn custom_validation_adds_errors() {
        let schema = json!({ "type": "object", "properties": { "foo": { "type": "string" } } });
        let custom = |_: &Value, mut tree: ErrorTree| {
            tree.add_error("container");
            tree
        };
        let tree = validate_form_data(&schema, &json!({ "foo": 1 }), Some(&custom)).unwrap();

        assert_eq!(tree.messages(), vec!["container"]);
        assert_eq!(tree.field("foo").unwrap().errors().len(), 1);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn invalid_schema_rejected() {
        let schema = json!({ "type": 12 });
        assert!(matches!(
            validate_form_data(&schema, &json!(null), None),
            Err(SchemaError::InvalidSchema { .. })
        ));
    }
}
