//! Schema resolution - turns `$ref`, `allOf`, `dependencies` and
//! `oneOf`/`anyOf` into a concrete node the rest of the engine can inspect.
//!
//! Resolution is shallow: [`resolve`] produces the effective node for one
//! position in the data tree and leaves `properties` and `items` untouched.
//! [`resolve_tree`] walks the whole document on top of it.

use log::{debug, warn};
use serde_json::{json, Map, Value};

use crate::error::SchemaError;
use crate::id_path::{IdPath, PathSegment};
use crate::loader::navigate_fragment;
use crate::types::{SchemaKind, UNSUPPORTED_KEY};

static ANY_SCHEMA: Value = Value::Bool(true);

/// Resolve a schema node against its root document and the data at its position.
///
/// - `$ref` is replaced by the referenced node; sibling keywords override it.
/// - `allOf` branches are merged in.
/// - Schema-form `dependencies` are merged for every property present in `data`.
/// - `oneOf`/`anyOf` are replaced by the branch chosen by [`select_branch`].
///
/// # Errors
///
/// Returns `SchemaError::UnresolvedRef` for refs outside the root document,
/// `SchemaError::CyclicRef` when a ref reaches itself without structural
/// descent, and `SchemaError::InvalidSchema` for malformed keywords.
pub fn resolve(schema: &Value, root: &Value, data: Option<&Value>) -> Result<Value, SchemaError> {
    resolve_traced(schema, root, data).map(|(resolved, _)| resolved)
}

/// Pick the active `oneOf`/`anyOf` branch for `data`.
///
/// Returns the first branch whose `required` properties all exist in `data`.
/// Falls back to the first branch when nothing matches or `data` is not an object.
pub fn select_branch(
    branches: &[Value],
    root: &Value,
    data: Option<&Value>,
) -> Result<usize, SchemaError> {
    let mut stack = Vec::new();
    select_branch_inner(branches, root, data, &mut stack, &mut Vec::new())
}

/// Resolve every reachable node of a root schema for the given data.
///
/// Properties, tuple positions and `additionalItems` are descended. List
/// `items` are resolved without data. A subtree that cannot be resolved is
/// replaced by `{"$unsupported": "<reason>"}`. A recursive `$ref` met again
/// below itself is only expanded while data exists at that position.
pub fn resolve_tree(root: &Value, data: Option<&Value>) -> Value {
    build_tree(root, root, data, &[])
}

/// Find and resolve the schema governing the value at `path`.
pub fn schema_for_path(
    root: &Value,
    path: &IdPath,
    data: Option<&Value>,
) -> Result<Value, SchemaError> {
    let mut schema = resolve(root, root, data)?;
    let mut current = data;
    let mut walked = IdPath::root();

    for segment in path.segments() {
        walked = walked.child(segment.clone());
        current = current.and_then(|d| segment.lookup(d));

        let sub = match segment {
            PathSegment::Key(key) => property_schema(&schema, key),
            PathSegment::Index(i) => {
                ArrayShape::of(&schema).and_then(|shape| shape.item_schema(*i).cloned())
            }
        }
        .ok_or_else(|| SchemaError::InvalidSchema {
            path: walked.to_string(),
            message: "no schema governs this position".to_string(),
        })?;

        schema = resolve(&sub, root, current)?;
    }

    Ok(schema)
}

/// How an array schema lays out its items.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArrayShape<'a> {
    /// One `items` schema for every element.
    List { items: &'a Value },
    /// One schema per fixed position, optionally followed by `additionalItems`.
    Tuple {
        items: &'a [Value],
        additional: Option<&'a Value>,
    },
}

impl<'a> ArrayShape<'a> {
    /// Read the item layout of a resolved array schema.
    ///
    /// Returns `None` when the node is not an array schema.
    pub fn of(schema: &'a Value) -> Option<Self> {
        if SchemaKind::of(schema) != SchemaKind::Array {
            return None;
        }
        match schema.get("items") {
            Some(Value::Array(items)) => {
                let additional = match schema.get("additionalItems") {
                    None | Some(Value::Bool(false)) => None,
                    Some(Value::Bool(true)) => Some(&ANY_SCHEMA),
                    Some(other) => Some(other),
                };
                Some(ArrayShape::Tuple { items, additional })
            }
            Some(items) => Some(ArrayShape::List { items }),
            None => Some(ArrayShape::List { items: &ANY_SCHEMA }),
        }
    }

    /// Schema for the element at `index`, if any is permitted there.
    pub fn item_schema(&self, index: usize) -> Option<&'a Value> {
        match *self {
            ArrayShape::List { items } => Some(items),
            ArrayShape::Tuple { items, additional } => items.get(index).or(additional),
        }
    }

    /// Number of fixed positions (zero in list mode).
    pub fn fixed_len(&self) -> usize {
        match *self {
            ArrayShape::List { .. } => 0,
            ArrayShape::Tuple { items, .. } => items.len(),
        }
    }

    /// Whether elements can exist past the fixed positions.
    pub fn is_open(&self) -> bool {
        match *self {
            ArrayShape::List { .. } => true,
            ArrayShape::Tuple { additional, .. } => additional.is_some(),
        }
    }

    /// Whether `items` is a sequence of per-position schemas.
    pub fn is_tuple(&self) -> bool {
        matches!(self, ArrayShape::Tuple { .. })
    }
}

/// Merge `source` into `target`.
///
/// Object-valued keywords merge recursively, `required` lists are unioned,
/// and for any other keyword the value already in `target` wins.
pub fn merge_schemas(target: &Value, source: &Value) -> Value {
    let (Some(target_map), Some(source_map)) = (target.as_object(), source.as_object()) else {
        return target.clone();
    };

    let mut result = target_map.clone();
    for (key, value) in source_map {
        match (key.as_str(), result.get(key), value) {
            ("required", Some(Value::Array(existing)), Value::Array(extra)) => {
                let mut union = existing.clone();
                for name in extra {
                    if !union.contains(name) {
                        union.push(name.clone());
                    }
                }
                result.insert(key.clone(), Value::Array(union));
            }
            (_, Some(existing @ Value::Object(_)), Value::Object(_)) => {
                let merged = merge_schemas(existing, value);
                result.insert(key.clone(), merged);
            }
            (_, Some(_), _) => {}
            (_, None, _) => {
                result.insert(key.clone(), value.clone());
            }
        }
    }
    Value::Object(result)
}

/// Property schema of a resolved object node, falling back to `additionalProperties`.
pub(crate) fn property_schema(schema: &Value, key: &str) -> Option<Value> {
    if !matches!(SchemaKind::of(schema), SchemaKind::Object | SchemaKind::Any) {
        return None;
    }
    if let Some(prop) = schema.get("properties").and_then(|p| p.get(key)) {
        return Some(prop.clone());
    }
    match schema.get("additionalProperties") {
        Some(Value::Bool(false)) => None,
        None | Some(Value::Bool(true)) => Some(json!({})),
        Some(other) => Some(other.clone()),
    }
}

/// Resolve and also report every `$ref` followed on the way.
pub(crate) fn resolve_traced(
    schema: &Value,
    root: &Value,
    data: Option<&Value>,
) -> Result<(Value, Vec<String>), SchemaError> {
    let mut stack = Vec::new();
    let mut trace = Vec::new();
    let resolved = resolve_inner(schema, root, data, &mut stack, &mut trace)?;
    Ok((resolved, trace))
}

/// Marker node standing in for an unresolvable subtree.
pub(crate) fn unsupported(err: &SchemaError) -> Value {
    json!({ UNSUPPORTED_KEY: err.to_string() })
}

// --- Internal implementation ---

fn resolve_inner(
    schema: &Value,
    root: &Value,
    data: Option<&Value>,
    stack: &mut Vec<String>,
    trace: &mut Vec<String>,
) -> Result<Value, SchemaError> {
    if schema.get("$ref").is_some() {
        let (target, hops) = deref(schema, root, stack, trace)?;
        let resolved = resolve_inner(&target, root, data, stack, trace);
        stack.truncate(stack.len() - hops);
        return resolved;
    }

    let Some(map) = schema.as_object() else {
        return Ok(schema.clone());
    };
    let mut node = map.clone();

    if let Some(all_of) = node.remove("allOf") {
        let branches = as_branches(&all_of, "allOf")?;
        let mut merged = Value::Object(node);
        for branch in branches {
            let branch = resolve_inner(branch, root, data, stack, trace)?;
            merged = merge_schemas(&merged, &branch);
        }
        // Branches may have contributed dependencies or oneOf of their own
        return resolve_inner(&merged, root, data, stack, trace);
    }

    if let Some(Value::Object(values)) = data {
        if let Some(Value::Object(deps)) = node.get("dependencies").cloned() {
            let mut remaining = Map::new();
            let mut merged = Value::Object(node.clone());
            for (key, dependency) in deps {
                if dependency.is_array() || !values.contains_key(&key) {
                    remaining.insert(key, dependency);
                    continue;
                }
                debug!("merging dependent schema for \"{}\"", key);
                merged = merge_dependency(&merged, &key, &dependency, root, data, stack, trace)?;
            }
            node = match merged {
                Value::Object(m) => m,
                _ => node,
            };
            if remaining.is_empty() {
                node.remove("dependencies");
            } else {
                node.insert("dependencies".to_string(), Value::Object(remaining));
            }
        }
    }

    for keyword in ["oneOf", "anyOf"] {
        if let Some(alternatives) = node.remove(keyword) {
            let branches = as_branches(&alternatives, keyword)?;
            let index = select_branch_inner(branches, root, data, stack, trace)?;
            debug!("{} selected branch {}", keyword, index);
            let branch = resolve_inner(&branches[index], root, data, stack, trace)?;
            let merged = merge_schemas(&Value::Object(node), &branch);
            return resolve_inner(&merged, root, data, stack, trace);
        }
    }

    Ok(Value::Object(node))
}

/// Follow a `$ref` chain, merging sibling keywords over each target.
///
/// Returns the dereferenced node and how many refs were pushed on `stack`.
fn deref(
    schema: &Value,
    root: &Value,
    stack: &mut Vec<String>,
    trace: &mut Vec<String>,
) -> Result<(Value, usize), SchemaError> {
    let mut current = schema.clone();
    let mut hops = 0;

    while let Some(reference) = current.get("$ref") {
        let Some(reference) = reference.as_str().map(str::to_string) else {
            stack.truncate(stack.len() - hops);
            return Err(SchemaError::InvalidSchema {
                path: "$ref".to_string(),
                message: "expected a string".to_string(),
            });
        };

        if stack.contains(&reference) {
            let mut chain = stack.clone();
            chain.push(reference);
            stack.truncate(stack.len() - hops);
            return Err(SchemaError::CyclicRef { chain });
        }

        let Some(target) = lookup_ref(&reference, root) else {
            stack.truncate(stack.len() - hops);
            return Err(SchemaError::UnresolvedRef { reference });
        };

        let mut merged = match target {
            Value::Object(target_map) => target_map.clone(),
            _ => Map::new(),
        };
        if let Value::Object(siblings) = &current {
            for (k, v) in siblings {
                if k != "$ref" {
                    merged.insert(k.clone(), v.clone());
                }
            }
        }

        stack.push(reference.clone());
        trace.push(reference);
        hops += 1;
        current = Value::Object(merged);
    }

    Ok((current, hops))
}

/// `$ref` targets must live inside the root document.
fn lookup_ref<'a>(reference: &str, root: &'a Value) -> Option<&'a Value> {
    if !reference.starts_with('#') {
        return None;
    }
    navigate_fragment(root, reference)
}

fn select_branch_inner(
    branches: &[Value],
    root: &Value,
    data: Option<&Value>,
    stack: &mut Vec<String>,
    trace: &mut Vec<String>,
) -> Result<usize, SchemaError> {
    if branches.is_empty() {
        return Err(SchemaError::InvalidSchema {
            path: "oneOf".to_string(),
            message: "no branches to choose from".to_string(),
        });
    }
    let Some(Value::Object(values)) = data else {
        return Ok(0);
    };

    for (index, branch) in branches.iter().enumerate() {
        let (branch, hops) = deref(branch, root, stack, trace)?;
        stack.truncate(stack.len() - hops);

        let satisfied = branch
            .get("required")
            .and_then(Value::as_array)
            .map(|required| {
                required
                    .iter()
                    .filter_map(Value::as_str)
                    .all(|name| values.contains_key(name))
            })
            .unwrap_or(true);
        if satisfied {
            return Ok(index);
        }
    }
    Ok(0)
}

/// Merge a schema-form dependency for `key`.
///
/// A dependency carrying `oneOf` contributes the branch whose declaration of
/// `key` admits the current value.
fn merge_dependency(
    node: &Value,
    key: &str,
    dependency: &Value,
    root: &Value,
    data: Option<&Value>,
    stack: &mut Vec<String>,
    trace: &mut Vec<String>,
) -> Result<Value, SchemaError> {
    let (dependency, hops) = deref(dependency, root, stack, trace)?;
    let mut dependency = match dependency {
        Value::Object(map) => map,
        _ => {
            stack.truncate(stack.len() - hops);
            return Ok(node.clone());
        }
    };
    let one_of = dependency.remove("oneOf");

    let result = (|| -> Result<Value, SchemaError> {
        let resolved = resolve_inner(&Value::Object(dependency), root, data, stack, trace)?;
        let mut merged = merge_schemas(node, &resolved);

        let Some(one_of) = one_of else {
            return Ok(merged);
        };
        let value = data.and_then(|d| d.get(key));
        for branch in as_branches(&one_of, "oneOf")? {
            let (branch, branch_hops) = deref(branch, root, stack, trace)?;
            stack.truncate(stack.len() - branch_hops);

            let declared = branch.get("properties").and_then(|p| p.get(key));
            if !admits(declared, value) {
                continue;
            }
            let mut branch = branch;
            if let Some(Value::Object(props)) = branch.get_mut("properties") {
                props.remove(key);
            }
            let branch = resolve_inner(&branch, root, data, stack, trace)?;
            merged = merge_schemas(&merged, &branch);
            return Ok(merged);
        }
        debug!("no dependency branch admits the value of \"{}\"", key);
        Ok(merged)
    })();

    stack.truncate(stack.len() - hops);
    result
}

/// Static `enum`/`const` check used to pick dependency branches.
fn admits(declared: Option<&Value>, value: Option<&Value>) -> bool {
    let (Some(declared), Some(value)) = (declared, value) else {
        return false;
    };
    if let Some(options) = declared.get("enum").and_then(Value::as_array) {
        return options.contains(value);
    }
    if let Some(constant) = declared.get("const") {
        return constant == value;
    }
    false
}

fn as_branches<'v>(value: &'v Value, keyword: &str) -> Result<&'v Vec<Value>, SchemaError> {
    value.as_array().ok_or_else(|| SchemaError::InvalidSchema {
        path: keyword.to_string(),
        message: "expected an array of schemas".to_string(),
    })
}

fn build_tree(schema: &Value, root: &Value, data: Option<&Value>, ancestors: &[String]) -> Value {
    let (mut resolved, trace) = match resolve_traced(schema, root, data) {
        Ok(result) => result,
        Err(err) => {
            warn!("replacing unresolvable subtree: {}", err);
            return unsupported(&err);
        }
    };

    if data.is_none() && trace.iter().any(|r| ancestors.contains(r)) {
        // Recursive definition with nothing below it: leave it for lazy resolution
        return schema.clone();
    }
    let mut below: Vec<String> = ancestors.to_vec();
    below.extend(trace);

    match SchemaKind::of(&resolved) {
        SchemaKind::Object => {
            if let Some(Value::Object(props)) = resolved.get_mut("properties") {
                for (name, prop) in props.iter_mut() {
                    let value = data.and_then(|d| d.get(name.as_str()));
                    *prop = build_tree(prop, root, value, &below);
                }
            }
            if let Some(additional @ Value::Object(_)) = resolved.get_mut("additionalProperties") {
                *additional = build_tree(additional, root, None, &below);
            }
        }
        SchemaKind::Array => {
            let elements = data.and_then(Value::as_array);
            let tuple = resolved.get("items").map_or(false, Value::is_array);
            if tuple {
                if let Some(Value::Array(items)) = resolved.get_mut("items") {
                    for (i, item) in items.iter_mut().enumerate() {
                        let value = elements.and_then(|e| e.get(i));
                        *item = build_tree(item, root, value, &below);
                    }
                }
                if let Some(additional @ Value::Object(_)) = resolved.get_mut("additionalItems") {
                    *additional = build_tree(additional, root, None, &below);
                }
            } else if let Some(items @ Value::Object(_)) = resolved.get_mut("items") {
                *items = build_tree(items, root, None, &below);
            }
        }
        _ => {}
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    // === $ref Tests ===

    #[test]
    fn resolve_ref_from_definitions() {
        let root = json!({
            "definitions": {
                "name": { "type": "string", "title": "Name" }
            },
            "$ref": "#/definitions/name"
        });
        let resolved = resolve(&root, &root, None).unwrap();
        assert_eq!(resolved["type"], "string");
        assert_eq!(resolved["title"], "Name");
        assert!(resolved.get("$ref").is_none());
    }

    #[test]
    fn resolve_ref_siblings_override() {
        let root = json!({
            "definitions": {
                "name": { "type": "string", "title": "Name" }
            }
        });
        let schema = json!({ "$ref": "#/definitions/name", "title": "Nickname" });
        let resolved = resolve(&schema, &root, None).unwrap();
        assert_eq!(resolved["title"], "Nickname");
        assert_eq!(resolved["type"], "string");
    }

    #[test]
    fn resolve_ref_chain() {
        let root = json!({
            "definitions": {
                "a": { "$ref": "#/definitions/b" },
                "b": { "type": "integer" }
            }
        });
        let schema = json!({ "$ref": "#/definitions/a" });
        assert_eq!(resolve(&schema, &root, None).unwrap(), json!({ "type": "integer" }));
    }

    #[test]
    fn resolve_unresolved_ref_errors() {
        let root = json!({ "definitions": {} });
        let schema = json!({ "$ref": "#/definitions/missing" });
        assert!(matches!(
            resolve(&schema, &root, None),
            Err(SchemaError::UnresolvedRef { reference }) if reference == "#/definitions/missing"
        ));
    }

    #[test]
    fn resolve_external_ref_errors() {
        let root = json!({});
        let schema = json!({ "$ref": "other.json#/definitions/x" });
        assert!(matches!(
            resolve(&schema, &root, None),
            Err(SchemaError::UnresolvedRef { .. })
        ));
    }

    #[test]
    fn resolve_cyclic_ref_errors() {
        let root = json!({
            "definitions": {
                "a": { "$ref": "#/definitions/b" },
                "b": { "$ref": "#/definitions/a" }
            }
        });
        let schema = json!({ "$ref": "#/definitions/a" });
        match resolve(&schema, &root, None) {
            Err(SchemaError::CyclicRef { chain }) => {
                assert_eq!(
                    chain,
                    vec!["#/definitions/a", "#/definitions/b", "#/definitions/a"]
                );
            }
            other => panic!("expected cyclic ref, got {:?}", other),
        }
    }

    #[test]
    fn resolve_cycle_through_all_of_errors() {
        let root = json!({
            "definitions": {
                "a": { "allOf": [{ "$ref": "#/definitions/a" }] }
            }
        });
        let schema = json!({ "$ref": "#/definitions/a" });
        assert!(matches!(
            resolve(&schema, &root, None),
            Err(SchemaError::CyclicRef { .. })
        ));
    }

    #[test]
    fn resolve_recursion_through_properties_is_fine() {
        let root = json!({
            "definitions": {
                "node": {
                    "type": "object",
                    "properties": {
                        "children": { "type": "array", "items": { "$ref": "#/definitions/node" } }
                    }
                }
            },
            "$ref": "#/definitions/node"
        });
        let resolved = resolve(&root, &root, None).unwrap();
        assert_eq!(resolved["type"], "object");
    }

    // === allOf / dependencies / oneOf Tests ===

    #[test]
    fn resolve_all_of_merges() {
        let schema = json!({
            "allOf": [
                { "type": "object", "properties": { "a": { "type": "string" } }, "required": ["a"] },
                { "properties": { "b": { "type": "number" } }, "required": ["b"] }
            ]
        });
        let resolved = resolve(&schema, &schema, None).unwrap();
        assert_eq!(resolved["type"], "object");
        assert!(resolved["properties"].get("a").is_some());
        assert!(resolved["properties"].get("b").is_some());
        assert_eq!(resolved["required"], json!(["a", "b"]));
    }

    #[test]
    fn resolve_dependencies_merged_when_present() {
        let schema = json!({
            "type": "object",
            "properties": { "credit_card": { "type": "number" } },
            "dependencies": {
                "credit_card": {
                    "properties": { "billing_address": { "type": "string" } },
                    "required": ["billing_address"]
                }
            }
        });

        let without = resolve(&schema, &schema, Some(&json!({}))).unwrap();
        assert!(without["properties"].get("billing_address").is_none());

        let with = resolve(&schema, &schema, Some(&json!({ "credit_card": 1 }))).unwrap();
        assert!(with["properties"].get("billing_address").is_some());
        assert_eq!(with["required"], json!(["billing_address"]));
        assert!(with.get("dependencies").is_none());
    }

    #[test]
    fn resolve_property_list_dependencies_left_alone() {
        let schema = json!({
            "type": "object",
            "dependencies": { "a": ["b"] }
        });
        let resolved = resolve(&schema, &schema, Some(&json!({ "a": 1 }))).unwrap();
        assert_eq!(resolved["dependencies"], json!({ "a": ["b"] }));
    }

    #[test]
    fn resolve_dependency_one_of_picks_by_value() {
        let schema = json!({
            "type": "object",
            "properties": { "kind": { "enum": ["dog", "cat"] } },
            "dependencies": {
                "kind": {
                    "oneOf": [
                        { "properties": { "kind": { "enum": ["dog"] }, "barks": { "type": "boolean" } } },
                        { "properties": { "kind": { "enum": ["cat"] }, "meows": { "type": "boolean" } } }
                    ]
                }
            }
        });
        let resolved = resolve(&schema, &schema, Some(&json!({ "kind": "cat" }))).unwrap();
        assert!(resolved["properties"].get("meows").is_some());
        assert!(resolved["properties"].get("barks").is_none());
        assert_eq!(resolved["properties"]["kind"], json!({ "enum": ["dog", "cat"] }));
    }

    #[test]
    fn select_branch_by_required_keys() {
        let branches = vec![
            json!({ "required": ["email"] }),
            json!({ "required": ["phone"] }),
        ];
        let root = json!({});
        assert_eq!(select_branch(&branches, &root, Some(&json!({ "phone": "1" }))).unwrap(), 1);
        assert_eq!(select_branch(&branches, &root, Some(&json!({}))).unwrap(), 0);
        assert_eq!(select_branch(&branches, &root, None).unwrap(), 0);
    }

    #[test]
    fn resolve_one_of_merges_selected_branch() {
        let schema = json!({
            "type": "object",
            "oneOf": [
                { "properties": { "email": { "type": "string" } }, "required": ["email"] },
                { "properties": { "phone": { "type": "string" } }, "required": ["phone"] }
            ]
        });
        let resolved = resolve(&schema, &schema, Some(&json!({ "phone": "555" }))).unwrap();
        assert!(resolved["properties"].get("phone").is_some());
        assert!(resolved["properties"].get("email").is_none());
        assert!(resolved.get("oneOf").is_none());
    }

    // === ArrayShape Tests ===

    #[test]
    fn array_shape_list_and_tuple() {
        let list = json!({ "type": "array", "items": { "type": "string" } });
        let shape = ArrayShape::of(&list).unwrap();
        assert!(!shape.is_tuple());
        assert_eq!(shape.item_schema(10), Some(&json!({ "type": "string" })));

        let tuple = json!({
            "type": "array",
            "items": [{ "type": "string" }, { "type": "number" }],
            "additionalItems": { "type": "boolean" }
        });
        let shape = ArrayShape::of(&tuple).unwrap();
        assert_eq!(shape.fixed_len(), 2);
        assert!(shape.is_open());
        assert_eq!(shape.item_schema(1), Some(&json!({ "type": "number" })));
        assert_eq!(shape.item_schema(5), Some(&json!({ "type": "boolean" })));
    }

    #[test]
    fn array_shape_closed_tuple() {
        let tuple = json!({ "type": "array", "items": [{ "type": "string" }] });
        let shape = ArrayShape::of(&tuple).unwrap();
        assert!(!shape.is_open());
        assert_eq!(shape.item_schema(1), None);

        let tuple = json!({ "type": "array", "items": [{}], "additionalItems": false });
        assert!(!ArrayShape::of(&tuple).unwrap().is_open());
    }

    // === Tree / Path Tests ===

    #[test]
    fn resolve_tree_marks_unsupported_subtree_only() {
        let root = json!({
            "type": "object",
            "properties": {
                "good": { "type": "string" },
                "bad": { "$ref": "#/definitions/missing" }
            }
        });
        let tree = resolve_tree(&root, None);
        assert_eq!(tree["properties"]["good"], json!({ "type": "string" }));
        assert!(tree["properties"]["bad"].get(UNSUPPORTED_KEY).is_some());
    }

    #[test]
    fn resolve_tree_stops_recursion_without_data() {
        let root = json!({
            "definitions": {
                "node": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "child": { "$ref": "#/definitions/node" }
                    }
                }
            },
            "$ref": "#/definitions/node"
        });
        let tree = resolve_tree(&root, None);
        assert_eq!(tree["properties"]["child"], json!({ "$ref": "#/definitions/node" }));

        let data = json!({ "child": { "name": "leaf" } });
        let tree = resolve_tree(&root, Some(&data));
        assert_eq!(tree["properties"]["child"]["type"], "object");
        assert_eq!(
            tree["properties"]["child"]["properties"]["child"],
            json!({ "$ref": "#/definitions/node" })
        );
    }

    #[test]
    fn schema_for_nested_path() {
        let root = json!({
            "type": "object",
            "properties": {
                "list": {
                    "type": "array",
                    "items": { "$ref": "#/definitions/item" }
                }
            },
            "definitions": {
                "item": { "type": "object", "properties": { "label": { "type": "string" } } }
            }
        });
        let path = IdPath::root().key("list").index(0).key("label");
        assert_eq!(
            schema_for_path(&root, &path, None).unwrap(),
            json!({ "type": "string" })
        );

        let bad = IdPath::root().key("list").key("label");
        assert!(matches!(
            schema_for_path(&root, &bad, None),
            Err(SchemaError::InvalidSchema { .. })
        ));
    }

    #[test]
    fn merge_target_wins_for_scalars() {
        let merged = merge_schemas(
            &json!({ "title": "A", "required": ["x"] }),
            &json!({ "title": "B", "required": ["x", "y"], "type": "object" }),
        );
        assert_eq!(merged, json!({ "title": "A", "required": ["x", "y"], "type": "object" }));
    }
}
