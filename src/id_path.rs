//! Data paths and the field id strings derived from them.
//!
//! A path is the sequence of property names and array indices addressing a
//! value inside the form data. Its id joins a root segment and every path
//! segment with a fixed separator: `[foo, 0, bar]` becomes `root_foo_0_bar`.
//!
//! The id must read back to exactly one path, so property names that contain
//! the separator, are empty, or consist only of digits are rejected.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::IdError;
use crate::resolver::{resolve_traced, ArrayShape};
use crate::types::{FormOptions, SchemaKind, DEFAULT_ID_PREFIX, DEFAULT_ID_SEPARATOR};

/// One step of a data path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl PathSegment {
    /// Look up this segment inside a data value.
    pub fn lookup<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        match (self, value) {
            (PathSegment::Key(key), Value::Object(map)) => map.get(key),
            (PathSegment::Index(i), Value::Array(arr)) => arr.get(*i),
            _ => None,
        }
    }

    fn lookup_mut<'v>(&self, value: &'v mut Value) -> Option<&'v mut Value> {
        match (self, value) {
            (PathSegment::Key(key), Value::Object(map)) => map.get_mut(key),
            (PathSegment::Index(i), Value::Array(arr)) => arr.get_mut(*i),
            _ => None,
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(i) => write!(f, "{}", i),
        }
    }
}

/// Address of a value inside the form data. The empty path is the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdPath(Vec<PathSegment>);

impl IdPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Extend with a property name.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.0.push(PathSegment::Key(key.into()));
        self
    }

    /// Extend with an array index.
    pub fn index(mut self, index: usize) -> Self {
        self.0.push(PathSegment::Index(index));
        self
    }

    pub fn child(mut self, segment: impl Into<PathSegment>) -> Self {
        self.0.push(segment.into());
        self
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    /// Path of the containing value, `None` at the root.
    pub fn parent(&self) -> Option<IdPath> {
        let (_, head) = self.0.split_last()?;
        Some(IdPath(head.to_vec()))
    }

    /// Whether `self` equals `prefix` or lies below it.
    pub fn starts_with(&self, prefix: &IdPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Value at this path inside `data`.
    pub fn lookup<'v>(&self, data: &'v Value) -> Option<&'v Value> {
        self.0
            .iter()
            .try_fold(data, |current, segment| segment.lookup(current))
    }

    /// Mutable value at this path inside `data`.
    pub fn lookup_mut<'v>(&self, data: &'v mut Value) -> Option<&'v mut Value> {
        let mut current = data;
        for segment in &self.0 {
            current = segment.lookup_mut(current)?;
        }
        Some(current)
    }
}

impl From<Vec<PathSegment>> for IdPath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }
}

/// JSON Pointer rendering, used in messages.
impl fmt::Display for IdPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.0 {
            let text = segment.to_string().replace('~', "~0").replace('/', "~1");
            write!(f, "/{}", text)?;
        }
        Ok(())
    }
}

/// Root segment and separator used to turn paths into ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdScheme {
    prefix: String,
    separator: String,
}

impl Default for IdScheme {
    fn default() -> Self {
        Self::new(DEFAULT_ID_PREFIX, DEFAULT_ID_SEPARATOR)
    }
}

impl IdScheme {
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            separator: separator.into(),
        }
    }

    pub fn from_options(options: &FormOptions) -> Self {
        Self::new(options.id_prefix.clone(), options.id_separator.clone())
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Field id for a path.
    ///
    /// # Errors
    ///
    /// Returns `IdError::Collision` naming the first property name that
    /// could not be read back unambiguously.
    pub fn to_id(&self, path: &IdPath) -> Result<String, IdError> {
        if self.separator.is_empty() {
            return Err(IdError::Collision {
                segment: String::new(),
                reason: "the separator is empty",
            });
        }

        let mut id = self.prefix.clone();
        for segment in path.segments() {
            if let PathSegment::Key(key) = segment {
                self.check_key(key)?;
            }
            id.push_str(&self.separator);
            id.push_str(&segment.to_string());
        }

        // A multi-character separator can still be split differently when a
        // name starts or ends with part of it
        if self.to_path(&id).ok().as_ref() != Some(path) {
            let segment = path
                .segments()
                .iter()
                .find_map(|s| match s {
                    PathSegment::Key(key) if self.touches_separator(key) => Some(key.clone()),
                    _ => None,
                })
                .unwrap_or_else(|| path.to_string());
            return Err(IdError::Collision {
                segment,
                reason: "does not read back as the same path",
            });
        }
        Ok(id)
    }

    /// Path for an id produced by [`to_id`](Self::to_id).
    ///
    /// # Errors
    ///
    /// Returns `IdError::Malformed` if the id does not start with the prefix
    /// or contains an empty segment.
    pub fn to_path(&self, id: &str) -> Result<IdPath, IdError> {
        let malformed = || IdError::Malformed { id: id.to_string() };

        let rest = id.strip_prefix(self.prefix.as_str()).ok_or_else(malformed)?;
        if rest.is_empty() {
            return Ok(IdPath::root());
        }
        if self.separator.is_empty() {
            return Err(malformed());
        }
        let rest = rest
            .strip_prefix(self.separator.as_str())
            .ok_or_else(malformed)?;

        let mut segments = Vec::new();
        for part in rest.split(self.separator.as_str()) {
            if part.is_empty() {
                return Err(malformed());
            }
            let segment = if part.bytes().all(|b| b.is_ascii_digit()) {
                PathSegment::Index(part.parse().map_err(|_| malformed())?)
            } else {
                PathSegment::Key(part.to_string())
            };
            segments.push(segment);
        }
        Ok(IdPath(segments))
    }

    /// Id of the title element belonging to a field.
    pub fn title_id(&self, path: &IdPath) -> Result<String, IdError> {
        Ok(format!("{}{}", self.to_id(path)?, self.suffix("title")))
    }

    /// Id of the description element belonging to a field.
    pub fn description_id(&self, path: &IdPath) -> Result<String, IdError> {
        Ok(format!("{}{}", self.to_id(path)?, self.suffix("description")))
    }

    /// Ids of every field in the effective schema tree for `data`.
    ///
    /// Objects list their declared properties; arrays list one entry per
    /// element present in `data`. A name that collides with the scheme is
    /// reported for its own path while its siblings still get ids.
    pub fn id_map(&self, root: &Value, data: Option<&Value>) -> IdMap {
        let mut map = IdMap::default();
        self.collect(root, root, data, IdPath::root(), &[], &mut map);
        map
    }

    // Two separators in a row never occur in a field id, so suffixed ids
    // cannot read back as field paths.
    fn suffix(&self, token: &str) -> String {
        format!("{}{}{}", self.separator, self.separator, token)
    }

    fn touches_separator(&self, key: &str) -> bool {
        let sep = self.separator.as_str();
        (1..sep.len())
            .filter(|&n| sep.is_char_boundary(n))
            .any(|n| key.ends_with(&sep[..n]) || key.starts_with(&sep[n..]))
    }

    fn check_key(&self, key: &str) -> Result<(), IdError> {
        let reason = if key.is_empty() {
            "empty property name"
        } else if key.contains(self.separator.as_str()) {
            "contains the id separator"
        } else if key.bytes().all(|b| b.is_ascii_digit()) {
            "reads back as an array index"
        } else {
            return Ok(());
        };
        Err(IdError::Collision {
            segment: key.to_string(),
            reason,
        })
    }

    fn collect(
        &self,
        schema: &Value,
        root: &Value,
        data: Option<&Value>,
        path: IdPath,
        ancestors: &[String],
        map: &mut IdMap,
    ) {
        match self.to_id(&path) {
            Ok(id) => {
                map.ids.insert(id, path.clone());
            }
            Err(err) => {
                map.errors.push((path, err));
                return;
            }
        }

        // Unresolvable subtrees get an id but no children
        let Ok((resolved, trace)) = resolve_traced(schema, root, data) else {
            return;
        };
        if data.is_none() && trace.iter().any(|r| ancestors.contains(r)) {
            return;
        }
        let mut below = ancestors.to_vec();
        below.extend(trace);

        match SchemaKind::of(&resolved) {
            SchemaKind::Object => {
                let Some(Value::Object(props)) = resolved.get("properties") else {
                    return;
                };
                for (name, prop) in props {
                    let value = data.and_then(|d| d.get(name.as_str()));
                    let child = path.clone().key(name.as_str());
                    self.collect(prop, root, value, child, &below, map);
                }
            }
            SchemaKind::Array => {
                let (Some(shape), Some(elements)) =
                    (ArrayShape::of(&resolved), data.and_then(Value::as_array))
                else {
                    return;
                };
                for (i, element) in elements.iter().enumerate() {
                    let Some(item) = shape.item_schema(i) else {
                        continue;
                    };
                    let child = path.clone().index(i);
                    self.collect(item, root, Some(element), child, &below, map);
                }
            }
            _ => {}
        }
    }
}

/// Field ids of a form, plus the paths whose names could not be encoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdMap {
    pub ids: std::collections::BTreeMap<String, IdPath>,
    pub errors: Vec<(IdPath, IdError)>,
}

impl IdMap {
    /// Nested `{"$id": ..., "<child>": {...}}` document for the rendering layer.
    pub fn to_id_schema(&self) -> Value {
        let mut root = Map::new();
        'ids: for (id, path) in &self.ids {
            let mut node = &mut root;
            for segment in path.segments() {
                let entry = node
                    .entry(segment.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                // A property literally named "$id" cannot hold children
                let Value::Object(child) = entry else {
                    continue 'ids;
                };
                node = child;
            }
            node.insert("$id".to_string(), Value::String(id.clone()));
        }
        Value::Object(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn to_id_joins_segments() {
        let scheme = IdScheme::default();
        let path = IdPath::root().key("foo").index(0).key("bar");
        assert_eq!(scheme.to_id(&path).unwrap(), "root_foo_0_bar");
        assert_eq!(scheme.to_id(&IdPath::root()).unwrap(), "root");
    }

    #[test]
    fn to_path_inverts_to_id() {
        let scheme = IdScheme::default();
        let paths = [
            IdPath::root(),
            IdPath::root().key("foo"),
            IdPath::root().key("list").index(12).key("name"),
            IdPath::root().index(0).index(1),
            IdPath::root().key("camelCase").key("x2"),
        ];
        for path in paths {
            let id = scheme.to_id(&path).unwrap();
            assert_eq!(scheme.to_path(&id).unwrap(), path, "id {}", id);
        }
    }

    #[test]
    fn long_separator_round_trip() {
        let scheme = IdScheme::new("root", "__");
        let plain = IdPath::root().key("a").index(3).key("b_c");
        let id = scheme.to_id(&plain).unwrap();
        assert_eq!(id, "root__a__3__b_c");
        assert_eq!(scheme.to_path(&id).unwrap(), plain);

        for name in ["a_", "x_"] {
            let path = IdPath::root().key(name).key("b");
            assert!(
                matches!(scheme.to_id(&path), Err(IdError::Collision { ref segment, .. }) if segment == name),
                "name {:?}",
                name
            );
        }
    }

    #[test]
    fn custom_prefix_may_contain_separator() {
        let scheme = IdScheme::new("my_form", "_");
        let path = IdPath::root().key("email");
        let id = scheme.to_id(&path).unwrap();
        assert_eq!(id, "my_form_email");
        assert_eq!(scheme.to_path(&id).unwrap(), path);
    }

    #[test]
    fn colliding_names_rejected() {
        let scheme = IdScheme::default();
        for name in ["first_name", "", "42"] {
            let path = IdPath::root().key(name);
            assert!(
                matches!(scheme.to_id(&path), Err(IdError::Collision { .. })),
                "name {:?}",
                name
            );
        }
    }

    #[test]
    fn other_separator_allows_underscores() {
        let scheme = IdScheme::new("root", ".");
        let path = IdPath::root().key("first_name");
        let id = scheme.to_id(&path).unwrap();
        assert_eq!(id, "root.first_name");
        assert_eq!(scheme.to_path(&id).unwrap(), path);
    }

    #[test]
    fn to_path_rejects_foreign_ids() {
        let scheme = IdScheme::default();
        assert!(matches!(scheme.to_path("form_a"), Err(IdError::Malformed { .. })));
        assert!(matches!(scheme.to_path("rootfoo"), Err(IdError::Malformed { .. })));
        assert!(matches!(scheme.to_path("root_foo__title"), Err(IdError::Malformed { .. })));
    }

    #[test]
    fn title_and_description_ids() {
        let scheme = IdScheme::default();
        let path = IdPath::root().key("name");
        assert_eq!(scheme.title_id(&path).unwrap(), "root_name__title");
        assert_eq!(scheme.description_id(&path).unwrap(), "root_name__description");
    }

    #[test]
    fn path_lookup_and_display() {
        let data = json!({ "a": [ { "b/c": 1 } ] });
        let path = IdPath::root().key("a").index(0).key("b/c");
        assert_eq!(path.lookup(&data), Some(&json!(1)));
        assert_eq!(path.to_string(), "/a/0/b~1c");
        assert_eq!(IdPath::root().to_string(), "/");
        assert_eq!(path.parent(), Some(IdPath::root().key("a").index(0)));
    }

    #[test]
    fn path_serializes_as_segment_list() {
        let path = IdPath::root().key("a").index(2);
        assert_eq!(serde_json::to_value(&path).unwrap(), json!(["a", 2]));
        let back: IdPath = serde_json::from_value(json!(["a", 2])).unwrap();
        assert_eq!(back, path);
    }

    #[test]
    fn id_map_walks_properties_and_elements() {
        let schema = json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "tags": { "type": "array", "items": { "type": "string" } },
                "bad_name": { "type": "string" }
            }
        });
        let data = json!({ "tags": ["a", "b"] });
        let map = IdScheme::default().id_map(&schema, Some(&data));

        let ids: Vec<&str> = map.ids.keys().map(String::as_str).collect();
        assert_eq!(
            ids,
            vec!["root", "root_name", "root_tags", "root_tags_0", "root_tags_1"]
        );
        assert_eq!(map.errors.len(), 1);
        assert_eq!(map.errors[0].0, IdPath::root().key("bad_name"));
    }

    #[test]
    fn id_schema_nests_ids() {
        let schema = json!({
            "type": "object",
            "properties": { "address": { "type": "object", "properties": { "city": {} } } }
        });
        let map = IdScheme::default().id_map(&schema, None);
        assert_eq!(
            map.to_id_schema(),
            json!({
                "$id": "root",
                "address": { "$id": "root_address", "city": { "$id": "root_address_city" } }
            })
        );
    }
}
