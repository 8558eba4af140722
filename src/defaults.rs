//! Default form data.
//!
//! Merges schema defaults with data the caller already has. Existing data
//! always wins; schema defaults only fill gaps. The computation is pure and
//! deterministic, and running it on its own output changes nothing.
//!
//! # Array padding
//!
//! A list-mode array is padded up to `minItems`. Each padded slot prefers, in
//! order, the existing element, the array-level `default` entry, and the item
//! schema's own default (or a placeholder for the item type). Multi-select
//! arrays (`uniqueItems` over an `enum`) are never padded: a placeholder
//! selection would be invalid.

use log::{debug, warn};
use serde_json::{Map, Value};

use crate::arrays::is_multi_select;
use crate::error::SchemaError;
use crate::resolver::{resolve, resolve_traced, ArrayShape};
use crate::types::SchemaKind;

const MAX_PASSES: usize = 8;

/// Compute the default value for `schema`, seeded with `existing`.
///
/// Returns `None` when neither the data nor the schema provides a value.
/// `root` is the document `$ref`s resolve against.
///
/// # Errors
///
/// Returns `SchemaError` only when `schema` itself cannot be resolved. Nested
/// subtrees that fail to resolve keep their existing data and are logged.
pub fn compute_defaults(
    schema: &Value,
    root: &Value,
    existing: Option<&Value>,
) -> Result<Option<Value>, SchemaError> {
    // Filled-in data can select another oneOf/anyOf branch or dependency,
    // so repeat until the result stops changing.
    let mut current = defaults_pass(schema, root, existing)?;
    for _ in 0..MAX_PASSES {
        let next = defaults_pass(schema, root, current.as_ref())?;
        if next == current {
            return Ok(current);
        }
        current = next;
    }
    warn!("defaults did not settle after {} passes", MAX_PASSES);
    Ok(current)
}

/// Complete form data for a root schema: the defaults, or `null` when there are none.
pub fn default_form_data(root: &Value, existing: Option<&Value>) -> Result<Value, SchemaError> {
    Ok(compute_defaults(root, root, existing)?.unwrap_or(Value::Null))
}

/// Value for a brand-new array element governed by `item_schema`.
pub(crate) fn new_item(item_schema: &Value, root: &Value) -> Result<Value, SchemaError> {
    match compute_defaults(item_schema, root, None)? {
        Some(value) => Ok(value),
        None => Ok(placeholder(item_schema, root)),
    }
}

fn defaults_pass(
    schema: &Value,
    root: &Value,
    existing: Option<&Value>,
) -> Result<Option<Value>, SchemaError> {
    let (resolved, trace) = resolve_traced(schema, root, existing)?;
    let computer = DefaultComputer { root };
    Ok(computer.node(&resolved, None, existing, &trace))
}

struct DefaultComputer<'r> {
    root: &'r Value,
}

impl DefaultComputer<'_> {
    /// Resolve a nested schema and compute its default.
    fn child(
        &self,
        schema: &Value,
        parent_default: Option<&Value>,
        existing: Option<&Value>,
        ancestors: &[String],
    ) -> Option<Value> {
        let (resolved, trace) = match resolve_traced(schema, self.root, existing) {
            Ok(result) => result,
            Err(err) => {
                warn!("skipping defaults for unresolvable subtree: {}", err);
                return existing.cloned();
            }
        };
        if existing.is_none() && trace.iter().any(|r| ancestors.contains(r)) {
            // Recursive definition with no data below: stop here
            return None;
        }
        let mut below = ancestors.to_vec();
        below.extend(trace);
        self.node(&resolved, parent_default, existing, &below)
    }

    fn node(
        &self,
        resolved: &Value,
        parent_default: Option<&Value>,
        existing: Option<&Value>,
        ancestors: &[String],
    ) -> Option<Value> {
        let default = match (parent_default, resolved.get("default")) {
            (Some(Value::Object(parent)), Some(Value::Object(own))) => {
                let mut merged = parent.clone();
                for (k, v) in own {
                    merged.insert(k.clone(), v.clone());
                }
                Some(Value::Object(merged))
            }
            (_, Some(own)) => Some(own.clone()),
            (parent, None) => parent.cloned(),
        };

        match SchemaKind::of(resolved) {
            SchemaKind::Object => self.object(resolved, default.as_ref(), existing, ancestors),
            SchemaKind::Array => self.array(resolved, default.as_ref(), existing, ancestors),
            _ => existing.cloned().or(default),
        }
    }

    fn object(
        &self,
        resolved: &Value,
        default: Option<&Value>,
        existing: Option<&Value>,
        ancestors: &[String],
    ) -> Option<Value> {
        let existing_map = match existing {
            Some(Value::Object(map)) => Some(map),
            // Data of another shape is the caller's; leave it alone
            Some(other) => return Some(other.clone()),
            None => None,
        };
        let empty = Map::new();
        let props = match resolved.get("properties") {
            Some(Value::Object(props)) => props,
            _ => &empty,
        };

        let mut out = Map::new();
        for (name, prop) in props {
            let parent = default.and_then(|d| d.get(name.as_str()));
            let value = existing_map.and_then(|m| m.get(name.as_str()));
            if let Some(v) = self.child(prop, parent, value, ancestors) {
                out.insert(name.clone(), v);
            }
        }

        // Undeclared keys survive untouched
        for source in [existing_map, default.and_then(Value::as_object)].into_iter().flatten() {
            for (k, v) in source {
                if !out.contains_key(k) && !props.contains_key(k) {
                    out.insert(k.clone(), v.clone());
                }
            }
        }

        Some(Value::Object(out))
    }

    fn array(
        &self,
        resolved: &Value,
        default: Option<&Value>,
        existing: Option<&Value>,
        ancestors: &[String],
    ) -> Option<Value> {
        if let Some(other) = existing.filter(|e| !e.is_array()) {
            return Some(other.clone());
        }
        let Some(shape) = ArrayShape::of(resolved) else {
            return existing.cloned().or_else(|| default.cloned());
        };

        let explicit_default = default.and_then(Value::as_array);
        let start: &[Value] = match existing.and_then(Value::as_array).or(explicit_default) {
            Some(start) => start,
            None => &[],
        };
        let from_existing = existing.is_some();

        if is_multi_select(resolved, self.root) {
            return Some(Value::Array(start.to_vec()));
        }

        let items: Vec<Value> = match shape {
            ArrayShape::Tuple { items, additional } => {
                let len = items.len().max(start.len());
                (0..len)
                    .map(|i| {
                        let value = start.get(i);
                        let parent = explicit_default
                            .filter(|_| from_existing)
                            .and_then(|d| d.get(i));
                        match (items.get(i), additional, value) {
                            (Some(schema), _, _) => self
                                .child(schema, parent, value, ancestors)
                                .unwrap_or_else(|| placeholder(schema, self.root)),
                            (None, Some(schema), Some(v)) => self
                                .child(schema, parent, Some(v), ancestors)
                                .unwrap_or_else(|| v.clone()),
                            (None, _, v) => v.cloned().unwrap_or(Value::Null),
                        }
                    })
                    .collect()
            }
            ArrayShape::List { items } => {
                let min_items = resolved
                    .get("minItems")
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as usize;
                let target = min_items.max(start.len());
                if target > start.len() {
                    debug!("padding array from {} to {} items", start.len(), target);
                }

                (0..target)
                    .map(|i| {
                        if let Some(value) = start.get(i) {
                            let parent = explicit_default
                                .filter(|_| from_existing)
                                .and_then(|d| d.get(i));
                            return self
                                .child(items, parent, Some(value), ancestors)
                                .unwrap_or_else(|| value.clone());
                        }
                        if let Some(entry) = explicit_default.and_then(|d| d.get(i)) {
                            return entry.clone();
                        }
                        self.child(items, None, None, ancestors)
                            .unwrap_or_else(|| placeholder(items, self.root))
                    })
                    .collect()
            }
        };

        Some(Value::Array(items))
    }
}

/// Type-based placeholder for a slot whose schema has no default.
fn placeholder(schema: &Value, root: &Value) -> Value {
    match resolve(schema, root, None) {
        Ok(resolved) => SchemaKind::of(&resolved).placeholder(),
        Err(_) => Value::Null,
    }
}
