//! Form state: one schema, its UI document, the current data and errors.
//!
//! [`FormState`] ties the engine together. It computes defaults when data is
//! supplied, routes array operations to the [`ArrayReconciler`] for the field
//! at a path, and re-validates according to [`FormOptions`].

use std::fmt;

use log::debug;
use serde_json::{Map, Value};

use crate::arrays::{ArrayAffordances, ArrayChange, ArrayReconciler};
use crate::defaults::default_form_data;
use crate::error::{FormError, OperationRejected, SchemaError};
use crate::files::FileSource;
use crate::id_path::{IdMap, IdPath, IdScheme, PathSegment};
use crate::resolver::{resolve_tree, schema_for_path};
use crate::types::{json_type_name, FormOptions};
use crate::ui::{ui_for_path, ArrayUiOptions};
use crate::validator::{validate_form_data, CustomValidator, ErrorTree};

/// Outcome of [`FormState::submit`].
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// The data passed validation (or validation is disabled).
    Accepted(Value),
    /// Validation failed; the tree holds every error.
    Rejected(ErrorTree),
}

/// State of one form.
pub struct FormState {
    schema: Value,
    ui: Value,
    options: FormOptions,
    data: Value,
    errors: ErrorTree,
    validator: Option<Box<CustomValidator>>,
}

impl fmt::Debug for FormState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormState")
            .field("options", &self.options)
            .field("data", &self.data)
            .field("errors", &self.errors)
            .field("custom_validation", &self.validator.is_some())
            .finish_non_exhaustive()
    }
}

impl FormState {
    /// Create a form, filling `data` with schema defaults.
    ///
    /// # Errors
    ///
    /// Returns `FormError::Schema` if the root schema cannot be resolved.
    pub fn new(
        schema: Value,
        ui: Value,
        data: Option<Value>,
        options: FormOptions,
    ) -> Result<Self, FormError> {
        let data = default_form_data(&schema, data.as_ref())?;
        let mut state = Self {
            schema,
            ui,
            options,
            data,
            errors: ErrorTree::new(),
            validator: None,
        };
        state.after_change(false)?;
        Ok(state)
    }

    /// Attach a custom validation function run after the schema validator.
    pub fn with_validator<F>(mut self, validate: F) -> Self
    where
        F: Fn(&Value, ErrorTree) -> ErrorTree + Send + Sync + 'static,
    {
        self.validator = Some(Box::new(validate));
        self
    }

    /// Root schema as supplied.
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// UI options document as supplied.
    pub fn ui(&self) -> &Value {
        &self.ui
    }

    /// Form-wide configuration.
    pub fn options(&self) -> &FormOptions {
        &self.options
    }

    /// Current form data, defaults included.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Error tree from the most recent validation pass.
    pub fn errors(&self) -> &ErrorTree {
        &self.errors
    }

    /// Effective schema tree for the current data.
    pub fn resolved_schema(&self) -> Value {
        resolve_tree(&self.schema, Some(&self.data))
    }

    /// Id scheme built from `idPrefix` and `idSeparator`.
    pub fn id_scheme(&self) -> IdScheme {
        IdScheme::from_options(&self.options)
    }

    /// Field ids for the current data.
    pub fn id_map(&self) -> IdMap {
        self.id_scheme().id_map(&self.schema, Some(&self.data))
    }

    /// Replace the whole data value; defaults are computed again.
    pub fn set_data(&mut self, data: Value) -> Result<(), FormError> {
        self.data = default_form_data(&self.schema, Some(&data))?;
        self.after_change(false)
    }

    /// Set or clear the value at `path`.
    ///
    /// Clearing an object property removes the key. Clearing an array element
    /// leaves `null` in its slot, since only array operations change length.
    pub fn change(&mut self, path: &IdPath, value: Option<Value>) -> Result<(), FormError> {
        if path.is_root() {
            return self.set_data(value.unwrap_or(Value::Null));
        }
        let mut next = self.data.clone();
        write_at(&mut next, path, value)?;
        self.data = next;
        debug!("changed {}", path);
        self.after_change(false)
    }

    /// Reconciler and current items for the array field at `path`.
    pub fn array_field(&self, path: &IdPath) -> Result<(ArrayReconciler<'_>, Vec<Value>), FormError> {
        let schema = schema_for_path(&self.schema, path, Some(&self.data))?;
        let ui = ArrayUiOptions::from_ui(ui_for_path(&self.ui, path));
        let reconciler = ArrayReconciler::new(schema, &self.schema, ui, path.clone())?;
        let items = path
            .lookup(&self.data)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok((reconciler, items))
    }

    /// Add / remove / reorder flags for the array field at `path`.
    pub fn affordances(&self, path: &IdPath) -> Result<ArrayAffordances, FormError> {
        let (array, items) = self.array_field(path)?;
        Ok(array.affordances(&items))
    }

    /// Append a defaulted element; returns its path.
    pub fn add_item(&mut self, path: &IdPath) -> Result<IdPath, FormError> {
        let change = {
            let (array, items) = self.array_field(path)?;
            array.add(&items)?
        };
        let added = change.added.clone().unwrap_or_else(|| path.clone());
        self.commit(path, change)?;
        Ok(added)
    }

    /// Remove an element and re-validate unless validation is disabled.
    pub fn remove_item(&mut self, path: &IdPath, index: usize) -> Result<(), FormError> {
        let change = {
            let (array, items) = self.array_field(path)?;
            array.remove(&items, index)?
        };
        self.commit(path, change)
    }

    /// Swap an element with its predecessor.
    pub fn move_item_up(&mut self, path: &IdPath, index: usize) -> Result<(), FormError> {
        let change = {
            let (array, items) = self.array_field(path)?;
            array.move_up(&items, index)?
        };
        self.commit(path, change)
    }

    /// Swap an element with its successor.
    pub fn move_item_down(&mut self, path: &IdPath, index: usize) -> Result<(), FormError> {
        let change = {
            let (array, items) = self.array_field(path)?;
            array.move_down(&items, index)?
        };
        self.commit(path, change)
    }

    /// Replace a multi-select array with a new selection.
    pub fn select(&mut self, path: &IdPath, selected: &[Value]) -> Result<(), FormError> {
        let items = {
            let (array, _) = self.array_field(path)?;
            array.select(selected)?
        };
        self.change(path, Some(Value::Array(items)))
    }

    /// Encode files and append them to the file array at `path`.
    ///
    /// The data is untouched unless the whole batch encodes.
    pub async fn append_files<F: FileSource>(
        &mut self,
        path: &IdPath,
        files: &[F],
    ) -> Result<(), FormError> {
        let change = {
            let (array, items) = self.array_field(path)?;
            array.append_files(&items, files).await?
        };
        self.commit(path, change)
    }

    /// Run validation now and store the result.
    pub fn validate(&mut self) -> Result<&ErrorTree, FormError> {
        self.errors = validate_form_data(&self.schema, &self.data, self.validator.as_deref())?;
        Ok(&self.errors)
    }

    /// Validate (unless `noValidate`) and hand back the data or the errors.
    pub fn submit(&mut self) -> Result<Submission, FormError> {
        if self.options.no_validate {
            return Ok(Submission::Accepted(self.data.clone()));
        }
        let errors = self.validate()?;
        if errors.is_empty() {
            Ok(Submission::Accepted(self.data.clone()))
        } else {
            Ok(Submission::Rejected(errors.clone()))
        }
    }

    fn commit(&mut self, path: &IdPath, change: ArrayChange) -> Result<(), FormError> {
        let mut next = self.data.clone();
        write_at(&mut next, path, Some(Value::Array(change.items)))?;
        self.data = next;
        debug!("array at {} updated", path);
        self.after_change(change.revalidate)
    }

    fn after_change(&mut self, force: bool) -> Result<(), FormError> {
        if self.options.no_validate {
            return Ok(());
        }
        if force || self.options.live_validate {
            self.validate()?;
        }
        Ok(())
    }
}

/// Store `value` at `path`, creating missing objects on the way.
///
/// May leave `data` partly written on error; callers write into a copy.
fn write_at(data: &mut Value, path: &IdPath, value: Option<Value>) -> Result<(), FormError> {
    let Some((last, parents)) = path.segments().split_last() else {
        *data = value.unwrap_or(Value::Null);
        return Ok(());
    };

    let mut node = data;
    for segment in parents {
        node = slot(node, segment, path)?;
    }
    make_container(node, last);
    let kind = json_type_name(node);

    match (last, node, value) {
        (PathSegment::Key(key), Value::Object(map), Some(value)) => {
            map.insert(key.clone(), value);
        }
        (PathSegment::Key(key), Value::Object(map), None) => {
            map.remove(key);
        }
        (PathSegment::Index(index), Value::Array(arr), value) => {
            let len = arr.len();
            let element = arr
                .get_mut(*index)
                .ok_or(OperationRejected::IndexOutOfBounds { index: *index, len })?;
            *element = value.unwrap_or(Value::Null);
        }
        _ => return Err(not_a_container(path, kind)),
    }
    Ok(())
}

fn slot<'v>(
    node: &'v mut Value,
    segment: &PathSegment,
    path: &IdPath,
) -> Result<&'v mut Value, FormError> {
    make_container(node, segment);
    let kind = json_type_name(node);
    match (segment, node) {
        (PathSegment::Key(key), Value::Object(map)) => {
            Ok(map.entry(key.clone()).or_insert(Value::Null))
        }
        (PathSegment::Index(index), Value::Array(arr)) => {
            let len = arr.len();
            arr.get_mut(*index).ok_or_else(|| {
                OperationRejected::IndexOutOfBounds { index: *index, len }.into()
            })
        }
        _ => Err(not_a_container(path, kind)),
    }
}

fn make_container(node: &mut Value, segment: &PathSegment) {
    if node.is_null() {
        *node = match segment {
            PathSegment::Key(_) => Value::Object(Map::new()),
            PathSegment::Index(_) => Value::Array(Vec::new()),
        };
    }
}

fn not_a_container(path: &IdPath, kind: &str) -> FormError {
    SchemaError::InvalidSchema {
        path: path.to_string(),
        message: format!("a {} value cannot hold this path", kind),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tasks_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "default": "My list" },
                "tasks": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["name"],
                        "properties": {
                            "name": { "type": "string", "minLength": 1 },
                            "done": { "type": "boolean", "default": false }
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn new_fills_defaults() {
        let form = FormState::new(tasks_schema(), json!({}), None, FormOptions::default()).unwrap();
        assert_eq!(form.data(), &json!({ "title": "My list", "tasks": [] }));
        assert!(form.errors().is_empty());
    }

    #[test]
    fn change_sets_and_clears() {
        let data = json!({ "title": "x", "tasks": [{ "name": "a" }, { "name": "b" }] });
        let mut form =
            FormState::new(tasks_schema(), json!({}), Some(data), FormOptions::default()).unwrap();

        form.change(&IdPath::root().key("title"), None).unwrap();
        assert!(form.data().get("title").is_none());

        form.change(&IdPath::root().key("tasks").index(0), None).unwrap();
        assert_eq!(form.data()["tasks"], json!([null, { "name": "b", "done": false }]));

        let missing = form.change(&IdPath::root().key("tasks").index(5), Some(json!({})));
        assert!(matches!(
            missing,
            Err(FormError::Rejected(OperationRejected::IndexOutOfBounds { index: 5, len: 2 }))
        ));
    }

    #[test]
    fn failed_change_leaves_data_untouched() {
        let schema = json!({ "type": "object" });
        let mut form = FormState::new(schema, json!({}), None, FormOptions::default()).unwrap();
        let path = IdPath::root().key("a").key("b").index(5);

        let result = form.change(&path, Some(json!(1)));
        assert!(matches!(
            result,
            Err(FormError::Rejected(OperationRejected::IndexOutOfBounds { index: 5, len: 0 }))
        ));
        assert_eq!(form.data(), &json!({}));
    }

    #[test]
    fn change_creates_intermediate_objects() {
        let schema = json!({
            "type": "object",
            "properties": {
                "address": { "type": "object", "properties": { "city": { "type": "string" } } }
            }
        });
        let mut form = FormState::new(schema, json!({}), None, FormOptions::default()).unwrap();
        form.change(&IdPath::root().key("address").key("city"), Some(json!("Oslo")))
            .unwrap();
        assert_eq!(form.data()["address"], json!({ "city": "Oslo" }));
    }

    #[test]
    fn live_validation_follows_changes() {
        let options = FormOptions::default().live_validate(true);
        let data = json!({ "tasks": [{ "name": "a" }] });
        let mut form = FormState::new(tasks_schema(), json!({}), Some(data), options).unwrap();
        assert!(form.errors().is_empty());

        let name = IdPath::root().key("tasks").index(0).key("name");
        form.change(&name, Some(json!(""))).unwrap();
        assert_eq!(form.errors().at(&name).unwrap().errors()[0].keyword, "minLength");
    }

    #[test]
    fn no_validate_skips_submit_validation() {
        let options = FormOptions::default().no_validate(true);
        let data = json!({ "tasks": [{ "name": "" }] });
        let mut form = FormState::new(tasks_schema(), json!({}), Some(data), options).unwrap();
        assert!(matches!(form.submit().unwrap(), Submission::Accepted(_)));
    }

    #[test]
    fn add_item_returns_new_path() {
        let mut form = FormState::new(tasks_schema(), json!({}), None, FormOptions::default()).unwrap();
        let tasks = IdPath::root().key("tasks");
        let added = form.add_item(&tasks).unwrap();
        assert_eq!(added, tasks.clone().index(0));
        assert_eq!(form.data()["tasks"], json!([{ "done": false }]));
    }

    #[test]
    fn ui_options_reach_reconciler() {
        let ui = json!({ "tasks": { "ui:options": { "addable": false } } });
        let mut form = FormState::new(tasks_schema(), ui, None, FormOptions::default()).unwrap();
        let tasks = IdPath::root().key("tasks");
        assert!(!form.affordances(&tasks).unwrap().can_add);
        assert!(form.add_item(&tasks).is_err());
    }

    #[test]
    fn remove_forces_revalidation() {
        let data = json!({ "tasks": [{ "name": "a" }, { "name": "" }, { "name": "c" }] });
        let mut form =
            FormState::new(tasks_schema(), json!({}), Some(data), FormOptions::default()).unwrap();
        form.validate().unwrap();
        assert!(form.errors().at(&IdPath::root().key("tasks").index(1)).is_some());

        form.remove_item(&IdPath::root().key("tasks"), 1).unwrap();
        assert!(form.errors().is_empty());
        assert_eq!(form.data()["tasks"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn custom_validator_runs_on_submit() {
        let mut form = FormState::new(tasks_schema(), json!({}), None, FormOptions::default())
            .unwrap()
            .with_validator(|data, mut errors| {
                if data["tasks"].as_array().map_or(true, Vec::is_empty) {
                    errors.field_mut("tasks").add_error("add at least one task");
                }
                errors
            });

        match form.submit().unwrap() {
            Submission::Rejected(errors) => {
                assert_eq!(
                    errors.field("tasks").unwrap().messages(),
                    vec!["add at least one task"]
                );
            }
            Submission::Accepted(_) => panic!("expected rejection"),
        }
    }

    #[test]
    fn array_ops_on_non_array_rejected() {
        let mut form = FormState::new(tasks_schema(), json!({}), None, FormOptions::default()).unwrap();
        let title = IdPath::root().key("title");
        assert!(matches!(
            form.add_item(&title),
            Err(FormError::Rejected(OperationRejected::NotAnArray { .. }))
        ));
    }
}
