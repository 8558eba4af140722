//! Array field reconciliation.
//!
//! Decides which add / remove / reorder operations an array field offers and
//! applies them, producing a new array instead of mutating the old one.
//!
//! # Modes
//!
//! | Mode | Layout | Operations |
//! |------|--------|------------|
//! | list | one `items` schema | add, remove, reorder |
//! | tuple | `items` sequence (+ `additionalItems`) | add/remove/reorder past the fixed positions |
//! | multi-select | `uniqueItems` over an `enum` | whole-array [`select`](ArrayReconciler::select) only |
//! | files | `string` items with `format: data-url` | [`append_files`](ArrayReconciler::append_files), remove, reorder |

use serde::Serialize;
use serde_json::Value;

use crate::defaults::new_item;
use crate::error::{FileEncodeError, FormError, OperationRejected};
use crate::files::{encode_batch, FileSource};
use crate::id_path::IdPath;
use crate::resolver::{resolve, ArrayShape};
use crate::types::SchemaKind;
use crate::ui::ArrayUiOptions;

/// Layout of an array field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArrayMode {
    List,
    Tuple,
    MultiSelect,
    Files,
}

impl ArrayMode {
    fn name(&self) -> &'static str {
        match self {
            ArrayMode::List => "list",
            ArrayMode::Tuple => "tuple",
            ArrayMode::MultiSelect => "multi-select",
            ArrayMode::Files => "file",
        }
    }
}

/// Result of an array operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayChange {
    /// The complete new array.
    pub items: Vec<Value>,
    /// Path of the element created by `add`.
    pub added: Option<IdPath>,
    /// Errors keyed by index are stale and must be recomputed.
    pub revalidate: bool,
}

impl ArrayChange {
    fn moved(items: Vec<Value>) -> Self {
        Self {
            items,
            added: None,
            revalidate: false,
        }
    }
}

/// Flags the rendering layer needs to draw one array field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrayAffordances {
    pub mode: ArrayMode,
    pub can_add: bool,
    pub items: Vec<ItemAffordances>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemAffordances {
    pub can_remove: bool,
    pub can_move_up: bool,
    pub can_move_down: bool,
}

/// Operations on one array field.
#[derive(Debug, Clone)]
pub struct ArrayReconciler<'r> {
    root: &'r Value,
    schema: Value,
    ui: ArrayUiOptions,
    path: IdPath,
    mode: ArrayMode,
}

impl<'r> ArrayReconciler<'r> {
    /// Build a reconciler for the resolved array schema at `path`.
    ///
    /// # Errors
    ///
    /// Returns `OperationRejected::NotAnArray` if `schema` is not an array schema.
    pub fn new(
        schema: Value,
        root: &'r Value,
        ui: ArrayUiOptions,
        path: IdPath,
    ) -> Result<Self, OperationRejected> {
        let Some(shape) = ArrayShape::of(&schema) else {
            return Err(OperationRejected::NotAnArray {
                path: path.to_string(),
            });
        };
        let mode = if is_multi_select(&schema, root) {
            ArrayMode::MultiSelect
        } else if is_files_array(&schema, root) {
            ArrayMode::Files
        } else if shape.is_tuple() {
            ArrayMode::Tuple
        } else {
            ArrayMode::List
        };

        Ok(Self {
            root,
            schema,
            ui,
            path,
            mode,
        })
    }

    /// Layout detected for this field.
    pub fn mode(&self) -> ArrayMode {
        self.mode
    }

    /// The resolved array schema this reconciler works on.
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Whether `add` is currently allowed.
    ///
    /// Requires `addable`, room below `maxItems`, and a schema for the next
    /// position. An explicit `addable: true` never overrides `maxItems`.
    pub fn can_add(&self, items: &[Value]) -> bool {
        if !self.ui.addable || !matches!(self.mode, ArrayMode::List | ArrayMode::Tuple) {
            return false;
        }
        if let Some(max) = self.max_items() {
            if items.len() as u64 >= max {
                return false;
            }
        }
        self.shape().is_open()
    }

    /// Whether the element at `index` can be removed.
    ///
    /// Fixed tuple positions are never removable.
    pub fn can_remove(&self, items: &[Value], index: usize) -> bool {
        self.ui.removable
            && self.mode != ArrayMode::MultiSelect
            && index < items.len()
            && index >= self.shape().fixed_len()
    }

    /// Whether the array offers reordering at all.
    pub fn can_reorder(&self, items: &[Value]) -> bool {
        self.ui.orderable && self.mode != ArrayMode::MultiSelect && items.len() >= 2
    }

    /// Whether the element at `index` can swap with its predecessor.
    pub fn can_move_up(&self, items: &[Value], index: usize) -> bool {
        self.can_reorder(items)
            && index < items.len()
            && index > 0
            && index - 1 >= self.shape().fixed_len()
    }

    /// Whether the element at `index` can swap with its successor.
    pub fn can_move_down(&self, items: &[Value], index: usize) -> bool {
        self.can_reorder(items) && index + 1 < items.len() && index >= self.shape().fixed_len()
    }

    /// All flags for the current array value.
    pub fn affordances(&self, items: &[Value]) -> ArrayAffordances {
        ArrayAffordances {
            mode: self.mode,
            can_add: self.can_add(items),
            items: (0..items.len())
                .map(|i| ItemAffordances {
                    can_remove: self.can_remove(items, i),
                    can_move_up: self.can_move_up(items, i),
                    can_move_down: self.can_move_down(items, i),
                })
                .collect(),
        }
    }

    /// Append one defaulted element.
    ///
    /// The element is defaulted against its tuple position when the data is
    /// shorter than the tuple, else against `additionalItems` or the list item schema.
    pub fn add(&self, items: &[Value]) -> Result<ArrayChange, FormError> {
        if !self.can_add(items) {
            if let ArrayMode::MultiSelect | ArrayMode::Files = self.mode {
                return Err(self.not_applicable("add").into());
            }
            return Err(OperationRejected::AddNotPermitted { len: items.len() }.into());
        }
        let index = items.len();
        let item_schema = self
            .shape()
            .item_schema(index)
            .ok_or(OperationRejected::AddNotPermitted { len: index })?;
        let element = new_item(item_schema, self.root)?;

        let mut next = items.to_vec();
        next.push(element);
        Ok(ArrayChange {
            items: next,
            added: Some(self.path.clone().index(index)),
            revalidate: false,
        })
    }

    /// Delete the element at `index`; later elements shift down by one.
    pub fn remove(&self, items: &[Value], index: usize) -> Result<ArrayChange, OperationRejected> {
        self.check_index(items, index)?;
        if self.mode == ArrayMode::MultiSelect {
            return Err(self.not_applicable("remove"));
        }
        if !self.can_remove(items, index) {
            return Err(OperationRejected::RemoveNotPermitted { index });
        }
        let mut next = items.to_vec();
        next.remove(index);
        Ok(ArrayChange {
            items: next,
            added: None,
            revalidate: true,
        })
    }

    /// Swap the element at `index` with its predecessor.
    pub fn move_up(&self, items: &[Value], index: usize) -> Result<ArrayChange, OperationRejected> {
        self.check_reorder(items, index)?;
        if index == 0 || index - 1 < self.shape().fixed_len() {
            return Err(OperationRejected::AtBoundary {
                index,
                boundary: "upper",
            });
        }
        let mut next = items.to_vec();
        next.swap(index - 1, index);
        Ok(ArrayChange::moved(next))
    }

    /// Swap the element at `index` with its successor.
    pub fn move_down(&self, items: &[Value], index: usize) -> Result<ArrayChange, OperationRejected> {
        self.check_reorder(items, index)?;
        if index + 1 >= items.len() || index < self.shape().fixed_len() {
            return Err(OperationRejected::AtBoundary {
                index,
                boundary: "lower",
            });
        }
        let mut next = items.to_vec();
        next.swap(index, index + 1);
        Ok(ArrayChange::moved(next))
    }

    /// Replace a multi-select array with a new selection.
    ///
    /// The result lists the selected options in enum declaration order,
    /// each at most once.
    pub fn select(&self, selected: &[Value]) -> Result<Vec<Value>, OperationRejected> {
        if self.mode != ArrayMode::MultiSelect {
            return Err(self.not_applicable("select"));
        }
        let options = self.enum_options();
        if let Some(stranger) = selected.iter().find(|v| !options.contains(v)) {
            return Err(OperationRejected::NotAnOption {
                value: stranger.to_string(),
            });
        }
        Ok(options
            .into_iter()
            .filter(|option| selected.contains(option))
            .collect())
    }

    /// Encode a batch of selected files and append them in selection order.
    ///
    /// The array is only extended once every file of the batch is encoded;
    /// a single failure leaves it unchanged. The whole batch is rejected when
    /// `addable` is off or it would grow the array past `maxItems`.
    pub async fn append_files<F: FileSource>(
        &self,
        items: &[Value],
        files: &[F],
    ) -> Result<ArrayChange, FormError> {
        if self.mode != ArrayMode::Files {
            return Err(FileEncodeError::NotAFileArray.into());
        }
        let over_max = self
            .max_items()
            .map_or(false, |max| (items.len() + files.len()) as u64 > max);
        if !self.ui.addable || over_max {
            return Err(OperationRejected::AddNotPermitted { len: items.len() }.into());
        }
        let encoded = encode_batch(files).await?;
        let mut next = items.to_vec();
        next.extend(encoded.into_iter().map(Value::String));
        Ok(ArrayChange {
            items: next,
            added: None,
            revalidate: false,
        })
    }

    fn shape(&self) -> ArrayShape<'_> {
        // Checked in `new`
        ArrayShape::of(&self.schema).unwrap_or(ArrayShape::Tuple {
            items: &[],
            additional: None,
        })
    }

    fn max_items(&self) -> Option<u64> {
        self.schema.get("maxItems").and_then(Value::as_u64)
    }

    fn enum_options(&self) -> Vec<Value> {
        self.shape()
            .item_schema(0)
            .and_then(|items| resolve(items, self.root, None).ok())
            .and_then(|items| items.get("enum").and_then(Value::as_array).cloned())
            .unwrap_or_default()
    }

    fn check_index(&self, items: &[Value], index: usize) -> Result<(), OperationRejected> {
        if index >= items.len() {
            return Err(OperationRejected::IndexOutOfBounds {
                index,
                len: items.len(),
            });
        }
        Ok(())
    }

    fn check_reorder(&self, items: &[Value], index: usize) -> Result<(), OperationRejected> {
        self.check_index(items, index)?;
        if self.mode == ArrayMode::MultiSelect {
            return Err(self.not_applicable("reorder"));
        }
        if !self.ui.orderable {
            return Err(OperationRejected::ReorderNotPermitted { index });
        }
        Ok(())
    }

    fn not_applicable(&self, operation: &'static str) -> OperationRejected {
        OperationRejected::NotApplicable {
            operation,
            mode: self.mode.name(),
        }
    }
}

/// Whether an array schema is a multi-select over an enum.
pub fn is_multi_select(schema: &Value, root: &Value) -> bool {
    if schema.get("uniqueItems") != Some(&Value::Bool(true)) {
        return false;
    }
    match ArrayShape::of(schema) {
        Some(ArrayShape::List { items }) => resolve(items, root, None)
            .map(|items| items.get("enum").map_or(false, Value::is_array))
            .unwrap_or(false),
        _ => false,
    }
}

/// Whether an array schema holds data-URL encoded files.
pub fn is_files_array(schema: &Value, root: &Value) -> bool {
    match ArrayShape::of(schema) {
        Some(ArrayShape::List { items }) => resolve(items, root, None)
            .map(|items| {
                SchemaKind::of(&items) == SchemaKind::String
                    && items.get("format").and_then(Value::as_str) == Some("data-url")
            })
            .unwrap_or(false),
        _ => false,
    }
}
