//! Schema Form
//!
//! Form state computed from a JSON Schema, independent of any rendering layer.
//!
//! Given a root schema, a UI options document and the current form data, this
//! library resolves the effective schema, fills in defaults, derives stable
//! field ids, reconciles array operations and maps validation errors onto the
//! data tree.
//!
//! # Example
//!
//! ```
//! use schema_form::{FormOptions, FormState, IdPath};
//! use serde_json::json;
//!
//! let schema = json!({
//!     "type": "object",
//!     "properties": {
//!         "title": { "type": "string", "default": "Groceries" },
//!         "items": {
//!             "type": "array",
//!             "minItems": 1,
//!             "items": { "type": "string" }
//!         }
//!     }
//! });
//!
//! let mut form = FormState::new(schema, json!({}), None, FormOptions::default()).unwrap();
//! assert_eq!(form.data(), &json!({ "title": "Groceries", "items": [""] }));
//!
//! let added = form.add_item(&IdPath::root().key("items")).unwrap();
//! assert_eq!(form.id_scheme().to_id(&added).unwrap(), "root_items_1");
//! ```
//!
//! # Components
//!
//! | Module | Role |
//! |--------|------|
//! | [`resolve`] | `$ref`, `allOf`, `dependencies` and `oneOf`/`anyOf` resolution |
//! | [`compute_defaults`] | default data, padded to `minItems` |
//! | [`IdScheme`] | path ⇄ field id conversion |
//! | [`ArrayReconciler`] | add / remove / reorder / select / file append |
//! | [`validate_form_data`] | validator errors arranged as an [`ErrorTree`] |

mod arrays;
mod defaults;
mod error;
mod files;
mod form;
mod id_path;
mod loader;
mod resolver;
mod types;
mod ui;
mod validator;

pub use arrays::{
    is_files_array, is_multi_select, ArrayAffordances, ArrayChange, ArrayMode, ArrayReconciler,
    ItemAffordances,
};
pub use defaults::{compute_defaults, default_form_data};
pub use error::{FileEncodeError, FormError, IdError, LoadError, OperationRejected, SchemaError};
pub use files::{data_url, encode_batch, encode_file, DataUrl, FileSource, InMemoryFile};
pub use form::{FormState, Submission};
pub use id_path::{IdMap, IdPath, IdScheme, PathSegment};
pub use loader::{load_document, load_document_str, load_options, navigate_fragment};
pub use resolver::{merge_schemas, resolve, resolve_tree, schema_for_path, select_branch, ArrayShape};
pub use types::{FormOptions, SchemaKind, UNSUPPORTED_KEY};
pub use ui::{has_override, ui_for_path, ArrayUiOptions, Override};
pub use validator::{
    validate_form_data, CustomValidator, ErrorEntry, ErrorSource, ErrorTree, ERRORS_KEY,
};
