//! 表单字段类型定义
//!
//! Field definitions arrive as loosely-typed hashes from the backend; they
//! are mapped onto the fixed [`FieldModel`] record through an allow-listed
//! deserialization step. Unknown attributes are dropped with a diagnostic,
//! never a failure.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Widget type of a form field.
///
/// The core only carries the type; rendering is a collaborator concern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Single-line text input
    #[default]
    Text,
    /// Multi-line text input
    Textarea,
    /// Masked input
    Password,
    /// Option list
    Select,
    /// Boolean toggle
    Checkbox,
    /// Date/time picker
    Datetime,
    /// Read-only display value
    Static,
    /// Not rendered, value submitted as-is
    Hidden,
    /// File upload (produces a binary buffer value)
    Upload,
    /// Unrecognized widget type, carried through verbatim
    #[serde(other)]
    Unknown,
}

/// One option of a select-style field (also used for dynamic-key choices).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectOption {
    /// Submitted value
    pub value: String,
    /// Display label
    pub label: String,
}

/// A field value.
///
/// Presets from the server are scalars, `{key, value}` pairs (dynamic-key
/// fields) or arrays (clonable fields). The binary variant never appears on
/// the wire — upload widgets inject it through `set_field_value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Plain text value
    Text(String),
    /// Numeric value (kept verbatim, submitted in decimal notation)
    Number(serde_json::Number),
    /// Boolean value (checkbox fields)
    Bool(bool),
    /// Dynamic-key preset: unpacked into `name = key`, `value = value`
    Pair {
        /// Effective request key
        key: String,
        /// Scalar value
        value: String,
    },
    /// Array preset for clonable fields, expanded into one clone per element
    List(Vec<FieldValue>),
    /// Raw byte buffer; base64-encoded on submission
    #[serde(skip)]
    Binary(Vec<u8>),
}

impl FieldValue {
    /// The empty text value.
    #[must_use]
    pub fn empty() -> Self {
        Self::Text(String::new())
    }

    /// Whether the value counts as present for payload building and
    /// required-field validation. Only the empty string is absent.
    #[must_use]
    pub fn is_present(&self) -> bool {
        match self {
            Self::Text(s) => !s.is_empty(),
            Self::Number(_) | Self::Bool(_) | Self::Pair { .. } | Self::List(_) | Self::Binary(_) => {
                true
            }
        }
    }

    /// Renders the value as request parameter text. Binary buffers are
    /// handled separately by the payload builder.
    #[must_use]
    pub fn as_param_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Pair { value, .. } => value.clone(),
            Self::List(_) => serde_json::to_string(self).unwrap_or_default(),
            Self::Binary(_) => String::new(),
        }
    }
}

/// Declarative field definition as sent by the backend.
///
/// Attribute names follow the wire protocol; everything not named here is
/// collected into `unknown` and reported when the field is materialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldDefinition {
    /// Widget type
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Request key
    pub name: String,
    /// Display label
    pub label: String,
    /// Hover help text
    pub tooltip: Option<String>,
    /// Input placeholder
    pub placeholder: Option<String>,
    /// Preset value
    pub value: Option<FieldValue>,
    /// Server action to run when the value changes
    #[serde(rename = "actionOnChange")]
    pub action_on_change: Option<String>,
    /// Whether the field may be repeated
    pub clonable: bool,
    /// Maximum clone count; absent disables adding
    pub max: Option<u32>,
    /// Dynamic-key choices; a non-empty list makes the field renameable
    pub keys: Vec<SelectOption>,
    /// Timezone hint for datetime fields
    pub timezone: Option<String>,
    /// Options for select fields
    pub options: Vec<SelectOption>,
    /// Empty-selection prompt for select fields
    pub prompt: Option<String>,
    /// Whether an empty value passes validation
    pub is_optional: bool,
    /// Whether a select field accepts free-form input
    pub editable: bool,
    /// Verbose display value for static fields
    pub verbose: Option<Value>,
    /// Unrecognized attributes, dropped with a diagnostic
    #[serde(flatten)]
    pub unknown: BTreeMap<String, Value>,
}

/// Typed representation of one materialized form field.
///
/// `ref_name` is the immutable original name: dynamic-key fields rename
/// themselves based on the selected key, and the clone group a field
/// belongs to is tracked through `ref_name`, not `name`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldModel {
    /// Widget type
    pub field_type: FieldType,
    /// Current request key
    pub name: String,
    ref_name: String,
    /// Current value
    pub value: Option<FieldValue>,
    /// Display label
    pub label: String,
    /// Hover help text
    pub tooltip: Option<String>,
    /// Input placeholder (defaults to the empty string)
    pub placeholder: String,
    /// Server action to run when the value changes
    pub action_on_change: Option<String>,
    /// Validation error shown inline
    pub error: Option<String>,
    /// Whether the field may be repeated
    pub clonable: bool,
    /// Maximum clone count
    pub max: u32,
    /// Whether this clone may be removed (recomputed per group)
    pub can_delete: bool,
    /// Whether another clone may be added (recomputed per group)
    pub can_add: bool,
    /// Transient hint: focus this field after insertion
    pub focus_on_create: bool,
    /// Dynamic-key choices
    pub keys: Vec<SelectOption>,
    /// Timezone hint for datetime fields
    pub timezone: Option<String>,
    /// Options for select fields
    pub options: Vec<SelectOption>,
    /// Empty-selection prompt for select fields
    pub prompt: Option<String>,
    /// Whether an empty value passes validation
    pub is_optional: bool,
    /// Whether a select field accepts free-form input
    pub editable: bool,
    /// Verbose display value for static fields
    pub verbose: Option<Value>,
}

impl FieldModel {
    /// Materializes a field from its wire definition.
    ///
    /// Copies the recognized attributes, defaults the placeholder to the
    /// empty string and pins `ref_name` to the definition's name. Unknown
    /// attributes are reported and dropped.
    #[must_use]
    pub fn from_definition(def: &FieldDefinition) -> Self {
        for attr in def.unknown.keys() {
            log::warn!(
                "unknown field property \"{attr}\" (field \"{}\"); dropping it",
                def.name
            );
        }
        Self {
            field_type: def.field_type,
            name: def.name.clone(),
            ref_name: def.name.clone(),
            value: def.value.clone(),
            label: def.label.clone(),
            tooltip: def.tooltip.clone(),
            placeholder: def.placeholder.clone().unwrap_or_default(),
            action_on_change: def.action_on_change.clone(),
            error: None,
            clonable: def.clonable,
            // a missing max disables adding; the group size can never go
            // below one
            max: def.max.unwrap_or(1).max(1),
            can_delete: false,
            can_add: false,
            focus_on_create: false,
            keys: def.keys.clone(),
            timezone: def.timezone.clone(),
            options: def.options.clone(),
            prompt: def.prompt.clone(),
            is_optional: def.is_optional,
            editable: def.editable,
            verbose: def.verbose.clone(),
        }
    }

    /// The immutable original name of the field.
    #[must_use]
    pub fn ref_name(&self) -> &str {
        &self.ref_name
    }

    /// Whether the field belongs to a dynamic-key group and may be renamed.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        !self.keys.is_empty()
    }

    /// Whether the field carries a value that is defined and not the empty
    /// string.
    #[must_use]
    pub fn has_value(&self) -> bool {
        self.value.as_ref().is_some_and(FieldValue::is_present)
    }

    /// Unpacks a `{key, value}` preset into `name = key`, `value = value`.
    /// `ref_name` keeps tracking the original field slot.
    pub(crate) fn unpack_dynamic_preset(&mut self) {
        if let Some(FieldValue::Pair { key, value }) = self.value.clone() {
            self.name = key;
            self.value = Some(FieldValue::Text(value));
        }
    }
}
