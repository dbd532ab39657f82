//! Form section definition

use serde::{Deserialize, Serialize};

use super::field::FieldDefinition;

/// Declarative definition of a form section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormDefinition {
    /// Server action executed on submit
    pub action: String,
    /// Page to load when the form is reset
    pub reset: Option<String>,
    /// Submit button label; defaults to "send"
    pub submit_label: Option<String>,
    /// Field definitions in display order
    pub fields: Vec<FieldDefinition>,
}
