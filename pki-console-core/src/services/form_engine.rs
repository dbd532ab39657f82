//! Dynamic form engine

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::sync::RwLock;

use crate::error::{CoreError, CoreResult};
use crate::services::SessionController;
use crate::types::{
    FieldDefinition, FieldModel, FieldType, FieldValue, FormDefinition, ParamValue, Request,
    RequestPayload, ServerDocument,
};

/// Inline error set on required fields that are submitted empty.
const REQUIRED_VALUE_ERROR: &str = "Please specify a value";

/// Result of a submit attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Client-side validation failed; no request was sent and the faulty
    /// fields carry inline errors
    Invalid,
    /// The request completed; server-reported field errors, if any, have
    /// been applied
    Completed(ServerDocument),
}

#[derive(Debug, Default)]
struct FormState {
    fields: Vec<FieldModel>,
    clonable_ref_names: Vec<String>,
    is_loading: bool,
}

/// Builds and owns the ordered field sequence of one form section, manages
/// cloning, encodes values into request payloads and drives the
/// field-change and submit round trips.
///
/// Field order is display order and is significant. Overlapping
/// field-change requests are not coalesced; each response applies its own
/// replacements on arrival (last write wins).
pub struct FormEngine {
    session: Arc<SessionController>,
    definition: FormDefinition,
    state: RwLock<FormState>,
}

impl FormEngine {
    /// Materializes a form from its declarative definition.
    #[must_use]
    pub fn new(session: Arc<SessionController>, definition: FormDefinition) -> Self {
        let mut clonable_ref_names = Vec::new();
        let mut fields = Self::prepare_fields(&definition.fields, &mut clonable_ref_names);
        for group in &clonable_ref_names {
            Self::refresh_clone_flags(&mut fields, group);
        }
        Self {
            session,
            definition,
            state: RwLock::new(FormState {
                fields,
                clonable_ref_names,
                is_loading: false,
            }),
        }
    }

    /// Builds FieldModels from field definitions: one per plain field, one
    /// clone per array-preset element for clonable fields (an empty array
    /// shows a single empty clone), then unpacks dynamic-key presets.
    fn prepare_fields(
        definitions: &[FieldDefinition],
        clonable_ref_names: &mut Vec<String>,
    ) -> Vec<FieldModel> {
        let mut result = Vec::new();
        for definition in definitions {
            let field = FieldModel::from_definition(definition);

            if !field.clonable {
                result.push(field);
                continue;
            }

            if !clonable_ref_names.iter().any(|n| n == field.ref_name()) {
                clonable_ref_names.push(field.ref_name().to_string());
            }
            let preset = match &field.value {
                Some(FieldValue::List(values)) => Some(values.clone()),
                _ => None,
            };
            if let Some(values) = preset {
                if values.is_empty() {
                    // always show at least one empty clone
                    let mut clone = field.clone();
                    clone.value = Some(FieldValue::empty());
                    result.push(clone);
                } else {
                    for value in values {
                        let mut clone = field.clone();
                        clone.value = Some(value);
                        result.push(clone);
                    }
                }
            } else {
                result.push(field);
            }
        }

        for field in &mut result {
            field.unpack_dynamic_preset();
        }
        result
    }

    /// Recomputes `can_delete`/`can_add` for every member of a clone
    /// group, using the group's first member's `max`.
    fn refresh_clone_flags(fields: &mut [FieldModel], group: &str) {
        let indices: Vec<usize> = fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.ref_name() == group)
            .map(|(i, _)| i)
            .collect();
        let Some(&first) = indices.first() else {
            return;
        };
        let size = indices.len();
        let max = fields[first].max;
        for &i in &indices {
            fields[i].can_delete = size > 1;
            fields[i].can_add = (size as u32) < max;
        }
    }

    /// Snapshot of the field sequence in display order.
    pub async fn fields(&self) -> Vec<FieldModel> {
        self.state.read().await.fields.clone()
    }

    /// Snapshot of the renderable fields (everything but hidden ones).
    pub async fn visible_fields(&self) -> Vec<FieldModel> {
        self.state
            .read()
            .await
            .fields
            .iter()
            .filter(|f| f.field_type != FieldType::Hidden)
            .cloned()
            .collect()
    }

    /// Whether a submit round trip is in flight.
    pub async fn is_loading(&self) -> bool {
        self.state.read().await.is_loading
    }

    /// Label of the submit button.
    #[must_use]
    pub fn submit_label(&self) -> &str {
        self.definition.submit_label.as_deref().unwrap_or("send")
    }

    /// Inserts a copy of the field at `index` right after it, with an empty
    /// value and the focus hint set. No-op when the group is at capacity.
    pub async fn add_clone(&self, index: usize) -> CoreResult<()> {
        let mut state = self.state.write().await;
        let field = state
            .fields
            .get(index)
            .ok_or_else(|| CoreError::FieldNotFound(format!("#{index}")))?;
        if !field.can_add {
            return Ok(());
        }
        let mut copy = field.clone();
        copy.value = Some(FieldValue::empty());
        copy.focus_on_create = true;
        let group = field.ref_name().to_string();
        state.fields.insert(index + 1, copy);
        Self::refresh_clone_flags(&mut state.fields, &group);
        Ok(())
    }

    /// Removes the field at `index`. A group shrinking to one member makes
    /// that member non-deletable again.
    pub async fn delete_clone(&self, index: usize) -> CoreResult<()> {
        let mut state = self.state.write().await;
        if index >= state.fields.len() {
            return Err(CoreError::FieldNotFound(format!("#{index}")));
        }
        let removed = state.fields.remove(index);
        Self::refresh_clone_flags(&mut state.fields, removed.ref_name());
        Ok(())
    }

    /// Renames a dynamic-key field. Fields without dynamic-key metadata
    /// keep their name.
    pub async fn set_field_name(&self, index: usize, name: &str) -> CoreResult<()> {
        let mut state = self.state.write().await;
        let field = state
            .fields
            .get_mut(index)
            .ok_or_else(|| CoreError::FieldNotFound(format!("#{index}")))?;
        if !field.is_dynamic() {
            log::warn!("refusing to rename non-dynamic field \"{}\"", field.name);
            return Ok(());
        }
        log::debug!("set_field_name: {} -> {name}", field.name);
        field.name = name.to_string();
        Ok(())
    }

    /// Sets an inline error on the field at `index`.
    pub async fn set_field_error(&self, index: usize, message: Option<String>) -> CoreResult<()> {
        let mut state = self.state.write().await;
        let field = state
            .fields
            .get_mut(index)
            .ok_or_else(|| CoreError::FieldNotFound(format!("#{index}")))?;
        field.error = message;
        Ok(())
    }

    /// Sets the value of the field at `index` and clears its error.
    ///
    /// If the field declares a change action, the whole form is sent to
    /// the backend and every returned field definition replaces the
    /// existing field with the same current name, in place. Overlapping
    /// change requests each apply independently.
    pub async fn set_field_value(&self, index: usize, value: FieldValue) -> CoreResult<()> {
        let request = {
            let mut state = self.state.write().await;
            let field = state
                .fields
                .get_mut(index)
                .ok_or_else(|| CoreError::FieldNotFound(format!("#{index}")))?;
            log::debug!("set_field_value: {}", field.name);
            field.value = Some(value);
            field.error = None;

            let Some(action) = field.action_on_change.clone() else {
                return Ok(());
            };
            log::debug!("executing change action \"{action}\"");
            let source_field = field.name.clone();
            Request::for_action(action)
                .with_param("_sourceField", source_field)
                .with_payload(Self::payload_of(&state.fields))
        };

        let doc = self.session.send_request(request).await?;
        if let Some(definitions) = &doc.fields {
            let mut state = self.state.write().await;
            let FormState {
                fields,
                clonable_ref_names,
                ..
            } = &mut *state;
            for new_field in Self::prepare_fields(definitions, clonable_ref_names) {
                for slot in fields.iter_mut().filter(|f| f.name == new_field.name) {
                    *slot = new_field.clone();
                }
            }
        }
        Ok(())
    }

    /// Turns all populated fields into request parameters.
    ///
    /// Names whose fields are all empty are omitted entirely. Clonable
    /// fields are sent as a list even with a single populated clone.
    /// Binary buffers are base64-encoded under a rewritten
    /// `_encoded_base64_<name>` key.
    pub async fn to_request_payload(&self) -> RequestPayload {
        Self::payload_of(&self.state.read().await.fields)
    }

    fn payload_of(fields: &[FieldModel]) -> RequestPayload {
        let mut names: Vec<&str> = Vec::new();
        for field in fields {
            if !names.contains(&field.name.as_str()) {
                names.push(&field.name);
            }
        }

        let mut payload = RequestPayload::new();
        for name in names {
            let populated: Vec<&FieldModel> = fields
                .iter()
                .filter(|f| f.name == name && f.has_value())
                .collect();
            let Some(first) = populated.first() else {
                continue;
            };

            // encode binary buffers as base64 and rewrite the key as a flag
            let mut binary = false;
            let mut encode = |field: &FieldModel| -> String {
                match field.value.as_ref() {
                    Some(FieldValue::Binary(bytes)) => {
                        binary = true;
                        BASE64.encode(bytes)
                    }
                    Some(value) => value.as_param_text(),
                    None => String::new(),
                }
            };

            // clonables are sent as a list even with a single member
            let value = if first.clonable {
                ParamValue::Many(populated.iter().map(|f| encode(f)).collect())
            } else {
                ParamValue::Single(encode(first))
            };
            let key = if binary {
                format!("_encoded_base64_{name}")
            } else {
                name.to_string()
            };
            payload.insert(key, value);
        }
        payload
    }

    /// Validates and submits the form.
    ///
    /// A field is invalid when it is required but empty, or when it still
    /// carries a server-reported error. Any invalid field aborts locally
    /// with no request sent. Per-field errors from the response are mapped
    /// back onto the matching fields (all clones of a name, or the one at
    /// the reported position).
    pub async fn submit(&self, extra: RequestPayload) -> CoreResult<SubmitOutcome> {
        log::debug!("submit: action = {}", self.definition.action);
        let request = {
            let mut state = self.state.write().await;
            let mut invalid = false;
            for field in &mut state.fields {
                if !field.is_optional && !field.has_value() {
                    invalid = true;
                    field.error = Some(REQUIRED_VALUE_ERROR.to_string());
                } else if field.error.is_some() {
                    invalid = true;
                }
            }
            if invalid {
                return Ok(SubmitOutcome::Invalid);
            }
            state.is_loading = true;
            Request::for_action(self.definition.action.clone())
                .with_payload(Self::payload_of(&state.fields))
                .with_payload(extra)
        };

        let result = self.session.send_request(request).await;
        let mut state = self.state.write().await;
        state.is_loading = false;
        let doc = result?;

        if let Some(status) = &doc.status {
            for field_error in &status.field_errors {
                match field_error.index {
                    None => {
                        for field in state
                            .fields
                            .iter_mut()
                            .filter(|f| f.name == field_error.name)
                        {
                            field.error = Some(field_error.error.clone());
                        }
                    }
                    Some(position) => {
                        if let Some(field) = state
                            .fields
                            .iter_mut()
                            .filter(|f| f.name == field_error.name)
                            .nth(position)
                        {
                            field.error = Some(field_error.error.clone());
                        } else {
                            log::warn!(
                                "field error index {position} out of range for \"{}\"",
                                field_error.name
                            );
                        }
                    }
                }
            }
        }
        Ok(SubmitOutcome::Completed(doc))
    }

    /// Navigates to the form's reset page, if it declares one.
    pub async fn reset(&self) -> CoreResult<Option<ServerDocument>> {
        let Some(page) = &self.definition.reset else {
            return Ok(None);
        };
        let doc = self.session.send_request(Request::for_page(page)).await?;
        Ok(Some(doc))
    }
}
