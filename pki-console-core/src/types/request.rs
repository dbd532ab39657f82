//! Request types for the backend protocol

use std::collections::BTreeMap;

use serde::Serialize;

/// A single request parameter value.
///
/// Clonable form fields are always sent as a list, even with exactly one
/// populated clone; everything else is a plain scalar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Plain scalar value
    Single(String),
    /// Ordered list value (clone groups)
    Many(Vec<String>),
}

/// Form data as request parameters: request key -> value.
pub type RequestPayload = BTreeMap<String, ParamValue>;

/// A request to the backend.
///
/// Requests carrying an `action` are mutations (sent as POST by the HTTP
/// transport) and additionally receive the session token; everything else
/// is a plain query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Request {
    /// Page identifier to load
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    /// Server action to execute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Requested display placement ("top", "tab", "popup", "modal", "self")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Remaining parameters (query options, form data, protocol fields)
    #[serde(flatten)]
    pub params: BTreeMap<String, ParamValue>,
}

impl Request {
    /// Creates a page-load request.
    #[must_use]
    pub fn for_page(page: impl Into<String>) -> Self {
        Self {
            page: Some(page.into()),
            ..Self::default()
        }
    }

    /// Creates an action (mutation) request.
    #[must_use]
    pub fn for_action(action: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            ..Self::default()
        }
    }

    /// Sets the requested display placement.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Adds a single scalar parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params
            .insert(key.into(), ParamValue::Single(value.into()));
        self
    }

    /// Merges a form payload into the parameters.
    #[must_use]
    pub fn with_payload(mut self, payload: RequestPayload) -> Self {
        self.params.extend(payload);
        self
    }

    /// Whether this request mutates server state.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        self.action.is_some()
    }

    /// Flattens the request into key/value pairs for form or query
    /// encoding. List values repeat the key once per element.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = &self.page {
            pairs.push(("page".to_string(), page.clone()));
        }
        if let Some(action) = &self.action {
            pairs.push(("action".to_string(), action.clone()));
        }
        if let Some(target) = &self.target {
            pairs.push(("target".to_string(), target.clone()));
        }
        for (key, value) in &self.params {
            match value {
                ParamValue::Single(v) => pairs.push((key.clone(), v.clone())),
                ParamValue::Many(vs) => {
                    pairs.extend(vs.iter().map(|v| (key.clone(), v.clone())));
                }
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_repeat_key_for_lists() {
        let request = Request::for_action("create").with_payload(RequestPayload::from([
            (
                "san".to_string(),
                ParamValue::Many(vec!["a".to_string(), "b".to_string()]),
            ),
            ("cn".to_string(), ParamValue::Single("host".to_string())),
        ]));

        let pairs = request.to_pairs();
        assert_eq!(
            pairs,
            vec![
                ("action".to_string(), "create".to_string()),
                ("cn".to_string(), "host".to_string()),
                ("san".to_string(), "a".to_string()),
                ("san".to_string(), "b".to_string()),
            ]
        );
    }

    #[test]
    fn mutation_requires_action() {
        assert!(Request::for_action("x").is_mutation());
        assert!(!Request::for_page("x").is_mutation());
    }
}
