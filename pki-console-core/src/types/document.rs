//! Structured documents returned by the backend

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::field::FieldDefinition;
use super::navigation::NavEntry;

/// Severity of a status banner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    /// Informational
    #[default]
    Info,
    /// Operation succeeded
    Success,
    /// Warning
    Warn,
    /// Operation failed
    Error,
}

/// Per-field validation error reported with a submit response.
///
/// Without an `index` the error applies to every clone of the named group;
/// with an `index` it applies to the clone at that position only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldError {
    /// Request key of the faulty field
    pub name: String,
    /// Clone position within the group, if the error is per-clone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// Error message
    pub error: String,
}

/// Status banner plus optional per-field validation errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Status {
    /// Severity
    pub level: StatusLevel,
    /// User-facing message
    pub message: String,
    /// Per-field validation errors (submit responses)
    pub field_errors: Vec<FieldError>,
}

impl Status {
    /// Builds an error-level status with the given message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Error,
            message: message.into(),
            field_errors: Vec::new(),
        }
    }
}

/// Keep-alive directive: GET `href` every `timeout` milliseconds, forever,
/// until superseded by a later directive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PingDirective {
    /// Target href
    pub href: String,
    /// Interval in milliseconds
    pub timeout: u64,
}

/// One-shot refresh directive: reload page `href` after `timeout`
/// milliseconds unless superseded or a newer request is issued first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshDirective {
    /// Page to reload
    pub href: String,
    /// Delay in milliseconds
    pub timeout: u64,
}

/// Authenticated user identity from a structure response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserInfo {
    /// Login name
    pub name: String,
    /// Realm role
    pub role: String,
}

/// A loaded content document placed into a tab or popup.
///
/// `main` and `right` are opaque render models; the core never inspects
/// them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Tab {
    /// Whether this tab is the active one
    pub active: bool,
    /// Page metadata (label, breadcrumbs, ...)
    pub page: Value,
    /// Main content sections
    pub main: Vec<Value>,
    /// Side content sections
    pub right: Vec<Value>,
}

/// Structured document returned by the backend.
///
/// Any combination of the optional parts may be present; [`body`] derives
/// the tagged variant that drives dispatch.
///
/// [`body`]: Self::body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerDocument {
    /// Status banner and field errors
    pub status: Option<Status>,
    /// Keep-alive directive
    pub ping: Option<PingDirective>,
    /// One-shot refresh directive
    pub refresh: Option<RefreshDirective>,
    /// Redirect target (page identifier or external URL)
    pub goto: Option<String>,
    /// Display placement override
    pub target: Option<String>,
    /// Navigation tree (structure responses)
    pub structure: Option<Vec<NavEntry>>,
    /// User identity (structure responses)
    pub user: Option<UserInfo>,
    /// Session token for mutating requests (structure responses)
    pub rtoken: Option<String>,
    /// Locale selected by the backend (structure responses)
    pub language: Option<String>,
    /// Page metadata (content responses)
    pub page: Option<Value>,
    /// Main content sections (content responses)
    pub main: Option<Vec<Value>>,
    /// Side content sections (content responses)
    pub right: Option<Vec<Value>>,
    /// Field definitions (field-change responses)
    pub fields: Option<Vec<FieldDefinition>>,
}

/// The dispatch-relevant body of a [`ServerDocument`], in priority order:
/// a redirect wins over a structure, a structure over page content.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentBody<'a> {
    /// Leave the current page
    Goto {
        /// Redirect target
        href: &'a str,
        /// Whether the target leaves the application
        external: bool,
    },
    /// Replace the navigation tree and session identity
    Structure {
        /// New navigation tree
        entries: &'a [NavEntry],
    },
    /// Place loaded content into a tab or popup
    Page {
        /// Page metadata
        page: &'a Value,
        /// Main content sections
        main: &'a [Value],
        /// Side content sections
        right: Option<&'a [Value]>,
    },
    /// Nothing to place
    Empty,
}

impl ServerDocument {
    /// Derives the tagged dispatch body.
    ///
    /// A `goto` is external when it points at an absolute URL or path, or
    /// when the document requests the `_blank` target.
    #[must_use]
    pub fn body(&self) -> DocumentBody<'_> {
        if let Some(href) = &self.goto {
            let external = self.target.as_deref() == Some("_blank")
                || href.starts_with("http")
                || href.starts_with('/');
            return DocumentBody::Goto { href, external };
        }
        if let Some(entries) = &self.structure {
            return DocumentBody::Structure { entries };
        }
        if let (Some(page), Some(main)) = (&self.page, &self.main) {
            return DocumentBody::Page {
                page,
                main,
                right: self.right.as_deref(),
            };
        }
        DocumentBody::Empty
    }
}
