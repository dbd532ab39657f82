//! 测试辅助模块
//!
//! Mock collaborators and factory methods shared by the service tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CoreResult;
use crate::services::{SessionConfig, SessionContext, SessionController};
use crate::traits::{Localizer, Transport};
use crate::types::{FieldDefinition, FormDefinition, Request, ServerDocument};

// ===== MockTransport =====

/// Transport fed with scripted responses; records everything it is asked
/// to send. An exhausted script answers with empty documents.
pub struct MockTransport {
    responses: RwLock<VecDeque<CoreResult<ServerDocument>>>,
    sent: RwLock<Vec<Request>>,
    pings: RwLock<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            responses: RwLock::new(VecDeque::new()),
            sent: RwLock::new(Vec::new()),
            pings: RwLock::new(Vec::new()),
        }
    }

    pub async fn enqueue(&self, doc: ServerDocument) {
        self.responses.write().await.push_back(Ok(doc));
    }

    pub async fn enqueue_error(&self, err: crate::error::CoreError) {
        self.responses.write().await.push_back(Err(err));
    }

    pub async fn sent_requests(&self) -> Vec<Request> {
        self.sent.read().await.clone()
    }

    pub async fn pings(&self) -> Vec<String> {
        self.pings.read().await.clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &Request) -> CoreResult<ServerDocument> {
        self.sent.write().await.push(request.clone());
        self.responses
            .write()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(ServerDocument::default()))
    }

    async fn ping(&self, href: &str) -> CoreResult<()> {
        self.pings.write().await.push(href.to_string());
        Ok(())
    }
}

// ===== MockLocalizer =====

/// Localizer that records every locale it was switched to.
pub struct MockLocalizer {
    locales: std::sync::Mutex<Vec<String>>,
}

impl MockLocalizer {
    pub fn new() -> Self {
        Self {
            locales: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn locales(&self) -> Vec<String> {
        self.locales.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl Localizer for MockLocalizer {
    fn set_locale(&self, language_tag: &str) {
        if let Ok(mut locales) = self.locales.lock() {
            locales.push(language_tag.to_string());
        }
    }
}

// ===== 工厂方法 =====

/// Creates a controller wired to mock collaborators.
pub fn create_test_session() -> (
    Arc<SessionController>,
    Arc<MockTransport>,
    Arc<MockLocalizer>,
) {
    let transport = Arc::new(MockTransport::new());
    let localizer = Arc::new(MockLocalizer::new());
    let ctx = SessionContext::new(
        transport.clone(),
        localizer.clone(),
        SessionConfig {
            base_path: "/console".to_string(),
        },
    );
    (SessionController::new(ctx), transport, localizer)
}

/// Parses a field definition from JSON.
pub fn field_def(json: serde_json::Value) -> FieldDefinition {
    serde_json::from_value(json).expect("valid field definition")
}

/// Parses a form definition from JSON.
pub fn form_def(json: serde_json::Value) -> FormDefinition {
    serde_json::from_value(json).expect("valid form definition")
}

/// Parses a server document from JSON.
pub fn doc(json: serde_json::Value) -> ServerDocument {
    serde_json::from_value(json).expect("valid server document")
}

/// A structure document with the given top-level navigation keys.
pub fn structure_doc(keys: &[&str]) -> ServerDocument {
    doc(serde_json::json!({
        "structure": keys
            .iter()
            .map(|k| serde_json::json!({"key": k, "label": k}))
            .collect::<Vec<_>>(),
        "user": {"name": "alice", "role": "RA Operator"},
        "rtoken": "token-1",
    }))
}

/// A content document with the given page label.
pub fn page_doc(label: &str) -> ServerDocument {
    doc(serde_json::json!({
        "page": {"label": label},
        "main": [{"type": "text", "content": {"label": label}}],
    }))
}
