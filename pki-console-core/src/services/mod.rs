//! 会话与表单服务层

mod content_state;
mod form_engine;
mod session_controller;

pub use content_state::ContentState;
pub use form_engine::{FormEngine, SubmitOutcome};
pub use session_controller::{NavigationParams, SessionController};

use std::sync::Arc;

use crate::traits::{Localizer, Transport};

/// Static session configuration supplied by the embedding application.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Path of the page hosting the console, sent as `baseurl` with the
    /// structure bootstrap request
    pub base_path: String,
}

/// 会话上下文 - 持有所有依赖
///
/// The embedding platform creates this context and injects its collaborator
/// implementations.
pub struct SessionContext {
    /// Backend transport
    pub transport: Arc<dyn Transport>,
    /// Localization collaborator
    pub localizer: Arc<dyn Localizer>,
    /// Static configuration
    pub config: SessionConfig,
}

impl SessionContext {
    /// Creates a session context.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        localizer: Arc<dyn Localizer>,
        config: SessionConfig,
    ) -> Self {
        Self {
            transport,
            localizer,
            config,
        }
    }
}
