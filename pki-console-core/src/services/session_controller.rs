//! Navigation and response dispatch

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, RwLock};

use crate::error::CoreResult;
use crate::services::{ContentState, SessionContext};
use crate::types::{
    DocumentBody, ParamValue, PingDirective, RefreshDirective, Request, ServerDocument, Status, Tab,
};
use crate::utils::timer::TimerHandle;

/// Pages that force a structure bootstrap before their content is loaded.
const NEED_REBOOT: [&str; 4] = ["login", "logout", "login!logout", "welcome"];

/// Status banner shown when the backend cannot be reached.
const TRANSPORT_ERROR_MESSAGE: &str =
    "The server could not be reached. Please check your connection and try again.";

/// Optional navigation parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationParams {
    /// Result page size
    pub limit: Option<u32>,
    /// Result page offset
    pub startat: Option<u32>,
    /// Retriggers an otherwise identical transition; carries no request
    /// parameter of its own
    pub force: bool,
}

/// Resolved display placement for a content response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Popup,
    Tab,
    Active,
    Top,
}

impl Placement {
    /// Resolves the requested placement against the current state. The
    /// pseudo-target "self" picks the currently active place: an open
    /// popup, the active tab when several are open, or top.
    fn resolve(requested: Option<&str>, content: &ContentState) -> Self {
        let mut target = requested.unwrap_or("self");
        if target == "modal" {
            // legacy naming
            target = "popup";
        }
        if target == "self" {
            if content.popup.is_some() {
                target = "popup";
            } else if content.tabs.len() > 1 {
                target = "active";
            } else {
                target = "top";
            }
        }
        match target {
            "popup" => Self::Popup,
            "tab" => Self::Tab,
            "active" => Self::Active,
            _ => Self::Top,
        }
    }
}

/// What applying a response asked the caller to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DispatchOutcome {
    /// State updated, nothing further
    Applied,
    /// Re-enter navigation for an internal page
    InternalRedirect(String),
    /// The routing collaborator leaves the app via `ContentState::redirect`
    ExternalRedirect,
}

/// Orchestrates navigation transitions: issues requests through the
/// transport, interprets structured responses, mutates [`ContentState`]
/// and manages the ping/refresh timers.
///
/// All work is event-driven and non-blocking; responses are applied in
/// completion order. There is no request sequencing: a slower earlier
/// response can overwrite a faster later one (last write wins).
pub struct SessionController {
    ctx: SessionContext,
    content: RwLock<ContentState>,
    revision: watch::Sender<u64>,
}

impl SessionController {
    /// Creates a controller for a fresh session.
    #[must_use]
    pub fn new(ctx: SessionContext) -> Arc<Self> {
        let (revision, _) = watch::channel(0);
        Arc::new(Self {
            ctx,
            content: RwLock::new(ContentState::new()),
            revision,
        })
    }

    /// The session state, read by collaborators as a model. Mutate it only
    /// through the controller and the operations on [`ContentState`].
    #[must_use]
    pub fn content(&self) -> &RwLock<ContentState> {
        &self.content
    }

    /// Subscribes to state-change notifications. The value is a revision
    /// counter bumped after every applied response or tab operation.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|v| *v += 1);
    }

    /// Navigates to `page`.
    ///
    /// Loads the base structure first when the navigation tree is still
    /// empty or the page requires a reboot (login/logout/welcome), then
    /// loads the page content. Pages that are part of the navigation tree
    /// load as the single top view.
    pub fn navigate<'a>(
        self: &'a Arc<Self>,
        page: &'a str,
        params: NavigationParams,
    ) -> Pin<Box<dyn Future<Output = CoreResult<ServerDocument>> + Send + 'a>> {
        Box::pin(async move {
        log::debug!("navigate: page = {page}");
        if params.force {
            log::debug!("navigate: forced reload of {page}");
        }

        let needs_bootstrap = {
            let content = self.content.read().await;
            content.nav_entries.is_empty() || NEED_REBOOT.contains(&page)
        };
        if needs_bootstrap {
            let bootstrap = Request::for_page("bootstrap!structure")
                .with_param("baseurl", self.ctx.config.base_path.clone());
            self.send_request(bootstrap).await?;
        }

        let mut request = Request::for_page(page);
        if let Some(limit) = params.limit {
            request = request.with_param("limit", limit.to_string());
        }
        if let Some(startat) = params.startat {
            request = request.with_param("startat", startat.to_string());
        }

        // load as top content if the page is part of the navigation tree
        let top = {
            let content = self.content.read().await;
            content.nav_contains(page) || NEED_REBOOT.contains(&page)
        };
        if top {
            request = request.with_target("top");
        }

        let (doc, outcome) = self.round_trip(request).await?;
        if outcome == DispatchOutcome::Applied {
            let mut content = self.content.write().await;
            content.page = Some(page.to_string());
            content.recompute_active_state();
            drop(content);
            self.bump_revision();
        }
        Ok(doc)
        })
    }

    /// Sends a request and applies the response to the session state.
    ///
    /// Transport failures are recovered here: the caller always receives a
    /// resolved (possibly empty) document, with the failure surfaced as an
    /// error status banner.
    pub async fn send_request(self: &Arc<Self>, request: Request) -> CoreResult<ServerDocument> {
        let (doc, _) = self.round_trip(request).await?;
        Ok(doc)
    }

    async fn round_trip(
        self: &Arc<Self>,
        mut request: Request,
    ) -> CoreResult<(ServerDocument, DispatchOutcome)> {
        log::debug!(
            "send_request: page = {:?}, action = {:?}",
            request.page,
            request.action
        );

        // The display placement is resolved against the state at request
        // time, not at response time.
        let placement = {
            let mut content = self.content.write().await;
            content.is_loading = true;
            // a pending one-shot refresh never survives a newer request
            content.cancel_refresh_timer();

            request.params.insert(
                "_".to_string(),
                ParamValue::Single(Utc::now().timestamp_millis().to_string()),
            );
            if request.is_mutation() {
                if let Some(token) = &content.rtoken {
                    request
                        .params
                        .insert("_rtoken".to_string(), ParamValue::Single(token.clone()));
                }
            }

            Placement::resolve(request.target.as_deref(), &content)
        };
        self.bump_revision();

        let doc = match self.ctx.transport.send(&request).await {
            Ok(doc) => doc,
            Err(err) => {
                if err.is_expected() {
                    log::warn!("request failed: {err}");
                } else {
                    log::error!("request failed: {err}");
                }
                let mut content = self.content.write().await;
                content.is_loading = false;
                content.status = Some(Status::error(TRANSPORT_ERROR_MESSAGE));
                drop(content);
                self.bump_revision();
                return Ok((ServerDocument::default(), DispatchOutcome::Applied));
            }
        };

        let outcome = self.apply_document(&doc, placement).await;
        self.bump_revision();

        if let DispatchOutcome::InternalRedirect(target) = &outcome {
            log::debug!("goto: internal transition to {target}");
            // navigate returns a boxed Send future, which breaks the
            // navigate -> round_trip -> navigate type cycle
            self.navigate(target, NavigationParams::default()).await?;
        }
        Ok((doc, outcome))
    }

    /// Applies a structured response to the session state.
    async fn apply_document(
        self: &Arc<Self>,
        doc: &ServerDocument,
        placement: Placement,
    ) -> DispatchOutcome {
        let mut content = self.content.write().await;

        content.status = doc.status.clone();
        content.popup = None;

        if let Some(ping) = &doc.ping {
            log::debug!("response directive: ping {} every {}ms", ping.href, ping.timeout);
            self.schedule_ping(&mut content, ping);
        }
        if let Some(refresh) = &doc.refresh {
            log::debug!(
                "response directive: refresh {} in {}ms",
                refresh.href,
                refresh.timeout
            );
            self.schedule_refresh(&mut content, refresh);
        }

        match doc.body() {
            DocumentBody::Goto { href, external } => {
                if external {
                    log::debug!("goto: leaving the application for {href}");
                    content.redirect = Some(href.to_string());
                    DispatchOutcome::ExternalRedirect
                } else {
                    DispatchOutcome::InternalRedirect(href.to_string())
                }
            }
            DocumentBody::Structure { entries } => {
                log::debug!("response: structure ({} entries)", entries.len());
                content.nav_entries = entries.to_vec();
                content.recompute_active_state();
                content.user = doc.user.clone();
                content.rtoken = doc.rtoken.clone();
                if let Some(language) = &doc.language {
                    log::debug!("response: setting locale to {language}");
                    self.ctx.localizer.set_locale(language);
                }
                DispatchOutcome::Applied
            }
            DocumentBody::Page { page, main, right } => {
                log::debug!("response: page content");
                let tab = Tab {
                    active: true,
                    page: page.clone(),
                    main: main.to_vec(),
                    right: right.map(<[_]>::to_vec).unwrap_or_default(),
                };
                match placement {
                    Placement::Popup => content.popup = Some(tab),
                    Placement::Tab => {
                        for t in &mut content.tabs {
                            t.active = false;
                        }
                        content.tabs.push(tab);
                    }
                    Placement::Active => {
                        if let Some(index) = content.tabs.iter().position(|t| t.active) {
                            content.tabs[index] = tab;
                        } else {
                            content.tabs = vec![tab];
                        }
                    }
                    Placement::Top => content.tabs = vec![tab],
                }
                content.is_loading = false;
                DispatchOutcome::Applied
            }
            DocumentBody::Empty => {
                content.is_loading = false;
                DispatchOutcome::Applied
            }
        }
    }

    /// Replaces the keep-alive timer with a recurring task that GETs the
    /// directive's href until superseded or the session ends.
    fn schedule_ping(&self, content: &mut ContentState, directive: &PingDirective) {
        content.cancel_ping_timer();
        let transport = Arc::clone(&self.ctx.transport);
        let href = directive.href.clone();
        let interval = Duration::from_millis(directive.timeout);
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if let Err(err) = transport.ping(&href).await {
                    log::warn!("keep-alive ping to {href} failed: {err}");
                }
            }
        });
        content.ping_timer = Some(TimerHandle::new(handle));
    }

    /// Replaces the refresh timer with a one-shot task that reloads the
    /// directive's page.
    fn schedule_refresh(self: &Arc<Self>, content: &mut ContentState, directive: &RefreshDirective) {
        content.cancel_refresh_timer();
        let session = Arc::downgrade(self);
        let href = directive.href.clone();
        let delay = Duration::from_millis(directive.timeout);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(session) = session.upgrade() else {
                return;
            };
            if let Err(err) = session.send_request(Request::for_page(&href)).await {
                log::warn!("scheduled refresh of {href} failed: {err}");
            }
        });
        content.refresh_timer = Some(TimerHandle::new(handle));
    }

    /// Activates the tab at `index`.
    pub async fn activate_tab(&self, index: usize) {
        self.content.write().await.activate_tab(index);
        self.bump_revision();
    }

    /// Closes the tab at `index`.
    pub async fn close_tab(&self, index: usize) {
        self.content.write().await.close_tab(index);
        self.bump_revision();
    }

    /// Discards the popup.
    pub async fn clear_popup(&self) {
        self.content.write().await.clear_popup();
        self.bump_revision();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_session, doc, page_doc, structure_doc};
    use crate::types::StatusLevel;
    use serde_json::json;

    #[tokio::test]
    async fn first_navigation_bootstraps_the_structure() {
        let (session, transport, _) = create_test_session();
        transport.enqueue(structure_doc(&["home", "certs"])).await;
        transport.enqueue(page_doc("Home")).await;

        session
            .navigate("home", NavigationParams::default())
            .await
            .unwrap();

        let sent = transport.sent_requests().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].page.as_deref(), Some("bootstrap!structure"));
        assert_eq!(
            sent[0].params.get("baseurl"),
            Some(&ParamValue::Single("/console".to_string()))
        );
        // "home" is part of the freshly loaded navigation tree
        assert_eq!(sent[1].page.as_deref(), Some("home"));
        assert_eq!(sent[1].target.as_deref(), Some("top"));

        let content = session.content().read().await;
        assert_eq!(content.page.as_deref(), Some("home"));
        assert!(content.nav_entries[0].active);
        assert_eq!(content.tabs.len(), 1);
        assert_eq!(content.user.as_ref().map(|u| u.name.as_str()), Some("alice"));
        assert_eq!(content.rtoken.as_deref(), Some("token-1"));
    }

    #[tokio::test]
    async fn known_structure_skips_the_bootstrap() {
        let (session, transport, _) = create_test_session();
        transport.enqueue(structure_doc(&["home"])).await;
        transport.enqueue(page_doc("Home")).await;
        session
            .navigate("home", NavigationParams::default())
            .await
            .unwrap();

        transport.enqueue(page_doc("Detail")).await;
        session
            .navigate("certificate!detail!id!42", NavigationParams::default())
            .await
            .unwrap();

        let sent = transport.sent_requests().await;
        assert_eq!(sent.len(), 3);
        // pages outside the navigation tree load into the current placement
        assert_eq!(sent[2].page.as_deref(), Some("certificate!detail!id!42"));
        assert_eq!(sent[2].target, None);
    }

    #[tokio::test]
    async fn reboot_pages_always_bootstrap() {
        let (session, transport, _) = create_test_session();
        transport.enqueue(structure_doc(&["home"])).await;
        transport.enqueue(page_doc("Home")).await;
        session
            .navigate("home", NavigationParams::default())
            .await
            .unwrap();

        transport.enqueue(structure_doc(&["home"])).await;
        transport.enqueue(page_doc("Login")).await;
        session
            .navigate("login", NavigationParams::default())
            .await
            .unwrap();

        let sent = transport.sent_requests().await;
        assert_eq!(sent[2].page.as_deref(), Some("bootstrap!structure"));
        assert_eq!(sent[3].page.as_deref(), Some("login"));
        assert_eq!(sent[3].target.as_deref(), Some("top"));
    }

    #[tokio::test]
    async fn pagination_parameters_are_forwarded() {
        let (session, transport, _) = create_test_session();
        transport.enqueue(structure_doc(&["home"])).await;
        transport.enqueue(page_doc("Home")).await;

        session
            .navigate(
                "home",
                NavigationParams {
                    limit: Some(25),
                    startat: Some(50),
                    force: true,
                },
            )
            .await
            .unwrap();

        let sent = transport.sent_requests().await;
        assert_eq!(
            sent[1].params.get("limit"),
            Some(&ParamValue::Single("25".to_string()))
        );
        assert_eq!(
            sent[1].params.get("startat"),
            Some(&ParamValue::Single("50".to_string()))
        );
        // "force" only retriggers the transition, it is not a parameter
        assert!(!sent[1].params.contains_key("force"));
    }

    #[tokio::test]
    async fn requests_carry_a_cache_buster_and_mutations_the_token() {
        let (session, transport, _) = create_test_session();
        transport.enqueue(structure_doc(&["home"])).await;
        session.send_request(Request::for_page("home")).await.unwrap();

        transport.enqueue(ServerDocument::default()).await;
        session
            .send_request(Request::for_action("certificate!revoke"))
            .await
            .unwrap();

        let sent = transport.sent_requests().await;
        assert!(sent[0].params.contains_key("_"));
        assert!(!sent[0].params.contains_key("_rtoken"));
        assert!(sent[1].params.contains_key("_"));
        assert_eq!(
            sent[1].params.get("_rtoken"),
            Some(&ParamValue::Single("token-1".to_string()))
        );
    }

    #[tokio::test]
    async fn single_view_content_replaces_the_tab_list() {
        let (session, transport, _) = create_test_session();
        transport.enqueue(page_doc("One")).await;
        session.send_request(Request::for_page("one")).await.unwrap();
        transport.enqueue(page_doc("Two")).await;
        session.send_request(Request::for_page("two")).await.unwrap();

        let content = session.content().read().await;
        assert_eq!(content.tabs.len(), 1);
        assert_eq!(content.tabs[0].page, json!({"label": "Two"}));
        assert!(content.tabs[0].active);
        assert!(!content.is_loading);
    }

    #[tokio::test]
    async fn tab_target_appends_and_deactivates_the_rest() {
        let (session, transport, _) = create_test_session();
        transport.enqueue(page_doc("One")).await;
        session.send_request(Request::for_page("one")).await.unwrap();
        transport.enqueue(page_doc("Two")).await;
        session
            .send_request(Request::for_page("two").with_target("tab"))
            .await
            .unwrap();

        let content = session.content().read().await;
        assert_eq!(content.tabs.len(), 2);
        assert!(!content.tabs[0].active);
        assert!(content.tabs[1].active);
        assert!(content.show_tabs());
    }

    #[tokio::test]
    async fn self_target_replaces_the_active_tab_in_place() {
        let (session, transport, _) = create_test_session();
        transport.enqueue(page_doc("One")).await;
        session.send_request(Request::for_page("one")).await.unwrap();
        transport.enqueue(page_doc("Two")).await;
        session
            .send_request(Request::for_page("two").with_target("tab"))
            .await
            .unwrap();
        session.activate_tab(0).await;

        // with more than one tab open, "self" resolves to the active tab
        transport.enqueue(page_doc("Replacement")).await;
        session.send_request(Request::for_page("three")).await.unwrap();

        let content = session.content().read().await;
        assert_eq!(content.tabs.len(), 2);
        assert_eq!(content.tabs[0].page, json!({"label": "Replacement"}));
        assert!(content.tabs[0].active);
        assert_eq!(content.tabs[1].page, json!({"label": "Two"}));
    }

    #[tokio::test]
    async fn popup_target_and_legacy_modal_alias() {
        let (session, transport, _) = create_test_session();
        transport.enqueue(page_doc("Dialog")).await;
        session
            .send_request(Request::for_page("confirm").with_target("modal"))
            .await
            .unwrap();

        {
            let content = session.content().read().await;
            assert!(content.popup.is_some());
            assert!(content.tabs.is_empty());
        }

        // an open popup makes "self" resolve to the popup
        transport.enqueue(page_doc("Dialog 2")).await;
        session.send_request(Request::for_page("confirm2")).await.unwrap();
        let content = session.content().read().await;
        assert_eq!(
            content.popup.as_ref().map(|p| p.page.clone()),
            Some(json!({"label": "Dialog 2"}))
        );
    }

    #[tokio::test]
    async fn every_response_clears_the_popup_first() {
        let (session, transport, _) = create_test_session();
        transport.enqueue(page_doc("Dialog")).await;
        session
            .send_request(Request::for_page("confirm").with_target("popup"))
            .await
            .unwrap();

        transport
            .enqueue(doc(json!({"status": {"level": "success", "message": "done"}})))
            .await;
        session
            .send_request(Request::for_page("anything").with_target("top"))
            .await
            .unwrap();

        let content = session.content().read().await;
        assert_eq!(content.popup, None);
        assert_eq!(
            content.status.as_ref().map(|s| s.message.clone()),
            Some("done".to_string())
        );
    }

    #[tokio::test]
    async fn structure_response_switches_the_locale() {
        let (session, transport, localizer) = create_test_session();
        let mut structure = structure_doc(&["home"]);
        structure.language = Some("de-DE".to_string());
        transport.enqueue(structure).await;

        session.send_request(Request::for_page("bootstrap!structure")).await.unwrap();
        assert_eq!(localizer.locales(), vec!["de-DE".to_string()]);
    }

    #[tokio::test]
    async fn internal_goto_reenters_navigation() {
        let (session, transport, _) = create_test_session();
        // bootstrap, then the content response redirects to "welcome",
        // which as a reboot page bootstraps again before loading
        transport.enqueue(structure_doc(&["home", "welcome"])).await;
        transport.enqueue(doc(json!({"goto": "welcome"}))).await;
        transport.enqueue(structure_doc(&["home", "welcome"])).await;
        transport.enqueue(page_doc("Welcome")).await;

        session
            .navigate("home", NavigationParams::default())
            .await
            .unwrap();

        let sent = transport.sent_requests().await;
        let pages: Vec<Option<&str>> = sent.iter().map(|r| r.page.as_deref()).collect();
        assert_eq!(
            pages,
            vec![
                Some("bootstrap!structure"),
                Some("home"),
                Some("bootstrap!structure"),
                Some("welcome"),
            ]
        );
        let content = session.content().read().await;
        assert_eq!(content.page.as_deref(), Some("welcome"));
    }

    #[tokio::test]
    async fn external_goto_records_a_redirect() {
        let (session, transport, _) = create_test_session();
        transport
            .enqueue(doc(json!({"goto": "https://ca.example.org/crl"})))
            .await;
        session.send_request(Request::for_page("crl")).await.unwrap();

        let mut content = session.content().write().await;
        assert_eq!(
            content.take_redirect().as_deref(),
            Some("https://ca.example.org/crl")
        );
        // no navigation request was issued for the external target
        drop(content);
        assert_eq!(transport.sent_requests().await.len(), 1);
    }

    #[tokio::test]
    async fn transport_failure_degrades_to_a_status_banner() {
        let (session, transport, _) = create_test_session();
        transport
            .enqueue_error(crate::error::CoreError::NetworkError("boom".to_string()))
            .await;

        let result = session.send_request(Request::for_page("home")).await.unwrap();
        assert_eq!(result, ServerDocument::default());

        let content = session.content().read().await;
        assert!(!content.is_loading);
        assert_eq!(
            content.status.as_ref().map(|s| s.level),
            Some(StatusLevel::Error)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_directive_is_superseded_by_a_newer_one() {
        let (session, transport, _) = create_test_session();
        transport
            .enqueue(doc(json!({"refresh": {"href": "p", "timeout": 5000}})))
            .await;
        session.send_request(Request::for_page("start")).await.unwrap();

        transport
            .enqueue(doc(json!({"refresh": {"href": "q", "timeout": 1000}})))
            .await;
        session.send_request(Request::for_page("next")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(10_000)).await;

        let sent = transport.sent_requests().await;
        let fired: Vec<&str> = sent.iter().filter_map(|r| r.page.as_deref()).collect();
        assert!(fired.contains(&"q"));
        assert!(!fired.contains(&"p"));
        assert_eq!(fired.iter().filter(|p| **p == "q").count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ping_directive_polls_until_replaced() {
        let (session, transport, _) = create_test_session();
        transport
            .enqueue(doc(json!({"ping": {"href": "/heartbeat", "timeout": 1000}})))
            .await;
        session.send_request(Request::for_page("start")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        let first_count = session_pings(&transport, "/heartbeat").await;
        assert!(first_count >= 3);

        transport
            .enqueue(doc(json!({"ping": {"href": "/heartbeat2", "timeout": 1000}})))
            .await;
        session.send_request(Request::for_page("next")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(3_000)).await;
        assert_eq!(session_pings(&transport, "/heartbeat").await, first_count);
        assert!(session_pings(&transport, "/heartbeat2").await >= 2);
    }

    async fn session_pings(
        transport: &crate::test_utils::MockTransport,
        href: &str,
    ) -> usize {
        transport
            .pings()
            .await
            .iter()
            .filter(|p| p.as_str() == href)
            .count()
    }

    #[tokio::test]
    async fn revision_bumps_on_every_applied_response() {
        let (session, transport, _) = create_test_session();
        let rx = session.subscribe();
        let before = *rx.borrow();

        transport.enqueue(page_doc("One")).await;
        session.send_request(Request::for_page("one")).await.unwrap();

        assert!(*rx.borrow() > before);
    }
}
