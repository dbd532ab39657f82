//! HTTP transport adapter
//!
//! Implements the core's [`Transport`] trait over `reqwest`: plain queries
//! go out as GET with query parameters, action requests as form-encoded
//! POST. Responses are JSON documents decoded into [`ServerDocument`].

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use pki_console_core::error::{CoreError, CoreResult};
use pki_console_core::traits::Transport;
use pki_console_core::types::{Request, ServerDocument};

/// Transport talking to the console backend over HTTP.
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
}

impl HttpTransport {
    /// Creates a transport for the backend reachable from `page_url`.
    ///
    /// A `backend_path` with a leading slash is treated as an absolute path
    /// on the page's host; otherwise it is appended to the page's path.
    #[must_use]
    pub fn new(page_url: &Url, backend_path: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: resolve_endpoint(page_url, backend_path),
        }
    }

    /// Creates a transport with a preconfigured client (timeouts, proxies,
    /// cookie store).
    #[must_use]
    pub fn with_client(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    /// The resolved backend endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &Request) -> CoreResult<ServerDocument> {
        let pairs = request.to_pairs();
        let builder = if request.is_mutation() {
            log::debug!("POST {} action = {:?}", self.endpoint, request.action);
            self.client.post(self.endpoint.clone()).form(&pairs)
        } else {
            log::debug!("GET {} page = {:?}", self.endpoint, request.page);
            self.client.get(self.endpoint.clone()).query(&pairs)
        };

        let response = builder
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        log::debug!("response status: {status}");
        if !status.is_success() {
            return Err(CoreError::HttpStatus {
                status: status.as_u16(),
            });
        }

        response
            .json::<ServerDocument>()
            .await
            .map_err(|e| CoreError::SerializationError(e.to_string()))
    }

    async fn ping(&self, href: &str) -> CoreResult<()> {
        let url = Url::parse(href)
            .or_else(|_| self.endpoint.join(href))
            .map_err(|e| CoreError::ConfigError(format!("invalid ping href \"{href}\": {e}")))?;
        self.client
            .get(url)
            .send()
            .await
            .map_err(map_transport_error)?;
        Ok(())
    }
}

fn map_transport_error(err: reqwest::Error) -> CoreError {
    if err.is_timeout() {
        CoreError::Timeout(err.to_string())
    } else {
        CoreError::NetworkError(err.to_string())
    }
}

/// Resolves the backend endpoint from the page URL and the configured
/// backend path.
fn resolve_endpoint(page_url: &Url, backend_path: &str) -> Url {
    let mut endpoint = page_url.clone();
    endpoint.set_query(None);
    endpoint.set_fragment(None);

    let path = if backend_path.starts_with('/') {
        backend_path.to_string()
    } else {
        format!(
            "{}/{}",
            page_url.path().trim_end_matches('/'),
            backend_path
        )
    };
    endpoint.set_path(&path);
    endpoint
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).expect("valid url")
    }

    #[test]
    fn absolute_backend_path_replaces_the_page_path() {
        let endpoint = resolve_endpoint(
            &url("https://pki.example.org/console/index.html"),
            "/cgi-bin/webui",
        );
        assert_eq!(endpoint.as_str(), "https://pki.example.org/cgi-bin/webui");
    }

    #[test]
    fn relative_backend_path_is_appended() {
        let endpoint = resolve_endpoint(&url("https://pki.example.org/console/"), "cgi-bin/webui");
        assert_eq!(
            endpoint.as_str(),
            "https://pki.example.org/console/cgi-bin/webui"
        );
    }

    #[test]
    fn query_and_fragment_are_dropped() {
        let endpoint = resolve_endpoint(
            &url("https://pki.example.org/console/?startat=5#top"),
            "backend",
        );
        assert_eq!(
            endpoint.as_str(),
            "https://pki.example.org/console/backend"
        );
    }

    #[test]
    fn transport_keeps_the_resolved_endpoint() {
        let transport = HttpTransport::new(&url("https://pki.example.org/console/"), "backend");
        assert_eq!(
            transport.endpoint().as_str(),
            "https://pki.example.org/console/backend"
        );
    }
}
