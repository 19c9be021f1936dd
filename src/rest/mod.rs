use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::common::errors::TransportError;
use crate::config::ApiConfig;
use crate::protocol::events::SessionSnapshot;

/// The outbound command surface, as an interface so tests can substitute
/// an in-memory fake for the HTTP client.
///
/// The play/enqueue/clear calls are fire-and-forget (no defined success
/// body); the control endpoints answer with a snapshot of the updated
/// track/queue context that the gateway reconciles canonically.
#[async_trait]
pub trait CommandTransport: Send + Sync {
    async fn play(&self, resource: &str) -> Result<(), TransportError>;
    async fn queue_ids(&self, ids: &[String]) -> Result<(), TransportError>;
    async fn previous(&self) -> Result<SessionSnapshot, TransportError>;
    async fn pause(&self) -> Result<SessionSnapshot, TransportError>;
    async fn skip(&self) -> Result<SessionSnapshot, TransportError>;
    async fn shuffle(&self) -> Result<SessionSnapshot, TransportError>;
    async fn clear_queue(&self) -> Result<(), TransportError>;
    async fn jump(&self, index: usize) -> Result<SessionSnapshot, TransportError>;
    async fn remove_index(&self, index: usize) -> Result<SessionSnapshot, TransportError>;
    async fn reorder(
        &self,
        selected: &[usize],
        pos: usize,
    ) -> Result<SessionSnapshot, TransportError>;
    /// Full authoritative re-fetch, used by the reconnect path.
    async fn session_snapshot(&self) -> Result<SessionSnapshot, TransportError>;
}

/// HTTP implementation of the command surface.
pub struct RestClient {
    client: Client,
    base_url: String,
    session_cookie: Option<String>,
}

impl RestClient {
    pub fn new(config: &ApiConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session_cookie: config.session.clone(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, format!("{}{path}", self.base_url));
        if let Some(cookie) = &self.session_cookie {
            // Opaque session identifier, passed through untouched.
            builder = builder.header(reqwest::header::COOKIE, cookie);
        }
        builder
    }

    async fn post_empty(&self, path: &str) -> Result<(), TransportError> {
        let response = self.request(reqwest::Method::POST, path).send().await?;
        check_status(&response)?;
        Ok(())
    }

    async fn post_snapshot(&self, path: &str) -> Result<SessionSnapshot, TransportError> {
        let response = self.request(reqwest::Method::POST, path).send().await?;
        check_status(&response)?;
        response
            .json::<SessionSnapshot>()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))
    }
}

fn check_status(response: &reqwest::Response) -> Result<(), TransportError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(TransportError::Status {
            status: status.as_u16(),
        })
    }
}

#[async_trait]
impl CommandTransport for RestClient {
    async fn play(&self, resource: &str) -> Result<(), TransportError> {
        let response = self
            .request(reqwest::Method::POST, "/play")
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(resource.to_string())
            .send()
            .await?;
        check_status(&response)
    }

    async fn queue_ids(&self, ids: &[String]) -> Result<(), TransportError> {
        let response = self
            .request(reqwest::Method::POST, "/queueIds")
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(ids.join(","))
            .send()
            .await?;
        check_status(&response)
    }

    async fn previous(&self) -> Result<SessionSnapshot, TransportError> {
        self.post_snapshot("/controls/previous").await
    }

    async fn pause(&self) -> Result<SessionSnapshot, TransportError> {
        self.post_snapshot("/controls/pause").await
    }

    async fn skip(&self) -> Result<SessionSnapshot, TransportError> {
        self.post_snapshot("/controls/skip").await
    }

    async fn shuffle(&self) -> Result<SessionSnapshot, TransportError> {
        self.post_snapshot("/controls/shuffle").await
    }

    async fn clear_queue(&self) -> Result<(), TransportError> {
        let response = self.request(reqwest::Method::DELETE, "/queue").send().await?;
        check_status(&response)
    }

    async fn jump(&self, index: usize) -> Result<SessionSnapshot, TransportError> {
        self.post_snapshot(&format!("/controls/jump?index={index}")).await
    }

    async fn remove_index(&self, index: usize) -> Result<SessionSnapshot, TransportError> {
        self.post_snapshot(&format!("/controls/remove?index={index}")).await
    }

    async fn reorder(
        &self,
        selected: &[usize],
        pos: usize,
    ) -> Result<SessionSnapshot, TransportError> {
        let response = self
            .request(reqwest::Method::POST, "/controls/reorder")
            .json(&serde_json::json!({ "selected": selected, "pos": pos }))
            .send()
            .await?;
        check_status(&response)?;
        response
            .json::<SessionSnapshot>()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))
    }

    async fn session_snapshot(&self) -> Result<SessionSnapshot, TransportError> {
        let response = self.request(reqwest::Method::GET, "/session").send().await?;
        check_status(&response)?;
        response
            .json::<SessionSnapshot>()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))
    }
}
