//! Blocking HTTP implementation of [`WorkflowStore`] for the n8n public API.
//!
//! Every call is a single request with a 30 s timeout. There are no retries;
//! failures map onto [`RemoteError`] so callers can tell a missing record
//! from a rejected request from an unreachable server.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use flowsync_core::types::{Tag, TagId, Workflow, WorkflowId, WorkflowPayload, WorkflowSummary};

use crate::error::RemoteError;
use crate::store::WorkflowStore;

pub const API_KEY_HEADER: &str = "X-N8N-API-KEY";
const PAGE_LIMIT: usize = 100;
const TIMEOUT: Duration = Duration::from_secs(30);

/// Reject base URLs that cannot be the REST API before any request is made.
pub fn validate_base_url(api_url: &str) -> Result<Url, RemoteError> {
    let invalid = |reason: &str| RemoteError::InvalidBaseUrl {
        url: api_url.to_string(),
        reason: reason.to_string(),
    };

    let parsed = Url::parse(api_url).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if parsed.path().contains("/home/workflows") {
        return Err(invalid(
            "this is the editor UI address; use https://<instance>/api/v1",
        ));
    }
    if parsed.host_str() == Some("app.n8n.cloud") {
        return Err(invalid(
            "app.n8n.cloud is the shared login host; use your instance host, \
             e.g. https://<name>.app.n8n.cloud/api/v1",
        ));
    }
    if !parsed.path().trim_end_matches('/').ends_with("/api/v1") {
        return Err(invalid("path must end in /api/v1"));
    }
    Ok(parsed)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    data: Vec<T>,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// n8n REST API client.
pub struct HttpStore {
    agent: ureq::Agent,
    base: String,
    api_key: String,
}

impl HttpStore {
    pub fn new(api_url: &str, api_key: &str) -> Result<Self, RemoteError> {
        validate_base_url(api_url)?;
        let agent = ureq::AgentBuilder::new().timeout(TIMEOUT).build();
        Ok(Self {
            agent,
            base: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Issue one request and return the body text of a 2xx response.
    ///
    /// `missing` names the resource when a 404 should surface as
    /// [`RemoteError::NotFound`] rather than a plain API error.
    fn send(
        &self,
        method: &str,
        url: &str,
        body: Option<Value>,
        missing: Option<&str>,
    ) -> Result<String, RemoteError> {
        tracing::debug!("{method} {url}");
        let request = self
            .agent
            .request(method, url)
            .set(API_KEY_HEADER, &self.api_key)
            .set("Accept", "application/json");
        let result = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        };

        match result {
            Ok(response) => {
                let status = response.status();
                let html = is_html_content_type(response.content_type());
                let text = response.into_string().map_err(|e| RemoteError::Transport {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
                if html || looks_like_html(&text) {
                    return Err(RemoteError::HtmlResponse { status });
                }
                Ok(text)
            }
            Err(ureq::Error::Status(status, response)) => {
                if status == 404 {
                    if let Some(resource) = missing {
                        return Err(RemoteError::NotFound {
                            resource: resource.to_string(),
                        });
                    }
                }
                let html = is_html_content_type(response.content_type());
                let body = response.into_string().unwrap_or_default();
                if html || looks_like_html(&body) {
                    return Err(RemoteError::HtmlResponse { status });
                }
                tracing::debug!("{method} {url} -> {status}");
                Err(RemoteError::Api { status, body })
            }
            Err(ureq::Error::Transport(transport)) => Err(RemoteError::Transport {
                url: url.to_string(),
                message: transport.to_string(),
            }),
        }
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        missing: Option<&str>,
    ) -> Result<T, RemoteError> {
        let text = self.send("GET", url, None, missing)?;
        decode(url, &text)
    }

    /// Follow `nextCursor` until the service reports no further page.
    fn paginate<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, RemoteError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let limit = PAGE_LIMIT.to_string();
            let mut params = vec![("limit", limit.as_str())];
            if let Some(cursor) = cursor.as_deref() {
                params.push(("cursor", cursor));
            }
            let url = Url::parse_with_params(&self.url(path), &params).map_err(|e| {
                RemoteError::InvalidBaseUrl {
                    url: self.base.clone(),
                    reason: e.to_string(),
                }
            })?;
            let page: Page<T> = self.get_json(url.as_str(), None)?;
            items.extend(page.data);

            match page.next_cursor.filter(|next| !next.is_empty()) {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                _ => break,
            }
        }
        Ok(items)
    }
}

fn decode<T: DeserializeOwned>(url: &str, text: &str) -> Result<T, RemoteError> {
    serde_json::from_str(text).map_err(|source| RemoteError::Decode {
        url: url.to_string(),
        source,
    })
}

fn is_html_content_type(content_type: &str) -> bool {
    content_type.eq_ignore_ascii_case("text/html")
}

fn looks_like_html(body: &str) -> bool {
    let head: String = body
        .trim_start()
        .chars()
        .take(9)
        .collect::<String>()
        .to_ascii_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html")
}

impl WorkflowStore for HttpStore {
    fn list(&self) -> Result<Vec<WorkflowSummary>, RemoteError> {
        self.paginate("/workflows")
    }

    fn get(&self, id: &WorkflowId) -> Result<Workflow, RemoteError> {
        let url = self.url(&format!("/workflows/{id}"));
        self.get_json(&url, Some(&format!("workflow {id}")))
    }

    fn create(&self, payload: &WorkflowPayload) -> Result<Workflow, RemoteError> {
        let url = self.url("/workflows");
        let body = serde_json::to_value(payload).map_err(|source| RemoteError::Decode {
            url: url.clone(),
            source,
        })?;
        let text = self.send("POST", &url, Some(body), None)?;
        decode(&url, &text)
    }

    fn update(&self, id: &WorkflowId, payload: &WorkflowPayload) -> Result<Workflow, RemoteError> {
        let url = self.url(&format!("/workflows/{id}"));
        let body = serde_json::to_value(payload).map_err(|source| RemoteError::Decode {
            url: url.clone(),
            source,
        })?;
        let text = self.send("PUT", &url, Some(body), Some(&format!("workflow {id}")))?;
        decode(&url, &text)
    }

    fn set_tags(&self, id: &WorkflowId, tags: &[TagId]) -> Result<(), RemoteError> {
        let url = self.url(&format!("/workflows/{id}/tags"));
        let body: Vec<Value> = tags.iter().map(|tag| json!({ "id": tag.0 })).collect();
        self.send("PUT", &url, Some(Value::Array(body)), None)?;
        Ok(())
    }

    fn list_tags(&self) -> Result<Vec<Tag>, RemoteError> {
        self.paginate("/tags")
    }

    fn create_tag(&self, name: &str) -> Result<Tag, RemoteError> {
        let url = self.url("/tags");
        let text = self.send("POST", &url, Some(json!({ "name": name })), None)?;
        decode(&url, &text)
    }

    fn activate(&self, id: &WorkflowId) -> Result<(), RemoteError> {
        let url = self.url(&format!("/workflows/{id}/activate"));
        self.send("POST", &url, None, None)?;
        Ok(())
    }

    fn deactivate(&self, id: &WorkflowId) -> Result<(), RemoteError> {
        let url = self.url(&format!("/workflows/{id}/deactivate"));
        self.send("POST", &url, None, None)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
