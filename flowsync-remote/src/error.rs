//! Error types for flowsync-remote.

use thiserror::Error;

/// All errors that can arise from talking to a workflow store.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Non-2xx response. Status and body are kept verbatim.
    #[error("remote API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// 404 on a single-record read or write.
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// No response at all.
    #[error(
        "could not reach {url}: {message}\n\
         check network connectivity and the api_url in your environment config"
    )]
    Transport { url: String, message: String },

    /// The server answered with a web page instead of JSON.
    #[error(
        "received HTML instead of JSON (HTTP {status}); \
         api_url must point at the REST API (https://<instance>/api/v1), not the editor UI"
    )]
    HtmlResponse { status: u16 },

    /// The body was not the JSON shape we expected.
    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// `api_url` failed validation before any request was made.
    #[error("invalid api_url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound { .. })
    }

    /// True when the request never produced a response.
    pub fn is_transport(&self) -> bool {
        matches!(self, RemoteError::Transport { .. })
    }
}
