//! hop Networking
//!
//! The boundary to the server endpoint: a minimal request/response model,
//! the [`Transport`] seam, JSON envelopes, and the [`EndpointClient`]
//! speaking the refresh-token / load / submit-form actions.

mod endpoint;
mod envelope;
mod loader;
mod transport;

pub use endpoint::{EndpointClient, actions};
pub use envelope::{Envelope, PageData, TokenData};
pub use loader::{Method, Request};
pub use transport::{HttpTransport, StyleFetcher, Transport};
pub use url::Url;

/// HTTP Response
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    /// Build a response with a body
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 3xx status
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    /// Header lookup (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body as UTF-8 text (lossy)
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Network error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetError {
    #[error("Network error: {status}")]
    Http { status: u16 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Malformed response: {0}")]
    Decode(String),

    /// `success: false` envelope, carrying the server message
    #[error("{0}")]
    Rejected(String),
}

impl NetError {
    /// Whether the failure came from the server's envelope rather than
    /// the transport
    pub fn is_rejection(&self) -> bool {
        matches!(self, NetError::Rejected(_))
    }
}
