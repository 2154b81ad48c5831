//! Transports
//!
//! [`Transport`] is the single seam between the engine and the network.
//! [`HttpTransport`] drives a blocking reqwest client on smol's blocking
//! pool so the single-threaded executor never stalls on I/O.

use reqwest::blocking::Client;
use reqwest::redirect::Policy;

use crate::{Method, NetError, Request, Response};

const USER_AGENT: &str = "hop/0.1 (partial-page navigation)";

/// Sends one request and yields its response
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn send(&self, request: Request) -> Result<Response, NetError>;
}

/// Resolves when a stylesheet has loaded (or failed to)
#[allow(async_fn_in_trait)]
pub trait StyleFetcher {
    async fn fetch_stylesheet(&self, href: &str) -> Result<(), NetError>;
}

/// HTTP transport over reqwest
///
/// Redirects are not followed: the endpoint client needs to see a 3xx on
/// form submission to re-fetch the target itself.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, NetError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .redirect(Policy::none())
            .build()
            .map_err(|e| NetError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Response, NetError> {
        tracing::debug!("HTTP {} {}", request.method.as_str(), request.url);
        let client = self.client.clone();
        smol::unblock(move || execute(&client, request)).await
    }
}

impl StyleFetcher for HttpTransport {
    async fn fetch_stylesheet(&self, href: &str) -> Result<(), NetError> {
        let response = self.send(Request::get(href)).await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(NetError::Http {
                status: response.status,
            })
        }
    }
}

fn execute(client: &Client, request: Request) -> Result<Response, NetError> {
    let mut builder = match request.method {
        Method::Get => client.get(&request.url),
        Method::Post => client.post(&request.url),
    };
    for (key, value) in &request.headers {
        builder = builder.header(key.as_str(), value.as_str());
    }
    if let Some(body) = request.body {
        builder = builder.body(body);
    }

    let response = builder
        .send()
        .map_err(|e| NetError::Network(e.to_string()))?;

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    let body = response
        .bytes()
        .map_err(|e| NetError::Network(e.to_string()))?
        .to_vec();

    tracing::trace!("HTTP {} -> {} ({} bytes)", request.url, status, body.len());
    Ok(Response {
        status,
        headers,
        body,
    })
}
