//! Endpoint client
//!
//! Speaks the three endpoint actions over any [`Transport`].

use url::Url;

use crate::{Envelope, NetError, PageData, Request, Response, TokenData, Transport};

/// Action names posted in the `action` field
pub mod actions {
    pub const REFRESH_TOKEN: &str = "refresh-token";
    pub const LOAD: &str = "load";
    pub const SUBMIT_FORM: &str = "submit-form";
}

/// Client for the page endpoint
#[derive(Debug, Clone)]
pub struct EndpointClient<T> {
    transport: T,
    endpoint: String,
}

impl<T: Transport> EndpointClient<T> {
    pub fn new(transport: T, endpoint: impl Into<String>) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn post(&self, fields: Vec<(&str, &str)>) -> Result<Response, NetError> {
        let request = Request::post(&self.endpoint).with_form(fields);
        self.transport.send(request).await
    }

    /// Fetch a fresh one-time security token
    pub async fn refresh_token(&self) -> Result<String, NetError> {
        let response = self.post(vec![("action", actions::REFRESH_TOKEN)]).await?;
        let data: TokenData = Envelope::from_response(&response)?.into_data()?;
        tracing::debug!("Security token refreshed");
        Ok(data.token)
    }

    /// Fetch a page through the endpoint
    pub async fn load(&self, url: &str, token: &str) -> Result<PageData, NetError> {
        let response = self
            .post(vec![("action", actions::LOAD), ("url", url), ("token", token)])
            .await?;
        Envelope::from_response(&response)?.into_data()
    }

    /// Submit an urlencoded form body to `url` through the endpoint
    ///
    /// A 3xx answer with a `Location` is followed with a `load` of the
    /// target, whose URL is reported back as `redirect_url`.
    pub async fn submit_form(
        &self,
        url: &str,
        form_body: &str,
        token: &str,
    ) -> Result<PageData, NetError> {
        let response = self
            .post(vec![
                ("action", actions::SUBMIT_FORM),
                ("url", url),
                ("formData", form_body),
                ("token", token),
            ])
            .await?;

        if response.is_redirect() {
            if let Some(location) = response.header("location") {
                let target = resolve(url, location)?;
                tracing::debug!("Form redirected: {} -> {}", url, target);
                let mut page = self.load(&target, token).await?;
                page.redirect_url = Some(target);
                return Ok(page);
            }
        }

        Envelope::from_response(&response)?.into_data()
    }
}

fn resolve(base: &str, location: &str) -> Result<String, NetError> {
    let base = Url::parse(base).map_err(|_| NetError::InvalidUrl(base.to_string()))?;
    base.join(location)
        .map(String::from)
        .map_err(|_| NetError::InvalidUrl(location.to_string()))
}
