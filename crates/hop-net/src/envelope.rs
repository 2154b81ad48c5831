//! JSON envelopes
//!
//! Every endpoint response is `{ "success": bool, "data": ... }`; `data` is
//! an object on success and a message string on failure.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{NetError, Response};

/// Response envelope
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default)]
    pub data: Value,
}

/// Payload of a successful load or submit-form call
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PageData {
    /// Full document markup
    pub html: String,
    /// Serialized footer `<script>` tags
    #[serde(default)]
    pub scripts: String,
    /// Set when the server followed a redirect
    #[serde(default)]
    pub redirect_url: Option<String>,
}

/// Payload of a refresh-token call
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenData {
    #[serde(alias = "nonce")]
    pub token: String,
}

impl Envelope {
    /// Decode the envelope of a response; non-2xx statuses fail first
    pub fn from_response(response: &Response) -> Result<Self, NetError> {
        if !response.is_success() {
            return Err(NetError::Http {
                status: response.status,
            });
        }
        serde_json::from_slice(&response.body).map_err(|e| NetError::Decode(e.to_string()))
    }

    /// Typed payload, or the server message for `success: false`
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T, NetError> {
        if !self.success {
            return Err(NetError::Rejected(failure_message(&self.data)));
        }
        serde_json::from_value(self.data).map_err(|e| NetError::Decode(e.to_string()))
    }
}

fn failure_message(data: &Value) -> String {
    match data {
        Value::String(message) => message.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(json: &str) -> Envelope {
        Envelope::from_response(&Response::new(200, json)).unwrap()
    }

    #[test]
    fn test_page_data_defaults() {
        let page: PageData = envelope(r#"{"success":true,"data":{"html":"<p>x</p>"}}"#)
            .into_data()
            .unwrap();
        assert_eq!(page.html, "<p>x</p>");
        assert_eq!(page.scripts, "");
        assert_eq!(page.redirect_url, None);
    }

    #[test]
    fn test_token_alias() {
        let token: TokenData = envelope(r#"{"success":true,"data":{"nonce":"abc"}}"#)
            .into_data()
            .unwrap();
        assert_eq!(token.token, "abc");
    }

    #[test]
    fn test_failure_message() {
        let err = envelope(r#"{"success":false,"data":"boom"}"#)
            .into_data::<PageData>()
            .unwrap_err();
        assert_eq!(err, NetError::Rejected("boom".into()));

        let err = envelope(r#"{"success":false}"#)
            .into_data::<PageData>()
            .unwrap_err();
        assert_eq!(err, NetError::Rejected(String::new()));
    }

    #[test]
    fn test_http_status_checked_before_body() {
        let err = Envelope::from_response(&Response::new(500, "not json")).unwrap_err();
        assert_eq!(err, NetError::Http { status: 500 });
    }

    #[test]
    fn test_malformed_json() {
        let err = Envelope::from_response(&Response::new(200, "<html>")).unwrap_err();
        assert!(matches!(err, NetError::Decode(_)));
    }
}
