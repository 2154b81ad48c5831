//! Navigation requests

use std::fmt;

/// What started a navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    LinkClick,
    FormSubmit,
    HistoryReplay,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Origin::LinkClick => "link",
            Origin::FormSubmit => "form",
            Origin::HistoryReplay => "history",
        })
    }
}

/// A single in-flight transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    /// Absolute target URL (form action for submissions)
    pub url: String,
    pub origin: Origin,
    /// Start time (ms on the session clock)
    pub started_at: u64,
    /// Urlencoded form payload
    pub form_body: Option<String>,
    /// Page URL when the request was made
    pub page_url: String,
    /// Skip the cache even if an entry is valid
    pub reload: bool,
}

impl NavigationRequest {
    pub fn link(url: &str, page_url: &str, now_ms: u64) -> Self {
        Self {
            url: url.to_string(),
            origin: Origin::LinkClick,
            started_at: now_ms,
            form_body: None,
            page_url: page_url.to_string(),
            reload: false,
        }
    }

    pub fn form(action: &str, body: String, page_url: &str, now_ms: u64) -> Self {
        Self {
            url: action.to_string(),
            origin: Origin::FormSubmit,
            started_at: now_ms,
            form_body: Some(body),
            page_url: page_url.to_string(),
            reload: false,
        }
    }

    pub fn history(url: &str, page_url: &str, now_ms: u64) -> Self {
        Self {
            url: url.to_string(),
            origin: Origin::HistoryReplay,
            started_at: now_ms,
            form_body: None,
            page_url: page_url.to_string(),
            reload: false,
        }
    }

    /// Force a network fetch
    pub fn reloading(mut self) -> Self {
        self.reload = true;
        self
    }

    pub fn is_form(&self) -> bool {
        self.origin == Origin::FormSubmit
    }
}
