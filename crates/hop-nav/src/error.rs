//! Navigation errors

use std::fmt;

use hop_dom::DomError;
use hop_html::ParseError;
use hop_net::NetError;

/// Banner text for a failed token refresh
pub const TOKEN_REFRESH_MESSAGE: &str = "Failed to refresh security token. Please try again.";

/// Pipeline phase a navigation was in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    BeforeHook,
    CacheHit,
    TokenRefresh,
    Fetching,
    Parsing,
    StyleSync,
    Swapping,
    AfterHook,
    Settled,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::BeforeHook => "before-hook",
            Phase::CacheHit => "cache-hit",
            Phase::TokenRefresh => "token-refresh",
            Phase::Fetching => "fetching",
            Phase::Parsing => "parsing",
            Phase::StyleSync => "style-sync",
            Phase::Swapping => "swapping",
            Phase::AfterHook => "after-hook",
            Phase::Settled => "settled",
        };
        f.write_str(name)
    }
}

/// Error that aborts a navigation
#[derive(Debug, thiserror::Error)]
pub enum NavError {
    #[error("{phase} failed for {url}: {source}")]
    Transport {
        url: String,
        phase: Phase,
        #[source]
        source: NetError,
    },

    #[error("server rejected {url}: {message}")]
    Application { url: String, message: String },

    #[error("token refresh failed before loading {url}: {source}")]
    TokenRefresh {
        url: String,
        #[source]
        source: NetError,
    },

    #[error("failed to parse response for {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: ParseError,
    },

    #[error("failed to update the page for {url}: {source}")]
    Dom {
        url: String,
        #[source]
        source: DomError,
    },
}

impl NavError {
    /// Classify an endpoint failure during `phase`
    pub fn from_net(url: &str, phase: Phase, err: NetError) -> Self {
        match err {
            NetError::Rejected(message) => NavError::Application {
                url: url.to_string(),
                message,
            },
            source => NavError::Transport {
                url: url.to_string(),
                phase,
                source,
            },
        }
    }

    pub fn url(&self) -> &str {
        match self {
            NavError::Transport { url, .. }
            | NavError::Application { url, .. }
            | NavError::TokenRefresh { url, .. }
            | NavError::Parse { url, .. }
            | NavError::Dom { url, .. } => url,
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            NavError::Transport { phase, .. } => *phase,
            NavError::Application { .. } => Phase::Fetching,
            NavError::TokenRefresh { .. } => Phase::TokenRefresh,
            NavError::Parse { .. } => Phase::Parsing,
            NavError::Dom { .. } => Phase::Swapping,
        }
    }

    /// Text for the error banner; `generic` fills in when there is no
    /// server message
    pub fn user_message(&self, generic: &str) -> String {
        match self {
            NavError::Application { message, .. } if !message.trim().is_empty() => message.clone(),
            NavError::TokenRefresh { .. } => TOKEN_REFRESH_MESSAGE.to_string(),
            _ => generic.to_string(),
        }
    }
}
