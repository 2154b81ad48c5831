//! Configuration
//!
//! [`RawConfig`] mirrors the settings payload the server emits: camelCase
//! keys, every value optional and string-typed. [`NavConfig::resolve`]
//! turns it into typed settings once at startup.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use hop_dom::Selector;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Selector always present in the exclusion zones (the admin toolbar)
pub const ADMIN_BAR_SELECTOR: &str = "#wpadminbar";

pub const DEFAULT_TARGET: &str = "#main";
pub const DEFAULT_CACHE_LIFETIME_SECS: u64 = 300;
pub const DEFAULT_MIN_LOADER_DURATION_MS: u64 = 200;
pub const DEFAULT_ERROR_MESSAGE: &str =
    "An error occurred while loading the page. Please try again.";
pub const DEFAULT_FORM_TOKEN_FIELD: &str = "_wpnonce";

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no endpoint URL configured")]
    MissingEndpoint,
}

/// Raw settings as delivered by the server
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    #[serde(deserialize_with = "lenient")]
    pub targets: Option<String>,
    #[serde(rename = "excludeSelectors", deserialize_with = "lenient")]
    pub exclude_selectors: Option<String>,
    #[serde(rename = "excludeZoneSelectors", deserialize_with = "lenient")]
    pub exclude_zone_selectors: Option<String>,
    #[serde(rename = "excludeExternal", deserialize_with = "lenient")]
    pub exclude_external: Option<String>,
    #[serde(rename = "excludeTargetBlank", deserialize_with = "lenient")]
    pub exclude_target_blank: Option<String>,
    #[serde(rename = "enableCache", deserialize_with = "lenient")]
    pub enable_cache: Option<String>,
    /// Seconds
    #[serde(rename = "cacheLifetime", deserialize_with = "lenient")]
    pub cache_lifetime: Option<String>,
    #[serde(rename = "debugMode", deserialize_with = "lenient")]
    pub debug_mode: Option<String>,
    #[serde(rename = "enableLoader", deserialize_with = "lenient")]
    pub enable_loader: Option<String>,
    /// Milliseconds
    #[serde(rename = "minLoaderDuration", deserialize_with = "lenient")]
    pub min_loader_duration: Option<String>,
    #[serde(rename = "enableForms", deserialize_with = "lenient")]
    pub enable_forms: Option<String>,
    /// Derived from the server session
    #[serde(rename = "isLoggedIn", deserialize_with = "lenient")]
    pub is_logged_in: Option<String>,
    #[serde(rename = "customJSBefore", deserialize_with = "lenient")]
    pub custom_js_before: Option<String>,
    #[serde(rename = "customJSAfter", deserialize_with = "lenient")]
    pub custom_js_after: Option<String>,
    #[serde(rename = "formRefreshTargets", deserialize_with = "lenient")]
    pub form_refresh_targets: Option<String>,
    #[serde(rename = "ajaxUrl", deserialize_with = "lenient")]
    pub ajax_url: Option<String>,
    #[serde(alias = "nonce", deserialize_with = "lenient")]
    pub token: Option<String>,
    #[serde(rename = "errorMessage", deserialize_with = "lenient")]
    pub error_message: Option<String>,
    #[serde(rename = "formTokenField", deserialize_with = "lenient")]
    pub form_token_field: Option<String>,
}

/// Accept strings, numbers and booleans for any setting
fn lenient<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Bool(b)) => Some(if b { "1" } else { "0" }.to_string()),
        Some(other) => Some(other.to_string()),
    })
}

impl RawConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }
}

/// Typed navigation settings; read-only after startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavConfig {
    pub targets: Vec<String>,
    pub exclude_selectors: Vec<String>,
    pub exclude_zones: Vec<String>,
    pub exclude_external: bool,
    pub exclude_target_blank: bool,
    pub enable_cache: bool,
    pub cache_lifetime_ms: u64,
    pub debug_mode: bool,
    pub enable_loader: bool,
    pub min_loader_duration_ms: u64,
    pub enable_forms: bool,
    pub is_logged_in: bool,
    pub before_navigate: String,
    pub after_navigate: String,
    pub form_refresh_targets: Vec<String>,
    pub endpoint: String,
    pub initial_token: String,
    pub error_message: String,
    pub form_token_field: String,
}

impl NavConfig {
    pub fn resolve(raw: &RawConfig) -> Self {
        let targets = usable_selectors("target", raw.targets.as_deref());
        let targets = if targets.is_empty() {
            vec![DEFAULT_TARGET.to_string()]
        } else {
            targets
        };

        let mut exclude_zones =
            usable_selectors("exclude zone", raw.exclude_zone_selectors.as_deref());
        if !exclude_zones.iter().any(|s| s == ADMIN_BAR_SELECTOR) {
            exclude_zones.push(ADMIN_BAR_SELECTOR.to_string());
        }

        // Unparsable means unlimited; negative means every entry is stale
        let lifetime_secs = raw
            .cache_lifetime
            .as_deref()
            .map_or(DEFAULT_CACHE_LIFETIME_SECS as i64, |v| parse_int(v).unwrap_or(0));
        let mut enable_cache = parse_flag(raw.enable_cache.as_deref(), false);
        if lifetime_secs < 0 && enable_cache {
            tracing::warn!("Negative cache lifetime {}s, caching disabled", lifetime_secs);
            enable_cache = false;
        }
        let cache_lifetime_ms = lifetime_secs.max(0).unsigned_abs().saturating_mul(1000);
        let min_loader_duration_ms = raw
            .min_loader_duration
            .as_deref()
            .map_or(DEFAULT_MIN_LOADER_DURATION_MS, |v| {
                parse_int(v).unwrap_or(0).max(0).unsigned_abs()
            });

        Self {
            targets,
            exclude_selectors: usable_selectors("exclude", raw.exclude_selectors.as_deref()),
            exclude_zones,
            exclude_external: parse_flag(raw.exclude_external.as_deref(), true),
            exclude_target_blank: parse_flag(raw.exclude_target_blank.as_deref(), true),
            enable_cache,
            cache_lifetime_ms,
            debug_mode: parse_flag(raw.debug_mode.as_deref(), false),
            enable_loader: parse_flag(raw.enable_loader.as_deref(), true),
            min_loader_duration_ms,
            enable_forms: parse_flag(raw.enable_forms.as_deref(), false),
            is_logged_in: parse_flag(raw.is_logged_in.as_deref(), false),
            before_navigate: raw.custom_js_before.clone().unwrap_or_default(),
            after_navigate: raw.custom_js_after.clone().unwrap_or_default(),
            form_refresh_targets: usable_selectors(
                "form refresh",
                raw.form_refresh_targets.as_deref(),
            ),
            endpoint: raw.ajax_url.clone().unwrap_or_default(),
            initial_token: raw.token.clone().unwrap_or_default(),
            error_message: non_empty(raw.error_message.as_deref())
                .unwrap_or(DEFAULT_ERROR_MESSAGE)
                .to_string(),
            form_token_field: non_empty(raw.form_token_field.as_deref())
                .unwrap_or(DEFAULT_FORM_TOKEN_FIELD)
                .to_string(),
        }
    }

    /// Whether the content cache may be read or written
    pub fn caching_allowed(&self) -> bool {
        self.enable_cache && !self.is_logged_in
    }

    /// Check that the endpoint is set
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        Ok(())
    }
}

impl Default for NavConfig {
    fn default() -> Self {
        Self::resolve(&RawConfig::default())
    }
}

/// Split a space-separated selector list, dropping empty tokens
///
/// Whitespace inside `[...]`, `(...)` or quotes does not split, so
/// `a[title="two words"]` and `a:not(.x, .y)` stay whole.
pub fn split_selectors(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    let mut selectors = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for c in raw.chars() {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') if depth > 0 => quote = Some(c),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => depth = depth.saturating_sub(1),
            (None, c) if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    selectors.push(std::mem::take(&mut current));
                }
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    if !current.is_empty() {
        selectors.push(current);
    }
    selectors
}

/// Split a selector list and drop the entries that do not parse
fn usable_selectors(field: &str, raw: Option<&str>) -> Vec<String> {
    split_selectors(raw)
        .into_iter()
        .filter(|selector| match Selector::parse(selector) {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!("Ignoring {} selector: {}", field, err);
                false
            }
        })
        .collect()
}

fn parse_flag(raw: Option<&str>, default: bool) -> bool {
    match raw.map(str::trim) {
        None => default,
        Some(v) => v == "1" || v.eq_ignore_ascii_case("true"),
    }
}

/// Leading integer of `raw`, so `"12s"` reads as 12
fn parse_int(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let value: i64 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.filter(|s| !s.trim().is_empty())
}

/// The rotating security token, replaced on every request cycle
#[derive(Debug, Default)]
pub struct TokenCell(RefCell<String>);

impl TokenCell {
    pub fn new(token: impl Into<String>) -> Self {
        Self(RefCell::new(token.into()))
    }

    pub fn get(&self) -> String {
        self.0.borrow().clone()
    }

    pub fn replace(&self, token: String) {
        *self.0.borrow_mut() = token;
    }
}
