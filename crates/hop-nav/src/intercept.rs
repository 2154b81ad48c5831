//! Event interception
//!
//! Decides, per click / submit / popstate, whether the engine takes over
//! from the browser. Each accepted event becomes a [`NavigationRequest`].

use hop_dom::{Document, ElementQuery, NodeId};
use url::Url;

use crate::cache::ContentCache;
use crate::config::NavConfig;
use crate::forms::serialize_form;
use crate::history::HistoryState;
use crate::request::NavigationRequest;

/// Input the session subscribes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// Pointer activation on `target`
    Click { target: NodeId },
    /// Form submission from `target` (the form or a control inside it)
    Submit { target: NodeId },
    /// Back/forward; `state` is what was pushed with the entry
    PopState { state: Option<HistoryState> },
}

/// Why an event was left to the browser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NoLink,
    NoHref,
    Anchor,
    Excluded,
    ExcludedZone,
    /// Cross-origin with external exclusion on
    External,
    /// Cross-origin; never fetched through the endpoint
    CrossOrigin,
    TargetBlank,
    FormsDisabled,
    NoForm,
    ExternalForm,
    InvalidUrl,
}

/// Outcome of interception
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Let the browser handle it
    Ignore(IgnoreReason),
    /// Run the navigation pipeline
    Navigate(NavigationRequest),
    /// History event with a valid cache entry: replay without fetching
    ReplayFromCache(NavigationRequest),
}

impl Intent {
    /// Whether default browser behavior is suppressed
    pub fn prevents_default(&self) -> bool {
        !matches!(self, Intent::Ignore(_))
    }
}

/// Resolve `href` against the page URL
fn resolve(page_url: &str, href: &str) -> Option<Url> {
    Url::parse(page_url).ok()?.join(href).ok()
}

fn same_origin(page_url: &str, target: &Url) -> bool {
    Url::parse(page_url).is_ok_and(|page| page.origin() == target.origin())
}

pub struct Interceptor<'a> {
    config: &'a NavConfig,
}

impl<'a> Interceptor<'a> {
    pub fn new(config: &'a NavConfig) -> Self {
        Self { config }
    }

    fn in_excluded_zone(&self, document: &Document, element: NodeId) -> bool {
        self.config
            .exclude_zones
            .iter()
            .any(|zone| document.tree().closest(element, zone).is_some())
    }

    pub fn on_click(&self, document: &Document, target: NodeId, now_ms: u64) -> Intent {
        let tree = document.tree();
        let Some(link) = tree.closest(target, "a") else {
            return Intent::Ignore(IgnoreReason::NoLink);
        };
        let Some(href) = tree.attr(link, "href").filter(|h| !h.is_empty()) else {
            return Intent::Ignore(IgnoreReason::NoHref);
        };
        if href.starts_with('#') {
            tracing::debug!("Anchor link ignored: {}", href);
            return Intent::Ignore(IgnoreReason::Anchor);
        }

        let page_url = document.url();
        let Some(url) = resolve(page_url, href) else {
            return Intent::Ignore(IgnoreReason::InvalidUrl);
        };
        let external = !same_origin(page_url, &url);

        let reason = if self
            .config
            .exclude_selectors
            .iter()
            .any(|sel| tree.matches(link, sel))
        {
            Some(IgnoreReason::Excluded)
        } else if self.in_excluded_zone(document, link) {
            Some(IgnoreReason::ExcludedZone)
        } else if self.config.exclude_external && external {
            Some(IgnoreReason::External)
        } else if self.config.exclude_target_blank && tree.attr(link, "target") == Some("_blank")
        {
            Some(IgnoreReason::TargetBlank)
        } else if external {
            Some(IgnoreReason::CrossOrigin)
        } else {
            None
        };
        if let Some(reason) = reason {
            tracing::debug!("Link excluded ({:?}): {}", reason, href);
            return Intent::Ignore(reason);
        }

        Intent::Navigate(NavigationRequest::link(url.as_str(), page_url, now_ms))
    }

    pub fn on_submit(&self, document: &Document, target: NodeId, now_ms: u64) -> Intent {
        if !self.config.enable_forms {
            return Intent::Ignore(IgnoreReason::FormsDisabled);
        }
        let tree = document.tree();
        let Some(form) = tree.closest(target, "form") else {
            return Intent::Ignore(IgnoreReason::NoForm);
        };

        let page_url = document.url();
        let action = tree
            .attr(form, "action")
            .filter(|a| !a.trim().is_empty())
            .unwrap_or(page_url);
        let Some(url) = resolve(page_url, action) else {
            return Intent::Ignore(IgnoreReason::InvalidUrl);
        };
        if !same_origin(page_url, &url) {
            tracing::debug!("External form submission ignored: {}", url);
            return Intent::Ignore(IgnoreReason::ExternalForm);
        }
        if self.in_excluded_zone(document, form) {
            tracing::debug!("Form submission excluded: {}", url);
            return Intent::Ignore(IgnoreReason::ExcludedZone);
        }

        let body = serialize_form(tree, form, &self.config.form_token_field);
        Intent::Navigate(NavigationRequest::form(url.as_str(), body, page_url, now_ms))
    }

    pub fn on_pop_state(
        &self,
        document: &Document,
        state: Option<&HistoryState>,
        cache: &ContentCache,
        now_ms: u64,
    ) -> Intent {
        let page_url = document.url();
        let href = state.map_or(page_url, |s| s.href.as_str());
        let url = resolve(page_url, href)
            .map(String::from)
            .unwrap_or_else(|| href.to_string());
        tracing::debug!("Popstate triggered for: {}", url);

        let request = NavigationRequest::history(&url, page_url, now_ms);
        if cache.valid(&url, now_ms).is_some() {
            Intent::ReplayFromCache(request)
        } else {
            Intent::Navigate(request)
        }
    }
}
