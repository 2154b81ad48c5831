//! Content cache
//!
//! Previously fetched fragments keyed by absolute URL. Entries are never
//! mutated, only replaced. The whole cache is inert when caching is off or
//! the visitor is logged in.

use std::collections::HashMap;
use std::rc::Rc;

use hop_dom::Document;
use hop_html::get_inner_html;

use crate::config::NavConfig;
use crate::stylesheet::{StylesheetRef, extract_stylesheets};

/// A cached page snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheEntry {
    /// Target selector -> inner HTML, in target order
    pub content: Vec<(String, String)>,
    /// Raw footer-script markup
    pub scripts: String,
    pub stylesheets: Vec<StylesheetRef>,
    /// Page title, if the page had one
    pub title: Option<String>,
    /// Creation time (ms)
    pub timestamp: u64,
}

impl CacheEntry {
    pub fn content_for(&self, selector: &str) -> Option<&str> {
        self.content
            .iter()
            .find(|(s, _)| s == selector)
            .map(|(_, html)| html.as_str())
    }
}

/// Expiry rule: a lifetime of 0 never expires; otherwise an entry is
/// valid strictly before `timestamp + lifetime_ms`
pub fn is_valid(entry: &CacheEntry, lifetime_ms: u64, now_ms: u64) -> bool {
    lifetime_ms == 0 || now_ms.saturating_sub(entry.timestamp) < lifetime_ms
}

/// Capture each target's inner HTML from `document`
pub fn capture_content(document: &Document, selectors: &[String]) -> Vec<(String, String)> {
    let mut content: Vec<(String, String)> = Vec::new();
    for selector in selectors {
        if let Some(element) = document.query_selector(selector) {
            let html = get_inner_html(document.tree(), element);
            match content.iter_mut().find(|(s, _)| s == selector) {
                Some(slot) => slot.1 = html,
                None => content.push((selector.clone(), html)),
            }
        }
    }
    content
}

/// Page-session content cache
#[derive(Debug, Default)]
pub struct ContentCache {
    enabled: bool,
    lifetime_ms: u64,
    entries: HashMap<String, Rc<CacheEntry>>,
}

impl ContentCache {
    pub fn new(enabled: bool, lifetime_ms: u64) -> Self {
        Self {
            enabled,
            lifetime_ms,
            entries: HashMap::new(),
        }
    }

    pub fn from_config(config: &NavConfig) -> Self {
        Self::new(config.caching_allowed(), config.cache_lifetime_ms)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Entry for `url`, regardless of age
    pub fn get(&self, url: &str) -> Option<Rc<CacheEntry>> {
        if !self.enabled {
            return None;
        }
        self.entries.get(url).cloned()
    }

    pub fn is_valid(&self, entry: &CacheEntry, now_ms: u64) -> bool {
        is_valid(entry, self.lifetime_ms, now_ms)
    }

    /// Entry for `url` if it exists and has not expired
    pub fn valid(&self, url: &str, now_ms: u64) -> Option<Rc<CacheEntry>> {
        self.get(url).filter(|entry| self.is_valid(entry, now_ms))
    }

    /// Store `entry` under `url`, replacing any previous one; returns
    /// whether anything was written
    pub fn set(&mut self, url: &str, entry: CacheEntry) -> bool {
        if !self.enabled {
            return false;
        }
        tracing::debug!("Cached {} ({} targets)", url, entry.content.len());
        self.entries.insert(url.to_string(), Rc::new(entry));
        true
    }

    /// Build an entry from the live document's targets and stylesheets
    pub fn snapshot(document: &Document, targets: &[String], now_ms: u64) -> CacheEntry {
        CacheEntry {
            content: capture_content(document, targets),
            scripts: String::new(),
            stylesheets: extract_stylesheets(document),
            title: document.title(),
            timestamp: now_ms,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
