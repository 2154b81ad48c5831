//! Navigation orchestrator
//!
//! The fetch-parse-swap pipeline behind every accepted event:
//!
//! ```text
//! BeforeHook -> CacheHit ----------------------------> Swapping -> AfterHook -> Settled
//!            \-> TokenRefresh -> Fetching -> Parsing -> StyleSync -> Swapping -> ...
//! ```
//!
//! Any failure in TokenRefresh, Fetching or Parsing ends in an error
//! settle: the loader hides and the banner shows.
//!
//! Each request takes a generation number. A request overtaken by a newer
//! one before it swaps still fills the cache but leaves the DOM, title,
//! history and loader to the newer request.

use std::rc::Rc;

use hop_html::{HtmlParser, set_inner_html};
use hop_net::{StyleFetcher, Transport};
use url::Url;

use crate::cache::{CacheEntry, capture_content};
use crate::error::{NavError, Phase};
use crate::history::HistoryState;
use crate::hooks::{HookContext, HookPoint};
use crate::request::{NavigationRequest, Origin};
use crate::scripts::{execute_footer_scripts, reexecute_scripts};
use crate::session::Session;
use crate::stylesheet::{apply_stylesheets, extract_stylesheets};

/// Result of a settled navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavOutcome {
    /// URL shown in the address bar and used as cache key
    pub url: String,
    pub from_cache: bool,
    /// Overtaken by a newer navigation; nothing was swapped
    pub superseded: bool,
    /// Target selectors whose content was replaced
    pub swapped: Vec<String>,
}

impl<T: Transport + StyleFetcher> Session<T> {
    fn next_generation(&self) -> u64 {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        generation
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.get() == generation
    }

    fn run_hook(&self, point: HookPoint, request: &NavigationRequest, url: &str) {
        let ctx = HookContext {
            point,
            url,
            origin: request.origin,
        };
        self.hooks.run_contained(&ctx, &*self.scripts);
    }

    fn show_loader(&self) {
        if self.initial_load.get() {
            tracing::debug!("Loader not shown: initial load");
            return;
        }
        self.overlay.borrow_mut().show_loader(self.clock.now_ms());
    }

    /// Hide the loader once it has been up for the minimum duration
    async fn hide_loader(&self, request: &NavigationRequest, generation: u64) {
        let remaining = self
            .overlay
            .borrow()
            .remaining_ms(request.started_at, self.clock.now_ms());
        if remaining > 0 {
            self.clock.sleep(remaining).await;
        }
        if !self.is_current(generation) {
            return;
        }
        self.overlay.borrow_mut().hide_loader(self.clock.now_ms());
    }

    /// Run one navigation request through the pipeline
    pub async fn navigate(&self, request: NavigationRequest) -> Result<NavOutcome, NavError> {
        let generation = self.next_generation();
        tracing::debug!(
            generation,
            url = %request.url,
            origin = %request.origin,
            "Navigation started"
        );

        self.run_hook(HookPoint::BeforeNavigate, &request, &request.url);
        self.show_loader();

        if request.origin == Origin::LinkClick && !request.reload {
            let cached = self
                .cache
                .borrow()
                .valid(&request.url, self.clock.now_ms());
            if let Some(entry) = cached {
                tracing::debug!(generation, url = %request.url, phase = %Phase::CacheHit, "Loading from cache");
                return self.replay(&request, entry, generation, true).await;
            }
        }

        match self.fetch_and_swap(&request, generation).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.settle_error(&request, generation, &err).await;
                Err(err)
            }
        }
    }

    /// History event with a cached entry: replay without touching the
    /// network or pushing history
    pub async fn replay_history(
        &self,
        request: NavigationRequest,
    ) -> Result<NavOutcome, NavError> {
        let cached = self
            .cache
            .borrow()
            .valid(&request.url, self.clock.now_ms());
        let Some(entry) = cached else {
            tracing::debug!("Cache entry gone for {}, fetching", request.url);
            return self.navigate(request).await;
        };

        let generation = self.next_generation();
        tracing::debug!(generation, url = %request.url, "Replaying history from cache");
        self.show_loader();
        self.replay(&request, entry, generation, false).await
    }

    async fn replay(
        &self,
        request: &NavigationRequest,
        entry: Rc<CacheEntry>,
        generation: u64,
        push_history: bool,
    ) -> Result<NavOutcome, NavError> {
        let url = request.url.as_str();
        apply_stylesheets(&self.document, &entry.stylesheets, self.client.transport()).await;
        if !self.is_current(generation) {
            return Ok(self.superseded(url, true, generation));
        }

        match self
            .finish(request, url, &entry, generation, push_history)
            .await
        {
            Ok(swapped) => {
                self.settle(request, url, generation).await;
                Ok(NavOutcome {
                    url: url.to_string(),
                    from_cache: true,
                    superseded: swapped.is_none(),
                    swapped: swapped.unwrap_or_default(),
                })
            }
            Err(err) => {
                self.settle_error(request, generation, &err).await;
                Err(err)
            }
        }
    }

    async fn fetch_and_swap(
        &self,
        request: &NavigationRequest,
        generation: u64,
    ) -> Result<NavOutcome, NavError> {
        let url = request.url.as_str();

        tracing::debug!(generation, url, phase = %Phase::TokenRefresh);
        let token = self
            .client
            .refresh_token()
            .await
            .map_err(|source| NavError::TokenRefresh {
                url: url.to_string(),
                source,
            })?;
        self.token.replace(token.clone());

        tracing::debug!(generation, url, phase = %Phase::Fetching);
        let page = match &request.form_body {
            Some(body) if request.is_form() => self.client.submit_form(url, body, &token).await,
            _ => self.client.load(url, &token).await,
        }
        .map_err(|err| NavError::from_net(url, Phase::Fetching, err))?;

        let final_url = match &page.redirect_url {
            Some(redirect) => absolute(url, redirect),
            None if request.is_form() => request.page_url.clone(),
            None => url.to_string(),
        };

        tracing::debug!(generation, url = %final_url, phase = %Phase::Parsing);
        let parsed = HtmlParser::new()
            .parse_with_url(&page.html, &final_url)
            .map_err(|source| NavError::Parse {
                url: final_url.clone(),
                source,
            })?;

        let mut selectors = self.config.targets.clone();
        if request.is_form() {
            selectors.extend(self.config.form_refresh_targets.iter().cloned());
        }
        let entry = CacheEntry {
            content: capture_content(&parsed, &selectors),
            scripts: page.scripts,
            stylesheets: extract_stylesheets(&parsed),
            title: parsed.title(),
            timestamp: 0,
        };
        drop(parsed);

        tracing::debug!(generation, url = %final_url, phase = %Phase::StyleSync);
        apply_stylesheets(&self.document, &entry.stylesheets, self.client.transport()).await;

        if !self.is_current(generation) {
            self.store(&final_url, entry);
            return Ok(self.superseded(&final_url, false, generation));
        }

        let swapped = self
            .finish(request, &final_url, &entry, generation, request.origin != Origin::HistoryReplay)
            .await?;
        self.store(&final_url, entry);
        self.settle(request, &final_url, generation).await;

        tracing::debug!(generation, url = %final_url, "Page fully loaded");
        Ok(NavOutcome {
            url: final_url,
            from_cache: false,
            superseded: swapped.is_none(),
            swapped: swapped.unwrap_or_default(),
        })
    }

    /// Swapping and AfterHook steps shared by the network and cache paths;
    /// `None` when overtaken before scripts ran
    async fn finish(
        &self,
        request: &NavigationRequest,
        url: &str,
        entry: &CacheEntry,
        generation: u64,
        push_history: bool,
    ) -> Result<Option<Vec<String>>, NavError> {
        tracing::debug!(generation, url, phase = %Phase::Swapping);
        let swapped = self.swap(url, entry)?;

        // Scripts see the final DOM only after a turn of the loop
        smol::future::yield_now().await;
        if !self.is_current(generation) {
            tracing::debug!(generation, url, "Superseded after swap");
            return Ok(None);
        }

        {
            let mut document = self.document.borrow_mut();
            for selector in &swapped {
                reexecute_scripts(&mut document, selector, &*self.scripts).map_err(
                    |source| NavError::Dom {
                        url: url.to_string(),
                        source,
                    },
                )?;
            }
            execute_footer_scripts(&mut document, &entry.scripts, &*self.scripts).map_err(
                |source| NavError::Parse {
                    url: url.to_string(),
                    source,
                },
            )?;
        }

        tracing::debug!(generation, url, phase = %Phase::AfterHook);
        self.run_hook(HookPoint::AfterNavigate, request, url);

        {
            let mut document = self.document.borrow_mut();
            if let Some(title) = &entry.title {
                document.set_title(title).map_err(|source| NavError::Dom {
                    url: url.to_string(),
                    source,
                })?;
            }
            if push_history {
                let title = document.title().unwrap_or_default();
                self.history
                    .borrow_mut()
                    .push_state(Some(HistoryState::new(url)), &title, url);
            }
            document.set_url(url);
        }
        Ok(Some(swapped))
    }

    async fn settle(&self, request: &NavigationRequest, url: &str, generation: u64) {
        self.hide_loader(request, generation).await;
        tracing::debug!(generation, url, phase = %Phase::Settled);
    }

    /// Replace each target present in both the entry and the live page
    fn swap(&self, url: &str, entry: &CacheEntry) -> Result<Vec<String>, NavError> {
        let mut document = self.document.borrow_mut();
        let mut swapped = Vec::new();
        for (selector, html) in &entry.content {
            let Some(target) = document.query_selector(selector) else {
                tracing::debug!("Target {} not in live page", selector);
                continue;
            };
            set_inner_html(document.tree_mut(), target, html).map_err(|source| {
                NavError::Parse {
                    url: url.to_string(),
                    source,
                }
            })?;
            swapped.push(selector.clone());
        }
        Ok(swapped)
    }

    fn store(&self, url: &str, mut entry: CacheEntry) {
        entry.timestamp = self.clock.now_ms();
        self.cache.borrow_mut().set(url, entry);
    }

    fn superseded(&self, url: &str, from_cache: bool, generation: u64) -> NavOutcome {
        tracing::debug!(generation, url, "Superseded by a newer navigation");
        NavOutcome {
            url: url.to_string(),
            from_cache,
            superseded: true,
            swapped: Vec::new(),
        }
    }

    async fn settle_error(&self, request: &NavigationRequest, generation: u64, err: &NavError) {
        tracing::error!(
            generation,
            url = %err.url(),
            phase = %err.phase(),
            "Navigation failed: {}",
            err
        );
        if !self.is_current(generation) {
            return;
        }
        self.hide_loader(request, generation).await;
        if !self.is_current(generation) {
            return;
        }
        let message = err.user_message(&self.config.error_message);
        self.overlay
            .borrow_mut()
            .show_error(&message, self.clock.now_ms());
    }
}

fn absolute(base: &str, href: &str) -> String {
    Url::parse(base)
        .and_then(|base| base.join(href))
        .map(String::from)
        .unwrap_or_else(|_| href.to_string())
}
