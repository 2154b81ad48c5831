//! Session context
//!
//! One [`Session`] per page session owns everything the engine shares:
//! config, token, live document, cache, history, overlay, endpoint client,
//! script host, hooks and clock. Components borrow it instead of reaching
//! for globals.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;

use hop_dom::{Document, NodeId};
use hop_net::{EndpointClient, StyleFetcher, Transport};
use smol::LocalExecutor;
use smol::channel::{self, Receiver, Sender};
use url::Url;

use crate::cache::ContentCache;
use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, NavConfig, TokenCell};
use crate::history::{HistoryEntry, HistoryManager, HistoryState};
use crate::hooks::{Hook, Hooks};
use crate::intercept::{InputEvent, Intent, Interceptor};
use crate::navigator::NavOutcome;
use crate::overlay::Overlay;
use crate::scripts::{ScriptHost, TracingScriptHost};
use crate::NavError;

pub struct Session<T> {
    pub(crate) config: NavConfig,
    pub(crate) token: TokenCell,
    pub(crate) document: RefCell<Document>,
    pub(crate) cache: RefCell<ContentCache>,
    pub(crate) history: RefCell<HistoryManager>,
    pub(crate) overlay: RefCell<Overlay>,
    pub(crate) client: EndpointClient<T>,
    pub(crate) scripts: Box<dyn ScriptHost>,
    pub(crate) hooks: Hooks,
    pub(crate) clock: Rc<dyn Clock>,
    pub(crate) generation: Cell<u64>,
    pub(crate) initial_load: Cell<bool>,
}

impl<T: Transport + StyleFetcher> Session<T> {
    /// Build a session over the live `document`
    pub fn new(
        config: NavConfig,
        mut document: Document,
        transport: T,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        // Same serialization as request URLs, so the landing snapshot and
        // history entry share their cache key
        if let Ok(parsed) = Url::parse(document.url()) {
            document.set_url(parsed.as_str());
        }
        let url = document.url().to_string();
        Ok(Self {
            token: TokenCell::new(config.initial_token.clone()),
            cache: RefCell::new(ContentCache::from_config(&config)),
            history: RefCell::new(HistoryManager::new(&url)),
            overlay: RefCell::new(Overlay::new(
                config.enable_loader,
                config.min_loader_duration_ms,
            )),
            client: EndpointClient::new(transport, config.endpoint.clone()),
            scripts: Box::new(TracingScriptHost),
            hooks: Hooks::from_config(&config),
            clock: Rc::new(SystemClock),
            generation: Cell::new(0),
            initial_load: Cell::new(true),
            document: RefCell::new(document),
            config,
        })
    }

    pub fn with_script_host(mut self, host: impl ScriptHost + 'static) -> Self {
        self.scripts = Box::new(host);
        self
    }

    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the configured before-navigate hook
    pub fn with_before_hook(mut self, hook: Hook) -> Self {
        self.hooks.before = hook;
        self
    }

    /// Replace the configured after-navigate hook
    pub fn with_after_hook(mut self, hook: Hook) -> Self {
        self.hooks.after = hook;
        self
    }

    /// Snapshot the landing page into the cache, then clear the
    /// initial-load flag on the next tick
    pub async fn start(&self) {
        let now = self.clock.now_ms();
        {
            let document = self.document.borrow();
            let entry = ContentCache::snapshot(&document, &self.config.targets, now);
            self.cache.borrow_mut().set(document.url(), entry);
        }
        tracing::debug!(config = ?self.config, "Session started");

        smol::future::yield_now().await;
        self.initial_load.set(false);
        tracing::debug!("Initial load complete");
    }

    /// Decide what to do with an input event
    pub fn intercept(&self, event: &InputEvent) -> Intent {
        let interceptor = Interceptor::new(&self.config);
        let document = self.document.borrow();
        let now = self.clock.now_ms();
        match event {
            InputEvent::Click { target } => interceptor.on_click(&document, *target, now),
            InputEvent::Submit { target } => interceptor.on_submit(&document, *target, now),
            InputEvent::PopState { state } => {
                let cache = self.cache.borrow();
                interceptor.on_pop_state(&document, state.as_ref(), &cache, now)
            }
        }
    }

    /// Carry out an intent; `None` when it was ignored
    pub async fn dispatch(&self, intent: Intent) -> Option<Result<NavOutcome, NavError>> {
        match intent {
            Intent::Ignore(_) => None,
            Intent::Navigate(request) => Some(self.navigate(request).await),
            Intent::ReplayFromCache(request) => Some(self.replay_history(request).await),
        }
    }

    /// Intercept and run a single event to completion
    pub async fn handle(&self, event: InputEvent) -> Option<Result<NavOutcome, NavError>> {
        let intent = self.intercept(&event);
        self.dispatch(intent).await
    }

    /// Consume input events until the channel closes; each accepted
    /// event runs as its own task so navigations interleave
    pub async fn run(&self, events: Receiver<InputEvent>) -> Vec<Result<NavOutcome, NavError>> {
        let executor = LocalExecutor::new();
        executor
            .run(async {
                let startup = executor.spawn(self.start());
                let mut tasks = Vec::new();
                while let Ok(event) = events.recv().await {
                    match self.intercept(&event) {
                        Intent::Ignore(reason) => {
                            tracing::trace!("Event left to the browser: {:?}", reason)
                        }
                        intent => tasks.push(executor.spawn(self.dispatch(intent))),
                    }
                }
                startup.await;

                let mut results = Vec::new();
                for task in tasks {
                    results.extend(task.await);
                }
                results
            })
            .await
    }

    /// Step back in history, returning the popstate event to feed in
    pub fn back(&self) -> Option<InputEvent> {
        let entry = self.history.borrow_mut().back().cloned()?;
        Some(self.arrive(entry))
    }

    /// Step forward in history, returning the popstate event to feed in
    pub fn forward(&self) -> Option<InputEvent> {
        let entry = self.history.borrow_mut().forward().cloned()?;
        Some(self.arrive(entry))
    }

    fn arrive(&self, entry: HistoryEntry) -> InputEvent {
        self.document.borrow_mut().set_url(&entry.url);
        InputEvent::PopState { state: entry.state }
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    pub fn token(&self) -> String {
        self.token.get()
    }

    pub fn document(&self) -> Ref<'_, Document> {
        self.document.borrow()
    }

    pub fn document_mut(&self) -> RefMut<'_, Document> {
        self.document.borrow_mut()
    }

    pub fn cache(&self) -> Ref<'_, ContentCache> {
        self.cache.borrow()
    }

    pub fn history(&self) -> Ref<'_, HistoryManager> {
        self.history.borrow()
    }

    pub fn overlay(&self) -> Ref<'_, Overlay> {
        self.overlay.borrow()
    }

    pub fn transport(&self) -> &T {
        self.client.transport()
    }

    /// Banner text currently on screen
    pub fn error_text(&self) -> Option<String> {
        self.overlay
            .borrow()
            .error_text(self.clock.now_ms())
            .map(str::to_string)
    }
}

/// Sending half of the input stream
#[derive(Debug, Clone)]
pub struct InputBus {
    sender: Sender<InputEvent>,
}

impl InputBus {
    /// Returns false once the session stopped listening
    pub fn send(&self, event: InputEvent) -> bool {
        self.sender.try_send(event).is_ok()
    }

    pub fn click(&self, target: NodeId) -> bool {
        self.send(InputEvent::Click { target })
    }

    pub fn submit(&self, target: NodeId) -> bool {
        self.send(InputEvent::Submit { target })
    }

    pub fn pop_state(&self, state: Option<HistoryState>) -> bool {
        self.send(InputEvent::PopState { state })
    }

    /// Stop the session's event loop once queued events are consumed
    pub fn close(&self) {
        self.sender.close();
    }
}

/// Create the input stream feeding [`Session::run`]
pub fn input_channel() -> (InputBus, Receiver<InputEvent>) {
    let (sender, receiver) = channel::unbounded();
    (InputBus { sender }, receiver)
}
