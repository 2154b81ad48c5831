//! Shared fixtures for the navigation tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Duration;

use hop_dom::{Document, NodeId};
use hop_html::HtmlParser;
use hop_nav::{ManualClock, NavConfig, RawConfig, ScriptDescriptor, ScriptError, ScriptHost, Session};
use hop_net::{NetError, Request, Response, StyleFetcher, Transport, actions};
use serde_json::json;

pub const ENDPOINT: &str = "https://example.com/wp-admin/admin-ajax.php";
pub const HOME: &str = "https://example.com/";
pub const ABOUT: &str = "https://example.com/about";
pub const CONTACT: &str = "https://example.com/contact";
pub const THANKS: &str = "https://example.com/thank-you";

pub const HOME_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>Home</title><link rel="stylesheet" href="https://example.com/base.css"></head>
<body>
  <div id="wpadminbar"><a id="admin" href="/wp-admin/">Admin</a></div>
  <nav>
    <a id="to-about" href="/about">About</a>
    <a id="to-contact" href="/contact">Contact</a>
    <a id="to-ext" href="https://other.org/">Elsewhere</a>
  </nav>
  <main id="main"><h1>Home</h1></main>
  <aside id="comments"><p>No comments</p></aside>
  <form id="contact-form" action="/contact" method="post">
    <input name="email" value="a@b.c">
    <input type="hidden" name="_wpnonce" value="cn">
    <button id="send">Send</button>
  </form>
</body>
</html>"#;

pub const ABOUT_HTML: &str = r#"<html><head><title>About us</title>
<link rel="stylesheet" href="/about.css"><style>.about { color: red }</style></head>
<body><main id="main"><h2>About</h2><script>aboutInit()</script></main></body></html>"#;

pub const CONTACT_HTML: &str = r#"<html><head><title>Contact</title></head>
<body><main id="main"><h2>Contact</h2></main></body></html>"#;

pub const THANKS_HTML: &str = r#"<html><head><title>Thanks</title></head>
<body><main id="main"><p>Thank you</p></main>
<aside id="comments"><p>1 comment</p></aside></body></html>"#;

pub const FOOTER: &str = r#"<script src="/footer.js"></script>"#;

/// One request as the endpoint saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub action: String,
    pub url: Option<String>,
    pub token: Option<String>,
    pub form_data: Option<String>,
}

#[derive(Debug, Default)]
struct FakeState {
    calls: Vec<Call>,
    routes: HashMap<(String, String), Response>,
    delays: HashMap<String, u64>,
    token_failure: Option<Response>,
    tokens_issued: usize,
    stylesheet_fetches: Vec<String>,
    failing_stylesheets: HashSet<String>,
}

/// Scripted endpoint; clones share state so tests keep a handle after
/// moving one into the session
#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
    state: Rc<RefCell<FakeState>>,
}

pub fn success(data: serde_json::Value) -> Response {
    Response::new(200, json!({ "success": true, "data": data }).to_string())
}

pub fn failure(data: serde_json::Value) -> Response {
    Response::new(200, json!({ "success": false, "data": data }).to_string())
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` (plus footer `scripts`) for a load of `url`
    pub fn page(&self, url: &str, html: &str, scripts: &str) -> &Self {
        self.respond(
            actions::LOAD,
            url,
            success(json!({ "html": html, "scripts": scripts })),
        )
    }

    pub fn respond(&self, action: &str, url: &str, response: Response) -> &Self {
        self.state
            .borrow_mut()
            .routes
            .insert((action.to_string(), url.to_string()), response);
        self
    }

    /// Hold loads of `url` for `ms` of real time
    pub fn delay(&self, url: &str, ms: u64) -> &Self {
        self.state.borrow_mut().delays.insert(url.to_string(), ms);
        self
    }

    pub fn fail_token_refresh(&self, response: Response) -> &Self {
        self.state.borrow_mut().token_failure = Some(response);
        self
    }

    pub fn fail_stylesheet(&self, href: &str) -> &Self {
        self.state
            .borrow_mut()
            .failing_stylesheets
            .insert(href.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn count(&self, action: &str) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| c.action == action)
            .count()
    }

    /// URLs passed to `load`, in order
    pub fn loads(&self) -> Vec<String> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| c.action == actions::LOAD)
            .filter_map(|c| c.url.clone())
            .collect()
    }

    pub fn stylesheet_fetches(&self) -> Vec<String> {
        self.state.borrow().stylesheet_fetches.clone()
    }
}

impl Transport for FakeTransport {
    async fn send(&self, request: Request) -> Result<Response, NetError> {
        let call = Call {
            action: request.field("action").unwrap_or_default().to_string(),
            url: request.field("url").map(str::to_string),
            token: request.field("token").map(str::to_string),
            form_data: request.field("formData").map(str::to_string),
        };
        self.state.borrow_mut().calls.push(call.clone());

        if call.action == actions::REFRESH_TOKEN {
            let mut state = self.state.borrow_mut();
            if let Some(response) = &state.token_failure {
                return Ok(response.clone());
            }
            state.tokens_issued += 1;
            return Ok(success(json!({ "token": format!("tok-{}", state.tokens_issued) })));
        }

        let url = call.url.clone().unwrap_or_default();
        let delay = self.state.borrow().delays.get(&url).copied();
        if let Some(ms) = delay {
            smol::Timer::after(Duration::from_millis(ms)).await;
        }

        let routed = self
            .state
            .borrow()
            .routes
            .get(&(call.action.clone(), url))
            .cloned();
        Ok(routed.unwrap_or_else(|| Response::new(404, "not found")))
    }
}

impl StyleFetcher for FakeTransport {
    async fn fetch_stylesheet(&self, href: &str) -> Result<(), NetError> {
        let mut state = self.state.borrow_mut();
        state.stylesheet_fetches.push(href.to_string());
        if state.failing_stylesheets.contains(href) {
            return Err(NetError::Http { status: 404 });
        }
        Ok(())
    }
}

/// Script host that records every script it is handed
#[derive(Debug, Clone, Default)]
pub struct RecordingScriptHost {
    executed: Rc<RefCell<Vec<ScriptDescriptor>>>,
}

impl RecordingScriptHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executed(&self) -> Vec<ScriptDescriptor> {
        self.executed.borrow().clone()
    }

    /// Inline script texts, in execution order
    pub fn inline_texts(&self) -> Vec<String> {
        self.executed
            .borrow()
            .iter()
            .filter_map(|s| match s {
                ScriptDescriptor::Inline { text } => Some(text.clone()),
                ScriptDescriptor::External { .. } => None,
            })
            .collect()
    }
}

impl ScriptHost for RecordingScriptHost {
    fn execute(&self, script: &ScriptDescriptor) -> Result<(), ScriptError> {
        self.executed.borrow_mut().push(script.clone());
        Ok(())
    }
}

/// A session over the home page with a manual clock and recording host
pub struct Harness {
    pub session: Session<FakeTransport>,
    pub fake: FakeTransport,
    pub clock: Rc<ManualClock>,
    pub scripts: RecordingScriptHost,
}

pub fn config(json: &str) -> NavConfig {
    let mut raw = RawConfig::from_json(json).unwrap();
    raw.ajax_url.get_or_insert_with(|| ENDPOINT.to_string());
    raw.token.get_or_insert_with(|| "initial".to_string());
    NavConfig::resolve(&raw)
}

pub fn home_page() -> Document {
    HtmlParser::new().parse_with_url(HOME_HTML, HOME).unwrap()
}

pub fn harness(json: &str, fake: &FakeTransport) -> Harness {
    harness_at(json, fake, HOME)
}

/// Like [`harness`], with the home page loaded from `url`
pub fn harness_at(json: &str, fake: &FakeTransport, url: &str) -> Harness {
    let clock = Rc::new(ManualClock::new(1_000));
    let scripts = RecordingScriptHost::new();
    let page = HtmlParser::new().parse_with_url(HOME_HTML, url).unwrap();
    let session = Session::new(config(json), page, fake.clone())
        .unwrap()
        .with_clock(clock.clone())
        .with_script_host(scripts.clone());
    Harness {
        session,
        fake: fake.clone(),
        clock,
        scripts,
    }
}

impl Harness {
    pub fn element(&self, id: &str) -> NodeId {
        self.session
            .document()
            .get_element_by_id(id)
            .unwrap_or_else(|| panic!("no #{id}"))
    }

    /// Inner HTML of the first match of `selector` in the live page
    pub fn inner(&self, selector: &str) -> String {
        let document = self.session.document();
        let node = document.query_selector(selector).unwrap();
        hop_html::get_inner_html(document.tree(), node)
    }

    pub fn title(&self) -> Option<String> {
        self.session.document().title()
    }

    pub fn current_url(&self) -> String {
        self.session.history().current().url.clone()
    }
}
