//! Navigation pipeline edge cases
//!
//! End-to-end runs of the session over a scripted endpoint and a manual
//! clock: fetch-and-swap, cache replay, form redirects, failures, history
//! and overlapping navigations.

mod common;

use std::cell::Cell;
use std::rc::Rc;

use common::*;
use hop_nav::{
    Clock, HistoryState, Hook, IgnoreReason, InputEvent, Intent, NavError, NavigationRequest,
    ScriptDescriptor, TOKEN_REFRESH_MESSAGE, input_channel,
};
use hop_html::HtmlParser;
use hop_net::{Response, actions};
use serde_json::json;

fn click(h: &Harness, id: &str) -> Option<Result<hop_nav::NavOutcome, NavError>> {
    let target = h.element(id);
    smol::block_on(h.session.handle(InputEvent::Click { target }))
}

fn started(json: &str, fake: &FakeTransport) -> Harness {
    let h = harness(json, fake);
    smol::block_on(h.session.start());
    h
}

// ============================================================================
// Link navigation
// ============================================================================

#[test]
fn test_link_click_fetches_and_swaps() {
    let fake = FakeTransport::new();
    fake.page(ABOUT, ABOUT_HTML, FOOTER);
    let h = started("{}", &fake);

    let outcome = click(&h, "to-about").unwrap().unwrap();
    assert_eq!(outcome.url, ABOUT);
    assert!(!outcome.from_cache);
    assert!(!outcome.superseded);
    assert_eq!(outcome.swapped, vec!["#main".to_string()]);

    // Token refreshed before the load, fresh token used for it
    let calls = fake.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].action, actions::REFRESH_TOKEN);
    assert_eq!(calls[1].action, actions::LOAD);
    assert_eq!(calls[1].url.as_deref(), Some(ABOUT));
    assert_eq!(calls[1].token.as_deref(), Some("tok-1"));
    assert_eq!(h.session.token(), "tok-1");

    assert!(h.inner("#main").contains("<h2>About</h2>"));
    assert!(!h.inner("#main").contains("Home"));
    assert_eq!(h.title().as_deref(), Some("About us"));
    assert_eq!(h.current_url(), ABOUT);
    assert_eq!(
        h.session.history().current().state,
        Some(HistoryState::new(ABOUT))
    );
    assert_eq!(h.session.document().url(), ABOUT);
}

#[test]
fn test_bad_exclude_selector_is_skipped() {
    let fake = FakeTransport::new();
    fake.page(ABOUT, ABOUT_HTML, "");
    let h = started(
        r#"{"excludeSelectors":"a[href$='.pdf'] a:not([href]) a["}"#,
        &fake,
    );
    assert_eq!(
        h.session.config().exclude_selectors,
        vec!["a[href$='.pdf']", "a:not([href])"]
    );

    {
        let mut document = h.session.document_mut();
        let nav = document.query_selector("nav").unwrap();
        HtmlParser::new()
            .parse_fragment_into(
                document.tree_mut(),
                nav,
                r#"<a id="report" href="/files/report.pdf">Report</a>"#,
            )
            .unwrap();
    }
    let report = h.element("report");
    assert_eq!(
        h.session.intercept(&InputEvent::Click { target: report }),
        Intent::Ignore(IgnoreReason::Excluded)
    );

    let outcome = click(&h, "to-about").unwrap().unwrap();
    assert_eq!(outcome.url, ABOUT);
}

#[test]
fn test_scripts_run_after_swap_in_order() {
    let fake = FakeTransport::new();
    fake.page(ABOUT, ABOUT_HTML, FOOTER);
    let h = started("{}", &fake);

    click(&h, "to-about").unwrap().unwrap();

    let executed = h.scripts.executed();
    assert_eq!(executed.len(), 2);
    assert_eq!(
        executed[0],
        ScriptDescriptor::Inline {
            text: "aboutInit()".into()
        }
    );
    assert!(matches!(
        &executed[1],
        ScriptDescriptor::External { src, ordered: true } if src == "/footer.js"
    ));

    // Footer script lands in the live body
    let document = h.session.document();
    let footer: Vec<_> = document
        .query_selector_all("script")
        .into_iter()
        .filter(|&s| document.tree().attr(s, "src") == Some("/footer.js"))
        .collect();
    assert_eq!(footer.len(), 1);
}

#[test]
fn test_new_stylesheets_applied_before_swap() {
    let fake = FakeTransport::new();
    fake.page(ABOUT, ABOUT_HTML, "");
    let h = started("{}", &fake);

    click(&h, "to-about").unwrap().unwrap();

    assert_eq!(
        fake.stylesheet_fetches(),
        vec!["https://example.com/about.css".to_string()]
    );
    let document = h.session.document();
    let head = document.head();
    assert_eq!(document.tree().elements_by_tag(head, "link").len(), 2);
    let styles = document.tree().elements_by_tag(head, "style");
    assert_eq!(styles.len(), 1);
    assert!(document.tree().has_attr(styles[0], "data-content"));
}

#[test]
fn test_failed_stylesheet_does_not_block_navigation() {
    let fake = FakeTransport::new();
    fake.page(ABOUT, ABOUT_HTML, "")
        .fail_stylesheet("https://example.com/about.css");
    let h = started("{}", &fake);

    let outcome = click(&h, "to-about").unwrap();
    assert!(outcome.is_ok());
    assert!(h.inner("#main").contains("About"));
}

#[test]
fn test_loader_held_for_minimum_duration() {
    let fake = FakeTransport::new();
    fake.page(ABOUT, ABOUT_HTML, "");
    let h = started(r#"{"minLoaderDuration":"250"}"#, &fake);

    click(&h, "to-about").unwrap().unwrap();

    let overlay = h.session.overlay();
    assert_eq!(overlay.loader_shows(), 1);
    assert!(!overlay.loader_visible());
    let shown = overlay.loader_shown_at().unwrap();
    let hidden = overlay.loader_hidden_at().unwrap();
    assert!(hidden - shown >= 250);
}

#[test]
fn test_loader_disabled() {
    let fake = FakeTransport::new();
    fake.page(ABOUT, ABOUT_HTML, "");
    let h = started(r#"{"enableLoader":"0"}"#, &fake);

    click(&h, "to-about").unwrap().unwrap();
    assert_eq!(h.session.overlay().loader_shows(), 0);
}

#[test]
fn test_no_loader_during_initial_load() {
    let fake = FakeTransport::new();
    fake.page(ABOUT, ABOUT_HTML, "");
    // start() never ran, so the page is still in its initial load
    let h = harness("{}", &fake);

    click(&h, "to-about").unwrap().unwrap();
    assert_eq!(h.session.overlay().loader_shows(), 0);
    assert!(h.inner("#main").contains("About"));
}

#[test]
fn test_excluded_links_left_to_browser() {
    let fake = FakeTransport::new();
    let h = started(r##"{"excludeSelectors":"#to-contact"}"##, &fake);

    assert!(click(&h, "admin").is_none());
    assert!(click(&h, "to-ext").is_none());
    assert!(click(&h, "to-contact").is_none());
    assert!(fake.calls().is_empty());
    assert_eq!(h.session.history().length(), 1);
}

// ============================================================================
// Content cache
// ============================================================================

#[test]
fn test_cache_hit_skips_network() {
    let fake = FakeTransport::new();
    fake.page(ABOUT, ABOUT_HTML, "");
    let h = started(r#"{"enableCache":"1"}"#, &fake);

    click(&h, "to-about").unwrap().unwrap();
    let second = click(&h, "to-about").unwrap().unwrap();

    assert!(second.from_cache);
    assert_eq!(fake.count(actions::LOAD), 1);
    assert_eq!(fake.count(actions::REFRESH_TOKEN), 1);
    assert!(h.inner("#main").contains("<h2>About</h2>"));
    assert_eq!(h.title().as_deref(), Some("About us"));

    // A cache hit from a click is still a navigation: it pushes history
    let history = h.session.history();
    assert_eq!(history.length(), 3);
    assert_eq!(history.current().url, ABOUT);
    assert_eq!(history.current().state, Some(HistoryState::new(ABOUT)));
}

#[test]
fn test_reload_bypasses_valid_entry() {
    let fake = FakeTransport::new();
    fake.page(ABOUT, ABOUT_HTML, "");
    let h = started(r#"{"enableCache":"1"}"#, &fake);

    click(&h, "to-about").unwrap().unwrap();
    assert!(h.session.cache().get(ABOUT).is_some());

    let request = NavigationRequest::link(ABOUT, ABOUT, h.clock.now_ms()).reloading();
    let outcome = smol::block_on(h.session.navigate(request)).unwrap();

    assert!(!outcome.from_cache);
    assert_eq!(fake.loads(), vec![ABOUT.to_string(), ABOUT.to_string()]);
    assert_eq!(fake.count(actions::REFRESH_TOKEN), 2);
    assert_eq!(h.session.history().length(), 3);
}

#[test]
fn test_cache_disabled_for_logged_in_users() {
    let fake = FakeTransport::new();
    fake.page(ABOUT, ABOUT_HTML, "");
    let h = started(r#"{"enableCache":"1","isLoggedIn":"1"}"#, &fake);

    click(&h, "to-about").unwrap().unwrap();
    click(&h, "to-about").unwrap().unwrap();

    assert_eq!(fake.count(actions::LOAD), 2);
    assert!(h.session.cache().is_empty());
}

#[test]
fn test_expired_entry_refetches() {
    let fake = FakeTransport::new();
    fake.page(ABOUT, ABOUT_HTML, "");
    let h = started(r#"{"enableCache":"1","cacheLifetime":"5"}"#, &fake);

    click(&h, "to-about").unwrap().unwrap();
    h.clock.advance(6_000);
    let again = click(&h, "to-about").unwrap().unwrap();

    assert!(!again.from_cache);
    assert_eq!(fake.count(actions::LOAD), 2);
}

#[test]
fn test_zero_lifetime_never_expires() {
    let fake = FakeTransport::new();
    fake.page(ABOUT, ABOUT_HTML, "");
    let h = started(r#"{"enableCache":"1","cacheLifetime":"0"}"#, &fake);

    click(&h, "to-about").unwrap().unwrap();
    h.clock.advance(365 * 24 * 3600 * 1000);
    assert!(click(&h, "to-about").unwrap().unwrap().from_cache);
    assert_eq!(fake.count(actions::LOAD), 1);
}

// ============================================================================
// Forms
// ============================================================================

#[test]
fn test_form_redirect_followed() {
    let fake = FakeTransport::new();
    fake.respond(
        actions::SUBMIT_FORM,
        CONTACT,
        Response::new(302, "").with_header("Location", "/thank-you"),
    )
    .page(THANKS, THANKS_HTML, "");
    let h = started(
        r##"{"enableForms":"1","enableCache":"1","formRefreshTargets":"#comments"}"##,
        &fake,
    );

    let target = h.element("send");
    let outcome = smol::block_on(h.session.handle(InputEvent::Submit { target }))
        .unwrap()
        .unwrap();

    assert_eq!(outcome.url, THANKS);
    assert_eq!(outcome.swapped, vec!["#main".to_string(), "#comments".to_string()]);

    let calls = fake.calls();
    let actions_seen: Vec<_> = calls.iter().map(|c| c.action.as_str()).collect();
    assert_eq!(
        actions_seen,
        vec![actions::REFRESH_TOKEN, actions::SUBMIT_FORM, actions::LOAD]
    );
    assert_eq!(calls[1].url.as_deref(), Some(CONTACT));
    assert_eq!(
        calls[1].form_data.as_deref(),
        Some("email=a%40b.c&_wpnonce=cn&_wpnonce=cn")
    );
    assert_eq!(calls[2].url.as_deref(), Some(THANKS));

    assert_eq!(h.current_url(), THANKS);
    assert!(h.inner("#main").contains("Thank you"));
    assert!(h.inner("#comments").contains("1 comment"));
    assert!(h.session.cache().get(THANKS).is_some());
    assert!(h.session.cache().get(CONTACT).is_none());
}

#[test]
fn test_form_without_redirect_keeps_page_url() {
    let fake = FakeTransport::new();
    fake.respond(
        actions::SUBMIT_FORM,
        CONTACT,
        success(json!({ "html": CONTACT_HTML })),
    );
    let h = started(r#"{"enableForms":"1"}"#, &fake);

    let target = h.element("contact-form");
    let outcome = smol::block_on(h.session.handle(InputEvent::Submit { target }))
        .unwrap()
        .unwrap();

    assert_eq!(outcome.url, HOME);
    assert!(h.inner("#main").contains("Contact"));
}

#[test]
fn test_forms_disabled_by_default() {
    let fake = FakeTransport::new();
    let h = started("{}", &fake);
    let target = h.element("send");
    assert!(smol::block_on(h.session.handle(InputEvent::Submit { target })).is_none());
    assert!(fake.calls().is_empty());
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_server_rejection_shows_banner() {
    let fake = FakeTransport::new();
    fake.respond(actions::LOAD, ABOUT, failure(json!("boom")));
    let h = started(r#"{"enableCache":"1"}"#, &fake);

    let err = click(&h, "to-about").unwrap().unwrap_err();
    assert!(matches!(err, NavError::Application { ref message, .. } if message == "boom"));

    assert!(!h.session.overlay().loader_visible());
    assert_eq!(h.session.error_text().as_deref(), Some("boom"));
    assert_eq!(h.session.history().length(), 1);
    assert!(h.session.cache().get(ABOUT).is_none());
    assert!(h.inner("#main").contains("Home"));

    // Banner dismisses itself
    h.clock.advance(5_000);
    assert_eq!(h.session.error_text(), None);
}

#[test]
fn test_token_refresh_failure_uses_fixed_message() {
    let fake = FakeTransport::new();
    fake.fail_token_refresh(failure(json!("expired")))
        .page(ABOUT, ABOUT_HTML, "");
    let h = started("{}", &fake);

    let err = click(&h, "to-about").unwrap().unwrap_err();
    assert!(matches!(err, NavError::TokenRefresh { .. }));
    assert!(fake.loads().is_empty());
    assert_eq!(h.session.error_text().as_deref(), Some(TOKEN_REFRESH_MESSAGE));
    assert_eq!(h.session.token(), "initial");
}

#[test]
fn test_transport_failure_uses_configured_message() {
    let fake = FakeTransport::new();
    // No route: the endpoint answers 404
    let h = started(r#"{"errorMessage":"Could not load page"}"#, &fake);

    let err = click(&h, "to-contact").unwrap().unwrap_err();
    assert!(matches!(err, NavError::Transport { .. }));
    assert!(err.to_string().contains("404"));
    assert_eq!(
        h.session.error_text().as_deref(),
        Some("Could not load page")
    );
    assert_eq!(h.session.overlay().errors_shown(), 1);
}

// ============================================================================
// Hooks
// ============================================================================

#[test]
fn test_hooks_run_around_navigation() {
    let fake = FakeTransport::new();
    fake.page(ABOUT, ABOUT_HTML, "");
    let calls = Rc::new(Cell::new(0));
    let seen = calls.clone();
    let h = harness(r#"{"customJSBefore":"beforeNav()"}"#, &fake);
    let h = Harness {
        session: h.session.with_after_hook(Hook::callable(move |ctx| {
            assert_eq!(ctx.url, ABOUT);
            seen.set(seen.get() + 1);
            Ok(())
        })),
        ..h
    };

    click(&h, "to-about").unwrap().unwrap();
    assert_eq!(
        h.scripts.inline_texts(),
        vec!["beforeNav()".to_string(), "aboutInit()".to_string()]
    );
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_failing_hook_is_contained() {
    let fake = FakeTransport::new();
    fake.page(ABOUT, ABOUT_HTML, "");
    let h = harness("{}", &fake);
    let h = Harness {
        session: h
            .session
            .with_after_hook(Hook::callable(|_| anyhow::bail!("after hook broke"))),
        ..h
    };

    let outcome = click(&h, "to-about").unwrap();
    assert!(outcome.is_ok());
    assert_eq!(h.current_url(), ABOUT);
    assert_eq!(h.session.error_text(), None);
}

// ============================================================================
// History
// ============================================================================

#[test]
fn test_back_replays_landing_snapshot() {
    let fake = FakeTransport::new();
    fake.page(ABOUT, ABOUT_HTML, "");
    let h = started(r#"{"enableCache":"1"}"#, &fake);

    click(&h, "to-about").unwrap().unwrap();
    let calls_before = fake.calls().len();

    let event = h.session.back().unwrap();
    let outcome = smol::block_on(h.session.handle(event)).unwrap().unwrap();

    assert!(outcome.from_cache);
    assert_eq!(outcome.url, HOME);
    assert_eq!(fake.calls().len(), calls_before);
    assert_eq!(h.inner("#main"), "<h1>Home</h1>");
    assert_eq!(h.title().as_deref(), Some("Home"));
    assert_eq!(h.session.history().length(), 2);
    assert_eq!(h.current_url(), HOME);

    // And forward again, still without the network
    let event = h.session.forward().unwrap();
    assert_eq!(
        event,
        InputEvent::PopState {
            state: Some(HistoryState::new(ABOUT))
        }
    );
    let outcome = smol::block_on(h.session.handle(event)).unwrap().unwrap();
    assert!(outcome.from_cache);
    assert!(h.inner("#main").contains("About"));
    assert_eq!(fake.calls().len(), calls_before);
}

#[test]
fn test_back_without_cache_refetches_without_push() {
    let fake = FakeTransport::new();
    fake.page(ABOUT, ABOUT_HTML, "")
        .page(HOME, HOME_HTML, "");
    let h = started("{}", &fake);

    click(&h, "to-about").unwrap().unwrap();
    let event = h.session.back().unwrap();
    let outcome = smol::block_on(h.session.handle(event)).unwrap().unwrap();

    assert!(!outcome.from_cache);
    assert_eq!(fake.loads(), vec![ABOUT.to_string(), HOME.to_string()]);
    assert_eq!(h.session.history().length(), 2);
    assert_eq!(h.current_url(), HOME);
    assert!(h.inner("#main").contains("Home"));
}

#[test]
fn test_landing_url_matches_cache_key() {
    let fake = FakeTransport::new();
    fake.page(ABOUT, ABOUT_HTML, "");
    let h = harness_at(r#"{"enableCache":"1"}"#, &fake, "https://example.com");
    smol::block_on(h.session.start());

    assert_eq!(h.session.document().url(), HOME);
    assert_eq!(h.current_url(), HOME);
    assert!(h.session.cache().get(HOME).is_some());

    click(&h, "to-about").unwrap().unwrap();
    let event = h.session.back().unwrap();
    let outcome = smol::block_on(h.session.handle(event)).unwrap().unwrap();

    assert!(outcome.from_cache);
    assert_eq!(outcome.url, HOME);
    assert_eq!(fake.loads(), vec![ABOUT.to_string()]);
    assert_eq!(h.inner("#main"), "<h1>Home</h1>");
}

#[test]
fn test_back_at_start_of_history() {
    let fake = FakeTransport::new();
    let h = started("{}", &fake);
    assert!(h.session.back().is_none());
    assert!(h.session.forward().is_none());
}

// ============================================================================
// Event loop
// ============================================================================

#[test]
fn test_newer_navigation_wins() {
    let fake = FakeTransport::new();
    fake.page(ABOUT, ABOUT_HTML, "")
        .delay(ABOUT, 50)
        .page(CONTACT, CONTACT_HTML, "");
    let h = harness(r#"{"enableCache":"1"}"#, &fake);

    let (bus, events) = input_channel();
    assert!(bus.click(h.element("to-about")));
    assert!(bus.click(h.element("to-contact")));
    bus.close();
    let results = smol::block_on(h.session.run(events));

    assert_eq!(results.len(), 2);
    let about = results[0].as_ref().unwrap();
    let contact = results[1].as_ref().unwrap();
    assert!(about.superseded);
    assert!(about.swapped.is_empty());
    assert!(!contact.superseded);

    assert!(h.inner("#main").contains("Contact"));
    assert_eq!(h.title().as_deref(), Some("Contact"));
    assert_eq!(h.current_url(), CONTACT);
    assert_eq!(h.session.history().length(), 2);
    // The overtaken response still fills the cache
    assert!(h.session.cache().get(ABOUT).is_some());
    assert!(!h.scripts.inline_texts().contains(&"aboutInit()".to_string()));
}

#[test]
fn test_run_skips_ignored_events() {
    let fake = FakeTransport::new();
    let h = harness("{}", &fake);

    let (bus, events) = input_channel();
    bus.click(h.element("admin"));
    bus.click(h.element("to-ext"));
    bus.close();
    let results = smol::block_on(h.session.run(events));

    assert!(results.is_empty());
    assert!(fake.calls().is_empty());
}

#[test]
fn test_run_snapshots_landing_page() {
    let fake = FakeTransport::new();
    let h = harness(r#"{"enableCache":"1"}"#, &fake);

    let (bus, events) = input_channel();
    bus.close();
    assert!(!bus.pop_state(None));
    smol::block_on(h.session.run(events));

    let cache = h.session.cache();
    let entry = cache.get(HOME).unwrap();
    assert_eq!(entry.content_for("#main"), Some("<h1>Home</h1>"));
    assert_eq!(entry.title.as_deref(), Some("Home"));
}
