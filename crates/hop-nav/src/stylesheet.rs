//! Stylesheet reconciliation
//!
//! Brings a fetched page's stylesheets into the live document before its
//! content is swapped in, never inserting the same sheet twice.

use std::cell::RefCell;

use hop_dom::{Document, NodeId};
use hop_net::StyleFetcher;
use url::Url;

/// Attribute tagging injected `<style>` blocks with their content token
pub const CONTENT_TOKEN_ATTR: &str = "data-content";

/// A stylesheet reference captured from a document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StylesheetRef {
    /// `<link rel="stylesheet" href>`, identified by its href
    Link(String),
    /// `<style>` text, identified by [`content_token`]
    Inline(String),
}

/// Outcome of one [`apply_stylesheets`] batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StyleSync {
    pub links_inserted: usize,
    pub styles_inserted: usize,
    pub already_present: usize,
    pub failed: usize,
}

/// Stylesheet links (in document order) followed by non-empty inline styles
pub fn extract_stylesheets(document: &Document) -> Vec<StylesheetRef> {
    let tree = document.tree();
    let mut refs: Vec<StylesheetRef> = document
        .query_selector_all(r#"link[rel="stylesheet"]"#)
        .into_iter()
        .filter_map(|link| tree.attr(link, "href"))
        .filter(|href| !href.is_empty())
        .map(|href| StylesheetRef::Link(href.to_string()))
        .collect();

    refs.extend(
        document
            .query_selector_all("style")
            .into_iter()
            .map(|style| tree.text_content(style).trim().to_string())
            .filter(|css| !css.is_empty())
            .map(StylesheetRef::Inline),
    );

    tracing::trace!("Extracted {} stylesheets", refs.len());
    refs
}

/// Reproducible identity token for inline CSS (FNV-1a, hex)
pub fn content_token(css: &str) -> String {
    let mut state: u64 = 0xcbf29ce484222325; // FNV offset basis
    for byte in css.bytes() {
        state ^= byte as u64;
        state = state.wrapping_mul(0x100000001b3); // FNV prime
    }
    format!("{state:016x}")
}

fn has_link(document: &Document, href: &str) -> bool {
    let tree = document.tree();
    tree.elements_by_tag(tree.root(), "link")
        .into_iter()
        .any(|link| tree.attr(link, "href") == Some(href))
}

fn has_style(document: &Document, token: &str) -> bool {
    let tree = document.tree();
    tree.elements_by_tag(tree.root(), "style")
        .into_iter()
        .any(|style| tree.attr(style, CONTENT_TOKEN_ATTR) == Some(token))
}

fn append_to_head(document: &mut Document, element: NodeId) -> Result<(), hop_dom::DomError> {
    let head = document.head();
    document.tree_mut().append_child(head, element)?;
    Ok(())
}

fn absolute(base: &str, href: &str) -> String {
    Url::parse(base)
        .and_then(|base| base.join(href))
        .map(String::from)
        .unwrap_or_else(|_| href.to_string())
}

/// Ensure every ref exists in `document`; resolves once all have settled
///
/// New links are inserted into `<head>` up front, then each one's
/// load-or-error signal is awaited. Load failures count as settled.
pub async fn apply_stylesheets<F: StyleFetcher>(
    document: &RefCell<Document>,
    refs: &[StylesheetRef],
    fetcher: &F,
) -> StyleSync {
    let mut sync = StyleSync::default();
    let mut pending = Vec::new();

    {
        let mut doc = document.borrow_mut();
        for stylesheet in refs {
            match stylesheet {
                StylesheetRef::Link(href) => {
                    if has_link(&doc, href) {
                        tracing::debug!("Stylesheet link already exists: {}", href);
                        sync.already_present += 1;
                        continue;
                    }
                    let link = doc.tree_mut().create_element("link");
                    let inserted = doc
                        .tree_mut()
                        .set_attr(link, "rel", "stylesheet")
                        .and_then(|_| doc.tree_mut().set_attr(link, "href", href))
                        .and_then(|_| append_to_head(&mut doc, link));
                    match inserted {
                        Ok(()) => {
                            tracing::debug!("Stylesheet link added: {}", href);
                            sync.links_inserted += 1;
                            pending.push((href.clone(), absolute(doc.url(), href)));
                        }
                        Err(err) => {
                            tracing::warn!("Could not insert stylesheet {}: {}", href, err);
                            sync.failed += 1;
                        }
                    }
                }
                StylesheetRef::Inline(css) => {
                    let token = content_token(css);
                    if has_style(&doc, &token) {
                        tracing::debug!("Inline style already exists");
                        sync.already_present += 1;
                        continue;
                    }
                    let style = doc.tree_mut().create_element("style");
                    let inserted = doc
                        .tree_mut()
                        .set_text_content(style, css)
                        .and_then(|_| doc.tree_mut().set_attr(style, CONTENT_TOKEN_ATTR, &token))
                        .and_then(|_| append_to_head(&mut doc, style));
                    match inserted {
                        Ok(()) => {
                            tracing::debug!("Inline style added");
                            sync.styles_inserted += 1;
                        }
                        Err(err) => {
                            tracing::warn!("Could not insert inline style: {}", err);
                            sync.failed += 1;
                        }
                    }
                }
            }
        }
    }

    for (href, url) in pending {
        match fetcher.fetch_stylesheet(&url).await {
            Ok(()) => tracing::debug!("Stylesheet loaded: {}", href),
            Err(err) => {
                tracing::warn!("Error loading stylesheet {}: {}", href, err);
                sync.failed += 1;
            }
        }
    }

    sync
}
