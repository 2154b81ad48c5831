//! hop HTML
//!
//! HTML5 parsing built on html5ever, plus the innerHTML/outerHTML
//! serializer used to snapshot and swap container content.

mod parser;
mod serializer;

pub use hop_dom::Document;
pub use parser::HtmlParser;
pub use serializer::{HtmlSerializer, get_inner_html, get_outer_html, set_inner_html};

/// Parse an HTML string into a detached document
pub fn parse(html: &str) -> Result<Document, ParseError> {
    HtmlParser::new().parse(html)
}

/// Parse error
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to read HTML input: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to build DOM: {0}")]
    Dom(#[from] hop_dom::DomError),

    #[error("fragment parse produced no <body>")]
    MissingBody,
}
