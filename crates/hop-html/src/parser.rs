//! HTML5 Parser implementation
//!
//! Uses html5ever's RcDom and converts it to the hop arena DOM.

use hop_dom::{Document, DomTree, NodeId};
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};

use crate::ParseError;

/// HTML5 parser
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlParser;

impl HtmlParser {
    /// Create a new HTML parser
    pub fn new() -> Self {
        Self
    }

    /// Parse HTML string into a Document
    pub fn parse(&self, html: &str) -> Result<Document, ParseError> {
        self.parse_with_url(html, "about:blank")
    }

    /// Parse HTML with a document URL
    pub fn parse_with_url(&self, html: &str, url: &str) -> Result<Document, ParseError> {
        tracing::trace!("Parsing HTML document: {}", url);

        let dom = parse_document(RcDom::default(), Default::default())
            .from_utf8()
            .read_from(&mut html.as_bytes())?;

        let mut document = Document::empty(url);
        let root = document.tree().root();
        for child in dom.document.children.borrow().iter() {
            convert_node(child, document.tree_mut(), root)?;
        }
        document.finalize();

        tracing::trace!("Parsed {} nodes", document.tree().len());
        Ok(document)
    }

    /// Parse a markup fragment as body content and append the resulting
    /// nodes under `parent`, returning the top-level nodes created
    pub fn parse_fragment_into(
        &self,
        tree: &mut DomTree,
        parent: NodeId,
        html: &str,
    ) -> Result<Vec<NodeId>, ParseError> {
        let wrapped = format!("<!DOCTYPE html><html><head></head><body>{html}</body></html>");
        let dom = parse_document(RcDom::default(), Default::default())
            .from_utf8()
            .read_from(&mut wrapped.as_bytes())?;

        let body = find_body(&dom.document).ok_or(ParseError::MissingBody)?;
        let mut created = Vec::new();
        for child in body.children.borrow().iter() {
            if let Some(id) = convert_node(child, tree, parent)? {
                created.push(id);
            }
        }
        Ok(created)
    }
}

fn find_body(document: &Handle) -> Option<Handle> {
    let html = document
        .children
        .borrow()
        .iter()
        .find(|h| is_element(h, "html"))
        .cloned()?;
    let body = html
        .children
        .borrow()
        .iter()
        .find(|h| is_element(h, "body"))
        .cloned();
    body
}

fn is_element(handle: &Handle, tag: &str) -> bool {
    matches!(&handle.data, RcNodeData::Element { name, .. } if &*name.local == tag)
}

/// Convert an RcDom node (and its subtree) into `tree` under `parent`
fn convert_node(
    handle: &Handle,
    tree: &mut DomTree,
    parent: NodeId,
) -> Result<Option<NodeId>, ParseError> {
    let id = match &handle.data {
        RcNodeData::Document => {
            for child in handle.children.borrow().iter() {
                convert_node(child, tree, parent)?;
            }
            return Ok(None);
        }
        RcNodeData::Doctype { name, .. } => tree.create_doctype(name),
        RcNodeData::Text { contents } => {
            let text = contents.borrow().to_string();
            tree.create_text(&text)
        }
        RcNodeData::Comment { contents } => tree.create_comment(contents),
        RcNodeData::Element {
            name,
            attrs,
            template_contents,
            ..
        } => {
            let id = tree.create_element(&name.local);
            for attr in attrs.borrow().iter() {
                tree.set_attr(id, &attr.name.local, &attr.value)?;
            }
            tree.append_child(parent, id)?;
            for child in handle.children.borrow().iter() {
                convert_node(child, tree, id)?;
            }
            // <template> content lives in a separate fragment; inline it
            if let Some(contents) = template_contents.borrow().as_ref() {
                for child in contents.children.borrow().iter() {
                    convert_node(child, tree, id)?;
                }
            }
            return Ok(Some(id));
        }
        RcNodeData::ProcessingInstruction { .. } => return Ok(None),
    };

    tree.append_child(parent, id)?;
    Ok(Some(id))
}
