//! Document - High-level document API

use crate::{DomResult, DomTree, ElementQuery, NodeId};

/// HTML Document
#[derive(Debug, Clone)]
pub struct Document {
    /// The DOM tree
    pub tree: DomTree,
    /// Document URL
    url: String,
    /// Cached reference to <html> element
    html_element: NodeId,
    /// Cached reference to <head> element
    head_element: NodeId,
    /// Cached reference to <body> element
    body_element: NodeId,
}

impl Document {
    /// Create a new document with an html/head/body skeleton
    pub fn new(url: &str) -> Self {
        let mut tree = DomTree::new();

        let html = tree.create_element("html");
        let head = tree.create_element("head");
        let body = tree.create_element("body");

        // Fresh detached nodes under a fresh root cannot fail to link.
        let _ = tree.append_child(tree.root(), html);
        let _ = tree.append_child(html, head);
        let _ = tree.append_child(html, body);

        Self {
            tree,
            url: url.to_string(),
            html_element: html,
            head_element: head,
            body_element: body,
        }
    }

    /// Create an empty document (no structure); call [`finalize`] after
    /// filling the tree
    ///
    /// [`finalize`]: Document::finalize
    pub fn empty(url: &str) -> Self {
        Self {
            tree: DomTree::new(),
            url: url.to_string(),
            html_element: NodeId::NONE,
            head_element: NodeId::NONE,
            body_element: NodeId::NONE,
        }
    }

    /// Locate the html/head/body elements after the tree was built
    pub fn finalize(&mut self) {
        let root = self.tree.root();
        self.html_element = self
            .tree
            .children(root)
            .find(|(id, _)| self.tree.is_tag(*id, "html"))
            .map(|(id, _)| id)
            .unwrap_or(NodeId::NONE);

        if self.html_element.is_valid() {
            let html = self.html_element;
            self.head_element = self.direct_child(html, "head");
            self.body_element = self.direct_child(html, "body");
        }
    }

    fn direct_child(&self, parent: NodeId, tag: &str) -> NodeId {
        self.tree
            .children(parent)
            .find(|(id, _)| self.tree.is_tag(*id, tag))
            .map(|(id, _)| id)
            .unwrap_or(NodeId::NONE)
    }

    /// Get document URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Update the document URL (history navigation changes the location
    /// without replacing the document)
    pub fn set_url(&mut self, url: &str) {
        self.url = url.to_string();
    }

    fn title_element(&self) -> Option<NodeId> {
        let scope = if self.head_element.is_valid() {
            self.head_element
        } else {
            self.tree.root()
        };
        self.tree.elements_by_tag(scope, "title").into_iter().next()
    }

    /// Get document title (None if there is no <title>)
    pub fn title(&self) -> Option<String> {
        self.title_element()
            .map(|id| self.tree.text_content(id).trim().to_string())
    }

    /// Set the document title, creating <title> in <head> if needed
    pub fn set_title(&mut self, title: &str) -> DomResult<()> {
        let id = match self.title_element() {
            Some(id) => id,
            None => {
                let id = self.tree.create_element("title");
                let head = self.head();
                self.tree.append_child(head, id)?;
                id
            }
        };
        self.tree.set_text_content(id, title)
    }

    /// Get <html> element
    pub fn document_element(&self) -> NodeId {
        self.html_element
    }

    /// Get <head> element (falls back to the root for headless trees)
    pub fn head(&self) -> NodeId {
        if self.head_element.is_valid() {
            self.head_element
        } else {
            self.tree.root()
        }
    }

    /// Get <body> element (falls back to the root for bodyless trees)
    pub fn body(&self) -> NodeId {
        if self.body_element.is_valid() {
            self.body_element
        } else {
            self.tree.root()
        }
    }

    /// Get element by ID
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.tree
            .descendants(self.tree.root())
            .into_iter()
            .find(|&node| self.tree.attr(node, "id") == Some(id))
    }

    /// querySelector from the document root
    pub fn query_selector(&self, selector: &str) -> Option<NodeId> {
        self.tree.query_selector(self.tree.root(), selector)
    }

    /// querySelectorAll from the document root
    pub fn query_selector_all(&self, selector: &str) -> Vec<NodeId> {
        self.tree.query_selector_all(self.tree.root(), selector)
    }

    /// Access the DOM tree
    pub fn tree(&self) -> &DomTree {
        &self.tree
    }

    /// Access the DOM tree mutably
    pub fn tree_mut(&mut self) -> &mut DomTree {
        &mut self.tree
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new("about:blank")
    }
}
