//! Script re-execution
//!
//! Scripts that arrive through innerHTML assignment are inert. Each one is
//! rebuilt as a fresh element, put back where the old one was, and handed
//! to the [`ScriptHost`], which stands in for the page's script engine.

use hop_dom::{Document, DomError, DomTree, ElementQuery, NodeId};
use hop_html::HtmlParser;

/// What a rebuilt `<script>` runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptDescriptor {
    /// `src` script; `ordered` is set for footer scripts (`async = false`)
    External { src: String, ordered: bool },
    Inline { text: String },
}

impl ScriptDescriptor {
    /// Describe a `<script>` element (src wins over text)
    pub fn from_element(tree: &DomTree, script: NodeId) -> Self {
        match tree.attr(script, "src").filter(|src| !src.is_empty()) {
            Some(src) => ScriptDescriptor::External {
                src: src.to_string(),
                ordered: false,
            },
            None => ScriptDescriptor::Inline {
                text: tree.text_content(script),
            },
        }
    }
}

/// Script execution failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("script error: {0}")]
pub struct ScriptError(pub String);

/// Runs scripts inserted into the live document
pub trait ScriptHost {
    fn execute(&self, script: &ScriptDescriptor) -> Result<(), ScriptError>;
}

/// Host that only logs what would run
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingScriptHost;

impl ScriptHost for TracingScriptHost {
    fn execute(&self, script: &ScriptDescriptor) -> Result<(), ScriptError> {
        match script {
            ScriptDescriptor::External { src, .. } => tracing::debug!("Script executed: {}", src),
            ScriptDescriptor::Inline { text } => {
                tracing::debug!("Inline script executed ({} bytes)", text.len())
            }
        }
        Ok(())
    }
}

fn build_script(tree: &mut DomTree, script: &ScriptDescriptor) -> Result<NodeId, DomError> {
    let fresh = tree.create_element("script");
    match script {
        // `ordered` is a property of the element, not markup
        ScriptDescriptor::External { src, .. } => tree.set_attr(fresh, "src", src)?,
        ScriptDescriptor::Inline { text } => tree.set_text_content(fresh, text)?,
    }
    Ok(fresh)
}

fn run(host: &dyn ScriptHost, script: &ScriptDescriptor) {
    if let Err(err) = host.execute(script) {
        tracing::warn!("{}", err);
    }
}

/// Rebuild and run every script inside the first element matching
/// `selector`; returns how many ran
pub fn reexecute_scripts(
    document: &mut Document,
    selector: &str,
    host: &dyn ScriptHost,
) -> Result<usize, DomError> {
    let Some(container) = document.query_selector(selector) else {
        return Ok(0);
    };

    let tree = document.tree_mut();
    let scripts = tree.query_selector_all(container, "script");
    for old in &scripts {
        let descriptor = ScriptDescriptor::from_element(tree, *old);
        let Some(parent) = tree.parent(*old) else {
            continue;
        };
        let fresh = build_script(tree, &descriptor)?;
        tree.replace_child(parent, fresh, *old)?;
        run(host, &descriptor);
        tracing::debug!("Script re-executed in target: {}", selector);
    }
    Ok(scripts.len())
}

/// Parse footer markup off-document and append fresh copies of its
/// scripts to `<body>` in order; external ones keep declaration order
pub fn execute_footer_scripts(
    document: &mut Document,
    markup: &str,
    host: &dyn ScriptHost,
) -> Result<usize, hop_html::ParseError> {
    if markup.trim().is_empty() {
        return Ok(0);
    }

    let mut scratch = DomTree::new();
    let holder = scratch.create_element("div");
    scratch.append_child(scratch.root(), holder)?;
    HtmlParser::new().parse_fragment_into(&mut scratch, holder, markup)?;

    let descriptors: Vec<ScriptDescriptor> = scratch
        .query_selector_all(holder, "script")
        .into_iter()
        .map(|script| match ScriptDescriptor::from_element(&scratch, script) {
            ScriptDescriptor::External { src, .. } => ScriptDescriptor::External { src, ordered: true },
            inline => inline,
        })
        .collect();

    let body = document.body();
    for descriptor in &descriptors {
        let fresh = build_script(document.tree_mut(), descriptor)?;
        document.tree_mut().append_child(body, fresh)?;
        run(host, descriptor);
        tracing::debug!("Footer script executed: {:?}", descriptor);
    }
    Ok(descriptors.len())
}
