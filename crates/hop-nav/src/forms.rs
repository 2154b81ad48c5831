//! Form serialization
//!
//! Collects a form's successful controls in document order and encodes
//! them as `application/x-www-form-urlencoded`.

use hop_dom::{DomTree, ElementQuery, NodeId};
use url::form_urlencoded;

/// Input types that never contribute a value
const SKIPPED_INPUT_TYPES: &[&str] = &["submit", "button", "image", "reset", "file"];

/// Form collector - extracts form data from DOM
pub struct FormCollector;

impl FormCollector {
    /// Collect `(name, value)` pairs from a form element
    pub fn collect(tree: &DomTree, form_id: NodeId) -> Vec<(String, String)> {
        let mut fields = Vec::new();
        for id in tree.descendants(form_id) {
            match tree.tag_name(id) {
                Some("input") => Self::collect_input(tree, id, &mut fields),
                Some("select") => Self::collect_select(tree, id, &mut fields),
                Some("textarea") => Self::collect_textarea(tree, id, &mut fields),
                _ => {}
            }
        }
        fields
    }

    fn name_of(tree: &DomTree, id: NodeId) -> Option<String> {
        if tree.has_attr(id, "disabled") {
            return None;
        }
        tree.attr(id, "name")
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }

    fn collect_input(tree: &DomTree, id: NodeId, fields: &mut Vec<(String, String)>) {
        let Some(name) = Self::name_of(tree, id) else {
            return;
        };
        let input_type = tree.attr(id, "type").unwrap_or("text").to_ascii_lowercase();
        if SKIPPED_INPUT_TYPES.contains(&input_type.as_str()) {
            return;
        }
        match input_type.as_str() {
            "checkbox" | "radio" => {
                if tree.has_attr(id, "checked") {
                    let value = tree.attr(id, "value").unwrap_or("on");
                    fields.push((name, value.to_string()));
                }
            }
            _ => {
                let value = tree.attr(id, "value").unwrap_or("");
                fields.push((name, value.to_string()));
            }
        }
    }

    fn collect_select(tree: &DomTree, id: NodeId, fields: &mut Vec<(String, String)>) {
        let Some(name) = Self::name_of(tree, id) else {
            return;
        };
        let options = tree.query_selector_all(id, "option");
        let mut selected: Vec<NodeId> = options
            .iter()
            .copied()
            .filter(|&opt| tree.has_attr(opt, "selected"))
            .collect();
        // A single-choice select submits its first option by default
        if selected.is_empty() && !tree.has_attr(id, "multiple") {
            selected.extend(options.first().copied());
        }
        for option in selected {
            let value = match tree.attr(option, "value") {
                Some(value) => value.to_string(),
                None => tree.text_content(option).trim().to_string(),
            };
            fields.push((name.clone(), value));
        }
    }

    fn collect_textarea(tree: &DomTree, id: NodeId, fields: &mut Vec<(String, String)>) {
        if let Some(name) = Self::name_of(tree, id) {
            fields.push((name, tree.text_content(id)));
        }
    }
}

/// Urlencode the form's fields, appending the value of `token_field`
/// again when the form carries one
pub fn serialize_form(tree: &DomTree, form_id: NodeId, token_field: &str) -> String {
    let mut fields = FormCollector::collect(tree, form_id);

    let token_input = tree
        .query_selector_all(form_id, "input")
        .into_iter()
        .find(|&input| tree.attr(input, "name") == Some(token_field));
    if let Some(input) = token_input {
        let value = tree.attr(input, "value").unwrap_or("").to_string();
        fields.push((token_field.to_string(), value));
    }

    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish()
}
