//! Element Query and Methods
//!
//! querySelector, querySelectorAll, closest and matches over the static
//! subset of CSS selectors:
//!
//! - compounds: `tag`, `*`, `#id`, `.class`, `[attr]`, `[attr=v]`,
//!   `[attr~=v]`, `[attr|=v]`, `[attr^=v]`, `[attr$=v]`, `[attr*=v]`, with
//!   an optional ` i` case flag
//! - pseudo-classes: `:not()`, `:first-child`, `:last-child`,
//!   `:only-child`, `:nth-child()`, `:nth-last-child()`, `:empty`,
//!   `:root`, `:link`, `:checked`, `:disabled`, `:enabled`
//! - combinators: descendant, `>`, `+`, `~`, in comma-separated groups
//!
//! Interaction states (`:hover`, `:focus`, ...) and pseudo-elements never
//! apply to a document without a user and are rejected.

use crate::{DomError, DomResult, DomTree, NodeId};

/// Element query trait
pub trait ElementQuery {
    /// First element in the subtree of `root` (excluding `root`) matching
    fn query_selector(&self, root: NodeId, selector: &str) -> Option<NodeId>;

    /// All elements in the subtree of `root` matching, in document order
    fn query_selector_all(&self, root: NodeId, selector: &str) -> Vec<NodeId>;

    /// Nearest inclusive ancestor matching the selector
    fn closest(&self, element: NodeId, selector: &str) -> Option<NodeId>;

    /// Check if an element matches the selector
    fn matches(&self, element: NodeId, selector: &str) -> bool;
}

/// Attribute comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrOp {
    Exists,
    Equals(String),
    /// `~=`: whitespace-separated word match
    Includes(String),
    /// `|=`: exact or followed by a hyphen
    DashMatch(String),
    /// `^=`
    Prefix(String),
    /// `$=`
    Suffix(String),
    /// `*=`
    Substring(String),
}

/// `[name op value]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrSelector {
    pub name: String,
    pub op: AttrOp,
    pub case_insensitive: bool,
}

impl AttrSelector {
    fn matches(&self, value: Option<&str>) -> bool {
        let Some(value) = value else {
            return false;
        };
        let fold = |s: &str| {
            if self.case_insensitive {
                s.to_lowercase()
            } else {
                s.to_string()
            }
        };
        let value = fold(value);
        match &self.op {
            AttrOp::Exists => true,
            AttrOp::Equals(expected) => value == fold(expected),
            AttrOp::Includes(expected) => {
                let expected = fold(expected);
                value.split_whitespace().any(|w| w == expected)
            }
            AttrOp::DashMatch(expected) => {
                let expected = fold(expected);
                value == expected
                    || value
                        .strip_prefix(expected.as_str())
                        .is_some_and(|rest| rest.starts_with('-'))
            }
            AttrOp::Prefix(expected) => !expected.is_empty() && value.starts_with(&fold(expected)),
            AttrOp::Suffix(expected) => !expected.is_empty() && value.ends_with(&fold(expected)),
            AttrOp::Substring(expected) => !expected.is_empty() && value.contains(&fold(expected)),
        }
    }
}

/// `An+B` for the nth-child family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NthExpression {
    pub a: i32,
    pub b: i32,
}

impl NthExpression {
    /// Parse `odd`, `even`, `3`, `2n+1`, `-n+3`
    pub fn parse(s: &str) -> Option<Self> {
        let s: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        match s.as_str() {
            "odd" => return Some(Self { a: 2, b: 1 }),
            "even" => return Some(Self { a: 2, b: 0 }),
            _ => {}
        }
        if let Ok(b) = s.parse::<i32>() {
            return Some(Self { a: 0, b });
        }

        let n_pos = s.find('n')?;
        let a = match &s[..n_pos] {
            "" | "+" => 1,
            "-" => -1,
            a => a.parse().ok()?,
        };
        let rest = &s[n_pos + 1..];
        let b = if rest.is_empty() { 0 } else { rest.parse().ok()? };
        Some(Self { a, b })
    }

    /// Whether the 1-based position `n` is selected
    pub fn matches(&self, n: i32) -> bool {
        if self.a == 0 {
            return n == self.b;
        }
        let diff = n - self.b;
        diff % self.a == 0 && diff / self.a >= 0
    }
}

/// Pseudo-class
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PseudoClass {
    /// `:not(a, b)`: matches none of the compounds
    Not(Vec<Compound>),
    FirstChild,
    LastChild,
    OnlyChild,
    NthChild(NthExpression),
    NthLastChild(NthExpression),
    Empty,
    Root,
    /// `a` or `area` with an `href`
    Link,
    Checked,
    Disabled,
    Enabled,
}

const FORM_CONTROLS: &[&str] = &[
    "button", "input", "select", "textarea", "optgroup", "option", "fieldset",
];

impl PseudoClass {
    fn parse(name: &str, arg: Option<&str>) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        match (name.as_str(), arg) {
            ("not", Some(arg)) => {
                let compounds = split_top_level(arg, ',')?
                    .iter()
                    .map(|part| parse_compound(part.trim()))
                    .collect::<Option<Vec<_>>>()?;
                Some(Self::Not(compounds))
            }
            ("nth-child", Some(arg)) => NthExpression::parse(arg).map(Self::NthChild),
            ("nth-last-child", Some(arg)) => NthExpression::parse(arg).map(Self::NthLastChild),
            (_, Some(_)) => None,
            ("first-child", None) => Some(Self::FirstChild),
            ("last-child", None) => Some(Self::LastChild),
            ("only-child", None) => Some(Self::OnlyChild),
            ("empty", None) => Some(Self::Empty),
            ("root", None) => Some(Self::Root),
            ("link" | "any-link", None) => Some(Self::Link),
            ("checked", None) => Some(Self::Checked),
            ("disabled", None) => Some(Self::Disabled),
            ("enabled", None) => Some(Self::Enabled),
            _ => None,
        }
    }

    fn matches(&self, tree: &DomTree, id: NodeId) -> bool {
        let tag = tree.tag_name(id).unwrap_or("");
        match self {
            Self::Not(compounds) => !compounds.iter().any(|c| c.matches(tree, id)),
            Self::FirstChild => sibling_position(tree, id).is_some_and(|(pos, _)| pos == 1),
            Self::LastChild => sibling_position(tree, id).is_some_and(|(pos, len)| pos == len),
            Self::OnlyChild => sibling_position(tree, id).is_some_and(|(_, len)| len == 1),
            Self::NthChild(nth) => {
                sibling_position(tree, id).is_some_and(|(pos, _)| nth.matches(pos as i32))
            }
            Self::NthLastChild(nth) => sibling_position(tree, id)
                .is_some_and(|(pos, len)| nth.matches((len - pos + 1) as i32)),
            Self::Empty => !tree
                .children(id)
                .any(|(_, node)| node.is_element() || node.as_text().is_some_and(|t| !t.is_empty())),
            Self::Root => tree
                .parent(id)
                .and_then(|parent| tree.get(parent))
                .is_some_and(|parent| !parent.is_element() && !parent.is_text()),
            Self::Link => matches!(tag, "a" | "area") && tree.has_attr(id, "href"),
            Self::Checked => match tag {
                "input" => tree.has_attr(id, "checked"),
                "option" => tree.has_attr(id, "selected"),
                _ => false,
            },
            Self::Disabled => FORM_CONTROLS.contains(&tag) && tree.has_attr(id, "disabled"),
            Self::Enabled => FORM_CONTROLS.contains(&tag) && !tree.has_attr(id, "disabled"),
        }
    }
}

/// 1-based position among element siblings, and the sibling count
fn sibling_position(tree: &DomTree, id: NodeId) -> Option<(usize, usize)> {
    let parent = tree.parent(id)?;
    let siblings: Vec<NodeId> = tree
        .children(parent)
        .filter(|(_, node)| node.is_element())
        .map(|(child, _)| child)
        .collect();
    let pos = siblings.iter().position(|&s| s == id)?;
    Some((pos + 1, siblings.len()))
}

fn previous_element_siblings(tree: &DomTree, id: NodeId) -> Vec<NodeId> {
    let Some(parent) = tree.parent(id) else {
        return Vec::new();
    };
    let mut before: Vec<NodeId> = tree
        .children(parent)
        .filter(|(_, node)| node.is_element())
        .map(|(child, _)| child)
        .take_while(|&child| child != id)
        .collect();
    // Nearest first
    before.reverse();
    before
}

/// Compound selector: every part must match the same element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compound {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attrs: Vec<AttrSelector>,
    pub pseudos: Vec<PseudoClass>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
    /// `+`
    NextSibling,
    /// `~`
    SubsequentSibling,
}

impl Combinator {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            ">" => Some(Self::Child),
            "+" => Some(Self::NextSibling),
            "~" => Some(Self::SubsequentSibling),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Chain {
    compounds: Vec<Compound>,
    /// `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`
    combinators: Vec<Combinator>,
}

/// Parsed selector list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    chains: Vec<Chain>,
}

impl Selector {
    /// Parse a selector string
    pub fn parse(s: &str) -> DomResult<Self> {
        let invalid = || DomError::InvalidSelector(s.to_string());
        let chains = split_top_level(s, ',')
            .ok_or_else(invalid)?
            .iter()
            .map(|group| parse_chain(group))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(invalid)?;

        Ok(Self {
            source: s.trim().to_string(),
            chains,
        })
    }

    /// Original selector text
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Check if an element matches
    pub fn matches(&self, tree: &DomTree, id: NodeId) -> bool {
        self.chains.iter().any(|chain| {
            let last = chain.compounds.len() - 1;
            match_from(tree, chain, id, last)
        })
    }

    /// First matching descendant of `root`
    pub fn query(&self, tree: &DomTree, root: NodeId) -> Option<NodeId> {
        tree.descendants(root)
            .into_iter()
            .find(|&node| self.matches(tree, node))
    }

    /// All matching descendants of `root`
    pub fn query_all(&self, tree: &DomTree, root: NodeId) -> Vec<NodeId> {
        tree.descendants(root)
            .into_iter()
            .filter(|&node| self.matches(tree, node))
            .collect()
    }

    /// Nearest inclusive ancestor matching
    pub fn closest(&self, tree: &DomTree, id: NodeId) -> Option<NodeId> {
        std::iter::once(id)
            .chain(tree.ancestors(id))
            .find(|&node| self.matches(tree, node))
    }
}

impl Compound {
    /// Check a single element against this compound
    pub fn matches(&self, tree: &DomTree, id: NodeId) -> bool {
        let Some(tag) = tree.tag_name(id) else {
            return false;
        };

        if let Some(expected) = &self.tag {
            if !tag.eq_ignore_ascii_case(expected) {
                return false;
            }
        }
        if let Some(expected) = &self.id {
            if tree.attr(id, "id") != Some(expected.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let class_attr = tree.attr(id, "class").unwrap_or("");
            let has_all = self
                .classes
                .iter()
                .all(|class| class_attr.split_whitespace().any(|c| c == class));
            if !has_all {
                return false;
            }
        }

        self.attrs.iter().all(|sel| sel.matches(tree.attr(id, &sel.name)))
            && self.pseudos.iter().all(|pseudo| pseudo.matches(tree, id))
    }
}

fn match_from(tree: &DomTree, chain: &Chain, node: NodeId, idx: usize) -> bool {
    if !chain.compounds[idx].matches(tree, node) {
        return false;
    }
    if idx == 0 {
        return true;
    }
    match chain.combinators[idx - 1] {
        Combinator::Child => tree
            .parent(node)
            .is_some_and(|parent| match_from(tree, chain, parent, idx - 1)),
        Combinator::Descendant => tree
            .ancestors(node)
            .into_iter()
            .any(|ancestor| match_from(tree, chain, ancestor, idx - 1)),
        Combinator::NextSibling => previous_element_siblings(tree, node)
            .first()
            .is_some_and(|&prev| match_from(tree, chain, prev, idx - 1)),
        Combinator::SubsequentSibling => previous_element_siblings(tree, node)
            .into_iter()
            .any(|prev| match_from(tree, chain, prev, idx - 1)),
    }
}

fn parse_chain(group: &str) -> Option<Chain> {
    let mut compounds = Vec::new();
    let mut combinators = Vec::new();
    let mut pending: Option<Combinator> = None;

    for token in tokenize(group)? {
        if let Some(combinator) = Combinator::from_token(&token) {
            if compounds.is_empty() || pending.is_some() {
                return None;
            }
            pending = Some(combinator);
            continue;
        }
        let compound = parse_compound(&token)?;
        if !compounds.is_empty() {
            combinators.push(pending.take().unwrap_or(Combinator::Descendant));
        }
        compounds.push(compound);
    }

    if compounds.is_empty() || pending.is_some() {
        return None;
    }
    Some(Chain { compounds, combinators })
}

/// Nesting state while scanning selector text: brackets, parentheses
/// and quoted strings are opaque to splitting
#[derive(Default)]
struct Scanner {
    brackets: usize,
    parens: usize,
    quote: Option<char>,
}

impl Scanner {
    /// Feed one char; returns true when it sits at the top level
    fn step(&mut self, c: char) -> Option<bool> {
        if let Some(q) = self.quote {
            if c == q {
                self.quote = None;
            }
            return Some(false);
        }
        match c {
            '"' | '\'' if self.brackets > 0 || self.parens > 0 => self.quote = Some(c),
            '[' => self.brackets += 1,
            ']' => self.brackets = self.brackets.checked_sub(1)?,
            '(' => self.parens += 1,
            ')' => self.parens = self.parens.checked_sub(1)?,
            _ => return Some(self.brackets == 0 && self.parens == 0),
        }
        Some(false)
    }

    fn balanced(&self) -> bool {
        self.brackets == 0 && self.parens == 0 && self.quote.is_none()
    }
}

/// Split on `sep` outside brackets, parentheses and quotes
pub(crate) fn split_top_level(s: &str, sep: char) -> Option<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut scanner = Scanner::default();
    for c in s.chars() {
        if scanner.step(c)? && c == sep {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    if !scanner.balanced() {
        return None;
    }
    parts.push(current);
    Some(parts)
}

/// Split on whitespace and combinators while keeping bracketed and
/// parenthesized text intact
fn tokenize(group: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut scanner = Scanner::default();

    for c in group.chars() {
        let top = scanner.step(c)?;
        if top && c.is_whitespace() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else if top && matches!(c, '>' | '+' | '~') {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            tokens.push(c.to_string());
        } else {
            current.push(c);
        }
    }

    if !scanner.balanced() {
        return None;
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Some(tokens)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn take_ident(chars: &[char], mut pos: usize) -> (String, usize) {
    let mut out = String::new();
    while pos < chars.len() && is_ident_char(chars[pos]) {
        out.push(chars[pos]);
        pos += 1;
    }
    (out, pos)
}

/// Index of the `close` matching the opener at `open`
fn find_close(chars: &[char], open: usize) -> Option<usize> {
    let mut scanner = Scanner::default();
    for (i, &c) in chars.iter().enumerate().skip(open) {
        scanner.step(c)?;
        if scanner.balanced() {
            return Some(i);
        }
    }
    None
}

fn parse_compound(token: &str) -> Option<Compound> {
    let chars: Vec<char> = token.chars().collect();
    let mut compound = Compound::default();
    let mut pos = 0;

    if chars.first() == Some(&'*') {
        pos = 1;
    } else if chars.first().is_some_and(|&c| is_ident_char(c)) {
        let (tag, next) = take_ident(&chars, 0);
        compound.tag = Some(tag.to_ascii_lowercase());
        pos = next;
    }

    while pos < chars.len() {
        match chars[pos] {
            '#' => {
                let (id, next) = take_ident(&chars, pos + 1);
                if id.is_empty() {
                    return None;
                }
                compound.id = Some(id);
                pos = next;
            }
            '.' => {
                let (class, next) = take_ident(&chars, pos + 1);
                if class.is_empty() {
                    return None;
                }
                compound.classes.push(class);
                pos = next;
            }
            '[' => {
                let close = find_close(&chars, pos)?;
                let inner: String = chars[pos + 1..close].iter().collect();
                compound.attrs.push(parse_attr(&inner)?);
                pos = close + 1;
            }
            ':' => {
                let (name, next) = take_ident(&chars, pos + 1);
                if name.is_empty() {
                    return None;
                }
                let arg = if chars.get(next) == Some(&'(') {
                    let close = find_close(&chars, next)?;
                    pos = close + 1;
                    Some(chars[next + 1..close].iter().collect::<String>())
                } else {
                    pos = next;
                    None
                };
                compound
                    .pseudos
                    .push(PseudoClass::parse(&name, arg.as_deref())?);
            }
            _ => return None,
        }
    }

    Some(compound)
}

fn parse_attr(inner: &str) -> Option<AttrSelector> {
    let inner = inner.trim();
    let (inner, case_insensitive) = match inner
        .strip_suffix(" i")
        .or_else(|| inner.strip_suffix(" I"))
    {
        Some(rest) => (rest.trim_end(), true),
        None => (inner, false),
    };
    let unquote = |v: &str| {
        let v = v.trim();
        let stripped = v
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .or_else(|| v.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
            .unwrap_or(v);
        stripped.to_string()
    };

    let Some(eq) = inner.find('=') else {
        if inner.is_empty() || !inner.chars().all(is_ident_char) {
            return None;
        }
        return Some(AttrSelector {
            name: inner.to_ascii_lowercase(),
            op: AttrOp::Exists,
            case_insensitive,
        });
    };

    let (lhs, value) = (&inner[..eq], unquote(&inner[eq + 1..]));
    let (name, op) = match lhs.chars().last() {
        Some('~') => (&lhs[..lhs.len() - 1], AttrOp::Includes(value)),
        Some('|') => (&lhs[..lhs.len() - 1], AttrOp::DashMatch(value)),
        Some('^') => (&lhs[..lhs.len() - 1], AttrOp::Prefix(value)),
        Some('$') => (&lhs[..lhs.len() - 1], AttrOp::Suffix(value)),
        Some('*') => (&lhs[..lhs.len() - 1], AttrOp::Substring(value)),
        _ => (lhs, AttrOp::Equals(value)),
    };

    let name = name.trim();
    if name.is_empty() || !name.chars().all(is_ident_char) {
        return None;
    }
    Some(AttrSelector {
        name: name.to_ascii_lowercase(),
        op,
        case_insensitive,
    })
}

fn parse_or_warn(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(sel) => Some(sel),
        Err(err) => {
            tracing::warn!("{err}");
            None
        }
    }
}

impl ElementQuery for DomTree {
    fn query_selector(&self, root: NodeId, selector: &str) -> Option<NodeId> {
        parse_or_warn(selector)?.query(self, root)
    }

    fn query_selector_all(&self, root: NodeId, selector: &str) -> Vec<NodeId> {
        parse_or_warn(selector)
            .map(|sel| sel.query_all(self, root))
            .unwrap_or_default()
    }

    fn closest(&self, element: NodeId, selector: &str) -> Option<NodeId> {
        parse_or_warn(selector)?.closest(self, element)
    }

    fn matches(&self, element: NodeId, selector: &str) -> bool {
        parse_or_warn(selector).is_some_and(|sel| sel.matches(self, element))
    }
}
