//! hop DOM - Document Object Model
//!
//! Arena-allocated DOM tree that the navigation engine reads from and
//! swaps content into. Nodes are addressed by [`NodeId`]; detached nodes
//! stay in the arena until the document is dropped.

mod document;
mod error;
mod interner;
mod node;
mod selector;
mod tree;

pub use document::Document;
pub use error::{DomError, DomResult};
pub use interner::{InternedString, StringInterner};
pub use node::{Attribute, ElementData, Node, NodeData};
pub use selector::{
    AttrOp, AttrSelector, Compound, ElementQuery, NthExpression, PseudoClass, Selector,
};
pub use tree::DomTree;

/// Node identifier (index into arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Root (document) node ID
    pub const ROOT: NodeId = NodeId(0);
    /// Sentinel for "no node"
    pub const NONE: NodeId = NodeId(u32::MAX);

    /// Check that this id refers to a node
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::NONE
    }

    /// Arena index
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}
