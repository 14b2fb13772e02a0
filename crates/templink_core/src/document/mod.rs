//! Document model contract consumed by the token components.
//!
//! # Responsibility
//! - Describe the rich-text engine surface the core relies on: a tagged node
//!   tree, caret/selection, markup insertion, default key handling, layout
//!   boxes, focus and pointer-listener registration.
//! - Provide `MemoryDocument`, a complete in-memory implementation.
//!
//! # Invariants
//! - Every node is exactly one of `Text`, `Element` or `Token`; "is this a
//!   token" is answered by the kind tag, never by attribute inspection.
//! - Offsets into text nodes count chars, offsets into elements count children.

pub mod markup;
pub mod memory;

use crate::render::RenderedToken;
use serde::{Deserialize, Serialize};

pub use markup::MarkupError;

/// Handle of one node in a document tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// Kind tag of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Run of editable characters.
    Text,
    /// Structural node with an ordered child list.
    Element,
    /// Atomic, non-editable template reference.
    Token,
}

/// State persisted on a token node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenState {
    /// Bound template id; empty means deliberately unbound.
    pub bound_id: String,
    pub label: String,
    /// Mirrors the error flag of the last render pass.
    pub ok: bool,
}

impl TokenState {
    pub fn unbound() -> Self {
        Self::bound_to("")
    }

    pub fn bound_to(bound_id: impl Into<String>) -> Self {
        Self {
            bound_id: bound_id.into(),
            label: String::new(),
            ok: false,
        }
    }

    pub fn is_unbound(&self) -> bool {
        self.bound_id.trim().is_empty()
    }
}

/// Caret position: a reference node and an offset into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caret {
    pub node: NodeId,
    pub offset: usize,
}

impl Caret {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// Current selection; collapsed when anchor and focus coincide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Caret,
    pub focus: Caret,
}

impl Selection {
    pub fn collapsed(caret: Caret) -> Self {
        Self {
            anchor: caret,
            focus: caret,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// Returns the caret when the selection is collapsed.
    pub fn caret(&self) -> Option<Caret> {
        self.is_collapsed().then_some(self.anchor)
    }
}

/// Direction of a delete-class key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteDirection {
    /// Backspace: removes content before the caret.
    Backward,
    /// Delete: removes content after the caret.
    Forward,
}

/// Key-down input delivered through the document's key hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Backspace,
    Delete,
    Char(char),
    Enter,
    Other,
}

impl Key {
    /// Returns the delete direction for delete-class keys.
    pub fn delete_direction(self) -> Option<DeleteDirection> {
        match self {
            Self::Backspace => Some(DeleteDirection::Backward),
            Self::Delete => Some(DeleteDirection::Forward),
            Self::Char(_) | Self::Enter | Self::Other => None,
        }
    }
}

/// Outcome of a key hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyHandling {
    /// The engine's default editing action should run.
    Default,
    /// The default action was suppressed; the hook already edited the tree.
    Handled,
}

/// Point in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box, `y` growing downwards.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x < self.x + self.width
            && point.y >= self.y
            && point.y < self.y + self.height
    }
}

/// Interaction context a pointer listener is attached to.
///
/// The document surface may be rooted separately from the page (an embedded
/// frame), so outside-click detection has to listen on both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerScope {
    Page,
    Surface,
}

/// Handle of a registered pointer listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Rich-text engine surface consumed by the token components.
///
/// Implementors own the node tree; the core only navigates it, rewrites token
/// state and removes whole token nodes.
pub trait DocumentModel {
    fn root(&self) -> NodeId;
    fn kind(&self, node: NodeId) -> Option<NodeKind>;
    fn parent(&self, node: NodeId) -> Option<NodeId>;
    /// Ordered children; empty for text and token nodes.
    fn children(&self, node: NodeId) -> Vec<NodeId>;
    /// Length in chars of a text node; `None` for other kinds.
    fn text_len(&self, node: NodeId) -> Option<usize>;

    fn token(&self, node: NodeId) -> Option<TokenState>;
    /// Rewrites the binding attribute. Returns `false` if `node` is not a token.
    fn set_token_binding(&mut self, node: NodeId, bound_id: &str) -> bool;
    /// Rewrites label and error flag. Returns `false` if `node` is not a token.
    fn set_token_display(&mut self, node: NodeId, rendered: &RenderedToken) -> bool;

    /// Detaches `node` and its subtree as one operation.
    fn remove_node(&mut self, node: NodeId) -> bool;

    fn selection(&self) -> Option<Selection>;
    /// Inserts a markup fragment at the caret and returns the new top-level nodes.
    fn insert_markup(&mut self, markup: &str) -> Result<Vec<NodeId>, MarkupError>;
    /// Runs the engine's own editing action for `key`.
    fn perform_default_key(&mut self, key: Key);
    /// Init hook: declares an element shape as valid content.
    fn register_element_rule(&mut self, rule: &str);

    /// On-surface bounding box of a rendered node.
    fn bounding_box(&self, node: NodeId) -> Option<Rect>;
    /// Page position of the document surface's origin.
    fn surface_offset(&self) -> Point;
    fn focus(&mut self);

    fn add_pointer_listener(&mut self, scope: PointerScope) -> ListenerId;
    fn remove_pointer_listener(&mut self, listener: ListenerId) -> bool;

    fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        let siblings = self.children(self.parent(node)?);
        let index = siblings.iter().position(|&candidate| candidate == node)?;
        index.checked_sub(1).map(|prev| siblings[prev])
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let siblings = self.children(self.parent(node)?);
        let index = siblings.iter().position(|&candidate| candidate == node)?;
        siblings.get(index + 1).copied()
    }

    fn is_token(&self, node: NodeId) -> bool {
        self.kind(node) == Some(NodeKind::Token)
    }

    /// Nearest token at or above `node`.
    fn closest_token(&self, node: NodeId) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if self.is_token(candidate) {
                return Some(candidate);
            }
            current = self.parent(candidate);
        }
        None
    }

    /// All tokens currently attached to the tree, in document order.
    fn tokens(&self) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack = vec![self.root()];
        while let Some(node) = stack.pop() {
            match self.kind(node) {
                Some(NodeKind::Token) => found.push(node),
                Some(NodeKind::Element) => {
                    stack.extend(self.children(node).into_iter().rev());
                }
                Some(NodeKind::Text) | None => {}
            }
        }
        found
    }

    /// Whether `node` is still attached to the tree.
    fn contains(&self, node: NodeId) -> bool {
        let root = self.root();
        let mut current = Some(node);
        while let Some(candidate) = current {
            if candidate == root {
                return true;
            }
            current = self.parent(candidate);
        }
        false
    }
}
