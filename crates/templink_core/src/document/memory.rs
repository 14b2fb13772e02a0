//! In-memory document model.
//!
//! # Responsibility
//! - Implement `DocumentModel` over an arena-backed node tree.
//! - Provide the default editing behaviour of delete-class and character keys.
//! - Lay content out with fixed metrics so bounding boxes are reproducible.
//!
//! # Invariants
//! - Detached nodes are freed; their ids never resolve again.
//! - Node ids are arena indexes and are never reused, so the arena grows by
//!   one slot per node ever created. Acceptable for a reference model; a
//!   long-lived host needs its own engine.
//! - The selection always points at attached nodes with in-range offsets.
//! - Token markup is rejected until `TOKEN_ELEMENT_RULE` is registered.

use crate::document::markup::{parse_markup, FragmentNode, MarkupError, TOKEN_ELEMENT_RULE};
use crate::document::{
    Caret, DeleteDirection, DocumentModel, Key, ListenerId, NodeId, NodeKind, Point,
    PointerScope, Rect, Selection, TokenState,
};
use crate::render::RenderedToken;
use log::debug;
use std::collections::HashMap;

const BLOCK_TAGS: &[&str] = &["p", "div", "li", "ul", "ol", "h1", "h2", "h3", "blockquote"];

/// Fixed layout metrics used for bounding boxes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutMetrics {
    pub char_width: f64,
    pub line_height: f64,
    /// Inner margin of the surface.
    pub margin: f64,
    pub surface_width: f64,
    pub token_min_width: f64,
    pub token_padding: f64,
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        Self {
            char_width: 8.0,
            line_height: 20.0,
            margin: 14.0,
            surface_width: 800.0,
            token_min_width: 60.0,
            token_padding: 6.4,
        }
    }
}

#[derive(Debug, Clone)]
enum NodeData {
    Text(String),
    Element { tag: String, children: Vec<NodeId> },
    Token(TokenState),
}

#[derive(Debug, Clone)]
struct Slot {
    parent: Option<NodeId>,
    data: NodeData,
}

/// Arena-backed document tree with a single selection.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    nodes: Vec<Option<Slot>>,
    root: NodeId,
    selection: Option<Selection>,
    element_rules: Vec<String>,
    listeners: Vec<(ListenerId, PointerScope)>,
    next_listener_id: u64,
    surface_offset: Point,
    metrics: LayoutMetrics,
    focused: bool,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// Creates an empty document whose root is a `body` element.
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(Slot {
                parent: None,
                data: NodeData::Element {
                    tag: "body".to_string(),
                    children: Vec::new(),
                },
            })],
            root: NodeId(0),
            selection: None,
            element_rules: Vec::new(),
            listeners: Vec::new(),
            next_listener_id: 0,
            surface_offset: Point::default(),
            metrics: LayoutMetrics::default(),
            focused: false,
        }
    }

    /// Sets the page position of the surface origin (e.g. an embedded frame).
    pub fn with_surface_offset(mut self, offset: Point) -> Self {
        self.surface_offset = offset;
        self
    }

    pub fn with_metrics(mut self, metrics: LayoutMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Appends an element under `parent`.
    ///
    /// Appending under a text or token node yields a detached node.
    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        self.append(
            parent,
            NodeData::Element {
                tag: tag.to_ascii_lowercase(),
                children: Vec::new(),
            },
        )
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.append(parent, NodeData::Text(text.to_string()))
    }

    /// Appends a token node directly, bypassing markup and schema checks.
    pub fn append_token(&mut self, parent: NodeId, bound_id: &str) -> NodeId {
        self.append(parent, NodeData::Token(TokenState::bound_to(bound_id)))
    }

    pub fn set_caret(&mut self, node: NodeId, offset: usize) {
        self.selection = Some(Selection::collapsed(Caret::new(node, offset)));
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = Some(selection);
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Text of a text node, `None` for other kinds.
    pub fn text(&self, node: NodeId) -> Option<&str> {
        match &self.slot(node)?.data {
            NodeData::Text(text) => Some(text),
            NodeData::Element { .. } | NodeData::Token(_) => None,
        }
    }

    /// Concatenated text under `node`; tokens contribute their label.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn blur(&mut self) {
        self.focused = false;
    }

    pub fn has_element_rule(&self, rule: &str) -> bool {
        self.element_rules.iter().any(|registered| registered == rule)
    }

    pub fn pointer_listener_count(&self, scope: PointerScope) -> usize {
        self.listeners
            .iter()
            .filter(|(_, registered)| *registered == scope)
            .count()
    }

    fn slot(&self, node: NodeId) -> Option<&Slot> {
        self.nodes.get(node.0)?.as_ref()
    }

    fn slot_mut(&mut self, node: NodeId) -> Option<&mut Slot> {
        self.nodes.get_mut(node.0)?.as_mut()
    }

    fn children_mut(&mut self, node: NodeId) -> Option<&mut Vec<NodeId>> {
        match &mut self.slot_mut(node)?.data {
            NodeData::Element { children, .. } => Some(children),
            NodeData::Text(_) | NodeData::Token(_) => None,
        }
    }

    fn alloc(&mut self, parent: Option<NodeId>, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Slot { parent, data }));
        id
    }

    fn append(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = self.alloc(None, data);
        if let Some(children) = self.children_mut(parent) {
            children.push(id);
            if let Some(slot) = self.slot_mut(id) {
                slot.parent = Some(parent);
            }
        }
        id
    }

    /// Inserts a new node at `index` under an element; `None` if `parent` is
    /// not an element.
    fn insert_child(&mut self, parent: NodeId, index: usize, data: NodeData) -> Option<NodeId> {
        self.children_mut(parent)?;
        let id = self.alloc(Some(parent), data);
        let children = self.children_mut(parent)?;
        let index = index.min(children.len());
        children.insert(index, id);
        Some(id)
    }

    fn index_in_parent(&self, node: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.slot(node)?.parent?;
        let index = self.children(parent).iter().position(|&child| child == node)?;
        Some((parent, index))
    }

    fn is_descendant_or_self(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if candidate == ancestor {
                return true;
            }
            current = self.slot(candidate).and_then(|slot| slot.parent);
        }
        false
    }

    fn free_subtree(&mut self, node: NodeId) {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if let Some(slot) = self.nodes.get_mut(current.0).and_then(Option::take) {
                if let NodeData::Element { children, .. } = slot.data {
                    stack.extend(children);
                }
            }
        }
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let Some(slot) = self.slot(node) else {
            return;
        };
        match &slot.data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Token(token) => out.push_str(&token.label),
            NodeData::Element { children, .. } => {
                for &child in children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    fn caret_after_removal(&self, caret: Caret, removed: NodeId, parent: NodeId, index: usize) -> Caret {
        if self.is_descendant_or_self(caret.node, removed) {
            return Caret::new(parent, index);
        }
        if caret.node == parent && caret.offset > index {
            return Caret::new(parent, caret.offset - 1);
        }
        caret
    }

    /// Removes one char from a text node. Returns `false` if out of range.
    fn delete_char(&mut self, node: NodeId, char_index: usize) -> bool {
        let Some(NodeData::Text(text)) = self.slot_mut(node).map(|slot| &mut slot.data) else {
            return false;
        };
        match text.char_indices().nth(char_index) {
            Some((byte_index, _)) => {
                text.remove(byte_index);
                true
            }
            None => false,
        }
    }

    fn insert_char(&mut self, node: NodeId, char_index: usize, c: char) -> bool {
        let Some(NodeData::Text(text)) = self.slot_mut(node).map(|slot| &mut slot.data) else {
            return false;
        };
        let byte_index = text
            .char_indices()
            .nth(char_index)
            .map_or(text.len(), |(byte_index, _)| byte_index);
        text.insert(byte_index, c);
        true
    }

    /// Deletes the char of `neighbour` nearest the caret; removes tokens whole.
    fn delete_from_neighbour(&mut self, neighbour: NodeId, direction: DeleteDirection) {
        match self.kind(neighbour) {
            Some(NodeKind::Text) => {
                let len = self.text_len(neighbour).unwrap_or(0);
                match direction {
                    DeleteDirection::Backward if len > 0 => {
                        self.delete_char(neighbour, len - 1);
                        self.set_caret(neighbour, len - 1);
                    }
                    DeleteDirection::Forward if len > 0 => {
                        self.delete_char(neighbour, 0);
                    }
                    _ => {}
                }
            }
            Some(NodeKind::Token) => {
                self.remove_node(neighbour);
            }
            Some(NodeKind::Element) | None => {}
        }
    }

    fn default_delete(&mut self, direction: DeleteDirection) {
        let Some(selection) = self.selection else {
            return;
        };
        let Some(caret) = selection.caret() else {
            self.delete_text_range(selection);
            return;
        };

        match self.kind(caret.node) {
            Some(NodeKind::Text) => {
                let len = self.text_len(caret.node).unwrap_or(0);
                match direction {
                    DeleteDirection::Backward if caret.offset > 0 => {
                        self.delete_char(caret.node, caret.offset - 1);
                        self.set_caret(caret.node, caret.offset - 1);
                    }
                    DeleteDirection::Forward if caret.offset < len => {
                        self.delete_char(caret.node, caret.offset);
                    }
                    DeleteDirection::Backward => {
                        if let Some(prev) = self.previous_sibling(caret.node) {
                            self.delete_from_neighbour(prev, direction);
                        }
                    }
                    DeleteDirection::Forward => {
                        if let Some(next) = self.next_sibling(caret.node) {
                            self.delete_from_neighbour(next, direction);
                        }
                    }
                }
            }
            Some(NodeKind::Element) => {
                let children = self.children(caret.node);
                let neighbour = match direction {
                    DeleteDirection::Backward => caret
                        .offset
                        .checked_sub(1)
                        .and_then(|index| children.get(index).copied()),
                    DeleteDirection::Forward => children.get(caret.offset).copied(),
                };
                if let Some(neighbour) = neighbour {
                    self.delete_from_neighbour(neighbour, direction);
                }
            }
            Some(NodeKind::Token) | None => {}
        }
    }

    /// Range deletion limited to a single text node; wider ranges are ignored.
    fn delete_text_range(&mut self, selection: Selection) {
        if selection.anchor.node != selection.focus.node {
            debug!("event=default_delete module=memory_document status=skipped_cross_node_range");
            return;
        }
        let node = selection.anchor.node;
        let start = selection.anchor.offset.min(selection.focus.offset);
        let end = selection.anchor.offset.max(selection.focus.offset);
        let Some(NodeData::Text(text)) = self.slot_mut(node).map(|slot| &mut slot.data) else {
            return;
        };
        *text = text
            .chars()
            .enumerate()
            .filter(|(index, _)| *index < start || *index >= end)
            .map(|(_, c)| c)
            .collect();
        self.set_caret(node, start);
    }

    fn default_char(&mut self, c: char) {
        let Some(caret) = self.selection.and_then(|selection| selection.caret()) else {
            return;
        };
        match self.kind(caret.node) {
            Some(NodeKind::Text) => {
                if self.insert_char(caret.node, caret.offset, c) {
                    self.set_caret(caret.node, caret.offset + 1);
                }
            }
            Some(NodeKind::Element) => {
                if let Some(text) =
                    self.insert_child(caret.node, caret.offset, NodeData::Text(c.to_string()))
                {
                    self.set_caret(text, 1);
                }
            }
            Some(NodeKind::Token) | None => {}
        }
    }

    /// Resolves the caret to an element and child index for insertion,
    /// splitting a text node when the caret sits inside it.
    fn insertion_point(&mut self, caret: Caret) -> Option<(NodeId, usize)> {
        match self.kind(caret.node)? {
            NodeKind::Element => Some((caret.node, caret.offset.min(self.children(caret.node).len()))),
            NodeKind::Token => {
                let (parent, index) = self.index_in_parent(caret.node)?;
                Some((parent, index + 1))
            }
            NodeKind::Text => {
                let (parent, index) = self.index_in_parent(caret.node)?;
                let len = self.text_len(caret.node).unwrap_or(0);
                if caret.offset == 0 {
                    return Some((parent, index));
                }
                if caret.offset >= len {
                    return Some((parent, index + 1));
                }
                let tail = match &mut self.slot_mut(caret.node)?.data {
                    NodeData::Text(text) => {
                        let byte_index = text
                            .char_indices()
                            .nth(caret.offset)
                            .map_or(text.len(), |(byte_index, _)| byte_index);
                        text.split_off(byte_index)
                    }
                    NodeData::Element { .. } | NodeData::Token(_) => return None,
                };
                self.insert_child(parent, index + 1, NodeData::Text(tail))?;
                Some((parent, index + 1))
            }
        }
    }

    fn layout(&self) -> HashMap<NodeId, Rect> {
        let mut boxes = HashMap::new();
        let mut pen = Point::new(self.metrics.margin, self.metrics.margin);
        self.layout_node(self.root, &mut pen, &mut boxes);
        boxes
    }

    fn new_line(&self, pen: &mut Point) {
        pen.x = self.metrics.margin;
        pen.y += self.metrics.line_height;
    }

    fn layout_node(&self, node: NodeId, pen: &mut Point, boxes: &mut HashMap<NodeId, Rect>) {
        let Some(slot) = self.slot(node) else {
            return;
        };
        let metrics = self.metrics;
        match &slot.data {
            NodeData::Text(text) => {
                let width = text.chars().count() as f64 * metrics.char_width;
                boxes.insert(node, Rect::new(pen.x, pen.y, width, metrics.line_height));
                pen.x += width;
            }
            NodeData::Token(token) => {
                let label_width = token.label.chars().count() as f64 * metrics.char_width;
                let width = (label_width + 2.0 * metrics.token_padding).max(metrics.token_min_width);
                boxes.insert(node, Rect::new(pen.x, pen.y, width, metrics.line_height));
                pen.x += width;
            }
            NodeData::Element { tag, children } => {
                let is_block = node != self.root && BLOCK_TAGS.contains(&tag.as_str());
                if is_block && pen.x > metrics.margin {
                    self.new_line(pen);
                }
                let start = *pen;
                for &child in children {
                    self.layout_node(child, pen, boxes);
                }
                let rect = if is_block || node == self.root {
                    Rect::new(
                        metrics.margin,
                        start.y,
                        metrics.surface_width - 2.0 * metrics.margin,
                        pen.y + metrics.line_height - start.y,
                    )
                } else {
                    Rect::new(start.x, start.y, pen.x - start.x, metrics.line_height)
                };
                boxes.insert(node, rect);
                if is_block {
                    self.new_line(pen);
                }
            }
        }
    }
}

impl DocumentModel for MemoryDocument {
    fn root(&self) -> NodeId {
        self.root
    }

    fn kind(&self, node: NodeId) -> Option<NodeKind> {
        Some(match self.slot(node)?.data {
            NodeData::Text(_) => NodeKind::Text,
            NodeData::Element { .. } => NodeKind::Element,
            NodeData::Token(_) => NodeKind::Token,
        })
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.slot(node)?.parent
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        match self.slot(node).map(|slot| &slot.data) {
            Some(NodeData::Element { children, .. }) => children.clone(),
            _ => Vec::new(),
        }
    }

    fn text_len(&self, node: NodeId) -> Option<usize> {
        self.text(node).map(|text| text.chars().count())
    }

    fn token(&self, node: NodeId) -> Option<TokenState> {
        match &self.slot(node)?.data {
            NodeData::Token(token) => Some(token.clone()),
            NodeData::Text(_) | NodeData::Element { .. } => None,
        }
    }

    fn set_token_binding(&mut self, node: NodeId, bound_id: &str) -> bool {
        match self.slot_mut(node).map(|slot| &mut slot.data) {
            Some(NodeData::Token(token)) => {
                token.bound_id = bound_id.to_string();
                true
            }
            _ => false,
        }
    }

    fn set_token_display(&mut self, node: NodeId, rendered: &RenderedToken) -> bool {
        match self.slot_mut(node).map(|slot| &mut slot.data) {
            Some(NodeData::Token(token)) => {
                token.label = rendered.label.clone();
                token.ok = rendered.ok;
                true
            }
            _ => false,
        }
    }

    fn remove_node(&mut self, node: NodeId) -> bool {
        let Some((parent, index)) = self.index_in_parent(node) else {
            return false;
        };
        if let Some(children) = self.children_mut(parent) {
            children.remove(index);
        }
        if let Some(selection) = self.selection {
            let anchor = self.caret_after_removal(selection.anchor, node, parent, index);
            let focus = self.caret_after_removal(selection.focus, node, parent, index);
            self.selection = Some(Selection { anchor, focus });
        }
        self.free_subtree(node);
        true
    }

    fn selection(&self) -> Option<Selection> {
        self.selection
    }

    fn insert_markup(&mut self, markup: &str) -> Result<Vec<NodeId>, MarkupError> {
        let fragments = parse_markup(markup)?;
        if fragments.iter().any(FragmentNode::is_token) && !self.has_element_rule(TOKEN_ELEMENT_RULE)
        {
            return Err(MarkupError::UnregisteredElement(TOKEN_ELEMENT_RULE.to_string()));
        }
        let caret = self
            .selection
            .map(|selection| selection.focus)
            .ok_or(MarkupError::NoCaret)?;
        let (parent, mut index) = self.insertion_point(caret).ok_or(MarkupError::NoCaret)?;

        let mut inserted = Vec::with_capacity(fragments.len());
        for fragment in fragments {
            let data = match fragment {
                FragmentNode::Text(text) => NodeData::Text(text),
                FragmentNode::Token { bound_id, label } => NodeData::Token(TokenState {
                    bound_id,
                    label,
                    ok: false,
                }),
            };
            let id = self.insert_child(parent, index, data).ok_or(MarkupError::NoCaret)?;
            inserted.push(id);
            index += 1;
        }
        self.set_caret(parent, index);
        Ok(inserted)
    }

    fn perform_default_key(&mut self, key: Key) {
        match key {
            Key::Backspace | Key::Delete => {
                if let Some(direction) = key.delete_direction() {
                    self.default_delete(direction);
                }
            }
            Key::Char(c) => self.default_char(c),
            Key::Enter | Key::Other => {}
        }
    }

    fn register_element_rule(&mut self, rule: &str) {
        if !self.has_element_rule(rule) {
            self.element_rules.push(rule.to_string());
        }
    }

    fn bounding_box(&self, node: NodeId) -> Option<Rect> {
        self.layout().get(&node).copied()
    }

    fn surface_offset(&self) -> Point {
        self.surface_offset
    }

    fn focus(&mut self) {
        self.focused = true;
    }

    fn add_pointer_listener(&mut self, scope: PointerScope) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, scope));
        id
    }

    fn remove_pointer_listener(&mut self, listener: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(id, _)| *id != listener);
        before != self.listeners.len()
    }
}
