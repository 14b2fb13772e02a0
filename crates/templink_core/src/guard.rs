//! Boundary guard: tokens are deleted as one indivisible unit.
//!
//! # Responsibility
//! - Classify a collapsed caret against neighbouring tokens on delete-class
//!   key presses.
//! - Suppress the default action and remove the whole token when the key
//!   would otherwise cross into it.
//!
//! # Invariants
//! - Only the collapsed-caret case is governed; range deletion stays default.
//! - Interception removes exactly one token node and nothing else.
//! - A caret strictly inside a text run never triggers interception.

use crate::document::{Caret, DeleteDirection, DocumentModel, Key, KeyHandling, NodeId, NodeKind};
use log::info;

/// What the guard decided for one key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Leave the key to the engine's default editing.
    Default,
    /// Suppress the default and remove this token.
    RemoveToken(NodeId),
}

/// Finds the token a delete in `direction` at `caret` would cross into.
pub fn adjacent_token<D>(doc: &D, caret: Caret, direction: DeleteDirection) -> Option<NodeId>
where
    D: DocumentModel + ?Sized,
{
    let candidate = match doc.kind(caret.node)? {
        NodeKind::Text => {
            let len = doc.text_len(caret.node).unwrap_or(0);
            match direction {
                DeleteDirection::Backward if caret.offset == 0 => doc.previous_sibling(caret.node),
                DeleteDirection::Forward if caret.offset == len => doc.next_sibling(caret.node),
                DeleteDirection::Backward | DeleteDirection::Forward => None,
            }
        }
        NodeKind::Element => {
            let children = doc.children(caret.node);
            match direction {
                DeleteDirection::Backward => caret
                    .offset
                    .checked_sub(1)
                    .and_then(|index| children.get(index).copied()),
                DeleteDirection::Forward => children.get(caret.offset).copied(),
            }
        }
        NodeKind::Token => None,
    }?;

    doc.is_token(candidate).then_some(candidate)
}

/// Classifies a key press against the document's current selection.
pub fn classify<D>(doc: &D, key: Key) -> GuardDecision
where
    D: DocumentModel + ?Sized,
{
    let Some(direction) = key.delete_direction() else {
        return GuardDecision::Default;
    };
    let Some(caret) = doc.selection().and_then(|selection| selection.caret()) else {
        return GuardDecision::Default;
    };
    match adjacent_token(doc, caret, direction) {
        Some(token) => GuardDecision::RemoveToken(token),
        None => GuardDecision::Default,
    }
}

/// Key-down hook: removes an adjacent token atomically or defers to default.
///
/// Returns `KeyHandling::Handled` when the default action must not run.
pub fn handle_key_down<D>(doc: &mut D, key: Key) -> KeyHandling
where
    D: DocumentModel + ?Sized,
{
    match classify(doc, key) {
        GuardDecision::RemoveToken(token) => {
            let bound_id = doc.token(token).map(|state| state.bound_id).unwrap_or_default();
            let removed = doc.remove_node(token);
            info!(
                "event=token_removed module=guard status={} key={:?} node={} bound_id={}",
                if removed { "ok" } else { "missing" },
                key,
                token.0,
                bound_id
            );
            KeyHandling::Handled
        }
        GuardDecision::Default => KeyHandling::Default,
    }
}

#[cfg(test)]
mod tests {
    use super::{adjacent_token, classify, GuardDecision};
    use crate::document::memory::MemoryDocument;
    use crate::document::{Caret, DeleteDirection, DocumentModel, Key, Selection};

    #[test]
    fn caret_inside_token_is_never_intercepted() {
        let mut doc = MemoryDocument::new();
        let p = doc.append_element(doc.root(), "p");
        let token = doc.append_token(p, "");
        assert_eq!(
            adjacent_token(&doc, Caret::new(token, 0), DeleteDirection::Backward),
            None
        );
    }

    #[test]
    fn element_caret_at_start_has_nothing_behind() {
        let mut doc = MemoryDocument::new();
        let p = doc.append_element(doc.root(), "p");
        doc.append_token(p, "");
        assert_eq!(
            adjacent_token(&doc, Caret::new(p, 0), DeleteDirection::Backward),
            None
        );
    }

    #[test]
    fn element_caret_past_end_has_nothing_ahead() {
        let mut doc = MemoryDocument::new();
        let p = doc.append_element(doc.root(), "p");
        doc.append_token(p, "");
        assert_eq!(
            adjacent_token(&doc, Caret::new(p, 1), DeleteDirection::Forward),
            None
        );
    }

    #[test]
    fn non_delete_keys_are_default() {
        let mut doc = MemoryDocument::new();
        let p = doc.append_element(doc.root(), "p");
        doc.append_token(p, "");
        doc.set_caret(p, 1);
        assert_eq!(classify(&doc, Key::Char('x')), GuardDecision::Default);
        assert_eq!(classify(&doc, Key::Enter), GuardDecision::Default);
    }

    #[test]
    fn range_selection_is_default() {
        let mut doc = MemoryDocument::new();
        let p = doc.append_element(doc.root(), "p");
        let text = doc.append_text(p, "ab");
        doc.append_token(p, "");
        doc.set_selection(Selection {
            anchor: Caret::new(text, 0),
            focus: Caret::new(p, 2),
        });
        assert_eq!(classify(&doc, Key::Backspace), GuardDecision::Default);
    }

    #[test]
    fn no_selection_is_default() {
        let doc = MemoryDocument::new();
        assert_eq!(classify(&doc, Key::Delete), GuardDecision::Default);
    }
}
