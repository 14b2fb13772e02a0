//! Template record model.
//!
//! # Responsibility
//! - Define the canonical record a token can reference.
//! - Resolve token bindings (external string attributes) to record ids.
//!
//! # Invariants
//! - `id` is generated once and never reused for another record.
//! - `id` is immutable; only `text` is ever replaced.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a template record.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type TemplateId = Uuid;

/// One named, editable template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRecord {
    /// Stable identity referenced by tokens through `data-template-id`.
    pub id: TemplateId,
    /// Current display text. Never empty after a store write.
    pub text: String,
}

impl TemplateRecord {
    /// Creates a record with a freshly generated id.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
        }
    }

    /// Creates a record with a caller-provided id.
    ///
    /// Used by tests and hosts that rebuild snapshots from external state.
    pub fn with_id(id: TemplateId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }
}

/// Parses the binding attribute carried by a token.
///
/// Returns `None` for the empty (deliberately unbound) binding and for values
/// that are not a well-formed id; both render as dangling.
pub fn parse_binding(bound_id: &str) -> Option<TemplateId> {
    let trimmed = bound_id.trim();
    if trimmed.is_empty() {
        return None;
    }
    Uuid::parse_str(trimmed).ok()
}

/// Finds a record by binding attribute in an ordered snapshot.
pub fn find_record<'a>(snapshot: &'a [TemplateRecord], bound_id: &str) -> Option<&'a TemplateRecord> {
    let id = parse_binding(bound_id)?;
    snapshot.iter().find(|record| record.id == id)
}
