//! Token label rendering.
//!
//! # Responsibility
//! - Derive a token's visible label and status from its binding and a store
//!   snapshot.
//!
//! # Invariants
//! - Rendering is a pure function; it reads nothing but its arguments.
//! - A binding that does not resolve always yields the error label.

use crate::config::DEFAULT_ERROR_LABEL;
use crate::model::template::{find_record, TemplateRecord};
use serde::Serialize;

/// Display state of one token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedToken {
    pub label: String,
    /// `false` when the binding is dangling.
    pub ok: bool,
}

impl RenderedToken {
    pub fn is_dangling(&self) -> bool {
        !self.ok
    }
}

/// Renders `bound_id` against `snapshot` with the default error label.
pub fn render(bound_id: &str, snapshot: &[TemplateRecord]) -> RenderedToken {
    render_with_label(bound_id, snapshot, DEFAULT_ERROR_LABEL)
}

/// Renders `bound_id` against `snapshot`, using `error_label` when dangling.
pub fn render_with_label(
    bound_id: &str,
    snapshot: &[TemplateRecord],
    error_label: &str,
) -> RenderedToken {
    match find_record(snapshot, bound_id) {
        Some(record) => RenderedToken {
            label: record.text.clone(),
            ok: true,
        },
        None => RenderedToken {
            label: error_label.to_string(),
            ok: false,
        },
    }
}
