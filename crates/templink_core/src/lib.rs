//! Core logic for live template tokens embedded in rich-text documents.
//! This crate is the single source of truth for token/template invariants.

pub mod config;
pub mod document;
pub mod guard;
pub mod logging;
pub mod model;
pub mod overlay;
pub mod render;
pub mod sidebar;
pub mod store;
pub mod sync;
pub mod workspace;

pub use config::{ConfigError, InsertPolicy, TokenConfig};
pub use document::markup::{token_markup, MarkupError, TOKEN_ELEMENT_RULE};
pub use document::memory::MemoryDocument;
pub use document::{
    Caret, DeleteDirection, DocumentModel, Key, KeyHandling, NodeId, NodeKind, Point,
    PointerScope, Rect, Selection, TokenState,
};
pub use guard::{classify, handle_key_down, GuardDecision};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::template::{TemplateId, TemplateRecord};
pub use overlay::{OverlayEntry, PointerTarget, RebindOverlay};
pub use render::{render, render_with_label, RenderedToken};
pub use sidebar::{SidebarItem, TemplateSidebar};
pub use store::template_store::{Subscription, TemplateStore};
pub use sync::{sync_tokens, SyncController, SyncReport};
pub use workspace::TokenWorkspace;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
