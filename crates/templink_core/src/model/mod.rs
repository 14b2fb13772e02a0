//! Template domain model.
//!
//! # Responsibility
//! - Define the record type shared by the store, renderer and overlay.
//!
//! # Invariants
//! - Every template is identified by a stable `TemplateId`.
//! - Identity never changes for the lifetime of a record.

pub mod template;
