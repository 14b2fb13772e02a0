//! Template storage and change notification.
//!
//! # Responsibility
//! - Own template records and expose copy-out reads.
//! - Provide an ordered subscriber registry for change fan-out.

pub mod template_store;
