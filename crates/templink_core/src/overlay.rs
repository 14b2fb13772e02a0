//! Rebind overlay: the floating list used to rebind a token.
//!
//! # Responsibility
//! - Own the single overlay instance and its outside-interaction listeners.
//! - Anchor the overlay right below the owning token in page coordinates.
//! - Commit a chosen template id to the owning token and relabel it.
//!
//! # Invariants
//! - At most one overlay is open; opening always closes the previous one
//!   first, listeners included.
//! - `close()` is idempotent.
//! - Outside interaction closes the overlay without touching any binding.

use crate::config::TokenConfig;
use crate::document::{DocumentModel, ListenerId, NodeId, Point, PointerScope, Rect};
use crate::model::template::{find_record, TemplateId};
use crate::render::render_with_label;
use crate::store::template_store::TemplateStore;
use log::{debug, info};

/// Height of one list entry in page units.
pub const ENTRY_HEIGHT: f64 = 28.0;

/// One selectable template in the overlay list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayEntry {
    pub id: TemplateId,
    pub text: String,
    /// Marks the entry matching the owner's current binding.
    pub selected: bool,
}

/// Where a pointer interaction landed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerTarget {
    /// Inside the overlay; `entry` is the list index hit, if any.
    Overlay { entry: Option<usize> },
    /// A rendered node inside the document surface.
    Document(NodeId),
    /// Anywhere on the page outside the document surface.
    Page(Point),
}

/// State of the open overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenOverlay {
    /// Token the overlay was opened for.
    pub owner: NodeId,
    pub entries: Vec<OverlayEntry>,
    /// Page-coordinate box of the overlay.
    pub bounds: Rect,
    /// Owner token's width; the overlay is never narrower.
    pub min_width: f64,
    listeners: Vec<(ListenerId, PointerScope)>,
}

impl OpenOverlay {
    pub fn position(&self) -> Point {
        Point::new(self.bounds.x, self.bounds.y)
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.entries.iter().position(|entry| entry.selected)
    }

    fn listens_on(&self, scope: PointerScope) -> bool {
        self.listeners.iter().any(|(_, registered)| *registered == scope)
    }
}

/// Exclusive rebinding control.
#[derive(Debug, Clone)]
pub struct RebindOverlay {
    current: Option<OpenOverlay>,
    error_label: String,
}

impl RebindOverlay {
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            current: None,
            error_label: config.error_label.clone(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&OpenOverlay> {
        self.current.as_ref()
    }

    pub fn owner(&self) -> Option<NodeId> {
        self.current.as_ref().map(|overlay| overlay.owner)
    }

    /// Opens the overlay for `token`, closing any open instance first.
    ///
    /// Returns `false` (and leaves nothing open) when `token` is not a token.
    pub fn open<D>(&mut self, doc: &mut D, store: &TemplateStore, token: NodeId) -> bool
    where
        D: DocumentModel + ?Sized,
    {
        self.close(doc);

        let Some(state) = doc.token(token) else {
            debug!(
                "event=overlay_open module=overlay status=not_a_token node={}",
                token.0
            );
            return false;
        };

        let snapshot = store.get_all();
        let bound = find_record(&snapshot, &state.bound_id).map(|record| record.id);
        let entries: Vec<OverlayEntry> = snapshot
            .into_iter()
            .map(|record| OverlayEntry {
                selected: Some(record.id) == bound,
                id: record.id,
                text: record.text,
            })
            .collect();

        let anchor = doc.bounding_box(token).unwrap_or_default();
        let surface = doc.surface_offset();
        let bounds = Rect::new(
            surface.x + anchor.left(),
            surface.y + anchor.bottom(),
            anchor.width,
            entries.len() as f64 * ENTRY_HEIGHT,
        );

        let listeners = [PointerScope::Page, PointerScope::Surface]
            .into_iter()
            .map(|scope| (doc.add_pointer_listener(scope), scope))
            .collect();

        info!(
            "event=overlay_open module=overlay status=ok node={} entries={} x={} y={}",
            token.0,
            entries.len(),
            bounds.x,
            bounds.y
        );
        self.current = Some(OpenOverlay {
            owner: token,
            entries,
            bounds,
            min_width: anchor.width,
            listeners,
        });
        true
    }

    /// Removes the overlay and detaches its listeners. No-op when closed.
    pub fn close<D>(&mut self, doc: &mut D)
    where
        D: DocumentModel + ?Sized,
    {
        let Some(overlay) = self.current.take() else {
            return;
        };
        for (listener, _) in &overlay.listeners {
            doc.remove_pointer_listener(*listener);
        }
        info!(
            "event=overlay_close module=overlay status=ok node={}",
            overlay.owner.0
        );
    }

    /// Binds `token` to `chosen`, relabels it, closes and refocuses the document.
    pub fn select<D>(&mut self, doc: &mut D, store: &TemplateStore, token: NodeId, chosen: TemplateId)
    where
        D: DocumentModel + ?Sized,
    {
        let bound_id = chosen.to_string();
        if doc.set_token_binding(token, &bound_id) {
            let rendered = render_with_label(&bound_id, &store.get_all(), &self.error_label);
            doc.set_token_display(token, &rendered);
            info!(
                "event=token_rebound module=overlay status=ok node={} bound_id={} resolved={}",
                token.0, bound_id, rendered.ok
            );
        } else {
            debug!(
                "event=token_rebound module=overlay status=missing_token node={}",
                token.0
            );
        }
        self.close(doc);
        doc.focus();
    }

    /// Selects the entry at `index` for the current owner.
    ///
    /// Returns `false` when nothing is open or the index is out of range.
    pub fn select_entry<D>(&mut self, doc: &mut D, store: &TemplateStore, index: usize) -> bool
    where
        D: DocumentModel + ?Sized,
    {
        let Some((owner, chosen)) = self.current.as_ref().and_then(|overlay| {
            overlay
                .entries
                .get(index)
                .map(|entry| (overlay.owner, entry.id))
        }) else {
            return false;
        };
        self.select(doc, store, owner, chosen);
        true
    }

    /// Outside-interaction handler. Returns `true` if the overlay was closed.
    pub fn handle_pointer<D>(&mut self, doc: &mut D, target: PointerTarget) -> bool
    where
        D: DocumentModel + ?Sized,
    {
        let Some(overlay) = self.current.as_ref() else {
            return false;
        };
        let outside = match target {
            PointerTarget::Overlay { .. } => false,
            PointerTarget::Document(_) => overlay.listens_on(PointerScope::Surface),
            PointerTarget::Page(point) => {
                overlay.listens_on(PointerScope::Page) && !overlay.bounds.contains(point)
            }
        };
        if outside {
            self.close(doc);
        }
        outside
    }
}
