//! Sync controller: keeps sidebar and token labels in step with the store.
//!
//! # Responsibility
//! - Run one full pass at attach time and one per store notification.
//! - Relabel every token currently in the document and repaint the sidebar.
//! - Defer a pass that finds its targets borrowed until `flush`.
//!
//! # Invariants
//! - A pass always reflects the snapshot it was given; nothing is cached
//!   between passes.
//! - Dangling tokens flip to the error label, and back to resolved if their
//!   id reappears.

use crate::document::DocumentModel;
use crate::model::template::TemplateRecord;
use crate::render::render_with_label;
use crate::sidebar::TemplateSidebar;
use crate::store::template_store::{Subscription, TemplateStore};
use log::{debug, warn};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Counts from one relabeling pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub resolved: usize,
    pub dangling: usize,
}

impl SyncReport {
    pub fn total(&self) -> usize {
        self.resolved + self.dangling
    }
}

/// Relabels every token in `doc` against `snapshot`.
pub fn sync_tokens<D>(doc: &mut D, snapshot: &[TemplateRecord], error_label: &str) -> SyncReport
where
    D: DocumentModel + ?Sized,
{
    let mut report = SyncReport::default();
    for token in doc.tokens() {
        let Some(state) = doc.token(token) else {
            continue;
        };
        let rendered = render_with_label(&state.bound_id, snapshot, error_label);
        if rendered.ok {
            report.resolved += 1;
        } else {
            report.dangling += 1;
        }
        doc.set_token_display(token, &rendered);
    }
    report
}

type SyncPass = dyn Fn(&[TemplateRecord]) -> bool;

/// Store subscriber driving sidebar and token re-rendering.
///
/// A pass that finds the document or sidebar borrowed is recorded as pending
/// and replayed by `flush` against a fresh snapshot.
pub struct SyncController {
    subscription: Subscription,
    pass: Rc<SyncPass>,
    pending: Rc<Cell<bool>>,
}

impl SyncController {
    /// Runs the startup pass and subscribes for every later change.
    pub fn attach<D>(
        store: &TemplateStore,
        document: Rc<RefCell<D>>,
        sidebar: Rc<RefCell<TemplateSidebar>>,
        error_label: impl Into<String>,
    ) -> Self
    where
        D: DocumentModel + 'static,
    {
        let error_label = error_label.into();
        let pass: Rc<SyncPass> = Rc::new(move |snapshot: &[TemplateRecord]| {
            run_pass(&document, &sidebar, snapshot, &error_label)
        });
        let pending = Rc::new(Cell::new(!pass(&store.get_all())));

        let listener_pass = Rc::clone(&pass);
        let listener_pending = Rc::clone(&pending);
        let subscription = store.subscribe(move |snapshot| {
            listener_pending.set(!listener_pass(snapshot));
        });
        Self {
            subscription,
            pass,
            pending,
        }
    }

    /// Whether a skipped pass is waiting to be replayed.
    pub fn is_pending(&self) -> bool {
        self.pending.get()
    }

    /// Replays a skipped pass against the current store contents.
    ///
    /// Returns `true` when nothing is left pending.
    pub fn flush(&self, store: &TemplateStore) -> bool {
        if self.pending.get() {
            let complete = (self.pass)(&store.get_all());
            self.pending.set(!complete);
            if complete {
                debug!("event=sync_replayed module=sync status=ok");
            }
        }
        !self.pending.get()
    }

    /// Stops reacting to store changes. Idempotent.
    pub fn detach(&self) {
        self.subscription.unsubscribe();
        self.pending.set(false);
    }
}

/// Returns `false` when the sidebar or the document was busy and skipped.
fn run_pass<D>(
    document: &RefCell<D>,
    sidebar: &RefCell<TemplateSidebar>,
    snapshot: &[TemplateRecord],
    error_label: &str,
) -> bool
where
    D: DocumentModel,
{
    let sidebar_done = match sidebar.try_borrow_mut() {
        Ok(mut sidebar) => {
            sidebar.render(snapshot);
            true
        }
        Err(_) => {
            warn!("event=sidebar_sync module=sync status=deferred_busy");
            false
        }
    };

    let tokens_done = match document.try_borrow_mut() {
        Ok(mut doc) => {
            let report = sync_tokens(&mut *doc, snapshot, error_label);
            debug!(
                "event=tokens_synced module=sync status=ok templates={} resolved={} dangling={}",
                snapshot.len(),
                report.resolved,
                report.dangling
            );
            true
        }
        Err(_) => {
            warn!("event=tokens_synced module=sync status=deferred_busy");
            false
        }
    };

    sidebar_done && tokens_done
}

#[cfg(test)]
mod tests {
    use super::{sync_tokens, SyncController};
    use crate::document::memory::MemoryDocument;
    use crate::document::DocumentModel;
    use crate::model::template::TemplateRecord;
    use crate::sidebar::TemplateSidebar;
    use crate::store::template_store::TemplateStore;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn sync_counts_resolved_and_dangling() {
        let record = TemplateRecord::new("hello");
        let mut doc = MemoryDocument::new();
        let p = doc.append_element(doc.root(), "p");
        let good = doc.append_token(p, &record.id.to_string());
        let bad = doc.append_token(p, "");

        let report = sync_tokens(&mut doc, std::slice::from_ref(&record), "ERROR");
        assert_eq!(report.resolved, 1);
        assert_eq!(report.dangling, 1);
        assert_eq!(report.total(), 2);

        let good_state = doc.token(good).expect("good token");
        assert_eq!((good_state.label.as_str(), good_state.ok), ("hello", true));
        let bad_state = doc.token(bad).expect("bad token");
        assert_eq!((bad_state.label.as_str(), bad_state.ok), ("ERROR", false));
    }

    #[test]
    fn busy_document_defers_pass_until_flush() {
        let store = TemplateStore::from_texts("template", ["first"]);
        let id = store.get_all()[0].id;
        let mut doc = MemoryDocument::new();
        let p = doc.append_element(doc.root(), "p");
        let token = doc.append_token(p, &id.to_string());
        let document = Rc::new(RefCell::new(doc));
        let sidebar = Rc::new(RefCell::new(TemplateSidebar::new()));
        let sync = SyncController::attach(
            &store,
            Rc::clone(&document),
            Rc::clone(&sidebar),
            "ERROR",
        );
        assert!(!sync.is_pending());

        {
            let _held = document.borrow();
            store.remove(id);
        }
        assert!(sync.is_pending());
        assert!(document.borrow().token(token).map(|state| state.ok).unwrap_or(false));

        assert!(sync.flush(&store));
        let state = document.borrow().token(token).expect("token state");
        assert_eq!((state.label.as_str(), state.ok), ("ERROR", false));
        assert!(sidebar.borrow().items().is_empty());
    }
}
