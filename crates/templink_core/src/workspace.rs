//! Composition root wiring store, document, sidebar, overlay and sync.
//!
//! # Responsibility
//! - Construct one store and share it with every component explicitly.
//! - Expose the document event hooks (init, click, key-down) and the sidebar
//!   actions as plain methods.
//!
//! # Invariants
//! - The sync controller is subscribed before any caller can mutate the store,
//!   so token labels never lag a mutation.
//! - No `RefCell` borrow is held across a store mutation.
//! - A sync pass deferred by a busy document is replayed before the workspace
//!   next hands out or edits the document.

use crate::config::{InsertPolicy, TokenConfig};
use crate::document::markup::{token_markup, TOKEN_ELEMENT_RULE};
use crate::document::{DocumentModel, Key, KeyHandling, MarkupError, NodeId, TokenState};
use crate::guard::handle_key_down;
use crate::model::template::TemplateId;
use crate::overlay::{PointerTarget, RebindOverlay};
use crate::render::render_with_label;
use crate::sidebar::TemplateSidebar;
use crate::store::template_store::TemplateStore;
use crate::sync::SyncController;
use log::{info, warn};
use std::cell::{Ref, RefCell};
use std::rc::Rc;

/// Editor-side token plugin bound to one document.
pub struct TokenWorkspace<D: DocumentModel + 'static> {
    config: TokenConfig,
    store: Rc<TemplateStore>,
    document: Rc<RefCell<D>>,
    sidebar: Rc<RefCell<TemplateSidebar>>,
    overlay: RebindOverlay,
    sync: SyncController,
}

impl<D: DocumentModel + 'static> TokenWorkspace<D> {
    /// Creates a workspace with a store seeded from `config`.
    pub fn new(config: TokenConfig, document: D) -> Self {
        let store = Rc::new(TemplateStore::new(&config));
        Self::with_store(config, store, document)
    }

    /// Creates a workspace over an existing store.
    ///
    /// Registers the token element rule on the document and runs the startup
    /// sync pass.
    pub fn with_store(config: TokenConfig, store: Rc<TemplateStore>, mut document: D) -> Self {
        document.register_element_rule(TOKEN_ELEMENT_RULE);
        let document = Rc::new(RefCell::new(document));
        let sidebar = Rc::new(RefCell::new(TemplateSidebar::new()));
        let sync = SyncController::attach(
            &store,
            Rc::clone(&document),
            Rc::clone(&sidebar),
            config.error_label.clone(),
        );
        let overlay = RebindOverlay::new(&config);
        info!(
            "event=workspace_init module=workspace status=ok templates={} policy={:?}",
            store.len(),
            config.insert_policy
        );

        Self {
            config,
            store,
            document,
            sidebar,
            overlay,
            sync,
        }
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    pub fn store(&self) -> &Rc<TemplateStore> {
        &self.store
    }

    pub fn document(&self) -> Ref<'_, D> {
        self.settle();
        self.document.borrow()
    }

    /// Runs a host-driven edit (caret moves, typing) and re-syncs afterwards.
    ///
    /// Store mutations made inside `edit` are reflected in token labels by
    /// the time this returns.
    pub fn edit_document<R>(&self, edit: impl FnOnce(&mut D) -> R) -> R {
        let result = edit(&mut *self.document.borrow_mut());
        self.settle();
        result
    }

    pub fn sidebar(&self) -> Ref<'_, TemplateSidebar> {
        self.settle();
        self.sidebar.borrow()
    }

    /// Whether a store change is still waiting to reach the document.
    pub fn is_sync_pending(&self) -> bool {
        self.sync.is_pending()
    }

    pub fn overlay(&self) -> &RebindOverlay {
        &self.overlay
    }

    /// Token state of every token in document order.
    pub fn tokens(&self) -> Vec<(NodeId, TokenState)> {
        self.settle();
        let doc = self.document.borrow();
        doc.tokens()
            .into_iter()
            .filter_map(|node| doc.token(node).map(|state| (node, state)))
            .collect()
    }

    /// Inserts a new token at the caret and renders it immediately.
    ///
    /// # Errors
    /// - Returns `MarkupError::NoCaret` when the document has no caret.
    pub fn insert_token(&mut self) -> Result<NodeId, MarkupError> {
        self.settle();
        let snapshot = self.store.get_all();
        let bound_id = match self.config.insert_policy {
            InsertPolicy::Unbound => String::new(),
            InsertPolicy::BindFirst => snapshot
                .first()
                .map(|record| record.id.to_string())
                .unwrap_or_default(),
        };
        let rendered = render_with_label(&bound_id, &snapshot, &self.config.error_label);
        let markup = token_markup(&bound_id, &rendered.label, &self.config.token_class);

        let mut doc = self.document.borrow_mut();
        let inserted = doc.insert_markup(&markup)?;
        let token = inserted
            .into_iter()
            .find(|&node| doc.is_token(node))
            .ok_or(MarkupError::MissingTemplateId)?;
        doc.set_token_display(token, &rendered);
        info!(
            "event=token_inserted module=workspace status=ok node={} bound={}",
            token.0,
            !bound_id.is_empty()
        );
        Ok(token)
    }

    /// Click hook for pointer interactions anywhere on the page.
    pub fn click(&mut self, target: PointerTarget) {
        self.settle();
        if let PointerTarget::Overlay { entry: Some(index) } = target {
            self.select_overlay_entry(index);
            return;
        }

        let mut doc = self.document.borrow_mut();
        self.overlay.handle_pointer(&mut *doc, target);
        if let PointerTarget::Document(node) = target {
            if let Some(token) = doc.closest_token(node) {
                self.overlay.open(&mut *doc, &self.store, token);
            }
        }
    }

    /// Commits the overlay entry at `index` to the overlay's owner token.
    pub fn select_overlay_entry(&mut self, index: usize) -> bool {
        let mut doc = self.document.borrow_mut();
        self.overlay.select_entry(&mut *doc, &self.store, index)
    }

    /// Rebinds `token` directly, as if chosen in its overlay.
    pub fn rebind_token(&mut self, token: NodeId, chosen: TemplateId) {
        let mut doc = self.document.borrow_mut();
        self.overlay.select(&mut *doc, &self.store, token, chosen);
    }

    pub fn close_overlay(&mut self) {
        let mut doc = self.document.borrow_mut();
        self.overlay.close(&mut *doc);
    }

    /// Key-down hook. `Handled` means the default action must be suppressed.
    pub fn on_key_down(&mut self, key: Key) -> KeyHandling {
        self.settle();
        let mut doc = self.document.borrow_mut();
        handle_key_down(&mut *doc, key)
    }

    /// Runs the key hook, then the document's default action unless suppressed.
    pub fn press_key(&mut self, key: Key) -> KeyHandling {
        let handling = self.on_key_down(key);
        if handling == KeyHandling::Default {
            self.document.borrow_mut().perform_default_key(key);
        }
        handling
    }

    /// Adds a template and selects it in the sidebar.
    pub fn add_template(&self) -> TemplateId {
        let id = self.store.add();
        let snapshot = self.store.get_all();
        self.sidebar.borrow_mut().select(id, &snapshot);
        id
    }

    pub fn select_template(&self, id: TemplateId) {
        let snapshot = self.store.get_all();
        self.sidebar.borrow_mut().select(id, &snapshot);
    }

    pub fn set_template_edit(&self, value: &str) {
        self.sidebar.borrow_mut().set_edit_value(value);
    }

    /// Commits the sidebar edit field to the selected template.
    pub fn commit_template_edit(&self) {
        let request = self.sidebar.borrow().commit_request();
        if let Some((id, text)) = request {
            self.store.update(id, &text);
        }
    }

    /// Removes the template selected in the sidebar.
    pub fn delete_selected_template(&self) {
        let request = self.sidebar.borrow().delete_request();
        if let Some(id) = request {
            self.store.remove(id);
            self.sidebar.borrow_mut().clear_selection();
        }
    }

    fn settle(&self) {
        if !self.sync.flush(&self.store) {
            warn!("event=sync_replay module=workspace status=still_busy");
        }
    }

    /// Unsubscribes from the store and closes the overlay. Idempotent.
    pub fn dispose(&mut self) {
        self.sync.detach();
        if let Ok(mut doc) = self.document.try_borrow_mut() {
            self.overlay.close(&mut *doc);
        }
    }
}

impl<D: DocumentModel + 'static> Drop for TokenWorkspace<D> {
    fn drop(&mut self) {
        self.dispose();
    }
}
