//! Observable template store.
//!
//! # Responsibility
//! - Own the ordered sequence of template records.
//! - Fan out a fresh snapshot to every subscriber after each mutation.
//!
//! # Invariants
//! - Record ids are pairwise unique at all times.
//! - Readers only ever receive copies; internal state is never aliased.
//! - Listeners run synchronously, in subscription order, exactly once per
//!   mutation, before the mutating call returns.
//! - No operation fails; absent ids and blank text are handled by no-op or
//!   substitution.

use crate::config::TokenConfig;
use crate::model::template::{TemplateId, TemplateRecord};
use log::{debug, info, warn};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

type ListenerFn = Box<dyn FnMut(&[TemplateRecord])>;

struct ListenerEntry {
    id: u64,
    callback: Rc<RefCell<ListenerFn>>,
}

#[derive(Default)]
struct StoreState {
    templates: Vec<TemplateRecord>,
    listeners: Vec<ListenerEntry>,
    next_listener_id: u64,
}

impl StoreState {
    fn is_registered(&self, listener_id: u64) -> bool {
        self.listeners.iter().any(|entry| entry.id == listener_id)
    }
}

/// Authoritative, observable set of templates.
///
/// Constructed explicitly by the composing application and shared through
/// `Rc<TemplateStore>`; there is no process-wide instance.
pub struct TemplateStore {
    state: Rc<RefCell<StoreState>>,
    default_text: String,
}

impl TemplateStore {
    /// Creates a store seeded from `config.seed_templates`.
    pub fn new(config: &TokenConfig) -> Self {
        Self::from_texts(
            config.default_text.clone(),
            config.seed_templates.iter().cloned(),
        )
    }

    /// Creates a store with explicit default text and initial record texts.
    pub fn from_texts<I, S>(default_text: impl Into<String>, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let templates = texts.into_iter().map(TemplateRecord::new).collect();
        Self {
            state: Rc::new(RefCell::new(StoreState {
                templates,
                ..StoreState::default()
            })),
            default_text: default_text.into(),
        }
    }

    /// Returns the text used for new and blank-updated records.
    pub fn default_text(&self) -> &str {
        &self.default_text
    }

    /// Returns an independent, ordered snapshot of all records.
    pub fn get_all(&self) -> Vec<TemplateRecord> {
        self.state.borrow().templates.clone()
    }

    /// Returns a copy of one record.
    pub fn get(&self, id: TemplateId) -> Option<TemplateRecord> {
        self.state
            .borrow()
            .templates
            .iter()
            .find(|record| record.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().templates.is_empty()
    }

    /// Appends one record with a fresh id and the default text.
    ///
    /// Returns the new id so callers can select it.
    pub fn add(&self) -> TemplateId {
        let id = {
            let mut state = self.state.borrow_mut();
            let mut record = TemplateRecord::new(self.default_text.clone());
            while state.templates.iter().any(|existing| existing.id == record.id) {
                record = TemplateRecord::new(self.default_text.clone());
            }
            let id = record.id;
            state.templates.push(record);
            info!(
                "event=template_added module=store status=ok id={} count={}",
                id,
                state.templates.len()
            );
            id
        };
        self.notify();
        id
    }

    /// Removes the record with `id`; absent ids are a silent no-op.
    pub fn remove(&self, id: TemplateId) {
        {
            let mut state = self.state.borrow_mut();
            let before = state.templates.len();
            state.templates.retain(|record| record.id != id);
            let removed = before != state.templates.len();
            info!(
                "event=template_removed module=store status={} id={} count={}",
                if removed { "ok" } else { "absent" },
                id,
                state.templates.len()
            );
        }
        self.notify();
    }

    /// Replaces the text of `id`.
    ///
    /// Whitespace-only text is replaced by the default text. Absent ids are a
    /// silent no-op.
    pub fn update(&self, id: TemplateId, text: &str) {
        {
            let mut state = self.state.borrow_mut();
            let next_text = if text.trim().is_empty() {
                self.default_text.clone()
            } else {
                text.to_string()
            };
            let status = match state.templates.iter_mut().find(|record| record.id == id) {
                Some(record) => {
                    record.text = next_text;
                    "ok"
                }
                None => "absent",
            };
            info!(
                "event=template_updated module=store status={} id={}",
                status, id
            );
        }
        self.notify();
    }

    /// Registers `listener` for every future notification.
    ///
    /// Listeners are invoked in subscription order. Dropping the returned
    /// handle does not unsubscribe; call `Subscription::unsubscribe`.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: FnMut(&[TemplateRecord]) + 'static,
    {
        let mut state = self.state.borrow_mut();
        let listener_id = state.next_listener_id;
        state.next_listener_id += 1;
        state.listeners.push(ListenerEntry {
            id: listener_id,
            callback: Rc::new(RefCell::new(Box::new(listener))),
        });
        debug!(
            "event=store_subscribed module=store status=ok listener={} listeners={}",
            listener_id,
            state.listeners.len()
        );

        Subscription {
            state: Rc::downgrade(&self.state),
            listener_id,
        }
    }

    /// Returns the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    fn notify(&self) {
        let callbacks: Vec<(u64, Rc<RefCell<ListenerFn>>)> = self
            .state
            .borrow()
            .listeners
            .iter()
            .map(|entry| (entry.id, Rc::clone(&entry.callback)))
            .collect();

        for (listener_id, callback) in callbacks {
            // An earlier listener may have unsubscribed this one.
            if !self.state.borrow().is_registered(listener_id) {
                continue;
            }
            // Earlier listeners may also have mutated the store.
            let snapshot = self.get_all();
            match callback.try_borrow_mut() {
                Ok(mut listener) => listener(&snapshot),
                Err(_) => warn!(
                    "event=store_notify module=store status=skipped_reentrant listener={}",
                    listener_id
                ),
            }
        }
    }
}

/// Handle returned by `TemplateStore::subscribe`.
#[derive(Debug)]
pub struct Subscription {
    state: Weak<RefCell<StoreState>>,
    listener_id: u64,
}

impl Subscription {
    /// Deregisters the listener. Idempotent, and a no-op once the store is gone.
    pub fn unsubscribe(&self) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let mut state = state.borrow_mut();
        let before = state.listeners.len();
        state
            .listeners
            .retain(|entry| entry.id != self.listener_id);
        if before != state.listeners.len() {
            debug!(
                "event=store_unsubscribed module=store status=ok listener={} listeners={}",
                self.listener_id,
                state.listeners.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TemplateStore;
    use crate::config::TokenConfig;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn seeds_from_config_in_order() {
        let store = TemplateStore::new(&TokenConfig::default());
        let texts: Vec<String> = store.get_all().into_iter().map(|r| r.text).collect();
        assert_eq!(texts, vec!["template 1", "template 2", "template 3"]);
    }

    #[test]
    fn add_returns_id_of_appended_record() {
        let store = TemplateStore::from_texts("template", Vec::<String>::new());
        let id = store.add();
        let all = store.get_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);
        assert_eq!(all[0].text, "template");
    }

    #[test]
    fn listener_unsubscribed_by_earlier_listener_is_skipped() {
        let store = Rc::new(TemplateStore::from_texts("template", ["a"]));
        let calls = Rc::new(RefCell::new(Vec::new()));

        let second_handle: Rc<RefCell<Option<super::Subscription>>> =
            Rc::new(RefCell::new(None));
        let handle_for_first = Rc::clone(&second_handle);
        let first_calls = Rc::clone(&calls);
        let _first = store.subscribe(move |_| {
            first_calls.borrow_mut().push("first");
            if let Some(handle) = handle_for_first.borrow().as_ref() {
                handle.unsubscribe();
            }
        });
        let second_calls = Rc::clone(&calls);
        *second_handle.borrow_mut() = Some(store.subscribe(move |_| {
            second_calls.borrow_mut().push("second");
        }));

        store.add();
        assert_eq!(*calls.borrow(), vec!["first"]);
    }

    #[test]
    fn listener_may_read_store_during_notification() {
        let store = Rc::new(TemplateStore::from_texts("template", ["a"]));
        let seen = Rc::new(RefCell::new(0));
        let reader = Rc::clone(&store);
        let seen_in_listener = Rc::clone(&seen);
        let _sub = store.subscribe(move |snapshot| {
            assert_eq!(reader.get_all(), snapshot);
            *seen_in_listener.borrow_mut() = snapshot.len();
        });

        store.add();
        assert_eq!(*seen.borrow(), 2);
    }

    #[test]
    fn later_listeners_see_mutation_made_by_earlier_listener() {
        let store = Rc::new(TemplateStore::from_texts("template", ["a"]));
        let id = store.get_all()[0].id;
        let writer = Rc::clone(&store);
        let _normaliser = store.subscribe(move |snapshot| {
            if snapshot.iter().any(|record| record.text == "raw") {
                writer.update(id, "normalised");
            }
        });
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_in_listener = Rc::clone(&seen);
        let _observer = store.subscribe(move |snapshot| {
            seen_in_listener.borrow_mut().push(snapshot[0].text.clone());
        });

        store.update(id, "raw");
        assert_eq!(*seen.borrow(), vec!["normalised", "normalised"]);
        assert!(!store.is_empty());
    }

    #[test]
    fn unsubscribe_after_store_drop_is_noop() {
        let store = TemplateStore::from_texts("template", ["a"]);
        let sub = store.subscribe(|_| {});
        drop(store);
        sub.unsubscribe();
    }
}
