use std::rc::Rc;
use templink_core::{
    DocumentModel, InsertPolicy, MemoryDocument, NodeId, PointerTarget, TemplateStore,
    TokenConfig, TokenWorkspace,
};

fn workspace_with_caret(config: TokenConfig) -> (TokenWorkspace<MemoryDocument>, NodeId) {
    let mut doc = MemoryDocument::new();
    let p = doc.append_element(doc.root(), "p");
    doc.set_caret(p, 0);
    (TokenWorkspace::new(config, doc), p)
}

fn label_of(workspace: &TokenWorkspace<MemoryDocument>, token: NodeId) -> (String, bool) {
    let state = workspace
        .document()
        .token(token)
        .expect("token should exist");
    (state.label, state.ok)
}

#[test]
fn startup_pass_labels_existing_tokens() {
    let store = Rc::new(TemplateStore::new(&TokenConfig::default()));
    let first = store.get_all()[0].clone();

    let mut doc = MemoryDocument::new();
    let p = doc.append_element(doc.root(), "p");
    let bound = doc.append_token(p, &first.id.to_string());
    let dangling = doc.append_token(p, "gone");

    let workspace = TokenWorkspace::with_store(TokenConfig::default(), store, doc);
    assert_eq!(label_of(&workspace, bound), (first.text, true));
    assert_eq!(label_of(&workspace, dangling), ("ERROR".to_string(), false));
    assert_eq!(workspace.sidebar().items().len(), 3);
}

#[test]
fn dangling_round_trip_through_remove_and_rebind() {
    let (mut workspace, _) = workspace_with_caret(TokenConfig {
        insert_policy: InsertPolicy::BindFirst,
        ..TokenConfig::default()
    });
    let target = workspace.store().get_all()[0].clone();
    let token = workspace.insert_token().expect("token should insert");
    assert_eq!(label_of(&workspace, token), (target.text.clone(), true));

    workspace.store().remove(target.id);
    assert_eq!(label_of(&workspace, token), ("ERROR".to_string(), false));

    let new_id = workspace.store().add();
    assert_eq!(label_of(&workspace, token), ("ERROR".to_string(), false));

    workspace.click(PointerTarget::Document(token));
    let index = workspace
        .overlay()
        .current()
        .and_then(|overlay| overlay.entries.iter().position(|entry| entry.id == new_id))
        .expect("new template should be listed");
    workspace.click(PointerTarget::Overlay { entry: Some(index) });

    assert_eq!(label_of(&workspace, token), ("template".to_string(), true));
    assert_eq!(
        workspace.document().token(token).map(|state| state.bound_id),
        Some(new_id.to_string())
    );
}

#[test]
fn rename_propagates_to_every_bound_token() {
    let (mut workspace, _) = workspace_with_caret(TokenConfig {
        insert_policy: InsertPolicy::BindFirst,
        ..TokenConfig::default()
    });
    let first = workspace.insert_token().expect("first token");
    let second = workspace.insert_token().expect("second token");
    let id = workspace.store().get_all()[0].id;

    workspace.store().update(id, "Kind regards");

    assert_eq!(label_of(&workspace, first), ("Kind regards".to_string(), true));
    assert_eq!(label_of(&workspace, second), ("Kind regards".to_string(), true));
}

#[test]
fn unbound_insert_renders_error_immediately() {
    let (mut workspace, p) = workspace_with_caret(TokenConfig::default());
    let token = workspace.insert_token().expect("token should insert");

    let state = workspace.document().token(token).expect("token state");
    assert!(state.is_unbound());
    assert_eq!((state.label.as_str(), state.ok), ("ERROR", false));
    assert_eq!(workspace.document().children(p), vec![token]);
}

#[test]
fn bind_first_on_empty_store_falls_back_to_unbound() {
    let config = TokenConfig {
        insert_policy: InsertPolicy::BindFirst,
        seed_templates: Vec::new(),
        ..TokenConfig::default()
    };
    let (mut workspace, _) = workspace_with_caret(config);
    let token = workspace.insert_token().expect("token should insert");

    let state = workspace.document().token(token).expect("token state");
    assert!(state.is_unbound());
    assert!(!state.ok);
}

#[test]
fn markup_significant_template_text_is_inserted_literally() {
    let (mut workspace, p) = workspace_with_caret(TokenConfig {
        insert_policy: InsertPolicy::BindFirst,
        ..TokenConfig::default()
    });
    let id = workspace.store().get_all()[0].id;
    let hostile = r#"<b>bold</b> & "quoted" </span><i>"#;
    workspace.store().update(id, hostile);

    let token = workspace.insert_token().expect("escaped markup should insert");

    assert_eq!(label_of(&workspace, token), (hostile.to_string(), true));
    let doc = workspace.document();
    assert_eq!(doc.children(p), vec![token]);
    assert_eq!(doc.tokens(), vec![token]);
}

#[test]
fn custom_error_label_is_used_for_dangling_tokens() {
    let config = TokenConfig {
        error_label: "missing".to_string(),
        ..TokenConfig::default()
    };
    let (mut workspace, _) = workspace_with_caret(config);
    let token = workspace.insert_token().expect("token should insert");

    assert_eq!(label_of(&workspace, token), ("missing".to_string(), false));
}

#[test]
fn tokens_removed_from_document_are_not_synced() {
    let (mut workspace, _) = workspace_with_caret(TokenConfig::default());
    let token = workspace.insert_token().expect("token should insert");
    assert!(workspace.edit_document(|doc| doc.remove_node(token)));

    workspace.store().add();
    assert!(workspace.tokens().is_empty());
}

#[test]
fn dispose_stops_relabeling() {
    let (mut workspace, _) = workspace_with_caret(TokenConfig {
        insert_policy: InsertPolicy::BindFirst,
        ..TokenConfig::default()
    });
    let token = workspace.insert_token().expect("token should insert");
    let id = workspace.store().get_all()[0].id;
    let listeners_before = workspace.store().listener_count();

    workspace.dispose();
    workspace.store().update(id, "after dispose");

    assert_eq!(workspace.store().listener_count(), listeners_before - 1);
    assert_eq!(label_of(&workspace, token), ("template 1".to_string(), true));
}

#[test]
fn host_listener_rewriting_text_leaves_labels_current() {
    let store = Rc::new(TemplateStore::new(&TokenConfig::default()));
    let id = store.get_all()[0].id;
    let writer = Rc::clone(&store);
    let _normaliser = store.subscribe(move |snapshot| {
        if snapshot.iter().any(|record| record.text == "raw") {
            writer.update(id, "normalised");
        }
    });

    let mut doc = MemoryDocument::new();
    let p = doc.append_element(doc.root(), "p");
    let token = doc.append_token(p, &id.to_string());
    let workspace = TokenWorkspace::with_store(TokenConfig::default(), Rc::clone(&store), doc);

    store.update(id, "raw");
    assert_eq!(store.get(id).map(|record| record.text), Some("normalised".to_string()));
    assert_eq!(label_of(&workspace, token), ("normalised".to_string(), true));
}

#[test]
fn store_change_during_document_edit_is_synced_afterwards() {
    let (mut workspace, _) = workspace_with_caret(TokenConfig {
        insert_policy: InsertPolicy::BindFirst,
        ..TokenConfig::default()
    });
    let token = workspace.insert_token().expect("token should insert");
    let id = workspace.store().get_all()[0].id;
    let store = Rc::clone(workspace.store());

    workspace.edit_document(|doc| {
        doc.blur();
        store.remove(id);
    });

    assert!(!workspace.is_sync_pending());
    assert_eq!(label_of(&workspace, token), ("ERROR".to_string(), false));
    assert_eq!(workspace.sidebar().items().len(), 2);
}

#[test]
fn store_change_while_document_is_read_is_synced_on_next_access() {
    let (mut workspace, _) = workspace_with_caret(TokenConfig {
        insert_policy: InsertPolicy::BindFirst,
        ..TokenConfig::default()
    });
    let token = workspace.insert_token().expect("token should insert");
    let id = workspace.store().get_all()[0].id;

    {
        let _reading = workspace.document();
        workspace.store().update(id, "changed while reading");
        assert!(workspace.is_sync_pending());
    }

    assert_eq!(
        label_of(&workspace, token),
        ("changed while reading".to_string(), true)
    );
    assert!(!workspace.is_sync_pending());
}
