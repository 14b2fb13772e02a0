use templink_core::{DocumentModel, InsertPolicy, MemoryDocument, TokenConfig, TokenWorkspace};

fn workspace() -> TokenWorkspace<MemoryDocument> {
    let mut doc = MemoryDocument::new();
    let p = doc.append_element(doc.root(), "p");
    doc.set_caret(p, 0);
    TokenWorkspace::new(
        TokenConfig {
            insert_policy: InsertPolicy::BindFirst,
            ..TokenConfig::default()
        },
        doc,
    )
}

#[test]
fn add_selects_new_template_for_editing() {
    let workspace = workspace();
    let id = workspace.add_template();

    let sidebar = workspace.sidebar();
    assert_eq!(sidebar.selected(), Some(id));
    assert_eq!(sidebar.edit_value(), "template");
    assert!(sidebar.is_edit_enabled());
    assert!(sidebar.is_delete_enabled());
    let last = sidebar.items().last().expect("list should not be empty");
    assert_eq!(last.id, id);
    assert!(last.active);
}

#[test]
fn commit_edit_renames_template_and_tokens() {
    let mut workspace = workspace();
    let token = workspace.insert_token().expect("token should insert");
    let id = workspace.store().get_all()[0].id;

    workspace.select_template(id);
    workspace.set_template_edit("  Greeting  ");
    workspace.commit_template_edit();

    assert_eq!(
        workspace.store().get(id).map(|record| record.text),
        Some("Greeting".to_string())
    );
    let state = workspace.document().token(token).expect("token state");
    assert_eq!(state.label, "Greeting");
    let sidebar = workspace.sidebar();
    assert_eq!(sidebar.selected(), Some(id));
    assert_eq!(sidebar.items()[0].text, "Greeting");
    assert!(sidebar.items()[0].active);
}

#[test]
fn blank_commit_restores_default_text() {
    let workspace = workspace();
    let id = workspace.store().get_all()[2].id;

    workspace.select_template(id);
    workspace.set_template_edit("   ");
    workspace.commit_template_edit();

    assert_eq!(
        workspace.store().get(id).map(|record| record.text),
        Some("template".to_string())
    );
}

#[test]
fn delete_selected_removes_template_and_flags_tokens() {
    let mut workspace = workspace();
    let token = workspace.insert_token().expect("token should insert");
    let id = workspace.store().get_all()[0].id;

    workspace.select_template(id);
    workspace.delete_selected_template();

    assert!(workspace.store().get(id).is_none());
    let state = workspace.document().token(token).expect("token state");
    assert_eq!((state.label.as_str(), state.ok), ("ERROR", false));
    let sidebar = workspace.sidebar();
    assert_eq!(sidebar.selected(), None);
    assert!(!sidebar.is_delete_enabled());
    assert_eq!(sidebar.items().len(), 2);
}

#[test]
fn delete_without_selection_is_noop() {
    let workspace = workspace();
    workspace.delete_selected_template();
    assert_eq!(workspace.store().len(), 3);
}

#[test]
fn selecting_unknown_id_clears_selection() {
    let workspace = workspace();
    let id = workspace.store().get_all()[0].id;
    workspace.select_template(id);

    workspace.select_template(uuid::Uuid::new_v4());
    assert_eq!(workspace.sidebar().selected(), None);
    assert!(!workspace.sidebar().is_edit_enabled());
}
