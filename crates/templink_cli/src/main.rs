//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `templink_core` linkage and drive one token lifecycle end to end.
//! - Keep output deterministic apart from generated template ids.
//!
//! Usage: `templink_cli [absolute-log-dir]`

use log::warn;
use templink_core::{
    default_log_level, init_logging, DocumentModel, InsertPolicy, Key, MemoryDocument,
    PointerTarget, TokenConfig, TokenWorkspace,
};

fn main() {
    println!("templink_core ping={}", templink_core::ping());
    println!("templink_core version={}", templink_core::core_version());

    if let Some(log_dir) = std::env::args().nth(1) {
        if let Err(err) = init_logging(default_log_level(), &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    let mut doc = MemoryDocument::new();
    let paragraph = doc.append_element(doc.root(), "p");
    let intro = doc.append_text(paragraph, "Hello ");
    doc.set_caret(intro, 6);

    let config = TokenConfig {
        insert_policy: InsertPolicy::BindFirst,
        ..TokenConfig::default()
    };
    let mut workspace = TokenWorkspace::new(config, doc);

    let token = match workspace.insert_token() {
        Ok(token) => token,
        Err(err) => {
            warn!("event=smoke module=cli status=error reason={err}");
            eprintln!("token insertion failed: {err}");
            std::process::exit(1);
        }
    };
    print_tokens("inserted", &workspace);

    let first = workspace.store().get_all()[0].id;
    workspace.store().update(first, "Dear customer");
    print_tokens("renamed", &workspace);

    workspace.store().remove(first);
    print_tokens("removed", &workspace);

    workspace.click(PointerTarget::Document(token));
    workspace.click(PointerTarget::Overlay { entry: Some(0) });
    print_tokens("rebound", &workspace);

    workspace.edit_document(|doc| doc.set_caret(paragraph, 2));
    workspace.press_key(Key::Backspace);
    print_tokens("deleted", &workspace);
}

fn print_tokens(stage: &str, workspace: &TokenWorkspace<MemoryDocument>) {
    let tokens = workspace.tokens();
    if tokens.is_empty() {
        println!("{stage}: no tokens");
    }
    for (node, state) in tokens {
        println!(
            "{stage}: node={} label={:?} ok={} bound_id={:?}",
            node.0, state.label, state.ok, state.bound_id
        );
    }
}
