use scribe_core::{
    Document, Editor, EditorState, InsertNodeUpdate, LiftListItemUpdate, Node, Point,
    RemoveNodeUpdate, Selection, SelectNodeUpdate, UpdateChain, build_transaction, dry_run,
    run_with_dispatch,
};

fn plain_state() -> EditorState {
    EditorState::new(
        Document {
            children: vec![Node::paragraph("hello")],
        },
        Selection::collapsed(Point::new(vec![0, 0], 0)),
    )
}

#[test]
fn dry_run_reports_applicability_without_side_effects() {
    let state = plain_state();
    let before = state.clone();

    let applicable = UpdateChain::single(InsertNodeUpdate {
        path: vec![1],
        node: Node::divider(),
    });
    assert!(dry_run(&state, &applicable));

    let inapplicable = UpdateChain::single(LiftListItemUpdate);
    assert!(!dry_run(&state, &inapplicable));

    assert_eq!(state, before);
}

#[test]
fn dispatch_is_called_exactly_once() {
    let state = plain_state();
    let chain = UpdateChain::single(InsertNodeUpdate {
        path: vec![1],
        node: Node::divider(),
    });

    let mut dispatched = Vec::new();
    let applied = run_with_dispatch(&state, &chain, &mut |tx| dispatched.push(tx));
    assert!(applied);
    assert_eq!(dispatched.len(), 1);
}

#[test]
fn identity_chain_skips_dispatch() {
    let state = plain_state();
    let chain = UpdateChain::single(RemoveNodeUpdate { path: vec![9] });

    let mut calls = 0;
    let applied = run_with_dispatch(&state, &chain, &mut |_tx| calls += 1);
    assert!(!applied);
    assert_eq!(calls, 0);
}

#[test]
fn failing_update_aborts_the_whole_chain() {
    let state = plain_state();
    // The first update is valid on its own; the second errors, so nothing
    // may be dispatched.
    let chain = UpdateChain::new()
        .then(InsertNodeUpdate {
            path: vec![1],
            node: Node::divider(),
        })
        .then(SelectNodeUpdate { path: vec![9] });

    assert!(build_transaction(&state, &chain).is_none());

    let mut calls = 0;
    assert!(!run_with_dispatch(&state, &chain, &mut |_tx| calls += 1));
    assert_eq!(calls, 0);
}

#[test]
fn unknown_command_reports_not_applicable() {
    let mut editor = Editor::standard();
    assert!(!editor.run_command("no.such.command", None));
}

#[test]
fn command_with_missing_args_degrades_to_no_op() {
    let mut editor = Editor::standard();
    assert!(!editor.run_command("heading.set", None));

    let Node::Element(block) = &editor.doc().children[0] else {
        panic!("expected element block");
    };
    assert_eq!(block.kind, "paragraph");
}

#[test]
fn keystroke_routes_through_bindings() {
    let registry = scribe_core::ExtensionRegistry::standard();
    let item = {
        let Node::Element(mut el) = registry.create_node("list_item", Default::default()).unwrap()
        else {
            panic!("expected element node");
        };
        el.children = vec![Node::text("item", Default::default())];
        Node::Element(el)
    };
    let doc = Document {
        children: vec![item],
    };
    let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
    let mut editor = Editor::new(doc, selection, registry);

    assert!(editor.handle_keystroke("tab"));
    let Node::Element(block) = &editor.doc().children[0] else {
        panic!("expected element block");
    };
    assert_eq!(
        block.attrs.get("indent").and_then(|v| v.as_u64()),
        Some(1)
    );

    assert!(editor.handle_keystroke("shift-tab"));
    assert!(!editor.handle_keystroke("ctrl-unbound"));
}
