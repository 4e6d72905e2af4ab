use scribe_core::{
    Attrs, Document, Editor, ElementNode, ExtensionRegistry, Marks, Node, Op, Point, Selection,
    TextNode, Transaction,
};

#[test]
fn insert_divider_adds_trailing_paragraph_and_moves_caret() {
    let mut editor = Editor::standard();

    assert!(editor.run_command("divider.insert", None));

    let children = &editor.doc().children;
    assert_eq!(children.len(), 3);
    let Node::Void(divider) = &children[1] else {
        panic!("expected divider");
    };
    assert_eq!(divider.kind, "divider");
    let Node::Element(trailing) = &children[2] else {
        panic!("expected paragraph");
    };
    assert_eq!(trailing.kind, "paragraph");

    assert_eq!(
        editor.selection(),
        &Selection::collapsed(Point::new(vec![2, 0], 0))
    );
}

#[test]
fn failing_op_leaves_the_document_untouched() {
    let mut editor = Editor::standard();
    let before = editor.doc().clone();
    let selection_before = editor.selection().clone();

    // The first op on its own would apply; the second targets a missing
    // node, so the whole transaction must be rejected.
    let tx = Transaction::new(vec![
        Op::InsertNode {
            path: vec![1],
            node: Node::divider(),
        },
        Op::RemoveNode { path: vec![9] },
    ]);

    assert!(editor.apply(tx).is_err());
    assert_eq!(editor.doc(), &before);
    assert_eq!(editor.selection(), &selection_before);
    assert!(!editor.can_undo());
}

#[test]
fn undo_and_redo_round_trip_a_block_change() {
    let mut editor = Editor::standard();

    assert!(editor.run_command(
        "heading.set",
        Some(serde_json::json!({ "level": 3 }))
    ));
    let Node::Element(block) = &editor.doc().children[0] else {
        panic!("expected element block");
    };
    assert_eq!(block.kind, "heading");

    assert!(editor.can_undo());
    assert!(editor.undo());
    let Node::Element(block) = &editor.doc().children[0] else {
        panic!("expected element block");
    };
    assert_eq!(block.kind, "paragraph");

    assert!(editor.can_redo());
    assert!(editor.redo());
    let Node::Element(block) = &editor.doc().children[0] else {
        panic!("expected element block");
    };
    assert_eq!(block.kind, "heading");
    assert_eq!(block.attrs.get("level").and_then(|v| v.as_u64()), Some(3));
}

#[test]
fn normalize_clamps_out_of_range_heading_level_at_construction() {
    let mut attrs = Attrs::default();
    attrs.insert("level".to_string(), serde_json::json!(42));
    let doc = Document {
        children: vec![Node::Element(ElementNode {
            kind: "heading".to_string(),
            attrs,
            children: vec![Node::Text(TextNode {
                text: "x".to_string(),
                marks: Marks::default(),
            })],
        })],
    };
    let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
    let editor = Editor::new(doc, selection, ExtensionRegistry::standard());

    let Node::Element(block) = &editor.doc().children[0] else {
        panic!("expected element block");
    };
    assert_eq!(block.kind, "heading");
    assert_eq!(block.attrs.get("level").and_then(|v| v.as_u64()), Some(6));
}

#[test]
fn empty_document_is_normalized_to_one_paragraph() {
    let doc = Document { children: vec![] };
    let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
    let editor = Editor::new(doc, selection, ExtensionRegistry::minimal());

    assert_eq!(editor.doc().children.len(), 1);
    let Node::Element(block) = &editor.doc().children[0] else {
        panic!("expected element block");
    };
    assert_eq!(block.kind, "paragraph");
}

#[test]
fn adjacent_text_leaves_with_equal_marks_merge() {
    let doc = Document {
        children: vec![Node::Element(ElementNode {
            kind: "paragraph".to_string(),
            attrs: Attrs::default(),
            children: vec![
                Node::text("he", Marks::default()),
                Node::text("llo", Marks::default()),
                Node::text("!", Marks::with("bold")),
            ],
        })],
    };
    let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
    let editor = Editor::new(doc, selection, ExtensionRegistry::standard());

    let Node::Element(block) = &editor.doc().children[0] else {
        panic!("expected element block");
    };
    assert_eq!(block.children.len(), 2);
    let Node::Text(first) = &block.children[0] else {
        panic!("expected text leaf");
    };
    assert_eq!(first.text, "hello");
    let Node::Text(second) = &block.children[1] else {
        panic!("expected text leaf");
    };
    assert!(second.marks.has("bold"));
}

#[test]
fn staged_mark_reports_active_and_clears_when_caret_moves() {
    let mut editor = Editor::standard();

    assert!(editor.stage_toggle_mark("bold", Attrs::default()));
    assert!(editor.state().active_marks().has("bold"));
    assert!(editor.staged_marks().is_some());

    // No document text carries the mark yet.
    let Node::Element(block) = &editor.doc().children[0] else {
        panic!("expected element block");
    };
    let Node::Text(leaf) = &block.children[0] else {
        panic!("expected text leaf");
    };
    assert!(!leaf.marks.has("bold"));

    // Staging again toggles it back off within the holder.
    assert!(editor.stage_toggle_mark("bold", Attrs::default()));
    assert!(!editor.state().active_marks().has("bold"));

    assert!(editor.stage_toggle_mark("bold", Attrs::default()));
    editor.run_command("divider.insert", None);
    assert!(editor.staged_marks().is_none());
}

#[test]
fn typed_text_carries_the_staged_mark() {
    let mut editor = Editor::standard();

    assert!(editor.stage_toggle_mark("bold", Attrs::default()));
    assert!(editor.run_chain(&scribe_core::UpdateChain::single(
        scribe_core::InsertTextUpdate {
            text: "bolded".to_string(),
        }
    )));

    let Node::Element(block) = &editor.doc().children[0] else {
        panic!("expected element block");
    };
    let bold_leaf = block.children.iter().find_map(|n| match n {
        Node::Text(t) if t.marks.has("bold") => Some(t),
        _ => None,
    });
    let bold_leaf = bold_leaf.expect("inserted text must carry the staged mark");
    assert_eq!(bold_leaf.text, "bolded");
    assert!(editor.staged_marks().is_none());
}

#[test]
fn storage_is_private_to_its_extension() {
    let editor = Editor::standard();
    assert!(
        editor
            .storage::<scribe_core::NodeViews<String>>("image")
            .is_some()
    );
    assert!(
        editor
            .storage::<scribe_core::NodeViews<String>>("paragraph")
            .is_none()
    );
}
