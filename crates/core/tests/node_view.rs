use scribe_core::{Editor, Node, NodeViews, RemoveNodeUpdate, UpdateChain};

fn insert_image(editor: &mut Editor, src: &str) -> String {
    assert!(editor.run_command("image.insert", Some(serde_json::json!({ "src": src }))));
    let image = editor
        .doc()
        .children
        .iter()
        .find(|n| n.kind() == Some("image"))
        .expect("image must be in the document");
    let id = image.id().expect("image must carry an id").to_string();
    let views = editor
        .storage_mut::<NodeViews<String>>("image")
        .expect("image extension owns a view store");
    views.insert(id.clone(), format!("view:{src}"));
    id
}

#[test]
fn deleting_an_image_removes_its_view_once() {
    let mut editor = Editor::standard();
    let id = insert_image(&mut editor, "a.png");

    let image_ix = editor
        .doc()
        .children
        .iter()
        .position(|n| n.kind() == Some("image"))
        .unwrap();
    assert!(editor.run_chain(&UpdateChain::single(RemoveNodeUpdate {
        path: vec![image_ix],
    })));

    let views = editor.storage::<NodeViews<String>>("image").unwrap();
    assert!(!views.contains(&id));
    assert_eq!(views.removals(), 1);
}

#[test]
fn moving_an_image_keeps_its_view() {
    let mut editor = Editor::standard();
    let id = insert_image(&mut editor, "b.png");

    let image_ix = editor
        .doc()
        .children
        .iter()
        .position(|n| n.kind() == Some("image"))
        .unwrap();
    let image = editor.doc().children[image_ix].clone();

    // Remove and reinsert in one transaction: the id survives, so the view
    // must not be torn down.
    assert!(editor.run_chain(
        &UpdateChain::new()
            .then(RemoveNodeUpdate {
                path: vec![image_ix],
            })
            .then(scribe_core::InsertNodeUpdate {
                path: vec![0],
                node: image,
            })
    ));

    let Some(moved) = editor.doc().children.first() else {
        panic!("document must not be empty");
    };
    assert_eq!(moved.kind(), Some("image"));

    let views = editor.storage::<NodeViews<String>>("image").unwrap();
    assert!(views.contains(&id));
    assert_eq!(views.removals(), 0);
}

#[test]
fn undoing_the_insert_also_tears_down_the_view() {
    let mut editor = Editor::standard();
    let id = insert_image(&mut editor, "c.png");

    assert!(editor.undo());
    assert!(
        !editor
            .doc()
            .children
            .iter()
            .any(|n| n.kind() == Some("image"))
    );

    let views = editor.storage::<NodeViews<String>>("image").unwrap();
    assert!(!views.contains(&id));
    assert_eq!(views.removals(), 1);
}

#[test]
fn view_store_removal_is_idempotent() {
    let mut views = NodeViews::new();
    views.insert("n1", "view".to_string());

    assert!(views.remove("n1").is_some());
    assert!(views.remove("n1").is_none());
    assert!(views.remove("never-there").is_none());
    assert_eq!(views.removals(), 1);
    assert!(views.is_empty());
}

#[test]
fn untracked_kinds_do_not_touch_the_view_store() {
    let mut editor = Editor::standard();
    let id = insert_image(&mut editor, "d.png");

    assert!(editor.run_command("divider.insert", None));
    let divider_ix = editor
        .doc()
        .children
        .iter()
        .position(|n| matches!(n, Node::Void(v) if v.kind == "divider"))
        .unwrap();
    assert!(editor.run_chain(&UpdateChain::single(RemoveNodeUpdate {
        path: vec![divider_ix],
    })));

    let views = editor.storage::<NodeViews<String>>("image").unwrap();
    assert!(views.contains(&id));
    assert_eq!(views.removals(), 0);
}
