use scribe_core::{
    AsyncStatus, AttrPatch, Editor, RemoveNodeUpdate, SetNodeAttrsUpdate, UpdateChain,
    apply_if_node_exists, find_by_id,
};

fn editor_with_image() -> (Editor, String) {
    let mut editor = Editor::standard();
    assert!(editor.run_command(
        "image.insert",
        Some(serde_json::json!({ "src": "pending.png" }))
    ));
    let image = editor
        .doc()
        .children
        .iter()
        .find(|n| n.kind() == Some("image"))
        .expect("image must be in the document");
    let id = image.id().expect("image must carry an id").to_string();
    (editor, id)
}

fn set_src_chain(editor: &Editor, id: &str, src: &str) -> Option<UpdateChain> {
    let path = find_by_id(&editor.state().doc, id)?;
    Some(UpdateChain::single(SetNodeAttrsUpdate {
        path,
        patch: AttrPatch::set_one("src", serde_json::json!(src)),
    }))
}

#[test]
fn async_result_lands_while_the_node_is_alive() {
    let (mut editor, id) = editor_with_image();
    let chain = set_src_chain(&editor, &id, "uploaded.png").unwrap();

    assert!(apply_if_node_exists(&mut editor, &id, &chain));

    let image = editor
        .doc()
        .children
        .iter()
        .find(|n| n.kind() == Some("image"))
        .unwrap();
    assert_eq!(
        image.attrs().and_then(|a| a.get("src")).and_then(|v| v.as_str()),
        Some("uploaded.png")
    );
}

#[test]
fn stale_id_is_a_silent_no_op() {
    let (mut editor, id) = editor_with_image();
    let chain = set_src_chain(&editor, &id, "uploaded.png").unwrap();

    // The node is deleted while the async work is in flight.
    let image_ix = editor
        .doc()
        .children
        .iter()
        .position(|n| n.kind() == Some("image"))
        .unwrap();
    assert!(editor.run_chain(&UpdateChain::single(RemoveNodeUpdate {
        path: vec![image_ix],
    })));
    let before = editor.doc().clone();

    assert!(!apply_if_node_exists(&mut editor, &id, &chain));
    assert_eq!(editor.doc(), &before);
    assert!(
        !editor
            .doc()
            .children
            .iter()
            .any(|n| n.kind() == Some("image"))
    );
}

#[test]
fn status_starts_idle_and_terminates() {
    let status = AsyncStatus::default();
    assert_eq!(status, AsyncStatus::Idle);
    assert!(!status.is_terminal());
    assert!(!AsyncStatus::Loading.is_terminal());
    assert!(AsyncStatus::Complete.is_terminal());
    assert!(
        AsyncStatus::Error {
            message: "fetch failed".to_string(),
        }
        .is_terminal()
    );
}

#[test]
fn status_serializes_with_a_tag() {
    let json = serde_json::to_value(&AsyncStatus::Error {
        message: "timed out".to_string(),
    })
    .unwrap();
    assert_eq!(
        json,
        serde_json::json!({ "status": "error", "message": "timed out" })
    );

    let round: AsyncStatus =
        serde_json::from_value(serde_json::json!({ "status": "loading" })).unwrap();
    assert_eq!(round, AsyncStatus::Loading);
}
