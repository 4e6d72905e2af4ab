use scribe_core::{
    Attrs, Document, EditorState, MarkHolder, Marks, Node, Point, Selection, dry_run, table_node,
};
use scribe_toolbar::{ToolItem, Toolbar, ToolbarError, ToolbarRegistry, should_show_tool_item};

fn paragraph_state() -> EditorState {
    EditorState::new(
        Document {
            children: vec![Node::paragraph("hello")],
        },
        Selection::collapsed(Point::new(vec![0, 0], 2)),
    )
}

fn table_state() -> EditorState {
    EditorState::new(
        Document {
            children: vec![table_node(2, 2)],
        },
        Selection::collapsed(Point::new(vec![0, 0, 0, 0, 0], 0)),
    )
}

#[test]
fn items_without_a_depth_always_show() {
    assert!(should_show_tool_item(&paragraph_state(), None, None));
    assert!(should_show_tool_item(&table_state(), None, None));
}

#[test]
fn depth_rule_matches_the_anchor_exactly() {
    let state = paragraph_state();
    assert!(should_show_tool_item(&state, Some(1), None));
    assert!(!should_show_tool_item(&state, Some(2), None));
    assert!(!should_show_tool_item(&state, Some(0), None));
}

#[test]
fn table_escape_hatch_overrides_the_depth_rule() {
    let state = table_state();
    // Cell content sits deeper than the depth rule anticipates.
    assert!(!should_show_tool_item(&state, Some(1), None));
    assert!(should_show_tool_item(&state, Some(1), Some("table")));

    // The hatch only fires inside a cell.
    let outside = paragraph_state();
    assert!(should_show_tool_item(&outside, Some(1), Some("table")));
    assert!(!should_show_tool_item(&outside, Some(2), Some("table")));
}

#[test]
fn mark_item_reports_staged_marks_as_active() {
    let mut state = paragraph_state();
    let item = ToolItem::mark("bold", "bold");
    assert!(!item.is_active(&state));

    let focus = state.selection.focus().cloned().unwrap();
    state.mark_holder = Some(MarkHolder {
        at: focus,
        marks: Marks::with("bold"),
    });
    assert!(item.is_active(&state));

    // A holder staged at a different point is ignored.
    state.mark_holder = Some(MarkHolder {
        at: Point::new(vec![0, 0], 0),
        marks: Marks::with("bold"),
    });
    assert!(!item.is_active(&state));
}

#[test]
fn disabled_predicate_is_consulted_per_state() {
    let item =
        ToolItem::new("insert_row").disabled_when(|state| state.selection.is_collapsed());

    assert!(item.should_be_disabled(&paragraph_state()));

    let range = EditorState::new(
        Document {
            children: vec![Node::paragraph("hello")],
        },
        Selection::Range {
            anchor: Point::new(vec![0, 0], 0),
            focus: Point::new(vec![0, 0], 5),
        },
    );
    assert!(!item.should_be_disabled(&range));

    // Items without a predicate are never disabled.
    assert!(!ToolItem::mark("bold", "bold").should_be_disabled(&paragraph_state()));
}

#[test]
fn mark_item_click_proposes_a_toggle() {
    let state = EditorState::new(
        Document {
            children: vec![Node::paragraph("hello")],
        },
        Selection::Range {
            anchor: Point::new(vec![0, 0], 0),
            focus: Point::new(vec![0, 0], 5),
        },
    );
    let item = ToolItem::mark("bold", "bold");
    assert!(dry_run(&state, &item.click(&state)));

    // Over a caret the toggle is the identity, so the wrapper reports it
    // not applicable.
    let collapsed = paragraph_state();
    assert!(!dry_run(&collapsed, &item.click(&collapsed)));
}

#[test]
fn duplicate_item_names_are_rejected() {
    let within_group = Toolbar::new("paragraph").group(vec![
        ToolItem::mark("bold", "bold"),
        ToolItem::mark("bold", "bold"),
    ]);
    assert_eq!(
        within_group.err(),
        Some(ToolbarError::DuplicateItem {
            toolbar: "paragraph".to_string(),
            item: "bold".to_string(),
        })
    );

    let across_groups = Toolbar::new("paragraph")
        .group(vec![ToolItem::mark("bold", "bold")])
        .unwrap()
        .group(vec![ToolItem::mark("bold", "bold")]);
    assert!(across_groups.is_err());
}

#[test]
fn registry_rejects_a_second_toolbar_for_the_same_name() {
    let mut registry = ToolbarRegistry::new();
    registry.register(Toolbar::new("paragraph")).unwrap();
    assert_eq!(
        registry.register(Toolbar::new("paragraph")),
        Err(ToolbarError::DuplicateToolbar("paragraph".to_string()))
    );
}

#[test]
fn unknown_name_has_no_toolbar() {
    let registry = ToolbarRegistry::standard();
    assert!(registry.toolbar("blockquote").is_none());
}

#[test]
fn standard_table_toolbar_shows_only_inside_a_cell() {
    let registry = ToolbarRegistry::standard();
    let toolbar = registry.toolbar("table").unwrap();

    let inside = table_state();
    let visible = toolbar.visible_items(&inside);
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].name(), "insert_row");
    assert!(dry_run(&inside, &visible[0].click(&inside)));

    let outside = paragraph_state();
    assert!(toolbar.visible_items(&outside).is_empty());
}

#[test]
fn heading_item_is_active_on_its_own_level() {
    let registry = ToolbarRegistry::standard();
    let toolbar = registry.toolbar("paragraph").unwrap();
    let h1 = toolbar.item("heading_1").unwrap();
    let h2 = toolbar.item("heading_2").unwrap();

    let mut attrs = Attrs::default();
    attrs.insert("level".to_string(), serde_json::json!(1));
    let state = EditorState::new(
        Document {
            children: vec![Node::Element(scribe_core::ElementNode {
                kind: "heading".to_string(),
                attrs,
                children: vec![Node::text("title", Marks::default())],
            })],
        },
        Selection::collapsed(Point::new(vec![0, 0], 0)),
    );

    assert!(h1.is_active(&state));
    assert!(!h2.is_active(&state));

    // Clicking the other level proposes a real change.
    assert!(dry_run(&state, &h2.click(&state)));
}
