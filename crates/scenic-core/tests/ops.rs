//! Operation Application Tests
//!
//! The add/update/remove/set/batch vocabulary against a live document,
//! including partial-failure reporting inside batches.

use scenic_core::document;
use scenic_core::ops::apply;
use scenic_core::EngineError;
use scenic_schema::{
    CameraPatch, Easing, GradientDef, GradientKind, Node, NodeKind, NodePatch, SceneDocument,
    SceneOp, StylePatch, TransformPatch, TweenDef,
};
use serde_json::{Map, Value};

fn doc() -> SceneDocument {
    SceneDocument::new(800.0, 600.0)
}

fn add(node: Node, parent_id: Option<&str>) -> SceneOp {
    SceneOp::Add {
        node,
        parent_id: parent_id.map(str::to_string),
    }
}

fn ok(results: &[Result<(), EngineError>]) -> bool {
    results.iter().all(Result::is_ok)
}

#[test]
fn add_appends_to_root_by_default() {
    let mut doc = doc();
    let results = apply(
        &mut doc,
        &add(Node::new("c1", NodeKind::Circle { radius: 5.0 }), None),
        0.0,
    );
    assert!(ok(&results));
    assert!(document::contains_id(&doc.root, "c1"));
    assert_eq!(document::parent_of(&doc.root, "c1").unwrap().id, doc.root.id);
}

#[test]
fn add_assigns_ids_for_the_whole_subtree() {
    let mut doc = doc();
    let mut group = Node::new("", NodeKind::Group { children: vec![] });
    group
        .children_mut()
        .unwrap()
        .push(Node::new("", NodeKind::Rect {
            width: 4.0,
            height: 4.0,
            corner_radius: 0.0,
        }));
    assert!(ok(&apply(&mut doc, &add(group, None), 0.0)));

    let added = &doc.root.children().unwrap()[0];
    assert!(added.id.starts_with("group-"));
    let child = &added.children().unwrap()[0];
    assert!(child.id.starts_with("rect-"));
    assert_ne!(added.id, child.id);
}

#[test]
fn add_rejects_duplicate_ids() {
    let mut doc = doc();
    assert!(ok(&apply(
        &mut doc,
        &add(Node::new("c1", NodeKind::Circle { radius: 5.0 }), None),
        0.0,
    )));
    let results = apply(
        &mut doc,
        &add(Node::new("c1", NodeKind::Circle { radius: 9.0 }), None),
        0.0,
    );
    assert!(matches!(results[0], Err(EngineError::DuplicateId(_))));
    // The first node is untouched.
    assert_eq!(doc.root.children().unwrap().len(), 1);
}

#[test]
fn add_requires_an_existing_group_parent() {
    let mut doc = doc();
    assert!(ok(&apply(
        &mut doc,
        &add(Node::new("c1", NodeKind::Circle { radius: 5.0 }), None),
        0.0,
    )));

    let orphan = add(Node::new("x", NodeKind::Circle { radius: 1.0 }), Some("nope"));
    assert!(matches!(
        apply(&mut doc, &orphan, 0.0)[0],
        Err(EngineError::ParentNotFound(_))
    ));

    let leaf_parent = add(Node::new("y", NodeKind::Circle { radius: 1.0 }), Some("c1"));
    assert!(matches!(
        apply(&mut doc, &leaf_parent, 0.0)[0],
        Err(EngineError::ParentNotGroup(_))
    ));
}

#[test]
fn update_merges_partially() {
    let mut doc = doc();
    let mut node = Node::new("c1", NodeKind::Circle { radius: 5.0 });
    node.transform.rotation = 0.5;
    node.style.fill = Some("#f00".to_string());
    node.data.insert("kept".to_string(), Value::from(true));
    assert!(ok(&apply(&mut doc, &add(node, None), 0.0)));

    let mut data = Map::new();
    data.insert("mood".to_string(), Value::from("calm"));
    let update = SceneOp::Update {
        node_id: "c1".to_string(),
        patch: NodePatch {
            transform: Some(TransformPatch {
                x: Some(10.0),
                ..Default::default()
            }),
            style: Some(StylePatch {
                opacity: Some(0.5),
                ..Default::default()
            }),
            data: Some(data),
            ..Default::default()
        },
    };
    assert!(ok(&apply(&mut doc, &update, 0.0)));

    let node = document::find_node(&doc.root, "c1").unwrap();
    assert_eq!(node.transform.x, 10.0);
    // Untouched fields survive the merge.
    assert_eq!(node.transform.rotation, 0.5);
    assert_eq!(node.style.fill.as_deref(), Some("#f00"));
    assert_eq!(node.style.opacity, Some(0.5));
    assert_eq!(node.data.get("kept"), Some(&Value::from(true)));
    assert_eq!(node.data.get("mood"), Some(&Value::from("calm")));
}

#[test]
fn update_arms_a_provided_tween() {
    let mut doc = doc();
    assert!(ok(&apply(
        &mut doc,
        &add(Node::new("c1", NodeKind::Circle { radius: 5.0 }), None),
        0.0,
    )));

    let update = SceneOp::Update {
        node_id: "c1".to_string(),
        patch: NodePatch {
            tween: Some(TweenDef {
                property: "transform.x".to_string(),
                from: 0.0,
                to: 100.0,
                duration_ms: 1000.0,
                easing: Easing::Linear,
                delay_ms: 0.0,
                repeat: 0,
                yoyo: false,
                started_at: None,
            }),
            ..Default::default()
        },
    };
    assert!(ok(&apply(&mut doc, &update, 777.0)));
    let tween = document::find_node(&doc.root, "c1").unwrap().tween.clone();
    assert_eq!(tween.unwrap().started_at, Some(777.0));
}

#[test]
fn update_missing_node_fails() {
    let mut doc = doc();
    let update = SceneOp::Update {
        node_id: "ghost".to_string(),
        patch: NodePatch::default(),
    };
    assert!(matches!(
        apply(&mut doc, &update, 0.0)[0],
        Err(EngineError::NodeNotFound(_))
    ));
}

#[test]
fn remove_takes_whole_subtrees_and_tolerates_missing_ids() {
    let mut doc = doc();
    let mut group = Node::new("a", NodeKind::Group { children: vec![] });
    group
        .children_mut()
        .unwrap()
        .push(Node::new("b", NodeKind::Circle { radius: 1.0 }));
    assert!(ok(&apply(&mut doc, &add(group, None), 0.0)));

    let remove = SceneOp::Remove {
        node_ids: vec!["a".to_string(), "never-existed".to_string()],
        clear: false,
    };
    assert!(ok(&apply(&mut doc, &remove, 0.0)));
    assert!(!document::contains_id(&doc.root, "a"));
    assert!(!document::contains_id(&doc.root, "b"));
}

#[test]
fn remove_refuses_the_root_but_clear_empties_it() {
    let mut doc = doc();
    assert!(ok(&apply(
        &mut doc,
        &add(Node::new("c1", NodeKind::Circle { radius: 5.0 }), None),
        0.0,
    )));

    let root_id = doc.root.id.clone();
    let remove_root = SceneOp::Remove {
        node_ids: vec![root_id],
        clear: false,
    };
    assert!(matches!(
        apply(&mut doc, &remove_root, 0.0)[0],
        Err(EngineError::RootRemoval)
    ));
    assert!(document::contains_id(&doc.root, "c1"));

    let clear = SceneOp::Remove {
        node_ids: vec![],
        clear: true,
    };
    assert!(ok(&apply(&mut doc, &clear, 0.0)));
    assert!(doc.root.children().unwrap().is_empty());
}

#[test]
fn set_updates_scene_fields_and_upserts_gradients() {
    let mut doc = doc();
    let set = SceneOp::Set {
        background: Some("#013".to_string()),
        camera: Some(CameraPatch {
            zoom: Some(-3.0),
            x: Some(40.0),
            ..Default::default()
        }),
        gradient: Some(GradientDef {
            id: "sky".to_string(),
            kind: GradientKind::Linear {
                from: [0.0, 0.0],
                to: [0.0, 1.0],
            },
            stops: vec![],
        }),
        width: Some(1024.0),
        height: None,
    };
    assert!(ok(&apply(&mut doc, &set, 0.0)));
    assert_eq!(doc.background.as_deref(), Some("#013"));
    assert_eq!(doc.camera.x, 40.0);
    // Zoom is clamped positive.
    assert!(doc.camera.zoom > 0.0);
    assert_eq!(doc.width, 1024.0);
    assert_eq!(doc.height, 600.0);
    assert_eq!(doc.gradients.len(), 1);

    // Same gradient id replaces rather than duplicates.
    let again = SceneOp::Set {
        background: None,
        camera: None,
        gradient: Some(GradientDef {
            id: "sky".to_string(),
            kind: GradientKind::Radial {
                center: [0.5, 0.5],
                radius: 0.7,
            },
            stops: vec![],
        }),
        width: None,
        height: None,
    };
    assert!(ok(&apply(&mut doc, &again, 0.0)));
    assert_eq!(doc.gradients.len(), 1);
    assert!(matches!(doc.gradients[0].kind, GradientKind::Radial { .. }));
}

#[test]
fn batch_reports_each_result_and_never_aborts() {
    let mut doc = doc();
    let batch = SceneOp::Batch {
        ops: vec![
            SceneOp::Update {
                node_id: "missing".to_string(),
                patch: NodePatch::default(),
            },
            SceneOp::Set {
                background: Some("#222".to_string()),
                camera: None,
                gradient: None,
                width: None,
                height: None,
            },
        ],
    };
    let results = apply(&mut doc, &batch, 0.0);
    assert_eq!(results.len(), 2);
    assert!(results[0].is_err());
    assert!(results[1].is_ok());
    // The failing sub-op did not block the later one.
    assert_eq!(doc.background.as_deref(), Some("#222"));
}

#[test]
fn nested_batches_flatten_in_order() {
    let mut doc = doc();
    let batch = SceneOp::Batch {
        ops: vec![
            add(Node::new("a", NodeKind::Circle { radius: 1.0 }), None),
            SceneOp::Batch {
                ops: vec![
                    add(Node::new("b", NodeKind::Circle { radius: 1.0 }), None),
                    SceneOp::Remove {
                        node_ids: vec!["a".to_string()],
                        clear: false,
                    },
                ],
            },
        ],
    };
    let results = apply(&mut doc, &batch, 0.0);
    assert_eq!(results.len(), 3);
    assert!(ok(&results));
    assert!(!document::contains_id(&doc.root, "a"));
    assert!(document::contains_id(&doc.root, "b"));
}
