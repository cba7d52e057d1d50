use crate::common::{break_payload, default_behavior, instance_payload, start_session};
use hgdb::debugger::variable::VarNode;
use serde_json::json;

#[test]
fn test_indexed_names_become_arrays() {
    let (server, debugger, _info) = start_session(|kind, payload| {
        default_behavior(kind, payload).expect("unexpected request")
    });

    server.push_break(break_payload(
        1,
        vec![instance_payload(
            1,
            0,
            json!({"a[0][0]": "1", "a[0][1]": "2"}),
        )],
    ));
    debugger.wait_for_stop().unwrap();

    let tree = debugger.local_tree().unwrap();
    assert!(matches!(tree.lookup("a"), Some(VarNode::Array(_))));
    assert!(matches!(tree.lookup("a.0"), Some(VarNode::Array(_))));
    assert_eq!(tree.lookup("a.0.0").unwrap().to_string(), "1");
    assert_eq!(tree.lookup("a.0.1").unwrap().to_string(), "2");
}

#[test]
fn test_nested_objects_from_flat_names() {
    let (server, debugger, _info) = start_session(|kind, payload| {
        default_behavior(kind, payload).expect("unexpected request")
    });

    server.push_break(break_payload(
        1,
        vec![instance_payload(
            1,
            0,
            json!({"cfg.width": "8", "cfg.depth": "16", "valid": "1"}),
        )],
    ));
    debugger.wait_for_stop().unwrap();

    let tree = debugger.local_tree().unwrap();
    assert!(matches!(tree.lookup("cfg"), Some(VarNode::Object(_))));
    assert_eq!(tree.lookup("cfg.width").unwrap().to_string(), "8");
    assert_eq!(tree.lookup("cfg.depth").unwrap().to_string(), "16");
    assert_eq!(tree.lookup("valid").unwrap().to_string(), "1");
}

#[test]
fn test_every_reported_instance_has_frames() {
    let (server, debugger, _info) = start_session(|kind, payload| {
        default_behavior(kind, payload).expect("unexpected request")
    });

    server.push_break(break_payload(
        1,
        vec![
            instance_payload(1, 0, json!({"a": "1"})),
            instance_payload(2, 0, json!({"a": "2"})),
        ],
    ));
    debugger.wait_for_stop().unwrap();

    for (id, _, _) in debugger.instances() {
        let frames = debugger.instance_frames(id).expect("frames exist");
        assert!(!frames.instance_name.is_empty());
        assert_eq!(frames.scopes.len(), 1);
        assert!(frames.top_scope().unwrap().local.contains_key("a"));
    }
    assert!(debugger.instance_frames(99).is_none());
}

#[test]
fn test_repeated_instance_builds_stack() {
    let (server, debugger, _info) = start_session(|kind, payload| {
        default_behavior(kind, payload).expect("unexpected request")
    });

    server.push_break(break_payload(
        1,
        vec![
            instance_payload(1, 0, json!({"depth": "0"})),
            instance_payload(1, 0, json!({"depth": "1"})),
            instance_payload(1, 0, json!({"depth": "2"})),
        ],
    ));
    debugger.wait_for_stop().unwrap();

    let frames = debugger.instance_frames(1).unwrap();
    assert_eq!(frames.scopes.len(), 3);
    assert_eq!(frames.scopes[0].local.get("depth"), Some(&"0".to_string()));
    assert_eq!(
        frames.top_scope().unwrap().local.get("depth"),
        Some(&"2".to_string())
    );
}
