use crate::common::{
    ServerAction, break_payload, default_behavior, instance_payload, start_session,
};
use hgdb::debugger::{Error, StopEvent};
use serde_json::json;

#[test]
fn test_verify_continue_hit() {
    let (server, mut debugger, info) = start_session(|kind, payload| {
        if kind == "bp-location" {
            assert_eq!(payload["filename"], "/tmp/test.py");
            assert_eq!(payload["line_num"], 1);
            return ServerAction::Reply(json!([{"id": 0, "line_num": 1, "column_num": 0}]));
        }
        default_behavior(kind, payload).expect("unexpected request")
    });

    let verified = debugger
        .verify_breakpoints("/tmp/test.py", 1, None)
        .unwrap();
    assert_eq!(verified.len(), 1);
    assert_eq!(verified[0].id, 0);
    assert_eq!(verified[0].line_num, 1);
    assert!(verified[0].valid);
    debugger.set_breakpoint_by_id(0, None).unwrap();

    debugger.continue_execution().unwrap();
    server.push_break(break_payload(
        1,
        vec![instance_payload(1, 0, json!({"a": "1"}))],
    ));
    assert_eq!(debugger.wait_for_stop().unwrap(), StopEvent::Break);

    let stops = info.take();
    assert_eq!(stops.len(), 1);
    assert_eq!(stops[0].reason, "Breakpoint");
    assert_eq!(stops[0].instance_id, 1);
    assert_eq!(stops[0].filename, "/tmp/test.py");
    assert_eq!(stops[0].line_num, 1);

    let tree = debugger.local_tree().unwrap();
    assert_eq!(tree.lookup("a").unwrap().to_string(), "1");
}

#[test]
fn test_clear_file_filters_table() {
    let (_server, mut debugger, _info) = start_session(|kind, payload| {
        if kind == "bp-location" {
            let line = payload["line_num"].as_u64().unwrap();
            return ServerAction::Reply(
                json!([{"id": line, "line_num": line, "column_num": 0}]),
            );
        }
        default_behavior(kind, payload).expect("unexpected request")
    });

    debugger.verify_breakpoints("/tmp/test.py", 1, None).unwrap();
    debugger.verify_breakpoints("/tmp/test.py", 2, None).unwrap();
    debugger
        .verify_breakpoints("/tmp/other.py", 3, None)
        .unwrap();
    assert_eq!(debugger.breakpoints().count(), 3);

    let removed = debugger.clear_file("/tmp/test.py").unwrap();
    assert_eq!(removed.len(), 2);
    assert!(
        debugger
            .breakpoints()
            .all(|bp| bp.filename == "/tmp/other.py")
    );
}

#[test]
fn test_remove_by_id() {
    let (_server, mut debugger, _info) = start_session(|kind, payload| {
        if kind == "bp-location" {
            return ServerAction::Reply(json!([{"id": 7, "line_num": 1, "column_num": 0}]));
        }
        default_behavior(kind, payload).expect("unexpected request")
    });

    debugger.verify_breakpoints("/tmp/test.py", 1, None).unwrap();
    debugger.remove_breakpoint(7).unwrap();
    assert_eq!(debugger.breakpoints().count(), 0);

    // An id the table never saw is rejected locally.
    assert!(matches!(
        debugger.remove_breakpoint(7),
        Err(Error::BreakpointNotFound(7))
    ));
}

#[test]
fn test_verification_orders_by_column() {
    let (_server, mut debugger, _info) = start_session(|kind, payload| {
        if kind == "bp-location" {
            // The runtime reports matching locations in no particular order.
            return ServerAction::Reply(json!([
                {"id": 5, "line_num": 1, "column_num": 7},
                {"id": 6, "line_num": 1, "column_num": 2},
            ]));
        }
        default_behavior(kind, payload).expect("unexpected request")
    });

    let verified = debugger
        .verify_breakpoints("/tmp/test.py", 1, None)
        .unwrap();
    // The first entry is what the UI gets reported when it asked without a
    // column, so the lowest column must come first.
    let columns: Vec<u64> = verified.iter().map(|bp| bp.column_num).collect();
    assert_eq!(columns, vec![2, 7]);
    assert_eq!(verified[0].id, 6);
}

#[test]
fn test_breakpoint_locations_query() {
    let (_server, debugger, _info) = start_session(|kind, payload| {
        if kind == "bp-location" {
            return ServerAction::Reply(json!([
                {"id": 0, "line_num": 4, "column_num": 8},
                {"id": 1, "line_num": 4, "column_num": 4},
                {"id": 2, "line_num": 4, "column_num": 8},
            ]));
        }
        default_behavior(kind, payload).expect("unexpected request")
    });

    let columns = debugger.breakpoint_locations("/tmp/test.py", 4).unwrap();
    assert_eq!(columns, vec![4, 8]);
}

#[test]
fn test_verification_error_surfaces_reason() {
    let (_server, mut debugger, _info) = start_session(|kind, payload| {
        if kind == "bp-location" {
            return ServerAction::Error("no such line".to_string());
        }
        default_behavior(kind, payload).expect("unexpected request")
    });

    let err = debugger
        .verify_breakpoints("/tmp/test.py", 999, None)
        .unwrap_err();
    assert!(matches!(err, Error::Request(reason) if reason == "no such line"));
    assert_eq!(debugger.breakpoints().count(), 0);
}

#[test]
fn test_data_breakpoint_requires_known_instance() {
    let (server, mut debugger, _info) = start_session(|kind, payload| {
        default_behavior(kind, payload).expect("unexpected request")
    });

    // No break context yet: nothing to key the watch to.
    assert!(!debugger.validate_data_breakpoint(1, "a"));
    assert!(debugger.add_data_breakpoint(1, "a", None).is_err());

    server.push_break(break_payload(
        1,
        vec![instance_payload(1, 5, json!({"a": "1"}))],
    ));
    debugger.wait_for_stop().unwrap();

    assert!(debugger.validate_data_breakpoint(1, "a"));
    debugger.add_data_breakpoint(1, "a", Some("a == 2")).unwrap();
    assert_eq!(debugger.data_breakpoints().len(), 1);
    assert_eq!(debugger.data_breakpoints()[0].var_name, "a");

    debugger.clear_data_breakpoints().unwrap();
    assert!(debugger.data_breakpoints().is_empty());
}

#[test]
fn test_condition_commit() {
    let (_server, mut debugger, _info) = start_session(|kind, payload| {
        if kind == "bp-location" {
            return ServerAction::Reply(json!([{"id": 3, "line_num": 1, "column_num": 0}]));
        }
        if kind == "breakpoint-id" {
            assert_eq!(payload["action"], "add");
            if payload.get("condition").is_some() {
                assert_eq!(payload["condition"], "a > 1");
            }
            return ServerAction::Reply(json!({}));
        }
        default_behavior(kind, payload).expect("unexpected request")
    });

    debugger.verify_breakpoints("/tmp/test.py", 1, None).unwrap();
    debugger
        .set_breakpoint_by_id(3, Some("a > 1".to_string()))
        .unwrap();
    let bp = debugger.breakpoints().next().unwrap();
    assert_eq!(bp.condition.as_deref(), Some("a > 1"));
}
