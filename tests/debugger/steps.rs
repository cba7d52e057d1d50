use crate::common::{break_payload, default_behavior, instance_payload, start_session};
use hgdb::debugger::StopEvent;
use serde_json::json;

#[test]
fn test_step_over_switches_instances() {
    let (server, debugger, info) = start_session(|kind, payload| {
        default_behavior(kind, payload).expect("unexpected request")
    });

    server.push_break(break_payload(
        1,
        vec![instance_payload(1, 0, json!({"a": "1"}))],
    ));
    debugger.wait_for_stop().unwrap();
    assert!(debugger.instance_frames(1).is_some());

    debugger.step_over().unwrap();
    server.push_break(break_payload(
        2,
        vec![instance_payload(2, 1, json!({"b": "2"}))],
    ));
    assert_eq!(debugger.wait_for_stop().unwrap(), StopEvent::Break);

    // The previous instance is gone, the new one carries one scope.
    assert!(debugger.instance_frames(1).is_none());
    let frames = debugger.instance_frames(2).expect("instance 2 stopped");
    assert_eq!(frames.scopes.len(), 1);
    assert_eq!(
        frames.top_scope().unwrap().local.get("b"),
        Some(&"2".to_string())
    );

    let stops = info.take();
    assert_eq!(stops.len(), 2);
    assert_eq!(stops[1].instance_id, 2);
    assert_eq!(stops[1].line_num, 2);
}

#[test]
fn test_step_back_revisits_earlier_line() {
    let (server, debugger, _info) = start_session(|kind, payload| {
        default_behavior(kind, payload).expect("unexpected request")
    });

    debugger.continue_execution().unwrap();
    server.push_break(break_payload(
        5,
        vec![instance_payload(1, 3, json!({}))],
    ));
    debugger.wait_for_stop().unwrap();
    assert_eq!(debugger.stop_location().unwrap().1, 5);

    debugger.step_back().unwrap();
    server.push_break(break_payload(
        2,
        vec![instance_payload(1, 3, json!({}))],
    ));
    debugger.wait_for_stop().unwrap();
    assert_eq!(debugger.stop_location().unwrap().1, 2);
}

#[test]
fn test_multi_instance_fan_out() {
    let (server, debugger, info) = start_session(|kind, payload| {
        default_behavior(kind, payload).expect("unexpected request")
    });

    server.push_break(break_payload(
        1,
        vec![
            instance_payload(1, 0, json!({"a": "1"})),
            instance_payload(2, 0, json!({"a": "2"})),
            instance_payload(3, 0, json!({"a": "3"})),
        ],
    ));
    debugger.wait_for_stop().unwrap();

    // One stop notification per instance, in report order.
    let stops = info.take();
    let ids: Vec<u64> = stops.iter().map(|stop| stop.instance_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);

    assert_eq!(debugger.instances().len(), 3);
    assert_eq!(debugger.focused_instance(), Some(1));
}

#[test]
fn test_focus_follows_thread_switch() {
    let (server, mut debugger, _info) = start_session(|kind, payload| {
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

    debugger.focus_instance(2).unwrap();
    let tree = debugger.local_tree().unwrap();
    assert_eq!(tree.lookup("a").unwrap().to_string(), "2");

    // Focus resets to the first instance on the next break.
    server.push_break(break_payload(
        2,
        vec![
            instance_payload(1, 0, json!({"a": "10"})),
            instance_payload(2, 0, json!({"a": "20"})),
        ],
    ));
    debugger.wait_for_stop().unwrap();
    assert_eq!(debugger.focused_instance(), Some(1));
}
