use crate::common::{
    ServerAction, break_payload, default_behavior, instance_payload, start_session,
};
use hgdb::debugger::Error;
use serde_json::json;
use std::collections::HashMap;

#[test]
fn test_evaluate_in_breakpoint_scope() {
    let (server, debugger, _info) = start_session(|kind, payload| {
        if kind == "evaluation" {
            assert_eq!(payload["expression"], "1 + a");
            assert_eq!(payload["breakpoint_id"], "4");
            return ServerAction::Reply(json!({"result": "2"}));
        }
        default_behavior(kind, payload).expect("unexpected request")
    });

    server.push_break(break_payload(
        1,
        vec![instance_payload(1, 4, json!({"a": "1"}))],
    ));
    debugger.wait_for_stop().unwrap();

    assert_eq!(debugger.evaluate("1 + a").unwrap(), "2");
}

#[test]
fn test_set_value_round_trip() {
    // The scripted runtime keeps one variable; `set-value` writes it,
    // evaluation adds one to it.
    let mut value: HashMap<String, i64> = HashMap::new();
    let (server, debugger, _info) = start_session(move |kind, payload| {
        match kind {
            "set-value" => {
                let name = payload["var_name"].as_str().unwrap().to_string();
                value.insert(name, payload["value"].as_i64().unwrap());
                ServerAction::Reply(json!({}))
            }
            "evaluation" => {
                let result = 1 + value.get("a").copied().unwrap_or(0);
                ServerAction::Reply(json!({"result": result.to_string()}))
            }
            _ => default_behavior(kind, payload).expect("unexpected request"),
        }
    });

    server.push_break(break_payload(
        1,
        vec![instance_payload(1, 4, json!({"a": "1"}))],
    ));
    debugger.wait_for_stop().unwrap();

    debugger.set_value("a", 42).unwrap();
    assert!(debugger.is_set_overridden("a"));

    debugger.continue_execution().unwrap();
    server.push_break(break_payload(
        2,
        vec![instance_payload(1, 4, json!({"a": "42"}))],
    ));
    debugger.wait_for_stop().unwrap();

    // Overrides are forgotten at the new break.
    assert!(!debugger.is_set_overridden("a"));
    assert_eq!(debugger.evaluate("1 + a").unwrap(), "43");
}

#[test]
fn test_set_value_requires_active_scope() {
    let (_server, debugger, _info) = start_session(|kind, payload| {
        default_behavior(kind, payload).expect("unexpected request")
    });

    assert!(matches!(
        debugger.set_value("a", 1),
        Err(Error::NoActiveScope)
    ));
}

#[test]
fn test_evaluation_without_result_is_protocol_error() {
    let (server, debugger, _info) = start_session(|kind, payload| {
        if kind == "evaluation" {
            return ServerAction::Reply(json!({}));
        }
        default_behavior(kind, payload).expect("unexpected request")
    });

    server.push_break(break_payload(
        1,
        vec![instance_payload(1, 4, json!({}))],
    ));
    debugger.wait_for_stop().unwrap();

    assert!(matches!(
        debugger.evaluate("a"),
        Err(Error::EvaluationProtocol)
    ));
}

#[test]
fn test_request_error_does_not_poison_session() {
    let (server, debugger, _info) = start_session(|kind, payload| {
        if kind == "evaluation" {
            let expr = payload["expression"].as_str().unwrap();
            if expr == "bogus" {
                return ServerAction::Error("unknown symbol".to_string());
            }
            return ServerAction::Reply(json!({"result": "7"}));
        }
        default_behavior(kind, payload).expect("unexpected request")
    });

    server.push_break(break_payload(
        1,
        vec![instance_payload(1, 4, json!({}))],
    ));
    debugger.wait_for_stop().unwrap();

    assert!(matches!(
        debugger.evaluate("bogus"),
        Err(Error::Request(reason)) if reason == "unknown symbol"
    ));
    // The session keeps working after a rejected request.
    assert_eq!(debugger.evaluate("7").unwrap(), "7");
}
