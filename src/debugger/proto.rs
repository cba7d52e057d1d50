//! Wire protocol of the hgdb runtime: JSON envelopes exchanged over one
//! WebSocket connection. Requests carry a session-unique token, responses
//! echo it back; the only server-initiated message is the `breakpoint`
//! break event, which carries no token.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Outbound request envelope.
#[derive(Debug, Serialize)]
pub struct Request {
    pub request: bool,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub token: String,
    pub payload: Value,
}

impl Request {
    pub fn new(kind: &'static str, token: String, payload: Value) -> Self {
        Self {
            request: true,
            kind,
            token,
            payload,
        }
    }

    pub fn to_frame(&self) -> String {
        serde_json::to_string(self).expect("request serialization is infallible")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Inbound envelope. `token` is absent on server-initiated messages,
/// `kind` is absent on some command acknowledgements.
#[derive(Debug, Deserialize)]
pub struct Response {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub token: Option<String>,
    pub status: Status,
    #[serde(default)]
    pub payload: Value,
}

impl Response {
    /// The error reason the server attached to a rejected request.
    pub fn reason(&self) -> String {
        self.payload
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or("unknown reason")
            .to_string()
    }
}

/// Resolution of one tokenized request.
#[derive(Debug)]
pub enum Reply {
    Success(Value),
    Error(String),
}

// ------------------------------- request payloads -----------------------------------------------

#[derive(Debug, Serialize)]
pub struct ConnectionPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_mapping: Option<HashMap<String, String>>,
}

#[derive(Debug, Serialize)]
pub struct BpLocationPayload<'a> {
    pub filename: &'a str,
    pub line_num: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_num: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct RemoveFilePayload<'a> {
    pub filename: &'a str,
    pub action: &'static str,
}

#[derive(Debug, Serialize)]
pub struct BreakpointIdPayload {
    pub id: u64,
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DataBreakpointPayload<'a> {
    pub var_name: &'a str,
    #[serde(rename = "breakpoint-id")]
    pub breakpoint_id: u64,
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct CommandPayload {
    pub command: &'static str,
}

#[derive(Debug, Serialize)]
pub struct InfoPayload {
    pub command: &'static str,
}

#[derive(Debug, Serialize)]
pub struct EvaluationPayload<'a> {
    pub breakpoint_id: String,
    pub expression: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_id: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct SetValuePayload<'a> {
    pub var_name: &'a str,
    pub value: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakpoint_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_id: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct JumpPayload {
    pub command: &'static str,
    pub time: u64,
}

// ------------------------------- response payloads ----------------------------------------------

/// One verified breakpoint location returned by a `bp-location` request.
#[derive(Debug, Deserialize)]
pub struct BreakLocation {
    pub id: u64,
    pub line_num: u64,
    #[serde(default)]
    pub column_num: u64,
}

/// Body of the server-initiated `breakpoint` message.
#[derive(Debug, Deserialize)]
pub struct BreakEventPayload {
    pub filename: Option<String>,
    #[serde(default)]
    pub line_num: u64,
    #[serde(default)]
    pub column_num: u64,
    #[serde(default)]
    pub time: u64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub instances: Vec<InstancePayload>,
}

#[derive(Debug, Deserialize)]
pub struct InstancePayload {
    pub instance_id: u64,
    #[serde(default)]
    pub instance_name: String,
    pub breakpoint_id: u64,
    #[serde(default)]
    pub namespace_id: u64,
    #[serde(default = "default_bp_type")]
    pub bp_type: String,
    #[serde(default)]
    pub local: HashMap<String, String>,
    #[serde(default)]
    pub generator: HashMap<String, String>,
}

fn default_bp_type() -> String {
    "normal".to_string()
}

// ------------------------------- tokens & packed ids --------------------------------------------

/// Session-wide token generator: a monotonic counter rendered as decimal,
/// optionally prefixed so several adapters can share one server.
pub struct TokenSource {
    prefix: Option<String>,
    counter: AtomicU64,
}

impl TokenSource {
    pub fn new(prefix: Option<String>) -> Self {
        Self {
            prefix,
            counter: AtomicU64::new(0),
        }
    }

    pub fn next_token(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        match &self.prefix {
            Some(prefix) => format!("{prefix}{n}"),
            None => n.to_string(),
        }
    }
}

/// The server namespaces instance and breakpoint ids per compilation unit.
/// Both halves travel as one integer inside the adapter; the raw id lives in
/// the lower 32 bits. Values stay far below 2^53 in practice, so the packed
/// form survives a trip through any JSON front-end.
pub fn compose_id(namespace_id: u64, raw_id: u64) -> u64 {
    (namespace_id << 32) | (raw_id & 0xFFFF_FFFF)
}

/// Inverse of [`compose_id`]: `(namespace_id, raw_id)`.
pub fn split_id(id: u64) -> (u64, u64) {
    (id >> 32, id & 0xFFFF_FFFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_sequence() {
        let tokens = TokenSource::new(None);
        assert_eq!(tokens.next_token(), "0");
        assert_eq!(tokens.next_token(), "1");

        let tokens = TokenSource::new(Some("vscode-".to_string()));
        assert_eq!(tokens.next_token(), "vscode-0");
        assert_eq!(tokens.next_token(), "vscode-1");
    }

    #[test]
    fn test_id_composition_round_trip() {
        for namespace_id in [0u64, 1, 2, 0xFFFF, 0xF_FFFF] {
            for raw_id in [0u64, 1, 42, 0xFFFF_FFFF] {
                let id = compose_id(namespace_id, raw_id);
                assert_eq!(split_id(id), (namespace_id, raw_id));
            }
        }
    }

    #[test]
    fn test_request_envelope_shape() {
        let req = Request::new(
            "evaluation",
            "12".to_string(),
            serde_json::json!({"expression": "a + 1"}),
        );
        let frame: Value = serde_json::from_str(&req.to_frame()).unwrap();
        assert_eq!(frame["request"], Value::Bool(true));
        assert_eq!(frame["type"], "evaluation");
        assert_eq!(frame["token"], "12");
        assert_eq!(frame["payload"]["expression"], "a + 1");
    }

    #[test]
    fn test_error_reason_extraction() {
        let resp: Response = serde_json::from_str(
            r#"{"status": "error", "token": "3", "payload": {"reason": "no such breakpoint"}}"#,
        )
        .unwrap();
        assert_eq!(resp.status, Status::Error);
        assert_eq!(resp.reason(), "no such breakpoint");
    }
}
