//! Test doubles: a scripted hgdb runtime behind a real WebSocket, and an
//! event hook that records stop notifications.

use std::collections::VecDeque;
use std::net::TcpListener;
use std::sync::mpsc::{Sender, TryRecvError, channel};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::{Value, json};
use tungstenite::Message;

use hgdb::debugger::{
    ConnectConfig, Debugger, DebuggerBuilder, EventHook, StopContext, StoppedInstance,
};

/// What the scripted server does with one client request.
pub enum ServerAction {
    /// Reply `status: success` with this payload.
    Reply(Value),
    /// Reply `status: error` with this reason.
    Error(String),
    /// Send nothing back.
    Ignore,
}

/// A fake hgdb runtime: accepts one WebSocket client and answers requests
/// through a caller-provided behavior function. Break events are pushed
/// from the test body via [`MockServer::push_break`].
pub struct MockServer {
    pub port: u16,
    push_tx: Sender<Value>,
}

impl MockServer {
    pub fn start<F>(mut behavior: F) -> MockServer
    where
        F: FnMut(&str, &Value) -> ServerAction + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        let port = listener.local_addr().expect("local addr").port();
        let (push_tx, push_rx) = channel::<Value>();

        thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept debugger client");
            let mut socket = tungstenite::accept(stream).expect("websocket handshake");
            socket
                .get_ref()
                .set_read_timeout(Some(Duration::from_millis(10)))
                .expect("set timeout");

            loop {
                match push_rx.try_recv() {
                    Ok(event) => {
                        let frame = json!({
                            "type": "breakpoint",
                            "status": "success",
                            "payload": event,
                        });
                        if socket.send(Message::Text(frame.to_string().into())).is_err() {
                            return;
                        }
                    }
                    Err(TryRecvError::Empty) => {}
                    Err(TryRecvError::Disconnected) => return,
                }

                let msg = match socket.read() {
                    Ok(msg) => msg,
                    Err(tungstenite::Error::Io(e))
                        if e.kind() == std::io::ErrorKind::WouldBlock
                            || e.kind() == std::io::ErrorKind::TimedOut =>
                    {
                        continue;
                    }
                    Err(_) => return,
                };

                let Message::Text(text) = msg else { continue };
                let request: Value = serde_json::from_str(text.as_ref()).expect("request json");
                let kind = request["type"].as_str().unwrap_or_default().to_string();
                let token = request["token"].clone();
                let payload = request
                    .get("payload")
                    .cloned()
                    .unwrap_or(Value::Null);

                let response = match behavior(&kind, &payload) {
                    ServerAction::Reply(payload) => json!({
                        "type": kind,
                        "token": token,
                        "status": "success",
                        "payload": payload,
                    }),
                    ServerAction::Error(reason) => json!({
                        "token": token,
                        "status": "error",
                        "payload": {"reason": reason},
                    }),
                    ServerAction::Ignore => continue,
                };
                if socket
                    .send(Message::Text(response.to_string().into()))
                    .is_err()
                {
                    return;
                }
            }
        });

        MockServer { port, push_tx }
    }

    /// Push a server-initiated break event.
    pub fn push_break(&self, payload: Value) {
        self.push_tx.send(payload).expect("mock server is gone");
    }
}

/// Default answers for the requests every session performs.
pub fn default_behavior(kind: &str, _payload: &Value) -> Option<ServerAction> {
    match kind {
        "connection" => Some(ServerAction::Reply(json!({}))),
        "debugger-info" => Some(ServerAction::Reply(json!({
            "filenames": ["/tmp/test.py", "/tmp/other.py"]
        }))),
        "breakpoint" | "breakpoint-id" | "command" | "data-breakpoint" => {
            Some(ServerAction::Reply(json!({})))
        }
        _ => None,
    }
}

/// One break-event payload with a single instance.
pub fn break_payload(line_num: u64, instances: Vec<Value>) -> Value {
    json!({
        "filename": "/tmp/test.py",
        "line_num": line_num,
        "column_num": 0,
        "time": 100,
        "instances": instances,
    })
}

pub fn instance_payload(instance_id: u64, breakpoint_id: u64, local: Value) -> Value {
    json!({
        "instance_id": instance_id,
        "instance_name": format!("mod{instance_id}"),
        "breakpoint_id": breakpoint_id,
        "namespace_id": 0,
        "bp_type": "normal",
        "local": local,
        "generator": {},
    })
}

#[derive(Debug, Clone)]
pub struct StopRecord {
    pub reason: String,
    pub instance_id: u64,
    pub filename: String,
    pub line_num: u64,
}

/// Hook recording every stop notification, the test bodies assert on it.
#[derive(Clone, Default)]
pub struct StopInfo {
    records: Arc<Mutex<VecDeque<StopRecord>>>,
}

impl StopInfo {
    pub fn take(&self) -> Vec<StopRecord> {
        self.records.lock().unwrap().drain(..).collect()
    }
}

pub struct TestHook {
    info: StopInfo,
}

impl TestHook {
    pub fn new(info: StopInfo) -> Self {
        Self { info }
    }
}

impl EventHook for TestHook {
    fn on_stop(&self, context: &StopContext, instance: &StoppedInstance) -> anyhow::Result<()> {
        self.info.records.lock().unwrap().push_back(StopRecord {
            reason: format!("{:?}", context.reason),
            instance_id: instance.instance_id,
            filename: context.filename.clone(),
            line_num: context.line_num,
        });
        Ok(())
    }
}

/// Spin up a session against a scripted server.
pub fn start_session<F>(behavior: F) -> (MockServer, Debugger, StopInfo)
where
    F: FnMut(&str, &Value) -> ServerAction + Send + 'static,
{
    let server = MockServer::start(behavior);
    let info = StopInfo::default();
    let config = ConnectConfig {
        host: "127.0.0.1".to_string(),
        port: server.port,
        db_filename: Some("/tmp/debug.db".to_string()),
        path_mapping: Default::default(),
    };
    let debugger = DebuggerBuilder::new()
        .with_hooks(TestHook::new(info.clone()))
        .start(&config)
        .expect("start debug session");
    (server, debugger, info)
}
