//! Debugger session against a remote hgdb runtime.
//!
//! The [`Debugger`] owns the whole client side of a session: the WebSocket
//! transport, the token registry correlating responses to requests, the
//! breakpoint table and the last break context. Front-ends (the terminal
//! REPL and the DAP adapter) drive it through blocking operations and
//! observe the simulation through an [`EventHook`].
//!
//! Threading: the transport thread owns the socket, one event-loop thread
//! parses frames and resolves tokens / ingests break events, and the
//! front-end thread calls the operations below. Shared structures (token
//! registry, break state) sit behind mutexes touched only by those two
//! sides.

pub mod breakpoint;
pub mod error;
pub mod proto;
pub mod state;
pub mod transport;
pub mod variable;
mod filemap;

pub use breakpoint::{Breakpoint, BreakpointTable, DataBreakpoint};
pub use error::Error;
pub use filemap::{FilenameIndex, PathMapping, find_in_workspace};
pub use state::{BreakState, BreakpointKind, InstanceFrames, ScopeVars, StopReason};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::Value;

use proto::{Reply, Request, Response, Status, TokenSource};
use transport::{Transport, TransportEvent};
use variable::VarNode;

/// Where the simulation stopped, shared by every instance of one break.
#[derive(Debug, Clone)]
pub struct StopContext {
    pub reason: StopReason,
    /// Local (mapped) filename.
    pub filename: String,
    pub line_num: u64,
    pub column_num: u64,
    pub time: u64,
}

/// One hardware instance that hit the break. A break event fans out into
/// one notification per instance.
#[derive(Debug, Clone)]
pub struct StoppedInstance {
    /// Position in the server's report order, 0 for the first instance.
    pub index: usize,
    /// Composite instance id.
    pub instance_id: u64,
    pub instance_name: String,
    /// Composite breakpoint id the instance stopped on.
    pub breakpoint_id: u64,
}

/// Session observer. Implementations run on the event-loop thread and must
/// not call back into the [`Debugger`].
pub trait EventHook: Send + Sync {
    /// Called once per stopped instance of every break event.
    fn on_stop(&self, _context: &StopContext, _instance: &StoppedInstance) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called for every breakpoint the server verified.
    fn on_breakpoint_verified(&self, _breakpoint: &Breakpoint) {}

    /// Called when the connection drops mid-session (not on a local close).
    fn on_session_end(&self) {}
}

/// Hook that ignores all events.
pub struct NopHook;

impl EventHook for NopHook {}

/// What woke up a front-end blocked on [`Debugger::wait_for_stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopEvent {
    /// A break event was ingested, the break context is fresh.
    Break,
    /// The connection is gone.
    SessionEnded,
}

/// Connection parameters of one session.
#[derive(Debug, Clone, Default)]
pub struct ConnectConfig {
    pub host: String,
    pub port: u16,
    /// Symbol table to hand to the runtime; `None` when the runtime already
    /// loaded one (`--no-db-connection`).
    pub db_filename: Option<String>,
    pub path_mapping: PathMapping,
}

impl ConnectConfig {
    fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

type TokenRegistry = Arc<Mutex<HashMap<String, Sender<Reply>>>>;

/// Debugger session builder.
pub struct DebuggerBuilder<H: EventHook = NopHook> {
    hook: H,
    token_prefix: Option<String>,
}

impl DebuggerBuilder<NopHook> {
    pub fn new() -> Self {
        Self {
            hook: NopHook,
            token_prefix: None,
        }
    }
}

impl Default for DebuggerBuilder<NopHook> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: EventHook + 'static> DebuggerBuilder<H> {
    /// Attach an event hook, replacing the current one.
    pub fn with_hooks<NH: EventHook + 'static>(self, hook: NH) -> DebuggerBuilder<NH> {
        DebuggerBuilder {
            hook,
            token_prefix: self.token_prefix,
        }
    }

    /// Prefix for request tokens, so several adapters can share one server.
    pub fn with_token_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.token_prefix = Some(prefix.into());
        self
    }

    /// Connect to the runtime and perform the connection handshake. Fails
    /// with a user-visible reason when the socket cannot be opened or the
    /// runtime rejects the session.
    pub fn start(self, config: &ConnectConfig) -> Result<Debugger, Error> {
        let addr = config.addr();

        let (event_tx, event_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel();
        let (status_tx, status_rx) = mpsc::channel();

        let registry: TokenRegistry = Arc::new(Mutex::new(HashMap::new()));
        let break_state = Arc::new(Mutex::new(BreakState::default()));
        let hook: Arc<dyn EventHook> = Arc::new(self.hook);
        let closing = Arc::new(AtomicBool::new(false));
        let alive = Arc::new(AtomicBool::new(true));

        let transport = Transport::connect(&addr, event_tx);

        thread::spawn({
            let registry = Arc::clone(&registry);
            let break_state = Arc::clone(&break_state);
            let hook = Arc::clone(&hook);
            let closing = Arc::clone(&closing);
            let alive = Arc::clone(&alive);
            let path_mapping = config.path_mapping.clone();
            move || {
                event_loop(
                    event_rx,
                    registry,
                    break_state,
                    hook,
                    stop_tx,
                    status_tx,
                    closing,
                    alive,
                    path_mapping,
                )
            }
        });

        match status_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => return Err(Error::ConnectionFailure(addr, reason)),
            Err(_) => return Err(Error::SessionEnded),
        }

        let mut debugger = Debugger {
            transport,
            tokens: TokenSource::new(self.token_prefix),
            registry,
            break_state,
            hook,
            stop_rx,
            breakpoints: BreakpointTable::default(),
            watchpoints: Vec::new(),
            files: FilenameIndex::default(),
            path_mapping: config.path_mapping.clone(),
            closing,
            alive,
        };

        debugger.handshake(config)?;
        debugger.load_filenames();

        Ok(debugger)
    }
}

/// One live debug session.
pub struct Debugger {
    transport: Transport,
    tokens: TokenSource,
    registry: TokenRegistry,
    break_state: Arc<Mutex<BreakState>>,
    hook: Arc<dyn EventHook>,
    stop_rx: Receiver<StopEvent>,
    breakpoints: BreakpointTable,
    watchpoints: Vec<DataBreakpoint>,
    files: FilenameIndex,
    path_mapping: PathMapping,
    closing: Arc<AtomicBool>,
    /// Cleared by the event loop once the connection is gone; requests
    /// issued afterwards fail fast instead of waiting forever.
    alive: Arc<AtomicBool>,
}

impl Debugger {
    // --------------------------------- requests -------------------------------------------------

    /// Send one tokenized request and block until its response arrives.
    fn request(&self, kind: &'static str, payload: Value) -> Result<Value, Error> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(Error::SessionEnded);
        }

        let token = self.tokens.next_token();
        let (reply_tx, reply_rx) = mpsc::channel();
        self.registry
            .lock()
            .unwrap()
            .insert(token.clone(), reply_tx);

        self.transport
            .send(Request::new(kind, token.clone(), payload).to_frame());

        // The session may have died between the liveness check and the
        // registry insert; nobody would resolve the waiter then.
        if !self.alive.load(Ordering::SeqCst) {
            self.registry.lock().unwrap().remove(&token);
            return Err(Error::SessionEnded);
        }

        match reply_rx.recv() {
            Ok(Reply::Success(payload)) => Ok(payload),
            Ok(Reply::Error(reason)) => Err(Error::Request(reason)),
            Err(_) => {
                self.registry.lock().unwrap().remove(&token);
                Err(Error::SessionEnded)
            }
        }
    }

    fn request_with<T: serde::Serialize>(
        &self,
        kind: &'static str,
        payload: &T,
    ) -> Result<Value, Error> {
        let payload = serde_json::to_value(payload).expect("payload serialization is infallible");
        self.request(kind, payload)
    }

    fn handshake(&mut self, config: &ConnectConfig) -> Result<(), Error> {
        let payload = proto::ConnectionPayload {
            db_filename: config.db_filename.clone(),
            path_mapping: config.path_mapping.as_wire(),
        };
        self.request_with("connection", &payload)
            .map_err(|e| match e {
                Error::Request(reason) => Error::ConnectionRejected(reason),
                other => other,
            })?;
        Ok(())
    }

    /// Fetch the runtime's file list and build the filename index.
    /// Best-effort, an old runtime without the query still debugs fine.
    fn load_filenames(&mut self) {
        let payload = proto::InfoPayload {
            command: "filenames",
        };
        match self.request_with("debugger-info", &payload) {
            Ok(reply) => {
                let files: Vec<String> = reply
                    .get("filenames")
                    .and_then(Value::as_array)
                    .map(|names| {
                        names
                            .iter()
                            .filter_map(Value::as_str)
                            .map(ToString::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                self.files = FilenameIndex::new(files);
            }
            Err(e) => {
                log::warn!(target: "debugger", "filename list unavailable: {e}");
            }
        }
    }

    // --------------------------------- breakpoints ----------------------------------------------

    /// Verify a source location against the runtime. Every id the runtime
    /// reports lands in the breakpoint table and is announced through the
    /// hook; committing the ids is a separate step
    /// ([`Self::set_breakpoint_by_id`]).
    pub fn verify_breakpoints(
        &mut self,
        filename: &str,
        line_num: u64,
        column_num: Option<u64>,
    ) -> Result<Vec<Breakpoint>, Error> {
        let remote = self.path_mapping.to_remote(filename);
        let payload = proto::BpLocationPayload {
            filename: &remote,
            line_num,
            column_num,
        };
        let reply = self.request_with("bp-location", &payload)?;
        let mut locations: Vec<proto::BreakLocation> = serde_json::from_value(reply)?;
        // The first entry is what gets reported back to the UI when no
        // explicit column was requested; the runtime does not promise any
        // order.
        locations.sort_unstable_by_key(|location| (location.line_num, location.column_num));

        let mut verified = Vec::with_capacity(locations.len());
        for location in locations {
            let bp = Breakpoint {
                id: location.id,
                filename: remote.clone(),
                line_num: location.line_num,
                column_num: location.column_num,
                valid: true,
                condition: None,
            };
            self.breakpoints.insert(bp.clone());
            self.hook.on_breakpoint_verified(&bp);
            verified.push(bp);
        }
        Ok(verified)
    }

    /// Commit one verified id, optionally with a condition.
    pub fn set_breakpoint_by_id(
        &mut self,
        id: u64,
        condition: Option<String>,
    ) -> Result<(), Error> {
        let payload = proto::BreakpointIdPayload {
            id,
            action: "add",
            condition: condition.clone(),
        };
        self.request_with("breakpoint-id", &payload)?;
        self.breakpoints.set_condition(id, condition);
        Ok(())
    }

    pub fn remove_breakpoint(&mut self, id: u64) -> Result<(), Error> {
        if self.breakpoints.get(id).is_none() {
            return Err(Error::BreakpointNotFound(id));
        }
        let payload = proto::BreakpointIdPayload {
            id,
            action: "remove",
            condition: None,
        };
        self.request_with("breakpoint-id", &payload)?;
        self.breakpoints.remove(id);
        Ok(())
    }

    /// Remove every breakpoint in a file, returning the dropped ids.
    pub fn clear_file(&mut self, filename: &str) -> Result<Vec<u64>, Error> {
        let remote = self.path_mapping.to_remote(filename);
        let payload = proto::RemoveFilePayload {
            filename: &remote,
            action: "remove",
        };
        self.request_with("breakpoint", &payload)?;
        Ok(self.breakpoints.remove_file(&remote))
    }

    /// Columns the runtime can break on at `(filename, line)`. A plain
    /// query, nothing is installed.
    pub fn breakpoint_locations(&self, filename: &str, line_num: u64) -> Result<Vec<u64>, Error> {
        let remote = self.path_mapping.to_remote(filename);
        let payload = proto::BpLocationPayload {
            filename: &remote,
            line_num,
            column_num: None,
        };
        let reply = self.request_with("bp-location", &payload)?;
        let locations: Vec<proto::BreakLocation> = serde_json::from_value(reply)?;

        let mut columns: Vec<u64> = locations.iter().map(|l| l.column_num).collect();
        columns.sort_unstable();
        columns.dedup();
        Ok(columns)
    }

    pub fn breakpoints(&self) -> impl Iterator<Item = &Breakpoint> {
        self.breakpoints.iter()
    }

    // --------------------------------- data breakpoints ------------------------------------------

    /// Install a watch on an instance-scoped variable. The watch is keyed
    /// to the instance's current breakpoint id, so an instance absent from
    /// the break context cannot be watched.
    pub fn add_data_breakpoint(
        &mut self,
        instance_id: u64,
        var_name: &str,
        condition: Option<&str>,
    ) -> Result<(), Error> {
        let breakpoint_id = self
            .instance_breakpoint_id(instance_id)
            .ok_or(Error::InstanceNotFound(instance_id))?;
        let (_, raw_id) = proto::split_id(breakpoint_id);

        let payload = proto::DataBreakpointPayload {
            var_name,
            breakpoint_id: raw_id,
            action: "add",
            condition,
        };
        self.request_with("data-breakpoint", &payload)
            .map_err(|_| Error::WatchpointRejected(var_name.to_string()))?;

        self.watchpoints.push(DataBreakpoint {
            instance_id,
            var_name: var_name.to_string(),
            condition: condition.map(ToString::to_string),
        });
        Ok(())
    }

    /// Probe whether a variable is watchable in the given instance. Any
    /// non-error response from the runtime counts as valid.
    pub fn validate_data_breakpoint(&self, instance_id: u64, var_name: &str) -> bool {
        let Some(breakpoint_id) = self.instance_breakpoint_id(instance_id) else {
            return false;
        };
        let (_, raw_id) = proto::split_id(breakpoint_id);

        let payload = proto::DataBreakpointPayload {
            var_name,
            breakpoint_id: raw_id,
            action: "info",
            condition: None,
        };
        self.request_with("data-breakpoint", &payload).is_ok()
    }

    /// Drop every data breakpoint, client and server side.
    pub fn clear_data_breakpoints(&mut self) -> Result<(), Error> {
        let payload = proto::DataBreakpointPayload {
            var_name: "",
            breakpoint_id: 0,
            action: "clear",
            condition: None,
        };
        self.request_with("data-breakpoint", &payload)?;
        self.watchpoints.clear();
        Ok(())
    }

    pub fn data_breakpoints(&self) -> &[DataBreakpoint] {
        &self.watchpoints
    }

    fn instance_breakpoint_id(&self, instance_id: u64) -> Option<u64> {
        self.break_state
            .lock()
            .unwrap()
            .instance(instance_id)
            .map(|frames| frames.breakpoint_id)
    }

    // --------------------------------- execution flow -------------------------------------------

    pub fn continue_execution(&self) -> Result<(), Error> {
        self.command("continue")
    }

    pub fn step_over(&self) -> Result<(), Error> {
        self.command("step_over")
    }

    pub fn step_back(&self) -> Result<(), Error> {
        self.command("step_back")
    }

    pub fn reverse_continue(&self) -> Result<(), Error> {
        self.command("reverse_continue")
    }

    pub fn stop_simulation(&self) -> Result<(), Error> {
        self.command("stop")
    }

    fn command(&self, command: &'static str) -> Result<(), Error> {
        self.request_with("command", &proto::CommandPayload { command })?;
        Ok(())
    }

    /// Jump to an absolute simulation time. Replay mode only, the runtime
    /// rejects it during a live run.
    pub fn jump_to(&self, time: u64) -> Result<(), Error> {
        let payload = proto::JumpPayload {
            command: "jump",
            time,
        };
        self.request_with("command", &payload)?;
        Ok(())
    }

    /// Block until the next break event (or session end).
    pub fn wait_for_stop(&self) -> Result<StopEvent, Error> {
        Ok(self.stop_rx.recv()?)
    }

    /// Like [`Self::wait_for_stop`] but bounded, so callers can poll an
    /// interrupt flag between attempts.
    pub fn wait_for_stop_timeout(&self, timeout: Duration) -> Result<Option<StopEvent>, Error> {
        match self.stop_rx.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(Error::SessionEnded),
        }
    }

    // --------------------------------- evaluation -----------------------------------------------

    /// Evaluate an expression in the focused instance's breakpoint scope
    /// (or the global scope before the first stop).
    pub fn evaluate(&self, expression: &str) -> Result<String, Error> {
        let (breakpoint_id, namespace_id) = {
            let state = self.break_state.lock().unwrap();
            match state.focused() {
                Some((_, frames)) => (frames.breakpoint_id, Some(frames.namespace_id)),
                None => (0, None),
            }
        };
        self.evaluate_in(breakpoint_id, namespace_id, expression)
    }

    /// Evaluate against an explicit breakpoint scope. Both the breakpoint
    /// id and the namespace id are forwarded verbatim.
    pub fn evaluate_in(
        &self,
        breakpoint_id: u64,
        namespace_id: Option<u64>,
        expression: &str,
    ) -> Result<String, Error> {
        let (_, raw_id) = proto::split_id(breakpoint_id);
        let payload = proto::EvaluationPayload {
            breakpoint_id: raw_id.to_string(),
            expression,
            namespace_id,
        };
        let reply = self.request_with("evaluation", &payload)?;
        reply
            .get("result")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or(Error::EvaluationProtocol)
    }

    // --------------------------------- value updates --------------------------------------------

    /// `set` in the focused instance's breakpoint scope.
    pub fn set_value(&self, var_name: &str, value: i64) -> Result<(), Error> {
        let instance_id = self
            .break_state
            .lock()
            .unwrap()
            .focused()
            .map(|(id, _)| id)
            .ok_or(Error::NoActiveScope)?;
        self.set_value_local(instance_id, var_name, value)
    }

    /// Update a breakpoint-local variable of one instance.
    pub fn set_value_local(
        &self,
        instance_id: u64,
        var_name: &str,
        value: i64,
    ) -> Result<(), Error> {
        let breakpoint_id = self
            .instance_breakpoint_id(instance_id)
            .ok_or(Error::NoActiveScope)?;
        let (namespace_id, raw_id) = proto::split_id(breakpoint_id);

        let payload = proto::SetValuePayload {
            var_name,
            value,
            breakpoint_id: Some(raw_id),
            instance_id: None,
            namespace_id: Some(namespace_id),
        };
        self.request_with("set-value", &payload)?;

        self.break_state
            .lock()
            .unwrap()
            .set_values
            .insert(var_name.to_string());
        Ok(())
    }

    /// Update a generator (module-scope) variable of one instance.
    pub fn set_value_generator(
        &self,
        instance_id: u64,
        var_name: &str,
        value: i64,
    ) -> Result<(), Error> {
        let (namespace_id, raw_id) = proto::split_id(instance_id);
        let payload = proto::SetValuePayload {
            var_name,
            value,
            breakpoint_id: None,
            instance_id: Some(raw_id),
            namespace_id: Some(namespace_id),
        };
        self.request_with("set-value", &payload)?;

        self.break_state
            .lock()
            .unwrap()
            .set_values
            .insert(var_name.to_string());
        Ok(())
    }

    // --------------------------------- break context --------------------------------------------

    /// `(filename, line, column)` of the last break, filename already
    /// mapped to the local tree.
    pub fn stop_location(&self) -> Option<(String, u64, u64)> {
        let state = self.break_state.lock().unwrap();
        state
            .stopped
            .then(|| (state.filename.clone(), state.line_num, state.column_num))
    }

    pub fn simulation_time(&self) -> Option<u64> {
        let state = self.break_state.lock().unwrap();
        state.stopped.then_some(state.time)
    }

    /// `(composite id, name, kind)` of every instance in the current break.
    pub fn instances(&self) -> Vec<(u64, String, BreakpointKind)> {
        let state = self.break_state.lock().unwrap();
        state
            .instances
            .iter()
            .map(|(id, frames)| (*id, frames.instance_name.clone(), frames.kind))
            .collect()
    }

    pub fn instance_frames(&self, instance_id: u64) -> Option<InstanceFrames> {
        self.break_state
            .lock()
            .unwrap()
            .instance(instance_id)
            .cloned()
    }

    pub fn focused_instance(&self) -> Option<u64> {
        self.break_state
            .lock()
            .unwrap()
            .focused()
            .map(|(id, _)| id)
    }

    pub fn focus_instance(&mut self, instance_id: u64) -> Result<(), Error> {
        if self.break_state.lock().unwrap().focus(instance_id) {
            Ok(())
        } else {
            Err(Error::InstanceNotFound(instance_id))
        }
    }

    /// Variable tree of the focused instance's innermost scope.
    pub fn local_tree(&self) -> Option<VarNode> {
        let state = self.break_state.lock().unwrap();
        let (_, frames) = state.focused()?;
        frames
            .top_scope()
            .map(|scope| VarNode::from_flat(&scope.local))
    }

    pub fn is_set_overridden(&self, var_name: &str) -> bool {
        self.break_state
            .lock()
            .unwrap()
            .set_values
            .contains(var_name)
    }

    /// Read access to the raw break context, for front-ends that need more
    /// than the accessors above (the DAP variables machinery does).
    pub fn with_state<R>(&self, f: impl FnOnce(&BreakState) -> R) -> R {
        f(&self.break_state.lock().unwrap())
    }

    // --------------------------------- filenames ------------------------------------------------

    pub fn resolve_file(&self, name: &str) -> Option<String> {
        self.files.resolve(name).map(ToString::to_string)
    }

    pub fn display_file<'a>(&'a self, full_path: &'a str) -> &'a str {
        self.files.display(full_path)
    }

    pub fn known_files(&self) -> impl Iterator<Item = &str> {
        self.files.files()
    }

    pub fn path_mapping(&self) -> &PathMapping {
        &self.path_mapping
    }

    /// Close the session from our side. Idempotent; suppresses the
    /// session-end hook, the user asked for this.
    pub fn close(&self) {
        self.closing.store(true, Ordering::SeqCst);
        self.transport.close();
    }
}

// ------------------------------- event loop ------------------------------------------------------

#[allow(clippy::too_many_arguments)]
fn event_loop(
    events: Receiver<TransportEvent>,
    registry: TokenRegistry,
    break_state: Arc<Mutex<BreakState>>,
    hook: Arc<dyn EventHook>,
    stop_tx: Sender<StopEvent>,
    status_tx: Sender<Result<(), String>>,
    closing: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
    path_mapping: PathMapping,
) {
    let mut connect_status = Some(status_tx);

    for event in events {
        match event {
            TransportEvent::Connected => {
                if let Some(tx) = connect_status.take() {
                    _ = tx.send(Ok(()));
                }
            }
            TransportEvent::Failed(reason) => {
                match connect_status.take() {
                    Some(tx) => _ = tx.send(Err(reason)),
                    None => {
                        log::error!(target: "debugger", "transport failed: {reason}");
                        end_session(&registry, &hook, &stop_tx, &closing, &alive);
                    }
                }
                alive.store(false, Ordering::SeqCst);
                return;
            }
            TransportEvent::Closed => {
                end_session(&registry, &hook, &stop_tx, &closing, &alive);
                return;
            }
            TransportEvent::Message(text) => {
                dispatch_frame(&text, &registry, &break_state, &hook, &stop_tx, &path_mapping);
            }
        }
    }

    alive.store(false, Ordering::SeqCst);
}

fn dispatch_frame(
    text: &str,
    registry: &TokenRegistry,
    break_state: &Arc<Mutex<BreakState>>,
    hook: &Arc<dyn EventHook>,
    stop_tx: &Sender<StopEvent>,
    path_mapping: &PathMapping,
) {
    let response: Response = match serde_json::from_str(text) {
        Ok(response) => response,
        Err(e) => {
            log::error!(target: "debugger", "dropping malformed frame: {e}");
            return;
        }
    };

    // Break events win over token correlation: the server pushes them with
    // type `breakpoint` and no pending request.
    if response.kind.as_deref() == Some("breakpoint") && response.token.is_none() {
        handle_break_event(response, break_state, hook, stop_tx, path_mapping);
        return;
    }

    let Some(token) = &response.token else {
        log::debug!(target: "debugger", "dropping tokenless frame of type {:?}", response.kind);
        return;
    };

    // Unknown tokens (e.g. a response to a cancelled request) drop silently.
    let Some(waiter) = registry.lock().unwrap().remove(token) else {
        return;
    };

    let reply = match response.status {
        Status::Success => Reply::Success(response.payload),
        Status::Error => Reply::Error(response.reason()),
    };
    _ = waiter.send(reply);
}

fn handle_break_event(
    response: Response,
    break_state: &Arc<Mutex<BreakState>>,
    hook: &Arc<dyn EventHook>,
    stop_tx: &Sender<StopEvent>,
    path_mapping: &PathMapping,
) {
    let mut payload: proto::BreakEventPayload = match serde_json::from_value(response.payload) {
        Ok(payload) => payload,
        Err(e) => {
            log::error!(target: "debugger", "malformed break event: {e}");
            return;
        }
    };

    let Some(filename) = payload.filename.take() else {
        log::error!(target: "debugger", "break event without filename, ignored");
        return;
    };
    payload.filename = Some(path_mapping.to_local(&filename));

    let summary = break_state.lock().unwrap().ingest(payload);

    let context = StopContext {
        reason: summary.reason,
        filename: summary.filename,
        line_num: summary.line_num,
        column_num: summary.column_num,
        time: summary.time,
    };
    for (index, (instance_id, instance_name, breakpoint_id)) in
        summary.instances.into_iter().enumerate()
    {
        let instance = StoppedInstance {
            index,
            instance_id,
            instance_name,
            breakpoint_id,
        };
        if let Err(e) = hook.on_stop(&context, &instance) {
            log::error!(target: "debugger", "stop hook failed: {e}");
        }
    }

    _ = stop_tx.send(StopEvent::Break);
}

fn end_session(
    registry: &TokenRegistry,
    hook: &Arc<dyn EventHook>,
    stop_tx: &Sender<StopEvent>,
    closing: &AtomicBool,
    alive: &AtomicBool,
) {
    alive.store(false, Ordering::SeqCst);
    // Dropping the waiters fails every in-flight request with SessionEnded.
    registry.lock().unwrap().clear();

    if !closing.load(Ordering::SeqCst) {
        hook.on_session_end();
        _ = stop_tx.send(StopEvent::SessionEnded);
    }
}
