mod hook;
mod logger;
mod server;
mod variable;

use std::collections::HashSet;
use std::net::TcpStream;

use dap::events::Event;
use dap::requests::{Command, Request};
use dap::responses::{
    BreakpointLocationsResponse, ContinueResponse, DataBreakpointInfoResponse, EvaluateResponse,
    ResponseBody, ScopesResponse, SetBreakpointsResponse, SetDataBreakpointsResponse,
    SetVariableResponse, StackTraceResponse, ThreadsResponse, VariablesResponse,
};
use dap::types::{
    Breakpoint, BreakpointLocation, Capabilities, Scope, ScopePresentationhint, Source, StackFrame,
    Thread, Variable,
};
use serde::Deserialize;

use crate::debugger::variable::{ChildEntry, raw_segment};
use crate::debugger::{ConnectConfig, Debugger, DebuggerBuilder, Error, PathMapping};
use crate::ui::dap::hook::DapHook;
use crate::ui::dap::logger::DapLogger;
use crate::ui::dap::server::DapServer;
use crate::ui::dap::variable::{FrameId, ReferenceRegistry, SubKind, VarKind};

/// Launch attributes of the VSCode extension.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct LaunchArgs {
    /// Symbol table path.
    program: Option<String>,
    #[serde(rename = "runtimeIP", default = "default_runtime_ip")]
    runtime_ip: String,
    #[serde(default = "default_runtime_port")]
    runtime_port: u16,
    src_path: Option<String>,
    dst_path: Option<String>,
    #[serde(default)]
    no_db_connection: bool,
}

fn default_runtime_ip() -> String {
    "0.0.0.0".to_string()
}

fn default_runtime_port() -> u16 {
    8888
}

pub struct DapApplication {
    server: DapServer,
    session: Option<Debugger>,
    refs: ReferenceRegistry,
    /// Request seqs cancelled by the client; their responses are replaced
    /// by a cancel acknowledgement (best effort).
    cancelled: HashSet<i64>,
}

impl DapApplication {
    pub fn new(stream: TcpStream) -> anyhow::Result<DapApplication> {
        Ok(DapApplication {
            server: DapServer::new(stream)?,
            session: None,
            refs: ReferenceRegistry::default(),
            cancelled: HashSet::new(),
        })
    }

    pub fn run(mut self) -> anyhow::Result<()> {
        let logger = DapLogger::new(self.server.output());
        let filter = logger.filter();
        crate::log::LOGGER_SWITCHER.switch(logger, filter);

        loop {
            let req = match self.server.poll_request() {
                Ok(Some(req)) => req,
                Ok(None) => {
                    log::warn!("unexpected end of input stream");
                    break;
                }
                Err(e) => {
                    log::error!("{e}");
                    break;
                }
            };

            match self.handle_request(req) {
                Ok(true) => { /* Success */ }
                Ok(false) => break,
                Err(e) => {
                    log::error!("{e}");
                }
            }
        }

        if let Some(session) = self.session.take() {
            session.close();
        }

        Ok(())
    }

    fn respond_success(&mut self, seq: i64, body: ResponseBody) -> anyhow::Result<()> {
        if self.cancelled.remove(&seq) {
            self.server.respond_cancel(seq)?;
        } else {
            self.server.respond_success(seq, body)?;
        }
        Ok(())
    }

    fn handle_request(&mut self, req: Request) -> anyhow::Result<bool> {
        macro_rules! session_or_fail {
            () => {{
                match &mut self.session {
                    Some(session) => session,
                    None => {
                        self.server.respond_error(req.seq, "No running session")?;
                        anyhow::bail!("No running session");
                    }
                }
            }};
        }

        match req.command {
            Command::Initialize(_args) => {
                self.respond_success(
                    req.seq,
                    ResponseBody::Initialize(Capabilities {
                        supports_configuration_done_request: Some(true),
                        supports_conditional_breakpoints: Some(true),
                        supports_breakpoint_locations_request: Some(true),
                        supports_data_breakpoints: Some(true),
                        supports_set_variable: Some(true),
                        supports_step_back: Some(true),
                        supports_terminate_request: Some(true),
                        supports_cancel_request: Some(true),
                        supports_single_thread_execution_requests: Some(false),
                        ..Default::default()
                    }),
                )?;
            }
            Command::Launch(ref args) => {
                let data = args
                    .additional_data
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("missing launch arguments"))?;
                let launch: LaunchArgs = serde_json::from_value(data.clone())?;

                let config = ConnectConfig {
                    host: launch.runtime_ip.clone(),
                    port: launch.runtime_port,
                    db_filename: if launch.no_db_connection {
                        None
                    } else {
                        launch.program.clone()
                    },
                    path_mapping: PathMapping::new(
                        launch.src_path.clone(),
                        launch.dst_path.clone(),
                    ),
                };

                let builder = DebuggerBuilder::new()
                    .with_token_prefix("vscode-")
                    .with_hooks(DapHook::new(self.server.output()));
                match builder.start(&config) {
                    Ok(debugger) => {
                        self.session = Some(debugger);
                        log::info!("launch successful");
                        self.respond_success(req.seq, ResponseBody::Launch)?;
                        self.server.send_event(Event::Initialized)?;
                    }
                    Err(e) => {
                        self.server.respond_error(req.seq, format!("{e:#}"))?;
                    }
                }
            }
            Command::ConfigurationDone => {
                session_or_fail!();
                self.respond_success(req.seq, ResponseBody::ConfigurationDone)?;
            }
            Command::SetBreakpoints(ref args) => {
                let source_path = args
                    .source
                    .path
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("setBreakpoints: missing source path"))?;
                let requested = args.breakpoints.clone().unwrap_or_default();

                let session = session_or_fail!();

                // The IDE resends the whole set for a file; drop the old
                // breakpoints before verification, chrome-devtools style.
                if let Err(e) = session.clear_file(&source_path) {
                    log::warn!("clear breakpoints: {e}");
                }

                let mut response_bps = Vec::new();
                for bp in &requested {
                    let line_num = bp.line.max(0) as u64;
                    let column_num = bp.column.map(|c| c.max(0) as u64);
                    let condition = bp.condition.clone();

                    let verified = session
                        .verify_breakpoints(&source_path, line_num, column_num)
                        .inspect_err(|e| log::error!("breakpoint: {e}"))
                        .unwrap_or_default();

                    let mut committed = Vec::new();
                    for vbp in &verified {
                        match session.set_breakpoint_by_id(vbp.id, condition.clone()) {
                            Ok(()) => committed.push(vbp.clone()),
                            Err(e) => log::error!("breakpoint {}: {e}", vbp.id),
                        }
                    }

                    if committed.is_empty() {
                        response_bps.push(Breakpoint {
                            verified: false,
                            line: Some(bp.line),
                            column: bp.column,
                            source: Some(args.source.clone()),
                            message: Some("no matching hardware instance".to_string()),
                            ..Default::default()
                        });
                    } else if column_num.is_some() {
                        // An explicit column singles out locations, report
                        // every id the runtime produced.
                        for vbp in committed {
                            response_bps.push(Breakpoint {
                                id: Some(vbp.id as i64),
                                verified: true,
                                line: Some(vbp.line_num as i64),
                                column: Some(vbp.column_num as i64),
                                source: Some(args.source.clone()),
                                ..Default::default()
                            });
                        }
                    } else {
                        let first = &committed[0];
                        response_bps.push(Breakpoint {
                            id: Some(first.id as i64),
                            verified: true,
                            line: Some(first.line_num as i64),
                            column: Some(first.column_num as i64),
                            source: Some(args.source.clone()),
                            ..Default::default()
                        });
                    }
                }

                self.respond_success(
                    req.seq,
                    ResponseBody::SetBreakpoints(SetBreakpointsResponse {
                        breakpoints: response_bps,
                    }),
                )?;
            }
            Command::BreakpointLocations(ref args) => {
                let source_path = args
                    .source
                    .path
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("breakpointLocations: missing source path"))?;
                let line = args.line;

                let session = session_or_fail!();
                let columns = session
                    .breakpoint_locations(&source_path, line.max(0) as u64)
                    .unwrap_or_default();

                self.respond_success(
                    req.seq,
                    ResponseBody::BreakpointLocations(BreakpointLocationsResponse {
                        breakpoints: columns
                            .into_iter()
                            .map(|column| BreakpointLocation {
                                line,
                                column: Some(column as i64),
                                end_line: None,
                                end_column: None,
                            })
                            .collect(),
                    }),
                )?;
            }
            Command::Threads => {
                let session = session_or_fail!();
                let instances = session.instances();

                let threads = if instances.is_empty() {
                    // Nothing is stopped yet; DAP clients still want one
                    // thread to hang the UI state on.
                    vec![Thread {
                        id: 1,
                        name: "hgdb".to_string(),
                    }]
                } else {
                    instances
                        .into_iter()
                        .map(|(id, name, _)| Thread {
                            id: id as i64,
                            name,
                        })
                        .collect()
                };

                self.respond_success(req.seq, ResponseBody::Threads(ThreadsResponse { threads }))?;
            }
            Command::StackTrace(ref args) => {
                let instance_id = args.thread_id as u64;
                let session = session_or_fail!();

                let location = session.stop_location();
                let frames = match session.instance_frames(instance_id) {
                    Some(frames) => frames,
                    None => {
                        self.server.respond_error(req.seq, "Thread not found")?;
                        return Ok(true);
                    }
                };

                let source = location.as_ref().map(|(file, _, _)| Source {
                    path: Some(file.clone()),
                    ..Default::default()
                });
                let (line, column) = location
                    .map(|(_, line, col)| (line as i64, col as i64))
                    .unwrap_or((0, 0));

                // The innermost scope first.
                let stack_frames: Vec<StackFrame> = (0..frames.scopes.len())
                    .rev()
                    .map(|stack_index| StackFrame {
                        id: FrameId {
                            instance_id,
                            stack_index,
                        }
                        .pack(),
                        name: format!("[{instance_id}]: {}", frames.instance_name),
                        source: source.clone(),
                        line,
                        column,
                        ..Default::default()
                    })
                    .collect();

                self.respond_success(
                    req.seq,
                    ResponseBody::StackTrace(StackTraceResponse {
                        total_frames: Some(stack_frames.len() as i64),
                        stack_frames,
                    }),
                )?;
            }
            Command::Scopes(ref args) => {
                let frame = FrameId::unpack(args.frame_id);

                let scopes = vec![
                    Scope {
                        name: "Local".to_string(),
                        presentation_hint: Some(ScopePresentationhint::Locals),
                        variables_reference: self.refs.insert_scope(
                            VarKind::Local,
                            frame.instance_id,
                            frame.stack_index,
                        ),
                        expensive: false,
                        ..Default::default()
                    },
                    Scope {
                        name: "Generator Variables".to_string(),
                        variables_reference: self.refs.insert_scope(
                            VarKind::Generator,
                            frame.instance_id,
                            frame.stack_index,
                        ),
                        expensive: false,
                        ..Default::default()
                    },
                    Scope {
                        name: "Simulator Values".to_string(),
                        variables_reference: self.refs.insert_scope(
                            VarKind::Global,
                            frame.instance_id,
                            frame.stack_index,
                        ),
                        expensive: true,
                        ..Default::default()
                    },
                ];

                self.respond_success(req.seq, ResponseBody::Scopes(ScopesResponse { scopes }))?;
            }
            Command::Variables(ref args) => {
                let variables = self.collect_variables(args.variables_reference);
                self.respond_success(
                    req.seq,
                    ResponseBody::Variables(VariablesResponse { variables }),
                )?;
            }
            Command::SetVariable(ref args) => {
                let Some(handle) = self.refs.get(args.variables_reference).cloned() else {
                    self.server
                        .respond_error(req.seq, "Unknown variables reference")?;
                    return Ok(true);
                };
                let Ok(value) = args.value.trim().parse::<i64>() else {
                    self.server
                        .respond_error(req.seq, "Only integer values are supported")?;
                    return Ok(true);
                };

                let var_name = self
                    .refs
                    .full_name(args.variables_reference, raw_segment(&args.name));

                let session = session_or_fail!();
                let result = match handle.kind.sub_kind() {
                    SubKind::Local => {
                        session.set_value_local(handle.instance_id, &var_name, value)
                    }
                    SubKind::Generator => {
                        session.set_value_generator(handle.instance_id, &var_name, value)
                    }
                };

                match result {
                    Ok(()) => self.respond_success(
                        req.seq,
                        ResponseBody::SetVariable(SetVariableResponse {
                            value: value.to_string(),
                            type_field: None,
                            variables_reference: None,
                            named_variables: None,
                            indexed_variables: None,
                        }),
                    )?,
                    Err(e) => self.server.respond_error(req.seq, format!("{e:#}"))?,
                }
            }
            Command::Evaluate(ref args) => {
                let session = session_or_fail!();

                let result = match args.frame_id.map(FrameId::unpack) {
                    Some(frame) => match session.instance_frames(frame.instance_id) {
                        Some(frames) => session.evaluate_in(
                            frames.breakpoint_id,
                            Some(frames.namespace_id),
                            &args.expression,
                        ),
                        None => Err(Error::InstanceNotFound(frame.instance_id)),
                    },
                    None => session.evaluate(&args.expression),
                };

                match result {
                    Ok(result) => self.respond_success(
                        req.seq,
                        ResponseBody::Evaluate(EvaluateResponse {
                            result,
                            type_field: None,
                            presentation_hint: None,
                            variables_reference: 0,
                            named_variables: None,
                            indexed_variables: None,
                            memory_reference: None,
                        }),
                    )?,
                    Err(e) => self.server.respond_error(req.seq, format!("{e:#}"))?,
                }
            }
            Command::DataBreakpointInfo(ref args) => {
                let instance_id = args
                    .variables_reference
                    .and_then(|reference| self.refs.get(reference))
                    .map(|handle| handle.instance_id);
                let var_name = match args.variables_reference {
                    Some(reference) => self.refs.full_name(reference, raw_segment(&args.name)),
                    None => args.name.clone(),
                };

                let session = session_or_fail!();
                let instance_id = instance_id.or_else(|| session.focused_instance());

                let data_id = instance_id
                    .filter(|iid| session.validate_data_breakpoint(*iid, &var_name))
                    .map(|iid| format!("{iid}:{var_name}"));

                let description = match &data_id {
                    Some(_) => format!("Watch {var_name}"),
                    None => format!("{var_name} is not watchable here"),
                };

                self.respond_success(
                    req.seq,
                    ResponseBody::DataBreakpointInfo(DataBreakpointInfoResponse {
                        data_id,
                        description,
                        access_types: None,
                        can_persist: None,
                    }),
                )?;
            }
            Command::SetDataBreakpoints(ref args) => {
                let session = session_or_fail!();

                // The whole set is replaced on every request.
                if let Err(e) = session.clear_data_breakpoints() {
                    log::warn!("clear data breakpoints: {e}");
                }

                let mut breakpoints = Vec::new();
                for bp in &args.breakpoints {
                    let verified = match bp.data_id.split_once(':') {
                        Some((iid, var_name)) => match iid.parse::<u64>() {
                            Ok(iid) => session
                                .add_data_breakpoint(iid, var_name, bp.condition.as_deref())
                                .inspect_err(|e| log::error!("data breakpoint: {e}"))
                                .is_ok(),
                            Err(_) => false,
                        },
                        None => false,
                    };
                    breakpoints.push(Breakpoint {
                        verified,
                        ..Default::default()
                    });
                }

                self.respond_success(
                    req.seq,
                    ResponseBody::SetDataBreakpoints(SetDataBreakpointsResponse { breakpoints }),
                )?;
            }
            Command::Continue(_) => {
                let session = session_or_fail!();
                session.continue_execution()?;
                self.respond_success(
                    req.seq,
                    ResponseBody::Continue(ContinueResponse {
                        all_threads_continued: Some(true),
                    }),
                )?;
            }
            Command::Next(_) => {
                let session = session_or_fail!();
                session.step_over()?;
                self.respond_success(req.seq, ResponseBody::Next)?;
            }
            Command::StepBack(_) => {
                let session = session_or_fail!();
                session.step_back()?;
                self.respond_success(req.seq, ResponseBody::StepBack)?;
            }
            Command::ReverseContinue(_) => {
                let session = session_or_fail!();
                session.reverse_continue()?;
                self.respond_success(req.seq, ResponseBody::ReverseContinue)?;
            }
            Command::Terminate(_) => {
                let session = session_or_fail!();
                if let Err(e) = session.stop_simulation() {
                    log::warn!("terminate: {e}");
                }
                self.respond_success(req.seq, ResponseBody::Terminate)?;
            }
            Command::Cancel(ref args) => {
                if let Some(request_id) = args.request_id {
                    self.cancelled.insert(request_id);
                }
                self.respond_success(req.seq, ResponseBody::Cancel)?;
            }
            Command::Disconnect(_) => {
                if let Some(session) = self.session.take() {
                    session.close();
                }
                self.respond_success(req.seq, ResponseBody::Disconnect)?;
                return Ok(false);
            }
            _ => {
                log::warn!("unknown command: {:?}", req.command);
                self.server.respond_cancel(req.seq)?;
            }
        }

        Ok(true)
    }

    /// Expand one `variablesReference` into its children. Compound
    /// children mint fresh references on the way out.
    fn collect_variables(&mut self, reference: i64) -> Vec<Variable> {
        let Some(handle) = self.refs.get(reference).cloned() else {
            return vec![];
        };
        let Some(session) = &self.session else {
            return vec![];
        };

        if matches!(handle.kind, VarKind::Global) {
            return vec![Variable {
                name: "Time".to_string(),
                value: session
                    .simulation_time()
                    .map(|time| time.to_string())
                    .unwrap_or_else(|| "<not stopped>".to_string()),
                variables_reference: 0,
                ..Default::default()
            }];
        }

        let prefix = match &handle.kind {
            VarKind::Nested { path, .. } => path.clone(),
            _ => String::new(),
        };
        let sub = handle.kind.sub_kind();

        let children = session.with_state(|state| {
            let scope = state
                .instance(handle.instance_id)
                .and_then(|frames| frames.scopes.get(handle.stack_index));
            let Some(scope) = scope else {
                return vec![];
            };
            let flat = match sub {
                SubKind::Local => &scope.local,
                SubKind::Generator => &scope.generator,
            };
            crate::debugger::variable::list_children(flat, &prefix)
        });

        children
            .into_iter()
            .filter_map(|child| match child {
                ChildEntry::Leaf { name, value } => Some(Variable {
                    name,
                    value: value.to_string(),
                    variables_reference: 0,
                    ..Default::default()
                }),
                ChildEntry::Compound {
                    name,
                    path,
                    is_array,
                } => {
                    let child_ref =
                        self.refs
                            .insert_child(reference, raw_segment(&name), path)?;
                    Some(Variable {
                        name,
                        value: if is_array { "Array" } else { "Object" }.to_string(),
                        variables_reference: child_ref,
                        ..Default::default()
                    })
                }
            })
            .collect()
    }
}
