use crate::debugger::variable;
use crate::debugger::{Debugger, Error, StopEvent};
use crate::ui::command::r#break::{self, Location};
use crate::ui::command::{Command, CommandError, info, source_code, watch};
use crate::ui::console::editor::{CommandCompleter, HgdbEditor, create_editor};
use crate::ui::console::file::FileView;
use crate::ui::console::hook::TerminalHook;
use crate::ui::console::print::ExternalPrinter;
use crate::ui::console::print::style::{
    ErrorView, FilePathView, ImportantView, InstanceNameView, KeywordView, TimeView,
};
use rustyline::error::ReadlineError;
use std::path::PathBuf;
use std::process::exit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, Once, mpsc};
use std::thread;
use std::time::Duration;

pub mod editor;
pub mod file;
pub mod help;
pub mod hook;
pub mod print;

const WELCOME_TEXT: &str = "hgdb debugger, type \"help\" for the command list";
const PROMT: &str = "(hgdb) ";
const HISTORY_FILE: &str = ".hgdb";

/// Set by the SIGINT handler, consumed by waits on the next break event.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

pub struct AppBuilder {
    workspace: Option<PathBuf>,
}

impl AppBuilder {
    pub fn new(workspace: Option<PathBuf>) -> Self {
        Self { workspace }
    }

    /// Create the terminal application around a debugger built with the
    /// terminal hook (the hook needs the editor's printer, hence the
    /// callback).
    pub fn build(
        self,
        debugger_ctor: impl FnOnce(TerminalHook) -> anyhow::Result<Debugger>,
    ) -> anyhow::Result<TerminalApplication> {
        let mut editor = create_editor(PROMT)?;
        if let Some(path) = history_path() {
            _ = editor.load_history(&path);
        }

        let file_view = Arc::new(FileView::new());
        let hook = TerminalHook::new(ExternalPrinter::new(&mut editor)?, file_view.clone());

        let debugger = debugger_ctor(hook)?;

        if let Some(helper) = editor.helper_mut() {
            helper
                .completer
                .lock()
                .unwrap()
                .replace_file_hints(debugger.known_files().map(ToString::to_string));
        }

        Ok(TerminalApplication {
            debugger,
            editor,
            file_view,
            workspace: self.workspace,
        })
    }
}

fn history_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(HISTORY_FILE))
}

enum UserAction {
    /// New command from user received.
    Cmd(String),
    /// Terminate application.
    Terminate,
    /// Do nothing.
    Nop,
}

pub struct TerminalApplication {
    debugger: Debugger,
    editor: HgdbEditor,
    file_view: Arc<FileView>,
    workspace: Option<PathBuf>,
}

impl TerminalApplication {
    pub fn run(mut self) -> anyhow::Result<()> {
        let logger = env_logger::Logger::from_default_env();
        let filter = logger.filter();
        crate::log::LOGGER_SWITCHER.switch(logger, filter);

        static CTRLC_ONCE: Once = Once::new();
        CTRLC_ONCE.call_once(|| {
            // While a flow command waits for the next break, SIGINT aborts
            // the wait instead of killing the process; at the prompt it is
            // handled by `readline` itself.
            ctrlc::set_handler(|| INTERRUPTED.store(true, Ordering::SeqCst))
                .expect("error setting Ctrl-C handler")
        });

        let (user_act_tx, user_act_rx) = mpsc::sync_channel::<UserAction>(0);
        let (ready_tx, ready_rx) = mpsc::channel::<()>();

        let completer = Arc::clone(
            &self
                .editor
                .helper_mut()
                .expect("helper must exist")
                .completer,
        );
        let printer = ExternalPrinter::new(&mut self.editor)?;

        let app_loop = AppLoop {
            debugger: self.debugger,
            file_view: self.file_view,
            workspace: self.workspace,
            user_input_rx: user_act_rx,
            printer,
            completer,
            ready_to_next_command_tx: ready_tx,
        };

        let mut editor = self.editor;
        thread::spawn(move || {
            println!("{WELCOME_TEXT}");

            loop {
                if ready_rx.recv().is_err() {
                    break;
                }

                match editor.readline(PROMT) {
                    Ok(input) => {
                        if input == "q" || input == "quit" {
                            _ = user_act_tx.send(UserAction::Terminate);
                            break;
                        }
                        _ = editor.add_history_entry(&input);
                        _ = user_act_tx.send(UserAction::Cmd(input));
                    }
                    Err(ReadlineError::Interrupted) => {
                        _ = user_act_tx.send(UserAction::Nop);
                    }
                    Err(_) => {
                        _ = user_act_tx.send(UserAction::Terminate);
                        break;
                    }
                }
            }

            if let Some(path) = history_path() {
                _ = editor.save_history(&path);
            }
        });

        app_loop.run()
    }
}

struct AppLoop {
    debugger: Debugger,
    file_view: Arc<FileView>,
    workspace: Option<PathBuf>,
    user_input_rx: Receiver<UserAction>,
    printer: ExternalPrinter,
    completer: Arc<Mutex<CommandCompleter>>,
    ready_to_next_command_tx: mpsc::Sender<()>,
}

impl AppLoop {
    fn run(mut self) -> anyhow::Result<()> {
        loop {
            _ = self.ready_to_next_command_tx.send(());

            let Ok(action) = self.user_input_rx.recv() else {
                return Ok(());
            };

            match action {
                UserAction::Cmd(command) => {
                    if !command.trim().is_empty()
                        && let Err(e) =
                            Command::parse(&command).and_then(|cmd| self.handle_command(cmd))
                    {
                        Self::handle_error(&self.printer, e);
                    }
                }
                UserAction::Nop => {}
                UserAction::Terminate => {
                    self.debugger.close();
                    return Ok(());
                }
            }
        }
    }

    fn handle_error(printer: &ExternalPrinter, error: CommandError) {
        match error {
            CommandError::Parsing(pretty_error) => {
                printer.println(pretty_error);
            }
            CommandError::FileRender(_) => {
                printer.println(ErrorView::from(format!("Render file error: {error:#}")));
            }
            CommandError::Handle(ref err) if err.is_fatal() => {
                printer.println(ErrorView::from("Shutdown debugger"));
                printer.println(ErrorView::from(format!("Fatal error: {error:#}")));
                exit(1);
            }
            CommandError::Handle(_) => {
                printer.println(ErrorView::from(format!("Error: {error:#}")));
            }
        }
    }

    fn handle_command(&mut self, cmd: Command) -> Result<(), CommandError> {
        match cmd {
            Command::Breakpoint(r#break::Command::Add(loc)) => self.handle_breakpoint_add(loc)?,
            Command::Watchpoint(watch::Command::Add {
                var_name,
                condition,
            }) => {
                let instance_id = self
                    .debugger
                    .focused_instance()
                    .ok_or(Error::NoActiveScope)?;
                self.debugger
                    .add_data_breakpoint(instance_id, &var_name, condition.as_deref())?;
                self.printer.println(format!(
                    "Watchpoint set on {} (instance [{instance_id}])",
                    KeywordView::from(&var_name)
                ));
            }
            Command::Continue => {
                self.debugger.continue_execution()?;
                self.wait_for_break()?;
            }
            Command::StepOver => {
                self.debugger.step_over()?;
                self.wait_for_break()?;
            }
            Command::StepBack => {
                self.debugger.step_back()?;
                self.wait_for_break()?;
            }
            Command::ReverseContinue => {
                self.debugger.reverse_continue()?;
                self.wait_for_break()?;
            }
            Command::Jump(time) => {
                self.debugger.jump_to(time)?;
                self.wait_for_break()?;
            }
            Command::Print(expression) => self.handle_print(&expression)?,
            Command::SetValue { var_name, value } => {
                self.debugger.set_value(&var_name, value)?;
            }
            Command::SourceCode(cmd) => self.handle_source_code(cmd)?,
            Command::Info(cmd) => self.handle_info(cmd),
            Command::Thread(instance_id) => {
                self.debugger.focus_instance(instance_id)?;
                self.refresh_var_hints();
                self.printer
                    .println(format!("Switched to instance [{instance_id}]"));
            }
            Command::Condition { id, expression } => {
                self.debugger.set_breakpoint_by_id(id, Some(expression))?;
            }
            Command::Clear(None) => {
                self.printer.println("clear: not implemented");
            }
            Command::Clear(Some(loc)) => {
                let file = self.resolve_server_file(&loc.file);
                let removed = self.debugger.clear_file(&file)?;
                self.printer.println(format!(
                    "Removed {} breakpoint(s) from {}",
                    removed.len(),
                    FilePathView::from(self.debugger.display_file(&file))
                ));
            }
            Command::Delete(id) => {
                self.debugger.remove_breakpoint(id)?;
            }
            Command::Help { command, reason } => {
                if let Some(reason) = reason {
                    self.printer.println(reason);
                }
                match command.as_deref().and_then(help::command_help) {
                    Some(text) => self.printer.println(text),
                    None => self.printer.println(help::HELP),
                }
            }
            Command::SkipInput => {}
        }

        Ok(())
    }

    fn handle_breakpoint_add(&mut self, loc: Location) -> Result<(), CommandError> {
        let Some(line_num) = loc.line_num else {
            return Err(CommandError::Parsing(format!(
                "a line number is required, e.g. `b {}:1`",
                loc.file
            )));
        };

        let file = self.resolve_server_file(&loc.file);
        let verified = self
            .debugger
            .verify_breakpoints(&file, line_num, loc.column_num)?;
        if verified.is_empty() {
            self.printer.println(ErrorView::from(format!(
                "No breakpoint installable at {}:{line_num}",
                loc.file
            )));
            return Ok(());
        }

        for bp in verified {
            self.debugger.set_breakpoint_by_id(bp.id, None)?;
            let display = self.debugger.display_file(&bp.filename).to_string();
            self.printer.println(format!(
                "Breakpoint {} at {}:{}",
                bp.id,
                FilePathView::from(display),
                bp.line_num
            ));
        }
        Ok(())
    }

    fn handle_print(&mut self, expression: &str) -> Result<(), CommandError> {
        // Two pseudo-values expose the raw scope identifiers.
        if expression == "breakpoint-id" || expression == "namespace-id" {
            let Some(instance_id) = self.debugger.focused_instance() else {
                return Err(Error::NoActiveScope.into());
            };
            let frames = self
                .debugger
                .instance_frames(instance_id)
                .ok_or(Error::InstanceNotFound(instance_id))?;
            let value = if expression == "breakpoint-id" {
                crate::debugger::proto::split_id(frames.breakpoint_id).1
            } else {
                frames.namespace_id
            };
            self.printer.println(value);
            return Ok(());
        }

        let normalized = variable::normalize_name(expression);
        let root = normalized.split('.').next().unwrap_or(&normalized);
        let overridden = self.debugger.is_set_overridden(expression)
            || self.debugger.is_set_overridden(root);

        if !overridden
            && let Some(tree) = self.debugger.local_tree()
            && let Some(node) = tree.lookup(&normalized)
        {
            self.printer.println(node);
            return Ok(());
        }

        match self.debugger.evaluate(expression) {
            Ok(result) => self.printer.println(result),
            Err(Error::Request(reason)) => self.printer.println(ErrorView::from(reason)),
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    fn handle_source_code(&mut self, cmd: source_code::Command) -> Result<(), CommandError> {
        let (path, line_num) = match cmd.location {
            Some(loc) => {
                let line = loc.line_num.unwrap_or(cmd.bounds + 1);
                (self.resolve_local_file(&loc.file), line)
            }
            None => {
                let (file, line, _) = self
                    .debugger
                    .stop_location()
                    .ok_or(Error::NoActiveScope)?;
                (PathBuf::from(file), line)
            }
        };

        let listing = self
            .file_view
            .render_around(&path, line_num, cmd.bounds)
            .map_err(CommandError::FileRender)?;
        self.printer.print(listing);
        Ok(())
    }

    fn handle_info(&mut self, cmd: info::Command) {
        match cmd {
            info::Command::Breakpoint => {
                let lines: Vec<String> = self
                    .debugger
                    .breakpoints()
                    .map(|bp| {
                        let mut line = format!(
                            "{}\t{}:{}:{}",
                            bp.id,
                            self.debugger.display_file(&bp.filename),
                            bp.line_num,
                            bp.column_num
                        );
                        if let Some(cond) = &bp.condition {
                            line.push_str(&format!("\tif {cond}"));
                        }
                        line
                    })
                    .collect();
                if lines.is_empty() {
                    self.printer.println("No breakpoints installed");
                }
                for line in lines {
                    self.printer.println(line);
                }
            }
            info::Command::Watchpoint => {
                let watches = self.debugger.data_breakpoints().to_vec();
                if watches.is_empty() {
                    self.printer.println("No watchpoints installed");
                }
                for wp in watches {
                    let mut line =
                        format!("{} (instance [{}])", wp.var_name, wp.instance_id);
                    if let Some(cond) = &wp.condition {
                        line.push_str(&format!("\tif {cond}"));
                    }
                    self.printer.println(line);
                }
            }
            info::Command::Threads => {
                let focused = self.debugger.focused_instance();
                let instances = self.debugger.instances();
                if instances.is_empty() {
                    self.printer.println("The simulation is not stopped");
                }
                for (id, name, _) in instances {
                    let marker = if focused == Some(id) { "*" } else { " " };
                    self.printer.println(format!(
                        "{marker} [{id}]: {}",
                        InstanceNameView::from(name)
                    ));
                }
            }
            info::Command::Time => match self.debugger.simulation_time() {
                Some(time) => self.printer.println(TimeView::from(time)),
                None => self.printer.println("The simulation is not stopped"),
            },
        }
    }

    /// Block until the next break event. SIGINT abandons the wait (the
    /// simulation keeps running, the next break will be reported by the
    /// hook whenever it arrives).
    fn wait_for_break(&mut self) -> Result<(), CommandError> {
        INTERRUPTED.store(false, Ordering::SeqCst);
        loop {
            if INTERRUPTED.swap(false, Ordering::SeqCst) {
                self.printer
                    .println(ImportantView::from("Wait interrupted, simulation keeps running"));
                return Ok(());
            }
            match self
                .debugger
                .wait_for_stop_timeout(Duration::from_millis(100))?
            {
                Some(StopEvent::Break) => {
                    self.refresh_var_hints();
                    return Ok(());
                }
                Some(StopEvent::SessionEnded) => return Err(Error::SessionEnded.into()),
                None => continue,
            }
        }
    }

    fn refresh_var_hints(&mut self) {
        let names: Vec<String> = self
            .debugger
            .local_tree()
            .map(|tree| tree.flatten().keys().cloned().collect())
            .unwrap_or_default();
        self.completer
            .lock()
            .unwrap()
            .replace_local_var_hints(names);
    }

    /// A user-typed file name, resolved to the server's absolute path.
    fn resolve_server_file(&self, name: &str) -> String {
        self.debugger
            .resolve_file(name)
            .unwrap_or_else(|| name.to_string())
    }

    /// A user-typed file name, resolved to a readable local path.
    fn resolve_local_file(&self, name: &str) -> PathBuf {
        let resolved = self.resolve_server_file(name);
        let local = self.debugger.path_mapping().to_local(&resolved);

        let path = PathBuf::from(&local);
        if path.is_file() {
            return path;
        }
        if let Some(workspace) = &self.workspace
            && let Some(found) = crate::debugger::find_in_workspace(workspace, &local)
        {
            return found;
        }
        path
    }
}
