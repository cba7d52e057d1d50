//! An interface to the debug session.
//!
//! Contains commands and corresponding command handlers. A command is a
//! request to the debugger defining an action and a list of input
//! arguments; the terminal front-end parses user input into these.

pub mod r#break;
pub mod info;
pub mod parser;
pub mod source_code;
pub mod watch;

use crate::debugger::Error;

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error("malformed command")]
    Parsing(String),
    #[error("render error: \n{0}")]
    FileRender(anyhow::Error),
    #[error(transparent)]
    Handle(#[from] Error),
}

pub type CommandResult<T> = Result<T, CommandError>;

/// External commands that can be processed by the debug session.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Breakpoint(r#break::Command),
    Watchpoint(watch::Command),
    Continue,
    StepOver,
    StepBack,
    ReverseContinue,
    Print(String),
    SetValue {
        var_name: String,
        value: i64,
    },
    SourceCode(source_code::Command),
    Info(info::Command),
    Thread(u64),
    Condition {
        id: u64,
        expression: String,
    },
    /// Jump to an absolute simulation time (replay mode).
    Jump(u64),
    Clear(Option<r#break::Location>),
    Delete(u64),
    Help {
        command: Option<String>,
        reason: Option<String>,
    },
    SkipInput,
}
