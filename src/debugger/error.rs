use std::sync::mpsc::RecvError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --------------------------------- transport errors ------------------------------------------
    #[error("unable to connect to {0}: {1}")]
    ConnectionFailure(String, String),
    #[error("Failed to connect to the runtime. Reason: {0}")]
    ConnectionRejected(String),
    #[error("debug session ended")]
    SessionEnded,
    #[error(transparent)]
    IO(#[from] std::io::Error),

    // --------------------------------- protocol errors -------------------------------------------
    #[error("malformed server frame: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("{0}")]
    Request(String),
    #[error("Error in protocol setup")]
    EvaluationProtocol,

    // --------------------------------- session errors --------------------------------------------
    #[error("no breakpoint scope, the simulation is not stopped")]
    NoActiveScope,
    #[error("instance {0} not found in the current break")]
    InstanceNotFound(u64),
    #[error("breakpoint {0} not found")]
    BreakpointNotFound(u64),
    #[error("unknown file {0}")]
    UnknownFile(String),
    #[error("watchpoint rejected for `{0}`")]
    WatchpointRejected(String),
}

impl Error {
    /// A fatal error invalidates the whole session, recovery is impossible.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConnectionFailure(_, _) | Error::ConnectionRejected(_) | Error::SessionEnded
        )
    }
}

impl From<RecvError> for Error {
    fn from(_: RecvError) -> Self {
        Error::SessionEnded
    }
}
