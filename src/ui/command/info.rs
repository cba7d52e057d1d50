/// `info` subcommand: one of the queryable session facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Breakpoint,
    Watchpoint,
    Threads,
    Time,
}
