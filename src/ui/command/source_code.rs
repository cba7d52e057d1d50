use super::r#break::Location;

/// Default number of lines shown on each side of the target line.
pub const DEFAULT_BOUNDS: u64 = 5;

/// `l` command: list source around the break (or an explicit location).
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// `None` lists around the current break location.
    pub location: Option<Location>,
    /// Lines on each side of the target line (`-n k`).
    pub bounds: u64,
}
