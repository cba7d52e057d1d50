/// Watchpoint (data breakpoint) subcommand. The watch is installed in the
/// focused instance's breakpoint scope.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Add {
        var_name: String,
        condition: Option<String>,
    },
}
