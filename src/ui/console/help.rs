pub const HELP: &str = r#"
Available debugger commands:

b, break <file[:line[:col]]>       -- set a breakpoint, verified against the running simulation
w, watch <var> [--cond <expr>]     -- set a watchpoint on a variable in the current breakpoint scope
d, delete <id>                     -- remove a breakpoint by its id
clear [file[:line[:col]]]          -- remove all breakpoints in a file
condition <id> <expr>              -- attach a condition to an existing breakpoint
c, continue                        -- continue the simulation until the next breakpoint
n, next                            -- step over to the next breakpoint location
step-back                          -- step one breakpoint backwards (replay mode)
rc, reverse-continue               -- run backwards until a breakpoint hits (replay mode)
go <time>                          -- jump to an absolute simulation time (replay mode)
p <expr>                           -- print a variable or evaluate an expression in the current scope
set <var>=<int>                    -- override a variable in the current breakpoint scope
l [file[:line]] [-n <k>]           -- list source code around the break (or a given location)
info breakpoint|watchpoint|threads|time
                                   -- show installed breakpoints, watchpoints, stopped instances or time
thread <id>                        -- switch the instance in focus
h, help <>|<command>               -- show help
q, quit                            -- exit the debugger
"#;

const BREAK_HELP: &str = "\
b, break <file[:line[:col]]>
Verify a source location against the simulation and install a breakpoint on
every matching hardware instance. A bare file name works when it is
unambiguous across the symbol table. The runtime answers with one id per
matching location; ids are what `d`, `condition` and `info breakpoint` talk
about.";

const WATCH_HELP: &str = "\
w, watch <var> [--cond <expr>]
Install a data breakpoint on a variable of the instance in focus. The watch
lives in the instance's current breakpoint scope and fires whenever the
value changes (or when the optional condition holds).";

const PRINT_HELP: &str = "\
p <expr>
Print a cached local variable (dot and index syntax supported, e.g.
`p a[0].b`) or forward the expression to the simulator for evaluation in
the current breakpoint scope. Two pseudo-values are recognized:
`breakpoint-id` and `namespace-id`.";

const SET_HELP: &str = "\
set <var>=<int>
Override a variable in the current breakpoint scope. Only integer values
are accepted; the override is remembered until the next break, so `p` of an
overridden name always asks the simulator.";

const LIST_HELP: &str = "\
l [file[:line]] [-n <k>]
List source code around the current break location, or around an explicit
location. `-n` controls how many lines are shown on each side (default 5).";

const GO_HELP: &str = "\
go <time>
Jump to an absolute simulation time. Only available when the runtime runs
in replay (trace) mode.";

const THREAD_HELP: &str = "\
thread <id>
Switch the hardware instance in focus. `info threads` lists the instances
stopped at the current break together with their ids.";

/// Detailed help for one command, `None` for an unknown name.
pub fn command_help(command: &str) -> Option<&'static str> {
    use crate::ui::command::parser::*;

    match command {
        BREAK_COMMAND | BREAK_COMMAND_SHORT => Some(BREAK_HELP),
        WATCH_COMMAND | WATCH_COMMAND_SHORT => Some(WATCH_HELP),
        PRINT_COMMAND => Some(PRINT_HELP),
        SET_COMMAND => Some(SET_HELP),
        LIST_COMMAND => Some(LIST_HELP),
        GO_COMMAND => Some(GO_HELP),
        THREAD_COMMAND => Some(THREAD_HELP),
        _ => None,
    }
}
