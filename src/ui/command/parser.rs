use super::r#break::Location;
use super::{Command, CommandError, CommandResult, info, source_code, watch};
use ariadne::{Color, Fmt, Label, Report, ReportKind, Source};
use chumsky::error::{Rich, RichPattern, RichReason};
use chumsky::prelude::{any, choice, end, just};
use chumsky::text::whitespace;
use chumsky::{Boxed, Parser, extra, text};
use itertools::Itertools;

pub const BREAK_COMMAND: &str = "break";
pub const BREAK_COMMAND_SHORT: &str = "b";
pub const WATCH_COMMAND: &str = "watch";
pub const WATCH_COMMAND_SHORT: &str = "w";
pub const CONTINUE_COMMAND: &str = "continue";
pub const CONTINUE_COMMAND_SHORT: &str = "c";
pub const STEP_OVER_COMMAND: &str = "next";
pub const STEP_OVER_COMMAND_SHORT: &str = "n";
pub const STEP_BACK_COMMAND: &str = "step-back";
pub const REVERSE_CONTINUE_COMMAND: &str = "reverse-continue";
pub const REVERSE_CONTINUE_COMMAND_SHORT: &str = "rc";
pub const PRINT_COMMAND: &str = "p";
pub const SET_COMMAND: &str = "set";
pub const LIST_COMMAND: &str = "l";
pub const INFO_COMMAND: &str = "info";
pub const INFO_BREAKPOINT_SUBCOMMAND: &str = "breakpoint";
pub const INFO_WATCHPOINT_SUBCOMMAND: &str = "watchpoint";
pub const INFO_THREADS_SUBCOMMAND: &str = "threads";
pub const INFO_TIME_SUBCOMMAND: &str = "time";
pub const THREAD_COMMAND: &str = "thread";
pub const CONDITION_COMMAND: &str = "condition";
pub const GO_COMMAND: &str = "go";
pub const CLEAR_COMMAND: &str = "clear";
pub const DELETE_COMMAND: &str = "delete";
pub const DELETE_COMMAND_SHORT: &str = "d";
pub const HELP_COMMAND: &str = "help";
pub const HELP_COMMAND_SHORT: &str = "h";

type Err<'a> = extra::Err<Rich<'a, char>>;

/// One `file[:line[:col]]` token.
fn location<'a>() -> impl chumsky::Parser<'a, &'a str, Location, Err<'a>> + Clone {
    any()
        .filter(|c: &char| !c.is_whitespace())
        .repeated()
        .at_least(1)
        .to_slice()
        .try_map(|spec: &str, span| {
            if spec.starts_with('-') {
                return Err(Rich::custom(span, format!("invalid location `{spec}`")));
            }
            Location::parse(spec).map_err(|e| Rich::custom(span, e))
        })
        .padded()
        .labelled("source location")
}

fn var_name<'a>() -> impl chumsky::Parser<'a, &'a str, &'a str, Err<'a>> + Clone {
    any()
        .filter(|c: &char| !c.is_whitespace() && *c != '=')
        .repeated()
        .at_least(1)
        .to_slice()
        .padded()
        .labelled("variable name")
}

fn rest_of_line<'a>() -> impl chumsky::Parser<'a, &'a str, String, Err<'a>> + Clone {
    any()
        .repeated()
        .at_least(1)
        .to_slice()
        .map(|s: &str| s.trim().to_string())
        .labelled("expression")
}

fn int<'a, T: std::str::FromStr>() -> impl chumsky::Parser<'a, &'a str, T, Err<'a>> + Clone
where
    T::Err: std::fmt::Display,
{
    text::int(10)
        .to_slice()
        .try_map(|s: &str, span| {
            s.parse::<T>()
                .map_err(|e| Rich::custom(span, format!("invalid number: {e}")))
        })
        .padded()
        .labelled("number")
}

fn signed_int<'a>() -> impl chumsky::Parser<'a, &'a str, i64, Err<'a>> + Clone {
    just('-')
        .or_not()
        .then(text::int(10))
        .to_slice()
        .try_map(|s: &str, span| {
            s.parse::<i64>()
                .map_err(|e| Rich::custom(span, format!("invalid integer: {e}")))
        })
        .padded()
        .labelled("integer value")
}

fn command<'a, I>(ctx: &'static str, inner: I) -> Boxed<'a, 'a, &'a str, Command, Err<'a>>
where
    I: chumsky::Parser<'a, &'a str, Command, Err<'a>> + 'a,
{
    inner.then_ignore(end()).labelled(ctx).boxed()
}

impl Command {
    pub fn render_errors(src: &str, errors: Vec<Rich<char>>) -> String {
        let mut reports = vec![];

        for e in errors {
            fn generate_reports(
                src: &str,
                reports: &mut Vec<String>,
                err: &Rich<char>,
                reason: &RichReason<char>,
            ) {
                let report = Report::build(ReportKind::Error, "<command>", err.span().start)
                    .with_help("try \"help\" command");

                let report = match reason {
                    RichReason::ExpectedFound { expected, found } => report
                        .with_message(format!(
                            "{}, expected {}",
                            if found.is_some() {
                                "unexpected token in input"
                            } else {
                                "unexpected end of input"
                            },
                            if expected.is_empty() {
                                "something else".to_string()
                            } else {
                                expected
                                    .iter()
                                    .map(|e| match e {
                                        RichPattern::Token(tok) => tok.to_string(),
                                        RichPattern::Label(label) => label.to_string(),
                                        RichPattern::Identifier(ident) => ident.to_string(),
                                        RichPattern::Any => "any".to_string(),
                                        RichPattern::SomethingElse => "something else".to_string(),
                                        RichPattern::EndOfInput => "end of input".to_string(),
                                    })
                                    .join(", ")
                            }
                        ))
                        .with_label(
                            Label::new(("<command>", err.span().into_range()))
                                .with_message(format!(
                                    "unexpected token {}",
                                    err.found()
                                        .map(|t| t.to_string())
                                        .unwrap_or("EOL".to_string())
                                        .fg(Color::Red)
                                ))
                                .with_color(Color::Red),
                        ),
                    RichReason::Custom(msg) => report.with_message(msg).with_label(
                        Label::new(("<command>", err.span().into_range()))
                            .with_message(format!("{}", msg.fg(Color::Red)))
                            .with_color(Color::Red),
                    ),
                };

                let mut buf = vec![];
                _ = report
                    .finish()
                    .write_for_stdout(("<command>", Source::from(&src)), &mut buf);
                reports.push(
                    std::str::from_utf8(&buf[..])
                        .expect("infallible")
                        .to_string(),
                );
            }

            generate_reports(src, &mut reports, &e, e.reason());
        }

        reports.join("\n")
    }

    fn parser<'a>() -> impl Parser<'a, &'a str, Command, Err<'a>> {
        let ws_req = whitespace().at_least(1);
        let ws_req_or_end = ws_req.or(end());
        let op = |sym| whitespace().then(just(sym)).then(ws_req_or_end);
        let op_w_arg = |sym| whitespace().then(just(sym)).then(ws_req);
        let sub_op = |sym| just(sym).then(ws_req_or_end);

        let op2 = |full, short| op(full).or(op(short));
        let op2_w_arg = |full, short| op_w_arg(full).or(op_w_arg(short));

        let r#continue = op2(CONTINUE_COMMAND, CONTINUE_COMMAND_SHORT).to(Command::Continue);
        let step_over = op2(STEP_OVER_COMMAND, STEP_OVER_COMMAND_SHORT).to(Command::StepOver);
        let step_back = op(STEP_BACK_COMMAND).to(Command::StepBack);
        let reverse_continue = op2(REVERSE_CONTINUE_COMMAND, REVERSE_CONTINUE_COMMAND_SHORT)
            .to(Command::ReverseContinue);

        let r#break = op2_w_arg(BREAK_COMMAND, BREAK_COMMAND_SHORT)
            .ignore_then(location())
            .map(|loc| Command::Breakpoint(super::r#break::Command::Add(loc)))
            .boxed();

        let watchpoint = op2_w_arg(WATCH_COMMAND, WATCH_COMMAND_SHORT)
            .ignore_then(var_name())
            .then(
                just("--cond")
                    .then(ws_req)
                    .ignore_then(rest_of_line())
                    .or_not(),
            )
            .map(|(var, condition)| {
                Command::Watchpoint(watch::Command::Add {
                    var_name: var.to_string(),
                    condition,
                })
            })
            .boxed();

        let print = op_w_arg(PRINT_COMMAND)
            .ignore_then(rest_of_line())
            .map(Command::Print)
            .boxed();

        let set_value = op_w_arg(SET_COMMAND)
            .ignore_then(var_name())
            .then_ignore(just('=').padded())
            .then(signed_int())
            .map(|(var, value)| Command::SetValue {
                var_name: var.to_string(),
                value,
            })
            .boxed();

        let list_bounds = just("-n").then(ws_req).ignore_then(int::<u64>());
        let source_code = choice((
            op_w_arg(LIST_COMMAND).ignore_then(choice((
                list_bounds.clone().map(|bounds| (None, bounds)),
                location()
                    .then(list_bounds.or_not())
                    .map(|(loc, bounds)| {
                        (Some(loc), bounds.unwrap_or(source_code::DEFAULT_BOUNDS))
                    }),
            ))),
            op(LIST_COMMAND).to((None, source_code::DEFAULT_BOUNDS)),
        ))
        .map(|(location, bounds)| Command::SourceCode(source_code::Command { location, bounds }))
        .boxed();

        let info = op_w_arg(INFO_COMMAND)
            .ignore_then(choice((
                sub_op(INFO_BREAKPOINT_SUBCOMMAND).to(Command::Info(info::Command::Breakpoint)),
                sub_op(INFO_WATCHPOINT_SUBCOMMAND).to(Command::Info(info::Command::Watchpoint)),
                sub_op(INFO_THREADS_SUBCOMMAND).to(Command::Info(info::Command::Threads)),
                sub_op(INFO_TIME_SUBCOMMAND).to(Command::Info(info::Command::Time)),
            )))
            .boxed();

        let thread = op_w_arg(THREAD_COMMAND)
            .ignore_then(int::<u64>())
            .map(Command::Thread)
            .boxed();

        let condition = op_w_arg(CONDITION_COMMAND)
            .ignore_then(int::<u64>())
            .then(rest_of_line())
            .map(|(id, expression)| Command::Condition { id, expression })
            .boxed();

        let go = op_w_arg(GO_COMMAND)
            .ignore_then(int::<u64>())
            .map(Command::Jump)
            .boxed();

        let clear = choice((
            op_w_arg(CLEAR_COMMAND).ignore_then(location()).map(Some),
            op(CLEAR_COMMAND).to(None),
        ))
        .map(Command::Clear)
        .boxed();

        let delete = op2_w_arg(DELETE_COMMAND, DELETE_COMMAND_SHORT)
            .ignore_then(int::<u64>())
            .map(Command::Delete)
            .boxed();

        let help = op2(HELP_COMMAND, HELP_COMMAND_SHORT)
            .ignore_then(any().repeated().at_least(1).padded().to_slice().or_not())
            .map(|s: Option<&str>| Command::Help {
                command: s.map(|s| s.trim().to_string()),
                reason: None,
            })
            .padded()
            .boxed();

        choice((
            command(CONTINUE_COMMAND, r#continue),
            command(STEP_OVER_COMMAND, step_over),
            command(STEP_BACK_COMMAND, step_back),
            command(REVERSE_CONTINUE_COMMAND, reverse_continue),
            command(BREAK_COMMAND, r#break),
            command(WATCH_COMMAND, watchpoint),
            command(PRINT_COMMAND, print),
            command(SET_COMMAND, set_value),
            command(LIST_COMMAND, source_code),
            command(INFO_COMMAND, info),
            command(THREAD_COMMAND, thread),
            command(CONDITION_COMMAND, condition),
            command(GO_COMMAND, go),
            command(CLEAR_COMMAND, clear),
            command(DELETE_COMMAND, delete),
            command(HELP_COMMAND, help),
        ))
    }

    /// Parse input string into command.
    pub fn parse(input: &str) -> CommandResult<Command> {
        Self::parser()
            .parse(input)
            .into_result()
            .map_err(|e| CommandError::Parsing(Self::render_errors(input, e)))
    }
}
