//! hgdb terminal debugger.
//!
//! Connects to a running hardware simulation over its debug WebSocket and
//! drives it from a line-oriented REPL.

use anyhow::Context;
use clap::Parser;
use hgdb::debugger::{ConnectConfig, DebuggerBuilder, PathMapping};
use hgdb::ui::console::AppBuilder;
use std::path::PathBuf;
use std::process::exit;

const DEFAULT_PORT: u16 = 8888;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Runtime address, `host[:port]` or `:port` (expands to localhost).
    hostname: String,

    /// Path to the symbol table the runtime should load.
    db: String,

    /// Do not send the symbol table to the runtime (it already has one).
    #[clap(long)]
    no_db_connection: bool,

    /// Workspace directory used to locate relative source files.
    #[clap(long = "dir")]
    dir: Option<PathBuf>,

    /// Remote-to-local source path mapping, `REMOTE:LOCAL`.
    #[clap(long = "map", value_parser = parse_mapping)]
    map: Option<(String, String)>,
}

fn parse_mapping(value: &str) -> Result<(String, String), String> {
    value
        .split_once(':')
        .map(|(remote, local)| (remote.to_string(), local.to_string()))
        .ok_or_else(|| format!("expected REMOTE:LOCAL, got `{value}`"))
}

/// `host[:port]`; a bare `:port` means localhost.
fn parse_hostname(hostname: &str) -> (String, u16) {
    match hostname.split_once(':') {
        Some(("", port)) => ("localhost".to_string(), port.parse().unwrap_or(DEFAULT_PORT)),
        Some((host, port)) => (host.to_string(), port.parse().unwrap_or(DEFAULT_PORT)),
        None => (hostname.to_string(), DEFAULT_PORT),
    }
}

fn main() {
    let logger = env_logger::Logger::from_default_env();
    let filter = logger.filter();
    hgdb::log::LOGGER_SWITCHER.switch(logger, filter);

    let args = Args::parse();

    let (host, port) = parse_hostname(&args.hostname);
    let (remote, local) = match args.map {
        Some((remote, local)) => (Some(remote), Some(local)),
        None => (None, None),
    };

    let config = ConnectConfig {
        host,
        port,
        db_filename: (!args.no_db_connection).then(|| args.db.clone()),
        path_mapping: PathMapping::new(local, remote),
    };

    let app = AppBuilder::new(args.dir).build(|hook| {
        DebuggerBuilder::new()
            .with_hooks(hook)
            .start(&config)
            .context("Unable to open a debug session")
    });

    let app = match app {
        Ok(app) => app,
        Err(e) => {
            eprintln!("{e:#}");
            exit(1);
        }
    };

    if let Err(e) = app.run() {
        eprintln!("{e:#}");
        exit(1);
    }
}
