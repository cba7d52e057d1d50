//! hgdb DAP (Debug Adapter Protocol) adapter.
//!
//! Exposes a DAP server over TCP for IDE integrations (VSCode, etc.); the
//! connection to the simulation runtime itself is established from the
//! client's `launch` request attributes.

use anyhow::Context;
use clap::Parser;
use hgdb::ui::dap::DapApplication;
use log::{info, warn};
use std::net::TcpListener;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on; 0 picks an ephemeral port.
    #[clap(long, default_value_t = 0)]
    port: u16,

    /// Exit after the first debug session ends (single-client mode).
    #[clap(long)]
    oneshot: bool,
}

fn main() -> anyhow::Result<()> {
    let logger = env_logger::Logger::from_default_env();
    let filter = logger.filter();
    hgdb::log::LOGGER_SWITCHER.switch(logger, filter);

    let args = Args::parse();

    let listener = TcpListener::bind(("127.0.0.1", args.port))
        .with_context(|| format!("bind port {}", args.port))?;
    // The ephemeral port must reach the IDE extension that spawned us.
    println!("{}", listener.local_addr()?.port());

    loop {
        let (stream, peer) = match listener.accept() {
            Ok(client) => client,
            Err(e) => {
                warn!(target: "dap", "accept failed: {e:#}");
                continue;
            }
        };
        info!(target: "dap", "DAP client connected: {peer}");

        match DapApplication::new(stream) {
            Ok(app) => {
                if let Err(e) = app.run() {
                    warn!(target: "dap", "session ended with error: {e:#}");
                }
            }
            Err(e) => warn!(target: "dap", "failed to init DAP I/O: {e:#}"),
        }

        if args.oneshot {
            break;
        }
    }

    Ok(())
}
