use std::fmt::Write as _;
use std::io::Write;
use std::sync::{Arc, Mutex};

use dap::events::{Event, OutputEventBody};
use dap::server::ServerOutput;
use dap::types::OutputEventCategory;
use log::{Level, LevelFilter};

/// Forwards log records to the IDE's debug console as DAP `output` events.
/// Level filtering follows the usual `RUST_LOG` configuration.
pub struct DapLogger<W: Write> {
    inner: env_logger::Logger,
    output: Arc<Mutex<ServerOutput<W>>>,
}

impl<W: Write> DapLogger<W> {
    pub fn new(output: Arc<Mutex<ServerOutput<W>>>) -> Self {
        Self {
            inner: env_logger::Logger::from_default_env(),
            output,
        }
    }

    pub fn filter(&self) -> LevelFilter {
        self.inner.filter()
    }
}

impl<W: Write + Send> log::Log for DapLogger<W> {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        let mut line = String::new();
        write!(line, "[{}] ", record.level()).expect("infallible");
        if let Some(module) = record.module_path() {
            write!(line, "{module} ").expect("infallible");
        }
        writeln!(line, "{}", record.args()).expect("infallible");

        let category = if record.level() <= Level::Warn {
            OutputEventCategory::Stderr
        } else {
            OutputEventCategory::Console
        };

        // A dead client makes event delivery fail; nothing sensible to do
        // about it from inside a logger.
        _ = self
            .output
            .lock()
            .unwrap()
            .send_event(Event::Output(OutputEventBody {
                category: Some(category),
                output: line,
                ..Default::default()
            }));
    }

    fn flush(&self) {}
}
