use log::{LevelFilter, Log, Metadata, Record};
use once_cell::sync::Lazy;
use std::sync::{Arc, RwLock};

struct SilentLogger;

impl Log for SilentLogger {
    fn enabled(&self, _: &Metadata) -> bool {
        false
    }

    fn log(&self, _: &Record) {}

    fn flush(&self) {}
}

/// Proxy over the globally installed logger.
///
/// The `log` facade allows exactly one `set_boxed_logger` call per process,
/// but the console and DAP front-ends need different sinks (stderr vs. DAP
/// `output` events). The proxy is installed once and the real backend is
/// swapped in by whichever front-end ends up running.
#[derive(Clone)]
pub struct ProxyLogger {
    backend: Arc<RwLock<Box<dyn Log>>>,
}

pub static LOGGER_SWITCHER: Lazy<ProxyLogger> = Lazy::new(|| {
    let proxy = ProxyLogger {
        backend: Arc::new(RwLock::new(Box::new(SilentLogger))),
    };

    log::set_boxed_logger(Box::new(proxy.clone())).expect("infallible");
    log::set_max_level(LevelFilter::Debug);

    proxy
});

impl ProxyLogger {
    /// Replace the active backend and reset the global maximum log level.
    pub fn switch<L: Log + 'static>(&self, backend: L, level_filter: LevelFilter) {
        *self.backend.write().unwrap() = Box::new(backend);
        log::set_max_level(level_filter);
    }
}

impl Log for ProxyLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.backend.read().unwrap().enabled(metadata)
    }

    fn log(&self, record: &Record) {
        self.backend.read().unwrap().log(record)
    }

    fn flush(&self) {
        self.backend.read().unwrap().flush()
    }
}
