use std::net::TcpStream;
use std::sync::{Arc, Mutex};

use dap::events::{Event, StoppedEventBody};
use dap::server::ServerOutput;
use dap::types::StoppedEventReason;

use crate::debugger::{EventHook, StopContext, StopReason, StoppedInstance};

/// Relays session events to the IDE. One break event fans out into one
/// `stopped` event per hardware instance, each with its own thread id.
pub struct DapHook {
    output: Arc<Mutex<ServerOutput<TcpStream>>>,
}

impl DapHook {
    pub fn new(output: Arc<Mutex<ServerOutput<TcpStream>>>) -> DapHook {
        DapHook { output }
    }
}

impl EventHook for DapHook {
    fn on_stop(&self, context: &StopContext, instance: &StoppedInstance) -> anyhow::Result<()> {
        let reason = match context.reason {
            StopReason::Breakpoint => StoppedEventReason::Breakpoint,
            StopReason::DataBreakpoint => StoppedEventReason::Data,
            StopReason::Exception => StoppedEventReason::Exception,
        };

        let mut output = self.output.lock().unwrap();
        output.send_event(Event::Stopped(StoppedEventBody {
            reason,
            description: Some(format!(
                "{}:{} @ {}",
                context.filename, context.line_num, context.time
            )),
            thread_id: Some(instance.instance_id as i64),
            preserve_focus_hint: Some(instance.index != 0),
            text: None,
            all_threads_stopped: Some(false),
            hit_breakpoint_ids: Some(vec![
                crate::debugger::proto::split_id(instance.breakpoint_id).1 as i64,
            ]),
        }))?;

        Ok(())
    }

    fn on_session_end(&self) {
        let mut output = self.output.lock().unwrap();

        _ = output.send_event(Event::Terminated(None));
    }
}
