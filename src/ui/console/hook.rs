use crate::debugger::{Breakpoint, EventHook, StopContext, StopReason, StoppedInstance};
use crate::ui::console::file::FileView;
use crate::ui::console::print::ExternalPrinter;
use crate::ui::console::print::style::{ErrorView, FilePathView, InstanceNameView, KeywordView};
use std::path::Path;
use std::sync::Arc;

pub struct TerminalHook {
    printer: ExternalPrinter,
    file_view: Arc<FileView>,
}

impl TerminalHook {
    pub fn new(printer: ExternalPrinter, file_view: Arc<FileView>) -> Self {
        Self { printer, file_view }
    }
}

impl EventHook for TerminalHook {
    fn on_stop(&self, context: &StopContext, instance: &StoppedInstance) -> anyhow::Result<()> {
        // The location and source listing print once; every further
        // instance of the same break adds a one-liner.
        if instance.index == 0 {
            let what = match context.reason {
                StopReason::Breakpoint => "breakpoint",
                StopReason::DataBreakpoint => "watchpoint",
                StopReason::Exception => "exception",
            };
            self.printer.println(format!(
                "Hit {what} at {}:{} (time {})",
                FilePathView::from(context.filename.as_str()),
                context.line_num,
                KeywordView::from(context.time),
            ));

            match self
                .file_view
                .render_around(Path::new(&context.filename), context.line_num, 2)
            {
                Ok(listing) => self.printer.print(listing),
                Err(e) => self
                    .printer
                    .println(format!("source unavailable: {e}")),
            }
        }

        self.printer.println(format!(
            "  [{}]: {}",
            instance.instance_id,
            InstanceNameView::from(instance.instance_name.as_str()),
        ));

        Ok(())
    }

    fn on_breakpoint_verified(&self, breakpoint: &Breakpoint) {
        log::debug!(
            target: "console",
            "breakpoint {} verified at {}:{}",
            breakpoint.id,
            breakpoint.filename,
            breakpoint.line_num
        );
    }

    fn on_session_end(&self) {
        self.printer
            .println(ErrorView::from("Debug session ended by the runtime"));
    }
}
