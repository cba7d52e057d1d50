use super::editor::HgdbEditor;
use rustyline::ExternalPrinter as RLExternalPrinter;
use std::cell::RefCell;
use std::fmt::Display;

/// Print messages to stdout without tearing the prompt line.
///
/// Break events arrive asynchronously while `readline` owns the terminal;
/// rustyline's external printer repaints the prompt after each message.
pub struct ExternalPrinter {
    printer: RefCell<Box<dyn RLExternalPrinter>>,
}

unsafe impl Send for ExternalPrinter {}
unsafe impl Sync for ExternalPrinter {}

impl ExternalPrinter {
    pub fn new(editor: &mut HgdbEditor) -> rustyline::Result<Self> {
        let printer = editor.create_external_printer()?;
        Ok(Self {
            printer: RefCell::new(Box::new(printer)),
        })
    }

    pub fn print(&self, msg: impl Display) {
        self.printer
            .borrow_mut()
            .print(msg.to_string())
            .expect("external printer error");
    }

    pub fn println(&self, msg: impl Display) {
        self.print(format!("{msg}\n"))
    }
}

pub mod style {
    use crossterm::style::{Color, Stylize};
    use std::fmt::{Display, Formatter};

    const UNKNOWN_PLACEHOLDER: &str = "???";

    struct View<T: Display> {
        inner: Option<T>,
        color: Color,
    }

    impl<T: Display> Display for View<T> {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            let rendered = self
                .inner
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| UNKNOWN_PLACEHOLDER.to_string());

            f.write_fmt(format_args!("{}", rendered.with(self.color)))
        }
    }

    /// Construct a view type to display data of one kind (file paths,
    /// instance names, etc.) in a consistent color.
    macro_rules! view_struct {
        ($name: ident, $color: expr) => {
            pub struct $name<T: Display>(View<T>);

            impl<T: Display> From<T> for $name<T> {
                fn from(value: T) -> Self {
                    Self(View {
                        inner: Some(value),
                        color: $color,
                    })
                }
            }

            impl<T: Display> From<Option<T>> for $name<T> {
                fn from(value: Option<T>) -> Self {
                    Self(View {
                        inner: value,
                        color: $color,
                    })
                }
            }

            impl<T: Display> Display for $name<T> {
                fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                    self.0.fmt(f)
                }
            }
        };
    }

    view_struct!(FilePathView, Color::Green);
    view_struct!(InstanceNameView, Color::Yellow);
    view_struct!(KeywordView, Color::Magenta);
    view_struct!(TimeView, Color::Cyan);
    view_struct!(ErrorView, Color::Red);
    view_struct!(ImportantView, Color::DarkYellow);
}
