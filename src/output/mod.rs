//! Output formatting and rendering
//!
//! Console formatting for per-iteration lines and the final summary, plus
//! the renderers that write the sample series to an SVG chart or a JSON
//! report.

mod colored;
mod formatter;
mod render;

pub use self::colored::{latency_color, ColorScheme, ColoredFormatter};
pub use formatter::{format_offset, format_rtt, FormattingOptions, IterationFormatter, PlainFormatter};
pub use render::{JsonRenderer, RenderOptions, SeriesRenderer, SvgRenderer, X_AXIS_LABEL, Y_AXIS_LABEL};

use crate::executor::{IterationObserver, IterationRecord};
use std::io::{self, Write};

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter based on color support and preferences
    pub fn create_formatter(enable_color: bool, verbose: bool) -> Box<dyn IterationFormatter> {
        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }

    /// Create a plain text formatter for scripts/logs
    pub fn create_plain_formatter() -> Box<dyn IterationFormatter> {
        Self::create_formatter(false, false)
    }
}

/// Prints one line per iteration to stdout as the run progresses
pub struct ConsoleObserver {
    formatter: Box<dyn IterationFormatter>,
}

impl ConsoleObserver {
    pub fn new(formatter: Box<dyn IterationFormatter>) -> Self {
        Self { formatter }
    }
}

impl IterationObserver for ConsoleObserver {
    fn on_iteration(&mut self, record: &IterationRecord) {
        let line = self.formatter.format_iteration(record);
        let mut stdout = io::stdout().lock();
        // A closed stdout (e.g. piped into `head`) must not stop the run.
        let _ = writeln!(stdout, "{}", line);
        let _ = stdout.flush();
    }
}
