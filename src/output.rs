//! Human-readable diagnostic stream for dry runs.
//!
//! The trace is shared by every group task, so writes go through a mutex. A
//! disabled trace drops everything.
use std::fmt;
use std::io::{self, Write};
use std::sync::Mutex;

pub struct Trace {
    sink: Option<Mutex<Box<dyn Write + Send>>>,
}

impl Trace {
    pub fn off() -> Self {
        Self { sink: None }
    }

    pub fn stdout() -> Self {
        Self::to_writer(io::stdout())
    }

    pub fn to_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            sink: Some(Mutex::new(Box::new(writer))),
        }
    }

    /// Write one line. Trace output is best-effort; a failed write is logged.
    pub fn line(&self, args: fmt::Arguments<'_>) {
        let Some(sink) = &self.sink else {
            return;
        };
        let mut writer = match sink.lock() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(err) = writeln!(writer, "{args}") {
            tracing::warn!(error = %err, "dry-run trace write failed");
        }
    }
}

macro_rules! trace_line {
    ($trace:expr, $($arg:tt)*) => {
        $trace.line(format_args!($($arg)*))
    };
}
pub(crate) use trace_line;


#[cfg(test)]
mod tests {
    use super::capture::SharedBuf;
    use super::*;

    #[test]
    fn disabled_trace_writes_nothing() {
        let trace = Trace::off();
        trace_line!(trace, "ignored {}", 1);
    }

    #[test]
    fn lines_are_newline_terminated() {
        let buf = SharedBuf::default();
        let trace = Trace::to_writer(buf.clone());
        trace_line!(trace, "Annotation Prefix: {}", "acme.io/chk/");
        trace_line!(trace, "second");
        assert_eq!(buf.contents(), "Annotation Prefix: acme.io/chk/\nsecond\n");
    }
}
