use std::fmt::Arguments;
use std::io::{self, Stderr, Stdout, Write};

/// The user-facing report of a run. Progress goes to `out`, failures to `err`.
///
/// This is separate from `tracing` diagnostics, which are filtered by log level.
pub struct Console<O = Stdout, E = Stderr> {
    out: O,
    err: E,
}

impl Console {
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl<O: Write, E: Write> Console<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self { out, err }
    }

    pub fn line(&mut self, args: Arguments<'_>) -> io::Result<()> {
        self.out.write_fmt(args)?;
        self.out.write_all(b"\n")
    }

    pub fn error(&mut self, args: Arguments<'_>) -> io::Result<()> {
        self.err.write_fmt(args)?;
        self.err.write_all(b"\n")
    }

    /// A blank line followed by `=== title ===`.
    pub fn section(&mut self, title: &str) -> io::Result<()> {
        self.line(format_args!("\n=== {} ===", title))
    }

    pub fn into_parts(self) -> (O, E) {
        (self.out, self.err)
    }
}
