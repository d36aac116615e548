//! Event and error printing.

use std::io::{self, Write};

use uevent::{Error, Uevent};

/// Print one event to stdout.
///
/// Text output is the `action path` line followed by the properties,
/// sorted by key, one per indented line. JSON output is one object per
/// line.
pub fn print_event(event: &Uevent, json: bool) -> io::Result<()> {
    let mut out = io::stdout().lock();
    if json {
        serde_json::to_writer(&mut out, event)?;
        writeln!(out)?;
    } else {
        write_text(&mut out, event)?;
    }
    out.flush()
}

/// Print one monitor error to stderr.
pub fn print_error(err: &Error) {
    if err.is_recoverable() {
        eprintln!("warning: {err}");
    } else {
        eprintln!("Error: {err}");
    }
}

fn write_text<W: Write>(w: &mut W, event: &Uevent) -> io::Result<()> {
    writeln!(w, "{} {}", event.action, event.kobject_path)?;

    let mut env: Vec<_> = event.env.iter().collect();
    env.sort();
    for (key, value) in env {
        writeln!(w, "    {key}={value}")?;
    }
    writeln!(w)
}
