//! Result formatting.

use std::io::{self, Write};

/// Render selected interfaces as one name per line, each newline-terminated.
#[must_use]
pub fn render(interfaces: &[String]) -> String {
    interfaces.iter().fold(String::new(), |mut out, name| {
        out.push_str(name);
        out.push('\n');
        out
    })
}

/// Write the rendered selection in one call and flush.
///
/// # Errors
///
/// Returns an error if writing to `out` fails.
pub fn write_selection(out: &mut impl Write, interfaces: &[String]) -> io::Result<()> {
    out.write_all(render(interfaces).as_bytes())?;
    out.flush()
}
