//! Console hex dump of the raw input.

use core::fmt::Write;

/// Bytes printed per row.
pub const BYTES_PER_ROW: usize = 16;

/// Render `bytes` as `"%02X "` cells, sixteen per line.
#[must_use]
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3 + bytes.len() / BYTES_PER_ROW);
    for (i, b) in bytes.iter().enumerate() {
        // Writing into a String cannot fail.
        let _ = write!(out, "{b:02X} ");
        if i % BYTES_PER_ROW == BYTES_PER_ROW - 1 {
            out.push('\n');
        }
    }
    out
}
