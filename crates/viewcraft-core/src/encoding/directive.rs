//! In-band encoding directive on the first line of a template
//!
//! Recognized forms, anchored at byte 0:
//!
//! ```text
//! # encoding: ISO-8859-1
//! # -*- coding: utf-8 -*-
//! <%# encoding: Shift_JIS %>
//! ```

/// Remove an encoding directive from the first line, keeping its newline
///
/// Returns the declared label when a directive was found. Line numbers of the
/// remaining source are unchanged.
pub(crate) fn strip_encoding_directive(bytes: &mut Vec<u8>) -> Option<String> {
    let line_end = bytes
        .iter()
        .position(|&b| b == b'\n')
        .unwrap_or(bytes.len());
    let label = parse_directive(&bytes[..line_end])?;
    bytes.drain(..line_end);
    Some(label)
}

/// Extract the label from a directive line, if the line is one
fn parse_directive(line: &[u8]) -> Option<String> {
    // A directive is ASCII; anything else on line 1 cannot be one
    let line = std::str::from_utf8(line).ok()?;
    let line = line.strip_suffix('\r').unwrap_or(line);

    let body = if let Some(rest) = line.strip_prefix("<%#") {
        let rest = rest.trim_end().strip_suffix("%>")?;
        rest.strip_suffix('-').unwrap_or(rest)
    } else {
        line.strip_prefix('#')?
    };

    let at = body.find("coding")?;
    let after = &body[at + "coding".len()..];
    let after = after
        .strip_prefix(':')
        .or_else(|| after.strip_prefix('='))?;

    after
        .split_whitespace()
        .next()
        .map(|label| label.to_string())
}
