//! Header-safe rendering of text and mailboxes, via `mail-builder`'s header types.
//!
//! Text that is already safe for a header (printable ASCII, spaces and tabs) is passed
//! through untouched; anything else comes out as RFC 2047 encoded words.

use std::io;

use mail_builder::headers::{address, text::Text, Header};

/// Whether `text` contains anything that can't appear verbatim in a header field.
pub fn needs_encoding(text: &str) -> bool {
    text.chars().any(|c| (c < ' ' || c > '~') && c != '\t')
}

/// Render a header value into a single line. `column` is where the value starts, i.e.
/// the length of `Name: `.
///
/// `mail-builder` folds long values and terminates them with CRLF; both are undone here,
/// since the value goes back into our own header list.
fn render_value<H: Header>(value: &H, column: usize) -> io::Result<String> {
    let mut buf = Vec::new();
    value.write_header(&mut buf, column)?;

    let rendered = String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(rendered.replace("\r\n", "").trim_end().to_string())
}

/// Encode unstructured text (a subject, say) for a header field starting at `column`.
///
/// ```
/// assert_eq!(mailpost::encode_text("Hello", 9).unwrap(), "Hello");
/// assert!(mailpost::encode_text("café", 9).unwrap().starts_with("=?"));
/// ```
pub fn encode_text(text: &str, column: usize) -> io::Result<String> {
    if !needs_encoding(text) {
        return Ok(text.to_string());
    }
    render_value(&Text::new(text), column)
}

/// `name <address>`, with the name quoted or encoded as needed.
pub fn encode_mailbox(name: &str, email: &str, column: usize) -> io::Result<String> {
    render_value(&address::Address::new_address(Some(name), email), column)
}
