use std::io::{self, Write};

use mail_builder::headers::{content_type::ContentType, Header as _};
use mail_builder::mime::MimePart;

use crate::address::Address;
use crate::encoding::encode_text;
use crate::error::{Error, Result};
use crate::header::Header;

/// A minimal email message: a header block, an envelope (sender and recipients),
/// and a plain-text body with an optional HTML alternative.
///
/// Bodies are opaque bytes; nothing is validated or re-encoded. Both buffers are
/// `Vec<u8>`, so callers can `write!` into them.
///
/// ```
/// use std::io::Write;
///
/// let mut message = mailpost::Message::new("Hello", "a@example.com", &["b@example.com"]).unwrap();
/// write!(message.text_mut(), "Hi there").unwrap();
///
/// let mut output = Vec::new();
/// message.write_to(&mut output).unwrap();
/// assert_eq!(output, b"Subject: Hello\r\n\r\nHi there");
/// ```
#[derive(Debug, Clone)]
pub struct Message {
    header: Header,
    from: Address,
    to: Vec<Address>,
    text: Vec<u8>,
    html: Vec<u8>,
}

impl Message {
    /// Build a message, validating the sender and every recipient.
    ///
    /// The first invalid address aborts construction. The subject is stored under
    /// `Subject`, as RFC 2047 encoded words if it contains non-ASCII text.
    pub fn new<S: AsRef<str>>(subject: &str, from: &str, to: &[S]) -> Result<Message> {
        let from = Address::parse(from)?;

        if to.is_empty() {
            return Err(Error::NoRecipients);
        }
        let to = to
            .iter()
            .map(|addr| Address::parse(addr.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let mut header = Header::new();
        header.set("Subject", encode_text(subject, "Subject: ".len())?);

        Ok(Message {
            header,
            from,
            to,
            text: Vec::new(),
            html: Vec::new(),
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    pub fn from(&self) -> &Address {
        &self.from
    }

    pub fn to(&self) -> &[Address] {
        &self.to
    }

    pub fn text(&self) -> &[u8] {
        &self.text
    }

    pub fn text_mut(&mut self) -> &mut Vec<u8> {
        &mut self.text
    }

    pub fn html(&self) -> &[u8] {
        &self.html
    }

    pub fn html_mut(&mut self) -> &mut Vec<u8> {
        &mut self.html
    }

    /// Set the `From:` and `To:` headers from the envelope, and return the bare
    /// recipient addresses (for handing to the mail transfer agent).
    pub fn finalize(&mut self) -> Vec<String> {
        self.header.set("From", self.from.to_string());

        let rendered: Vec<String> = self.to.iter().map(|addr| addr.to_string()).collect();
        self.header.set("To", rendered.join(", "));

        self.to.iter().map(|addr| addr.address().to_string()).collect()
    }

    /// Serialize the message: header fields, a blank line, then the body.
    ///
    /// With no HTML body, the text body is written verbatim after the blank line. With one,
    /// a `multipart/alternative` body holding both parts is written instead.
    ///
    /// Does not modify the message, so calling it twice gives identical output. Any write
    /// error is returned as soon as it happens.
    pub fn write_to<W: Write>(&self, output: &mut W) -> io::Result<()> {
        self.header.write_to(output)?;

        if self.html.is_empty() {
            output.write_all(b"\r\n")?;
            output.write_all(&self.text)?;
        } else {
            self.write_alternative(output)?;
        }

        Ok(())
    }

    fn write_alternative<W: Write>(&self, output: &mut W) -> io::Result<()> {
        let boundary = self.boundary();

        output.write_all(b"MIME-Version: 1.0\r\nContent-Type: ")?;
        ContentType::new("multipart/alternative")
            .attribute("boundary", boundary.as_str())
            .write_header(&mut *output, "Content-Type: ".len())?;
        output.write_all(b"\r\n")?;

        for (content_type, body) in [("text/plain", &self.text), ("text/html", &self.html)] {
            write!(output, "--{}\r\n", boundary)?;
            MimePart::new(
                ContentType::new(content_type).attribute("charset", "utf-8"),
                body.as_slice(),
            )
            .write_part(&mut *output)?;
            output.write_all(b"\r\n")?;
        }

        write!(output, "--{}--\r\n", boundary)
    }

    /// First boundary of the form `mailpost-alt-N` that occurs in neither body.
    /// Deterministic, so that serializing is too.
    fn boundary(&self) -> String {
        (0u64..)
            .map(|n| format!("mailpost-alt-{}", n))
            .find(|candidate| {
                let needle = candidate.as_bytes();
                !contains(&self.text, needle) && !contains(&self.html, needle)
            })
            .unwrap_or_default()
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}
