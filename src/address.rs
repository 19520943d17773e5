use std::fmt;
use std::str::FromStr;

use mailparse::{addrparse_header, parse_header, SingleInfo};

use crate::encoding::encode_mailbox;
use crate::error::{Error, Result};

/// Column at which an address starts in a `From: ` header; used when encoding names.
const FROM_COLUMN: usize = "From: ".len();

/// Characters allowed in an atom besides letters and digits (RFC 5322 `atext`).
const ATEXT_SPECIALS: &str = "!#$%&'*+-/=?^_`{|}~";

/// A single, syntactically valid mail address, with an optional display name.
///
/// ```
/// let addr: mailpost::Address = "Jane Doe <jane@example.com>".parse().unwrap();
/// assert_eq!(addr.name(), Some("Jane Doe"));
/// assert_eq!(addr.address(), "jane@example.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    name: Option<String>,
    address: String,
}

impl Address {
    /// Parse a single address, as it might appear in a `From:` or `To:` header.
    /// Encoded words in the display name are decoded.
    pub fn parse(input: &str) -> Result<Address> {
        if input.contains(['\r', '\n']) {
            return Err(Error::address(input, "line breaks are not allowed"));
        }

        let line = format!("From: {}", input);
        let (header, _) =
            parse_header(line.as_bytes()).map_err(|e| Error::address(input, e.to_string()))?;
        let list = addrparse_header(&header).map_err(|e| Error::address(input, e.to_string()))?;

        let count = list.len();
        let info: SingleInfo = list.extract_single_info().ok_or_else(|| {
            if count == 0 {
                Error::address(input, "no address found")
            } else if count > 1 {
                Error::address(input, "expected exactly one address")
            } else {
                Error::address(input, "groups are not allowed")
            }
        })?;

        check_nothing_trailing(input, &info.addr)?;
        check_addr_spec(input, &info.addr)?;

        let name = info
            .display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        Ok(Address {
            name,
            address: info.addr,
        })
    }

    /// The display name, if there was one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Bare `local@domain` form, as handed to the mail transfer agent.
    pub fn address(&self) -> &str {
        &self.address
    }
}

/// The parser stops quietly at some stray tokens (`a@b,`, `Name <a@b>;`), so check the
/// input really ends where the address does.
fn check_nothing_trailing(input: &str, addr: &str) -> Result<()> {
    let trimmed = input.trim();
    let complete = if trimmed.contains('<') {
        trimmed.ends_with(&format!("<{}>", addr))
    } else {
        trimmed == addr
    };

    if complete {
        Ok(())
    } else {
        Err(Error::address(input, "unexpected text after address"))
    }
}

fn is_atext(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || ATEXT_SPECIALS.contains(c)
        || (!c.is_ascii() && !c.is_whitespace() && !c.is_control())
}

/// `part` must be a dot-atom: atoms separated by single dots, none of them empty.
fn check_dot_atom(input: &str, part: &str, what: &str) -> Result<()> {
    if part.is_empty() {
        return Err(Error::address(input, format!("empty {}", what)));
    }
    for atom in part.split('.') {
        if atom.is_empty() {
            return Err(Error::address(
                input,
                format!("{} has a leading, trailing or doubled dot", what),
            ));
        }
        if let Some(c) = atom.chars().find(|&c| !is_atext(c)) {
            return Err(Error::address(
                input,
                format!("invalid character {:?} in {}", c, what),
            ));
        }
    }
    Ok(())
}

/// Check that the bare address is `local@domain`, both parts dot-atoms.
fn check_addr_spec(input: &str, addr: &str) -> Result<()> {
    let (local, domain) = addr
        .rsplit_once('@')
        .ok_or_else(|| Error::address(input, "missing '@'"))?;

    check_dot_atom(input, local, "local part")?;
    check_dot_atom(input, domain, "domain")
}

/// Renders the full form used in headers: `<addr>`, or `name <addr>` with the name quoted
/// or encoded as needed.
impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            None => write!(f, "<{}>", self.address),
            Some(name) => {
                let rendered =
                    encode_mailbox(name, &self.address, FROM_COLUMN).map_err(|_| fmt::Error)?;
                f.write_str(&rendered)
            }
        }
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Address> {
        Address::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(input: &str) -> Address {
        Address::parse(input).unwrap_or_else(|e| panic!("couldn't parse {:?}: {}", input, e))
    }

    fn assert_invalid(input: &str) {
        match Address::parse(input) {
            Err(Error::Address { .. }) => {}
            other => panic!("expected address error for {:?}, got {:?}", input, other),
        }
    }

    #[test]
    fn test_parse_bare_address() {
        let addr = parse_ok("a@example.com");
        assert_eq!(addr.name(), None);
        assert_eq!(addr.address(), "a@example.com");
        assert_eq!(addr.to_string(), "<a@example.com>");
    }

    #[test]
    fn test_parse_angle_address() {
        let addr = parse_ok("<b@example.com>");
        assert_eq!(addr.address(), "b@example.com");
        assert_eq!(addr.to_string(), "<b@example.com>");
    }

    #[test]
    fn test_parse_with_display_name() {
        let addr = parse_ok("Jane Doe <jane@example.com>");
        assert_eq!(addr.name(), Some("Jane Doe"));
        assert_eq!(addr.address(), "jane@example.com");
        assert!(addr.to_string().ends_with(" <jane@example.com>"), "rendered as {}", addr);

        let addr = parse_ok("\"Doe, Jane\" <jane@example.com>");
        assert_eq!(addr.name(), Some("Doe, Jane"));
    }

    #[test]
    fn test_unusual_but_valid_addresses() {
        assert_eq!(
            parse_ok("first.last+tag@sub.example.com").address(),
            "first.last+tag@sub.example.com"
        );
        assert_eq!(parse_ok("  <o'brien@example.ie>  ").address(), "o'brien@example.ie");
    }

    #[test]
    fn test_encoded_display_name_is_decoded() {
        let addr = parse_ok("=?utf-8?q?caf=C3=A9?= <a@example.com>");
        assert_eq!(addr.name(), Some("café"));
        assert_eq!(addr.address(), "a@example.com");
    }

    /// rendering, then parsing the rendering, gives back the same address
    #[test]
    fn test_rendered_form_reparses() {
        for input in [
            "a@example.com",
            "Jane Doe <jane@example.com>",
            "\"Doe, Jane\" <jane@example.com>",
            "José Núñez <jose@example.com>",
            "=?utf-8?q?Gr=C3=BC=C3=9Fe?= <g@example.de>",
        ] {
            let addr = parse_ok(input);
            let rendered = addr.to_string();
            assert!(rendered.is_ascii(), "rendered as {}", rendered);
            let reparsed = parse_ok(&rendered);
            assert_eq!(addr, reparsed, "rendered as {}", rendered);
        }
    }

    #[test]
    fn test_invalid_addresses() {
        assert_invalid("");
        assert_invalid("   ");
        assert_invalid("no-at-sign");
        assert_invalid("@example.com");
        assert_invalid("user@");
        assert_invalid("a@example.com, b@example.com");
        assert_invalid("friends: a@example.com, b@example.com;");
        assert_invalid("a@example.com>");
        assert_invalid("a@example.com;");
        assert_invalid("a@b,");
        assert_invalid("a@.");
        assert_invalid("a@example..com");
        assert_invalid("a.@example.com");
        assert_invalid(".a@example.com");
        assert_invalid("a@b@example.com");
        assert_invalid("Jane <jane@example.com>;");
        assert_invalid("a@example.com\r\nBcc: b@example.com");
    }

    #[test]
    fn test_from_str() {
        let addr: Address = "c@example.org".parse().unwrap();
        assert_eq!(addr.address(), "c@example.org");
        assert!("nope".parse::<Address>().is_err());
    }
}
