use std::io::{self, Write};

/// Ordered list of header fields. A name may appear more than once; names are compared
/// case-insensitively, but written out as they were first given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    fields: Vec<(String, String)>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to a single value. The field keeps the position of the first existing
    /// field with that name; any others are removed. If there were none, the field is
    /// appended.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.position(name) {
            Some(idx) => {
                self.fields[idx].1 = value;
                let mut seen = 0;
                self.fields.retain(|(n, _)| {
                    if n.eq_ignore_ascii_case(name) {
                        seen += 1;
                        seen == 1
                    } else {
                        true
                    }
                });
            }
            None => self.fields.push((name.to_string(), value)),
        }
    }

    /// Append another field, even if one with the same name already exists.
    pub fn add(&mut self, name: &str, value: impl Into<String>) {
        self.fields.push((name.to_string(), value.into()));
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|idx| self.fields[idx].1.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Remove every field called `name`, returning whether there were any.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.fields.len();
        self.fields.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.fields.len() != before
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Write each field as `Name: value\r\n`, in order. Does _not_ write the blank line
    /// that ends the header block.
    ///
    /// Line breaks inside a value are turned into spaces, so a value can't start a new field.
    pub fn write_to<W: Write>(&self, output: &mut W) -> io::Result<()> {
        for (name, value) in self.iter() {
            let value = value.replace(['\r', '\n'], " ");
            write!(output, "{}: {}\r\n", name, value)?;
        }
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(header: &Header) -> String {
        let mut output = Vec::new();
        header.write_to(&mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_insertion_order_kept() {
        let mut header = Header::new();
        header.set("Subject", "Hello");
        header.set("From", "<a@example.com>");
        header.set("To", "<b@example.com>");

        assert_eq!(
            render(&header),
            "Subject: Hello\r\nFrom: <a@example.com>\r\nTo: <b@example.com>\r\n"
        );
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut header = Header::new();
        header.set("Subject", "first");
        header.add("X-Tag", "one");
        header.add("x-tag", "two");
        header.set("To", "<b@example.com>");

        header.set("X-TAG", "only");
        header.set("subject", "second");

        assert_eq!(header.len(), 3);
        assert_eq!(
            render(&header),
            "Subject: second\r\nX-Tag: only\r\nTo: <b@example.com>\r\n"
        );
    }

    #[test]
    fn test_repeated_fields() {
        let mut header = Header::new();
        header.add("Received", "by a");
        header.add("Received", "by b");

        assert_eq!(header.get("received"), Some("by a"));
        assert_eq!(header.get_all("Received").collect::<Vec<_>>(), ["by a", "by b"]);
        assert_eq!(render(&header), "Received: by a\r\nReceived: by b\r\n");

        assert!(header.contains("RECEIVED"));
        assert!(header.remove("RECEIVED"));
        assert!(!header.contains("Received"));
        assert!(header.is_empty());
        assert!(!header.remove("Received"));
    }

    #[test]
    fn test_line_breaks_in_values_neutralised() {
        let mut header = Header::new();
        header.set("Subject", "hi\r\nBcc: victim@example.com");

        assert_eq!(render(&header), "Subject: hi  Bcc: victim@example.com\r\n");
    }
}
