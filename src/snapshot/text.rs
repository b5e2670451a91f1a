//! The snapshot text format.
//!
//! ```text
//! OBJ   := '{' (PAIR (',' PAIR)*)? '}'
//! PAIR  := CHILD | FACET
//! CHILD := '"-' name '":' OBJ
//! FACET := '"' facetType '":' '"' escaped(value) '"'
//! ```
//!
//! Children come first in sorted-name order, then facets in sorted-type order.
//! A facet type with several values is written as several pairs. Only
//! backslash and double quote are escaped. There is no version tag.

use super::{error::FormatError, NodeSnapshot};

pub(super) const CHILD_SIGIL: char = '-';

impl NodeSnapshot {
    pub fn to_text(&self) -> String {
        let mut output = String::new();
        write_object(self, &mut output);
        output
    }

    /// Reads snapshot text. Empty (or whitespace-only) text is the snapshot of
    /// a replica that has never been synced, and reads as an empty snapshot.
    pub fn from_text(text: &str) -> Result<NodeSnapshot, FormatError> {
        if text.trim().is_empty() {
            return Ok(NodeSnapshot::new());
        }

        let mut reader = Reader { text, index: 0 };
        let snapshot = reader.read_object()?;

        reader.skip_whitespace();
        if reader.index < text.len() {
            return Err(FormatError::new(
                reader.index,
                "unexpected characters after the end of the snapshot",
            ));
        }

        Ok(snapshot)
    }
}

fn write_object(snapshot: &NodeSnapshot, output: &mut String) {
    output.push('{');
    let mut first = true;

    for (name, child) in snapshot.children() {
        if !first {
            output.push(',');
        }
        first = false;

        output.push('"');
        output.push(CHILD_SIGIL);
        escape_into(name, output);
        output.push_str("\":");
        write_object(child, output);
    }

    for (type_name, values) in snapshot.facets().iter() {
        for value in values {
            if !first {
                output.push(',');
            }
            first = false;

            output.push('"');
            escape_into(type_name, output);
            output.push_str("\":\"");
            escape_into(value, output);
            output.push('"');
        }
    }

    output.push('}');
}

fn escape_into(value: &str, output: &mut String) {
    for c in value.chars() {
        match c {
            '\\' => output.push_str("\\\\"),
            '"' => output.push_str("\\\""),
            _ => output.push(c),
        }
    }
}

struct Reader<'a> {
    text: &'a str,
    index: usize,
}

impl Reader<'_> {
    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.index).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.peek() {
            self.index += 1;
        }
    }

    /// Consumes `expected` after any whitespace, or fails at the first
    /// non-whitespace byte.
    fn expect(&mut self, expected: u8) -> Result<(), FormatError> {
        if self.consume(expected) {
            Ok(())
        } else {
            Err(FormatError::new(
                self.index,
                format!("expected '{}'", expected as char),
            ))
        }
    }

    fn consume(&mut self, expected: u8) -> bool {
        self.skip_whitespace();

        if self.peek() == Some(expected) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn read_object(&mut self) -> Result<NodeSnapshot, FormatError> {
        self.expect(b'{')?;
        let mut snapshot = NodeSnapshot::new();

        if self.consume(b'}') {
            return Ok(snapshot);
        }

        loop {
            let key_index = self.index;
            let key = self.read_string()?;
            self.expect(b':')?;

            match key.strip_prefix(CHILD_SIGIL) {
                Some(name) => {
                    let name = name.to_owned();
                    let child = self.read_object()?;

                    if snapshot.insert_child(name.clone(), child).is_some() {
                        return Err(FormatError::new(
                            key_index,
                            format!("child {:?} appears twice in one object", name),
                        ));
                    }
                }
                None => {
                    let value = self.read_string()?;
                    snapshot.push_facet(key, value);
                }
            }

            if !self.consume(b',') {
                break;
            }
        }

        self.expect(b'}')?;
        Ok(snapshot)
    }

    /// Reads a quoted string. A backslash escapes a following backslash or
    /// quote; before any other character it stands for itself.
    fn read_string(&mut self) -> Result<String, FormatError> {
        self.expect(b'"')?;

        let start_index = self.index - 1;
        let bytes = self.text.as_bytes();
        let mut output = String::new();
        let mut segment_start = self.index;

        loop {
            match bytes.get(self.index) {
                None => {
                    return Err(FormatError::new(
                        start_index,
                        "unterminated string",
                    ));
                }
                Some(b'"') => {
                    output.push_str(&self.text[segment_start..self.index]);
                    self.index += 1;
                    return Ok(output);
                }
                Some(b'\\') => {
                    if let Some(b'\\' | b'"') = bytes.get(self.index + 1) {
                        output.push_str(&self.text[segment_start..self.index]);
                        segment_start = self.index + 1;
                        self.index += 2;
                    } else {
                        self.index += 1;
                    }
                }
                Some(_) => {
                    self.index += 1;
                }
            }
        }
    }
}
