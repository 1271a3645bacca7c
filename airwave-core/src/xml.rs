//! Well-formedness checks quick-xml leaves to the caller.  The reader happily
//! reports `Eof` in the middle of a document, and end names can't be checked
//! by it at all when case doesn't matter.

use quick_xml::{
    errors::IllFormedError,
    events::{BytesEnd, BytesStart},
    Error,
};

/// Names of the currently open elements, innermost last.
pub struct OpenElements {
    names: Vec<Vec<u8>>,
    ignore_case: bool,
}

impl OpenElements {
    pub fn new() -> Self {
        Self {
            names: Vec::new(),
            ignore_case: false,
        }
    }

    /// Tag names compare ASCII case-insensitively.
    pub fn ignoring_case() -> Self {
        Self {
            names: Vec::new(),
            ignore_case: true,
        }
    }

    pub fn start(&mut self, start: &BytesStart) {
        let name = self.normalize(start.name().as_ref());
        self.names.push(name);
    }

    /// Close the innermost element, which has to be the one `end` names.
    pub fn end(&mut self, end: &BytesEnd) -> Result<(), Error> {
        let found = self.normalize(end.name().as_ref());
        match self.names.pop() {
            Some(expected) if expected == found => Ok(()),
            Some(expected) => Err(Error::IllFormed(IllFormedError::MismatchedEndTag {
                expected: lossy(&expected),
                found: lossy(&found),
            })),
            None => Err(Error::IllFormed(IllFormedError::UnmatchedEndTag(lossy(
                &found,
            )))),
        }
    }

    /// At the end of input, every element must have been closed.
    pub fn finish(&self) -> Result<(), Error> {
        match self.names.last() {
            Some(name) => Err(Error::IllFormed(IllFormedError::MissingEndTag(lossy(name)))),
            None => Ok(()),
        }
    }

    fn normalize(&self, name: &[u8]) -> Vec<u8> {
        if self.ignore_case {
            name.to_ascii_lowercase()
        } else {
            name.to_vec()
        }
    }
}

fn lossy(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}
