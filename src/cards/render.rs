//! vCard 3.0 record rendering.
//!
//! This is a fixed format contract, not a general vCard encoder: prefix and
//! number are written verbatim with no escaping or normalization.

use std::fmt;
use std::fmt::Write as _;

/// One contact entry, derived on the fly while rendering a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardRecord<'a> {
    /// 1-based position across the whole input, used as the name suffix.
    pub index: usize,
    pub prefix: &'a str,
    pub number: &'a str,
}

impl CardRecord<'_> {
    /// The `FN` value: `"<prefix> <index>"`.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.prefix, self.index)
    }
}

impl fmt::Display for CardRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "BEGIN:VCARD")?;
        writeln!(f, "VERSION:3.0")?;
        writeln!(f, "FN:{}", self.display_name())?;
        writeln!(f, "TEL;TYPE=CELL:{}", self.number)?;
        writeln!(f, "END:VCARD")?;
        writeln!(f)
    }
}

/// Render a chunk of numbers into card text.
///
/// `start_index` is the 0-based global offset of the chunk's first number, so
/// the j-th record gets display index `start_index + j + 1`.
pub fn render(chunk: &[String], prefix: &str, start_index: usize) -> String {
    let mut out = String::with_capacity(chunk.len() * (64 + prefix.len()));
    for (j, number) in chunk.iter().enumerate() {
        let record = CardRecord {
            index: start_index + j + 1,
            prefix,
            number,
        };
        // Writing into a String cannot fail.
        let _ = write!(out, "{record}");
    }
    out
}
