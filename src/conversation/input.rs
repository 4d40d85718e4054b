//! Validation of the values a user supplies at each step.

use std::num::NonZeroUsize;

use crate::error::InputError;

/// Uploaded number lists must carry this extension.
pub const INPUT_EXTENSION: &str = ".txt";

/// Check the uploaded document's name. Case-sensitive.
pub fn check_extension(file_name: &str) -> Result<(), InputError> {
    if file_name.ends_with(INPUT_EXTENSION) {
        Ok(())
    } else {
        Err(InputError::WrongExtension {
            file_name: file_name.to_string(),
        })
    }
}

/// Decode an uploaded file into its non-empty, trimmed lines.
///
/// Invalid UTF-8 is replaced rather than rejected; numbers are otherwise
/// kept verbatim.
pub fn parse_numbers(content: &[u8]) -> Result<Vec<String>, InputError> {
    let text = String::from_utf8_lossy(content);
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

    // Lone `\r` also ends a line.
    let numbers: Vec<String> = text
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();

    if numbers.is_empty() {
        return Err(InputError::EmptyFile);
    }
    Ok(numbers)
}

/// Parse a positive integer count.
pub fn parse_count(text: &str) -> Result<NonZeroUsize, InputError> {
    text.trim()
        .parse::<NonZeroUsize>()
        .map_err(|_| InputError::InvalidCount {
            input: text.to_string(),
        })
}

/// Require `file_count * per_file` to equal the number of uploaded numbers.
pub fn check_total(
    uploaded: usize,
    file_count: NonZeroUsize,
    per_file: NonZeroUsize,
) -> Result<(), InputError> {
    let expected = file_count.get().checked_mul(per_file.get());
    if expected == Some(uploaded) {
        Ok(())
    } else {
        Err(InputError::CountMismatch {
            uploaded,
            file_count: file_count.get(),
            per_file: per_file.get(),
            expected,
        })
    }
}

/// The contact name prefix. Any text is accepted, including empty.
pub fn name_prefix(text: &str) -> String {
    text.trim().to_string()
}

/// The output file base name; must not be empty after trimming.
pub fn file_base_name(text: &str) -> Result<String, InputError> {
    let name = text.trim();
    if name.is_empty() {
        Err(InputError::EmptyBaseName)
    } else {
        Ok(name.to_string())
    }
}
