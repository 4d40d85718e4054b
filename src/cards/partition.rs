//! Partitioner — slices the uploaded numbers into equally sized output files.

use crate::error::CardError;

use super::OUTPUT_EXTENSION;
use super::render::render;

/// A contiguous slice of the input assigned to one output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    /// 1-based file number.
    pub file_number: usize,
    /// 0-based global offset of the first number in this chunk.
    pub start_index: usize,
    pub numbers: &'a [String],
}

/// A rendered card file, ready to hand to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub file_name: String,
    pub contents: String,
}

impl OutputFile {
    pub fn into_bytes(self) -> Vec<u8> {
        self.contents.into_bytes()
    }
}

/// Name of the `n`-th (1-based) output file: `<base>_<n>.vcf`.
pub fn output_file_name(base: &str, file_number: usize) -> String {
    format!("{base}_{file_number}.{OUTPUT_EXTENSION}")
}

/// Split `numbers` into `file_count` chunks of exactly `per_file` numbers.
///
/// Chunks keep the input order; chunk `i` holds
/// `numbers[i * per_file..(i + 1) * per_file]`.
pub fn partition(
    numbers: &[String],
    file_count: usize,
    per_file: usize,
) -> Result<Vec<Chunk<'_>>, CardError> {
    if file_count == 0 || per_file == 0 {
        return Err(CardError::ZeroCount);
    }
    if file_count.checked_mul(per_file) != Some(numbers.len()) {
        return Err(CardError::CountMismatch {
            numbers: numbers.len(),
            file_count,
            per_file,
        });
    }

    Ok(numbers
        .chunks_exact(per_file)
        .enumerate()
        .map(|(i, slice)| Chunk {
            file_number: i + 1,
            start_index: i * per_file,
            numbers: slice,
        })
        .collect())
}

/// Partition and render every chunk into a named card file.
pub fn render_files(
    numbers: &[String],
    file_count: usize,
    per_file: usize,
    prefix: &str,
    base_name: &str,
) -> Result<Vec<OutputFile>, CardError> {
    let chunks = partition(numbers, file_count, per_file)?;
    Ok(chunks
        .into_iter()
        .map(|chunk| OutputFile {
            file_name: output_file_name(base_name, chunk.file_number),
            contents: render(chunk.numbers, prefix, chunk.start_index),
        })
        .collect())
}
