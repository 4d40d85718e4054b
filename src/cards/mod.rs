//! vCard generation — slicing a number list into files and rendering records.

pub mod partition;
pub mod render;

pub use partition::{Chunk, OutputFile, output_file_name, partition, render_files};
pub use render::{CardRecord, render};

/// Extension of generated card files (without the dot).
pub const OUTPUT_EXTENSION: &str = "vcf";
