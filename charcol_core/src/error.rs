use thiserror::Error;

/// Error type for column write and read operations.
///
/// All failures surface to the caller of the writer/reader entry point; no
/// partial success is reported. After a failed write the output stream is
/// left at an unspecified position and the partial column must be discarded.
#[derive(Error, Debug)]
pub enum ColumnError {
    #[error("column must contain at least one element")]
    EmptyInput,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("compression failed: {0}")]
    Compressor(String),

    #[error("decompression failed: {0}")]
    Decompressor(String),

    #[error("corrupt column: {0}")]
    CorruptFormat(String),

    #[error("block of {size} bytes exceeds the {max} byte block cap")]
    Oversize { size: usize, max: usize },
}
