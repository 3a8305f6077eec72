use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DiskError {
    #[error("invalid disk image: {message}")]
    InvalidImage { message: String },

    #[error("file '{name}' not found")]
    NotFound { name: String },

    #[error("not enough free space: need {needed} granules, {free} free")]
    #[diagnostic(help("delete files from the image or format a larger geometry"))]
    OutOfSpace { needed: usize, free: usize },

    #[error("directory is full")]
    #[diagnostic(help("a DECB directory holds at most 72 entries"))]
    DirectoryFull,

    #[error("OS-9 volumes are read-only")]
    ReadOnly,

    #[error("'{name}' is a directory, not a file")]
    IsDirectory { name: String },

    #[error("invalid file name '{name}': {reason}")]
    #[diagnostic(help("DECB names are 8.3 printable ASCII, e.g. PROGRAM.BAS"))]
    BadName { name: String, reason: String },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}
