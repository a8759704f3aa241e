use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced while building the ground-truth dataset.
///
/// Everything downstream of dataset construction (the training loop itself)
/// follows the framework's panic-on-failure conventions; annotation parsing
/// is the one place where malformed input is expected and worth a typed
/// error the caller can report with a file name attached.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed XML in {path}: {source}")]
    Xml {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error("annotation {path} is missing element <{element}>")]
    MissingElement { path: PathBuf, element: &'static str },

    #[error("annotation {path} has a non-numeric <{element}>: {value}")]
    BadNumber {
        path: PathBuf,
        element: &'static str,
        value: String,
    },

    #[error("no usable annotations found under {path}")]
    EmptyDataset { path: PathBuf },
}
