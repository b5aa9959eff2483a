use thiserror::Error;

/// Errors surfaced by the ingestion pipeline
///
/// Every variant renders as the user-facing message shown next to the input
/// form. None of them is fatal: callers report the text and stay usable.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid file type. Please upload CSV, XLS, or XLSX.")]
    FileTypeRejected,

    #[error("File is too large. Maximum upload size is {limit} bytes.")]
    FileTooLarge { limit: usize },

    #[error("Could not parse file. Ensure SMILES are in the first column of a valid Excel (xlsx, xls) or CSV file.")]
    FileParseFailed(String),

    #[error("No valid SMILES found in file. Check format (SMILES in first column, optional header).")]
    NoValidSmilesInFile,

    #[error("No SMILES input. Enter in textarea or upload file.")]
    NoInputProvided,

    #[error("Max {limit} compounds allowed. You provided {provided}.")]
    CountExceeded { limit: usize, provided: usize },

    #[error("Confidence interval must be between 1 and 99, got {0}.")]
    InvalidPercentage(String),

    /// Non-2xx responses, transport failures and malformed bodies
    #[error("{0}")]
    Network(String),

    #[error("A prediction request is already in progress.")]
    Busy,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "web")]
    #[error("XLSX error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

impl Error {
    /// Whether the error was caused by what the user submitted rather than
    /// by the prediction service or the host.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::FileTypeRejected
                | Error::FileTooLarge { .. }
                | Error::FileParseFailed(_)
                | Error::NoValidSmilesInFile
                | Error::NoInputProvided
                | Error::CountExceeded { .. }
                | Error::InvalidPercentage(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
