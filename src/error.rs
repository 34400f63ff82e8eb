use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Invalid upload: {0}")]
    Validation(String),

    #[error("Unrecognized spreadsheet format: {0}")]
    UnrecognizedFormat(String),

    #[error("Failed to read workbook: {0}")]
    Xlsx(#[from] calamine::XlsxError),

    #[error("Failed to read legacy workbook: {0}")]
    Xls(#[from] calamine::XlsError),

    #[error("Failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("File {0} not found")]
    FileNotFound(i64),

    #[error("Sheet {sheet_index} not found for file {file_id}")]
    SheetNotFound { file_id: i64, sheet_index: usize },

    #[error("Blob storage error: {0}")]
    Storage(String),

    #[cfg(feature = "gemini")]
    #[error("Assistant request failed: {0}")]
    Assistant(String),

    #[cfg(feature = "gemini")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ReportError {
    /// Whether this error came out of spreadsheet decoding. The ingestion
    /// pipeline records these on the file as `FileStatus::Failed` instead of
    /// aborting the whole operation.
    pub fn is_parse_failure(&self) -> bool {
        matches!(
            self,
            ReportError::UnrecognizedFormat(_)
                | ReportError::Xlsx(_)
                | ReportError::Xls(_)
                | ReportError::Csv(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
