use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdminError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] rusqlite_migration::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{name} is not a {expected} field")]
    TypeNotSupported { name: String, expected: String },

    #[error("{schema} has no related object for {accessor}")]
    ObjectNotFound { schema: String, accessor: String },

    #[error("Formatting error: {0}")]
    Formatting(String),

    #[error("Unknown field {path} on {schema}")]
    FieldNotFound { schema: String, path: String },

    #[error("Unknown schema: {0}")]
    UnknownSchema(String),

    #[error("{schema} record not found: {pk}")]
    RecordNotFound { schema: String, pk: i64 },
}

impl AdminError {
    /// Errors the exporter renders into the offending cell instead of
    /// aborting the document.
    pub fn is_cell_error(&self) -> bool {
        matches!(
            self,
            AdminError::Formatting(_)
                | AdminError::ObjectNotFound { .. }
                | AdminError::RecordNotFound { .. }
                | AdminError::TypeNotSupported { .. }
                | AdminError::Xlsx(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AdminError>;
