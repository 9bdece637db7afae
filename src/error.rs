use thiserror::Error;

pub type MigrateResult<T> = Result<T, MigrateError>;

#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("No '{sheet}' tab found in {workbook}")]
    SheetNotFound { workbook: String, sheet: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid workbook ({workbook}): {message}")]
    InputFormat { workbook: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl MigrateError {
    pub fn not_found(workbook: impl Into<String>, sheet: impl Into<String>) -> Self {
        Self::SheetNotFound {
            workbook: workbook.into(),
            sheet: sheet.into(),
        }
    }

    pub fn input_format(workbook: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InputFormat {
            workbook: workbook.into(),
            message: message.into(),
        }
    }

    /// True for failures caused by the uploaded workbook or the plan rather than the host.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::SheetNotFound { .. } | Self::Configuration(_) | Self::InputFormat { .. }
        )
    }
}
