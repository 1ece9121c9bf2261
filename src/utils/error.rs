use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Directory API returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Record channel closed before the fetch finished")]
    ChannelClosed,

    #[error("Failed to resolve column '{column}' of table '{table}': {message}")]
    ResolutionError {
        table: String,
        column: String,
        message: String,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Cancellation,
    Data,
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl SyncError {
    pub fn resolution(table: &str, column: &str, message: impl Into<String>) -> Self {
        SyncError::ResolutionError {
            table: table.to_string(),
            column: column.to_string(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        SyncError::ConfigError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            SyncError::ConfigError { .. }
            | SyncError::InvalidConfigValueError { .. }
            | SyncError::MissingConfigError { .. }
            | SyncError::UrlError(_) => ErrorCategory::Configuration,
            SyncError::HttpError(_) | SyncError::ApiError { .. } => ErrorCategory::Network,
            SyncError::Cancelled | SyncError::ChannelClosed => ErrorCategory::Cancellation,
            SyncError::ResolutionError { .. } | SyncError::SerializationError(_) => {
                ErrorCategory::Data
            }
            SyncError::CsvError(_) | SyncError::IoError(_) | SyncError::ZipError(_) => {
                ErrorCategory::Storage
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            SyncError::Cancelled => ErrorSeverity::Low,
            SyncError::ResolutionError { .. } => ErrorSeverity::Medium,
            SyncError::ApiError {
                status: 401 | 403, ..
            } => ErrorSeverity::Critical,
            SyncError::HttpError(_) | SyncError::ApiError { .. } => ErrorSeverity::Medium,
            SyncError::ConfigError { .. }
            | SyncError::InvalidConfigValueError { .. }
            | SyncError::MissingConfigError { .. }
            | SyncError::UrlError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Network => format!("Could not read from the Directory API: {}", self),
            ErrorCategory::Cancellation => "The sync was stopped before it finished".to_string(),
            ErrorCategory::Data => format!("A record could not be converted: {}", self),
            ErrorCategory::Storage => format!("Could not write the sync output: {}", self),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            SyncError::ApiError { status: 401, .. } => {
                "Refresh the access token (GWS_ACCESS_TOKEN) and try again"
            }
            SyncError::ApiError { status: 403, .. } => {
                "Check that the token has the admin.directory.user.readonly scope"
            }
            SyncError::MissingConfigError { .. } => {
                "Provide the missing value on the command line or in the config file"
            }
            _ => match self.category() {
                ErrorCategory::Configuration => "Check the command line arguments and config file",
                ErrorCategory::Network => "Check network connectivity and the base URL",
                ErrorCategory::Cancellation => "Run the sync again to collect the remaining rows",
                ErrorCategory::Data => "Inspect the offending record in the Admin console",
                ErrorCategory::Storage => "Check that the output path is writable",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failures_are_critical() {
        let err = SyncError::ApiError {
            status: 403,
            message: "Not Authorized to access this resource/api".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Network);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(err.recovery_suggestion().contains("scope"));
    }

    #[test]
    fn test_cancellation_is_low_severity() {
        assert_eq!(SyncError::Cancelled.severity(), ErrorSeverity::Low);
        assert_eq!(SyncError::Cancelled.category(), ErrorCategory::Cancellation);
    }

    #[test]
    fn test_resolution_error_message() {
        let err = SyncError::resolution("googleworkspace_users", "organizations", "boom");
        assert_eq!(
            err.to_string(),
            "Failed to resolve column 'organizations' of table 'googleworkspace_users': boom"
        );
        assert_eq!(err.category(), ErrorCategory::Data);
    }
}
