use thiserror::Error;

#[derive(Error, Debug)]
pub enum TariffError {
    #[error("HTS code not found: {code}")]
    NotFound { code: String },

    #[error("Invalid input for '{field}' ({value}): {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Ambiguous rate for {code} from {country}: {reason}")]
    AmbiguousRate {
        code: String,
        country: String,
        reason: String,
    },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Reference data error in {source_name} (row {row}): {message}")]
    DataError {
        source_name: String,
        row: usize,
        message: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Worker task failed: {message}")]
    TaskFailed { message: String },
}

/// 錯誤分類，供 HTTP 層與 CLI 轉換成狀態碼 / 結束碼
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    InvalidInput,
    AmbiguousRate,
    Configuration,
    ReferenceData,
    System,
}

impl ErrorCategory {
    /// 對外的機器可讀代碼
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::InvalidInput => "invalid_input",
            ErrorCategory::AmbiguousRate => "ambiguous_rate",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::ReferenceData => "reference_data",
            ErrorCategory::System => "internal",
        }
    }
}

impl TariffError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TariffError::NotFound { .. } => ErrorCategory::NotFound,
            TariffError::InvalidInput { .. } => ErrorCategory::InvalidInput,
            TariffError::AmbiguousRate { .. } => ErrorCategory::AmbiguousRate,
            TariffError::ConfigError { .. } | TariffError::ConfigValidationError { .. } => {
                ErrorCategory::Configuration
            }
            TariffError::DataError { .. } | TariffError::CsvError(_) => {
                ErrorCategory::ReferenceData
            }
            TariffError::IoError(_)
            | TariffError::SerializationError(_)
            | TariffError::TaskFailed { .. } => ErrorCategory::System,
        }
    }

    pub fn invalid_input(
        field: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        TariffError::InvalidInput {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// CLI 結束碼
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::NotFound => 2,
            ErrorCategory::InvalidInput => 3,
            ErrorCategory::AmbiguousRate => 4,
            ErrorCategory::Configuration | ErrorCategory::ReferenceData => 5,
            ErrorCategory::System => 1,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::NotFound => "Check the HTS code, or use `search` to find the right classification",
            ErrorCategory::InvalidInput => "Correct the request fields and retry",
            ErrorCategory::AmbiguousRate => {
                "The rate table has no usable rate for this code/country; fix the reference data"
            }
            ErrorCategory::Configuration => "Review the TOML configuration file",
            ErrorCategory::ReferenceData => "Fix the offending row in the reference CSV file",
            ErrorCategory::System => "Check file permissions and disk state",
        }
    }
}

pub type Result<T> = std::result::Result<T, TariffError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_map_to_distinct_exit_codes() {
        let not_found = TariffError::NotFound {
            code: "9999999999".to_string(),
        };
        let invalid = TariffError::invalid_input("product_value", 0.0, "must be positive");
        let ambiguous = TariffError::AmbiguousRate {
            code: "0101.21.0010".to_string(),
            country: "FR".to_string(),
            reason: "general rate missing".to_string(),
        };

        assert_eq!(not_found.category().code(), "not_found");
        assert_eq!(invalid.category(), ErrorCategory::InvalidInput);
        assert_eq!(ambiguous.category().code(), "ambiguous_rate");
        assert_ne!(not_found.exit_code(), invalid.exit_code());
        assert_ne!(invalid.exit_code(), ambiguous.exit_code());
    }

    #[test]
    fn test_error_messages_name_the_field() {
        let err = TariffError::invalid_input("quantity", 0, "must be at least 1");
        assert!(err.to_string().contains("quantity"));
    }
}
