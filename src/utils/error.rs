use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnnoError {
    #[error("Authentication required: {backend} needs a signed-in user")]
    AuthenticationRequired { backend: String },

    #[error("Annotation not found: {id}")]
    NotFound { id: String },

    #[error("Not authorized to modify annotation {id}")]
    NotAuthorized { id: String },

    #[error("Annotation already exists: {id}")]
    Conflict { id: String },

    #[error("Annotation server returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Storage error: {message}")]
    StorageError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Auth,
    Lookup,
    Permission,
    Network,
    Storage,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AnnoError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AnnoError::AuthenticationRequired { .. } => ErrorCategory::Auth,
            AnnoError::NotFound { .. } | AnnoError::Conflict { .. } => ErrorCategory::Lookup,
            AnnoError::NotAuthorized { .. } => ErrorCategory::Permission,
            AnnoError::Remote { .. } | AnnoError::ApiError(_) => ErrorCategory::Network,
            AnnoError::IoError(_)
            | AnnoError::SerializationError(_)
            | AnnoError::StorageError { .. } => ErrorCategory::Storage,
            AnnoError::ConfigError { .. }
            | AnnoError::ConfigValidationError { .. }
            | AnnoError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Lookup => ErrorSeverity::Low,
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Auth | ErrorCategory::Permission => ErrorSeverity::High,
            ErrorCategory::Storage | ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            AnnoError::AuthenticationRequired { .. } => {
                "Sign in before creating or changing annotations".to_string()
            }
            AnnoError::NotFound { id } => format!("No annotation with id '{}' exists", id),
            AnnoError::NotAuthorized { id } => {
                format!("Annotation '{}' belongs to another user", id)
            }
            AnnoError::Conflict { id } => format!("Annotation '{}' already exists", id),
            AnnoError::Remote { status, .. } => {
                format!("The annotation server rejected the request ({})", status)
            }
            AnnoError::ApiError(_) => "Could not reach the annotation server".to_string(),
            AnnoError::ConfigError { .. }
            | AnnoError::ConfigValidationError { .. }
            | AnnoError::InvalidConfigValueError { .. } => {
                format!("Configuration problem: {}", self)
            }
            _ => format!("Storage problem: {}", self),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Auth => "Configure a [session] user or sign in, then retry",
            ErrorCategory::Lookup => "List the page to check the annotation id",
            ErrorCategory::Permission => "Only the owner of an annotation can change it",
            ErrorCategory::Network => "Check the endpoint URL and that the server is running",
            ErrorCategory::Storage => "Check the storage path permissions and disk space",
            ErrorCategory::Configuration => "Fix the configuration file and run again",
        }
    }
}

pub type Result<T> = std::result::Result<T, AnnoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_errors_are_low_severity() {
        let err = AnnoError::NotFound {
            id: "anno/1".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Lookup);
        assert_eq!(err.severity(), ErrorSeverity::Low);
        assert!(err.user_friendly_message().contains("anno/1"));
    }

    #[test]
    fn test_permission_and_auth_are_high_severity() {
        let auth = AnnoError::AuthenticationRequired {
            backend: "document".to_string(),
        };
        let perm = AnnoError::NotAuthorized {
            id: "x".to_string(),
        };
        assert_eq!(auth.severity(), ErrorSeverity::High);
        assert_eq!(perm.category(), ErrorCategory::Permission);
    }

    #[test]
    fn test_server_rejections_are_network_errors() {
        let err = AnnoError::Remote {
            status: 422,
            message: "invalid canvas".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Network);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
        assert!(err.user_friendly_message().contains("422"));
    }
}
