use super::types::EngineError;

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    pub retryable: bool,
}

impl EngineError {
    /// Classify this error to determine its type and whether it can be retried.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            EngineError::RateLimit(_) => ErrorClassification {
                error_type: "RateLimitError",
                retryable: true,
            },
            EngineError::Billing(_) => ErrorClassification {
                error_type: "BillingError",
                retryable: true,
            },
            EngineError::Network(_) => ErrorClassification {
                error_type: "NetworkError",
                retryable: true,
            },
            EngineError::Timeout(_) => ErrorClassification {
                error_type: "TimeoutError",
                retryable: true,
            },
            EngineError::OutputValidation(_) => ErrorClassification {
                error_type: "OutputValidationError",
                retryable: true,
            },
            EngineError::LlmApi(_) => ErrorClassification {
                error_type: "LlmApiError",
                retryable: true,
            },
            EngineError::CloudApi(_) => ErrorClassification {
                error_type: "CloudApiError",
                retryable: true,
            },

            EngineError::Credential(_) => ErrorClassification {
                error_type: "CredentialError",
                retryable: false,
            },
            EngineError::Config(_) => ErrorClassification {
                error_type: "ConfigError",
                retryable: false,
            },
            EngineError::Cancelled(_) => ErrorClassification {
                error_type: "CancelledError",
                retryable: false,
            },

            EngineError::Io(_) => ErrorClassification {
                error_type: "IoError",
                retryable: true,
            },
            EngineError::Json(_) => ErrorClassification {
                error_type: "JsonError",
                retryable: true,
            },
            EngineError::Yaml(_) => ErrorClassification {
                error_type: "YamlError",
                retryable: true,
            },
            EngineError::Persistence(_) => ErrorClassification {
                error_type: "PersistenceError",
                retryable: true,
            },
            EngineError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                retryable: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_is_retryable() {
        let err = EngineError::RateLimit("too many requests".into());
        let class = err.classify();
        assert!(class.retryable);
        assert_eq!(class.error_type, "RateLimitError");
    }

    #[test]
    fn credential_error_not_retryable() {
        let err = EngineError::Credential("bad key".into());
        assert!(!err.classify().retryable);
    }

    #[test]
    fn config_error_not_retryable() {
        let err = EngineError::Config("invalid config".into());
        assert!(!err.classify().retryable);
    }

    #[test]
    fn network_error_retryable() {
        let err = EngineError::Network("connection refused".into());
        assert!(err.classify().retryable);
    }

    #[test]
    fn timeout_retryable() {
        let err = EngineError::Timeout("timed out".into());
        assert!(err.classify().retryable);
    }

    #[test]
    fn billing_retryable() {
        let err = EngineError::Billing("quota exceeded".into());
        assert!(err.classify().retryable);
    }

    #[test]
    fn cancelled_not_retryable() {
        let err = EngineError::Cancelled("deadline exceeded".into());
        assert!(!err.classify().retryable);
    }
}
