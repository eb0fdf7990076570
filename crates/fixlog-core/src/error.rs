#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Invalid classification rule '{pattern}': {reason}")]
    InvalidRule { pattern: String, reason: String },

    #[error("No record at line {0}")]
    RecordNotFound(usize),

    #[error("Project root not found")]
    ProjectRootNotFound,

    #[error("Reset not confirmed; pass --yes or type 'yes' at the prompt")]
    ResetNotConfirmed,

    #[error("Unusable tool event: {0}")]
    InvalidEvent(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_invalid_rule() {
        let err = AppError::InvalidRule {
            pattern: "(unclosed".into(),
            reason: "regex parse error".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid classification rule '(unclosed': regex parse error"
        );
    }

    #[test]
    fn test_display_record_not_found() {
        let err = AppError::RecordNotFound(42);
        assert_eq!(err.to_string(), "No record at line 42");
    }

    #[test]
    fn test_display_project_root_not_found() {
        assert_eq!(
            AppError::ProjectRootNotFound.to_string(),
            "Project root not found"
        );
    }

    #[test]
    fn test_display_reset_not_confirmed() {
        assert!(
            AppError::ResetNotConfirmed
                .to_string()
                .contains("--yes")
        );
    }

    #[test]
    fn test_display_invalid_event() {
        let err = AppError::InvalidEvent("missing tool_name".into());
        assert_eq!(err.to_string(), "Unusable tool event: missing tool_name");
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AppError>();
    }
}
