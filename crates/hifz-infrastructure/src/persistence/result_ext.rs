use hifz_domain::shared::DomainError;

/// Map foreign errors into `DomainError::Repository` with context
pub trait ResultExt<T> {
    fn map_repo_error(self, context: &str) -> Result<T, DomainError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn map_repo_error(self, context: &str) -> Result<T, DomainError> {
        self.map_err(|e| DomainError::Repository(format!("{}: {}", context, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_repo_error_adds_context() {
        let result: Result<(), &str> = Err("disk I/O error");
        match result.map_repo_error("Save value") {
            Err(DomainError::Repository(msg)) => assert_eq!(msg, "Save value: disk I/O error"),
            other => panic!("Expected repository error, got {:?}", other),
        }
    }
}
