use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index engine error: {0}")]
    Engine(#[from] tantivy::TantivyError),

    #[error("query syntax error: {0}")]
    QuerySyntax(#[from] tantivy::query::QueryParserError),

    #[error("concurrent write pool error: {0}")]
    Concurrency(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("JSON output error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("data directory does not exist and could not be created: {}", .0.display())]
    DataDir(PathBuf),
}

impl Error {
    /// Whether a failure can be reported and skipped without ending the
    /// caller's session. Query parse failures are; everything else aborts
    /// the current run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::QuerySyntax(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_fatal() {
        let err = Error::from(std::io::Error::other("disk on fire"));
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("disk on fire"));
    }

    #[test]
    fn query_syntax_is_recoverable() {
        let parser_err =
            tantivy::query::QueryParserError::FieldDoesNotExist(
                "bogus".to_string(),
            );
        let err = Error::from(parser_err);
        assert!(err.is_recoverable());
    }

    #[test]
    fn config_error_display() {
        let err = Error::Config("unknown index mode: sideways".to_string());
        assert_eq!(
            err.to_string(),
            "configuration error: unknown index mode: sideways"
        );
    }
}
