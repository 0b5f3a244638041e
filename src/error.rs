use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Classifier training error: {0}")]
    Training(String),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Errors that must halt a run before any output is written.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_are_fatal() {
        assert!(Error::Config("empty merge directive".to_string()).is_fatal());
        assert!(!Error::Training("no corpus".to_string()).is_fatal());
    }
}
