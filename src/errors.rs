use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("CSV not found: {}", .0.display())]
    InputNotFound(PathBuf),
    #[error("CSV header missing required column: {column}\nHeaders found: {found:?}")]
    MissingColumn { column: String, found: Vec<String> },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Database(#[from] rusqlite::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("unable to decode input: {0}")]
    Encoding(String),
    #[error("{0}")]
    Config(String),
}

impl AppError {
    /// Process exit status for a run aborted by this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::InputNotFound(_) => 1,
            AppError::MissingColumn { .. } => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_input_errors_have_distinct_exit_codes() {
        let missing = AppError::InputNotFound(PathBuf::from("venues.csv"));
        let header = AppError::MissingColumn {
            column: "Venue".into(),
            found: vec!["Name".into()],
        };
        assert_eq!(missing.exit_code(), 1);
        assert_eq!(header.exit_code(), 2);
        assert!(header.to_string().contains("Venue"));
        assert!(missing.to_string().contains("venues.csv"));
    }
}
