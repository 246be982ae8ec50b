use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractoError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not read document: {0}")]
    Decode(String),

    #[error("No record for row {0} in this import")]
    UnknownRow(usize),

    #[error("Transfers without a destination account at rows: {}", join_rows(.0))]
    MissingDestination(Vec<usize>),

    #[error("Commit failed: {0}")]
    Commit(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

fn join_rows(rows: &[usize]) -> String {
    rows.iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, ExtractoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_destination_lists_rows() {
        let err = ExtractoError::MissingDestination(vec![3, 7]);
        assert_eq!(
            err.to_string(),
            "Transfers without a destination account at rows: 3, 7"
        );
    }
}
