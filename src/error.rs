use rusqlite::Error as RusqliteError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubtrackError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error), // Converts io::Error into SubtrackError automatically

    #[error("Database error: {0}")]
    DatabaseError(#[from] RusqliteError), // Converts rusqlite::Error automatically

    #[error("Connection pool error: {0}")]
    PoolError(#[from] r2d2::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Invalid row at line {line}: {message}")]
    InvalidRow { line: u64, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Error: {0}")]
    Error(String), // Allows custom application errors
}
