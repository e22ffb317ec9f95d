pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("CsvError: {0}")]
    Csv(#[from] csv::Error),
    #[error(
        "mapping table has wrong record count: expected {expected}, got {got}"
    )]
    LengthMismatch { expected: usize, got: usize },
}
