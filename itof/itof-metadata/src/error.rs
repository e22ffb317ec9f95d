pub type Result<T> = std::result::Result<T, DecodeError>;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("buffer too small: need at least {needed} words, got {got}")]
    TooSmall { needed: usize, got: usize },
    #[error("unsupported sensor mode {0}")]
    UnsupportedSensorMode(u16),
    #[error("modulation indices not adjacent: f0={f0} f1={f1}")]
    NonAdjacentModIdx { f0: u16, f1: u16 },
    #[error("modulation index out of range: {0}")]
    ModIdxOutOfRange(u16),
}
