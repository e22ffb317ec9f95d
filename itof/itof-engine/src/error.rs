pub type Result<T> = std::result::Result<T, Error>;

/// Only the `Fatal` variant is ever returned to a caller of
/// `process_roi`/`complete`; every other recoverable condition from the
/// component design is folded into engine state (logged, and reflected as
/// `incomplete` on the affected FOV) rather than propagated.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("calibration store error: {0}")]
    Fatal(#[from] itof_calibration::Error),
    #[error("grid engine worker thread disconnected")]
    WorkerDisconnected,
    #[error("failed to spawn grid engine worker thread: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}
