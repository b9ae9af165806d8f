//! Crate-wide error type
//!
//! Numerical degeneracies (coincident particle centers) and empty scenes are
//! not errors; they are skipped where they occur. What surfaces here is bad
//! input and misuse of the worker pool.

use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid construction or configuration parameter.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// Work was submitted to a pool that has been shut down.
    #[error("worker pool is closed")]
    PoolClosed,

    /// One or more slices of a dispatch panicked. Every other slice still ran
    /// to completion before this was reported.
    #[error("{panicked} dispatched task(s) panicked")]
    TaskPanicked { panicked: usize },

    /// Worker threads could not be started.
    #[error("failed to build worker pool: {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),

    /// Settings file failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Malformed settings JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::InvalidParam("radius must be > 0".to_string());
        let msg = e.to_string();
        assert!(msg.contains("invalid parameter"));
        assert!(msg.contains("radius"));

        let e = Error::TaskPanicked { panicked: 2 };
        assert_eq!(e.to_string(), "2 dispatched task(s) panicked");
    }

    #[test]
    fn test_json_error_converts() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        let e: Error = err.into();
        assert!(matches!(e, Error::Json(_)));
    }
}
