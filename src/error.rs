//! Failure types for the clustering request path.
//!
//! Construction-time problems (bad config, spawn failure) surface as
//! `anyhow::Error` with context; everything that can go wrong after a request
//! has been submitted is a [`ClusterError`], so callers can match on the
//! shape of the failure — in particular [`ClusterError::WorkerExited`], which
//! carries the dead worker's exit code, termination signal, and captured
//! stderr.

use thiserror::Error;

/// Post-mortem record of a worker process, attached to every request that
/// was outstanding (or submitted later) when the process died.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerFailure {
    /// Exit code, if the process exited rather than being signaled.
    pub code: Option<i32>,
    /// Termination signal, if the process was killed (Unix only).
    pub signal: Option<i32>,
    /// Everything the worker wrote to stderr over its lifetime.
    pub stderr: String,
}

/// Error returned from `submit` on a worker or pool.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The worker process terminated before this request's response was
    /// decoded, or the request was submitted after it had already died.
    #[error("worker exited (code {:?}, signal {:?}): {}", .0.code, .0.signal, .0.stderr.trim_end())]
    WorkerExited(WorkerFailure),

    /// An input vector's length does not match the worker's configured
    /// dimension. Detected before any bytes hit the wire, so the stream
    /// never desynchronizes.
    #[error("vector has {got} dimensions, worker is configured for {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Writing the request frame to the worker's stdin failed.
    #[error("failed to write request frame to worker: {0}")]
    Io(#[from] std::io::Error),

    /// The request's completion channel was dropped without a verdict.
    /// Should not happen while the worker tasks are running.
    #[error("worker dropped the request without responding")]
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_exited_display_includes_diagnostics() {
        let err = ClusterError::WorkerExited(WorkerFailure {
            code: Some(3),
            signal: None,
            stderr: "traceback: boom\n".to_string(),
        });
        let msg = err.to_string();
        assert!(msg.contains("Some(3)"));
        assert!(msg.contains("traceback: boom"));
    }

    #[test]
    fn dimension_mismatch_display() {
        let err = ClusterError::DimensionMismatch {
            expected: 1536,
            got: 1535,
        };
        assert_eq!(
            err.to_string(),
            "vector has 1535 dimensions, worker is configured for 1536"
        );
    }
}
