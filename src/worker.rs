//! One external clustering worker process.
//!
//! A [`ClusterWorker`] owns a spawned subprocess and multiplexes any number
//! of in-flight requests over its stdin/stdout pipes. A single worker
//! processes requests strictly in the order their frames hit its input
//! stream, so pending completion handles live in a FIFO queue whose order
//! must always match wire order: the handle push and the frame write both
//! happen while holding the stdin lock, so concurrent submitters can never
//! interleave them.
//!
//! The queue itself sits behind its own short-lived (non-async) lock, shared
//! with the stdout reader. The reader must be able to drain the pipe while a
//! submitter is blocked mid-write on a full stdin buffer — if it waited on
//! the writer's lock, a worker stalled on its own output would deadlock the
//! whole pair of pipes.
//!
//! Three background tasks service the process:
//! - the stdout reader reassembles fixed-size response frames (a single pipe
//!   read may complete zero, one, or many responses) and resolves the oldest
//!   pending handle per frame;
//! - the stderr reader accumulates diagnostics until the stream ends;
//! - the exit watcher waits for the process to die — cleanly, crashed, or
//!   killed via [`ClusterWorker::destroy`] — then rejects everything still
//!   pending with the exit code, signal, and the complete stderr text.

use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::ClusterConfig;
use crate::error::{ClusterError, WorkerFailure};
use crate::frame::FrameBuffer;
use crate::wire;

type CentroidResult = Result<Vec<Vec<f32>>, ClusterError>;

/// The per-worker FIFO of completion handles. The exit watcher swaps in
/// `Dead` in the same critical section as the rejection fan-out, so a caller
/// that has observed a rejection can rely on later submissions failing fast
/// instead of hanging on a process that will never answer.
#[derive(Debug)]
enum PendingState {
    Open(VecDeque<oneshot::Sender<CentroidResult>>),
    Dead(WorkerFailure),
}

type Pending = Mutex<PendingState>;

fn lock_pending(pending: &Pending) -> std::sync::MutexGuard<'_, PendingState> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to one external clustering worker.
///
/// Cheap to share behind an `Arc`; all methods take `&self`. Teardown is
/// explicit — dropping the handle leaves the process running.
#[derive(Debug)]
pub struct ClusterWorker {
    dimensions: usize,
    n_clusters: usize,
    /// Serializes submissions; holding this lock defines wire order.
    stdin: tokio::sync::Mutex<ChildStdin>,
    pending: Arc<Pending>,
    kill: Mutex<Option<oneshot::Sender<()>>>,
}

impl ClusterWorker {
    /// Spawn the configured worker process and wire up its pipes.
    ///
    /// The worker's dimension and cluster count are appended to the command
    /// line as positional arguments. Must be called from within a tokio
    /// runtime.
    pub fn spawn(config: &ClusterConfig) -> Result<Self> {
        if config.dimensions == 0 || config.n_clusters == 0 {
            anyhow::bail!("worker dimensions and n_clusters must be > 0");
        }

        let mut child = Command::new(&config.worker.program)
            .args(&config.worker.args)
            .arg(config.dimensions.to_string())
            .arg(config.n_clusters.to_string())
            .envs(&config.worker.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| {
                format!("Failed to spawn clustering worker: {}", config.worker.program)
            })?;

        let stdin = child.stdin.take().context("worker stdin was not piped")?;
        let stdout = child.stdout.take().context("worker stdout was not piped")?;
        let stderr = child.stderr.take().context("worker stderr was not piped")?;

        let pending = Arc::new(Mutex::new(PendingState::Open(VecDeque::new())));
        let (kill_tx, kill_rx) = oneshot::channel();

        let stderr_task = tokio::spawn(read_stderr(stderr));
        tokio::spawn(read_responses(
            stdout,
            Arc::clone(&pending),
            config.dimensions,
            config.n_clusters,
        ));
        tokio::spawn(watch_exit(child, kill_rx, stderr_task, Arc::clone(&pending)));

        debug!(
            program = %config.worker.program,
            dimensions = config.dimensions,
            n_clusters = config.n_clusters,
            "spawned clustering worker"
        );

        Ok(Self {
            dimensions: config.dimensions,
            n_clusters: config.n_clusters,
            stdin: tokio::sync::Mutex::new(stdin),
            pending,
            kill: Mutex::new(Some(kill_tx)),
        })
    }

    /// Embedding dimension this worker was spawned with.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of centroids per response.
    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    /// Submit a batch of vectors and wait for its centroids.
    ///
    /// Responses resolve in submission order per worker, no matter how many
    /// submissions are in flight concurrently.
    ///
    /// # Errors
    ///
    /// - [`ClusterError::DimensionMismatch`] if any vector's length differs
    ///   from the configured dimension (checked before any bytes are
    ///   written).
    /// - [`ClusterError::WorkerExited`] if the process dies before this
    ///   request's response arrives, or had already died when the request
    ///   was submitted.
    /// - [`ClusterError::Io`] if writing the request frame fails.
    pub async fn submit(&self, vectors: Vec<Vec<f32>>) -> CentroidResult {
        for vector in &vectors {
            if vector.len() != self.dimensions {
                return Err(ClusterError::DimensionMismatch {
                    expected: self.dimensions,
                    got: vector.len(),
                });
            }
        }

        let frame = wire::request_frame(&vectors);
        let (tx, rx) = oneshot::channel();

        {
            let mut stdin = self.stdin.lock().await;

            // Queue position must agree with wire position: the push happens
            // under the stdin lock, before any of this frame's bytes go out.
            match &mut *lock_pending(&self.pending) {
                PendingState::Dead(failure) => {
                    return Err(ClusterError::WorkerExited(failure.clone()));
                }
                PendingState::Open(pending) => pending.push_back(tx),
            }

            let mut written = stdin.write_all(&frame).await;
            if written.is_ok() {
                written = stdin.flush().await;
            }
            if let Err(err) = written {
                // Retract our handle — still the newest entry, since the
                // stdin lock is held. If the queue died in the meantime the
                // fan-out already rejected it; fall through to that verdict.
                let retracted = match &mut *lock_pending(&self.pending) {
                    PendingState::Open(pending) => pending.pop_back().is_some(),
                    PendingState::Dead(_) => false,
                };
                if retracted {
                    return Err(ClusterError::Io(err));
                }
            }
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(ClusterError::Disconnected),
        }
    }

    /// Forcibly terminate the worker process (SIGKILL, no graceful shutdown,
    /// no drain). Requests still in flight are rejected with
    /// [`ClusterError::WorkerExited`] once the process is gone.
    pub fn destroy(&self) {
        let kill = lock_kill(&self.kill).take();
        if let Some(kill) = kill {
            let _ = kill.send(());
        }
    }
}

fn lock_kill(
    kill: &Mutex<Option<oneshot::Sender<()>>>,
) -> std::sync::MutexGuard<'_, Option<oneshot::Sender<()>>> {
    kill.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Accumulate everything the worker writes to stderr until the stream ends.
async fn read_stderr(mut stderr: ChildStderr) -> String {
    let mut raw = Vec::new();
    let _ = stderr.read_to_end(&mut raw).await;
    String::from_utf8_lossy(&raw).into_owned()
}

/// Drain stdout into response frames, resolving pending handles in FIFO
/// order. Runs until the pipe closes.
async fn read_responses(
    mut stdout: ChildStdout,
    pending: Arc<Pending>,
    dimensions: usize,
    n_clusters: usize,
) {
    let frame_len = wire::response_len(dimensions, n_clusters);
    let mut buffer = FrameBuffer::new();
    let mut chunk = vec![0u8; 8192];

    loop {
        let read = match stdout.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        buffer.push(chunk[..read].to_vec());

        // Pipe chunking has no relation to frame boundaries: drain every
        // complete frame the buffer now holds, not just the first.
        while buffer.len() >= frame_len {
            let frame = buffer.take(frame_len);
            let centroids = wire::decode_centroids(&frame, n_clusters, dimensions);

            let entry = match &mut *lock_pending(&pending) {
                PendingState::Open(queue) => queue.pop_front(),
                PendingState::Dead(_) => None,
            };
            match entry {
                Some(tx) => {
                    let _ = tx.send(Ok(centroids));
                }
                None => warn!("worker produced a response frame with no pending request"),
            }
        }
    }
}

/// Wait for the process to exit (or for a forced kill), then fan the failure
/// out to every pending request and mark the worker dead.
async fn watch_exit(
    mut child: Child,
    mut kill_rx: oneshot::Receiver<()>,
    stderr_task: JoinHandle<String>,
    pending: Arc<Pending>,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        requested = &mut kill_rx => {
            if requested.is_ok() {
                let _ = child.start_kill();
            }
            child.wait().await
        }
    };

    // The rejection must carry the complete diagnostic text, so wait for
    // stderr to reach EOF before failing anyone.
    let stderr = stderr_task.await.unwrap_or_default();

    let failure = match status {
        Ok(status) => WorkerFailure {
            code: status.code(),
            signal: exit_signal(&status),
            stderr,
        },
        Err(_) => WorkerFailure {
            code: None,
            signal: None,
            stderr,
        },
    };

    // Fan-out and the switch to Dead happen in one critical section, so no
    // submission can slip between them.
    let mut state = lock_pending(&pending);
    let previous = std::mem::replace(&mut *state, PendingState::Dead(failure.clone()));
    if let PendingState::Open(queue) = previous {
        debug!(
            code = ?failure.code,
            signal = ?failure.signal,
            outstanding = queue.len(),
            "clustering worker exited"
        );
        for tx in queue {
            let _ = tx.send(Err(ClusterError::WorkerExited(failure.clone())));
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}
