//! Fixed-size pool of independent clustering workers.
//!
//! Every worker in a pool is spawned from the same configuration but shares
//! no state with its siblings — each has its own process, pipes, and pending
//! queue. The pool's only job is to pick a worker per submission and
//! delegate. There is no retry, no restart of dead workers, and no ordering
//! guarantee across workers; failures surface to the original caller
//! unchanged.

use anyhow::Result;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::ClusterConfig;
use crate::error::ClusterError;
use crate::worker::ClusterWorker;

/// Strategy deciding which worker receives the next request.
///
/// `pick` is called with the pool size and must return an index in
/// `0..pool_size`. Injectable so deterministic tests can substitute
/// [`RoundRobin`] (or a fixed choice) for the default [`UniformRandom`].
pub trait WorkerSelector: Send + Sync {
    fn pick(&self, pool_size: usize) -> usize;
}

/// Default strategy: uniform random choice. Balancing is statistical — a
/// pathological run can pile requests on one worker, which is acceptable
/// because per-request processing cost is roughly uniform.
pub struct UniformRandom;

impl WorkerSelector for UniformRandom {
    fn pick(&self, pool_size: usize) -> usize {
        rand::thread_rng().gen_range(0..pool_size)
    }
}

/// Deterministic strategy cycling through workers in order.
#[derive(Default)]
pub struct RoundRobin {
    next: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkerSelector for RoundRobin {
    fn pick(&self, pool_size: usize) -> usize {
        self.next.fetch_add(1, Ordering::Relaxed) % pool_size
    }
}

/// A fixed collection of [`ClusterWorker`]s sharing configuration but no
/// state. Created whole at construction; no dynamic resizing.
pub struct WorkerPool {
    workers: Vec<ClusterWorker>,
    selector: Box<dyn WorkerSelector>,
    dimensions: usize,
    n_clusters: usize,
}

impl WorkerPool {
    /// Spawn `config.pool_size` workers with the default uniform-random
    /// selector.
    pub fn spawn(config: &ClusterConfig) -> Result<Self> {
        Self::spawn_with_selector(config, Box::new(UniformRandom))
    }

    /// Spawn the pool with an explicit selection strategy.
    pub fn spawn_with_selector(
        config: &ClusterConfig,
        selector: Box<dyn WorkerSelector>,
    ) -> Result<Self> {
        anyhow::ensure!(config.pool_size >= 1, "pool_size must be >= 1");

        let workers = (0..config.pool_size)
            .map(|_| ClusterWorker::spawn(config))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            workers,
            selector,
            dimensions: config.dimensions,
            n_clusters: config.n_clusters,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    /// Number of workers in the pool.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Submit a batch of vectors to one worker chosen by the selector.
    pub async fn submit(&self, vectors: Vec<Vec<f32>>) -> Result<Vec<Vec<f32>>, ClusterError> {
        let index = self.selector.pick(self.workers.len());
        self.workers[index].submit(vectors).await
    }

    /// Forcibly terminate every worker. Does not wait for shutdown; partial
    /// teardown failures are not surfaced.
    pub fn destroy(&self) {
        for worker in &self.workers {
            worker.destroy();
        }
    }
}
