use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Top-level configuration for a clustering worker pool.
#[derive(Debug, Deserialize, Clone)]
pub struct ClusterConfig {
    /// Embedding vector dimensionality (e.g. 1536).
    pub dimensions: usize,
    /// Number of centroids each worker computes per request.
    pub n_clusters: usize,
    /// Number of worker processes in the pool.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default)]
    pub worker: WorkerCommand,
}

fn default_pool_size() -> usize {
    1
}

/// How to launch one worker process.
///
/// The worker's dimension and cluster count are appended as positional
/// arguments after `args`, so the default command line comes out as
/// `python -u ./py/cluster.py <D> <K>`.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkerCommand {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// Extra environment for the worker. The default suppresses the numeric
    /// backend's verbose compilation logging, which would otherwise pollute
    /// the diagnostic stderr capture.
    #[serde(default = "default_env")]
    pub env: HashMap<String, String>,
}

impl Default for WorkerCommand {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            env: default_env(),
        }
    }
}

fn default_program() -> String {
    "python".to_string()
}
fn default_args() -> Vec<String> {
    vec!["-u".to_string(), "./py/cluster.py".to_string()]
}
fn default_env() -> HashMap<String, String> {
    HashMap::from([("PYKEOPS_VERBOSE".to_string(), "0".to_string())])
}

pub fn load_config(path: &Path) -> Result<ClusterConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: ClusterConfig =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.dimensions == 0 {
        anyhow::bail!("dimensions must be > 0");
    }
    if config.n_clusters == 0 {
        anyhow::bail!("n_clusters must be > 0");
    }
    if config.pool_size == 0 {
        anyhow::bail!("pool_size must be >= 1");
    }
    if config.worker.program.is_empty() {
        anyhow::bail!("worker.program must not be empty");
    }

    Ok(config)
}
