//! # Cluster Harness
//!
//! Coordination layer for a pool of external vector-clustering worker
//! processes.
//!
//! A worker is a long-lived subprocess that reduces batches of embedding
//! vectors (dimension `D`) to `K` centroid vectors. Cluster Harness speaks a
//! small binary protocol to each worker over its stdin/stdout pipes,
//! multiplexes many in-flight requests per worker in strict FIFO order,
//! reassembles responses from arbitrarily chunked pipe reads, and propagates
//! structured failures (exit code, signal, captured stderr) to every caller
//! left waiting when a worker dies.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   submit    ┌─────────────┐  pick one   ┌───────────────┐
//! │ Pipeline │────────────▶│ WorkerPool  │────────────▶│ ClusterWorker │
//! │ (caller) │             │  (selector) │             │ pending FIFO  │
//! └──────────┘             └─────────────┘             └──────┬────────┘
//!                                                 frame on stdin │ ▲ frames
//!                                                               ▼ │ on stdout
//!                                                       ┌──────────────┐
//!                                                       │   external   │
//!                                                       │ worker proc  │
//!                                                       └──────────────┘
//! ```
//!
//! Everything upstream of the pool — scraping, segmentation, embedding
//! generation, persistence — communicates with this crate only through plain
//! in-memory vector collections (see [`enrich`]).
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`frame`] | Byte-stream reassembly into exact-length frames |
//! | [`wire`] | Binary request/response codec |
//! | [`worker`] | One external worker process with FIFO multiplexing |
//! | [`pool`] | Fixed-size worker pool with pluggable selection |
//! | [`error`] | Structured failure types |
//! | [`enrich`] | Upstream capability: cluster a document's embeddings |

pub mod config;
pub mod enrich;
pub mod error;
pub mod frame;
pub mod pool;
pub mod wire;
pub mod worker;
