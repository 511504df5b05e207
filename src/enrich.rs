//! Upstream capability surface: reduce a document's embeddings to centroids.
//!
//! The scraping, segmentation, embedding, and persistence layers are
//! decoupled from the worker machinery and talk to it only through plain
//! in-memory vector collections. [`Clusterer`] is the seam: both a single
//! [`ClusterWorker`] and a [`WorkerPool`] implement it, so a pipeline can be
//! handed either without caring.
//!
//! A document arrives as [`DocumentVectors`]: some embeddings it wants kept
//! as-is (title, author, date strings) and the per-segment body embeddings
//! to be reduced. Enrichment appends the K computed centroids to the
//! standalone set.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::error::ClusterError;
use crate::pool::WorkerPool;
use crate::worker::ClusterWorker;

/// Capability to reduce batches of `dimensions()`-sized vectors into
/// `n_clusters()` centroid vectors, asynchronously, possibly many in flight
/// at once.
#[async_trait]
pub trait Clusterer: Send + Sync {
    fn dimensions(&self) -> usize;

    fn n_clusters(&self) -> usize;

    /// Reduce `vectors` to `n_clusters()` centroids.
    async fn generate_clusters(
        &self,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Vec<Vec<f32>>, ClusterError>;

    /// Forcibly tear down the underlying worker process(es).
    fn destroy(&self);
}

#[async_trait]
impl Clusterer for ClusterWorker {
    fn dimensions(&self) -> usize {
        ClusterWorker::dimensions(self)
    }

    fn n_clusters(&self) -> usize {
        ClusterWorker::n_clusters(self)
    }

    async fn generate_clusters(
        &self,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Vec<Vec<f32>>, ClusterError> {
        self.submit(vectors).await
    }

    fn destroy(&self) {
        ClusterWorker::destroy(self)
    }
}

#[async_trait]
impl Clusterer for WorkerPool {
    fn dimensions(&self) -> usize {
        WorkerPool::dimensions(self)
    }

    fn n_clusters(&self) -> usize {
        WorkerPool::n_clusters(self)
    }

    async fn generate_clusters(
        &self,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Vec<Vec<f32>>, ClusterError> {
        self.submit(vectors).await
    }

    fn destroy(&self) {
        WorkerPool::destroy(self)
    }
}

/// The embedding vectors one document brings to clustering.
#[derive(Debug, Clone)]
pub struct DocumentVectors {
    /// Embeddings kept as-is alongside the centroids (title, author, and
    /// similar side texts embedded separately from the body).
    pub standalone: Vec<Vec<f32>>,
    /// Per-segment body embeddings; these are what gets clustered.
    pub segments: Vec<Vec<f32>>,
}

/// Reduce a document's segment embeddings to centroids and append them to
/// its standalone embeddings.
pub async fn enrich(
    clusterer: &dyn Clusterer,
    doc: DocumentVectors,
) -> Result<Vec<Vec<f32>>, ClusterError> {
    let DocumentVectors {
        mut standalone,
        segments,
    } = doc;
    let centroids = clusterer.generate_clusters(segments).await?;
    standalone.extend(centroids);
    Ok(standalone)
}

/// Enrich a batch of documents with all requests in flight concurrently.
/// Results come back in input order. The first failure is returned; requests
/// already submitted to workers still run to completion on the worker side
/// (there is no cancellation at the protocol layer).
pub async fn enrich_all(
    clusterer: Arc<dyn Clusterer>,
    docs: Vec<DocumentVectors>,
) -> Result<Vec<Vec<Vec<f32>>>, ClusterError> {
    let count = docs.len();
    let mut tasks = JoinSet::new();

    for (index, doc) in docs.into_iter().enumerate() {
        let clusterer = Arc::clone(&clusterer);
        tasks.spawn(async move { (index, enrich(clusterer.as_ref(), doc).await) });
    }

    let mut results: Vec<Option<Vec<Vec<f32>>>> = (0..count).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        let (index, result) = joined.map_err(|_| ClusterError::Disconnected)?;
        results[index] = Some(result?);
    }

    Ok(results.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Clusterer stub returning a recognizable centroid derived from the
    /// submitted batch, without any subprocess.
    struct StubClusterer;

    #[async_trait]
    impl Clusterer for StubClusterer {
        fn dimensions(&self) -> usize {
            2
        }

        fn n_clusters(&self) -> usize {
            1
        }

        async fn generate_clusters(
            &self,
            vectors: Vec<Vec<f32>>,
        ) -> Result<Vec<Vec<f32>>, ClusterError> {
            let count = vectors.len() as f32;
            Ok(vec![vec![count, count]])
        }

        fn destroy(&self) {}
    }

    #[tokio::test]
    async fn enrich_appends_centroids_after_standalone() {
        let doc = DocumentVectors {
            standalone: vec![vec![9.0, 9.0]],
            segments: vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
        };

        let enriched = enrich(&StubClusterer, doc).await.unwrap();

        assert_eq!(enriched.len(), 2);
        assert_eq!(enriched[0], vec![9.0, 9.0]); // standalone first
        assert_eq!(enriched[1], vec![3.0, 3.0]); // centroid from 3 segments
    }

    #[tokio::test]
    async fn enrich_all_preserves_input_order() {
        let docs: Vec<DocumentVectors> = (1..=5)
            .map(|n| DocumentVectors {
                standalone: vec![],
                segments: (0..n).map(|_| vec![0.0, 0.0]).collect(),
            })
            .collect();

        let enriched = enrich_all(Arc::new(StubClusterer), docs).await.unwrap();

        assert_eq!(enriched.len(), 5);
        for (i, doc) in enriched.iter().enumerate() {
            let expected = (i + 1) as f32;
            assert_eq!(doc, &vec![vec![expected, expected]]);
        }
    }
}
