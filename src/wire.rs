//! Binary wire codec for the worker protocol.
//!
//! Request frame: `[u32 big-endian: N][N × D × f32 little-endian]` — the
//! vector count followed by every vector's components, concatenated in
//! submission order.
//!
//! Response frame: exactly `K × D × f32 little-endian` bytes with no length
//! prefix; both sides know the fixed size from configuration. Responses for
//! successive requests arrive back-to-back on the same stream with no
//! delimiter.

/// Wire size of one response frame for a worker configured with `dimensions`
/// and `n_clusters`.
pub fn response_len(dimensions: usize, n_clusters: usize) -> usize {
    4 * dimensions * n_clusters
}

/// Encode a batch of vectors as one request frame.
///
/// The caller guarantees every vector has the worker's configured dimension;
/// [`crate::worker::ClusterWorker::submit`] checks this before encoding.
pub fn request_frame(vectors: &[Vec<f32>]) -> Vec<u8> {
    let payload: usize = vectors.iter().map(|v| v.len() * 4).sum();
    let mut frame = Vec::with_capacity(4 + payload);
    frame.extend_from_slice(&(vectors.len() as u32).to_be_bytes());
    for vector in vectors {
        for &component in vector {
            frame.extend_from_slice(&component.to_le_bytes());
        }
    }
    frame
}

/// Decode one response frame into `n_clusters` centroid vectors of
/// `dimensions` little-endian floats each.
///
/// `bytes` must be exactly [`response_len`] long; the frame reassembly layer
/// only hands over complete frames.
pub fn decode_centroids(bytes: &[u8], n_clusters: usize, dimensions: usize) -> Vec<Vec<f32>> {
    let mut centroids = Vec::with_capacity(n_clusters);
    for cluster in bytes.chunks_exact(dimensions * 4).take(n_clusters) {
        let centroid: Vec<f32> = cluster
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        centroids.push(centroid);
    }
    centroids
}
