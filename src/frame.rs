//! Byte-stream reassembly.
//!
//! Pipes deliver worker output in arbitrary chunks that bear no relation to
//! protocol frame boundaries. [`FrameBuffer`] queues those chunks and hands
//! back exact byte counts on demand, splitting whichever chunk straddles the
//! requested boundary and keeping its remainder queued for the next call.

use std::collections::VecDeque;

/// A growable FIFO byte queue with exact-length extraction.
///
/// Chunks are stored as pushed; a cursor into the front chunk tracks how much
/// of it has already been consumed, so draining many small frames never
/// re-copies the bytes that remain queued.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    chunks: VecDeque<Vec<u8>>,
    /// Bytes of the front chunk already handed out by a previous `take`.
    front_offset: usize,
    len: usize,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk. Takes ownership; existing buffered data is not moved.
    pub fn push(&mut self, chunk: Vec<u8>) {
        if chunk.is_empty() {
            return;
        }
        self.len += chunk.len();
        self.chunks.push_back(chunk);
    }

    /// Total number of buffered bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Remove and return the first `len` buffered bytes, in the order they
    /// were pushed. Requests larger than the buffer drain it entirely, so
    /// calling with an empty buffer returns an empty vector.
    pub fn take(&mut self, len: usize) -> Vec<u8> {
        let len = len.min(self.len);
        let mut out = Vec::with_capacity(len);

        while out.len() < len {
            let Some(front) = self.chunks.front() else {
                break;
            };
            let available = &front[self.front_offset..];
            let wanted = len - out.len();

            if available.len() <= wanted {
                out.extend_from_slice(available);
                self.chunks.pop_front();
                self.front_offset = 0;
            } else {
                out.extend_from_slice(&available[..wanted]);
                self.front_offset += wanted;
            }
        }

        self.len -= out.len();
        out
    }

    /// Drain the entire buffer.
    pub fn take_all(&mut self) -> Vec<u8> {
        self.take(self.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_exact_prefix_and_suffix() {
        let mut buf = FrameBuffer::new();
        buf.push(vec![1, 2, 3]);
        buf.push(vec![4, 5]);
        buf.push(vec![6, 7, 8, 9]);
        assert_eq!(buf.len(), 9);

        // Split mid-chunk: 4 crosses the first chunk boundary.
        assert_eq!(buf.take(4), vec![1, 2, 3, 4]);
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.take_all(), vec![5, 6, 7, 8, 9]);
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn take_splits_straddling_chunk() {
        let mut buf = FrameBuffer::new();
        buf.push(vec![10, 20, 30, 40, 50]);

        assert_eq!(buf.take(2), vec![10, 20]);
        assert_eq!(buf.take(2), vec![30, 40]);
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.take(2), vec![50]); // clamped to what remains
        assert!(buf.is_empty());
    }

    #[test]
    fn take_on_empty_returns_empty() {
        let mut buf = FrameBuffer::new();
        assert_eq!(buf.take(8), Vec::<u8>::new());
        assert_eq!(buf.take_all(), Vec::<u8>::new());
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn one_byte_chunks_reassemble_in_order() {
        let data: Vec<u8> = (0..=255).collect();
        let mut buf = FrameBuffer::new();
        for &b in &data {
            buf.push(vec![b]);
        }
        assert_eq!(buf.len(), 256);
        assert_eq!(buf.take(256), data);
    }

    #[test]
    fn interleaved_push_take_preserves_byte_order() {
        let mut buf = FrameBuffer::new();
        let mut expected: Vec<u8> = Vec::new();
        let mut drained: Vec<u8> = Vec::new();

        for round in 0u8..20 {
            let chunk: Vec<u8> = (0..7).map(|i| round.wrapping_mul(7).wrapping_add(i)).collect();
            expected.extend_from_slice(&chunk);
            buf.push(chunk);
            drained.extend(buf.take(5));
        }
        drained.extend(buf.take_all());

        assert_eq!(drained, expected);
        assert!(buf.is_empty());
    }

    #[test]
    fn len_matches_sum_after_every_operation() {
        let mut buf = FrameBuffer::new();
        buf.push(vec![0; 13]);
        buf.push(vec![]);
        buf.push(vec![0; 7]);
        assert_eq!(buf.len(), 20);

        let taken = buf.take(9);
        assert_eq!(taken.len(), 9);
        assert_eq!(buf.len(), 11);

        let taken = buf.take(100);
        assert_eq!(taken.len(), 11);
        assert_eq!(buf.len(), 0);
    }
}
