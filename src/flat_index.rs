//! Exact nearest-neighbor search over a flat vector store.
//!
//! Vectors are appended in order and scanned exhaustively at query time.
//! Distances are squared L2, which ranks identically to true Euclidean
//! distance without the square root.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Append-only flat index of fixed-dimension vectors.
///
/// The position of a vector in the index is its identity: callers keep
/// parallel collections keyed by the same positions, so the index never
/// reorders or removes entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::Config(
                "vector dimension must be non-zero".into(),
            ));
        }
        Ok(Self {
            dimension,
            data: Vec::new(),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append vectors in order. Every vector must match the index
    /// dimension; on a mismatch nothing is appended.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        for (i, vector) in vectors.iter().enumerate() {
            if vector.len() != self.dimension {
                return Err(Error::Config(format!(
                    "vector {i} has dimension {}, index expects {}",
                    vector.len(),
                    self.dimension
                )));
            }
        }
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    /// Return the `k` nearest stored vectors to `query` by squared L2
    /// distance, closest first, as parallel (distances, positions)
    /// collections. Returns at most `len()` results; an empty index
    /// yields empty collections.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<(Vec<f32>, Vec<usize>)> {
        if query.len() != self.dimension {
            return Err(Error::Config(format!(
                "query has dimension {}, index expects {}",
                query.len(),
                self.dimension
            )));
        }

        let mut scored: Vec<(f32, usize)> = self
            .rows()
            .enumerate()
            .map(|(i, row)| (squared_l2(query, row), i))
            .collect();

        scored.sort_by(|a, b| {
            a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);

        let distances = scored.iter().map(|(d, _)| *d).collect();
        let positions = scored.iter().map(|(_, i)| *i).collect();
        Ok((distances, positions))
    }

    fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dimension)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
