use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::embedding_engine::EmbeddingError;

/// Exhaustive nearest-neighbor search by squared Euclidean distance.
///
/// Row `i` of the matrix is the vector added `i`-th, so positions returned by
/// [`FlatL2Index::search`] line up with whatever sequence fed [`FlatL2Index::add`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatL2Index {
    dimension: usize,
    matrix: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    /// Squared L2 distance to the query.
    pub distance: f32,
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    // Max-heap on distance: popping discards the farthest candidate. NaN
    // sorts above every number, so it is the first to go. Equal distances
    // prefer the lower position.
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.position.cmp(&other.position))
    }
}

impl FlatL2Index {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            matrix: Vec::new(),
        }
    }

    pub fn add(&mut self, embeddings: &[Vec<f32>]) -> Result<(), EmbeddingError> {
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimension) {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }
        self.matrix.reserve(embeddings.len() * self.dimension);
        for embedding in embeddings {
            self.matrix.extend_from_slice(embedding);
        }
        Ok(())
    }

    /// The `k` nearest rows, nearest first. Distances are computed on the rayon pool.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, EmbeddingError> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let distances: Vec<f32> = self
            .matrix
            .par_chunks_exact(self.dimension)
            .map(|row| squared_l2(row, query))
            .collect();

        let mut heap = BinaryHeap::with_capacity(k + 1);
        for (position, distance) in distances.into_iter().enumerate() {
            heap.push(Neighbor { position, distance });
            if heap.len() > k {
                heap.pop();
            }
        }
        Ok(heap.into_sorted_vec())
    }

    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.matrix.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[inline]
fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn generate_dummy_embeddings(count: usize, dim: usize) -> Vec<Vec<f32>> {
        let mut rng = rand::thread_rng();
        (0..count)
            .map(|_| (0..dim).map(|_| rng.gen::<f32>()).collect::<Vec<f32>>())
            .collect()
    }

    #[test]
    fn test_flat_index_add_search() -> anyhow::Result<()> {
        let dim = 32;
        let embeddings = generate_dummy_embeddings(100, dim);
        let mut index = FlatL2Index::new(dim);
        index.add(&embeddings)?;
        assert_eq!(index.len(), 100);

        let results = index.search(&embeddings[42], 5)?;
        assert_eq!(results.len(), 5);
        assert_eq!(results[0].position, 42, "The first result should be the item itself");
        assert_eq!(results[0].distance, 0.0);
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
        Ok(())
    }

    #[test]
    fn test_k_larger_than_index() -> anyhow::Result<()> {
        let mut index = FlatL2Index::new(2);
        index.add(&[vec![0.0, 0.0], vec![3.0, 4.0]])?;
        let results = index.search(&[0.0, 0.0], 10)?;
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].position, 1);
        assert_eq!(results[1].distance, 25.0, "distances are squared");
        Ok(())
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut index = FlatL2Index::new(3);
        let err = index.add(&[vec![1.0, 2.0]]).unwrap_err();
        assert!(matches!(err, EmbeddingError::DimensionMismatch { expected: 3, actual: 2 }));

        index.add(&[vec![1.0, 2.0, 3.0]]).unwrap();
        assert!(index.search(&[1.0], 1).is_err());
    }

    #[test]
    fn test_empty_index_and_zero_k() -> anyhow::Result<()> {
        let index = FlatL2Index::new(0);
        assert!(index.is_empty());
        assert!(index.search(&[], 3)?.is_empty());

        let mut index = FlatL2Index::new(1);
        index.add(&[vec![1.0]])?;
        assert!(index.search(&[1.0], 0)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_ties_prefer_lower_position() -> anyhow::Result<()> {
        let mut index = FlatL2Index::new(1);
        index.add(&[vec![1.0], vec![-1.0], vec![1.0]])?;
        let results = index.search(&[0.0], 2)?;
        let positions: Vec<usize> = results.iter().map(|n| n.position).collect();
        assert_eq!(positions, vec![0, 1]);
        Ok(())
    }

    #[test]
    fn test_neighbor_ordering_with_nan() {
        let nan = Neighbor { position: 0, distance: f32::NAN };
        let near = Neighbor { position: 1, distance: 0.5 };
        assert_eq!(nan.cmp(&near), Ordering::Greater, "NaN must be evicted before real distances");
        assert_eq!(near.cmp(&nan), Ordering::Less);
    }
}
