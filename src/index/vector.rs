//! Exact nearest-neighbor index over dense embeddings.
//!
//! A flat scan with squared Euclidean distance. For catalogs in the tens of
//! thousands of rows a full scan per query stays in the low milliseconds, so
//! there is no approximate structure here.

use crate::error::{AppError, Result};
use ndarray::{Array2, ArrayView1};

/// One search hit: position in the index and squared L2 distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub ordinal: usize,
    pub distance: f32,
}

/// Dense matrix of equal-dimension vectors (rows × dimension).
///
/// The dimension is fixed when the index is created. A rebuild produces a new
/// `VectorIndex` instead of mutating an existing one.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    vectors: Array2<f32>,
}

impl VectorIndex {
    pub fn new(vectors: Array2<f32>) -> Result<Self> {
        if vectors.nrows() == 0 {
            return Err(AppError::IndexBuildError(
                "Cannot build an index from zero vectors".to_string(),
            ));
        }
        if vectors.ncols() == 0 {
            return Err(AppError::IndexBuildError(
                "Embeddings have zero dimension".to_string(),
            ));
        }

        Ok(Self { vectors })
    }

    pub fn dimension(&self) -> usize {
        self.vectors.ncols()
    }

    pub fn len(&self) -> usize {
        self.vectors.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.nrows() == 0
    }

    pub fn vectors(&self) -> &Array2<f32> {
        &self.vectors
    }

    /// Return up to `count` nearest rows in ascending distance.
    ///
    /// Equal distances are ordered by ordinal so results are deterministic.
    pub fn search(&self, query: ArrayView1<'_, f32>, count: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension() {
            return Err(AppError::EmbeddingError(format!(
                "Query dimension {} does not match index dimension {}",
                query.len(),
                self.dimension()
            )));
        }

        let mut neighbors: Vec<Neighbor> = self
            .vectors
            .outer_iter()
            .enumerate()
            .map(|(ordinal, row)| Neighbor {
                ordinal,
                distance: squared_l2(row, query),
            })
            .collect();

        neighbors.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.ordinal.cmp(&b.ordinal))
        });
        neighbors.truncate(count);

        Ok(neighbors)
    }
}

#[inline]
fn squared_l2(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
