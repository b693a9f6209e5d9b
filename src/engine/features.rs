use burn::prelude::*;
use burn::tensor::TensorData;

use crate::engine::Step;
use crate::error::TrainingError;

/// Row-major matrix of feature rows.
///
/// For a single step there is one row per candidate action; for a training
/// batch there is one row per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    data: Vec<f32>,
    rows: usize,
    cols: usize,
}

impl FeatureMatrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        FeatureMatrix {
            data: vec![0.0; rows * cols],
            rows,
            cols,
        }
    }

    /// Wrap a flat buffer. Fails if `data.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self, TrainingError> {
        if data.len() != rows * cols {
            return Err(TrainingError::FeatureShape {
                what: "flat feature buffer",
                expected: rows * cols,
                actual: data.len(),
            });
        }
        Ok(FeatureMatrix { data, rows, cols })
    }

    /// Stack rows of width `cols` into a matrix.
    pub fn stack<'a, I>(cols: usize, rows: I) -> Result<Self, TrainingError>
    where
        I: IntoIterator<Item = &'a [f32]>,
    {
        let mut data = Vec::new();
        let mut count = 0;
        for row in rows {
            if row.len() != cols {
                return Err(TrainingError::FeatureShape {
                    what: "feature row width",
                    expected: cols,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
            count += 1;
        }
        Ok(FeatureMatrix {
            data,
            rows: count,
            cols,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row(&self, index: usize) -> &[f32] {
        &self.data[index * self.cols..(index + 1) * self.cols]
    }

    /// Row `index`, or `None` past the last row.
    pub fn get_row(&self, index: usize) -> Option<&[f32]> {
        (index < self.rows).then(|| self.row(index))
    }

    pub fn row_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.data[index * self.cols..(index + 1) * self.cols]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Upload as a `[rows, cols]` tensor.
    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        Tensor::<B, 1>::from_data(TensorData::from(self.data.as_slice()), device)
            .reshape([self.rows, self.cols])
    }
}

/// Game-specific encoding of steps, supplied by the engine.
pub trait FeatureModel<S: Step> {
    /// Width of every feature row.
    fn feature_num(&self) -> usize;

    /// One row per action in the fixed action space, each describing the
    /// board that would result from taking that action at `step`.
    fn features(&self, step: &S) -> FeatureMatrix;

    /// Scalar reward of a terminal step.
    fn reward(&self, step: &S) -> f32;

    /// Expand a batch of rows under the game's colour symmetry.
    ///
    /// Output row `i * k + r` must be permutation `r` of input row `i`, where
    /// `k` is the number of symmetries. The identity (`k = 1`) is the default.
    fn color_rotate(&self, batch: &FeatureMatrix) -> FeatureMatrix {
        batch.clone()
    }
}
