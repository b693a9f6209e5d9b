use std::collections::HashMap;

use burn::module::{ModuleMapper, ModuleVisitor, ParamId};
use burn::prelude::*;

use crate::error::TrainingError;

/// Blend every float parameter of `target` toward its counterpart in
/// `source`: `target <- tau * source + (1 - tau) * target`.
///
/// Parameters are matched by id, so `target` must descend from `source`
/// (a clone, `valid()` copy, or the same checkpoint). `tau = 1` copies
/// `source` exactly and `tau = 0` returns `target` untouched. Any target
/// parameter without a same-shaped source parameter is a
/// [`TrainingError::ParameterMismatch`]; source parameters left unmatched
/// are a [`TrainingError::UnmatchedParameters`].
pub fn soft_update<B: Backend, M: Module<B>>(
    source: &M,
    target: M,
    tau: f32,
) -> Result<M, TrainingError> {
    let mut collector = ParamCollector::<B>::default();
    source.visit(&mut collector);

    let mut updater = SoftUpdater {
        source: collector.into_map(),
        tau,
        matched: 0,
        error: None,
    };
    let updated = target.map(&mut updater);

    if let Some(err) = updater.error {
        return Err(err);
    }
    if updater.matched != updater.source.len() {
        return Err(TrainingError::UnmatchedParameters {
            unmatched: updater.source.len() - updater.matched,
            total: updater.source.len(),
        });
    }
    Ok(updated)
}

/// Every float parameter of `module` as host data, in visit order.
pub fn parameter_snapshot<B: Backend, M: Module<B>>(module: &M) -> Vec<Vec<f32>> {
    let mut collector = ParamCollector::<B>::default();
    module.visit(&mut collector);
    collector
        .params
        .into_iter()
        .map(|(_, _, flat)| flat.into_data().convert::<f32>().to_vec().unwrap_or_default())
        .collect()
}

/// Flattened float parameters keyed by id.
struct ParamCollector<B: Backend> {
    params: Vec<(ParamId, Vec<usize>, Tensor<B, 1>)>,
}

impl<B: Backend> Default for ParamCollector<B> {
    fn default() -> Self {
        ParamCollector { params: Vec::new() }
    }
}

impl<B: Backend> ParamCollector<B> {
    fn into_map(self) -> HashMap<ParamId, (Vec<usize>, Tensor<B, 1>)> {
        self.params
            .into_iter()
            .map(|(id, dims, flat)| (id, (dims, flat)))
            .collect()
    }
}

impl<B: Backend> ModuleVisitor<B> for ParamCollector<B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, tensor: &Tensor<B, D>) {
        let dims = tensor.dims().to_vec();
        let numel = tensor.shape().num_elements();
        self.params.push((id, dims, tensor.clone().reshape([numel])));
    }
}

struct SoftUpdater<B: Backend> {
    source: HashMap<ParamId, (Vec<usize>, Tensor<B, 1>)>,
    tau: f32,
    matched: usize,
    error: Option<TrainingError>,
}

impl<B: Backend> ModuleMapper<B> for SoftUpdater<B> {
    fn map_float<const D: usize>(&mut self, id: ParamId, tensor: Tensor<B, D>) -> Tensor<B, D> {
        let dims = tensor.dims();
        let source = match self.source.get(&id) {
            Some((src_dims, src)) if src_dims.as_slice() == dims.as_slice() => {
                src.clone().reshape(dims)
            }
            _ => {
                if self.error.is_none() {
                    self.error = Some(TrainingError::ParameterMismatch {
                        param: format!("{id:?}"),
                        shape: dims.to_vec(),
                    });
                }
                return tensor;
            }
        };
        self.matched += 1;

        if self.tau >= 1.0 {
            source
        } else if self.tau <= 0.0 {
            tensor
        } else {
            source.mul_scalar(self.tau) + tensor.mul_scalar(1.0 - self.tau)
        }
    }
}
