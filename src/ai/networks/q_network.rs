use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::sigmoid;

/// Value network scoring one candidate board per row.
///
/// ```text
/// Input:  [rows, feature_num]
/// FC1:    feature_num -> hidden_size, sigmoid
/// FC2:    hidden_size -> 1
/// Output: [rows, 1]
/// ```
#[derive(Module, Debug)]
pub struct QNetwork<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
}

#[derive(Config, Debug)]
pub struct QNetworkConfig {
    pub feature_num: usize,
    #[config(default = 300)]
    pub hidden_size: usize,
}

impl QNetworkConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> QNetwork<B> {
        QNetwork {
            fc1: LinearConfig::new(self.feature_num, self.hidden_size).init(device),
            fc2: LinearConfig::new(self.hidden_size, 1).init(device),
        }
    }
}

impl<B: Backend> QNetwork<B> {
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = sigmoid(self.fc1.forward(input));
        self.fc2.forward(x)
    }
}
