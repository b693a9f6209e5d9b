mod pair;
mod q_network;
mod soft_update;

pub use pair::QNetworkPair;
pub use q_network::{QNetwork, QNetworkConfig};
pub use soft_update::{parameter_snapshot, soft_update};
