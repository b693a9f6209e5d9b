mod agent;
pub mod algorithms;
pub mod batch;
pub mod exploration;
pub mod networks;

pub use agent::{ReplayEntry, TickOutcome, TrainableAgent};
pub use algorithms::{DqnAgent, DqnConfig};
pub use exploration::{ExplorationPolicy, ExplorationSchedule};
pub use networks::{QNetwork, QNetworkConfig, QNetworkPair};
