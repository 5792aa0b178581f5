pub mod client;
pub mod cluster;
pub mod codec;
pub mod config;
pub mod mapper;
pub mod node;
pub mod request;
pub mod scatter;
pub mod shard;
pub mod storage;
pub mod util;

pub use client::{ClientError, ScatterGatherClient};
pub use cluster::Fleet;
pub use config::FleetConfig;
pub use mapper::{KeyGrouping, KeyMapper};
pub use scatter::{AggregateDispatchFailure, ScatterGatherBuilder, ScatterGatherExecutor};
