//! Scatter a logical request over the hosts owning its keys, then gather
//! the answers back into one response.

mod builder;
mod executor;

pub use builder::ScatterGatherBuilder;
pub use executor::{AggregateDispatchFailure, DispatchFailure, ScatterGatherExecutor};
