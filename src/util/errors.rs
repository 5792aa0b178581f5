use crate::node::Host;
use crate::shard::PartitionId;
use std::result::Result as stdResult;
use thiserror::Error;

pub type Result<T> = stdResult<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("shard error: {0}")]
    ShardError(ShardError),
    #[error("request error: {0}")]
    RequestError(RequestError),
    /// No host could be resolved for some key of `service`.
    #[error("service {service} unavailable: {reason}")]
    ServiceUnavailable { service: String, reason: String },
    #[error("config error: {0}")]
    ConfigError(String),
}

impl Error {
    pub fn service_unavailable(service: &str, reason: impl Into<String>) -> Error {
        Error::ServiceUnavailable {
            service: service.to_owned(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShardError {
    #[error("ring has no hosts")]
    EmptyRing,
    #[error("partition {partition} is not configured, {count} partitions known")]
    UnknownPartition { partition: PartitionId, count: u32 },
    #[error("split on {0} failed")]
    DuplicateSplit(String),
}

impl From<ShardError> for Error {
    fn from(e: ShardError) -> Error {
        Error::ShardError(e)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("batch request carries no keys")]
    EmptyKeySet,
    #[error("channel send error {0}")]
    SendError(String),
    #[error("no route to host {0}")]
    NoRoute(Host),
    #[error("request for {expected} delivered to {actual}")]
    Misrouted { expected: Host, actual: Host },
    #[error("protocol violation from {host}: {detail}")]
    ProtocolViolation { host: Host, detail: String },
    #[error("remote error {0}")]
    Remote(String),
}

impl From<RequestError> for Error {
    fn from(e: RequestError) -> Error {
        Error::RequestError(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Error {
        Error::ConfigError(e.to_string())
    }
}
