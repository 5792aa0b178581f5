use crate::codec::{Key, Value};
use crate::request::{BatchRequest, RequestContext, SubResponse};
use crate::util::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of one fleet member, usually its URI.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Host(String);

impl Host {
    pub fn new(id: impl Into<String>) -> Host {
        Host(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Host {
    fn from(s: &str) -> Host {
        Host(s.to_owned())
    }
}

impl From<String> for Host {
    fn from(s: String) -> Host {
        Host(s)
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Host({})", self.0)
    }
}

/// A fleet member serving host-pinned batch requests.
#[async_trait]
pub trait Node<K: Key, V: Value>: Send + Sync + 'static {
    async fn process(&self, req: BatchRequest<K, V>, ctx: RequestContext) -> Result<SubResponse<K, V>>;
}

mod store;
pub use store::StoreNode;
