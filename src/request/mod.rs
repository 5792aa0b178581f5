use crate::codec::{Key, Value};
use crate::node::Host;
use crate::shard::PartitionId;
use crate::util::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Update,
    Delete,
}

/// Operation plus its payload. Updates carry values, the others only keys.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp<K: Key, V: Value> {
    Get(BTreeSet<K>),
    Update(BTreeMap<K, V>),
    Delete(BTreeSet<K>),
}

impl<K: Key, V: Value> BatchOp<K, V> {
    pub fn operation(&self) -> Operation {
        match self {
            BatchOp::Get(_) => Operation::Get,
            BatchOp::Update(_) => Operation::Update,
            BatchOp::Delete(_) => Operation::Delete,
        }
    }

    pub fn key_set(&self) -> BTreeSet<K> {
        match self {
            BatchOp::Get(keys) | BatchOp::Delete(keys) => keys.clone(),
            BatchOp::Update(values) => values.keys().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            BatchOp::Get(keys) | BatchOp::Delete(keys) => keys.len(),
            BatchOp::Update(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Field selection and extra query parameters. Opaque to routing, copied
/// verbatim onto every sub-request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    pub fields: BTreeSet<String>,
    pub params: BTreeMap<String, String>,
}

/// One logical batch request.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest<K: Key, V: Value> {
    op: BatchOp<K, V>,
    projection: Projection,
    partition_hint: Option<PartitionId>,
}

impl<K: Key, V: Value> BatchRequest<K, V> {
    pub fn new(op: BatchOp<K, V>) -> Self {
        Self {
            op,
            projection: Projection::default(),
            partition_hint: None,
        }
    }

    pub fn get<I: IntoIterator<Item = K>>(keys: I) -> Self {
        Self::new(BatchOp::Get(keys.into_iter().collect()))
    }

    pub fn update<I: IntoIterator<Item = (K, V)>>(values: I) -> Self {
        Self::new(BatchOp::Update(values.into_iter().collect()))
    }

    pub fn delete<I: IntoIterator<Item = K>>(keys: I) -> Self {
        Self::new(BatchOp::Delete(keys.into_iter().collect()))
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.projection.params.insert(name.into(), value.into());
        self
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    /// Routes every key of the request to `partition`.
    pub fn with_partition_hint(mut self, partition: PartitionId) -> Self {
        self.partition_hint = Some(partition);
        self
    }

    pub fn operation(&self) -> Operation {
        self.op.operation()
    }

    pub fn op(&self) -> &BatchOp<K, V> {
        &self.op
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn partition_hint(&self) -> Option<PartitionId> {
        self.partition_hint
    }

    pub fn key_set(&self) -> BTreeSet<K> {
        self.op.key_set()
    }

    pub fn into_parts(self) -> (BatchOp<K, V>, Projection, Option<PartitionId>) {
        (self.op, self.projection, self.partition_hint)
    }
}

/// Per-call context handed to the transport. The builder pins the target
/// host and partition so the transport never re-resolves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    target_host: Option<Host>,
    partition: Option<PartitionId>,
    attributes: BTreeMap<String, String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn pinned(&self, host: Host, partition: PartitionId) -> Self {
        let mut ctx = self.clone();
        ctx.target_host = Some(host);
        ctx.partition = Some(partition);
        ctx
    }

    pub fn target_host(&self) -> Option<&Host> {
        self.target_host.as_ref()
    }

    pub fn partition(&self) -> Option<PartitionId> {
        self.partition
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// The slice of a logical request owned by one host.
#[derive(Debug, Clone, PartialEq)]
pub struct SubRequest<K: Key, V: Value> {
    pub host: Host,
    pub partition: PartitionId,
    pub request: BatchRequest<K, V>,
    pub context: RequestContext,
}

impl<K: Key, V: Value> SubRequest<K, V> {
    pub fn key_set(&self) -> BTreeSet<K> {
        self.request.key_set()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Updated,
    Deleted,
    NotFound,
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeyResult<V> {
    Entity(V),
    Status(KeyStatus),
}

impl<V> KeyResult<V> {
    pub fn entity(&self) -> Option<&V> {
        match self {
            KeyResult::Entity(v) => Some(v),
            KeyResult::Status(_) => None,
        }
    }
}

/// What one host answered for its sub-request.
#[derive(Debug, Clone, PartialEq)]
pub struct SubResponse<K: Key, V> {
    results: BTreeMap<K, KeyResult<V>>,
}

impl<K: Key, V> Default for SubResponse<K, V> {
    fn default() -> Self {
        Self {
            results: BTreeMap::new(),
        }
    }
}

impl<K: Key, V> SubResponse<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: K, result: KeyResult<V>) {
        self.results.insert(key, result);
    }

    pub fn results(&self) -> &BTreeMap<K, KeyResult<V>> {
        &self.results
    }

    pub fn into_results(self) -> BTreeMap<K, KeyResult<V>> {
        self.results
    }
}

impl<K: Key, V> FromIterator<(K, KeyResult<V>)> for SubResponse<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, KeyResult<V>)>>(iter: I) -> Self {
        Self {
            results: iter.into_iter().collect(),
        }
    }
}

/// The merged answer to a logical request. Holds one result for every key
/// that was sent.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalResponse<K: Key, V> {
    pub(crate) results: BTreeMap<K, KeyResult<V>>,
}

impl<K: Key, V> LogicalResponse<K, V> {
    pub fn get(&self, key: &K) -> Option<&KeyResult<V>> {
        self.results.get(key)
    }

    pub fn results(&self) -> &BTreeMap<K, KeyResult<V>> {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn into_results(self) -> BTreeMap<K, KeyResult<V>> {
        self.results
    }
}

/// Sends one host-pinned request. Must tolerate arbitrary concurrent calls.
#[async_trait]
pub trait Transport<K: Key, V: Value>: Send + Sync + 'static {
    async fn send(&self, req: BatchRequest<K, V>, ctx: RequestContext) -> Result<SubResponse<K, V>>;
}

pub mod channel;
pub use channel::ChannelTransport;
