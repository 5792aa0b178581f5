use crate::codec::{Key, Value};
use crate::mapper::KeyMapper;
use crate::request::{BatchOp, BatchRequest, Operation, RequestContext, SubRequest};
use crate::shard::RingProvider;
use crate::util::{RequestError, Result};

/// Splits a logical batch request into one sub-request per owning host.
pub struct ScatterGatherBuilder<P: RingProvider> {
    mapper: KeyMapper<P>,
}

impl<P: RingProvider> ScatterGatherBuilder<P> {
    pub fn new(mapper: KeyMapper<P>) -> Self {
        Self { mapper }
    }

    pub fn mapper(&self) -> &KeyMapper<P> {
        &self.mapper
    }

    /// Sub-requests come out ordered by `(partition, host)`. Their key sets
    /// are disjoint and cover the request's keys exactly. Each carries a
    /// copy of `base` pinned to its host and partition.
    ///
    /// Fails before anything is built if the request has no keys or if any
    /// key cannot be mapped.
    pub fn build_requests<K, V>(
        &self,
        service: &str,
        request: BatchRequest<K, V>,
        base: &RequestContext,
    ) -> Result<Vec<SubRequest<K, V>>>
    where
        K: Key,
        V: Value,
    {
        if request.op().is_empty() {
            return Err(RequestError::EmptyKeySet.into());
        }
        let grouping = self.mapper.map_keys_with_hint(
            service,
            request.key_set(),
            request.partition_hint(),
        )?;

        let (op, projection, hint) = request.into_parts();
        let operation = op.operation();
        let mut values = match op {
            BatchOp::Update(values) => Some(values),
            BatchOp::Get(_) | BatchOp::Delete(_) => None,
        };

        let mut requests = Vec::with_capacity(grouping.len());
        for (partition, host, keys) in grouping {
            let op = match (operation, values.as_mut()) {
                (_, Some(values)) => BatchOp::Update(
                    keys.into_iter()
                        .filter_map(|k| values.remove(&k).map(|v| (k, v)))
                        .collect(),
                ),
                (Operation::Delete, None) => BatchOp::Delete(keys),
                (_, None) => BatchOp::Get(keys),
            };
            let mut sub = BatchRequest::new(op).with_projection(projection.clone());
            if let Some(hint) = hint {
                sub = sub.with_partition_hint(hint);
            }
            requests.push(SubRequest {
                context: base.pinned(host.clone(), partition),
                host,
                partition,
                request: sub,
            });
        }
        log::debug!(
            "scattered {:?} on {} into {} sub-requests",
            operation,
            service,
            requests.len()
        );
        Ok(requests)
    }
}
