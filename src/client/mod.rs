use crate::codec::{Key, Value};
use crate::mapper::KeyMapper;
use crate::request::{BatchRequest, LogicalResponse, RequestContext, Transport};
use crate::scatter::{AggregateDispatchFailure, ScatterGatherBuilder, ScatterGatherExecutor};
use crate::shard::RingProvider;
use crate::util::Error;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError<K: Key> {
    /// Nothing was sent.
    #[error("scatter failed: {0}")]
    Build(#[from] Error),
    #[error(transparent)]
    Dispatch(#[from] AggregateDispatchFailure<K>),
}

/// Builder and executor behind one call: scatter a logical request, send
/// the pieces, gather the answers.
pub struct ScatterGatherClient<P: RingProvider, T> {
    builder: ScatterGatherBuilder<P>,
    executor: ScatterGatherExecutor<T>,
}

impl<P: RingProvider, T> ScatterGatherClient<P, T> {
    pub fn new(provider: Arc<P>, transport: Arc<T>) -> Self {
        Self {
            builder: ScatterGatherBuilder::new(KeyMapper::new(provider)),
            executor: ScatterGatherExecutor::new(transport),
        }
    }

    pub fn builder(&self) -> &ScatterGatherBuilder<P> {
        &self.builder
    }

    pub fn executor(&self) -> &ScatterGatherExecutor<T> {
        &self.executor
    }

    pub async fn send<K, V>(
        &self,
        service: &str,
        request: BatchRequest<K, V>,
        ctx: &RequestContext,
    ) -> std::result::Result<LogicalResponse<K, V>, ClientError<K>>
    where
        K: Key,
        V: Value,
        T: Transport<K, V>,
    {
        let requests = self.builder.build_requests(service, request, ctx)?;
        Ok(self.executor.execute(requests).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Host, StoreNode};
    use crate::request::{ChannelTransport, KeyResult, KeyStatus};
    use crate::shard::StaticRingProvider;
    use crate::storage::{Engine, InMemEngine};
    use crate::util::test::{hosts, run_in_tokio, single_provider};
    use crate::util::RequestError;
    use std::collections::BTreeMap;

    type TestClient = ScatterGatherClient<StaticRingProvider, ChannelTransport<u64, String>>;

    fn client_over(n: usize, connected: usize) -> (TestClient, BTreeMap<Host, Arc<InMemEngine<u64, String>>>) {
        let mut transport: ChannelTransport<u64, String> = ChannelTransport::new();
        let mut engines = BTreeMap::new();
        for host in hosts(0..connected) {
            let engine: Arc<InMemEngine<u64, String>> = Arc::new(InMemEngine::new());
            transport.connect(host.clone(), Arc::new(StoreNode::new(host.clone(), engine.clone())));
            engines.insert(host, engine);
        }
        let client = ScatterGatherClient::new(Arc::new(single_provider(n)), Arc::new(transport));
        (client, engines)
    }

    #[test]
    fn test_round_trip() {
        run_in_tokio(async move {
            let (client, engines) = client_over(4, 4);
            let ctx = RequestContext::new();
            let updates: Vec<(u64, String)> = (1..=20).map(|i| (i, format!("v{}", i))).collect();

            let res = client
                .send("kv", BatchRequest::update(updates), &ctx)
                .await
                .unwrap();
            assert_eq!(res.len(), 20);
            assert!(res
                .results()
                .values()
                .all(|r| *r == KeyResult::Status(KeyStatus::Updated)));
            assert_eq!(engines.values().map(|e| e.len()).sum::<usize>(), 20);

            let res = client
                .send("kv", BatchRequest::<u64, String>::get(1..=20), &ctx)
                .await
                .unwrap();
            assert_eq!(res.len(), 20);
            assert_eq!(res.get(&13).and_then(|r| r.entity()), Some(&"v13".to_owned()));
        });
    }

    #[test]
    fn test_build_error_sends_nothing() {
        run_in_tokio(async move {
            let (client, _) = client_over(4, 4);
            let err = client
                .send("kv", BatchRequest::<u64, String>::get(Vec::new()), &RequestContext::new())
                .await
                .unwrap_err();
            assert_eq!(err, ClientError::Build(RequestError::EmptyKeySet.into()));
        });
    }

    #[test]
    fn test_unreachable_host() {
        run_in_tokio(async move {
            // test3 is on the ring but nobody serves it.
            let (client, _) = client_over(4, 3);
            let err = client
                .send("kv", BatchRequest::<u64, String>::get(1..=20), &RequestContext::new())
                .await
                .unwrap_err();
            match err {
                ClientError::Dispatch(failure) => {
                    assert_eq!(failure.failures().len(), 1);
                    assert_eq!(failure.failures()[0].host, Host::from("test3"));
                    assert_eq!(
                        failure.failures()[0].error,
                        Error::RequestError(RequestError::NoRoute(Host::from("test3")))
                    );
                }
                other => panic!("unexpected error {:?}", other),
            }
        });
    }
}
