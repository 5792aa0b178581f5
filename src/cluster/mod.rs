use crate::client::ScatterGatherClient;
use crate::codec::{Key, Value};
use crate::config::FleetConfig;
use crate::node::{Host, StoreNode};
use crate::request::ChannelTransport;
use crate::shard::DynamicRingProvider;
use crate::storage::InMemEngine;
use crate::util::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

/// An in-process fleet: one store node per configured host behind a
/// channel transport, and a client routing over the configured rings.
pub struct Fleet<K: Key, V: Value> {
    config: FleetConfig,
    provider: Arc<DynamicRingProvider>,
    transport: Arc<ChannelTransport<K, V>>,
    stores: BTreeMap<Host, Arc<InMemEngine<K, V>>>,
    client: ScatterGatherClient<DynamicRingProvider, ChannelTransport<K, V>>,
}

impl<K: Key, V: Value> Fleet<K, V> {
    /// Must be called inside a tokio runtime, node tasks are spawned here.
    pub fn start(config: FleetConfig) -> Result<Self> {
        let provider = Arc::new(config.ring_provider()?);

        let mut transport: ChannelTransport<K, V> = ChannelTransport::new();
        let mut stores = BTreeMap::new();
        for host in config.hosts() {
            let engine: Arc<InMemEngine<K, V>> = Arc::new(InMemEngine::new());
            let node = StoreNode::new(host.clone(), engine.clone());
            transport.connect(host.clone(), Arc::new(node));
            stores.insert(host, engine);
        }
        log::info!(
            "fleet started with {} services over {} hosts",
            config.services.len(),
            stores.len()
        );

        let transport = Arc::new(transport);
        let client = ScatterGatherClient::new(provider.clone(), transport.clone());
        Ok(Fleet {
            config,
            provider,
            transport,
            stores,
            client,
        })
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    /// Publishing into the provider reroutes the client's next requests.
    pub fn provider(&self) -> &Arc<DynamicRingProvider> {
        &self.provider
    }

    pub fn transport(&self) -> &Arc<ChannelTransport<K, V>> {
        &self.transport
    }

    pub fn client(&self) -> &ScatterGatherClient<DynamicRingProvider, ChannelTransport<K, V>> {
        &self.client
    }

    pub fn store(&self, host: &Host) -> Option<&Arc<InMemEngine<K, V>>> {
        self.stores.get(host)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.stores.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{BatchRequest, KeyResult, KeyStatus, RequestContext};
    use crate::shard::DEFAULT_HOST_WEIGHT;
    use crate::storage::Engine;
    use crate::util::test::{hosts, run_in_tokio};

    const SERVICE: &str = "greetings";

    fn fleet_config(n: usize) -> FleetConfig {
        let partition: Vec<String> = hosts(0..n)
            .iter()
            .map(|h| format!(r#"{{ "uri": "{}" }}"#, h))
            .collect();
        FleetConfig::from_json(&format!(
            r#"{{ "services": {{ "{}": {{ "partitions": [[{}]] }} }} }}"#,
            SERVICE,
            partition.join(", ")
        ))
        .unwrap()
    }

    fn greeting(id: u64) -> String {
        format!("hello {}", id)
    }

    #[test]
    fn test_batch_round_trip() {
        run_in_tokio(async move {
            let fleet: Fleet<u64, String> = Fleet::start(fleet_config(4)).unwrap();
            let client = fleet.client();
            let ctx = RequestContext::new().with_attribute("caller", "test");
            let ids: Vec<u64> = (1..=20).collect();

            let created = client
                .send(SERVICE, BatchRequest::update(ids.iter().map(|i| (*i, greeting(*i)))), &ctx)
                .await
                .unwrap();
            assert_eq!(created.len(), 20);
            for host in fleet.hosts() {
                assert!(!fleet.store(host).unwrap().is_empty(), "{} holds nothing", host);
            }

            let fetched = client
                .send(
                    SERVICE,
                    BatchRequest::<u64, String>::get(ids.clone()).with_fields(vec!["message"]),
                    &ctx,
                )
                .await
                .unwrap();
            assert_eq!(fetched.len(), ids.len());
            for id in &ids {
                assert_eq!(fetched.get(id), Some(&KeyResult::Entity(greeting(*id))));
            }

            let updated = client
                .send(
                    SERVICE,
                    BatchRequest::update(ids.iter().map(|i| (*i, format!("update message {}", i)))),
                    &ctx,
                )
                .await
                .unwrap();
            assert_eq!(updated.len(), 20);
            let fetched = client
                .send(SERVICE, BatchRequest::<u64, String>::get(vec![7]), &ctx)
                .await
                .unwrap();
            assert_eq!(
                fetched.get(&7).and_then(|r| r.entity()),
                Some(&"update message 7".to_owned())
            );

            let deleted = client
                .send(SERVICE, BatchRequest::<u64, String>::delete(ids.clone()), &ctx)
                .await
                .unwrap();
            assert!(deleted
                .results()
                .values()
                .all(|r| *r == KeyResult::Status(KeyStatus::Deleted)));
            assert!(fleet.hosts().all(|h| fleet.store(h).unwrap().is_empty()));
        });
    }

    #[test]
    fn test_topology_swap_reroutes() {
        run_in_tokio(async move {
            let fleet: Fleet<u64, String> = Fleet::start(fleet_config(4)).unwrap();
            let ctx = RequestContext::new();
            let ids: Vec<u64> = (1..=20).collect();
            fleet
                .client()
                .send(SERVICE, BatchRequest::update(ids.iter().map(|i| (*i, greeting(*i)))), &ctx)
                .await
                .unwrap();
            let gone = Host::from("test3");
            let stranded = fleet.store(&gone).unwrap().keys();
            assert!(!stranded.is_empty());

            let remaining = hosts(0..3).into_iter().map(|h| (h, DEFAULT_HOST_WEIGHT));
            fleet
                .provider()
                .replace_partition(SERVICE, 0, remaining)
                .unwrap();

            let fetched = fleet
                .client()
                .send(SERVICE, BatchRequest::<u64, String>::get(ids.clone()), &ctx)
                .await
                .unwrap();
            assert_eq!(fetched.len(), ids.len());
            for id in &ids {
                let expected = if stranded.contains(id) {
                    KeyResult::Status(KeyStatus::NotFound)
                } else {
                    KeyResult::Entity(greeting(*id))
                };
                assert_eq!(fetched.get(id), Some(&expected));
            }
        });
    }
}
