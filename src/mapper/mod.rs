//! Resolves keys to the hosts that own them.

use crate::codec::Key;
use crate::node::Host;
use crate::shard::{PartitionId, RingProvider};
use crate::util::{Error, Result, ShardError};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Keys grouped by partition, then by owning host within the partition.
///
/// Every key appears exactly once. A host serving several partitions shows
/// up once per partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyGrouping<K: Key> {
    partitions: BTreeMap<PartitionId, BTreeMap<Host, BTreeSet<K>>>,
}

impl<K: Key> Default for KeyGrouping<K> {
    fn default() -> Self {
        Self {
            partitions: BTreeMap::new(),
        }
    }
}

impl<K: Key> KeyGrouping<K> {
    fn insert(&mut self, partition: PartitionId, host: Host, key: K) {
        self.partitions
            .entry(partition)
            .or_default()
            .entry(host)
            .or_default()
            .insert(key);
    }

    pub fn partitions(&self) -> &BTreeMap<PartitionId, BTreeMap<Host, BTreeSet<K>>> {
        &self.partitions
    }

    /// `(partition, host, keys)` in partition then host order.
    pub fn iter(&self) -> impl Iterator<Item = (PartitionId, &Host, &BTreeSet<K>)> {
        self.partitions.iter().flat_map(|(partition, hosts)| {
            hosts.iter().map(move |(host, keys)| (*partition, host, keys))
        })
    }

    /// Host to keys, merging partitions served by the same host.
    pub fn host_keys(&self) -> BTreeMap<Host, BTreeSet<K>> {
        let mut merged: BTreeMap<Host, BTreeSet<K>> = BTreeMap::new();
        for (_, host, keys) in self.iter() {
            merged
                .entry(host.clone())
                .or_default()
                .extend(keys.iter().cloned());
        }
        merged
    }

    /// Partitions in which `host` owns at least one key.
    pub fn partitions_of(&self, host: &Host) -> BTreeSet<PartitionId> {
        self.partitions
            .iter()
            .filter(|(_, hosts)| hosts.contains_key(host))
            .map(|(partition, _)| *partition)
            .collect()
    }

    /// Number of `(partition, host)` groups.
    pub fn len(&self) -> usize {
        self.partitions.values().map(|hosts| hosts.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn key_count(&self) -> usize {
        self.iter().map(|(_, _, keys)| keys.len()).sum()
    }
}

impl<K: Key> IntoIterator for KeyGrouping<K> {
    type Item = (PartitionId, Host, BTreeSet<K>);
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        let mut groups = Vec::new();
        for (partition, hosts) in self.partitions {
            for (host, keys) in hosts {
                groups.push((partition, host, keys));
            }
        }
        groups.into_iter()
    }
}

pub struct KeyMapper<P: RingProvider> {
    provider: Arc<P>,
}

impl<P: RingProvider> Clone for KeyMapper<P> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
        }
    }
}

impl<P: RingProvider> KeyMapper<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Groups `keys` of `service` by partition and owning host.
    ///
    /// Either every key is mapped or the call fails: a partition with no
    /// hosts fails the whole call with `ServiceUnavailable`.
    pub fn map_keys<K, I>(&self, service: &str, keys: I) -> Result<KeyGrouping<K>>
    where
        I: IntoIterator<Item = K>,
        K: Key,
    {
        self.map_keys_with_hint(service, keys, None)
    }

    /// Like `map_keys`, but with a partition hint every key is routed to the
    /// hinted partition instead of the one its bytes select.
    pub fn map_keys_with_hint<K, I>(
        &self,
        service: &str,
        keys: I,
        hint: Option<PartitionId>,
    ) -> Result<KeyGrouping<K>>
    where
        I: IntoIterator<Item = K>,
        K: Key,
    {
        if !is_valid_service(service) {
            return Err(Error::service_unavailable(service, "invalid service name"));
        }
        let rings = self.provider.rings(service)?;
        let mut grouping = KeyGrouping::default();
        for key in keys {
            let bytes = key.key_bytes();
            let partition = match hint {
                Some(partition) => partition,
                None => rings.partition_for_key(&bytes)?,
            };
            let ring = rings.ring_for_partition(partition)?;
            let host = match ring.lookup(&bytes) {
                Ok(host) => host.clone(),
                Err(Error::ShardError(ShardError::EmptyRing)) => {
                    return Err(Error::service_unavailable(
                        service,
                        format!("no hosts known for partition {}", partition),
                    ));
                }
                Err(e) => return Err(e),
            };
            drop(bytes);
            grouping.insert(partition, host, key);
        }
        log::debug!(
            "mapped {} keys of {} onto {} host groups",
            grouping.key_count(),
            service,
            grouping.len()
        );
        Ok(grouping)
    }
}

fn is_valid_service(service: &str) -> bool {
    !service.is_empty() && !service.chars().any(|c| c.is_whitespace() || c.is_control())
}
