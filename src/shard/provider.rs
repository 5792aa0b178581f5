use crate::node::Host;
use crate::shard::{HashRing, PartitionAccessor, PartitionId, SinglePartition};
use crate::util::{Error, Result, ShardError};
use crossbeam::sync::ShardedLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError};

/// The rings of one service: one ring per partition plus the function that
/// picks the partition of a key.
pub struct PartitionRings {
    rings: Vec<HashRing>,
    accessor: Arc<dyn PartitionAccessor>,
}

impl PartitionRings {
    pub fn single(ring: HashRing) -> Self {
        Self {
            rings: vec![ring],
            accessor: Arc::new(SinglePartition),
        }
    }

    pub fn partitioned(rings: Vec<HashRing>, accessor: Arc<dyn PartitionAccessor>) -> Self {
        Self { rings, accessor }
    }

    pub fn partition_count(&self) -> u32 {
        self.rings.len() as u32
    }

    pub fn partition_for_key(&self, key: &[u8]) -> Result<PartitionId> {
        let partition = self.accessor.partition_for(key);
        self.check(partition)?;
        Ok(partition)
    }

    pub fn ring_for_key(&self, key: &[u8]) -> Result<&HashRing> {
        let partition = self.partition_for_key(key)?;
        self.ring_for_partition(partition)
    }

    pub fn ring_for_partition(&self, partition: PartitionId) -> Result<&HashRing> {
        self.rings
            .get(partition as usize)
            .ok_or_else(|| self.unknown(partition))
    }

    pub fn rings(&self) -> &[HashRing] {
        &self.rings
    }

    /// Same partitioning, one ring swapped.
    pub fn with_ring(&self, partition: PartitionId, ring: HashRing) -> Result<PartitionRings> {
        self.check(partition)?;
        let mut rings = self.rings.clone();
        rings[partition as usize] = ring;
        Ok(PartitionRings {
            rings,
            accessor: self.accessor.clone(),
        })
    }

    fn check(&self, partition: PartitionId) -> Result<()> {
        if (partition as usize) < self.rings.len() {
            Ok(())
        } else {
            Err(self.unknown(partition))
        }
    }

    fn unknown(&self, partition: PartitionId) -> Error {
        ShardError::UnknownPartition {
            partition,
            count: self.partition_count(),
        }
        .into()
    }
}

impl fmt::Debug for PartitionRings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionRings")
            .field("rings", &self.rings)
            .finish_non_exhaustive()
    }
}

pub trait RingProvider: Send + Sync {
    /// A snapshot of the rings currently serving `service`. The snapshot is
    /// never mutated; topology changes publish a new one.
    fn rings(&self, service: &str) -> Result<Arc<PartitionRings>>;
}

impl<P: RingProvider + ?Sized> RingProvider for Arc<P> {
    fn rings(&self, service: &str) -> Result<Arc<PartitionRings>> {
        (**self).rings(service)
    }
}

/// Serves the same rings whatever the service.
#[derive(Debug)]
pub struct StaticRingProvider {
    rings: Arc<PartitionRings>,
}

impl StaticRingProvider {
    pub fn new(rings: PartitionRings) -> Self {
        Self {
            rings: Arc::new(rings),
        }
    }
}

impl RingProvider for StaticRingProvider {
    fn rings(&self, _service: &str) -> Result<Arc<PartitionRings>> {
        Ok(self.rings.clone())
    }
}

/// Per-service rings fed by a topology source.
#[derive(Debug, Default)]
pub struct DynamicRingProvider {
    services: ShardedLock<HashMap<String, Arc<PartitionRings>>>,
}

impl DynamicRingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, service: &str, rings: PartitionRings) {
        let hosts: usize = rings.rings().iter().map(|r| r.host_count()).sum();
        log::info!(
            "publishing {} partitions, {} hosts for service {}",
            rings.partition_count(),
            hosts,
            service
        );
        let mut services = self.services.write().unwrap_or_else(PoisonError::into_inner);
        services.insert(service.to_owned(), Arc::new(rings));
    }

    /// Rebuilds one partition's ring from a new membership list, keeping the
    /// ring's hash settings, and publishes the result.
    pub fn replace_partition<I>(&self, service: &str, partition: PartitionId, hosts: I) -> Result<()>
    where
        I: IntoIterator<Item = (Host, u32)>,
    {
        let current = self.rings(service)?;
        let ring = current.ring_for_partition(partition)?.rebuild(hosts);
        log::info!(
            "service {} partition {} now has {} hosts",
            service,
            partition,
            ring.host_count()
        );
        let next = current.with_ring(partition, ring)?;
        let mut services = self.services.write().unwrap_or_else(PoisonError::into_inner);
        services.insert(service.to_owned(), Arc::new(next));
        Ok(())
    }

    pub fn remove(&self, service: &str) -> bool {
        let mut services = self.services.write().unwrap_or_else(PoisonError::into_inner);
        services.remove(service).is_some()
    }

    pub fn services(&self) -> Vec<String> {
        let services = self.services.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = services.keys().cloned().collect();
        names.sort();
        names
    }
}

impl RingProvider for DynamicRingProvider {
    fn rings(&self, service: &str) -> Result<Arc<PartitionRings>> {
        let services = self.services.read().unwrap_or_else(PoisonError::into_inner);
        services
            .get(service)
            .cloned()
            .ok_or_else(|| Error::service_unavailable(service, "no topology published"))
    }
}
