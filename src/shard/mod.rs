pub type PartitionId = u32;

/// Maps the bytes of a key to a partition. Implementations must be pure:
/// the same key always lands in the same partition for a given topology.
pub trait PartitionAccessor: Send + Sync {
    fn partition_for(&self, key: &[u8]) -> PartitionId;
}

impl<F> PartitionAccessor for F
where
    F: Fn(&[u8]) -> PartitionId + Send + Sync,
{
    fn partition_for(&self, key: &[u8]) -> PartitionId {
        self(key)
    }
}

/// Unpartitioned fleet.
pub struct SinglePartition;

impl PartitionAccessor for SinglePartition {
    fn partition_for(&self, _key: &[u8]) -> PartitionId {
        0
    }
}

pub struct HashPartitionAccessor {
    count: u32,
    hash: HashFunction,
}

impl HashPartitionAccessor {
    pub fn new(count: u32) -> Self {
        Self::with_hash(count, HashFunction::default())
    }

    pub fn with_hash(count: u32, hash: HashFunction) -> Self {
        Self { count, hash }
    }
}

impl PartitionAccessor for HashPartitionAccessor {
    fn partition_for(&self, key: &[u8]) -> PartitionId {
        if self.count == 0 {
            return 0;
        }
        (self.hash.hash(key) % self.count as u64) as PartitionId
    }
}

mod hash_ring;
pub use hash_ring::{HashFunction, HashRing, RingBuilder, RingPoint, DEFAULT_HOST_WEIGHT};

mod key_space_split;
pub use key_space_split::KeySpaceSplit;

mod provider;
pub use provider::{DynamicRingProvider, PartitionRings, RingProvider, StaticRingProvider};
