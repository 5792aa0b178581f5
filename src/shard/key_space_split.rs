use crate::shard::{PartitionAccessor, PartitionId};
use crate::util::{Result, ShardError};
use std::collections::BTreeMap;
use std::ops::Bound::{Included, Unbounded};

/// Range partitioning over the ordered key space.
///
/// A split at key `k` sends `k` and everything above it, up to the next
/// split, to the split's partition. Keys below the first split go to `begin`.
pub struct KeySpaceSplit {
    inner: BTreeMap<Vec<u8>, PartitionId>,
    begin: PartitionId,
}

impl KeySpaceSplit {
    pub fn new(begin: PartitionId) -> Self {
        Self {
            inner: BTreeMap::new(),
            begin,
        }
    }

    pub fn split(&mut self, key: &[u8], partition: PartitionId) -> Result<()> {
        if self.inner.contains_key(key) {
            return Err(ShardError::DuplicateSplit(String::from_utf8_lossy(key).into_owned()).into());
        }
        self.inner.insert(key.to_vec(), partition);
        Ok(())
    }

    /// Every partition id this accessor can return.
    pub fn partitions(&self) -> impl Iterator<Item = PartitionId> + '_ {
        std::iter::once(self.begin).chain(self.inner.values().copied())
    }

    fn left_value_include(&self, key: &[u8]) -> Option<PartitionId> {
        let (lower, upper) = (Unbounded, Included(key));
        self.inner
            .range::<[u8], _>((lower, upper))
            .next_back()
            .map(|(_, p)| *p)
    }
}

impl PartitionAccessor for KeySpaceSplit {
    fn partition_for(&self, key: &[u8]) -> PartitionId {
        self.left_value_include(key).unwrap_or(self.begin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::byte::ByteKey;
    use crate::codec::Key;
    use crate::util::Error;

    fn p(split: &KeySpaceSplit, key: &str) -> PartitionId {
        split.partition_for(&ByteKey::from(key).key_bytes())
    }

    #[test]
    fn test_split() {
        let mut split = KeySpaceSplit::new(0);

        // [..b) -> 0, [b..d) -> 1, [d..f) -> 2, [f..) -> 3
        split.split(b"b", 1).unwrap();
        split.split(b"d", 2).unwrap();
        split.split(b"f", 3).unwrap();

        assert_eq!(p(&split, "a"), 0);
        assert_eq!(p(&split, "b"), 1);
        assert_eq!(p(&split, "c"), 1);
        assert_eq!(p(&split, "d"), 2);
        assert_eq!(p(&split, "e"), 2);
        assert_eq!(p(&split, "f"), 3);
        assert_eq!(p(&split, "zzz"), 3);
        assert_eq!(split.partitions().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_duplicate_split() {
        let mut split = KeySpaceSplit::new(0);
        split.split(b"m", 1).unwrap();
        assert_eq!(
            split.split(b"m", 2).unwrap_err(),
            Error::ShardError(ShardError::DuplicateSplit("m".to_owned()))
        );
        assert_eq!(p(&split, "m"), 1);
    }

    #[test]
    fn test_numeric_ranges() {
        let mut split = KeySpaceSplit::new(0);
        split.split(&100u64.key_bytes(), 1).unwrap();
        split.split(&1000u64.key_bytes(), 2).unwrap();
        assert_eq!(split.partition_for(&99u64.key_bytes()), 0);
        assert_eq!(split.partition_for(&100u64.key_bytes()), 1);
        assert_eq!(split.partition_for(&999u64.key_bytes()), 1);
        assert_eq!(split.partition_for(&5000u64.key_bytes()), 2);
    }
}
