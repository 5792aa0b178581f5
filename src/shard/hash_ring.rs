//! Consistent hash ring over fleet hosts.
//!
//! Each host is placed on a 64-bit circle at `weight * points_per_weight`
//! points. A key is owned by the first point whose hash is greater than or
//! equal to the key's hash, wrapping around to the first point. Adding or
//! removing a host only moves the keys whose successor point changes.

use crate::node::Host;
use crate::util::{Result, ShardError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use xxhash_rust::xxh3::xxh3_64;

/// Weight given to a host when the topology does not say otherwise.
pub const DEFAULT_HOST_WEIGHT: u32 = 100;

/// Hash functions available for ring placement. Changing the function of a
/// running ring remaps every key, so it is part of the ring's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashFunction {
    /// Leading 8 bytes of the MD5 digest, big-endian.
    #[default]
    Md5,
    Xxh3,
}

impl HashFunction {
    pub fn hash(&self, bytes: &[u8]) -> u64 {
        match self {
            HashFunction::Md5 => {
                let digest = md5::compute(bytes);
                let mut head = [0u8; 8];
                head.copy_from_slice(&digest.0[..8]);
                u64::from_be_bytes(head)
            }
            HashFunction::Xxh3 => xxh3_64(bytes),
        }
    }
}

/// Derived ordering is by hash first, then by host, which makes lookups
/// deterministic when two points collide.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RingPoint {
    pub hash: u64,
    pub host: Host,
}

#[derive(Debug, Clone, Copy)]
pub struct RingBuilder {
    hash: HashFunction,
    points_per_weight: u32,
}

impl Default for RingBuilder {
    fn default() -> Self {
        Self {
            hash: HashFunction::default(),
            points_per_weight: 1,
        }
    }
}

impl RingBuilder {
    pub fn hash_function(mut self, hash: HashFunction) -> Self {
        self.hash = hash;
        self
    }

    pub fn points_per_weight(mut self, points: u32) -> Self {
        self.points_per_weight = points;
        self
    }

    /// A host listed twice keeps its last weight. Hosts of weight 0 are left
    /// off the ring.
    pub fn build<I>(self, hosts: I) -> HashRing
    where
        I: IntoIterator<Item = (Host, u32)>,
    {
        let weights: BTreeMap<Host, u32> =
            hosts.into_iter().filter(|(_, w)| *w > 0).collect();
        let total: usize = weights
            .values()
            .map(|w| (*w as usize) * self.points_per_weight as usize)
            .sum();

        let mut points = Vec::with_capacity(total);
        for (host, weight) in &weights {
            for replica in 0..(*weight as u64 * self.points_per_weight as u64) {
                let label = format!("{}-{}", host, replica);
                points.push(RingPoint {
                    hash: self.hash.hash(label.as_bytes()),
                    host: host.clone(),
                });
            }
        }
        points.sort_unstable();

        HashRing {
            points,
            weights,
            builder: self,
        }
    }
}

/// An immutable ring. Topology changes produce a new ring.
#[derive(Debug, Clone)]
pub struct HashRing {
    points: Vec<RingPoint>,
    weights: BTreeMap<Host, u32>,
    builder: RingBuilder,
}

impl HashRing {
    pub fn builder() -> RingBuilder {
        RingBuilder::default()
    }

    pub fn build<I>(hosts: I) -> HashRing
    where
        I: IntoIterator<Item = (Host, u32)>,
    {
        RingBuilder::default().build(hosts)
    }

    pub fn lookup(&self, key: &[u8]) -> Result<&Host> {
        if self.points.is_empty() {
            return Err(ShardError::EmptyRing.into());
        }
        let hash = self.builder.hash.hash(key);
        let index = self.points.partition_point(|p| p.hash < hash);
        let point = self.points.get(index).unwrap_or(&self.points[0]);
        Ok(&point.host)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.weights.keys()
    }

    pub fn host_weights(&self) -> &BTreeMap<Host, u32> {
        &self.weights
    }

    pub fn weight(&self, host: &Host) -> Option<u32> {
        self.weights.get(host).copied()
    }

    pub fn points(&self) -> &[RingPoint] {
        &self.points
    }

    pub fn host_count(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn hash_function(&self) -> HashFunction {
        self.builder.hash
    }

    /// Rebuilds with the same hash settings over a new host set.
    pub fn rebuild<I>(&self, hosts: I) -> HashRing
    where
        I: IntoIterator<Item = (Host, u32)>,
    {
        self.builder.build(hosts)
    }

    pub fn with_host(&self, host: Host, weight: u32) -> HashRing {
        let mut weights = self.weights.clone();
        weights.insert(host, weight);
        self.rebuild(weights)
    }

    pub fn without_host(&self, host: &Host) -> HashRing {
        let mut weights = self.weights.clone();
        weights.remove(host);
        self.rebuild(weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test::test_ring;
    use crate::util::Error;
    use std::collections::HashMap;

    fn ring_of(names: &[&str], weight: u32) -> HashRing {
        HashRing::build(names.iter().map(|n| (Host::from(*n), weight)))
    }

    /// A ring over hand-placed points, one point of weight 1 per entry.
    fn ring_from_points(points: &[(u64, &str)]) -> HashRing {
        let mut points: Vec<RingPoint> = points
            .iter()
            .map(|(hash, host)| RingPoint {
                hash: *hash,
                host: Host::from(*host),
            })
            .collect();
        points.sort_unstable();
        let weights = points.iter().map(|p| (p.host.clone(), 1)).collect();
        HashRing {
            points,
            weights,
            builder: RingBuilder::default(),
        }
    }

    #[test]
    fn test_empty_ring() {
        let ring = HashRing::build(Vec::<(Host, u32)>::new());
        assert!(ring.is_empty());
        assert_eq!(
            ring.lookup(b"key").unwrap_err(),
            Error::ShardError(ShardError::EmptyRing)
        );
        // Weight 0 hosts are not placed.
        let ring = ring_of(&["a"], 0);
        assert!(ring.lookup(b"key").is_err());
    }

    #[test]
    fn test_points_follow_weight() {
        let ring = HashRing::builder()
            .points_per_weight(2)
            .build(vec![(Host::from("a"), 10), (Host::from("b"), 30)]);
        assert_eq!(ring.points().len(), 80);
        assert_eq!(ring.host_count(), 2);
        assert_eq!(ring.weight(&Host::from("b")), Some(30));
        assert!(ring.points().windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_lookup_deterministic() {
        let r1 = test_ring(0..5);
        let r2 = test_ring(0..5);
        for i in 0u64..500 {
            let key = i.to_be_bytes();
            assert_eq!(r1.lookup(&key).unwrap(), r2.lookup(&key).unwrap());
        }
        // Input order does not matter.
        let r3 = HashRing::build(
            crate::util::test::hosts(0..5)
                .into_iter()
                .rev()
                .map(|h| (h, DEFAULT_HOST_WEIGHT)),
        );
        assert_eq!(r1.points(), r3.points());
    }

    #[test]
    fn test_lookup_is_successor() {
        let ring = ring_of(&["a", "b", "c"], 20);
        let points = ring.points();
        for i in 0u64..200 {
            let key = i.to_be_bytes();
            let hash = HashFunction::Md5.hash(&key);
            let expected = points
                .iter()
                .find(|p| p.hash >= hash)
                .unwrap_or(&points[0]);
            assert_eq!(ring.lookup(&key).unwrap(), &expected.host);
        }
    }

    #[test]
    fn test_single_host_owns_everything() {
        let ring = ring_of(&["only"], 3);
        for i in 0u64..100 {
            assert_eq!(ring.lookup(&i.to_be_bytes()).unwrap().as_str(), "only");
        }
    }

    #[test]
    fn test_collision_breaks_by_host() {
        let mut a = RingPoint {
            hash: 7,
            host: Host::from("b"),
        };
        let b = RingPoint {
            hash: 7,
            host: Host::from("a"),
        };
        assert!(b < a);
        a.hash = 6;
        assert!(a < b);
    }

    #[test]
    fn test_lookup_on_collision_takes_lower_host() {
        let key = b"colliding";
        let h = HashFunction::Md5.hash(key);
        let below = h.saturating_sub(1);
        for placement in [
            vec![(h, "b"), (h, "a"), (below, "c")],
            vec![(h, "a"), (below, "c"), (h, "b")],
        ] {
            let ring = ring_from_points(&placement);
            assert_eq!(ring.lookup(key).unwrap(), &Host::from("a"));
        }

        // Past the last point the lookup wraps to the first one.
        let ring = ring_from_points(&[(0, "z"), (0, "y")]);
        if h > 0 {
            assert_eq!(ring.lookup(key).unwrap(), &Host::from("y"));
        }
    }

    #[test]
    fn test_minimal_disruption_on_remove() {
        let names: Vec<String> = (0..10).map(|i| format!("host-{}", i)).collect();
        let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        let before = ring_of(&refs, DEFAULT_HOST_WEIGHT);
        let removed = Host::from("host-3");
        let after = before.without_host(&removed);
        assert_eq!(after.host_count(), 9);

        let total = 10_000u64;
        let mut moved = 0;
        for i in 0..total {
            let key = i.to_be_bytes();
            let old = before.lookup(&key).unwrap();
            let new = after.lookup(&key).unwrap();
            if old != new {
                // Only keys of the removed host move.
                assert_eq!(old, &removed);
                moved += 1;
            }
        }
        assert!(moved > 0);
        assert!(moved < total / 5, "moved {} of {}", moved, total);
    }

    #[test]
    fn test_minimal_disruption_on_add() {
        let before = test_ring(0..4);
        let added = Host::from("test4");
        let after = before.with_host(added.clone(), DEFAULT_HOST_WEIGHT);
        for i in 0u64..2000 {
            let key = i.to_be_bytes();
            let old = before.lookup(&key).unwrap();
            let new = after.lookup(&key).unwrap();
            if old != new {
                assert_eq!(new, &added);
            }
        }
    }

    #[test]
    fn test_distribution_roughly_even() {
        let ring = HashRing::builder()
            .hash_function(HashFunction::Xxh3)
            .build(crate::util::test::hosts(0..4).into_iter().map(|h| (h, 100)));
        let mut counts: HashMap<&Host, usize> = HashMap::new();
        for i in 0u64..8000 {
            *counts.entry(ring.lookup(&i.to_be_bytes()).unwrap()).or_default() += 1;
        }
        assert_eq!(counts.len(), 4);
        assert!(counts.values().all(|&n| n > 1000 && n < 3000));
    }
}
