//! Fleet topology loaded from JSON.
//!
//! ```json
//! {
//!   "services": {
//!     "greetings": {
//!       "hash": "md5",
//!       "partitioning": { "type": "hash" },
//!       "partitions": [
//!         [{ "uri": "test0" }, { "uri": "test1", "weight": 50 }],
//!         [{ "uri": "test2" }]
//!       ]
//!     }
//!   }
//! }
//! ```

use crate::codec::Key;
use crate::node::Host;
use crate::shard::{
    DynamicRingProvider, HashFunction, HashPartitionAccessor, HashRing, KeySpaceSplit,
    PartitionAccessor, PartitionId, PartitionRings, SinglePartition, DEFAULT_HOST_WEIGHT,
};
use crate::util::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetConfig {
    pub services: BTreeMap<String, ServiceConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub hash: HashFunction,
    #[serde(default = "default_points_per_weight")]
    pub points_per_weight: u32,
    #[serde(default)]
    pub partitioning: Partitioning,
    /// Hosts of each partition, indexed by partition id.
    pub partitions: Vec<Vec<HostConfig>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    pub uri: Host,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Partitioning {
    /// `hash(key) % partitions`, with the service's hash function.
    #[default]
    Hash,
    /// Ordered key ranges.
    Range {
        #[serde(default)]
        begin: PartitionId,
        splits: Vec<RangeSplit>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeSplit {
    pub start: SplitKey,
    pub partition: PartitionId,
}

/// Integers split on their big-endian bytes, like `u64` keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SplitKey {
    Int(u64),
    Text(String),
}

impl SplitKey {
    fn to_bytes(&self) -> Vec<u8> {
        match self {
            SplitKey::Int(i) => i.key_bytes().into_owned(),
            SplitKey::Text(s) => s.as_bytes().to_vec(),
        }
    }
}

fn default_points_per_weight() -> u32 {
    1
}

fn default_weight() -> u32 {
    DEFAULT_HOST_WEIGHT
}

impl FleetConfig {
    pub fn from_json(json: &str) -> Result<FleetConfig> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validates every service and publishes its rings into a fresh
    /// provider.
    pub fn ring_provider(&self) -> Result<DynamicRingProvider> {
        let provider = DynamicRingProvider::new();
        for (name, service) in &self.services {
            let rings = service
                .build_rings()
                .map_err(|e| Error::ConfigError(format!("service {}: {}", name, e)))?;
            provider.publish(name, rings);
        }
        Ok(provider)
    }

    /// Every configured host once, whatever service or partition lists it.
    pub fn hosts(&self) -> Vec<Host> {
        let mut hosts: Vec<Host> = self
            .services
            .values()
            .flat_map(|s| s.partitions.iter().flatten())
            .map(|h| h.uri.clone())
            .collect();
        hosts.sort();
        hosts.dedup();
        hosts
    }
}

impl ServiceConfig {
    pub fn build_rings(&self) -> Result<PartitionRings> {
        if self.partitions.is_empty() {
            return Err(Error::ConfigError("no partitions configured".to_owned()));
        }
        if self.points_per_weight == 0 {
            return Err(Error::ConfigError("points_per_weight must be positive".to_owned()));
        }

        let builder = HashRing::builder()
            .hash_function(self.hash)
            .points_per_weight(self.points_per_weight);
        let rings: Vec<HashRing> = self
            .partitions
            .iter()
            .enumerate()
            .map(|(partition, hosts)| {
                if hosts.is_empty() {
                    log::warn!("partition {} has no hosts", partition);
                }
                builder.build(hosts.iter().map(|h| (h.uri.clone(), h.weight)))
            })
            .collect();

        let count = rings.len() as u32;
        let accessor: Arc<dyn PartitionAccessor> = match &self.partitioning {
            Partitioning::Hash if count == 1 => Arc::new(SinglePartition),
            Partitioning::Hash => Arc::new(HashPartitionAccessor::with_hash(count, self.hash)),
            Partitioning::Range { begin, splits } => {
                let mut split = KeySpaceSplit::new(*begin);
                for s in splits {
                    split.split(&s.start.to_bytes(), s.partition)?;
                }
                if let Some(p) = split.partitions().find(|p| *p >= count) {
                    return Err(Error::ConfigError(format!(
                        "range partitioning refers to partition {}, {} configured",
                        p, count
                    )));
                }
                Arc::new(split)
            }
        };
        Ok(PartitionRings::partitioned(rings, accessor))
    }
}
