use crate::codec::{Key, Value};
use crate::storage::Engine;
use crate::util::Result;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

pub struct InMemEngine<K, V>
where
    K: Key,
    V: Value,
{
    inner: RwLock<BTreeMap<K, V>>,
}

impl<K, V> Default for InMemEngine<K, V>
where
    K: Key,
    V: Value,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> InMemEngine<K, V>
where
    K: Key,
    V: Value,
{
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn keys(&self) -> Vec<K> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.keys().cloned().collect()
    }
}

impl<K, V> Engine for InMemEngine<K, V>
where
    K: Key,
    V: Value,
{
    type K = K;
    type V = V;

    fn put(&self, k: K, v: V) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.insert(k, v);
        Ok(())
    }

    fn del(&self, k: &K) -> Result<bool> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.remove(k).is_some())
    }

    fn get(&self, k: &K) -> Result<Option<Self::V>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.get(k).cloned())
    }

    fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_mem_engine() {
        let engine = InMemEngine::new();
        for i in 0u64..1000 {
            let v = engine.get(&i).unwrap();
            assert_eq!(v, None);
            engine.put(i, i).unwrap();
            let v = engine.get(&i).unwrap();
            assert_eq!(v, Some(i));
        }
        for i in 0u64..1000 {
            let expected = if i % 2 == 0 { Some(2 * i) } else { None };
            match expected {
                Some(v) => engine.put(i, v).unwrap(),
                None => assert!(engine.del(&i).unwrap()),
            }
            let v = engine.get(&i).unwrap();
            assert_eq!(v, expected);
        }
        assert!(!engine.del(&1).unwrap());
        assert_eq!(engine.len(), 500);
        assert_eq!(engine.keys()[..3].to_vec(), vec![0, 2, 4]);
    }
}
