use crate::codec::{Key, Value};
use crate::util::Result;

mod in_mem;
pub use in_mem::InMemEngine;

pub trait Engine: Sync + Send + 'static {
    type K: Key;
    type V: Value;

    // Values are returned owned, they leave the host in a response.
    fn put(&self, k: Self::K, v: Self::V) -> Result<()>;
    /// Returns whether the key existed.
    fn del(&self, k: &Self::K) -> Result<bool>;
    fn get(&self, k: &Self::K) -> Result<Option<Self::V>>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
