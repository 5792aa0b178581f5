use std::borrow::Cow;
use std::fmt::Debug;

/// A routable key. `key_bytes` is what the partition and ring hash functions
/// see, so it must be stable for equal keys.
pub trait Key: Clone + Ord + Debug + Send + Sync + 'static {
    fn key_bytes(&self) -> Cow<'_, [u8]>;
}

pub trait Value: Clone + Debug + Send + Sync + 'static {}

impl<T: Clone + Debug + Send + Sync + 'static> Value for T {}

impl Key for u64 {
    fn key_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Owned(self.to_be_bytes().to_vec())
    }
}

impl Key for u32 {
    fn key_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Owned(self.to_be_bytes().to_vec())
    }
}

impl Key for i64 {
    // Flip the sign bit so byte order follows numeric order.
    fn key_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Owned(((*self as u64) ^ (1 << 63)).to_be_bytes().to_vec())
    }
}

impl Key for String {
    fn key_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_bytes())
    }
}

impl Key for Vec<u8> {
    fn key_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self)
    }
}

pub mod byte;
