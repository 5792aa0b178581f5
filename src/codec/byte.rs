use crate::codec::Key;
use std::borrow::Cow;
use std::fmt;

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteKey {
    inner: Vec<u8>,
}

impl Key for ByteKey {
    fn key_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(&self.inner)
    }
}

impl<const N: usize> From<&[u8; N]> for ByteKey {
    fn from(t: &[u8; N]) -> ByteKey {
        ByteKey { inner: t.to_vec() }
    }
}

impl From<&str> for ByteKey {
    fn from(s: &str) -> ByteKey {
        ByteKey {
            inner: s.as_bytes().to_vec(),
        }
    }
}

impl fmt::Display for ByteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.inner) {
            Ok(v) => f.write_str(v),
            Err(_) => {
                for b in &self.inner {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for ByteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteKey({})", self)
    }
}

impl ByteKey {
    pub fn new(bytes: &[u8]) -> ByteKey {
        ByteKey {
            inner: bytes.to_owned(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_key_display() {
        assert_eq!(ByteKey::from("user:1").to_string(), "user:1");
        assert_eq!(ByteKey::new(&[0xff, 0x01]).to_string(), "ff01");
        assert!(ByteKey::from(b"a") < ByteKey::from(b"b"));
        assert_eq!(ByteKey::from("k").key_bytes().as_ref(), b"k");
    }
}
