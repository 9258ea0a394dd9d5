use crate::codec::Bytes;
use crate::error::Error;

/// Length limits for a byte-string keyed and valued table.
///
/// Both limits must lie in `1..=65535`; they are checked before any storage
/// is allocated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StrLimits {
    /// Longest key the table accepts, in bytes.
    pub max_key_length: usize,
    /// Longest value the table accepts, in bytes.
    pub max_value_length: usize,
}

impl StrLimits {
    /// Creates limits for keys and values, unchecked until [`codecs`](Self::codecs).
    pub const fn new(max_key_length: usize, max_value_length: usize) -> Self {
        Self {
            max_key_length,
            max_value_length,
        }
    }

    /// Builds the key and value codecs, rejecting out-of-range limits.
    pub fn codecs(&self) -> Result<(Bytes, Bytes), Error> {
        Ok((
            Bytes::new(self.max_key_length)?,
            Bytes::new(self.max_value_length)?,
        ))
    }
}
