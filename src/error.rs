//! Error types returned by table operations.
//!
//! A missing key is never an error: lookups and deletions report absence with
//! `None`. Everything here is a failed operation that left the table in its
//! prior valid state.

/// Errors produced by [`Table`](crate::Table) operations.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A byte-string key or value is longer than the configured maximum.
    ///
    /// The write was rejected before any bucket was touched.
    #[error("record of {len} bytes exceeds the configured maximum of {max} bytes")]
    ValueTooLong {
        /// Length of the rejected record.
        len: usize,
        /// Configured maximum for this role.
        max: usize,
    },

    /// Backing storage could not be allocated.
    ///
    /// When raised by a resize, the table still holds its previous storage.
    #[error("failed to allocate {bytes} bytes of table storage")]
    AllocationFailure {
        /// Number of bytes requested from the allocator.
        bytes: usize,
    },

    /// An insert visited every bucket without finding a free one.
    ///
    /// The load-factor threshold makes this unreachable in a consistent table,
    /// so seeing it indicates internal corruption.
    #[error("probe exhausted all {buckets} buckets without finding a free slot")]
    ProbeExhausted {
        /// Bucket count of the table at the time of the failure.
        buckets: usize,
    },

    /// A configured maximum record length is outside `1..=65535`.
    #[error("maximum record length must be within 1..=65535, got {0}")]
    InvalidLength(usize),

    /// The operating system could not provide randomness for the table seed.
    #[error("operating system randomness unavailable for the table seed")]
    SeedUnavailable,
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;

    #[test]
    fn messages_name_the_offending_sizes() {
        let err = Error::ValueTooLong { len: 8, max: 5 };
        assert_eq!(
            err.to_string(),
            "record of 8 bytes exceeds the configured maximum of 5 bytes"
        );

        let err = Error::InvalidLength(70000);
        assert!(err.to_string().contains("70000"));
    }
}
