//! Hash strategies for the two key families.
//!
//! Integer keys hash to themselves. Byte-string keys go through a seeded
//! non-cryptographic hash; the seed is table-local so two tables never share
//! a collision pattern.

/// Hash of an integer key: its sign-extended bit pattern.
#[inline(always)]
pub(crate) fn identity(bits: i64) -> u64 {
    bits as u64
}

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// Seeded hash of a byte-string key.
        #[inline]
        pub(crate) fn hash_bytes(bytes: &[u8], seed: u64) -> u64 {
            use core::hash::BuildHasher;
            use core::hash::Hasher;

            let mut hasher = foldhash::fast::FixedState::with_seed(seed).build_hasher();
            hasher.write(bytes);
            hasher.finish()
        }
    } else if #[cfg(feature = "std")] {
        /// Seeded hash of a byte-string key.
        #[inline]
        pub(crate) fn hash_bytes(bytes: &[u8], seed: u64) -> u64 {
            use std::hash::Hasher;

            let mut hasher = std::hash::DefaultHasher::new();
            hasher.write_u64(seed);
            hasher.write(bytes);
            hasher.finish()
        }
    } else {
        compile_error!("byte-string keys need either the `foldhash` or the `std` feature");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_sign_extends() {
        assert_eq!(identity(5), 5);
        assert_eq!(identity(-1), u64::MAX);
        assert_eq!(identity(i32::MIN as i64) & 31, 0);
    }

    #[test]
    fn byte_hash_is_pure() {
        assert_eq!(hash_bytes(b"hello", 7), hash_bytes(b"hello", 7));
        assert_ne!(hash_bytes(b"hello", 7), hash_bytes(b"hellp", 7));
    }

    #[test]
    fn seed_changes_the_hash() {
        let differing = (0..16u64)
            .filter(|&seed| hash_bytes(b"key", seed) != hash_bytes(b"key", seed + 1))
            .count();
        assert!(differing > 0);
    }
}
