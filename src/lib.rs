#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

/// Per-role encoding of keys and values.
pub mod codec;

mod config;
mod error;
mod hash;
mod occupancy;
mod probe_bound;
mod rehash;
mod slot_store;

/// The table engine: lookups, inserts, deletions and iteration.
pub mod table;

pub use codec::Bytes;
pub use codec::Codec;
pub use codec::Fixed;
pub use codec::IntKey;
pub use codec::KeyCodec;
pub use codec::MAX_RECORD_LEN;
pub use codec::Scalar;
pub use config::StrLimits;
pub use error::Error;
pub use slot_store::ByteArena;
pub use slot_store::FixedSlots;
pub use slot_store::SlotStore;
pub use table::Iter;
pub use table::MIN_BUCKETS;
pub use table::Table;
#[cfg(any(test, feature = "stats"))]
pub use table::TableStats;

/// `i32` keys, `i32` values.
pub type I32I32Table = Table<Fixed<i32>, Fixed<i32>>;
/// `i32` keys, `i64` values.
pub type I32I64Table = Table<Fixed<i32>, Fixed<i64>>;
/// `i64` keys, `i32` values.
pub type I64I32Table = Table<Fixed<i64>, Fixed<i32>>;
/// `i64` keys, `i64` values.
pub type I64I64Table = Table<Fixed<i64>, Fixed<i64>>;
/// Length-bounded byte-string keys and values.
pub type StrTable = Table<Bytes, Bytes>;
