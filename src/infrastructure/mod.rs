//! Adapters for the domain ports: in-memory and RocksDB-backed stores, and clocks.

pub mod clock;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
