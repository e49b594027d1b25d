//! driftfs - a small distributed file system in Rust.
//!
//! One central naming server owns the logical directory tree and resolves
//! hierarchical paths to storage servers; any number of storage servers own
//! regions of their local filesystem and serve file bytes. All components
//! talk over a thin typed RPC substrate: one call per TCP connection,
//! big-endian framing, serde-encoded argument graphs.

pub mod config;
pub mod error;
pub mod naming;
pub mod path;
pub mod proto;
pub mod rpc;
pub mod storage;
pub mod tree;
