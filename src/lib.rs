//! Canopy: Incremental Merkle Hashing for Live Namespaces
//!
//! Maintains a Merkle tree over a mutable directory hierarchy so that an
//! up-to-date root hash is available without rehashing unchanged subtrees.
//! Mutations invalidate the touched node and its ancestor chain; hashes are
//! recomputed lazily, on demand, and only over the invalid region.

pub mod config;
pub mod error;
pub mod facade;
pub mod ignore;
pub mod logging;
pub mod provider;
pub mod scan;
pub mod store;
pub mod tree;
pub mod types;
