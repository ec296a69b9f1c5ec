//! Hashing: shard keys for replica lookup and fingerprints for merging

mod fingerprint;
mod fnv;
mod shard;

pub use fingerprint::Fingerprint;
pub use fnv::{hash_add32, hash_new32};
pub use shard::{shard_by_all_labels, shard_by_metric_name, ShardBy};
