//! Live value stores: the shared Redis hash the recorder fills, and a
//! process-local cache for tests and offline runs.

mod memory;
mod redis_hash;

pub use memory::MemoryValueStore;
pub use redis_hash::RedisValueStore;
