//! Rule store adapters.

mod memory;
mod pg;

pub use memory::MemoryRuleStore;
pub use pg::PgRuleStore;
