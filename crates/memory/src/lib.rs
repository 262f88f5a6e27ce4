pub mod decision_memory;
pub mod key;

pub use decision_memory::DecisionMemory;
pub use key::MemoryKey;
