//! Reference `Adapter` implementations.

mod file;
mod memory;

pub use file::FileAdapter;
pub use memory::MemoryAdapter;
