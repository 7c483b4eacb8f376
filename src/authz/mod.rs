pub mod adapter;
pub mod adapters;
pub mod errors;
pub mod manager;
pub mod model;
pub mod parser;
pub mod rules;

pub use adapter::{Adapter, Capabilities, Filter, Outcome};
pub use adapters::{FileAdapter, MemoryAdapter};
pub use errors::{AdapterError, AuthzError, ModelError, ValidationError};
pub use manager::{Lifecycle, PolicyManager};
pub use model::{Definition, Model};
pub use rules::{PolicySet, Rule};
