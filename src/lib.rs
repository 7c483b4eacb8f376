//! Perihelion - access-control model definitions and policy persistence
//!
//! Parses model text (`[request_definition]`, `[policy_definition]`, ...)
//! into a `Model`, keeps policy rules in memory, and syncs them with a
//! pluggable storage `Adapter`. Matcher evaluation and role resolution are
//! left to the engine consuming the model and rules.

pub mod authz;
pub mod settings;

pub use authz::{
    Adapter, AdapterError, AuthzError, Capabilities, Definition, FileAdapter, Filter, Lifecycle,
    MemoryAdapter, Model, ModelError, Outcome, PolicyManager, PolicySet, Rule, ValidationError,
};
