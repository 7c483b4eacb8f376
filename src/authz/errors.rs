use miette::Diagnostic;
use thiserror::Error;

/// Failure to turn model text into a `Model`.
#[derive(Debug, Error, Diagnostic)]
pub enum ModelError {
    #[error("Failed to load model file `{path}`")]
    #[diagnostic(
        code(perihelion::model::load),
        help("Check that the model file exists and is readable")
    )]
    ModelLoadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: `{text}` appears before any section header")]
    #[diagnostic(
        code(perihelion::model::outside_section),
        help("Start the model with a section header such as [request_definition]")
    )]
    LineOutsideSection { line: usize, text: String },

    #[error("line {line}: invalid section header `{header}`")]
    #[diagnostic(
        code(perihelion::model::section_header),
        help("Section headers look like [policy_definition] and may only use letters, digits and `_`")
    )]
    InvalidSectionHeader { line: usize, header: String },

    #[error("line {line}: duplicate key `{key}` in section `{section}`")]
    #[diagnostic(
        code(perihelion::model::duplicate_key),
        help("Use a numbered variant (e.g. p2, g2) for additional definitions")
    )]
    DuplicateKey {
        line: usize,
        section: String,
        key: String,
    },

    #[error("line {line}: missing `=` in `{text}`")]
    #[diagnostic(
        code(perihelion::model::missing_separator),
        help("Assignments use the form: key = value")
    )]
    MissingSeparator { line: usize, text: String },

    #[error("line {line}: assignment has an empty key")]
    #[diagnostic(code(perihelion::model::empty_key))]
    EmptyKey { line: usize },

    #[error("line {line}: definition `{key}` in section `{section}` has an empty field name")]
    #[diagnostic(
        code(perihelion::model::empty_definition),
        help("Field lists are comma separated names, e.g. p = sub, obj, act")
    )]
    EmptyDefinition {
        line: usize,
        section: String,
        key: String,
    },

    #[error("line {line}: line continuation `\\` at end of input")]
    #[diagnostic(code(perihelion::model::dangling_continuation))]
    DanglingContinuation { line: usize },

    #[error("Invalid definition `{key}` in section `{section}`: {reason}")]
    #[diagnostic(code(perihelion::model::invalid_definition))]
    InvalidDefinition {
        section: String,
        key: String,
        reason: String,
    },
}

/// A rule or filter that does not fit the bound model.
#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Policy type `{ptype}` is not defined in section `{sec}` of the model")]
    #[diagnostic(
        code(perihelion::validation::unknown_ptype),
        help("Declare it under [policy_definition] (p, p2, ...) or [role_definition] (g, g2, ...)")
    )]
    UnknownPolicyType { sec: String, ptype: String },

    #[error("Rule for `{sec}.{ptype}` has {actual} fields, the model declares {expected}")]
    #[diagnostic(code(perihelion::validation::arity))]
    ArityMismatch {
        sec: String,
        ptype: String,
        expected: usize,
        actual: usize,
    },

    #[error(
        "Filter on `{sec}.{ptype}` has {len} value(s) starting at field {field_index}, past the {arity} fields the model declares"
    )]
    #[diagnostic(code(perihelion::validation::filter_range))]
    FilterOutOfRange {
        sec: String,
        ptype: String,
        field_index: usize,
        len: usize,
        arity: usize,
    },
}

/// Backend-specific failure reported by an `Adapter`.
#[derive(Debug, Error, Diagnostic)]
pub enum AdapterError {
    #[error("Failed to access policy file `{path}`")]
    #[diagnostic(
        code(perihelion::adapter::policy_file),
        help("Check that the policy file path is correct and writable")
    )]
    PolicyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid policy line {line}: {reason}")]
    #[diagnostic(
        code(perihelion::adapter::invalid_line),
        help("Policy lines look like: p, alice, data1, read")
    )]
    InvalidPolicyLine { line: usize, reason: String },

    #[error("Rule does not fit the model: {0}")]
    #[diagnostic(code(perihelion::adapter::validation))]
    Validation(#[from] ValidationError),

    #[error("Backend error: {0}")]
    #[diagnostic(code(perihelion::adapter::backend))]
    Backend(String),

    #[error("I/O error: {0}")]
    #[diagnostic(code(perihelion::adapter::io))]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by `PolicyManager` operations.
#[derive(Debug, Error, Diagnostic)]
pub enum AuthzError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Adapter(#[from] AdapterError),

    #[error("No model and adapter are bound")]
    #[diagnostic(
        code(perihelion::manager::not_bound),
        help("Call PolicyManager::bind(model, adapter) first")
    )]
    NotBound,

    #[error("Cannot save a filtered policy")]
    #[diagnostic(
        code(perihelion::manager::filtered_save),
        help("Saving would drop every rule outside the filter; run load_policy() for the full set first")
    )]
    FilteredSave,

    #[error("The bound adapter does not support filtered policy loading")]
    #[diagnostic(code(perihelion::manager::filtering_unsupported))]
    FilteringUnsupported,
}

impl AuthzError {
    /// True when the error came from the storage backend, i.e. memory and
    /// storage may now disagree after an incremental mutation.
    pub fn is_adapter(&self) -> bool {
        matches!(self, AuthzError::Adapter(_))
    }
}
