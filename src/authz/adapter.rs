//! Persistence contract between a `PolicyManager` and a storage backend.
//!
//! `load_policy` and `save_policy` are mandatory. The incremental operations
//! and filtered loading are optional: the default implementations return
//! `Outcome::Unsupported`, which the manager treats as a silent no-op rather
//! than a failure.

use crate::authz::errors::AdapterError;
use crate::authz::model::Model;
use crate::authz::rules::{matches_filter, PolicySet, Rule};

/// Result of an optional adapter operation that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T = ()> {
    Applied(T),
    /// The backend does not implement this operation.
    Unsupported,
}

impl<T> Outcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }
}

/// Optional operations an adapter implements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub add: bool,
    pub remove: bool,
    pub remove_filtered: bool,
    pub filtered_load: bool,
}

impl Capabilities {
    pub const NONE: Capabilities = Capabilities {
        add: false,
        remove: false,
        remove_filtered: false,
        filtered_load: false,
    };

    pub const ALL: Capabilities = Capabilities {
        add: true,
        remove: true,
        remove_filtered: true,
        filtered_load: true,
    };

    /// Whether any single-rule mutation can be mirrored to the backend.
    pub fn incremental(&self) -> bool {
        self.add || self.remove || self.remove_filtered
    }
}

/// Positional prefix filter applied while loading.
///
/// `policy` applies to rules in section `p`, `grouping` to section `g`;
/// values start at field 0 and an empty value is a wildcard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub policy: Vec<String>,
    pub grouping: Vec<String>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_grouping<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.grouping = values.into_iter().map(Into::into).collect();
        self
    }

    /// Whether a rule of section `sec` passes the filter.
    pub fn keeps(&self, sec: &str, rule: &[String]) -> bool {
        let values = match sec {
            "p" => &self.policy,
            "g" => &self.grouping,
            _ => return true,
        };
        matches_filter(rule, 0, values)
    }
}

/// A pluggable policy storage backend.
///
/// Adapters own no state visible to the manager beyond what they persist;
/// they receive the model for arity context and never keep references to
/// the manager's structures across calls.
pub trait Adapter: Send {
    /// Read every stored rule into a fresh `PolicySet`.
    fn load_policy(&mut self, model: &Model) -> Result<PolicySet, AdapterError>;

    /// Replace everything stored with `policies`.
    ///
    /// This is a delete-then-insert full replace and is not transactional:
    /// a failure part way through may leave the backend holding a mix of
    /// old and new rules.
    fn save_policy(&mut self, model: &Model, policies: &PolicySet) -> Result<(), AdapterError>;

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }

    fn add_policy(
        &mut self,
        _sec: &str,
        _ptype: &str,
        _rule: &[String],
    ) -> Result<Outcome, AdapterError> {
        Ok(Outcome::Unsupported)
    }

    fn remove_policy(
        &mut self,
        _sec: &str,
        _ptype: &str,
        _rule: &[String],
    ) -> Result<Outcome, AdapterError> {
        Ok(Outcome::Unsupported)
    }

    fn remove_filtered_policy(
        &mut self,
        _sec: &str,
        _ptype: &str,
        _field_index: usize,
        _field_values: &[String],
    ) -> Result<Outcome, AdapterError> {
        Ok(Outcome::Unsupported)
    }

    fn load_filtered_policy(
        &mut self,
        _model: &Model,
        _filter: &Filter,
    ) -> Result<Outcome<PolicySet>, AdapterError> {
        Ok(Outcome::Unsupported)
    }
}

/// Split a policy line such as `p, alice, data1, read` into its policy type
/// and fields. Blank lines and `#` comments yield `None`.
pub fn parse_policy_line(line: &str) -> Option<(String, Rule)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let mut tokens = line.split(',').map(|t| t.trim().to_string());
    let ptype = tokens.next()?;
    Some((ptype, tokens.collect()))
}

pub fn format_policy_line(ptype: &str, rule: &[String]) -> String {
    let mut line = ptype.to_string();
    for field in rule {
        line.push_str(", ");
        line.push_str(field);
    }
    line
}

/// Build a `PolicySet` from line-oriented policy text, checking every rule
/// against the model. Rules rejected by `filter` are skipped.
pub fn policy_from_text(
    model: &Model,
    text: &str,
    filter: Option<&Filter>,
) -> Result<PolicySet, AdapterError> {
    let mut policies = PolicySet::new();

    for (idx, line) in text.lines().enumerate() {
        let Some((ptype, rule)) = parse_policy_line(line) else {
            continue;
        };
        let line_no = idx + 1;

        if ptype.is_empty() {
            return Err(AdapterError::InvalidPolicyLine {
                line: line_no,
                reason: "missing policy type".into(),
            });
        }
        let sec = model
            .section_of(&ptype)
            .ok_or_else(|| AdapterError::InvalidPolicyLine {
                line: line_no,
                reason: format!("policy type `{ptype}` is not defined in the model"),
            })?;
        model
            .validate_rule(sec, &ptype, &rule)
            .map_err(|e| AdapterError::InvalidPolicyLine {
                line: line_no,
                reason: e.to_string(),
            })?;

        if filter.map_or(true, |f| f.keeps(sec, &rule)) {
            policies.add(sec, &ptype, rule);
        }
    }

    Ok(policies)
}

/// Render every group as policy lines, in group order.
///
/// Fails without producing any text when a field would not read back
/// unchanged through `parse_policy_line`.
pub fn policy_to_text(policies: &PolicySet) -> Result<String, AdapterError> {
    let mut out = String::new();
    let mut line_no = 0;
    for (_, ptype, rules) in policies.groups() {
        for rule in rules {
            line_no += 1;
            if let Some((field, problem)) = rule
                .iter()
                .find_map(|f| unwritable_field(f).map(|p| (f, p)))
            {
                return Err(AdapterError::InvalidPolicyLine {
                    line: line_no,
                    reason: format!("field {field:?} of `{ptype}` {problem}"),
                });
            }
            out.push_str(&format_policy_line(ptype, rule));
            out.push('\n');
        }
    }
    Ok(out)
}

fn unwritable_field(field: &str) -> Option<&'static str> {
    if field.contains(',') {
        Some("contains a comma")
    } else if field.contains(['\n', '\r']) {
        Some("contains a line break")
    } else if field.trim() != field {
        Some("has leading or trailing whitespace")
    } else {
        None
    }
}
