use std::fmt;
use std::path::Path;

use crate::authz::errors::{ModelError, ValidationError};
use crate::authz::parser::parse_model;

pub const REQUEST_DEFINITION: &str = "request_definition";
pub const POLICY_DEFINITION: &str = "policy_definition";
pub const ROLE_DEFINITION: &str = "role_definition";
pub const POLICY_EFFECT: &str = "policy_effect";
pub const MATCHERS: &str = "matchers";

/// Rule section short names, in the order rule groups are reported.
pub const RULE_SECTIONS: [&str; 2] = ["p", "g"];

/// Sections whose values are comma separated field names.
/// Everything else keeps its value as a raw expression.
pub fn is_field_section(section: &str) -> bool {
    matches!(
        section,
        REQUEST_DEFINITION | POLICY_DEFINITION | ROLE_DEFINITION
    )
}

/// Map a rule section (`p`/`g` or the full section name) to its short name.
pub fn rule_section(sec: &str) -> Option<&'static str> {
    match sec {
        "p" | POLICY_DEFINITION => Some("p"),
        "g" | ROLE_DEFINITION => Some("g"),
        _ => None,
    }
}

fn definition_section(short: &str) -> &'static str {
    if short == "g" {
        ROLE_DEFINITION
    } else {
        POLICY_DEFINITION
    }
}

/// Value of one assertion: a field list or an expression handed to the evaluator untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Definition {
    Fields(Vec<String>),
    Expression(String),
}

impl Definition {
    pub fn fields<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Definition::Fields(names.into_iter().map(Into::into).collect())
    }

    pub fn expression(expr: impl Into<String>) -> Self {
        Definition::Expression(expr.into())
    }

    pub fn as_fields(&self) -> Option<&[String]> {
        match self {
            Definition::Fields(f) => Some(f),
            Definition::Expression(_) => None,
        }
    }

    pub fn as_expression(&self) -> Option<&str> {
        match self {
            Definition::Expression(e) => Some(e),
            Definition::Fields(_) => None,
        }
    }
}

impl fmt::Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Definition::Fields(fields) => write!(f, "{}", fields.join(", ")),
            Definition::Expression(expr) => write!(f, "{}", expr),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    pub key: String,
    pub value: Definition,
}

/// One `[section]` of a model, assertions kept in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    name: String,
    assertions: Vec<Assertion>,
}

impl Section {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            assertions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&Definition> {
        self.assertions
            .iter()
            .find(|a| a.key == key)
            .map(|a| &a.value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.assertions.iter().map(|a| a.key.as_str())
    }

    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }

    pub fn len(&self) -> usize {
        self.assertions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assertions.is_empty()
    }
}

/// Parsed model: sections in declaration order, each mapping keys to definitions.
///
/// A model is immutable once bound to a `PolicyManager`; reloading swaps in
/// a fresh value rather than merging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Model {
    sections: Vec<Section>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_text(text: &str) -> Result<Self, ModelError> {
        parse_model(text)
    }

    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| ModelError::ModelLoadError {
                path: path.display().to_string(),
                source,
            })?;
        let model = parse_model(&contents)?;
        tracing::debug!(
            path = %path.display(),
            sections = model.sections.len(),
            "Parsed model file"
        );
        Ok(model)
    }

    /// Add a definition programmatically. Keys must be unique within a
    /// section and field lists must name at least one non-empty field.
    pub fn add_definition(
        &mut self,
        section: &str,
        key: &str,
        value: Definition,
    ) -> Result<(), ModelError> {
        let invalid = |reason: &str| ModelError::InvalidDefinition {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.to_string(),
        };

        if key.is_empty() {
            return Err(invalid("key is empty"));
        }
        if let Definition::Fields(fields) = &value {
            if fields.is_empty() || fields.iter().any(|f| f.is_empty()) {
                return Err(invalid("field list contains an empty name"));
            }
        }

        let sec = self.section_mut(section);
        if sec.contains_key(key) {
            return Err(invalid("key is already defined"));
        }
        sec.assertions.push(Assertion {
            key: key.to_string(),
            value,
        });
        Ok(())
    }

    /// Get or create a section, keeping first-seen order.
    pub(crate) fn section_mut(&mut self, name: &str) -> &mut Section {
        let idx = match self.sections.iter().position(|s| s.name == name) {
            Some(idx) => idx,
            None => {
                self.sections.push(Section::new(name));
                self.sections.len() - 1
            }
        };
        &mut self.sections[idx]
    }

    pub fn get(&self, section: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == section)
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn definition(&self, section: &str, key: &str) -> Option<&Definition> {
        self.get(section)?.get(key)
    }

    pub fn fields(&self, section: &str, key: &str) -> Option<&[String]> {
        self.definition(section, key)?.as_fields()
    }

    pub fn expression(&self, section: &str, key: &str) -> Option<&str> {
        self.definition(section, key)?.as_expression()
    }

    /// Number of fields a rule of `(sec, ptype)` must carry.
    pub fn arity(&self, sec: &str, ptype: &str) -> Result<usize, ValidationError> {
        rule_section(sec)
            .and_then(|short| self.fields(definition_section(short), ptype))
            .map(|fields| fields.len())
            .ok_or_else(|| ValidationError::UnknownPolicyType {
                sec: sec.to_string(),
                ptype: ptype.to_string(),
            })
    }

    /// Short rule section (`p` or `g`) that declares `ptype`, if any.
    pub fn section_of(&self, ptype: &str) -> Option<&'static str> {
        RULE_SECTIONS
            .into_iter()
            .find(|short| self.fields(definition_section(short), ptype).is_some())
    }

    /// Every `(sec, ptype)` pair rules can be stored under.
    pub fn rule_types(&self) -> Vec<(&'static str, &str)> {
        let mut out = Vec::new();
        for short in RULE_SECTIONS {
            if let Some(section) = self.get(definition_section(short)) {
                out.extend(section.keys().map(|k| (short, k)));
            }
        }
        out
    }

    pub fn validate_rule(
        &self,
        sec: &str,
        ptype: &str,
        rule: &[String],
    ) -> Result<(), ValidationError> {
        let expected = self.arity(sec, ptype)?;
        if rule.len() != expected {
            return Err(ValidationError::ArityMismatch {
                sec: sec.to_string(),
                ptype: ptype.to_string(),
                expected,
                actual: rule.len(),
            });
        }
        Ok(())
    }

    pub fn validate_filter(
        &self,
        sec: &str,
        ptype: &str,
        field_index: usize,
        len: usize,
    ) -> Result<(), ValidationError> {
        let arity = self.arity(sec, ptype)?;
        if field_index.checked_add(len).map_or(true, |end| end > arity) {
            return Err(ValidationError::FilterOutOfRange {
                sec: sec.to_string(),
                ptype: ptype.to_string(),
                field_index,
                len,
                arity,
            });
        }
        Ok(())
    }

    /// Render the model back into text that `parse_model` accepts.
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "[{}]", section.name)?;
            for assertion in &section.assertions {
                writeln!(f, "{} = {}", assertion.key, assertion.value)?;
            }
        }
        Ok(())
    }
}
