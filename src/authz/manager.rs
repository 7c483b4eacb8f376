use std::fmt;
use std::path::Path;

use crate::authz::adapter::{Adapter, Filter, Outcome};
use crate::authz::adapters::FileAdapter;
use crate::authz::errors::{AdapterError, AuthzError, ValidationError};
use crate::authz::model::{rule_section, Model};
use crate::authz::rules::{PolicySet, Rule};
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// No model or adapter yet.
    Unbound,
    /// Model and adapter bound, policy not loaded.
    ModelLoaded,
    /// Policy loaded from the adapter at least once.
    Ready,
}

/// Owns the bound model and the in-memory rule set, and keeps them loosely
/// in sync with an `Adapter`.
///
/// Not thread-safe: callers sharing a manager must provide their own mutual
/// exclusion. Every adapter call blocks until the backend answers and is
/// attempted exactly once.
///
/// Incremental mutations are applied in memory first. When auto-save is on
/// they are then mirrored to the adapter; an `Unsupported` answer is
/// ignored, while a backend error is returned *without* rolling back the
/// in-memory change. After such an error memory and storage may disagree
/// until the caller runs `load_policy` or `save_policy`.
pub struct PolicyManager {
    model: Model,
    policies: PolicySet,
    adapter: Option<Box<dyn Adapter>>,
    auto_save: bool,
    /// Set once the caller picks auto-save explicitly.
    auto_save_pinned: bool,
    lifecycle: Lifecycle,
    filtered: bool,
}

impl Default for PolicyManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PolicyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyManager")
            .field("lifecycle", &self.lifecycle)
            .field("sections", &self.model.sections().len())
            .field("rules", &self.policies.len())
            .field("adapter_bound", &self.adapter.is_some())
            .field("auto_save", &self.auto_save)
            .field("filtered", &self.filtered)
            .finish()
    }
}

impl PolicyManager {
    /// An unbound manager with an empty model and no rules.
    pub fn new() -> Self {
        Self {
            model: Model::new(),
            policies: PolicySet::new(),
            adapter: None,
            auto_save: false,
            auto_save_pinned: false,
            lifecycle: Lifecycle::Unbound,
            filtered: false,
        }
    }

    pub fn with_adapter(model: Model, adapter: impl Adapter + 'static) -> Self {
        let mut manager = Self::new();
        manager.bind(model, adapter);
        manager
    }

    /// Parse the configured model file, bind a `FileAdapter` on the policy
    /// path and load the policy.
    pub fn from_settings(settings: &Settings) -> Result<Self, AuthzError> {
        let model = Model::from_file(&settings.model.path)?;
        let mut manager = Self::with_adapter(model, FileAdapter::new(&settings.policy.path));
        if let Some(flag) = settings.policy.auto_save {
            manager.enable_auto_save(flag);
        }
        manager.load_policy()?;
        Ok(manager)
    }

    /// Bind a model and adapter, discarding any rules held so far.
    ///
    /// Auto-save defaults to on when the adapter declares any incremental
    /// capability. An explicit `enable_auto_save` choice is forgotten.
    pub fn bind(&mut self, model: Model, adapter: impl Adapter + 'static) {
        self.auto_save = adapter.capabilities().incremental();
        self.auto_save_pinned = false;
        self.model = model;
        self.policies = PolicySet::new();
        self.adapter = Some(Box::new(adapter));
        self.lifecycle = Lifecycle::ModelLoaded;
        self.filtered = false;
        tracing::debug!(auto_save = self.auto_save, "Bound model and adapter");
    }

    /// Swap the storage backend, keeping the model and in-memory rules.
    ///
    /// Auto-save follows the new adapter's capabilities unless it was set
    /// with `enable_auto_save`, in which case that choice is kept.
    pub fn set_adapter(&mut self, adapter: impl Adapter + 'static) -> Result<(), AuthzError> {
        self.ensure_bound()?;
        if !self.auto_save_pinned {
            self.auto_save = adapter.capabilities().incremental();
        }
        self.adapter = Some(Box::new(adapter));
        Ok(())
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn policies(&self) -> &PolicySet {
        &self.policies
    }

    pub fn auto_save(&self) -> bool {
        self.auto_save
    }

    /// True after `load_filtered_policy` until the next full load.
    pub fn is_filtered(&self) -> bool {
        self.filtered
    }

    /// Takes effect on the next mutation; nothing already diverged is synced.
    pub fn enable_auto_save(&mut self, auto_save: bool) {
        self.auto_save = auto_save;
        self.auto_save_pinned = true;
    }

    /// Replace the model. Loaded rules are left alone even if they no longer
    /// fit; re-run `load_policy` to bring them in line.
    pub fn load_model(&mut self, model: Model) {
        let stale = self
            .policies
            .groups()
            .filter(|(sec, ptype, rules)| {
                rules
                    .iter()
                    .any(|r| model.validate_rule(sec, ptype, r).is_err())
            })
            .count();
        if stale > 0 {
            tracing::warn!(
                groups = stale,
                "Loaded rules do not match the new model until load_policy() runs"
            );
        }
        self.model = model;
    }

    pub fn load_model_from_text(&mut self, text: &str) -> Result<(), AuthzError> {
        let model = Model::from_text(text)?;
        self.load_model(model);
        Ok(())
    }

    pub fn load_model_from_file(&mut self, path: &Path) -> Result<(), AuthzError> {
        let model = Model::from_file(path)?;
        self.load_model(model);
        Ok(())
    }

    /// Replace every in-memory rule with what the adapter holds. On error
    /// the current rules and lifecycle are kept.
    pub fn load_policy(&mut self) -> Result<(), AuthzError> {
        let adapter = self.adapter.as_mut().ok_or(AuthzError::NotBound)?;
        let policies = adapter.load_policy(&self.model)?;

        tracing::info!(
            rules = policies.len(),
            groups = policies.group_count(),
            "Loaded policy rules"
        );
        self.policies = policies;
        self.filtered = false;
        self.lifecycle = Lifecycle::Ready;
        Ok(())
    }

    /// Load only the rules passing `filter`. A filtered manager refuses
    /// `save_policy` since that would erase every rule outside the filter.
    pub fn load_filtered_policy(&mut self, filter: &Filter) -> Result<(), AuthzError> {
        let adapter = self.adapter.as_mut().ok_or(AuthzError::NotBound)?;
        let Outcome::Applied(policies) = adapter.load_filtered_policy(&self.model, filter)? else {
            return Err(AuthzError::FilteringUnsupported);
        };

        tracing::info!(
            rules = policies.len(),
            groups = policies.group_count(),
            "Loaded filtered policy rules"
        );
        self.policies = policies;
        self.filtered = true;
        self.lifecycle = Lifecycle::Ready;
        Ok(())
    }

    /// Overwrite the adapter's contents with the in-memory rules.
    pub fn save_policy(&mut self) -> Result<(), AuthzError> {
        if self.filtered {
            return Err(AuthzError::FilteredSave);
        }
        let adapter = self.adapter.as_mut().ok_or(AuthzError::NotBound)?;
        adapter.save_policy(&self.model, &self.policies)?;
        tracing::info!(rules = self.policies.len(), "Saved policy rules");
        Ok(())
    }

    /// Append a rule. Duplicates are allowed.
    pub fn add_policy<I, S>(&mut self, sec: &str, ptype: &str, rule: I) -> Result<(), AuthzError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ensure_bound()?;
        let rule = to_rule(rule);
        let sec = self.check_rule(sec, ptype, &rule)?;

        self.policies.add(sec, ptype, rule.clone());
        if self.auto_save {
            self.propagate("add_policy", |a| a.add_policy(sec, ptype, &rule))?;
        }
        Ok(())
    }

    /// Remove the first matching rule. Returns `false` (and leaves the
    /// adapter alone) when no rule matched.
    pub fn remove_policy<I, S>(
        &mut self,
        sec: &str,
        ptype: &str,
        rule: I,
    ) -> Result<bool, AuthzError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ensure_bound()?;
        let rule = to_rule(rule);
        let sec = self.check_rule(sec, ptype, &rule)?;

        if !self.policies.remove(sec, ptype, &rule) {
            return Ok(false);
        }
        if self.auto_save {
            self.propagate("remove_policy", |a| a.remove_policy(sec, ptype, &rule))?;
        }
        Ok(true)
    }

    /// Remove every rule whose fields starting at `field_index` match
    /// `field_values` (empty value = wildcard). Returns how many were removed
    /// from memory; an empty `field_values` matches the whole group.
    ///
    /// With auto-save on the adapter is called even when memory held no
    /// match; after a filtered load storage can hold rules memory does not.
    pub fn remove_filtered_policy<I, S>(
        &mut self,
        sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: I,
    ) -> Result<usize, AuthzError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ensure_bound()?;
        let values = to_rule(field_values);
        let short = rule_sec(sec, ptype)?;
        self.model
            .validate_filter(short, ptype, field_index, values.len())?;

        let removed = self
            .policies
            .remove_filtered(short, ptype, field_index, &values)
            .len();
        if self.auto_save {
            self.propagate("remove_filtered_policy", |a| {
                a.remove_filtered_policy(short, ptype, field_index, &values)
            })?;
        }
        Ok(removed)
    }

    /// Drop every in-memory rule. Storage is untouched.
    pub fn clear_policy(&mut self) {
        self.policies.clear();
    }

    pub fn has_policy<I, S>(&self, sec: &str, ptype: &str, rule: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rule = to_rule(rule);
        rule_section(sec).is_some_and(|sec| self.policies.has(sec, ptype, &rule))
    }

    pub fn get_rules(&self, sec: &str, ptype: &str) -> &[Rule] {
        match rule_section(sec) {
            Some(sec) => self.policies.get(sec, ptype),
            None => &[],
        }
    }

    /// Rules of the default policy type `p`.
    pub fn get_policy(&self) -> &[Rule] {
        self.policies.get("p", "p")
    }

    /// Rules of the default role type `g`.
    pub fn get_grouping_policy(&self) -> &[Rule] {
        self.policies.get("g", "g")
    }

    pub fn get_filtered_policy<I, S>(
        &self,
        sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: I,
    ) -> Vec<Rule>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = to_rule(field_values);
        match rule_section(sec) {
            Some(sec) => self
                .policies
                .get_filtered(sec, ptype, field_index, &values),
            None => Vec::new(),
        }
    }

    fn ensure_bound(&self) -> Result<(), AuthzError> {
        if self.lifecycle == Lifecycle::Unbound {
            return Err(AuthzError::NotBound);
        }
        Ok(())
    }

    fn check_rule(
        &self,
        sec: &str,
        ptype: &str,
        rule: &[String],
    ) -> Result<&'static str, ValidationError> {
        let short = rule_sec(sec, ptype)?;
        self.model.validate_rule(short, ptype, rule)?;
        Ok(short)
    }

    /// Mirror an applied in-memory change to the adapter.
    fn propagate<F>(&mut self, op: &'static str, call: F) -> Result<(), AuthzError>
    where
        F: FnOnce(&mut dyn Adapter) -> Result<Outcome, AdapterError>,
    {
        let Some(adapter) = self.adapter.as_deref_mut() else {
            return Ok(());
        };
        match call(adapter) {
            Ok(Outcome::Applied(())) => {
                tracing::debug!(op, "Propagated change to adapter");
                Ok(())
            }
            Ok(Outcome::Unsupported) => {
                tracing::debug!(op, "Adapter does not support operation, kept in memory only");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    op,
                    error = %e,
                    "Adapter rejected change already applied in memory"
                );
                Err(e.into())
            }
        }
    }
}

fn rule_sec(sec: &str, ptype: &str) -> Result<&'static str, ValidationError> {
    rule_section(sec).ok_or_else(|| ValidationError::UnknownPolicyType {
        sec: sec.to_string(),
        ptype: ptype.to_string(),
    })
}

fn to_rule<I, S>(fields: I) -> Rule
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    fields.into_iter().map(Into::into).collect()
}
