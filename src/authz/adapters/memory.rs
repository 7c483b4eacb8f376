use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::authz::adapter::{Adapter, Capabilities, Filter, Outcome};
use crate::authz::errors::AdapterError;
use crate::authz::model::Model;
use crate::authz::rules::PolicySet;

/// In-process backend holding rules in a shared `PolicySet`.
///
/// Implements every optional operation. Clones share the same storage, so a
/// caller can keep a handle to inspect what the manager persisted. Nothing
/// survives the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryAdapter {
    stored: Arc<RwLock<PolicySet>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(policies: PolicySet) -> Self {
        Self {
            stored: Arc::new(RwLock::new(policies)),
        }
    }

    /// Copy of the currently stored rules.
    pub fn snapshot(&self) -> Result<PolicySet, AdapterError> {
        Ok(self.read()?.clone())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, PolicySet>, AdapterError> {
        self.stored
            .read()
            .map_err(|_| AdapterError::Backend("memory adapter lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, PolicySet>, AdapterError> {
        self.stored
            .write()
            .map_err(|_| AdapterError::Backend("memory adapter lock poisoned".into()))
    }

    fn load(&self, model: &Model, filter: Option<&Filter>) -> Result<PolicySet, AdapterError> {
        let stored = self.read()?;
        let mut policies = PolicySet::new();
        for (sec, ptype, rules) in stored.groups() {
            for rule in rules {
                model.validate_rule(sec, ptype, rule)?;
                if filter.map_or(true, |f| f.keeps(sec, rule)) {
                    policies.add(sec, ptype, rule.clone());
                }
            }
        }
        Ok(policies)
    }
}

impl Adapter for MemoryAdapter {
    fn load_policy(&mut self, model: &Model) -> Result<PolicySet, AdapterError> {
        self.load(model, None)
    }

    fn save_policy(&mut self, _model: &Model, policies: &PolicySet) -> Result<(), AdapterError> {
        *self.write()? = policies.clone();
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn add_policy(
        &mut self,
        sec: &str,
        ptype: &str,
        rule: &[String],
    ) -> Result<Outcome, AdapterError> {
        self.write()?.add(sec, ptype, rule.to_vec());
        Ok(Outcome::Applied(()))
    }

    fn remove_policy(
        &mut self,
        sec: &str,
        ptype: &str,
        rule: &[String],
    ) -> Result<Outcome, AdapterError> {
        self.write()?.remove(sec, ptype, rule);
        Ok(Outcome::Applied(()))
    }

    fn remove_filtered_policy(
        &mut self,
        sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: &[String],
    ) -> Result<Outcome, AdapterError> {
        self.write()?
            .remove_filtered(sec, ptype, field_index, field_values);
        Ok(Outcome::Applied(()))
    }

    fn load_filtered_policy(
        &mut self,
        model: &Model,
        filter: &Filter,
    ) -> Result<Outcome<PolicySet>, AdapterError> {
        self.load(model, Some(filter)).map(Outcome::Applied)
    }
}
