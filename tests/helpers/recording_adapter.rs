use std::sync::{Arc, Mutex};

use perihelion::{
    Adapter, AdapterError, Capabilities, Filter, MemoryAdapter, Model, Outcome, PolicySet,
};

/// Adapter call as seen by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Load,
    LoadFiltered,
    Save { rules: usize },
    Add(String, String, Vec<String>),
    Remove(String, String, Vec<String>),
    RemoveFiltered(String, String, usize, Vec<String>),
}

/// How the mock answers the optional operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Store the change and report `Applied`
    Apply,
    /// Report `Unsupported` and declare no capabilities
    Unsupported,
    /// Fail with a backend error while declaring full support
    Fail,
}

/// Mock backend that records every call and stores rules in a `MemoryAdapter`.
/// Clones share the call log and storage.
#[derive(Debug, Clone)]
pub struct RecordingAdapter {
    calls: Arc<Mutex<Vec<Call>>>,
    store: MemoryAdapter,
    behavior: Behavior,
    fail_load: bool,
    fail_save: bool,
}

impl RecordingAdapter {
    pub fn new(behavior: Behavior) -> Self {
        Self::seeded(behavior, PolicySet::new())
    }

    pub fn seeded(behavior: Behavior, rules: PolicySet) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            store: MemoryAdapter::with_rules(rules),
            behavior,
            fail_load: false,
            fail_save: false,
        }
    }

    pub fn failing_load(mut self) -> Self {
        self.fail_load = true;
        self
    }

    pub fn failing_save(mut self) -> Self {
        self.fail_save = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls to the optional single-rule operations only
    pub fn incremental_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| {
                matches!(
                    c,
                    Call::Add(..) | Call::Remove(..) | Call::RemoveFiltered(..)
                )
            })
            .collect()
    }

    pub fn stored(&self) -> PolicySet {
        self.store.snapshot().unwrap()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn answer(
        &mut self,
        apply: impl FnOnce(&mut MemoryAdapter) -> Result<Outcome, AdapterError>,
    ) -> Result<Outcome, AdapterError> {
        match self.behavior {
            Behavior::Apply => apply(&mut self.store),
            Behavior::Unsupported => Ok(Outcome::Unsupported),
            Behavior::Fail => Err(AdapterError::Backend("connection refused".into())),
        }
    }
}

impl Adapter for RecordingAdapter {
    fn load_policy(&mut self, model: &Model) -> Result<PolicySet, AdapterError> {
        self.record(Call::Load);
        if self.fail_load {
            return Err(AdapterError::Backend("load timed out".into()));
        }
        self.store.load_policy(model)
    }

    fn save_policy(&mut self, model: &Model, policies: &PolicySet) -> Result<(), AdapterError> {
        self.record(Call::Save {
            rules: policies.len(),
        });
        if self.fail_save {
            return Err(AdapterError::Backend("disk full".into()));
        }
        self.store.save_policy(model, policies)
    }

    fn capabilities(&self) -> Capabilities {
        match self.behavior {
            Behavior::Unsupported => Capabilities::NONE,
            Behavior::Apply | Behavior::Fail => Capabilities::ALL,
        }
    }

    fn add_policy(
        &mut self,
        sec: &str,
        ptype: &str,
        rule: &[String],
    ) -> Result<Outcome, AdapterError> {
        self.record(Call::Add(sec.into(), ptype.into(), rule.to_vec()));
        self.answer(|store| store.add_policy(sec, ptype, rule))
    }

    fn remove_policy(
        &mut self,
        sec: &str,
        ptype: &str,
        rule: &[String],
    ) -> Result<Outcome, AdapterError> {
        self.record(Call::Remove(sec.into(), ptype.into(), rule.to_vec()));
        self.answer(|store| store.remove_policy(sec, ptype, rule))
    }

    fn remove_filtered_policy(
        &mut self,
        sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: &[String],
    ) -> Result<Outcome, AdapterError> {
        self.record(Call::RemoveFiltered(
            sec.into(),
            ptype.into(),
            field_index,
            field_values.to_vec(),
        ));
        self.answer(|store| store.remove_filtered_policy(sec, ptype, field_index, field_values))
    }

    fn load_filtered_policy(
        &mut self,
        model: &Model,
        filter: &Filter,
    ) -> Result<Outcome<PolicySet>, AdapterError> {
        self.record(Call::LoadFiltered);
        match self.behavior {
            Behavior::Unsupported => Ok(Outcome::Unsupported),
            _ => self.store.load_filtered_policy(model, filter),
        }
    }
}
