use std::collections::BTreeMap;

/// One policy rule: positional string fields.
pub type Rule = Vec<String>;

/// In-memory rule groups keyed by `(sec, ptype)`.
///
/// Insertion order is preserved inside a group and duplicates are allowed.
/// Groups iterate in `(sec, ptype)` order so full saves are deterministic.
/// Arity is not checked here; the caller validates against the model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySet {
    groups: BTreeMap<(String, String), Vec<Rule>>,
}

impl PolicySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sec: &str, ptype: &str, rule: Rule) {
        self.groups
            .entry((sec.to_string(), ptype.to_string()))
            .or_default()
            .push(rule);
    }

    /// Remove the first rule equal to `rule`. Returns whether one was removed.
    pub fn remove(&mut self, sec: &str, ptype: &str, rule: &[String]) -> bool {
        let key = (sec.to_string(), ptype.to_string());
        let Some(rules) = self.groups.get_mut(&key) else {
            return false;
        };
        let Some(pos) = rules.iter().position(|r| r.as_slice() == rule) else {
            return false;
        };
        rules.remove(pos);
        if rules.is_empty() {
            self.groups.remove(&key);
        }
        true
    }

    /// Remove every rule matching the positional filter, returning them in order.
    pub fn remove_filtered(
        &mut self,
        sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: &[String],
    ) -> Vec<Rule> {
        let key = (sec.to_string(), ptype.to_string());
        let Some(rules) = self.groups.get_mut(&key) else {
            return Vec::new();
        };

        let mut removed = Vec::new();
        rules.retain(|r| {
            if matches_filter(r, field_index, field_values) {
                removed.push(r.clone());
                false
            } else {
                true
            }
        });
        if rules.is_empty() {
            self.groups.remove(&key);
        }
        removed
    }

    pub fn has(&self, sec: &str, ptype: &str, rule: &[String]) -> bool {
        self.get(sec, ptype).iter().any(|r| r.as_slice() == rule)
    }

    pub fn get(&self, sec: &str, ptype: &str) -> &[Rule] {
        self.groups
            .get(&(sec.to_string(), ptype.to_string()))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn get_filtered(
        &self,
        sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: &[String],
    ) -> Vec<Rule> {
        self.get(sec, ptype)
            .iter()
            .filter(|r| matches_filter(r, field_index, field_values))
            .cloned()
            .collect()
    }

    /// Iterate `(sec, ptype, rules)` for every non-empty group.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &str, &[Rule])> {
        self.groups
            .iter()
            .map(|((sec, ptype), rules)| (sec.as_str(), ptype.as_str(), rules.as_slice()))
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Total number of rules across all groups.
    pub fn len(&self) -> usize {
        self.groups.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }
}

/// Positional filter: the rule's field at `field_index + i` must equal
/// `field_values[i]`. An empty value is a wildcard for its position; a
/// non-empty value past the end of the rule never matches.
pub fn matches_filter(rule: &[String], field_index: usize, field_values: &[String]) -> bool {
    field_values.iter().enumerate().all(|(i, want)| {
        if want.is_empty() {
            return true;
        }
        field_index
            .checked_add(i)
            .and_then(|j| rule.get(j))
            .is_some_and(|have| have == want)
    })
}
