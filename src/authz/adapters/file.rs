use std::path::{Path, PathBuf};

use crate::authz::adapter::{
    policy_from_text, policy_to_text, Adapter, Capabilities, Filter, Outcome,
};
use crate::authz::errors::AdapterError;
use crate::authz::model::Model;
use crate::authz::rules::PolicySet;

/// Line-oriented policy file (`p, alice, data1, read`).
///
/// Supports full load/save and filtered loading. Single-rule mutations are
/// left to the default `Unsupported` responses, so with this adapter the
/// manager only writes the file on `save_policy`.
#[derive(Debug, Clone)]
pub struct FileAdapter {
    path: PathBuf,
}

impl FileAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<String>, AdapterError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(AdapterError::PolicyFile {
                path: self.path.display().to_string(),
                source,
            }),
        }
    }

    fn load(&self, model: &Model, filter: Option<&Filter>) -> Result<PolicySet, AdapterError> {
        let Some(contents) = self.read()? else {
            tracing::debug!(path = %self.path.display(), "Policy file missing, starting empty");
            return Ok(PolicySet::new());
        };
        let policies = policy_from_text(model, &contents, filter)?;
        tracing::info!(
            path = %self.path.display(),
            rules = policies.len(),
            filtered = filter.is_some(),
            "Read policy file"
        );
        Ok(policies)
    }
}

impl Adapter for FileAdapter {
    fn load_policy(&mut self, model: &Model) -> Result<PolicySet, AdapterError> {
        self.load(model, None)
    }

    fn save_policy(&mut self, _model: &Model, policies: &PolicySet) -> Result<(), AdapterError> {
        let text = policy_to_text(policies)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, text).map_err(|source| {
            AdapterError::PolicyFile {
                path: self.path.display().to_string(),
                source,
            }
        })?;
        tracing::info!(
            path = %self.path.display(),
            rules = policies.len(),
            "Wrote policy file"
        );
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            filtered_load: true,
            ..Capabilities::NONE
        }
    }

    fn load_filtered_policy(
        &mut self,
        model: &Model,
        filter: &Filter,
    ) -> Result<Outcome<PolicySet>, AdapterError> {
        self.load(model, Some(filter)).map(Outcome::Applied)
    }
}
