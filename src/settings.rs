use miette::{IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    pub model: ModelSource,
    pub policy: PolicySource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSource {
    /// Model text file, e.g. rbac_model.conf
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySource {
    /// Line-oriented policy file read and written by the file adapter
    pub path: PathBuf,
    /// Overrides the adapter-derived auto-save default when set
    #[serde(default)]
    pub auto_save: Option<bool>,
}

impl Default for ModelSource {
    fn default() -> Self {
        Self {
            path: PathBuf::from("model.conf"),
        }
    }
}

impl Default for PolicySource {
    fn default() -> Self {
        Self {
            path: PathBuf::from("policy.csv"),
            auto_save: None,
        }
    }
}

impl Settings {
    pub fn load(path: &str) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default(
                "model.path",
                ModelSource::default().path.to_string_lossy().to_string(),
            )
            .into_diagnostic()?
            .set_default(
                "policy.path",
                PolicySource::default().path.to_string_lossy().to_string(),
            )
            .into_diagnostic()?;

        // Optional file
        if Path::new(path).exists() {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment overrides: PERIHELION__POLICY__AUTO_SAVE=false, etc.
        builder =
            builder.add_source(config::Environment::with_prefix("PERIHELION").separator("__"));

        let cfg = builder.build().into_diagnostic()?;
        let mut s: Settings = cfg.try_deserialize().into_diagnostic()?;

        if s.model.path.is_relative() {
            s.model.path = std::env::current_dir().into_diagnostic()?.join(&s.model.path);
        }
        if s.policy.path.is_relative() {
            s.policy.path = std::env::current_dir()
                .into_diagnostic()?
                .join(&s.policy.path);
        }

        Ok(s)
    }
}
