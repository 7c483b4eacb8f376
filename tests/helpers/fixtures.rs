use std::path::PathBuf;

use perihelion::Model;

/// Path of a file under tests/fixtures
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn rbac_model() -> Model {
    Model::from_file(&fixture_path("rbac_model.conf")).expect("fixture model must parse")
}

pub fn rule(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}
