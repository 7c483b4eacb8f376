pub mod fixtures;
pub mod logging;
pub mod recording_adapter;

pub use fixtures::{fixture_path, rbac_model, rule};
pub use logging::init_test_logging;
pub use recording_adapter::{Behavior, Call, RecordingAdapter};
