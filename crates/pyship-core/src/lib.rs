#![deny(clippy::all)]

use std::path::Path;

mod config;
mod distribution;
mod errors;
mod net;
mod outcome;
mod pipeline;
mod runtime;
mod test_runner;

pub(crate) use config::context;
pub(crate) use runtime::{effects, process};

pub use config::context::{CommandContext, CommandGroup, CommandInfo};
pub use config::{Config, GlobalOptions};
pub use distribution::{
    build_project, clean_project, publish_project, BuildRequest, CleanRequest, PublishRequest,
};
pub use errors::{format_status_message, outcome_from_error, to_json_response};
pub use outcome::{CommandStatus, ExecutionOutcome, UserError};
pub use pipeline::{release, ReleaseRequest};
pub use runtime::effects::{SharedEffects, SystemEffects};
pub use test_runner::{test_project, TestRequest};

pub(crate) const PYSHIP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub(crate) fn relative_path_str(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
