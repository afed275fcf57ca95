//! Clean, build, and publish workflows for Python distributions.

mod artifacts;
pub(crate) mod build;
pub(crate) mod clean;
pub(crate) mod credentials;
pub(crate) mod plan;
pub(crate) mod publish;
mod sdist;
mod wheel;

pub use build::build_project;
pub use clean::{clean_project, CleanRequest};
pub use plan::{BuildRequest, PublishRequest};
pub use publish::publish_project;
