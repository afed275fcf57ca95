pub mod context;
pub mod settings;

pub(crate) use settings::EnvSnapshot;
pub use settings::{Config, DistConfig, GlobalOptions, NetworkConfig};
