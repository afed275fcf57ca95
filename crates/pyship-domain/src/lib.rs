#![deny(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod filename;
pub mod metadata;
pub mod packages;
pub mod project;

pub use filename::{sdist_filename, wheel_filename, ArtifactKind, WheelTag};
pub use metadata::{
    render_core_metadata, Author, MetadataError, ProjectMetadata, Readme, ShipOptions,
    TestOptions, DEFAULT_DIST_DIR,
};
pub use packages::{discover_packages, PackageFile, PackageLayout, PythonPackage};
pub use project::{discover_project_root, read_pyproject, PYPROJECT_FILE};
