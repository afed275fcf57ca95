use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use super::process::{run_command, run_command_passthrough, RunOutput};
use super::python::detect_interpreter;

pub trait PythonRuntime: Send + Sync {
    /// Locates an interpreter, preferring `explicit` when given.
    fn detect_interpreter(&self, explicit: Option<&str>) -> Result<String>;
    fn run_command(
        &self,
        python: &str,
        args: &[String],
        env: &[(String, String)],
        cwd: &Path,
    ) -> Result<RunOutput>;
    fn run_command_passthrough(
        &self,
        python: &str,
        args: &[String],
        env: &[(String, String)],
        cwd: &Path,
    ) -> Result<RunOutput>;
}

pub trait FileSystem: Send + Sync {
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn remove_file(&self, path: &Path) -> Result<()>;
    fn remove_dir_all(&self, path: &Path) -> Result<()>;
    fn is_dir(&self, path: &Path) -> bool;
    /// Entries of `path`, sorted by name.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

pub trait Effects: Send + Sync {
    fn python(&self) -> &dyn PythonRuntime;
    fn fs(&self) -> &dyn FileSystem;
}

pub struct SystemEffects {
    python: Arc<SystemPythonRuntime>,
    fs: Arc<SystemFileSystem>,
}

impl SystemEffects {
    #[must_use]
    pub fn new() -> Self {
        Self {
            python: Arc::new(SystemPythonRuntime),
            fs: Arc::new(SystemFileSystem),
        }
    }
}

impl Default for SystemEffects {
    fn default() -> Self {
        Self::new()
    }
}

impl Effects for SystemEffects {
    fn python(&self) -> &dyn PythonRuntime {
        self.python.as_ref()
    }

    fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }
}

struct SystemPythonRuntime;

impl PythonRuntime for SystemPythonRuntime {
    fn detect_interpreter(&self, explicit: Option<&str>) -> Result<String> {
        detect_interpreter(explicit)
    }

    fn run_command(
        &self,
        python: &str,
        args: &[String],
        env: &[(String, String)],
        cwd: &Path,
    ) -> Result<RunOutput> {
        run_command(python, args, env, cwd)
    }

    fn run_command_passthrough(
        &self,
        python: &str,
        args: &[String],
        env: &[(String, String)],
        cwd: &Path,
    ) -> Result<RunOutput> {
        run_command_passthrough(python, args, env, cwd)
    }
}

pub(crate) struct SystemFileSystem;

impl FileSystem for SystemFileSystem {
    fn create_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path).with_context(|| format!("creating {}", path.display()))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path).with_context(|| format!("removing file {}", path.display()))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::remove_dir_all(path).with_context(|| format!("removing dir {}", path.display()))
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in
            std::fs::read_dir(path).with_context(|| format!("reading dir {}", path.display()))?
        {
            let entry = entry.with_context(|| format!("reading dir {}", path.display()))?;
            entries.push(entry.path());
        }
        entries.sort();
        Ok(entries)
    }
}

pub type SharedEffects = Arc<dyn Effects>;
