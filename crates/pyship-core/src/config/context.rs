use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use pyship_domain::{discover_project_root, PYPROJECT_FILE};
use serde_json::json;

use crate::config::{Config, EnvSnapshot, GlobalOptions};
use crate::effects::{self, Effects, SharedEffects};
use crate::UserError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandGroup {
    Release,
    Clean,
    Build,
    Publish,
    Test,
}

impl fmt::Display for CommandGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandGroup::Release => "release",
            CommandGroup::Clean => "clean",
            CommandGroup::Build => "build",
            CommandGroup::Publish => "publish",
            CommandGroup::Test => "test",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CommandInfo {
    pub group: CommandGroup,
    pub name: &'static str,
}

impl CommandInfo {
    #[must_use]
    pub const fn new(group: CommandGroup, name: &'static str) -> Self {
        Self { group, name }
    }
}

pub struct CommandContext<'a> {
    pub global: &'a GlobalOptions,
    env: EnvSnapshot,
    config: Config,
    project_root: OnceLock<PathBuf>,
    effects: SharedEffects,
}

impl<'a> CommandContext<'a> {
    /// Creates a new command context with the provided global options.
    ///
    /// # Errors
    /// Returns an error if the environment holds unusable `PYSHIP_*` values.
    pub fn new(global: &'a GlobalOptions, effects: SharedEffects) -> Result<Self> {
        Self::with_env(global, effects, EnvSnapshot::capture())
    }

    pub(crate) fn with_env(
        global: &'a GlobalOptions,
        effects: SharedEffects,
        env: EnvSnapshot,
    ) -> Result<Self> {
        let config = Config::from_snapshot(&env)?;
        Ok(Self {
            global,
            env,
            config,
            project_root: OnceLock::new(),
            effects,
        })
    }

    pub fn effects(&self) -> &dyn Effects {
        self.effects.as_ref()
    }

    pub fn fs(&self) -> &dyn effects::FileSystem {
        self.effects.fs()
    }

    pub fn python_runtime(&self) -> &dyn effects::PythonRuntime {
        self.effects.python()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolves the project root from `--project` or by walking up from the
    /// working directory.
    ///
    /// # Errors
    /// Returns a [`UserError`] when no `pyproject.toml` can be found.
    pub fn project_root(&self) -> Result<PathBuf> {
        if let Some(path) = self.project_root.get() {
            return Ok(path.clone());
        }
        let start = self.search_start()?;
        let path = self
            .find_project_root(&start)
            .ok_or_else(|| missing_project_error(&start))?;
        let _ = self.project_root.set(path.clone());
        Ok(path)
    }

    /// Project root when one exists, otherwise the directory the search
    /// started from (`--project` or the working directory).
    pub(crate) fn project_root_or_start(&self) -> Result<PathBuf> {
        if let Some(path) = self.project_root.get() {
            return Ok(path.clone());
        }
        let start = self.search_start()?;
        Ok(self.find_project_root(&start).unwrap_or(start))
    }

    fn search_start(&self) -> Result<PathBuf> {
        let cwd = std::env::current_dir().context("reading current directory")?;
        Ok(match self.global.project.as_ref() {
            Some(explicit) if explicit.is_absolute() => explicit.clone(),
            Some(explicit) => cwd.join(explicit),
            None => cwd,
        })
    }

    fn find_project_root(&self, start: &Path) -> Option<PathBuf> {
        if self.global.project.is_some() {
            start
                .join(PYPROJECT_FILE)
                .is_file()
                .then(|| start.to_path_buf())
        } else {
            discover_project_root(start)
        }
    }

    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env.value(key)
    }

    pub fn env_contains(&self, key: &str) -> bool {
        self.env.contains(key)
    }
}

fn missing_project_error(searched: &Path) -> UserError {
    UserError::new(
        format!("no {PYPROJECT_FILE} found in {} or its parents", searched.display()),
        json!({
            "reason": "missing_project",
            "searched": searched.display().to_string(),
            "hint": "Run pyship from the project directory or pass --project DIR.",
        }),
    )
}
