use anyhow::{bail, Result};
use tracing::debug;

/// Resolves the interpreter used to run project tooling.
///
/// An explicit path (from `PYSHIP_PYTHON`) wins; otherwise `python3` then
/// `python` are looked up on `PATH`.
pub(crate) fn detect_interpreter(explicit: Option<&str>) -> Result<String> {
    if let Some(explicit) = explicit {
        debug!(python = explicit, "using configured interpreter");
        return Ok(explicit.to_string());
    }

    for candidate in ["python3", "python"] {
        if let Ok(path) = which::which(candidate) {
            return path
                .into_os_string()
                .into_string()
                .map_err(|_| anyhow::anyhow!("non-utf8 path"));
        }
    }

    bail!("no python interpreter found; set PYSHIP_PYTHON");
}
