use std::fmt;

/// Compatibility tag of a pure-Python wheel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WheelTag {
    pub python: Vec<String>,
    pub abi: String,
    pub platform: String,
}

impl WheelTag {
    /// `py2.py3-none-any`, installable on both major Python lines.
    pub fn universal() -> Self {
        Self::pure(&["py2", "py3"])
    }

    pub fn py3() -> Self {
        Self::pure(&["py3"])
    }

    fn pure(python: &[&str]) -> Self {
        Self {
            python: python.iter().map(ToString::to_string).collect(),
            abi: "none".to_string(),
            platform: "any".to_string(),
        }
    }

    pub fn python_tag(&self) -> String {
        self.python.join(".")
    }

    /// Expanded `Tag:` entries for the WHEEL file.
    pub fn expanded(&self) -> Vec<String> {
        self.python
            .iter()
            .map(|py| format!("{py}-{}-{}", self.abi, self.platform))
            .collect()
    }
}

impl fmt::Display for WheelTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.python_tag(), self.abi, self.platform)
    }
}

pub fn sdist_filename(dist_name: &str, version: &str) -> String {
    format!("{dist_name}-{version}.tar.gz")
}

pub fn wheel_filename(dist_name: &str, version: &str, tag: &WheelTag) -> String {
    format!("{dist_name}-{version}-{tag}.whl")
}

/// What an artifact in the dist directory is, judged by its filename.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArtifactKind {
    Sdist,
    Wheel {
        pyversion: String,
        abi: String,
        platform: String,
    },
}

impl ArtifactKind {
    pub fn classify(filename: &str) -> Option<Self> {
        if let Some(stem) = filename.strip_suffix(".whl") {
            let mut parts = stem.rsplitn(4, '-');
            let platform = parts.next()?;
            let abi = parts.next()?;
            let pyversion = parts.next()?;
            let prefix = parts.next()?;
            if prefix.is_empty() || platform.is_empty() || abi.is_empty() || pyversion.is_empty()
            {
                return None;
            }
            return Some(ArtifactKind::Wheel {
                pyversion: pyversion.to_string(),
                abi: abi.to_string(),
                platform: platform.to_string(),
            });
        }
        if filename.ends_with(".tar.gz") || filename.ends_with(".zip") {
            return Some(ArtifactKind::Sdist);
        }
        None
    }

    /// `filetype` form field expected by the legacy upload API.
    pub fn filetype(&self) -> &'static str {
        match self {
            ArtifactKind::Sdist => "sdist",
            ArtifactKind::Wheel { .. } => "bdist_wheel",
        }
    }

    pub fn pyversion(&self) -> &str {
        match self {
            ArtifactKind::Sdist => "source",
            ArtifactKind::Wheel { pyversion, .. } => pyversion,
        }
    }
}
