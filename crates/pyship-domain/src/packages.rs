use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;
use walkdir::WalkDir;

use crate::metadata::{MetadataError, ShipOptions};

const INIT_FILE: &str = "__init__.py";
const NEVER_PACKAGES: [&str; 4] = ["dist", "build", "__pycache__", "node_modules"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PythonPackage {
    /// Dotted import name, e.g. `pycebes.core`.
    pub name: String,
    pub path: PathBuf,
}

/// A file shipped inside a package, with its location in both archive kinds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageFile {
    pub source: PathBuf,
    /// Path relative to the import root (wheel member name).
    pub archive_path: String,
    /// Path relative to the project root (sdist member name).
    pub project_path: String,
}

#[derive(Clone, Debug)]
pub struct PackageLayout {
    pub root: PathBuf,
    /// Directory packages are imported from: `src/` or the project root.
    pub base: PathBuf,
    pub packages: Vec<PythonPackage>,
}

impl PackageLayout {
    pub fn top_level(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .packages
            .iter()
            .map(|pkg| pkg.name.split('.').next().unwrap_or(&pkg.name).to_string())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Every shippable file of every package, sorted by archive path.
    ///
    /// Non-package subdirectories are treated as package data; subpackages are
    /// only included when discovery kept them.
    pub fn files(&self) -> Result<Vec<PackageFile>> {
        let mut files = BTreeMap::new();
        for package in &self.packages {
            let walker = WalkDir::new(&package.path)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| {
                    if entry.depth() == 0 || !entry.file_type().is_dir() {
                        return true;
                    }
                    !is_ignored_dir(entry.path()) && !entry.path().join(INIT_FILE).is_file()
                });
            for entry in walker {
                let entry = entry
                    .with_context(|| format!("walking package {}", package.path.display()))?;
                if !entry.file_type().is_file() || is_compiled(entry.path()) {
                    continue;
                }
                let source = entry.path().to_path_buf();
                let archive_path = relative_posix(&source, &self.base)?;
                let project_path = relative_posix(&source, &self.root)?;
                files.insert(
                    archive_path.clone(),
                    PackageFile {
                        source,
                        archive_path,
                        project_path,
                    },
                );
            }
        }
        Ok(files.into_values().collect())
    }
}

/// Finds the importable packages of the project.
///
/// Explicit `[tool.pyship].packages` entries must exist; otherwise every
/// directory with an `__init__.py` reachable through other packages is kept
/// unless its dotted name matches an `exclude` pattern.
pub fn discover_packages(
    root: &Path,
    options: &ShipOptions,
) -> Result<PackageLayout, MetadataError> {
    let src = root.join("src");
    let base = if src.is_dir() { src } else { root.to_path_buf() };

    let mut found = Vec::new();
    match options.packages.as_ref() {
        Some(explicit) => {
            for name in explicit {
                let path = base.join(name.replace('.', "/"));
                if !path.join(INIT_FILE).is_file() {
                    return Err(MetadataError::MissingPackage {
                        name: name.clone(),
                        path,
                    });
                }
                found.push(PythonPackage {
                    name: name.clone(),
                    path: path.clone(),
                });
                collect_packages(&path, name, &options.exclude, &mut found);
            }
        }
        None => collect_packages(&base, "", &options.exclude, &mut found),
    }

    found.sort_by(|a, b| a.name.cmp(&b.name));
    found.dedup_by(|a, b| a.name == b.name);
    if found.is_empty() {
        return Err(MetadataError::NoPackages { root: base });
    }
    debug!(
        base = %base.display(),
        packages = found.len(),
        "discovered python packages"
    );
    Ok(PackageLayout {
        root: root.to_path_buf(),
        base,
        packages: found,
    })
}

fn collect_packages(dir: &Path, prefix: &str, exclude: &[String], found: &mut Vec<PythonPackage>) {
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok);
    for entry in walker {
        let path = entry.path();
        if !entry.file_type().is_dir() || is_ignored_dir(path) {
            continue;
        }
        if !path.join(INIT_FILE).is_file() {
            continue;
        }
        let Some(segment) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if segment.contains('-') {
            debug!(path = %path.display(), "skipping non-importable directory");
            continue;
        }
        let name = if prefix.is_empty() {
            segment.to_string()
        } else {
            format!("{prefix}.{segment}")
        };
        if !exclude.iter().any(|pattern| wildcard_match(pattern, &name)) {
            found.push(PythonPackage {
                name: name.clone(),
                path: path.to_path_buf(),
            });
        }
        collect_packages(path, &name, exclude, found);
    }
}

fn is_ignored_dir(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return true;
    };
    name.starts_with('.')
        || NEVER_PACKAGES.contains(&name)
        || name.ends_with(".egg-info")
}

fn is_compiled(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("pyc" | "pyo")
    )
}

fn relative_posix(path: &Path, base: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(base)
        .with_context(|| format!("{} is outside {}", path.display(), base.display()))?;
    let parts: Vec<String> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

/// Shell-style match supporting `*` only, as used by package excludes.
fn wildcard_match(pattern: &str, candidate: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let candidate: Vec<char> = candidate.chars().collect();
    let (mut p, mut c) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while c < candidate.len() {
        if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, c));
            p += 1;
        } else if p < pattern.len() && pattern[p] == candidate[c] {
            p += 1;
            c += 1;
        } else if let Some((star_p, star_c)) = star {
            p = star_p + 1;
            c = star_c + 1;
            star = Some((star_p, star_c + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|ch| *ch == '*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, "").expect("write");
    }

    #[test]
    fn finds_nested_packages_and_skips_excluded() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        touch(&root.join("pycebes/__init__.py"));
        touch(&root.join("pycebes/core/__init__.py"));
        touch(&root.join("pycebes/core/dataframe.py"));
        touch(&root.join("tests/__init__.py"));
        touch(&root.join("tests/unit/__init__.py"));
        touch(&root.join("build/lib/__init__.py"));
        touch(&root.join(".venv/pkg/__init__.py"));
        touch(&root.join("scripts/run.py"));

        let layout = discover_packages(root, &ShipOptions::default()).expect("packages");
        let names: Vec<_> = layout.packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["pycebes", "pycebes.core"]);
        assert_eq!(layout.top_level(), vec!["pycebes".to_string()]);
    }

    #[test]
    fn src_layout_is_preferred() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        touch(&root.join("src/demo/__init__.py"));
        touch(&root.join("src/demo/data/table.json"));
        touch(&root.join("src/demo/__pycache__/x.cpython-311.pyc"));

        let layout = discover_packages(root, &ShipOptions::default()).expect("packages");
        assert_eq!(layout.base, root.join("src"));
        let files = layout.files().expect("files");
        let archive: Vec<_> = files.iter().map(|f| f.archive_path.as_str()).collect();
        assert_eq!(archive, vec!["demo/__init__.py", "demo/data/table.json"]);
        assert_eq!(files[0].project_path, "src/demo/__init__.py");
    }

    #[test]
    fn explicit_packages_must_exist() {
        let temp = tempfile::tempdir().expect("tempdir");
        let options = ShipOptions {
            packages: Some(vec!["missing".to_string()]),
            ..ShipOptions::default()
        };
        let err = discover_packages(temp.path(), &options).expect_err("missing");
        assert!(matches!(err, MetadataError::MissingPackage { .. }));
    }

    #[test]
    fn empty_project_has_no_packages() {
        let temp = tempfile::tempdir().expect("tempdir");
        touch(&temp.path().join("setup.py"));
        let err = discover_packages(temp.path(), &ShipOptions::default()).expect_err("none");
        assert!(matches!(err, MetadataError::NoPackages { .. }));
    }

    #[test]
    fn wildcard_patterns() {
        assert!(wildcard_match("tests", "tests"));
        assert!(!wildcard_match("tests", "tests.unit"));
        assert!(wildcard_match("tests.*", "tests.unit"));
        assert!(wildcard_match("*.internal", "pkg.internal"));
        assert!(!wildcard_match("docs.*", "docs"));
    }
}
