use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flate2::{write::GzEncoder, Compression};
use pyship_domain::{render_core_metadata, sdist_filename, PackageLayout, ProjectMetadata};
use serde_json::json;
use tar::{Builder, EntryType, Header};
use tracing::debug;
use walkdir::WalkDir;

use crate::UserError;

const PROJECT_FILES: [&str; 4] = ["pyproject.toml", "setup.py", "setup.cfg", "MANIFEST.in"];
const LICENSE_PREFIXES: [&str; 3] = ["LICENSE", "LICENCE", "COPYING"];

enum Member {
    File(PathBuf),
    Generated(Vec<u8>),
}

/// Writes `<dist_name>-<version>.tar.gz` into `out_dir`.
pub(crate) fn write_sdist(
    meta: &ProjectMetadata,
    layout: &PackageLayout,
    out_dir: &Path,
    mtime: u64,
) -> Result<PathBuf> {
    let members = collect_members(meta, layout)?;
    let version = meta.version_str();
    let base = format!("{}-{version}", meta.dist_name());
    let path = out_dir.join(sdist_filename(&meta.dist_name(), &version));

    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut tar = Builder::new(encoder);
    for (name, member) in &members {
        let data = match member {
            Member::File(source) => {
                fs::read(source).with_context(|| format!("reading {}", source.display()))?
            }
            Member::Generated(bytes) => bytes.clone(),
        };
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(mtime);
        let path_in_tgz = format!("{base}/{name}");
        debug!(member = %path_in_tgz, bytes = data.len(), "sdist member");
        tar.append_data(&mut header, &path_in_tgz, data.as_slice())
            .with_context(|| format!("appending {path_in_tgz}"))?;
    }
    tar.finish()?;
    let encoder = tar.into_inner()?;
    encoder
        .finish()
        .with_context(|| format!("finishing {}", path.display()))?;
    Ok(path)
}

fn collect_members(
    meta: &ProjectMetadata,
    layout: &PackageLayout,
) -> Result<BTreeMap<String, Member>> {
    let root = &meta.root;
    let mut members = BTreeMap::new();
    members.insert(
        "PKG-INFO".to_string(),
        Member::Generated(render_core_metadata(meta).into_bytes()),
    );

    for name in PROJECT_FILES {
        let path = root.join(name);
        if path.is_file() {
            members.insert(name.to_string(), Member::File(path));
        }
    }
    if let Some(readme) = meta.readme.as_ref().and_then(|readme| readme.path.as_ref()) {
        members.insert(posix(readme), Member::File(root.join(readme)));
    }
    for entry in fs::read_dir(root).with_context(|| format!("reading dir {}", root.display()))? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if path.is_file() && LICENSE_PREFIXES.iter().any(|prefix| name.starts_with(prefix)) {
            members.insert(name.to_string(), Member::File(path.clone()));
        }
    }
    for file in layout.files()? {
        members.insert(file.project_path, Member::File(file.source));
    }
    for include in &meta.options.sdist_include {
        add_include(root, include, &mut members)?;
    }
    Ok(members)
}

fn add_include(root: &Path, include: &str, members: &mut BTreeMap<String, Member>) -> Result<()> {
    let path = root.join(include);
    if path.is_file() {
        members.insert(posix(Path::new(include)), Member::File(path));
        return Ok(());
    }
    if !path.is_dir() {
        return Err(UserError::new(
            format!("sdist-include entry `{include}` does not exist"),
            json!({
                "reason": "missing_sdist_include",
                "path": include,
                "hint": "Fix or remove the entry in [tool.pyship].sdist-include.",
            }),
        )
        .into());
    }
    let walker = WalkDir::new(&path)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.file_name() != "__pycache__");
    for entry in walker {
        let entry = entry.with_context(|| format!("walking {}", path.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|ext| ext.to_str()) == Some("pyc") {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .with_context(|| format!("{} is outside the project", entry.path().display()))?;
        members.insert(posix(relative), Member::File(entry.path().to_path_buf()));
    }
    Ok(())
}

fn posix(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;
    use pyship_domain::discover_packages;
    use tar::Archive;

    use super::*;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn fixture(root: &Path) -> ProjectMetadata {
        write(
            &root.join("pyproject.toml"),
            "[project]\nname = \"pycebes\"\nversion = \"2.0\"\n\n[tool.pyship]\nuniversal = true\nsdist-include = [\"examples\"]\n",
        );
        write(&root.join("README.rst"), "pycebes\n");
        write(&root.join("LICENSE"), "Apache\n");
        write(&root.join("pycebes/__init__.py"), "__version__ = '2.0'\n");
        write(&root.join("pycebes/core/__init__.py"), "");
        write(&root.join("pycebes/core/__pycache__/x.cpython-311.pyc"), "");
        write(&root.join("tests/__init__.py"), "");
        write(&root.join("examples/demo.py"), "print('hi')\n");
        ProjectMetadata::load(root).unwrap()
    }

    fn member_names(path: &Path) -> Vec<(String, u64)> {
        let file = File::open(path).unwrap();
        let mut archive = Archive::new(GzDecoder::new(file));
        archive
            .entries()
            .unwrap()
            .map(|entry| {
                let entry = entry.unwrap();
                let mtime = entry.header().mtime().unwrap();
                (entry.path().unwrap().display().to_string(), mtime)
            })
            .collect()
    }

    #[test]
    fn sdist_contains_metadata_and_packages_under_prefix() {
        let temp = tempfile::tempdir().unwrap();
        let meta = fixture(temp.path());
        let layout = discover_packages(temp.path(), &meta.options).unwrap();
        let out = temp.path().join("dist");
        fs::create_dir_all(&out).unwrap();

        let path = write_sdist(&meta, &layout, &out, 1_700_000_000).unwrap();
        assert_eq!(path, out.join("pycebes-2.0.tar.gz"));

        let members = member_names(&path);
        let names: Vec<_> = members.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "pycebes-2.0/LICENSE",
                "pycebes-2.0/PKG-INFO",
                "pycebes-2.0/README.rst",
                "pycebes-2.0/examples/demo.py",
                "pycebes-2.0/pycebes/__init__.py",
                "pycebes-2.0/pycebes/core/__init__.py",
                "pycebes-2.0/pyproject.toml",
            ]
        );
        assert!(members.iter().all(|(_, mtime)| *mtime == 1_700_000_000));
    }

    #[test]
    fn pkg_info_matches_core_metadata() {
        let temp = tempfile::tempdir().unwrap();
        let meta = fixture(temp.path());
        let layout = discover_packages(temp.path(), &meta.options).unwrap();
        let path = write_sdist(&meta, &layout, temp.path(), 0).unwrap();

        let mut archive = Archive::new(GzDecoder::new(File::open(path).unwrap()));
        let mut pkg_info = String::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            if entry.path().unwrap().ends_with("PKG-INFO") {
                entry.read_to_string(&mut pkg_info).unwrap();
            }
        }
        assert_eq!(pkg_info, render_core_metadata(&meta));
        assert!(pkg_info.contains("Description-Content-Type: text/x-rst"));
    }

    #[test]
    fn missing_include_is_a_user_error() {
        let temp = tempfile::tempdir().unwrap();
        let mut meta = fixture(temp.path());
        meta.options.sdist_include = vec!["nope".into()];
        let layout = discover_packages(temp.path(), &meta.options).unwrap();
        let err = write_sdist(&meta, &layout, temp.path(), 0).expect_err("missing include");
        assert!(err.downcast_ref::<UserError>().is_some());
    }
}
