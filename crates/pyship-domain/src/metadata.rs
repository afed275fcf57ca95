use std::fs;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use pep440_rs::{Version, VersionSpecifiers};
use pep508_rs::Requirement as PepRequirement;
use toml_edit::{DocumentMut, Item, Table, TableLike, Value as TomlValue};

use crate::filename::WheelTag;
use crate::project::read_pyproject;

pub const DEFAULT_DIST_DIR: &str = "dist";

const DEFAULT_EXCLUDES: [&str; 4] = ["tests", "tests.*", "docs", "docs.*"];
const README_CANDIDATES: [&str; 3] = ["README.rst", "README.md", "README.txt"];

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("cannot read {}: {source}", .path.display())]
    Missing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not valid TOML: {reason}", .path.display())]
    Invalid { path: PathBuf, reason: String },
    #[error("pyproject missing [project] table")]
    MissingProjectTable,
    #[error("pyproject missing [project].{0}")]
    MissingField(&'static str),
    #[error("invalid project name `{0}`")]
    InvalidName(String),
    #[error("invalid version `{value}`: {reason}")]
    InvalidVersion { value: String, reason: String },
    #[error("invalid requires-python `{value}`: {reason}")]
    InvalidRequiresPython { value: String, reason: String },
    #[error("invalid dependency `{value}`: {reason}")]
    InvalidDependency { value: String, reason: String },
    #[error("readme {} not found", .path.display())]
    MissingReadme { path: PathBuf },
    #[error("readme {} is outside the project directory", .path.display())]
    ReadmeOutsideProject { path: PathBuf },
    #[error("invalid [tool.pyship].{key}: {reason}")]
    InvalidOption { key: &'static str, reason: String },
    #[error("no Python packages found under {}", .root.display())]
    NoPackages { root: PathBuf },
    #[error("package `{name}` not found at {}", .path.display())]
    MissingPackage { name: String, path: PathBuf },
}

impl MetadataError {
    /// Stable machine-readable reason code used in JSON details.
    pub fn reason(&self) -> &'static str {
        match self {
            MetadataError::Missing { .. } => "missing_pyproject",
            MetadataError::Invalid { .. } => "invalid_pyproject",
            MetadataError::MissingProjectTable | MetadataError::MissingField(_) => {
                "missing_metadata"
            }
            MetadataError::InvalidName(_) => "invalid_name",
            MetadataError::InvalidVersion { .. } => "invalid_version",
            MetadataError::InvalidRequiresPython { .. } => "invalid_requires_python",
            MetadataError::InvalidDependency { .. } => "invalid_dependency",
            MetadataError::MissingReadme { .. } => "missing_readme",
            MetadataError::ReadmeOutsideProject { .. } => "invalid_readme",
            MetadataError::InvalidOption { .. } => "invalid_option",
            MetadataError::NoPackages { .. } | MetadataError::MissingPackage { .. } => {
                "missing_packages"
            }
        }
    }

    pub fn hint(&self) -> &'static str {
        match self {
            MetadataError::Missing { .. } => {
                "Run pyship from the project directory or pass --project DIR."
            }
            MetadataError::MissingProjectTable | MetadataError::MissingField(_) => {
                "Declare name and version under [project] in pyproject.toml."
            }
            MetadataError::InvalidVersion { .. } => {
                "Versions must follow PEP 440 (e.g. 1.2.0, 2.0rc1, 0.1.0.dev0)."
            }
            MetadataError::InvalidDependency { .. } => {
                "Dependencies must be PEP 508 requirement strings (e.g. requests>=2)."
            }
            MetadataError::ReadmeOutsideProject { .. } => {
                "Keep the readme inside the project and reference it by a relative path."
            }
            MetadataError::NoPackages { .. } | MetadataError::MissingPackage { .. } => {
                "Add an __init__.py to the package directory or set [tool.pyship].packages."
            }
            _ => "Fix pyproject.toml and re-run.",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Readme {
    /// Project-relative path, `None` when the text is inlined in pyproject.
    pub path: Option<PathBuf>,
    pub content_type: String,
    pub text: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Author {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestOptions {
    pub source: Option<String>,
    pub tests: String,
    pub pattern: String,
    pub coverage: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            source: None,
            tests: "tests".to_string(),
            pattern: "test_*.py".to_string(),
            coverage: true,
        }
    }
}

/// Settings read from `[tool.pyship]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShipOptions {
    pub universal: bool,
    pub packages: Option<Vec<String>>,
    pub exclude: Vec<String>,
    pub dist_dir: Option<String>,
    pub sdist_include: Vec<String>,
    pub repository: Option<String>,
    pub test: TestOptions,
}

impl Default for ShipOptions {
    fn default() -> Self {
        Self {
            universal: false,
            packages: None,
            exclude: DEFAULT_EXCLUDES.iter().map(ToString::to_string).collect(),
            dist_dir: None,
            sdist_include: Vec::new(),
            repository: None,
            test: TestOptions::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ProjectMetadata {
    pub root: PathBuf,
    pub name: String,
    pub version: Version,
    pub summary: Option<String>,
    pub readme: Option<Readme>,
    pub license: Option<String>,
    pub requires_python: Option<String>,
    pub dependencies: Vec<String>,
    pub keywords: Vec<String>,
    pub classifiers: Vec<String>,
    pub project_urls: Vec<(String, String)>,
    pub authors: Vec<Author>,
    pub options: ShipOptions,
}

impl ProjectMetadata {
    /// Reads and validates `pyproject.toml` under `root`.
    pub fn load(root: &Path) -> Result<Self, MetadataError> {
        let doc = read_pyproject(root)?;
        Self::from_document(root, &doc)
    }

    pub fn from_document(root: &Path, doc: &DocumentMut) -> Result<Self, MetadataError> {
        let project = doc
            .get("project")
            .and_then(Item::as_table)
            .ok_or(MetadataError::MissingProjectTable)?;

        let name = required_str(project, "name")?;
        if !is_valid_project_name(&name) {
            return Err(MetadataError::InvalidName(name));
        }
        let raw_version = required_str(project, "version")?;
        let version =
            Version::from_str(&raw_version).map_err(|err| MetadataError::InvalidVersion {
                value: raw_version.clone(),
                reason: err.to_string(),
            })?;

        let summary = project
            .get("description")
            .and_then(Item::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToString::to_string);

        let requires_python = match project.get("requires-python").and_then(Item::as_str) {
            Some(value) => {
                let trimmed = value.trim();
                VersionSpecifiers::from_str(trimmed).map_err(|err| {
                    MetadataError::InvalidRequiresPython {
                        value: trimmed.to_string(),
                        reason: err.to_string(),
                    }
                })?;
                Some(trimmed.to_string())
            }
            None => None,
        };

        let mut dependencies = Vec::new();
        for spec in parse_string_list(project.get("dependencies")) {
            let trimmed = spec.trim();
            if trimmed.is_empty() {
                continue;
            }
            PepRequirement::from_str(trimmed).map_err(|err| MetadataError::InvalidDependency {
                value: trimmed.to_string(),
                reason: err.to_string(),
            })?;
            dependencies.push(trimmed.to_string());
        }

        let options = ship_options_from_doc(doc)?;
        Ok(Self {
            root: root.to_path_buf(),
            name,
            version,
            summary,
            readme: resolve_readme(root, project.get("readme"))?,
            license: parse_license(project.get("license")),
            requires_python,
            dependencies,
            keywords: parse_string_list(project.get("keywords")),
            classifiers: parse_string_list(project.get("classifiers")),
            project_urls: collect_project_urls(project.get("urls").and_then(Item::as_table_like)),
            authors: parse_authors(project.get("authors")),
            options,
        })
    }

    /// Name escaped for use in distribution filenames (`pycebes`, `my_pkg`).
    pub fn dist_name(&self) -> String {
        escape_dist_name(&self.name)
    }

    pub fn version_str(&self) -> String {
        self.version.to_string()
    }

    pub fn wheel_tag(&self) -> WheelTag {
        if self.options.universal {
            WheelTag::universal()
        } else {
            WheelTag::py3()
        }
    }

    pub fn home_page(&self) -> Option<&str> {
        self.project_urls.iter().find_map(|(label, url)| {
            matches!(
                label.trim().to_ascii_lowercase().as_str(),
                "homepage" | "home-page" | "home"
            )
            .then_some(url.as_str())
        })
    }

    /// Keywords joined the way the upload API and core metadata expect.
    pub fn keywords_field(&self) -> Option<String> {
        if self.keywords.is_empty() {
            None
        } else {
            Some(self.keywords.join(","))
        }
    }
}

fn required_str(project: &Table, key: &'static str) -> Result<String, MetadataError> {
    project
        .get(key)
        .and_then(Item::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
        .ok_or(MetadataError::MissingField(key))
}

fn is_valid_project_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
        return false;
    };
    first.is_ascii_alphanumeric()
        && last.is_ascii_alphanumeric()
        && bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

fn escape_dist_name(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    let mut in_separator = false;
    for ch in name.chars() {
        if matches!(ch, '-' | '_' | '.') {
            if !in_separator {
                escaped.push('_');
            }
            in_separator = true;
        } else {
            escaped.push(ch.to_ascii_lowercase());
            in_separator = false;
        }
    }
    escaped
}

fn resolve_readme(root: &Path, item: Option<&Item>) -> Result<Option<Readme>, MetadataError> {
    let Some(item) = item else {
        return Ok(README_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .find(|candidate| root.join(candidate).is_file())
            .and_then(|path| read_readme_file(root, path, None).ok()));
    };
    if let Some(path) = item.as_str() {
        return read_readme_file(root, PathBuf::from(path.trim()), None).map(Some);
    }
    let file = table_str(item, "file");
    let text = table_str(item, "text");
    let content_type = table_str(item, "content-type");
    match (file, text) {
        (Some(file), _) => read_readme_file(root, PathBuf::from(file), content_type).map(Some),
        (None, Some(text)) => Ok(Some(Readme {
            path: None,
            content_type: content_type.unwrap_or_else(|| "text/plain".to_string()),
            text,
        })),
        (None, None) => Err(MetadataError::InvalidOption {
            key: "readme",
            reason: "expected a path or a table with `file` or `text`".to_string(),
        }),
    }
}

fn read_readme_file(
    root: &Path,
    relative: PathBuf,
    content_type: Option<String>,
) -> Result<Readme, MetadataError> {
    let escapes = relative
        .components()
        .any(|part| !matches!(part, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(MetadataError::ReadmeOutsideProject { path: relative });
    }
    let absolute = root.join(&relative);
    let text = fs::read_to_string(&absolute).map_err(|_| MetadataError::MissingReadme {
        path: relative.clone(),
    })?;
    let content_type = content_type.unwrap_or_else(|| readme_content_type(&relative).to_string());
    Ok(Readme {
        path: Some(relative),
        content_type,
        text,
    })
}

fn readme_content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("rst") => "text/x-rst",
        Some("md" | "markdown") => "text/markdown",
        _ => "text/plain",
    }
}

fn table_str(item: &Item, key: &str) -> Option<String> {
    if let Some(table) = item.as_inline_table() {
        return table
            .get(key)
            .and_then(TomlValue::as_str)
            .map(ToString::to_string);
    }
    item.as_table()
        .and_then(|table| table.get(key))
        .and_then(Item::as_str)
        .map(ToString::to_string)
}

fn parse_license(item: Option<&Item>) -> Option<String> {
    let entry = item?;
    if let Some(value) = entry.as_str() {
        return Some(value.to_string());
    }
    table_str(entry, "text")
}

fn parse_string_list(item: Option<&Item>) -> Vec<String> {
    let Some(array) = item.and_then(Item::as_array) else {
        return Vec::new();
    };
    array
        .iter()
        .filter_map(TomlValue::as_str)
        .map(ToString::to_string)
        .collect()
}

fn collect_project_urls(table: Option<&dyn TableLike>) -> Vec<(String, String)> {
    let mut urls = Vec::new();
    if let Some(entries) = table {
        for (label, value) in entries.iter() {
            if let Some(url) = value.as_str() {
                urls.push((label.to_string(), url.to_string()));
            }
        }
    }
    urls
}

fn parse_authors(item: Option<&Item>) -> Vec<Author> {
    let Some(array) = item.and_then(Item::as_array) else {
        return Vec::new();
    };
    array
        .iter()
        .filter_map(TomlValue::as_inline_table)
        .map(|table| Author {
            name: table
                .get("name")
                .and_then(TomlValue::as_str)
                .map(ToString::to_string),
            email: table
                .get("email")
                .and_then(TomlValue::as_str)
                .map(ToString::to_string),
        })
        .filter(|author| author.name.is_some() || author.email.is_some())
        .collect()
}

fn ship_options_from_doc(doc: &DocumentMut) -> Result<ShipOptions, MetadataError> {
    let mut options = ShipOptions::default();
    let Some(ship) = doc
        .get("tool")
        .and_then(Item::as_table_like)
        .and_then(|tool| tool.get("pyship"))
        .and_then(Item::as_table_like)
    else {
        return Ok(options);
    };

    if let Some(item) = ship.get("universal") {
        options.universal = item.as_bool().ok_or_else(|| type_error("universal", "boolean"))?;
    }
    if let Some(item) = ship.get("packages") {
        options.packages = Some(option_string_list(item, "packages")?);
    }
    if let Some(item) = ship.get("exclude") {
        options.exclude = option_string_list(item, "exclude")?;
    }
    if let Some(item) = ship.get("dist-dir") {
        options.dist_dir = Some(option_str(item, "dist-dir")?);
    }
    if let Some(item) = ship.get("sdist-include") {
        options.sdist_include = option_string_list(item, "sdist-include")?;
    }
    if let Some(item) = ship.get("repository") {
        options.repository = Some(option_str(item, "repository")?);
    }
    if let Some(test) = ship.get("test") {
        let table = test
            .as_table_like()
            .ok_or_else(|| type_error("test", "table"))?;
        if let Some(item) = table.get("source") {
            options.test.source = Some(option_str(item, "test.source")?);
        }
        if let Some(item) = table.get("tests") {
            options.test.tests = option_str(item, "test.tests")?;
        }
        if let Some(item) = table.get("pattern") {
            options.test.pattern = option_str(item, "test.pattern")?;
        }
        if let Some(item) = table.get("coverage") {
            options.test.coverage = item
                .as_bool()
                .ok_or_else(|| type_error("test.coverage", "boolean"))?;
        }
    }
    Ok(options)
}

fn option_str(item: &Item, key: &'static str) -> Result<String, MetadataError> {
    item.as_str()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| type_error(key, "non-empty string"))
}

fn option_string_list(item: &Item, key: &'static str) -> Result<Vec<String>, MetadataError> {
    let array = item
        .as_array()
        .ok_or_else(|| type_error(key, "array of strings"))?;
    array
        .iter()
        .map(|value| {
            value
                .as_str()
                .map(|s| s.trim().to_string())
                .ok_or_else(|| type_error(key, "array of strings"))
        })
        .collect()
}

fn type_error(key: &'static str, expected: &str) -> MetadataError {
    MetadataError::InvalidOption {
        key,
        reason: format!("expected {expected}"),
    }
}

/// Renders the core metadata block shared by `PKG-INFO` and `METADATA`.
pub fn render_core_metadata(meta: &ProjectMetadata) -> String {
    let mut out = String::new();
    push_field(&mut out, "Metadata-Version", "2.1");
    push_field(&mut out, "Name", &meta.name);
    push_field(&mut out, "Version", &meta.version_str());
    if let Some(summary) = meta.summary.as_deref() {
        push_field(&mut out, "Summary", summary.lines().next().unwrap_or_default());
    }
    if let Some(home) = meta.home_page() {
        push_field(&mut out, "Home-page", home);
    }
    let (names, emails) = author_fields(&meta.authors);
    if !names.is_empty() {
        push_field(&mut out, "Author", &names.join(", "));
    }
    if !emails.is_empty() {
        push_field(&mut out, "Author-email", &emails.join(", "));
    }
    if let Some(license) = meta.license.as_deref() {
        push_field(&mut out, "License", &license.replace('\n', "\n        "));
    }
    if let Some(keywords) = meta.keywords_field() {
        push_field(&mut out, "Keywords", &keywords);
    }
    for classifier in &meta.classifiers {
        push_field(&mut out, "Classifier", classifier);
    }
    for (label, url) in &meta.project_urls {
        push_field(&mut out, "Project-URL", &format!("{label}, {url}"));
    }
    if let Some(requires) = meta.requires_python.as_deref() {
        push_field(&mut out, "Requires-Python", requires);
    }
    for dependency in &meta.dependencies {
        push_field(&mut out, "Requires-Dist", dependency);
    }
    if let Some(readme) = meta.readme.as_ref() {
        push_field(&mut out, "Description-Content-Type", &readme.content_type);
        out.push('\n');
        out.push_str(&readme.text);
        if !readme.text.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

fn push_field(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    out.push_str(value);
    out.push('\n');
}

/// Authors with an email go to `Author-email`, name-only ones to `Author`.
fn author_fields(authors: &[Author]) -> (Vec<String>, Vec<String>) {
    let mut names = Vec::new();
    let mut emails = Vec::new();
    for author in authors {
        match (&author.name, &author.email) {
            (Some(name), Some(email)) => emails.push(format!("{name} <{email}>")),
            (Some(name), None) => names.push(name.clone()),
            (None, Some(email)) => emails.push(email.clone()),
            (None, None) => {}
        }
    }
    (names, emails)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(root: &Path, toml: &str) -> Result<ProjectMetadata, MetadataError> {
        let doc: DocumentMut = toml.parse().expect("valid toml");
        ProjectMetadata::from_document(root, &doc)
    }

    #[test]
    fn loads_setup_style_metadata() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("README.rst"), "pycebes\n=======\n").expect("readme");
        let meta = parse(
            temp.path(),
            r#"
[project]
name = "pycebes"
version = "0.1.0.dev0"
description = "Python client for Cebes HTTP server."
license = "Apache 2.0"
dependencies = ["requests>=2.0", "six"]

[tool.pyship]
universal = true
"#,
        )
        .expect("metadata");

        assert_eq!(meta.name, "pycebes");
        assert_eq!(meta.version_str(), "0.1.0.dev0");
        assert_eq!(meta.license.as_deref(), Some("Apache 2.0"));
        assert_eq!(meta.dependencies.len(), 2);
        assert!(meta.options.universal);
        assert_eq!(meta.wheel_tag().to_string(), "py2.py3-none-any");
        let readme = meta.readme.expect("readme fallback");
        assert_eq!(readme.content_type, "text/x-rst");
        assert_eq!(readme.path.as_deref(), Some(Path::new("README.rst")));
    }

    #[test]
    fn missing_version_is_reported() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = parse(temp.path(), "[project]\nname = \"demo\"\n").expect_err("no version");
        assert!(matches!(err, MetadataError::MissingField("version")));
        assert_eq!(err.reason(), "missing_metadata");
    }

    #[test]
    fn invalid_version_and_dependency_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = parse(
            temp.path(),
            "[project]\nname = \"demo\"\nversion = \"not a version\"\n",
        )
        .expect_err("bad version");
        assert!(matches!(err, MetadataError::InvalidVersion { .. }));

        let err = parse(
            temp.path(),
            "[project]\nname = \"demo\"\nversion = \"1.0\"\ndependencies = [\"requests >>= 2\"]\n",
        )
        .expect_err("bad dependency");
        assert!(matches!(err, MetadataError::InvalidDependency { .. }));
    }

    #[test]
    fn invalid_names_are_rejected() {
        assert!(is_valid_project_name("pycebes"));
        assert!(is_valid_project_name("my.pkg-name_2"));
        assert!(!is_valid_project_name("-leading"));
        assert!(!is_valid_project_name("trailing."));
        assert!(!is_valid_project_name("has space"));
        assert!(!is_valid_project_name(""));
    }

    #[test]
    fn dist_name_collapses_separators() {
        assert_eq!(escape_dist_name("pycebes"), "pycebes");
        assert_eq!(escape_dist_name("My-Pkg"), "my_pkg");
        assert_eq!(escape_dist_name("a.-_b"), "a_b");
    }

    #[test]
    fn declared_readme_must_exist() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = parse(
            temp.path(),
            "[project]\nname = \"demo\"\nversion = \"1.0\"\nreadme = \"DOCS.md\"\n",
        )
        .expect_err("missing readme");
        assert!(matches!(err, MetadataError::MissingReadme { .. }));
    }

    #[test]
    fn option_types_are_checked() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = parse(
            temp.path(),
            "[project]\nname = \"demo\"\nversion = \"1.0\"\n[tool.pyship]\nuniversal = \"yes\"\n",
        )
        .expect_err("bad option");
        assert!(
            matches!(err, MetadataError::InvalidOption { key: "universal", .. }),
            "{err}"
        );
    }

    #[test]
    fn core_metadata_includes_declared_fields() {
        let temp = tempfile::tempdir().expect("tempdir");
        let meta = parse(
            temp.path(),
            r#"
[project]
name = "demo"
version = "2.0"
description = "Demo package"
readme = { text = "Long text", content-type = "text/markdown" }
requires-python = ">=3.8"
dependencies = ["six"]
keywords = ["data", "client"]
classifiers = ["Programming Language :: Python"]
authors = [{ name = "Dev", email = "dev@example.com" }]

[project.urls]
Homepage = "https://example.com"
"#,
        )
        .expect("metadata");

        let rendered = render_core_metadata(&meta);
        assert!(rendered.starts_with("Metadata-Version: 2.1\nName: demo\nVersion: 2.0\n"));
        assert!(rendered.contains("Summary: Demo package\n"));
        assert!(rendered.contains("Home-page: https://example.com\n"));
        assert!(rendered.contains("Author-email: Dev <dev@example.com>\n"));
        assert!(rendered.contains("Keywords: data,client\n"));
        assert!(rendered.contains("Requires-Python: >=3.8\n"));
        assert!(rendered.contains("Requires-Dist: six\n"));
        assert!(rendered.contains("Description-Content-Type: text/markdown\n\nLong text\n"));
    }

    #[test]
    fn dependencies_keep_their_declared_spelling() {
        let temp = tempfile::tempdir().expect("tempdir");
        let meta = parse(
            temp.path(),
            "[project]\nname = \"demo\"\nversion = \"1.0\"\ndependencies = [\" requests>=2.18 \", \"six ; python_version < '3'\"]\n",
        )
        .expect("metadata");
        assert_eq!(
            meta.dependencies,
            vec!["requests>=2.18", "six ; python_version < '3'"]
        );
        assert!(render_core_metadata(&meta).contains("Requires-Dist: requests>=2.18\n"));
    }

    #[test]
    fn inline_urls_and_test_tables_are_read() {
        let temp = tempfile::tempdir().expect("tempdir");
        let meta = parse(
            temp.path(),
            r#"
[project]
name = "demo"
version = "1.0"
urls = { Homepage = "https://example.com", Source = "https://example.com/src" }

[tool.pyship]
test = { source = "demo", coverage = false }
"#,
        )
        .expect("metadata");
        assert_eq!(
            meta.project_urls,
            vec![
                ("Homepage".to_string(), "https://example.com".to_string()),
                ("Source".to_string(), "https://example.com/src".to_string()),
            ]
        );
        assert_eq!(meta.home_page(), Some("https://example.com"));
        assert_eq!(meta.options.test.source.as_deref(), Some("demo"));
        assert!(!meta.options.test.coverage);
        assert_eq!(meta.options.test.tests, "tests");
    }

    #[test]
    fn authors_share_single_fields() {
        let temp = tempfile::tempdir().expect("tempdir");
        let meta = parse(
            temp.path(),
            r#"
[project]
name = "demo"
version = "1.0"
authors = [
    { name = "Dev", email = "dev@example.com" },
    { email = "ops@example.com" },
    { name = "Reviewer" },
]
"#,
        )
        .expect("metadata");
        let rendered = render_core_metadata(&meta);
        assert!(rendered.contains("Author: Reviewer\n"));
        assert!(rendered.contains("Author-email: Dev <dev@example.com>, ops@example.com\n"));
        assert_eq!(rendered.matches("Author-email:").count(), 1);
    }

    #[test]
    fn readme_outside_the_project_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().join("demo");
        fs::create_dir_all(&root).expect("root");
        fs::write(temp.path().join("NOTES.md"), "notes").expect("outside readme");
        for declared in [
            "readme = \"../NOTES.md\"".to_string(),
            "readme = { file = \"docs/../../NOTES.md\" }".to_string(),
            format!("readme = {:?}", temp.path().join("NOTES.md").display().to_string()),
        ] {
            let err = parse(
                &root,
                &format!("[project]\nname = \"demo\"\nversion = \"1.0\"\n{declared}\n"),
            )
            .expect_err("outside readme");
            assert_eq!(err.reason(), "invalid_readme", "{declared}");
        }
    }
}
