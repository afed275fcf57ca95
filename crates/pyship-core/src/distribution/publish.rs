use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use pyship_domain::{ArtifactKind, ProjectMetadata};
use reqwest::{blocking::Client, StatusCode};
use serde_json::json;
use tracing::{debug, info};

use crate::net::build_http_client;
use crate::{relative_path_str, CommandContext, ExecutionOutcome, UserError};

use super::artifacts::{list_dist_files, summarize_selected_artifacts, ArtifactSummary};
use super::credentials::{resolve_credentials, Credentials, Prompter, TerminalPrompter};
use super::plan::{
    load_project, resolve_output_dir, resolve_publish_registry, PublishRegistry, PublishRequest,
};

/// Upload form fields derived from the project metadata.
#[derive(Clone, Debug)]
struct PublishMetadata {
    name: String,
    version: String,
    summary: Option<String>,
    description: Option<String>,
    description_content_type: Option<String>,
    author: Option<String>,
    author_email: Option<String>,
    keywords: Option<String>,
    license: Option<String>,
    home_page: Option<String>,
    project_urls: Vec<String>,
    classifiers: Vec<String>,
    requires_python: Option<String>,
    requires_dist: Vec<String>,
}

impl PublishMetadata {
    fn from_project(meta: &ProjectMetadata) -> Self {
        let names: Vec<&str> = meta
            .authors
            .iter()
            .filter(|author| author.email.is_none())
            .filter_map(|author| author.name.as_deref())
            .collect();
        let emails: Vec<String> = meta
            .authors
            .iter()
            .filter_map(|author| match (&author.name, &author.email) {
                (Some(name), Some(email)) => Some(format!("{name} <{email}>")),
                (None, Some(email)) => Some(email.clone()),
                _ => None,
            })
            .collect();
        Self {
            name: meta.name.clone(),
            version: meta.version_str(),
            summary: meta.summary.clone(),
            description: meta.readme.as_ref().map(|readme| readme.text.clone()),
            description_content_type: meta
                .readme
                .as_ref()
                .map(|readme| readme.content_type.clone()),
            author: (!names.is_empty()).then(|| names.join(", ")),
            author_email: (!emails.is_empty()).then(|| emails.join(", ")),
            keywords: meta.keywords_field(),
            license: meta.license.clone(),
            home_page: meta.home_page().map(ToString::to_string),
            project_urls: meta
                .project_urls
                .iter()
                .map(|(label, url)| format!("{label}, {url}"))
                .collect(),
            classifiers: meta.classifiers.clone(),
            requires_python: meta.requires_python.clone(),
            requires_dist: meta.dependencies.clone(),
        }
    }
}

/// Why a single upload was refused.
#[derive(thiserror::Error, Debug)]
pub(crate) enum UploadError {
    #[error("registry {registry} rejected the provided credentials (HTTP {status})")]
    Auth { registry: String, status: u16 },
    #[error("{filename} already exists on {registry}")]
    Conflict { registry: String, filename: String },
    #[error("upload of {filename} failed with HTTP {status}: {body}")]
    Http {
        filename: String,
        status: u16,
        body: String,
    },
    #[error("could not reach {registry} while uploading {filename}")]
    Network {
        registry: String,
        filename: String,
        #[source]
        source: reqwest::Error,
    },
}

impl UploadError {
    /// Credential and conflict problems are the user's to fix; the rest are failures.
    fn into_error(self, uploaded: &[String]) -> anyhow::Error {
        match self {
            UploadError::Auth { ref registry, .. } => UserError::new(
                self.to_string(),
                json!({
                    "reason": "auth_forbidden",
                    "registry": registry,
                    "uploaded": uploaded,
                    "hint": "Confirm the token environment variable and permissions for this repository.",
                }),
            )
            .into(),
            UploadError::Conflict {
                ref registry,
                ref filename,
            } => UserError::new(
                self.to_string(),
                json!({
                    "reason": "already_exists",
                    "registry": registry,
                    "file": filename,
                    "uploaded": uploaded,
                    "hint": "Bump the project version; published files cannot be replaced.",
                }),
            )
            .into(),
            other => anyhow::Error::new(other),
        }
    }
}

/// Uploads every artifact in the output directory to the selected registry.
///
/// # Errors
/// Returns an error when metadata is invalid, credentials are missing, or an
/// upload is rejected.
pub fn publish_project(ctx: &CommandContext, request: &PublishRequest) -> Result<ExecutionOutcome> {
    let meta = load_project(ctx)?;
    let dist_dir = resolve_output_dir(&meta.root, None, ctx.config().dist(), &meta.options)?;
    publish_dist_dir(ctx, &meta, &dist_dir, request, &TerminalPrompter)
}

pub(crate) fn publish_dist_dir(
    ctx: &CommandContext,
    meta: &ProjectMetadata,
    dist_dir: &Path,
    request: &PublishRequest,
    prompter: &dyn Prompter,
) -> Result<ExecutionOutcome> {
    let selection = request
        .registry
        .as_deref()
        .or(ctx.config().publish().repository.as_deref())
        .or(meta.options.repository.as_deref());
    let registry = resolve_publish_registry(selection)?;

    let files = list_dist_files(dist_dir)?;
    let shown_dir = relative_path_str(dist_dir, &meta.root);
    if files.is_empty() {
        return Err(UserError::new(
            format!("no artifacts found in {shown_dir}"),
            json!({
                "reason": "no_artifacts",
                "dist_dir": shown_dir,
                "hint": "Run `pyship build` before publishing.",
            }),
        )
        .into());
    }
    let mut kinds = Vec::with_capacity(files.len());
    for path in &files {
        kinds.push(classify(path)?);
    }
    let artifacts = summarize_selected_artifacts(&files, &meta.root)?;

    if request.dry_run {
        return Ok(ExecutionOutcome::success(
            format!(
                "dry-run to {} ({} artifacts)",
                registry.label,
                artifacts.len()
            ),
            json!({
                "registry": registry.label,
                "url": registry.url,
                "dry_run": true,
                "artifacts": artifacts,
            }),
        ));
    }

    let credentials = resolve_credentials(ctx, request, &registry, prompter)?;
    info!(
        registry = %registry.label,
        credentials = %credentials.source,
        count = artifacts.len(),
        "uploading artifacts"
    );
    let metadata = PublishMetadata::from_project(meta);
    let client = build_http_client(ctx.config().network())?;
    let upload = Upload {
        client: &client,
        registry: &registry,
        credentials: &credentials,
        metadata: &metadata,
    };
    let mut uploaded = Vec::new();
    for ((path, kind), summary) in files.iter().zip(&kinds).zip(&artifacts) {
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        upload
            .send(summary, kind, path, &bytes)
            .map_err(|err| err.into_error(&uploaded))?;
        uploaded.push(summary.path.clone());
    }

    Ok(ExecutionOutcome::success(
        format!(
            "uploaded {} artifacts to {}",
            artifacts.len(),
            registry.label
        ),
        json!({
            "registry": registry.label,
            "url": registry.url,
            "dry_run": false,
            "artifacts": artifacts,
        }),
    ))
}

fn classify(path: &Path) -> Result<ArtifactKind, UserError> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    ArtifactKind::classify(filename).ok_or_else(|| {
        UserError::new(
            format!("unsupported artifact type: {filename}"),
            json!({
                "reason": "unsupported_artifact",
                "file": filename,
                "hint": "Only wheels (.whl) and source distributions (.tar.gz/.zip) can be published.",
            }),
        )
    })
}

struct Upload<'a> {
    client: &'a Client,
    registry: &'a PublishRegistry,
    credentials: &'a Credentials,
    metadata: &'a PublishMetadata,
}

impl Upload<'_> {
    fn send(
        &self,
        summary: &ArtifactSummary,
        kind: &ArtifactKind,
        file_path: &Path,
        bytes: &[u8],
    ) -> Result<(), UploadError> {
        let filename = file_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        let boundary = format!(
            "----pyship{}",
            &summary.sha256[..summary.sha256.len().min(12)]
        );
        let body = build_upload_body(&boundary, self.metadata, summary, kind, &filename, bytes);
        debug!(file = %filename, url = %self.registry.url, "uploading");

        let response = self
            .client
            .post(&self.registry.url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(body)
            .send()
            .map_err(|source| UploadError::Network {
                registry: self.registry.label.clone(),
                filename: filename.clone(),
                source,
            })?;
        let status = response.status();
        if status.is_success() {
            info!(file = %filename, "uploaded");
            return Ok(());
        }
        let text = response.text().unwrap_or_default();
        Err(classify_rejection(
            &self.registry.label,
            &filename,
            status,
            text,
        ))
    }
}

fn classify_rejection(
    registry: &str,
    filename: &str,
    status: StatusCode,
    body: String,
) -> UploadError {
    let duplicate = body.to_ascii_lowercase().contains("already exists");
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => UploadError::Auth {
            registry: registry.to_string(),
            status: status.as_u16(),
        },
        StatusCode::CONFLICT => UploadError::Conflict {
            registry: registry.to_string(),
            filename: filename.to_string(),
        },
        StatusCode::BAD_REQUEST if duplicate => UploadError::Conflict {
            registry: registry.to_string(),
            filename: filename.to_string(),
        },
        _ => UploadError::Http {
            filename: filename.to_string(),
            status: status.as_u16(),
            body: body.trim().chars().take(200).collect(),
        },
    }
}

fn build_upload_body(
    boundary: &str,
    metadata: &PublishMetadata,
    summary: &ArtifactSummary,
    kind: &ArtifactKind,
    filename: &str,
    bytes: &[u8],
) -> Vec<u8> {
    let mut body = Vec::new();
    append_form_field(&mut body, boundary, ":action", "file_upload");
    append_form_field(&mut body, boundary, "protocol_version", "1");
    append_form_field(&mut body, boundary, "metadata_version", "2.1");
    append_form_field(&mut body, boundary, "name", &metadata.name);
    append_form_field(&mut body, boundary, "version", &metadata.version);
    let optional = [
        ("summary", &metadata.summary),
        ("description", &metadata.description),
        (
            "description_content_type",
            &metadata.description_content_type,
        ),
        ("author", &metadata.author),
        ("author_email", &metadata.author_email),
        ("keywords", &metadata.keywords),
        ("home_page", &metadata.home_page),
        ("license", &metadata.license),
        ("requires_python", &metadata.requires_python),
    ];
    for (name, value) in optional {
        if let Some(value) = value.as_deref() {
            append_form_field(&mut body, boundary, name, value);
        }
    }
    for classifier in &metadata.classifiers {
        append_form_field(&mut body, boundary, "classifiers", classifier);
    }
    for entry in &metadata.project_urls {
        append_form_field(&mut body, boundary, "project_urls", entry);
    }
    for requirement in &metadata.requires_dist {
        append_form_field(&mut body, boundary, "requires_dist", requirement);
    }
    append_form_field(&mut body, boundary, "sha256_digest", &summary.sha256);
    append_form_field(&mut body, boundary, "filetype", kind.filetype());
    append_form_field(&mut body, boundary, "pyversion", kind.pyversion());
    append_file_field(&mut body, boundary, "content", filename, bytes);
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

fn append_form_field(buf: &mut Vec<u8>, boundary: &str, name: &str, value: &str) {
    buf.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    buf.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
    );
    buf.extend_from_slice(value.as_bytes());
    buf.extend_from_slice(b"\r\n");
}

fn append_file_field(buf: &mut Vec<u8>, boundary: &str, name: &str, filename: &str, bytes: &[u8]) {
    buf.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    buf.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    buf.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    buf.extend_from_slice(bytes);
    buf.extend_from_slice(b"\r\n");
}
