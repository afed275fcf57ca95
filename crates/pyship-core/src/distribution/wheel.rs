use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use pyship_domain::{render_core_metadata, wheel_filename, PackageLayout, ProjectMetadata};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tracing::debug;
use zip::{write::FileOptions, CompressionMethod, DateTime, ZipWriter};

use crate::PYSHIP_VERSION;

/// Writes the pure-Python wheel into `out_dir`.
pub(crate) fn write_wheel(
    meta: &ProjectMetadata,
    layout: &PackageLayout,
    out_dir: &Path,
    source_date_epoch: Option<u64>,
) -> Result<PathBuf> {
    let tag = meta.wheel_tag();
    let version = meta.version_str();
    let path = out_dir.join(wheel_filename(&meta.dist_name(), &version, &tag));
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    let mut zip = ZipWriter::new(file);
    let mut options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    if let Some(epoch) = source_date_epoch {
        options = options.last_modified_time(zip_timestamp(epoch));
    }

    let mut records = Vec::new();
    for file in layout.files()? {
        let data = fs::read(&file.source)
            .with_context(|| format!("reading {}", file.source.display()))?;
        add_member(&mut zip, options, &file.archive_path, &data, &mut records)?;
    }

    let dist_info = format!("{}-{version}.dist-info", meta.dist_name());
    add_member(
        &mut zip,
        options,
        &format!("{dist_info}/METADATA"),
        render_core_metadata(meta).as_bytes(),
        &mut records,
    )?;

    let mut wheel_body = format!(
        "Wheel-Version: 1.0\nGenerator: pyship {PYSHIP_VERSION}\nRoot-Is-Purelib: true\n"
    );
    for expanded in tag.expanded() {
        wheel_body.push_str(&format!("Tag: {expanded}\n"));
    }
    add_member(
        &mut zip,
        options,
        &format!("{dist_info}/WHEEL"),
        wheel_body.as_bytes(),
        &mut records,
    )?;

    let mut top_level = layout.top_level().join("\n");
    top_level.push('\n');
    add_member(
        &mut zip,
        options,
        &format!("{dist_info}/top_level.txt"),
        top_level.as_bytes(),
        &mut records,
    )?;

    let record_path = format!("{dist_info}/RECORD");
    records.push(format!("{record_path},,"));
    let mut record_body = records.join("\n");
    record_body.push('\n');
    zip.start_file(record_path.as_str(), options)?;
    zip.write_all(record_body.as_bytes())?;

    zip.finish()
        .with_context(|| format!("finishing {}", path.display()))?;
    Ok(path)
}

fn add_member(
    zip: &mut ZipWriter<File>,
    options: FileOptions,
    name: &str,
    data: &[u8],
    records: &mut Vec<String>,
) -> Result<()> {
    debug!(member = name, bytes = data.len(), "wheel member");
    zip.start_file(name, options)
        .with_context(|| format!("adding {name}"))?;
    zip.write_all(data)?;
    records.push(record_entry(name, data));
    Ok(())
}

fn record_entry(path: &str, data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let hash = URL_SAFE_NO_PAD.encode(digest);
    format!("{path},sha256={hash},{}", data.len())
}

/// Zip timestamps only cover 1980 through 2107; epochs outside are clamped.
fn zip_timestamp(epoch: u64) -> DateTime {
    const MIN_ZIP_EPOCH: u64 = 315_532_800;
    const MAX_ZIP_EPOCH: u64 = 4_354_819_198;
    let secs = i64::try_from(epoch.clamp(MIN_ZIP_EPOCH, MAX_ZIP_EPOCH)).unwrap_or_default();
    let Ok(moment) = OffsetDateTime::from_unix_timestamp(secs) else {
        return DateTime::default();
    };
    let year = u16::try_from(moment.year()).unwrap_or(1980);
    DateTime::from_date_and_time(
        year,
        u8::from(moment.month()),
        moment.day(),
        moment.hour(),
        moment.minute(),
        moment.second(),
    )
    .unwrap_or_default()
}
