//! Writing fixture files and promoting them over the live fixture directory

use super::{Attributes, FixtureSet};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Materializes a fixture set on disk
pub struct FixtureWriter;

impl FixtureWriter {
    /// YAML text of one fixture file: entries by label, a blank line between them
    pub fn render_table(records: &BTreeMap<String, Attributes>) -> Result<String> {
        let mut entries = Vec::with_capacity(records.len());
        for (label, attributes) in records {
            let mut entry = BTreeMap::new();
            entry.insert(label, attributes);
            entries.push(serde_yaml::to_string(&entry)?);
        }
        Ok(entries.join("\n"))
    }

    /// Write every table of `set` into `dir`, which is recreated empty first
    pub fn write(set: &FixtureSet, dir: &Path) -> Result<Vec<PathBuf>> {
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        fs::create_dir_all(dir)?;

        let mut written = Vec::with_capacity(set.len());
        for (table, data) in set {
            let path = dir.join(format!("{}.yml", data.fixture_name));
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, Self::render_table(&data.records)?)?;
            log::debug!(
                "Wrote {} fixtures of {} to {}",
                data.records.len(),
                table,
                path.display()
            );
            written.push(path);
        }
        Ok(written)
    }

    /// Copy non-YAML files of the attachment folders from `source` into `target`
    pub fn copy_attachments(source: &Path, target: &Path, folders: &[String]) -> Result<usize> {
        let mut copied = 0;
        for folder in folders {
            let src = source.join(folder);
            if !src.is_dir() {
                continue;
            }

            for entry in WalkDir::new(&src) {
                let entry = entry.map_err(|e| Error::Io(e.into()))?;
                let path = entry.path();
                if !entry.file_type().is_file() || is_yaml(path) {
                    continue;
                }

                let relative = path.strip_prefix(source).map_err(|e| {
                    Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
                })?;
                let destination = target.join(relative);
                if let Some(parent) = destination.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(path, &destination)?;
                copied += 1;
            }
        }

        if copied > 0 {
            log::debug!("Copied {} attachment files into {}", copied, target.display());
        }
        Ok(copied)
    }

    /// Replace `live` with `scratch`
    ///
    /// The live directory is moved aside before the scratch directory takes
    /// its place, so it is never left half written. Failing to remove the
    /// aside copy afterwards only logs a warning.
    pub fn promote(scratch: &Path, live: &Path) -> Result<()> {
        if let Some(parent) = live.parent() {
            fs::create_dir_all(parent)?;
        }

        if !live.exists() {
            fs::rename(scratch, live)?;
            log::info!("Created fixture directory {}", live.display());
            return Ok(());
        }

        let aside = aside_path(live);
        if aside.exists() {
            fs::remove_dir_all(&aside)?;
        }
        fs::rename(live, &aside)?;

        if let Err(e) = fs::rename(scratch, live) {
            // Put the previous fixtures back before reporting
            if let Err(restore) = fs::rename(&aside, live) {
                log::warn!(
                    "Could not restore {} from {}: {}",
                    live.display(),
                    aside.display(),
                    restore
                );
            }
            return Err(Error::Io(e).with_context(format!(
                "Failed to move {} into {}",
                scratch.display(),
                live.display()
            )));
        }

        if let Err(e) = fs::remove_dir_all(&aside) {
            log::warn!(
                "Could not remove previous fixtures at {}: {}",
                aside.display(),
                e
            );
        }
        log::info!("Promoted regenerated fixtures to {}", live.display());
        Ok(())
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yml") | Some("yaml")
    )
}

fn aside_path(live: &Path) -> PathBuf {
    let name = live
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "fixtures".to_string());
    live.with_file_name(format!(".{}.previous", name))
}

/// Whether `dir` exists and holds at least one entry
pub fn is_non_empty_dir(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
