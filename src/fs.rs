//! Workspace file system abstraction
//!
//! The packaging stage manipulates the build output directory (bundle
//! discovery, staging directories, archive creation). Putting those
//! operations behind a trait lets tests exercise packaging against scratch
//! directories and inject failures without touching the real archive writer.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Abstraction over workspace file system operations for testability
pub trait WorkspaceFs: Send + Sync {
    /// Check if a path exists
    fn exists(&self, path: &Path) -> bool;

    /// Check if path is a directory
    fn is_dir(&self, path: &Path) -> bool;

    /// List the directories directly under `dir` whose name ends with
    /// `suffix`, sorted by name
    fn list_dirs_with_suffix(&self, dir: &Path, suffix: &str) -> Result<Vec<PathBuf>>;

    /// Create a directory and all missing parents
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Recursively delete a directory
    fn remove_dir_all(&self, path: &Path) -> Result<()>;

    /// Delete a single file
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Recursively copy a directory tree from `src` to `dest`
    fn copy_dir(&self, src: &Path, dest: &Path) -> Result<()>;

    /// Compress the directory `src` into a zip archive at `dest`; the
    /// directory itself is the top-level entry, so compressing `Payload`
    /// yields `Payload/...` entries
    fn compress_dir(&self, src: &Path, dest: &Path) -> Result<()>;
}

/// Real file system implementation backed by `std::fs`, `walkdir` and the
/// `zip` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct StdFs;

impl WorkspaceFs for StdFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn list_dirs_with_suffix(&self, dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
        let mut matches = Vec::new();
        let entries = fs::read_dir(dir)
            .with_context(|| format!("Failed to read directory {}", dir.display()))?;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if path.is_dir() && name.ends_with(suffix) {
                matches.push(path);
            }
        }
        matches.sort();
        Ok(matches)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {}", path.display()))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove directory {}", path.display()))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))
    }

    fn copy_dir(&self, src: &Path, dest: &Path) -> Result<()> {
        for entry in WalkDir::new(src) {
            let entry = entry.context("Failed to read directory entry")?;
            let relative = entry
                .path()
                .strip_prefix(src)
                .expect("entry is always under the copy root");
            let target = dest.join(relative);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)
                    .with_context(|| format!("Failed to create directory {}", target.display()))?;
            } else {
                fs::copy(entry.path(), &target).with_context(|| {
                    format!(
                        "Failed to copy {} to {}",
                        entry.path().display(),
                        target.display()
                    )
                })?;
            }
        }
        Ok(())
    }

    fn compress_dir(&self, src: &Path, dest: &Path) -> Result<()> {
        if !src.is_dir() {
            anyhow::bail!("{} is not a directory", src.display());
        }

        // Write to a sibling temp file and rename into place, so a failed
        // compression never leaves a truncated archive at the final path.
        let partial = partial_path(dest);
        match write_archive(src, &partial) {
            Ok(()) => fs::rename(&partial, dest)
                .with_context(|| format!("Failed to finalize archive {}", dest.display())),
            Err(e) => {
                let _ = fs::remove_file(&partial);
                Err(e)
            }
        }
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive".to_string());
    dest.with_file_name(format!("{}.partial", name))
}

fn write_archive(src: &Path, dest: &Path) -> Result<()> {
    let file = File::create(dest)
        .with_context(|| format!("Failed to create archive {}", dest.display()))?;
    let mut writer = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let root = src.parent().unwrap_or(src);

    // WalkDir yields src itself first, so the archive opens with the
    // top-level directory entry.
    for entry in WalkDir::new(src) {
        let entry = entry.context("Failed to read directory entry")?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .expect("entry is always under the archive root");
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if entry.file_type().is_dir() {
            writer.add_directory(format!("{}/", name), options)?;
        } else {
            writer.start_file(name, options)?;
            let mut file = File::open(entry.path())
                .with_context(|| format!("Failed to read {}", entry.path().display()))?;
            io::copy(&mut file, &mut writer)?;
        }
    }

    writer
        .finish()
        .with_context(|| format!("Failed to write archive {}", dest.display()))?;
    Ok(())
}
