//! IPA packaging stage
//!
//! After a successful build, each `.app` bundle under the
//! `build/<configuration>-iphoneos` output directory is wrapped into one
//! `.ipa` archive next to it, named by the bundle's base name. Archive
//! contents are assembled in a `Payload` staging directory which is removed
//! again whether or not compression succeeds, so a failed run never leaves
//! partial state behind for the next one.

use crate::fs::WorkspaceFs;
use anyhow::{anyhow, Result};
use std::path::Path;
use tracing::{info, warn};

/// Application bundle directory suffix
pub const BUNDLE_SUFFIX: &str = ".app";

/// Archive file suffix
pub const ARCHIVE_SUFFIX: &str = ".ipa";

/// Staging directory name required by the IPA layout
const STAGING_DIR: &str = "Payload";

/// Packages every application bundle in `build_dir` into an archive
///
/// Pre-existing archives with the same base name are replaced. Zero bundles
/// is a no-op success. Returns the file names of the archives produced.
pub fn package_bundles(fs: &dyn WorkspaceFs, build_dir: &Path) -> Result<Vec<String>> {
    if !fs.is_dir(build_dir) {
        warn!(
            "build output directory {} does not exist, nothing to package",
            build_dir.display()
        );
        return Ok(Vec::new());
    }

    let bundles = fs.list_dirs_with_suffix(build_dir, BUNDLE_SUFFIX)?;
    if bundles.is_empty() {
        warn!(
            "no application bundles found under {}",
            build_dir.display()
        );
        return Ok(Vec::new());
    }

    let mut archives = Vec::new();
    for bundle in bundles {
        let bundle_name = bundle
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("bundle {} has no valid name", bundle.display()))?
            .to_string();
        let base_name = bundle_name
            .strip_suffix(BUNDLE_SUFFIX)
            .unwrap_or(&bundle_name)
            .to_string();
        let archive_name = format!("{}{}", base_name, ARCHIVE_SUFFIX);
        let archive = build_dir.join(&archive_name);

        if fs.exists(&archive) {
            fs.remove_file(&archive)?;
        }

        let staging = build_dir.join(STAGING_DIR);
        if fs.exists(&staging) {
            fs.remove_dir_all(&staging)?;
        }
        fs.create_dir_all(&staging)?;

        info!("Packaging {} => {}", bundle_name, archive_name);
        let result = stage_and_compress(fs, &bundle, &bundle_name, &staging, &archive);

        // The staging directory goes away on the error path too.
        let cleanup = if fs.exists(&staging) {
            fs.remove_dir_all(&staging)
        } else {
            Ok(())
        };
        result?;
        cleanup?;

        archives.push(archive_name);
    }

    Ok(archives)
}

fn stage_and_compress(
    fs: &dyn WorkspaceFs,
    bundle: &Path,
    bundle_name: &str,
    staging: &Path,
    archive: &Path,
) -> Result<()> {
    fs.copy_dir(bundle, &staging.join(bundle_name))?;
    fs.compress_dir(staging, archive)?;
    Ok(())
}
