//! Zip and tar bundles of a job's output directory.

use std::fs::File;
use std::io::{self, Cursor};
use std::path::Path;

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

use super::AssetError;

/// Extensions (without dot) that make it into an archive.
pub const PACKED_EXTENSIONS: [&str; 2] = ["log", "pdf"];

pub fn should_pack_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| PACKED_EXTENSIONS.contains(&ext))
}

/// Visit packable files under `base` in name order as `(path, entry_name)`.
///
/// A missing `base` produces no files; any other walk failure is an error.
fn walk_packable<F>(base: &Path, mut visit: F) -> Result<(), AssetError>
where
    F: FnMut(&Path, &str) -> Result<(), AssetError>,
{
    for entry in WalkDir::new(base).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 && is_not_found(&e) => return Ok(()),
            Err(e) => return Err(AssetError::Walk(e)),
        };
        if !entry.file_type().is_file() || !should_pack_file(entry.path()) {
            continue;
        }

        let name = entry_name(base, entry.path());
        visit(entry.path(), &name)?;
    }
    Ok(())
}

fn is_not_found(e: &walkdir::Error) -> bool {
    e.io_error()
        .is_some_and(|io| io.kind() == io::ErrorKind::NotFound)
}

/// Path relative to `base`, `/`-separated, without leading separators.
fn entry_name(base: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .filter(|c| !c.is_empty() && c != "/" && c != "\\")
        .collect::<Vec<_>>()
        .join("/")
}

/// Zip archive of the packable files under `base`.
pub fn build_zip(base: &Path) -> Result<Vec<u8>, AssetError> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    walk_packable(base, |path, name| {
        let mut file = File::open(path).map_err(|e| AssetError::io(path, e))?;
        writer.start_file(name, options)?;
        io::copy(&mut file, &mut writer).map_err(|e| AssetError::io(path, e))?;
        Ok(())
    })?;

    Ok(writer.finish()?.into_inner())
}

/// Tar archive of the packable files under `base`.
pub fn build_tar(base: &Path) -> Result<Vec<u8>, AssetError> {
    let mut builder = tar::Builder::new(Vec::new());

    walk_packable(base, |path, name| {
        builder
            .append_path_with_name(path, name)
            .map_err(|e| AssetError::io(path, e))
    })?;

    builder.into_inner().map_err(|e| AssetError::io(base, e))
}
