//! Single-file downloads out of a job's output directory.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::AssetError;

/// First file (in name order) below `base` with extension `ext` (no dot).
fn find_by_extension(base: &Path, ext: &str) -> Result<Option<PathBuf>, AssetError> {
    if !base.exists() {
        return Ok(None);
    }

    for entry in WalkDir::new(base).sort_by_file_name() {
        let entry = entry.map_err(AssetError::Walk)?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|e| e.to_str()) == Some(ext)
        {
            return Ok(Some(entry.into_path()));
        }
    }
    Ok(None)
}

/// Contents of the first file below `base` with extension `ext`.
pub fn read_by_extension(base: &Path, ext: &str) -> Result<Option<Vec<u8>>, AssetError> {
    match find_by_extension(base, ext)? {
        Some(path) => fs::read(&path)
            .map(Some)
            .map_err(|e| AssetError::io(&path, e)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_nested_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("build")).unwrap();
        fs::write(dir.path().join("build/main.pdf"), b"%PDF").unwrap();
        fs::write(dir.path().join("main.log"), b"log").unwrap();

        assert_eq!(
            read_by_extension(dir.path(), "pdf").unwrap(),
            Some(b"%PDF".to_vec())
        );
        assert_eq!(read_by_extension(dir.path(), "aux").unwrap(), None);
    }

    #[test]
    fn missing_dir_has_no_files() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_by_extension(&dir.path().join("output"), "pdf").unwrap(), None);
    }
}
