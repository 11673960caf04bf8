//! Read-only virtual file trees that can be overlaid onto a job directory.

use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::ZipArchive;
use zip::result::ZipError;

use super::MaterializeError;

/// Callback receiving a file's path (relative to the tree root) and contents.
pub type FileVisitor<'a> = dyn FnMut(&Path, &[u8]) -> Result<(), MaterializeError> + 'a;

/// A tree of regular files. Directories are implied by file paths.
pub trait FileTree {
    fn visit_files(&mut self, visit: &mut FileVisitor<'_>) -> Result<(), MaterializeError>;
}

/// A tree holding exactly one file.
#[derive(Debug, Clone)]
pub struct SingleFileTree {
    name: PathBuf,
    data: Vec<u8>,
}

impl SingleFileTree {
    pub fn new(name: impl Into<PathBuf>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

impl FileTree for SingleFileTree {
    fn visit_files(&mut self, visit: &mut FileVisitor<'_>) -> Result<(), MaterializeError> {
        visit(&self.name, &self.data)
    }
}

/// The contents of an in-memory zip archive.
pub struct ZipTree {
    archive: ZipArchive<Cursor<Vec<u8>>>,
}

impl ZipTree {
    /// Open `data` as a zip archive; fails on a corrupt central directory.
    pub fn new(data: impl Into<Vec<u8>>) -> Result<Self, MaterializeError> {
        let archive = ZipArchive::new(Cursor::new(data.into()))?;
        Ok(Self { archive })
    }
}

impl FileTree for ZipTree {
    fn visit_files(&mut self, visit: &mut FileVisitor<'_>) -> Result<(), MaterializeError> {
        let mut buf = Vec::new();
        for i in 0..self.archive.len() {
            let mut entry = self.archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }

            let rel = entry
                .enclosed_name()
                .ok_or_else(|| MaterializeError::UnsafePath(entry.name().to_string()))?;

            buf.clear();
            entry.read_to_end(&mut buf).map_err(ZipError::Io)?;
            visit(&rel, &buf)?;
        }
        Ok(())
    }
}

/// A directory on disk, read recursively. Symlinks are followed.
#[derive(Debug, Clone)]
pub struct DirTree {
    root: PathBuf,
}

impl DirTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl FileTree for DirTree {
    fn visit_files(&mut self, visit: &mut FileVisitor<'_>) -> Result<(), MaterializeError> {
        for entry in WalkDir::new(&self.root).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(|source| MaterializeError::Walk {
                root: self.root.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let rel = path
                .strip_prefix(&self.root)
                .map_err(|_| MaterializeError::UnsafePath(path.display().to_string()))?;
            let data = fs::read(path).map_err(|e| MaterializeError::io(path, e))?;
            visit(rel, &data)?;
        }
        Ok(())
    }
}
