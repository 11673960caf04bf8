//! Overlay merge of a file tree onto a directory.

use std::io::{self, ErrorKind, Write};
use std::path::{Component, Path};

use super::MaterializeError;
use super::tree::FileTree;
use crate::storage::{create_private_dir_all, create_private_file};

/// Write every file of `source` to the same relative path under `target`.
///
/// Existing files at those paths are overwritten; files in `target` that the
/// source does not contain are left alone. Returns the number of files
/// written.
pub fn overlay(source: &mut dyn FileTree, target: &Path) -> Result<usize, MaterializeError> {
    let mut written = 0usize;

    source.visit_files(&mut |rel, data| {
        ensure_contained(rel)?;

        let dest = target.join(rel);
        if let Some(parent) = dest.parent() {
            create_private_dir_all(parent).map_err(|e| write_error(rel, parent, e))?;
        }
        create_private_file(&dest)
            .and_then(|mut file| file.write_all(data))
            .map_err(|e| write_error(rel, &dest, e))?;

        written += 1;
        Ok(())
    })?;

    Ok(written)
}

/// A file and a directory competing for the same path is a conflict within
/// the input, anything else is a filesystem failure.
fn write_error(rel: &Path, path: &Path, err: io::Error) -> MaterializeError {
    match err.kind() {
        ErrorKind::AlreadyExists | ErrorKind::NotADirectory | ErrorKind::IsADirectory => {
            MaterializeError::PathConflict(rel.display().to_string())
        }
        _ => MaterializeError::io(path, err),
    }
}

/// Reject paths that are absolute or climb out of the target.
fn ensure_contained(rel: &Path) -> Result<(), MaterializeError> {
    let mut has_name = false;
    for component in rel.components() {
        match component {
            Component::Normal(_) => has_name = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(MaterializeError::UnsafePath(rel.display().to_string()));
            }
        }
    }

    if has_name {
        Ok(())
    } else {
        Err(MaterializeError::UnsafePath(rel.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use crate::materialize::tree::{DirTree, SingleFileTree};

    #[test]
    fn creates_parents_and_overwrites() {
        let target = tempfile::tempdir().unwrap();
        fs::write(target.path().join("main.tex"), b"old").unwrap();

        let written =
            overlay(&mut SingleFileTree::new("main.tex", b"new".to_vec()), target.path()).unwrap();
        assert_eq!(written, 1);
        assert_eq!(fs::read(target.path().join("main.tex")).unwrap(), b"new");

        overlay(
            &mut SingleFileTree::new("deep/nested/file.bib", b"bib".to_vec()),
            target.path(),
        )
        .unwrap();
        assert_eq!(
            fs::read(target.path().join("deep/nested/file.bib")).unwrap(),
            b"bib"
        );
    }

    #[test]
    fn does_not_prune_existing_files() {
        let source = tempfile::tempdir().unwrap();
        fs::write(source.path().join("a.tex"), b"a").unwrap();

        let target = tempfile::tempdir().unwrap();
        fs::write(target.path().join("keep.sty"), b"keep").unwrap();

        overlay(&mut DirTree::new(source.path()), target.path()).unwrap();

        assert_eq!(fs::read(target.path().join("a.tex")).unwrap(), b"a");
        assert_eq!(fs::read(target.path().join("keep.sty")).unwrap(), b"keep");
    }

    #[test]
    fn refuses_paths_outside_target() {
        let target = tempfile::tempdir().unwrap();
        for name in ["../escape.tex", "/etc/escape.tex", ""] {
            let err = overlay(&mut SingleFileTree::new(name, b"x".to_vec()), target.path())
                .unwrap_err();
            assert!(matches!(err, MaterializeError::UnsafePath(_)), "{name}");
        }
    }

    #[test]
    fn file_and_directory_on_same_path_conflict() {
        let target = tempfile::tempdir().unwrap();
        overlay(&mut SingleFileTree::new("a", b"file".to_vec()), target.path()).unwrap();

        let err = overlay(&mut SingleFileTree::new("a/b.tex", b"x".to_vec()), target.path())
            .unwrap_err();
        assert!(matches!(err, MaterializeError::PathConflict(ref p) if p == "a/b.tex"), "{err}");

        fs::create_dir_all(target.path().join("dir/sub")).unwrap();
        let err = overlay(&mut SingleFileTree::new("dir", b"x".to_vec()), target.path())
            .unwrap_err();
        assert!(matches!(err, MaterializeError::PathConflict(_)), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn written_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let target = tempfile::tempdir().unwrap();
        overlay(
            &mut SingleFileTree::new("chapters/one.tex", b"one".to_vec()),
            target.path(),
        )
        .unwrap();

        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&target.path().join("chapters")), 0o700);
        assert_eq!(mode(&target.path().join("chapters/one.tex")), 0o600);
    }
}
