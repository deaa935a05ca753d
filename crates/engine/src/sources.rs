// Source enumeration: turn the caller's input selection into a list of files.

use std::path::{Path, PathBuf};

use listmerge_io::SourceKind;
use walkdir::WalkDir;

use crate::error::MergeError;
use crate::log::LogSink;

pub fn is_supported(path: &Path) -> bool {
    SourceKind::from_path(path).is_some()
}

/// Expand the input selection into the files to read.
///
/// A non-empty `explicit` list is used exactly as given. Otherwise `fallback_root`
/// is inspected: a supported file is used alone, a directory is walked
/// recursively (in file-name order) keeping only supported files.
pub fn enumerate(
    explicit: &[PathBuf],
    fallback_root: Option<&Path>,
    log: &dyn LogSink,
) -> Result<Vec<PathBuf>, MergeError> {
    if !explicit.is_empty() {
        return Ok(explicit.to_vec());
    }

    let Some(root) = fallback_root else {
        return Err(MergeError::NoSources);
    };

    let meta = std::fs::metadata(root).map_err(|e| MergeError::FileAccess {
        path: root.to_path_buf(),
        message: e.to_string(),
    })?;

    if !meta.is_dir() {
        if is_supported(root) {
            return Ok(vec![root.to_path_buf()]);
        }
        return Err(MergeError::UnsupportedFileType {
            path: root.to_path_buf(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| root.display().to_string());
                log.warn(format!("Error accessing file: {path} - {e}"));
                continue;
            }
        };

        if entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        if is_supported(path) {
            files.push(path.to_path_buf());
        } else {
            log.info(format!("Skipping unsupported file type: {}", path.display()));
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MemorySink;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn explicit_list_is_used_verbatim() {
        let log = MemorySink::new();
        let explicit = vec![PathBuf::from("b.txt"), PathBuf::from("a.csv")];
        let files = enumerate(&explicit, Some(Path::new("/ignored")), &log).unwrap();
        assert_eq!(files, explicit);
    }

    #[test]
    fn directory_keeps_only_supported_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "hi").unwrap();
        fs::write(dir.path().join("data.csv"), "Name,Email\n").unwrap();

        let log = MemorySink::new();
        let files = enumerate(&[], Some(dir.path()), &log).unwrap();
        assert_eq!(files, vec![dir.path().join("data.csv")]);
        assert!(log.contains("Skipping unsupported file type"));
        assert!(log.contains("notes.txt"));
    }

    #[test]
    fn directory_walk_is_recursive_and_ordered() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub/deeper")).unwrap();
        fs::write(dir.path().join("z.CSV"), "").unwrap();
        fs::write(dir.path().join("sub/b.xlsx"), "").unwrap();
        fs::write(dir.path().join("sub/deeper/a.csv"), "").unwrap();
        fs::write(dir.path().join("a.csv"), "").unwrap();

        let log = MemorySink::new();
        let files = enumerate(&[], Some(dir.path()), &log).unwrap();
        assert_eq!(
            files,
            vec![
                dir.path().join("a.csv"),
                dir.path().join("sub/b.xlsx"),
                dir.path().join("sub/deeper/a.csv"),
                dir.path().join("z.CSV"),
            ]
        );
    }

    #[test]
    fn single_file_root() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("one.csv");
        let txt = dir.path().join("one.txt");
        fs::write(&csv, "").unwrap();
        fs::write(&txt, "").unwrap();

        let log = MemorySink::new();
        assert_eq!(enumerate(&[], Some(&csv), &log).unwrap(), vec![csv.clone()]);
        assert!(matches!(
            enumerate(&[], Some(&txt), &log).unwrap_err(),
            MergeError::UnsupportedFileType { .. }
        ));
    }

    #[test]
    fn missing_root_is_file_access_error() {
        let dir = tempdir().unwrap();
        let log = MemorySink::new();
        let err = enumerate(&[], Some(&dir.path().join("nope")), &log).unwrap_err();
        assert!(matches!(err, MergeError::FileAccess { .. }));
        assert_eq!(enumerate(&[], None, &log).unwrap_err(), MergeError::NoSources);
    }
}
