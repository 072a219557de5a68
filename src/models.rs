//! Model discovery.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// File extension of loadable models.
pub const MODEL_EXTENSION: &str = "onnx";

/// Returns true when `path` has one of `extensions` (case-insensitive, no dot).
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|want| ext.eq_ignore_ascii_case(want)))
        .unwrap_or(false)
}

/// Recursively collect files under `root` whose extension is in `extensions`.
///
/// Unreadable entries are skipped. The result is sorted so menu numbering is
/// stable between runs.
pub fn find_files(root: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::debug!("skipping unreadable entry under {}: {}", root.display(), err);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| has_extension(path, extensions))
        .collect();
    found.sort();
    found
}

/// Find every model file below `root`.
pub fn discover_models(root: &Path) -> Vec<PathBuf> {
    find_files(root, &[MODEL_EXTENSION])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn discovers_models_recursively_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("models/midas")).unwrap();
        fs::write(dir.path().join("models/midas/small.onnx"), b"").unwrap();
        fs::write(dir.path().join("b.ONNX"), b"").unwrap();
        fs::write(dir.path().join("a.onnx"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();
        fs::write(dir.path().join("weights.onnx.bak"), b"").unwrap();

        let models = discover_models(dir.path());
        let names: Vec<_> = models
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.onnx"),
                PathBuf::from("b.ONNX"),
                PathBuf::from("models/midas/small.onnx"),
            ]
        );
    }

    #[test]
    fn missing_root_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_models(&dir.path().join("absent")).is_empty());
    }
}
