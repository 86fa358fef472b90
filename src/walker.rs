use crate::error::AppError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Source photos directly inside `directory` whose extension is allowed,
/// sorted by path.
pub fn find_source_images(
    directory: &Path,
    allowed_extensions: &HashSet<String>,
) -> Result<Vec<PathBuf>, AppError> {
    log::info!("Starting file discovery in {:?}", directory);
    log::debug!("Configured allowed extensions: {:?}", allowed_extensions);

    let mut found = Vec::new();
    for entry in WalkDir::new(directory).min_depth(1).max_depth(1) {
        let entry = entry?;
        if entry.file_type().is_file() {
            let path = entry.path();
            log::trace!("Discovered file: {:?}", path);
            if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
                if allowed_extensions.contains(&ext.to_lowercase()) {
                    log::debug!("Found source image: {:?}", path);
                    found.push(path.to_path_buf());
                } else {
                    log::trace!("Skipping file due to unsupported extension: {:?}", path);
                }
            } else {
                log::trace!("Skipping file with no extension: {:?}", path);
            }
        } else {
            log::trace!("Skipping non-file entry: {:?}", entry.path());
        }
    }

    found.sort();
    log::info!("File discovery complete: {} images.", found.len());
    Ok(found)
}

/// Stems of every photo that already has a `{stem}-thumbnail.{ext}` variant
/// in `directory`, sorted.
pub fn find_converted_stems(directory: &Path, extension: &str) -> Result<Vec<String>, AppError> {
    let suffix = format!("-thumbnail.{}", extension);
    let mut stems = Vec::new();

    for entry in WalkDir::new(directory).min_depth(1).max_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(stem) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.strip_suffix(&suffix))
        {
            stems.push(stem.to_string());
        }
    }

    stems.sort();
    log::debug!("Found {} converted images in {:?}", stems.len(), directory);
    Ok(stems)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn extensions() -> HashSet<String> {
        ["dng", "jpg"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn finds_allowed_extensions_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.DNG"), b"").unwrap();
        fs::write(dir.path().join("a.jpg"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();
        fs::write(dir.path().join("README"), b"").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.dng"), b"").unwrap();

        let found = find_source_images(dir.path(), &extensions()).unwrap();

        assert_eq!(
            found,
            vec![dir.path().join("a.jpg"), dir.path().join("b.DNG")]
        );
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = find_source_images(&dir.path().join("absent"), &extensions());
        assert!(matches!(result, Err(AppError::Walkdir(_))));
    }

    #[test]
    fn converted_stems_come_from_thumbnails() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "R002-thumbnail.avif",
            "R002-display.avif",
            "R001-thumbnail.avif",
            "R001-metadata.json",
            "R003-thumbnail.webp",
        ] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let stems = find_converted_stems(dir.path(), "avif").unwrap();
        assert_eq!(stems, vec!["R001", "R002"]);
    }
}
