use walkdir::WalkDir;
use std::path::{Path, PathBuf};
use crate::error::{AssistError, Result};

/// Extensions the ingest pipeline can reduce to plain text.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["md", "markdown", "txt", "html", "htm"];

/// A discovered content file
#[derive(Debug, Clone)]
pub struct FileMetadata {
    /// Path relative to the content root with `/` separators; used as the source id.
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub extension: String,
    pub file_size: u64,
    pub modified: std::time::SystemTime,
}

pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Describe one file under `root`.
pub fn file_metadata(root: &Path, path: &Path) -> Result<FileMetadata> {
    let metadata = std::fs::metadata(path)?;
    let relative_path = path
        .strip_prefix(root)
        .map_err(|_| AssistError::InvalidInput(
            format!("{} is not under {}", path.display(), root.display())
        ))?
        .to_string_lossy()
        .replace('\\', "/");
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();

    Ok(FileMetadata {
        relative_path,
        absolute_path: path.to_path_buf(),
        extension,
        file_size: metadata.len(),
        modified: metadata.modified()?,
    })
}

/// Discover all content pages under `root`.
///
/// Recursively walks the directory tree, keeping Markdown, plain text and
/// HTML pages. Hidden directories (`.git`, `.cache`) are not entered. Results
/// are sorted by relative path so ingestion order is stable.
pub fn discover_files(root: &Path) -> Result<Vec<FileMetadata>> {
    if !root.is_dir() {
        return Err(AssistError::InvalidInput(format!(
            "content folder {} is not a directory",
            root.display()
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.')
        })
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || !is_supported(path) {
            continue;
        }
        files.push(file_metadata(root, path)?);
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    log::info!("Discovered {} files in {}", files.len(), root.display());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use std::fs;

    #[test]
    fn test_discover_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("missions/insat")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("index.html"), "<html><body>MOSDAC</body></html>").unwrap();
        fs::write(root.join("faq.txt"), "plain text note").unwrap();
        fs::write(root.join("missions/insat/insat3d.md"), "# INSAT-3D").unwrap();
        fs::write(root.join("missions/logo.png"), b"\x89PNG\r\n\x1a\n").unwrap();
        fs::write(root.join(".git/HEAD.txt"), "ref").unwrap();

        let files = discover_files(root).unwrap();

        let paths: Vec<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["faq.txt", "index.html", "missions/insat/insat3d.md"]);
        assert_eq!(files[2].extension, "md");
    }

    #[test]
    fn test_discover_files_empty() {
        let temp_dir = TempDir::new().unwrap();
        let files = discover_files(temp_dir.path()).unwrap();
        assert_eq!(files.len(), 0);
    }

    #[test]
    fn test_missing_root_is_error() {
        let temp_dir = TempDir::new().unwrap();
        assert!(discover_files(&temp_dir.path().join("absent")).is_err());
    }
}
