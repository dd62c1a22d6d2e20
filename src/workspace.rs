use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Root of the on-disk artifact tree shared by every pipeline stage.
///
/// Ingestion writes per-document exports into the root, page and picture
/// renders into `extracted_images/`, and later stages read those same
/// paths back. The layout is the contract between otherwise independent
/// batch runs.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Resolve the workspace root from, in order of priority:
    /// 1. An explicit path (from --output-dir)
    /// 2. The DOCRAG_OUTPUT_DIR environment variable
    /// 3. `./outputs` relative to the working directory
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = if let Some(path) = explicit {
            path.to_path_buf()
        } else if let Ok(val) = std::env::var("DOCRAG_OUTPUT_DIR") {
            PathBuf::from(val)
        } else {
            PathBuf::from("outputs")
        };

        std::fs::create_dir_all(&root)
            .map_err(|_| Error::OutputDir(root.clone()))?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Page renders and embedded pictures land here.
    pub fn images_dir(&self) -> Result<PathBuf> {
        self.ensure_subdir("extracted_images")
    }

    /// Source directory for raw tabular exports awaiting canonicalization.
    pub fn tables_dir(&self) -> Result<PathBuf> {
        self.ensure_subdir("extracted_tables")
    }

    /// Canonicalized row-record JSON files.
    pub fn tables_json_dir(&self) -> Result<PathBuf> {
        self.ensure_subdir("tables_json")
    }

    pub fn captions_file(&self) -> PathBuf {
        self.root.join("image_captions.json")
    }

    pub fn bundle_file(&self) -> PathBuf {
        self.root.join("index.json")
    }

    fn ensure_subdir(&self, name: &str) -> Result<PathBuf> {
        let path = self.root.join(name);
        std::fs::create_dir_all(&path)
            .map_err(|_| Error::OutputDir(path.clone()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_with_explicit_path() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::resolve(Some(tmp.path())).unwrap();

        assert_eq!(ws.root(), tmp.path());
        assert_eq!(ws.captions_file(), tmp.path().join("image_captions.json"));
        assert_eq!(ws.bundle_file(), tmp.path().join("index.json"));
    }

    #[test]
    fn subdirs_are_created() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::resolve(Some(tmp.path())).unwrap();

        let images = ws.images_dir().unwrap();
        let tables = ws.tables_dir().unwrap();
        let tables_json = ws.tables_json_dir().unwrap();

        assert!(images.is_dir());
        assert!(tables.is_dir());
        assert!(tables_json.is_dir());
        assert_eq!(images, tmp.path().join("extracted_images"));
        assert_eq!(tables, tmp.path().join("extracted_tables"));
        assert_eq!(tables_json, tmp.path().join("tables_json"));
    }

    #[test]
    fn resolve_creates_missing_root() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("deep").join("outputs");
        let ws = Workspace::resolve(Some(&nested)).unwrap();

        assert!(ws.root().is_dir());
    }
}
