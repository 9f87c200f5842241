use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use rb_annotations::{AnnotationFile, ImageAnnotation};
use rb_core::core::{DatasetItem, ImageId};

pub const DATASET_FILE: &str = "dataset.json";
pub const ANNOTATIONS_FILE: &str = "annotations.json";
pub const IMAGES_DIR: &str = "images";

/// A dataset directory: `dataset.json`, an `images/` subdirectory, and the
/// optional `annotations.json` written by this tool.
///
/// Image paths inside dataset items are relative to this directory.
#[derive(Debug, Clone)]
pub struct DatasetDir {
    root: PathBuf,
}

impl DatasetDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.root.join(DATASET_FILE)
    }

    pub fn annotations_path(&self) -> PathBuf {
        self.root.join(ANNOTATIONS_FILE)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join(IMAGES_DIR)
    }

    pub fn image_path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.dataset_path().is_file() {
            bail!("{DATASET_FILE} not found in {}", self.root.display());
        }
        if !self.images_dir().is_dir() {
            bail!("{IMAGES_DIR} directory not found in {}", self.root.display());
        }
        Ok(())
    }

    pub fn read_dataset(&self) -> Result<Vec<DatasetItem>, anyhow::Error> {
        let path = self.dataset_path();
        let raw =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let items: Vec<DatasetItem> =
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        Ok(items)
    }

    /// Previously saved annotations, `None` when the file does not exist.
    pub fn load_annotations(
        &self,
    ) -> Result<Option<HashMap<ImageId, ImageAnnotation>>, anyhow::Error> {
        let path = self.annotations_path();
        if !path.is_file() {
            return Ok(None);
        }
        let raw =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let file =
            AnnotationFile::from_json(&raw).with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(file.annotations))
    }

    pub fn save_annotations(
        &self,
        annotations: HashMap<ImageId, ImageAnnotation>,
    ) -> Result<(), anyhow::Error> {
        let path = self.annotations_path();
        let json = AnnotationFile::new(annotations).to_json()?;
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Write the exported dataset next to the source files and return its
    /// path.
    pub fn write_export(
        &self,
        items: &[DatasetItem],
        filename: &str,
    ) -> Result<PathBuf, anyhow::Error> {
        let path = self.root.join(filename);
        let json = serde_json::to_string_pretty(items)?;
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_join_under_root() {
        let dir = DatasetDir::new("/data/session");
        assert_eq!(dir.dataset_path(), PathBuf::from("/data/session/dataset.json"));
        assert_eq!(
            dir.annotations_path(),
            PathBuf::from("/data/session/annotations.json")
        );
        assert_eq!(dir.images_dir(), PathBuf::from("/data/session/images"));
        assert_eq!(
            dir.image_path("images/img_0001.jpg"),
            PathBuf::from("/data/session/images/img_0001.jpg")
        );
    }

    #[test]
    fn test_validate_missing_dataset() {
        let dir = DatasetDir::new("/definitely/not/here");
        let err = dir.validate().unwrap_err();
        assert!(err.to_string().contains("dataset.json not found"));
    }

    #[test]
    fn test_load_annotations_missing_file_is_none() {
        let dir = DatasetDir::new("/definitely/not/here");
        assert!(dir.load_annotations().unwrap().is_none());
    }
}
