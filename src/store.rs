use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tempfile::{Builder, NamedTempFile};

use crate::domain::SourceKey;
use crate::error::SdoError;

pub const FILE_PREFIX: &str = "SDO";
const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Directory receiving image files and their `.json` sidecars. Append-only.
#[derive(Debug, Clone)]
pub struct OutputDir {
    root: Utf8PathBuf,
}

impl OutputDir {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn ensure(&self) -> Result<(), SdoError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| SdoError::Filesystem(format!("create {}: {err}", self.root)))
    }

    pub fn image_path(&self, source: SourceKey, at: DateTime<Utc>, ext: &str) -> Utf8PathBuf {
        self.root.join(format!(
            "{FILE_PREFIX}_{}_{}.{ext}",
            source.as_str(),
            at.format(FILE_TIMESTAMP_FORMAT)
        ))
    }

    pub fn metadata_path(image_path: &Utf8Path) -> Utf8PathBuf {
        image_path.with_extension("json")
    }

    /// Scratch file inside the output directory so the final rename stays on one filesystem.
    pub fn temp_file(&self) -> Result<NamedTempFile, SdoError> {
        Builder::new()
            .prefix(".sdo-fetch-")
            .suffix(".part")
            .tempfile_in(self.root.as_std_path())
            .map_err(|err| SdoError::Filesystem(err.to_string()))
    }

    pub fn persist(temp: NamedTempFile, dest: &Utf8Path) -> Result<(), SdoError> {
        temp.persist(dest.as_std_path())
            .map_err(|err| SdoError::Filesystem(format!("persist {dest}: {err}")))?;
        Ok(())
    }

    pub fn write_metadata<T: Serialize>(path: &Utf8Path, metadata: &T) -> Result<(), SdoError> {
        let tmp_path = path.with_extension("json.tmp");
        let content = serde_json::to_vec_pretty(metadata)
            .map_err(|err| SdoError::Filesystem(err.to_string()))?;
        fs::write(tmp_path.as_std_path(), &content)
            .map_err(|err| SdoError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| SdoError::Filesystem(err.to_string()))?;
        Ok(())
    }
}
