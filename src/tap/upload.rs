//! Table uploads for cross-matching
//!
//! An uploaded table is registered under a name that the ADQL text can refer
//! to as `TAP_UPLOAD.<name>`.

use super::error::{Result, TapError};
use std::path::PathBuf;

/// Where the uploaded VOTable comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadSource {
    /// A VOTable file, read when the query is sent
    Path(PathBuf),
    /// An in-memory VOTable document
    Bytes(Vec<u8>),
}

/// A named table to upload alongside a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub name: String,
    pub source: UploadSource,
}

impl Upload {
    pub fn new(name: impl Into<String>, source: UploadSource) -> Self {
        Upload {
            name: name.into(),
            source,
        }
    }

    pub fn from_path(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(name, UploadSource::Path(path.into()))
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(name, UploadSource::Bytes(bytes.into()))
    }

    /// Payload bytes
    pub(crate) async fn read(&self) -> Result<Vec<u8>> {
        match &self.source {
            UploadSource::Path(path) => tokio::fs::read(path).await.map_err(|source| TapError::Io {
                path: path.clone(),
                source,
            }),
            UploadSource::Bytes(bytes) => Ok(bytes.clone()),
        }
    }
}

/// Upload names end up inside the `UPLOAD` parameter and the ADQL text, so
/// they must be plain identifiers.
fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            first.is_ascii_alphabetic() && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(TapError::Config(format!(
            "Invalid upload table name '{}': expected a letter followed by letters, digits or '_'",
            name
        )))
    }
}

/// Build the `UPLOAD` parameter value: `name,param:name` joined by `;`
pub(crate) fn upload_param(uploads: &[Upload]) -> Result<String> {
    let mut entries = Vec::with_capacity(uploads.len());
    for upload in uploads {
        validate_name(&upload.name)?;
        entries.push(format!("{0},param:{0}", upload.name));
    }
    Ok(entries.join(";"))
}
