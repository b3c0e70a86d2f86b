use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_EXTENSION, DEFAULT_MIME_TYPE, DEFAULT_ORIGINAL_NAME};

/// A photo on the device, as produced by a capture or pick action.
///
/// The pipeline consumes it once; nothing about it is retained after the upload
/// attempt completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalAsset {
    /// Opaque local locator (`file://` URI or a plain path)
    pub uri: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl LocalAsset {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            file_name: None,
            mime_type: None,
            width: None,
            height: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Content type used for the storage write and the metadata row.
    pub fn content_type(&self) -> &str {
        self.mime_type
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(DEFAULT_MIME_TYPE)
    }

    /// Lower-cased suffix after the last `.` of the file name, or `jpg`.
    pub fn extension(&self) -> String {
        self.file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.trim())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
    }

    pub fn original_name(&self) -> &str {
        self.file_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(DEFAULT_ORIGINAL_NAME)
    }
}
