//! Limits and storage settings for multipart decoding.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::protocol::Charset;

/// Settings for [`MultipartReader`](crate::MultipartReader).
///
/// Every field has a default, so a configuration file only needs the keys it
/// changes:
///
/// ```
/// use micro_multipart::MultipartConfig;
///
/// let config: MultipartConfig = serde_json::from_str(r#"{ "max_parts": 16, "streaming": true }"#).unwrap();
/// assert_eq!(config.max_parts(), Some(16));
/// assert_eq!(config.max_headers_size(), 10 * 1024);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MultipartConfig {
    max_in_memory_size: Option<usize>,
    max_headers_size: usize,
    max_disk_usage_per_part: Option<u64>,
    max_parts: Option<usize>,
    streaming: bool,
    file_storage_directory: PathBuf,
    headers_charset: Charset,
}

pub const DEFAULT_MAX_IN_MEMORY_SIZE: usize = 256 * 1024;
pub const DEFAULT_MAX_HEADERS_SIZE: usize = 10 * 1024;

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            max_in_memory_size: Some(DEFAULT_MAX_IN_MEMORY_SIZE),
            max_headers_size: DEFAULT_MAX_HEADERS_SIZE,
            max_disk_usage_per_part: None,
            max_parts: None,
            streaming: false,
            file_storage_directory: std::env::temp_dir().join("micro-multipart"),
            headers_charset: Charset::Utf8,
        }
    }
}

impl MultipartConfig {
    pub fn new() -> Self {
        Default::default()
    }

    /// Bytes of one part kept in memory before it is spilled to a file, or
    /// rejected if it is a form field. `None` means no limit.
    pub fn with_max_in_memory_size(mut self, max_in_memory_size: Option<usize>) -> Self {
        self.max_in_memory_size = max_in_memory_size;
        self
    }

    /// Bytes of one part's header block
    pub fn with_max_headers_size(mut self, max_headers_size: usize) -> Self {
        self.max_headers_size = max_headers_size;
        self
    }

    pub fn with_max_disk_usage_per_part(mut self, max_disk_usage_per_part: Option<u64>) -> Self {
        self.max_disk_usage_per_part = max_disk_usage_per_part;
        self
    }

    pub fn with_max_parts(mut self, max_parts: Option<usize>) -> Self {
        self.max_parts = max_parts;
        self
    }

    /// Hand out file and data parts with live bodies instead of buffering them
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Directory for spilled parts, created when the first file is needed
    pub fn with_file_storage_directory<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.file_storage_directory = dir.into();
        self
    }

    pub fn with_headers_charset(mut self, headers_charset: Charset) -> Self {
        self.headers_charset = headers_charset;
        self
    }

    #[inline]
    pub fn max_in_memory_size(&self) -> Option<usize> {
        self.max_in_memory_size
    }

    #[inline]
    pub fn max_headers_size(&self) -> usize {
        self.max_headers_size
    }

    #[inline]
    pub fn max_disk_usage_per_part(&self) -> Option<u64> {
        self.max_disk_usage_per_part
    }

    #[inline]
    pub fn max_parts(&self) -> Option<usize> {
        self.max_parts
    }

    #[inline]
    pub fn streaming(&self) -> bool {
        self.streaming
    }

    #[inline]
    pub fn file_storage_directory(&self) -> &Path {
        &self.file_storage_directory
    }

    #[inline]
    pub fn headers_charset(&self) -> Charset {
        self.headers_charset
    }
}
