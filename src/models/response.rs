use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Returned by every conversion route: a reference to the generated file.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversionResponse {
    pub success: bool,
    pub message: String,
    pub filename: String,
    pub download_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfInfo {
    pub pages: usize,
    pub metadata: BTreeMap<String, String>,
    pub size_bytes: u64,
    pub size_mb: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PdfInfoResponse {
    pub success: bool,
    pub info: PdfInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageStats {
    pub exists: bool,
    pub file_count: usize,
    pub total_size_mb: f64,
    pub folder_path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ConversionResponse {
    pub fn new(message: impl Into<String>, filename: String) -> Self {
        let download_url = format!("/convert/download/{}", filename);
        Self {
            success: true,
            message: message.into(),
            filename,
            download_url,
        }
    }
}

impl PdfInfo {
    pub fn new(pages: usize, metadata: BTreeMap<String, String>, size_bytes: u64) -> Self {
        Self {
            pages,
            metadata,
            size_bytes,
            size_mb: bytes_to_mb(size_bytes),
        }
    }
}

impl StorageStats {
    pub fn missing(folder_path: String) -> Self {
        Self {
            exists: false,
            file_count: 0,
            total_size_mb: 0.0,
            folder_path,
        }
    }
}

/// Megabytes rounded to two decimals.
pub fn bytes_to_mb(bytes: u64) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}
