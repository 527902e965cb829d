use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Which family of extensions an upload slot accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Pdf,
}

impl FileKind {
    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            FileKind::Image => &["png", "jpg", "jpeg"],
            FileKind::Pdf => &["pdf"],
        }
    }

    pub fn allows(&self, extension: &str) -> bool {
        let extension = extension.to_ascii_lowercase();
        self.allowed_extensions().contains(&extension.as_str())
    }
}

/// An upload as received from multipart intake: always named.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub size: usize,
    pub content: Bytes,
    pub mime_type: Option<String>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let content = content.into();
        Self {
            name: name.into(),
            size: content.len(),
            content,
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: String) -> Self {
        self.mime_type = Some(mime_type);
        self
    }
}

/// Page range for a split, 1-indexed and inclusive. `None` means "use default".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start_page: Option<i64>,
    pub end_page: Option<i64>,
}

impl PageRange {
    pub fn new(start_page: Option<i64>, end_page: Option<i64>) -> Self {
        Self {
            start_page,
            end_page,
        }
    }

    /// Build from raw form values; blank or non-numeric values fall back to the default.
    pub fn from_form(start_page: Option<&str>, end_page: Option<&str>) -> Self {
        Self {
            start_page: parse_page(start_page),
            end_page: parse_page(end_page),
        }
    }

    /// Clamp into `[1, total]` with `end >= start`. Returns `None` for an empty document.
    pub fn clamp(&self, total_pages: u32) -> Option<(u32, u32)> {
        if total_pages == 0 {
            return None;
        }
        let total = i64::from(total_pages);
        let start = self.start_page.unwrap_or(1).clamp(1, total);
        let end = self.end_page.unwrap_or(total).min(total).max(start);
        Some((start as u32, end as u32))
    }
}

fn parse_page(value: Option<&str>) -> Option<i64> {
    value.and_then(|v| v.trim().parse::<i64>().ok())
}
