use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One captured page image, keyed by the URL the page requested it from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub source_url: String,
    /// Media type without parameters, e.g. `image/jpeg`
    pub mime_type: String,
    /// Upper-cased subtype, e.g. `JPEG`
    pub mime_subtype: String,
    pub bytes: Vec<u8>,
}

impl ImageRecord {
    /// Build a record from a raw `content-type` header value.
    ///
    /// Returns `None` when the value has no `type/subtype` shape.
    pub fn from_content_type(source_url: &str, content_type: &str, bytes: Vec<u8>) -> Option<Self> {
        let (mime_type, subtype) = split_media_type(content_type)?;
        Some(Self {
            source_url: source_url.to_string(),
            mime_subtype: subtype.to_uppercase(),
            mime_type,
            bytes,
        })
    }

    pub fn is_jpeg(&self) -> bool {
        matches!(self.mime_subtype.as_str(), "JPEG" | "JPG" | "PJPEG")
    }
}

/// Split `image/png; charset=binary` into (`image/png`, `png`).
pub fn split_media_type(content_type: &str) -> Option<(String, &str)> {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    let (kind, subtype) = essence.split_once('/')?;
    let kind = kind.trim();
    let subtype = subtype.trim();
    if kind.is_empty() || subtype.is_empty() {
        return None;
    }
    Some((format!("{}/{}", kind.to_lowercase(), subtype.to_lowercase()), subtype))
}

/// Snapshot of one rendered image element.
///
/// `width` and `height` are layout pixels as the browser rendered them,
/// not the intrinsic resolution of the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageElement {
    pub src: String,
    pub width: u32,
    pub height: u32,
}

impl PageElement {
    pub fn new(src: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            src: src.into(),
            width,
            height,
        }
    }

    pub fn orientation(&self) -> Orientation {
        Orientation::for_size(self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    /// Wider than tall is landscape; square pages stay portrait.
    pub fn for_size(width: u32, height: u32) -> Self {
        if width > height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }
}

/// Load state of an image element once it stopped loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettleState {
    Loaded,
    Errored,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettledImage {
    pub src: String,
    pub state: SettleState,
}

#[derive(Debug, Clone)]
pub struct OutputPage {
    pub width: u32,
    pub height: u32,
    pub orientation: Orientation,
    pub image: Arc<ImageRecord>,
}

/// Ordered pages ready for serialization.
#[derive(Debug, Clone, Default)]
pub struct OutputDocument {
    pub pages: Vec<OutputPage>,
}

impl OutputDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}
