use async_graphql::SimpleObject;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raster formats the transport accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
        }
    }

    pub fn from_format(format: ::image::ImageFormat) -> Option<Self> {
        match format {
            ::image::ImageFormat::Jpeg => Some(ImageKind::Jpeg),
            ::image::ImageFormat::Png => Some(ImageKind::Png),
            _ => None,
        }
    }
}

/// One file as received from a client, before validation.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub original_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl IncomingFile {
    pub fn new(original_name: impl Into<String>, content_type: Option<&str>, data: Vec<u8>) -> Self {
        Self {
            original_name: original_name.into(),
            content_type: content_type.map(|c| c.to_string()),
            data,
        }
    }
}

/// A file accepted by validation, ready to persist.
#[derive(Debug, Clone)]
pub struct ValidatedFile {
    pub original_name: String,
    pub kind: ImageKind,
    pub data: Vec<u8>,
}

#[derive(SimpleObject, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredImage {
    /// Generated name on disk, never the client-supplied one
    pub filename: String,
    pub original_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub sha256: String,
    pub url: String,
    #[graphql(skip)]
    #[serde(skip)]
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Annotation {
    /// `[x1, y1, x2, y2]` in image pixels
    #[serde(rename = "bbox")]
    BoundingBox { coordinates: [f64; 4] },
    #[serde(rename = "polygon")]
    Polygon { points: Vec<[f64; 2]> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedImage {
    pub id: String,
    pub url: String,
    pub annotations: Vec<Annotation>,
    /// Label set, strongest label first
    pub classification: Vec<String>,
}

pub fn image_id(index: usize) -> String {
    format!("img-{}", index)
}
