use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Trailing path segment of every page image route.
pub const IMAGE_SEGMENT: &str = "image.png";

#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct PageMetadata {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Page {
    pub locale: String,
    pub slugs: Vec<String>,
    pub data: PageMetadata,
    /// Source file, relative to the content directory.
    pub path: PathBuf,
}

impl Page {
    /// Path segments of this page's OG image route, relative to `/og/docs`.
    pub fn image_segments(&self) -> Vec<String> {
        let mut segments = self.slugs.clone();
        segments.push(IMAGE_SEGMENT.to_string());
        segments
    }

    pub fn image_path(&self) -> String { format!("/og/docs/{}", self.image_segments().join("/")) }
}

/// One pre-rendered image route.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct StaticParams {
    pub lang: String,
    pub slug: Vec<String>,
}
