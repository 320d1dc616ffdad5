use std::fmt;

use serde::{Deserialize, Serialize};

pub const MANIFEST_FILE: &str = "manifest.yml";

/// `manifest.yml` shipped at the root of a media bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaManifest {
    #[serde(default)]
    pub medias: Vec<MediaEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaEntry {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub credits: String,
    #[serde(default)]
    pub kind: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Media file, relative to the bundle root.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Image,
    Pdf,
    Text,
    App,
    #[default]
    #[serde(other)]
    Other,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Image => "image",
            MediaKind::Pdf => "pdf",
            MediaKind::Text => "text",
            MediaKind::App => "app",
            MediaKind::Other => "other",
        };
        f.write_str(name)
    }
}

impl MediaManifest {
    pub fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
        let manifest: Option<Self> = serde_yaml::from_str(contents)?;
        Ok(manifest.unwrap_or_default())
    }

    /// Every archive-relative file the manifest points at.
    pub fn referenced_files(&self) -> impl Iterator<Item = &str> {
        self.medias.iter().flat_map(|entry| {
            std::iter::once(entry.path.as_str()).chain(entry.preview.as_deref())
        })
    }
}
