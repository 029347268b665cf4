use std::collections::HashSet;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use tracing::debug;

use super::preview::{PreviewHandle, PreviewRegistry};

/// MIME type declared for files whose type cannot be determined.
pub const UNKNOWN_MIME: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Bytes(Vec<u8>),
    Path(PathBuf),
}

/// A file offered at the input boundary, before filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub name: String,
    pub mime_type: String,
    pub source: ImageSource,
}

impl CandidateFile {
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            source: ImageSource::Bytes(bytes),
        }
    }

    /// Declares the MIME type from the file extension. Nothing is read yet.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .and_then(|value| value.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self {
            name,
            mime_type: mime_for_path(&path).to_string(),
            source: ImageSource::Path(path),
        }
    }

    pub fn is_image(&self) -> bool {
        is_image_mime(&self.mime_type)
    }
}

pub fn mime_for_path(path: &Path) -> &'static str {
    ImageFormat::from_path(path)
        .map(|format| format.to_mime_type())
        .unwrap_or(UNKNOWN_MIME)
}

/// Trimmed, lower-cased form of a declared MIME type.
pub fn normalize_mime(mime_type: &str) -> String {
    mime_type.trim().to_ascii_lowercase()
}

pub fn is_image_mime(mime_type: &str) -> bool {
    normalize_mime(mime_type).starts_with("image/")
}

/// Keeps only files that declare an image type, in input order.
pub fn filter_images(files: Vec<CandidateFile>) -> Vec<CandidateFile> {
    files
        .into_iter()
        .filter(|file| {
            let keep = file.is_image();
            if !keep {
                debug!(name = %file.name, mime = %file.mime_type, "skipping non-image upload");
            }
            keep
        })
        .collect()
}

/// An accepted image together with its display handle.
#[derive(Debug)]
pub struct UploadedImage {
    name: String,
    mime_type: String,
    source: ImageSource,
    preview: PreviewHandle,
}

impl UploadedImage {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    pub fn preview_id(&self) -> &str {
        self.preview.id()
    }

    fn discard(self) {
        self.preview.release();
    }
}

/// The active upload set. File names are unique; a later file with a name
/// already present is dropped.
#[derive(Debug, Default)]
pub struct UploadSet {
    entries: Vec<UploadedImage>,
    previews: PreviewRegistry,
}

impl UploadSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(previews: PreviewRegistry) -> Self {
        Self {
            entries: Vec::new(),
            previews,
        }
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    pub fn entries(&self) -> &[UploadedImage] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.name.clone())
            .collect()
    }

    /// Filters `files` to images and appends the ones with new names.
    /// Returns how many entries were added.
    pub fn add_batch(&mut self, files: Vec<CandidateFile>) -> usize {
        let mut seen = self
            .entries
            .iter()
            .map(|entry| entry.name.clone())
            .collect::<HashSet<_>>();
        let mut added = 0;
        for file in filter_images(files) {
            if !seen.insert(file.name.clone()) {
                debug!(name = %file.name, "skipping upload with duplicate name");
                continue;
            }
            let preview = self.previews.acquire(&file.name);
            self.entries.push(UploadedImage {
                name: file.name,
                mime_type: normalize_mime(&file.mime_type),
                source: file.source,
                preview,
            });
            added += 1;
        }
        added
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let Some(idx) = self.entries.iter().position(|entry| entry.name == name) else {
            return false;
        };
        self.entries.remove(idx).discard();
        true
    }

    pub fn clear(&mut self) {
        for entry in self.entries.drain(..) {
            entry.discard();
        }
    }
}
