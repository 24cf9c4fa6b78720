//! Stimuli and the sources that produce them.
//!
//! A source is read once at batch start. Local image files are only opened
//! when their request is built, so one unreadable file fails one stimulus and
//! not the whole load.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::warn;
use walkdir::WalkDir;

/// Extensions picked up by [`load_directory`].
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp"];

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("csv error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("column '{column}' not found in {path} (have: {available})")]
    MissingColumn {
        column: String,
        path: PathBuf,
        available: String,
    },
}

impl SourceError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }
}

/// What gets shown to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Remote image the provider fetches itself.
    ImageUrl(String),
    /// Image bytes already base64-encoded.
    InlineImage { media_type: String, data: String },
    /// Image on local disk, encoded when the request is built.
    LocalImage { path: PathBuf, media_type: String },
    /// Text passage.
    Text(String),
}

/// One unit to be rated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stimulus {
    pub id: String,
    pub payload: Payload,
}

impl Stimulus {
    pub fn image_url(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id: url.clone(),
            payload: Payload::ImageUrl(url),
        }
    }

    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: Payload::Text(text.into()),
        }
    }

    pub fn local_image(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let media_type = media_type_for(&path);
        Self {
            id: id.into(),
            payload: Payload::LocalImage { path, media_type },
        }
    }

    pub fn modality(&self) -> Modality {
        match self.payload {
            Payload::ImageUrl(_) => Modality::ImageUrl,
            Payload::InlineImage { .. } | Payload::LocalImage { .. } => Modality::ImageLocal,
            Payload::Text(_) => Modality::Text,
        }
    }
}

/// Kind of data being rated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Text,
    ImageUrl,
    ImageLocal,
}

/// Media type from the file extension; unknown extensions fall back to PNG.
pub fn media_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first()
        .filter(|m| m.type_() == mime_guess::mime::IMAGE)
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "image/png".to_string())
}

/// Read and base64-encode a local image into a `data:` URI.
pub fn encode_data_uri(path: &Path, media_type: &str) -> Result<String, SourceError> {
    let bytes = std::fs::read(path).map_err(|e| SourceError::io(path, e))?;
    Ok(format!("data:{media_type};base64,{}", STANDARD.encode(bytes)))
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

// =============================================================================
// Sources
// =============================================================================

/// Where stimuli come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSpec {
    /// Fixed list of image URLs.
    Urls { urls: Vec<String> },
    /// Text file with one image URL per line.
    UrlFile { path: PathBuf },
    /// CSV of image file names joined onto a base URL.
    ImageTable {
        path: PathBuf,
        id_column: String,
        base_url: String,
    },
    /// CSV of text passages.
    TextTable {
        path: PathBuf,
        id_column: String,
        text_column: String,
    },
    /// Folder of local images.
    Directory { path: PathBuf },
}

impl SourceSpec {
    /// Read the source into an ordered stimulus list.
    pub fn load(&self) -> Result<Vec<Stimulus>, SourceError> {
        match self {
            SourceSpec::Urls { urls } => Ok(from_urls(urls.iter().cloned())),
            SourceSpec::UrlFile { path } => load_url_file(path),
            SourceSpec::ImageTable {
                path,
                id_column,
                base_url,
            } => load_image_table(path, id_column, base_url),
            SourceSpec::TextTable {
                path,
                id_column,
                text_column,
            } => load_text_table(path, id_column, text_column),
            SourceSpec::Directory { path } => load_directory(path),
        }
    }

    pub fn modality(&self) -> Modality {
        match self {
            SourceSpec::Urls { .. } | SourceSpec::UrlFile { .. } | SourceSpec::ImageTable { .. } => {
                Modality::ImageUrl
            }
            SourceSpec::TextTable { .. } => Modality::Text,
            SourceSpec::Directory { .. } => Modality::ImageLocal,
        }
    }
}

pub fn from_urls<I, S>(urls: I) -> Vec<Stimulus>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    urls.into_iter().map(Stimulus::image_url).collect()
}

/// One URL per line; blank lines and `#` comments are skipped.
pub fn load_url_file(path: &Path) -> Result<Vec<Stimulus>, SourceError> {
    let raw = std::fs::read_to_string(path).map_err(|e| SourceError::io(path, e))?;
    Ok(from_urls(
        raw.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#')),
    ))
}

/// Non-recursive listing of image files, sorted by file name.
pub fn load_directory(dir: &Path) -> Result<Vec<Stimulus>, SourceError> {
    let mut stimuli = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_file() || !has_image_extension(entry.path()) {
            continue;
        }
        let id = entry.file_name().to_string_lossy().into_owned();
        stimuli.push(Stimulus::local_image(id, entry.path()));
    }
    Ok(stimuli)
}

fn open_table(path: &Path) -> Result<csv::Reader<std::fs::File>, SourceError> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(|e| SourceError::csv(path, e))
}

fn column_index(
    reader: &mut csv::Reader<std::fs::File>,
    path: &Path,
    column: &str,
) -> Result<usize, SourceError> {
    let headers = reader.headers().map_err(|e| SourceError::csv(path, e))?;
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| SourceError::MissingColumn {
            column: column.to_string(),
            path: path.to_path_buf(),
            available: headers.iter().collect::<Vec<_>>().join(", "),
        })
}

/// Image file names from a named CSV column, each appended to `base_url`.
pub fn load_image_table(
    path: &Path,
    id_column: &str,
    base_url: &str,
) -> Result<Vec<Stimulus>, SourceError> {
    let mut reader = open_table(path)?;
    let id_idx = column_index(&mut reader, path, id_column)?;

    let mut stimuli = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| SourceError::csv(path, e))?;
        let name = record.get(id_idx).unwrap_or("").trim();
        if name.is_empty() {
            continue;
        }
        stimuli.push(Stimulus {
            id: name.to_string(),
            payload: Payload::ImageUrl(format!("{base_url}{name}")),
        });
    }
    Ok(stimuli)
}

/// Text passages from a CSV with named id and text columns.
pub fn load_text_table(
    path: &Path,
    id_column: &str,
    text_column: &str,
) -> Result<Vec<Stimulus>, SourceError> {
    let mut reader = open_table(path)?;
    let id_idx = column_index(&mut reader, path, id_column)?;
    let text_idx = column_index(&mut reader, path, text_column)?;

    let mut stimuli = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| SourceError::csv(path, e))?;
        let id = record.get(id_idx).unwrap_or("").trim();
        if id.is_empty() {
            continue;
        }
        let text = record.get(text_idx).unwrap_or("");
        if text.trim().is_empty() {
            warn!(path = %path.display(), id, "skipping row with empty text");
            continue;
        }
        stimuli.push(Stimulus::text(id, text));
    }
    Ok(stimuli)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_type_follows_extension() {
        assert_eq!(media_type_for(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(media_type_for(Path::new("a.gif")), "image/gif");
        assert_eq!(media_type_for(Path::new("a.png")), "image/png");
        assert_eq!(media_type_for(Path::new("a.unknownext")), "image/png");
    }

    #[test]
    fn extension_filter_is_case_insensitive() {
        assert!(has_image_extension(Path::new("x.JPEG")));
        assert!(has_image_extension(Path::new("x.bmp")));
        assert!(!has_image_extension(Path::new("x.txt")));
        assert!(!has_image_extension(Path::new("README")));
    }

    #[test]
    fn url_stimulus_uses_url_as_id() {
        let s = Stimulus::image_url("https://example.com/a.jpg");
        assert_eq!(s.id, "https://example.com/a.jpg");
        assert_eq!(s.modality(), Modality::ImageUrl);
    }
}
