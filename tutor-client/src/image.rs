//! Image attachments sent to the image endpoint as base64 data URLs.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tutor_common::util::format_bytes;
use tutor_common::{Error, Result, ResultExt};

/// Default size limit (5 MiB).
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

/// An image ready to embed in a request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    filename: String,
    mime: &'static str,
    data_url: String,
}

impl ImageAttachment {
    /// Read `path` to completion and encode it.
    pub async fn load(path: &Path, max_bytes: u64) -> Result<Self> {
        let metadata = tokio::fs::metadata(path)
            .await
            .context(format!("Failed to read image file {}", path.display()))?;
        if metadata.len() > max_bytes {
            return Err(Error::invalid(format!(
                "Image size must not exceed {} ({} given)",
                format_bytes(max_bytes),
                format_bytes(metadata.len())
            )));
        }

        let bytes = tokio::fs::read(path)
            .await
            .context(format!("Failed to read image file {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        Self::from_bytes(filename, &bytes, max_bytes)
    }

    /// Validate and encode in-memory image bytes.
    pub fn from_bytes(filename: impl Into<String>, bytes: &[u8], max_bytes: u64) -> Result<Self> {
        let filename = filename.into();
        if bytes.len() as u64 > max_bytes {
            return Err(Error::invalid(format!(
                "Image size must not exceed {}",
                format_bytes(max_bytes)
            )));
        }
        let mime = sniff_mime(bytes)
            .or_else(|| mime_from_extension(&filename))
            .ok_or_else(|| {
                Error::invalid("Please select an image file (JPEG, PNG, GIF, etc.)")
            })?;

        tracing::info!(
            filename = %filename,
            mime,
            size = %format_bytes(bytes.len() as u64),
            "Image attached"
        );

        Ok(Self {
            data_url: format!("data:{mime};base64,{}", STANDARD.encode(bytes)),
            filename,
            mime,
        })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn mime(&self) -> &str {
        self.mime
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xFF\xD8\xFF", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"BM", "image/bmp"),
    ];
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    SIGNATURES
        .iter()
        .find(|(magic, _)| bytes.starts_with(magic))
        .map(|(_, mime)| *mime)
}

fn mime_from_extension(filename: &str) -> Option<&'static str> {
    let ext = Path::new(filename).extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn encodes_png_as_data_url() {
        let image = ImageAttachment::from_bytes("diagram.png", PNG_HEADER, 1024).unwrap();
        assert_eq!(image.mime(), "image/png");
        assert_eq!(image.filename(), "diagram.png");
        assert!(image.data_url().starts_with("data:image/png;base64,iVBORw0KGgo"));
    }

    #[test]
    fn content_wins_over_extension() {
        let image = ImageAttachment::from_bytes("photo.png", b"\xFF\xD8\xFF\xE0rest", 1024).unwrap();
        assert_eq!(image.mime(), "image/jpeg");
    }

    #[test]
    fn falls_back_to_extension() {
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg"/>"#;
        let image = ImageAttachment::from_bytes("graph.SVG", svg, 1024).unwrap();
        assert_eq!(image.mime(), "image/svg+xml");
    }

    #[test]
    fn rejects_non_images() {
        let err = ImageAttachment::from_bytes("notes.txt", b"hello", 1024).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn rejects_oversized() {
        let err = ImageAttachment::from_bytes("big.png", PNG_HEADER, 4).unwrap_err();
        assert!(err.to_string().contains("must not exceed"));
    }

    #[tokio::test]
    async fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triangle.gif");
        std::fs::write(&path, b"GIF89a\x01\x00\x01\x00").unwrap();

        let image = ImageAttachment::load(&path, DEFAULT_MAX_IMAGE_BYTES).await.unwrap();
        assert_eq!(image.filename(), "triangle.gif");
        assert_eq!(image.mime(), "image/gif");
    }

    #[tokio::test]
    async fn load_checks_size_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.png");
        std::fs::write(&path, vec![0u8; 64]).unwrap();

        let err = ImageAttachment::load(&path, 32).await.unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let err = ImageAttachment::load(Path::new("/nonexistent/x.png"), 1024)
            .await
            .unwrap_err();
        assert!(!err.is_invalid_input());
    }
}
