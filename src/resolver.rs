//! Attachment resolution: turning a share payload into decoded content.
//!
//! Representations are attempted in a fixed priority order. A failed decode
//! never aborts the run outright; the resolver falls through to the next
//! advertised representation, with two recovery paths on top:
//!
//! - bytes that fail to decode are redirected to an advertised
//!   file-reference representation (a generic "data" item is frequently a
//!   pointer to a file rather than the file itself), and
//! - undecodable bytes whose header carries a known raster signature are
//!   retried through the format-specific decoder before giving up.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Command;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};

use crate::error::ResolutionError;
use crate::payload::{Representation, RepresentationKind, SharePayload};

/// Largest dimension of any decoded or rendered image. Bounds memory for
/// oversized camera shots and high-DPI document renders.
pub const MAX_DIMENSION: u32 = 2048;

/// Resolution priority. Raw bytes are the last resort among decodable
/// forms; plain text needs no decoding and never fails, so it goes last.
const PRIORITY: [RepresentationKind; 6] = [
    RepresentationKind::Image,
    RepresentationKind::FileReference,
    RepresentationKind::GenericLocator,
    RepresentationKind::Document,
    RepresentationKind::RawBytes,
    RepresentationKind::PlainText,
];

/// Concrete content produced by resolution. Never mutated after creation.
#[derive(Debug, Clone)]
pub enum DecodedContent {
    /// A decoded raster image plus its original encoded bytes.
    Image { bytes: Vec<u8>, pixels: DynamicImage },
    /// A document reduced to a rendered image of its first page.
    Document { bytes: Vec<u8>, rendered: DynamicImage },
    /// Text shared directly; skips OCR entirely.
    Text(String),
}

impl DecodedContent {
    /// Pixel data for OCR, when this content is visual.
    pub fn pixels(&self) -> Option<&DynamicImage> {
        match self {
            Self::Image { pixels, .. } => Some(pixels),
            Self::Document { rendered, .. } => Some(rendered),
            Self::Text(_) => None,
        }
    }

    /// Displayable encoded image bytes for the draft record.
    ///
    /// Images keep their original encoding; document renders are encoded
    /// to PNG. Text content has no image form.
    pub fn encoded_image_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Self::Image { bytes, .. } => Some(bytes.clone()),
            Self::Document { rendered, .. } => {
                let mut out = Cursor::new(Vec::new());
                rendered
                    .write_to(&mut out, ImageFormat::Png)
                    .ok()
                    .map(|_| out.into_inner())
            }
            Self::Text(_) => None,
        }
    }
}

/// Resolves share payloads into [`DecodedContent`].
#[derive(Debug, Clone)]
pub struct AttachmentResolver {
    max_dimension: u32,
}

impl Default for AttachmentResolver {
    fn default() -> Self {
        Self {
            max_dimension: MAX_DIMENSION,
        }
    }
}

impl AttachmentResolver {
    pub fn new(max_dimension: u32) -> Self {
        Self { max_dimension }
    }

    /// Resolve a payload, trying each advertised representation in
    /// priority order. Suspends only while reading representation bytes.
    pub async fn resolve(
        &self,
        payload: &SharePayload,
    ) -> Result<DecodedContent, ResolutionError> {
        if payload.is_empty() {
            return Err(ResolutionError::NoValidData);
        }

        let mut attempted = Vec::new();

        for kind in PRIORITY {
            let Some(representation) = payload.get(kind) else {
                continue;
            };
            attempted.push(kind.as_str().to_string());

            match self.try_representation(representation, payload).await {
                Some(content) => return Ok(content),
                None => {
                    tracing::debug!(identifier = kind.as_str(), "representation failed to decode");
                }
            }
        }

        Err(ResolutionError::UnsupportedOrCorrupt { attempted })
    }

    async fn try_representation(
        &self,
        representation: &Representation,
        payload: &SharePayload,
    ) -> Option<DecodedContent> {
        match representation {
            Representation::Image(bytes) => match self.decode_image(bytes) {
                Some(content) => Some(content),
                // A generic image item can secretly point at a file.
                None => self.redirect_to_file_reference(payload).await,
            },
            Representation::FileReference(path) => self.load_path(path).await,
            Representation::GenericLocator(locator) => {
                let path = locator_to_path(locator)?;
                self.load_path(&path).await
            }
            Representation::Document(bytes) => self.render_document(bytes).await,
            Representation::RawBytes(bytes) => match self.decode_bytes_sniffed(bytes).await {
                Some(content) => Some(content),
                None => self.redirect_to_file_reference(payload).await,
            },
            Representation::PlainText(text) => Some(DecodedContent::Text(text.clone())),
        }
    }

    /// Explicit re-dispatch to an advertised file-reference representation.
    async fn redirect_to_file_reference(&self, payload: &SharePayload) -> Option<DecodedContent> {
        match payload.get(RepresentationKind::FileReference) {
            Some(Representation::FileReference(path)) => self.load_path(path).await,
            _ => None,
        }
    }

    /// Read bytes from disk and decode them, sniffing when necessary.
    async fn load_path(&self, path: &Path) -> Option<DecodedContent> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "failed to read representation bytes");
                return None;
            }
        };
        self.decode_bytes_sniffed(&bytes).await
    }

    /// Decode bytes as an image; on failure inspect the header and retry
    /// via the format-specific path (raster signature) or the document
    /// renderer (PDF signature).
    async fn decode_bytes_sniffed(&self, bytes: &[u8]) -> Option<DecodedContent> {
        if let Some(content) = self.decode_image(bytes) {
            return Some(content);
        }

        let detected = infer::get(bytes)?;
        match detected.mime_type() {
            "application/pdf" => self.render_document(bytes).await,
            mime if mime.starts_with("image/") => {
                let format = image_format_for_mime(mime)?;
                let pixels = image::load_from_memory_with_format(bytes, format).ok()?;
                Some(DecodedContent::Image {
                    bytes: bytes.to_vec(),
                    pixels: self.normalize(pixels),
                })
            }
            _ => None,
        }
    }

    fn decode_image(&self, bytes: &[u8]) -> Option<DecodedContent> {
        let pixels = image::load_from_memory(bytes).ok()?;
        Some(DecodedContent::Image {
            bytes: bytes.to_vec(),
            pixels: self.normalize(pixels),
        })
    }

    /// Render the first page of a PDF to an image via pdftoppm.
    ///
    /// Staging and the subprocess run on a blocking worker so the
    /// executor stays responsive and the surrounding future remains
    /// cancellable while the renderer runs.
    async fn render_document(&self, bytes: &[u8]) -> Option<DecodedContent> {
        let bytes = bytes.to_vec();
        let max_dimension = self.max_dimension;

        match tokio::task::spawn_blocking(move || render_document_blocking(bytes, max_dimension))
            .await
        {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("document render task aborted: {}", e);
                None
            }
        }
    }

    /// Bound dimensions and flatten transparency onto a white background.
    fn normalize(&self, pixels: DynamicImage) -> DynamicImage {
        normalize(pixels, self.max_dimension)
    }
}

/// Stage PDF bytes to scratch space, render the first page and decode it.
/// Runs on a blocking worker; everything here may block.
fn render_document_blocking(bytes: Vec<u8>, max_dimension: u32) -> Option<DecodedContent> {
    let temp_dir = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(e) => {
            tracing::warn!("no scratch space for document render: {}", e);
            return None;
        }
    };
    let pdf_path = temp_dir.path().join("shared.pdf");
    if let Err(e) = std::fs::write(&pdf_path, &bytes) {
        tracing::warn!("failed to stage document for rendering: {}", e);
        return None;
    }

    let image_path = render_first_page(&pdf_path, temp_dir.path())?;
    let pixels = image::open(&image_path).ok()?;
    Some(DecodedContent::Document {
        rendered: normalize(pixels, max_dimension),
        bytes,
    })
}

/// Bound dimensions and flatten transparency onto a white background.
fn normalize(pixels: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = pixels.dimensions();
    let pixels = if width.max(height) > max_dimension {
        pixels.resize(max_dimension, max_dimension, FilterType::Triangle)
    } else {
        pixels
    };

    if pixels.color().has_alpha() {
        flatten_onto_white(&pixels)
    } else {
        pixels
    }
}

/// Composite an image with transparency onto a plain white background.
fn flatten_onto_white(pixels: &DynamicImage) -> DynamicImage {
    let rgba = pixels.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut flat = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = pixel[3] as u32;
        let background = flat.get_pixel_mut(x, y);
        for channel in 0..3 {
            let fg = pixel[channel] as u32;
            let bg = background[channel] as u32;
            background[channel] = ((fg * alpha + bg * (255 - alpha)) / 255) as u8;
        }
    }

    DynamicImage::ImageRgb8(flat)
}

/// Map a sniffed image MIME type to a decoder format.
fn image_format_for_mime(mime: &str) -> Option<ImageFormat> {
    match mime {
        "image/png" => Some(ImageFormat::Png),
        "image/jpeg" => Some(ImageFormat::Jpeg),
        "image/gif" => Some(ImageFormat::Gif),
        "image/webp" => Some(ImageFormat::WebP),
        "image/tiff" => Some(ImageFormat::Tiff),
        "image/bmp" => Some(ImageFormat::Bmp),
        _ => None,
    }
}

/// Interpret a generic locator as a filesystem path.
fn locator_to_path(locator: &str) -> Option<PathBuf> {
    if let Some(stripped) = locator.strip_prefix("file://") {
        return Some(PathBuf::from(stripped));
    }
    if locator.starts_with('/') || locator.starts_with("./") || locator.starts_with("~/") {
        return Some(PathBuf::from(locator));
    }
    None
}

/// Convert the first PDF page to a PNG using pdftoppm.
fn render_first_page(pdf_path: &Path, output_dir: &Path) -> Option<PathBuf> {
    let output_prefix = output_dir.join("page");

    let status = Command::new("pdftoppm")
        .args(["-png", "-r", "150", "-f", "1", "-l", "1"])
        .arg(pdf_path)
        .arg(&output_prefix)
        .status();

    match status {
        Ok(s) if s.success() => find_page_image(output_dir, 1),
        Ok(_) => {
            tracing::warn!("pdftoppm failed to render document page");
            None
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("pdftoppm not found (install poppler-utils)");
            None
        }
        Err(e) => {
            tracing::warn!("pdftoppm invocation failed: {}", e);
            None
        }
    }
}

/// Find the rendered image for a page number.
///
/// pdftoppm pads page numbers in output filenames; the width depends on
/// the document's total page count.
fn find_page_image(output_dir: &Path, page: u32) -> Option<PathBuf> {
    for digits in [1, 2, 3, 4] {
        let filename = format!("page-{:0width$}.png", page, width = digits);
        let path = output_dir.join(&filename);
        if path.exists() {
            return Some(path);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Representation;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 20, 30])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn test_empty_payload_is_no_valid_data() {
        let resolver = AttachmentResolver::default();
        let err = resolver.resolve(&SharePayload::new()).await.unwrap_err();
        assert!(matches!(err, ResolutionError::NoValidData));
    }

    #[tokio::test]
    async fn test_image_representation_decodes() {
        let resolver = AttachmentResolver::default();
        let payload = SharePayload::new().with(Representation::Image(png_bytes(4, 4)));

        let content = resolver.resolve(&payload).await.unwrap();
        let pixels = content.pixels().unwrap();
        assert_eq!(pixels.dimensions(), (4, 4));
    }

    #[tokio::test]
    async fn test_file_reference_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.png");
        std::fs::write(&path, png_bytes(8, 6)).unwrap();

        let resolver = AttachmentResolver::default();
        let payload = SharePayload::new().with(Representation::FileReference(path));

        let content = resolver.resolve(&payload).await.unwrap();
        assert!(matches!(content, DecodedContent::Image { .. }));
    }

    #[tokio::test]
    async fn test_file_reference_to_garbage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.bin");
        std::fs::write(&path, b"definitely not an image").unwrap();

        let resolver = AttachmentResolver::default();
        let payload = SharePayload::new().with(Representation::FileReference(path));

        let err = resolver.resolve(&payload).await.unwrap_err();
        match err {
            ResolutionError::UnsupportedOrCorrupt { attempted } => {
                assert_eq!(attempted, vec!["file-reference"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_raw_bytes_falls_back_to_file_reference() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.png");
        std::fs::write(&path, png_bytes(5, 5)).unwrap();

        let resolver = AttachmentResolver::default();
        let payload = SharePayload::new()
            .with(Representation::RawBytes(b"not decodable".to_vec()))
            .with(Representation::FileReference(path));

        let content = resolver.resolve(&payload).await.unwrap();
        assert!(matches!(content, DecodedContent::Image { .. }));
    }

    #[tokio::test]
    async fn test_raw_bytes_with_image_signature_decode() {
        // Raw-bytes path must recover a valid PNG via header sniffing even
        // with no other representation advertised.
        let resolver = AttachmentResolver::default();
        let payload = SharePayload::new().with(Representation::RawBytes(png_bytes(3, 3)));

        let content = resolver.resolve(&payload).await.unwrap();
        assert!(matches!(content, DecodedContent::Image { .. }));
    }

    #[tokio::test]
    async fn test_unsupported_representation_lists_attempts() {
        let resolver = AttachmentResolver::default();
        // Header of a glTF binary model; not a raster or document format.
        let payload = SharePayload::new().with(Representation::RawBytes(b"glTF\x02rest".to_vec()));

        let err = resolver.resolve(&payload).await.unwrap_err();
        match err {
            ResolutionError::UnsupportedOrCorrupt { attempted } => {
                assert_eq!(attempted, vec!["raw-bytes"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(resolver
            .resolve(&payload)
            .await
            .unwrap_err()
            .to_string()
            .contains("raw-bytes"));
    }

    #[tokio::test]
    async fn test_failed_redirect_target_appears_in_diagnostic() {
        // Undecodable image bytes redirect to the advertised
        // file-reference; when that fails too, the error names both
        // identifiers.
        let dir = tempfile::tempdir().unwrap();
        let resolver = AttachmentResolver::default();
        let payload = SharePayload::new()
            .with(Representation::Image(b"not an image".to_vec()))
            .with(Representation::FileReference(dir.path().join("missing.png")));

        let err = resolver.resolve(&payload).await.unwrap_err();
        match err {
            ResolutionError::UnsupportedOrCorrupt { attempted } => {
                assert_eq!(attempted, vec!["image", "file-reference"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_corrupt_document_folds_into_fallback_chain() {
        // The render runs off the executor; a document that cannot be
        // rendered (corrupt bytes, or no renderer installed) counts as a
        // failed attempt instead of wedging or aborting resolution.
        let resolver = AttachmentResolver::default();
        let payload =
            SharePayload::new().with(Representation::Document(b"%PDF-1.4 truncated".to_vec()));

        let err = resolver.resolve(&payload).await.unwrap_err();
        match err {
            ResolutionError::UnsupportedOrCorrupt { attempted } => {
                assert_eq!(attempted, vec!["document"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generic_locator_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        std::fs::write(&path, png_bytes(2, 2)).unwrap();

        let resolver = AttachmentResolver::default();
        let payload = SharePayload::new().with(Representation::GenericLocator(format!(
            "file://{}",
            path.display()
        )));

        assert!(resolver.resolve(&payload).await.is_ok());
    }

    #[tokio::test]
    async fn test_plain_text_passthrough() {
        let resolver = AttachmentResolver::default();
        let payload =
            SharePayload::new().with(Representation::PlainText("COLRUYT 12/03/2025".into()));

        match resolver.resolve(&payload).await.unwrap() {
            DecodedContent::Text(text) => assert_eq!(text, "COLRUYT 12/03/2025"),
            other => panic!("unexpected content: {:?}", other),
        }
    }

    #[test]
    fn test_normalize_bounds_dimensions() {
        let resolver = AttachmentResolver::new(64);
        let large = DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 100, Rgb([0, 0, 0])));
        let normalized = resolver.normalize(large);
        let (w, h) = normalized.dimensions();
        assert!(w <= 64 && h <= 64);
    }

    #[test]
    fn test_flatten_composites_white_background() {
        let mut rgba = image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 0, 0]));
        rgba.put_pixel(0, 0, image::Rgba([100, 100, 100, 255]));
        let flat = flatten_onto_white(&DynamicImage::ImageRgba8(rgba));

        let rgb = flat.to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([100, 100, 100]));
        // Fully transparent pixels become the background.
        assert_eq!(rgb.get_pixel(1, 1), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_locator_parsing() {
        assert_eq!(
            locator_to_path("file:///tmp/a.png"),
            Some(PathBuf::from("/tmp/a.png"))
        );
        assert_eq!(locator_to_path("/tmp/b.png"), Some(PathBuf::from("/tmp/b.png")));
        assert_eq!(locator_to_path("https://example.com/x.png"), None);
    }

    #[test]
    fn test_find_page_image_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_page_image(dir.path(), 1).is_none());
    }

    #[test]
    fn test_find_page_image_padded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page-01.png"), b"x").unwrap();
        assert!(find_page_image(dir.path(), 1).is_some());
    }
}
