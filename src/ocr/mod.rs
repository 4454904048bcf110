//! Text extraction from decoded content.
//!
//! The OCR engine itself is an external collaborator behind the
//! [`OcrEngine`] trait: image in, text out, may fail. The extractor stages
//! pixels into scratch space, invokes the engine once per pipeline run with
//! the highest-accuracy settings, and splits the output into lines. Empty
//! output is a valid result, not a failure.

mod tesseract;

use std::path::Path;
use std::sync::Arc;

use image::ImageFormat;

use crate::error::ExtractionError;
use crate::resolver::DecodedContent;

pub use tesseract::TesseractEngine;

/// Recognition accuracy requested from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionAccuracy {
    Fast,
    Accurate,
}

impl RecognitionAccuracy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Accurate => "accurate",
        }
    }
}

/// Options passed to the engine on every invocation.
#[derive(Debug, Clone)]
pub struct OcrOptions {
    /// Recognition language (e.g. "eng", "nld").
    pub language: String,
    pub accuracy: RecognitionAccuracy,
    /// Dictionary-based correction of recognized words.
    pub language_correction: bool,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            accuracy: RecognitionAccuracy::Accurate,
            language_correction: true,
        }
    }
}

/// External OCR capability: one image file in, plain text out.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the engine can actually run (binary installed, models present).
    fn is_available(&self) -> bool;

    /// What is needed to make this engine available.
    fn availability_hint(&self) -> String;

    fn recognize(&self, image_path: &Path, options: &OcrOptions)
        -> Result<String, ExtractionError>;
}

/// Ordered lines of recognized text. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedText {
    lines: Vec<String>,
}

impl ExtractedText {
    /// Split raw engine output into trimmed, non-blank lines.
    pub fn from_raw(raw: &str) -> Self {
        Self {
            lines: raw
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The full text, lines joined with newlines.
    pub fn joined(&self) -> String {
        self.lines.join("\n")
    }
}

/// Wraps an [`OcrEngine`] and converts decoded content into text.
#[derive(Clone)]
pub struct TextExtractor {
    engine: Arc<dyn OcrEngine>,
    options: OcrOptions,
}

impl TextExtractor {
    pub fn new(engine: Arc<dyn OcrEngine>, options: OcrOptions) -> Self {
        Self { engine, options }
    }

    /// Extract text from decoded content.
    ///
    /// Plain-text content passes through untouched. Visual content is
    /// written to a scratch PNG and recognized on a blocking worker; the
    /// engine is invoked exactly once per call, with retries left to the
    /// whole-pipeline retry in the state machine.
    pub async fn extract(&self, content: &DecodedContent) -> Result<ExtractedText, ExtractionError> {
        if let DecodedContent::Text(text) = content {
            return Ok(ExtractedText::from_raw(text));
        }

        // pixels() is Some for every non-text variant
        let pixels = match content.pixels() {
            Some(pixels) => pixels.clone(),
            None => return Ok(ExtractedText::default()),
        };

        let engine = Arc::clone(&self.engine);
        let options = self.options.clone();

        let raw = tokio::task::spawn_blocking(move || {
            let scratch = tempfile::tempdir()?;
            let image_path = scratch.path().join("content.png");
            pixels.save_with_format(&image_path, ImageFormat::Png)?;
            engine.recognize(&image_path, &options)
        })
        .await
        .map_err(|e| ExtractionError::RecognitionFailed(format!("OCR task aborted: {}", e)))??;

        Ok(ExtractedText::from_raw(&raw))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Engine returning canned text, for pipeline tests.
    pub struct FixedEngine(pub &'static str);

    impl OcrEngine for FixedEngine {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn availability_hint(&self) -> String {
            "always available".to_string()
        }

        fn recognize(
            &self,
            _image_path: &Path,
            _options: &OcrOptions,
        ) -> Result<String, ExtractionError> {
            Ok(self.0.to_string())
        }
    }

    /// Engine that always fails, for error-path tests.
    pub struct FailingEngine;

    impl OcrEngine for FailingEngine {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn availability_hint(&self) -> String {
            "always available".to_string()
        }

        fn recognize(
            &self,
            _image_path: &Path,
            _options: &OcrOptions,
        ) -> Result<String, ExtractionError> {
            Err(ExtractionError::RecognitionFailed(
                "synthetic failure".to_string(),
            ))
        }
    }
}
