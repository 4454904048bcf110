//! Tesseract OCR engine.
//!
//! Invokes the system tesseract binary, the widely-available default for
//! receipt text. Accuracy and language-correction options map onto engine
//! selection and dictionary flags.

use std::path::Path;
use std::process::Command;

use super::{OcrEngine, OcrOptions, RecognitionAccuracy};
use crate::error::ExtractionError;

/// OCR engine backed by the tesseract command-line binary.
#[derive(Debug, Default)]
pub struct TesseractEngine;

impl TesseractEngine {
    pub fn new() -> Self {
        Self
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn is_available(&self) -> bool {
        which::which("tesseract").is_ok()
    }

    fn availability_hint(&self) -> String {
        if self.is_available() {
            "tesseract is available".to_string()
        } else {
            "tesseract not installed. Install with: apt install tesseract-ocr".to_string()
        }
    }

    fn recognize(
        &self,
        image_path: &Path,
        options: &OcrOptions,
    ) -> Result<String, ExtractionError> {
        let mut command = Command::new("tesseract");
        command
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &options.language]);

        // LSTM engine for accurate mode, legacy engine for fast mode.
        match options.accuracy {
            RecognitionAccuracy::Accurate => command.args(["--oem", "1"]),
            RecognitionAccuracy::Fast => command.args(["--oem", "0"]),
        };

        if !options.language_correction {
            command.args(["-c", "load_system_dawg=0", "-c", "load_freq_dawg=0"]);
        }

        let output = command.output();

        match output {
            Ok(output) => {
                if output.status.success() {
                    Ok(String::from_utf8_lossy(&output.stdout).to_string())
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    Err(ExtractionError::RecognitionFailed(format!(
                        "tesseract failed: {}",
                        stderr
                    )))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ExtractionError::EngineUnavailable(
                    "tesseract not found (install tesseract-ocr)".to_string(),
                ))
            }
            Err(e) => Err(ExtractionError::Io(e)),
        }
    }
}
