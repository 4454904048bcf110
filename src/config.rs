//! Settings loaded from a TOML file with platform defaults.
//!
//! The store root must be a location the host process also knows about,
//! so it defaults to a fixed directory under the platform data dir rather
//! than anything relative to the working directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ocr::{OcrOptions, RecognitionAccuracy};

/// Top-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Well-known root directory of the shared record store.
    pub store_dir: PathBuf,
    /// Largest dimension of decoded or rendered images.
    pub max_dimension: u32,
    pub ocr: OcrSettings,
}

/// OCR engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Recognition language passed to the engine.
    pub language: String,
    /// "accurate" or "fast".
    pub accuracy: String,
    pub language_correction: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_dir: default_store_dir(),
            max_dimension: crate::resolver::MAX_DIMENSION,
            ocr: OcrSettings::default(),
        }
    }
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            accuracy: "accurate".to_string(),
            language_correction: true,
        }
    }
}

impl Settings {
    /// Load settings from the default config path, falling back to
    /// defaults when no file exists.
    pub fn load() -> anyhow::Result<Self> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let settings = toml::from_str(&raw)?;
        Ok(settings)
    }

    /// Options handed to the OCR engine on every invocation.
    pub fn ocr_options(&self) -> OcrOptions {
        let accuracy = match self.ocr.accuracy.as_str() {
            "fast" => RecognitionAccuracy::Fast,
            _ => RecognitionAccuracy::Accurate,
        };
        OcrOptions {
            language: self.ocr.language.clone(),
            accuracy,
            language_correction: self.ocr.language_correction,
        }
    }
}

/// `$XDG_DATA_HOME/receiptdrop/records` (or platform equivalent).
pub fn default_store_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("receiptdrop")
        .join("records")
}

/// `$XDG_CONFIG_HOME/receiptdrop/config.toml` (or platform equivalent).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("receiptdrop").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_complete() {
        let settings = Settings::default();
        assert!(settings.store_dir.ends_with("receiptdrop/records"));
        assert_eq!(settings.ocr.language, "eng");
        assert!(settings.ocr.language_correction);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [ocr]
            language = "nld"
            "#,
        )
        .unwrap();
        assert_eq!(settings.ocr.language, "nld");
        assert_eq!(settings.ocr.accuracy, "accurate");
        assert_eq!(settings.max_dimension, crate::resolver::MAX_DIMENSION);
    }

    #[test]
    fn test_ocr_options_mapping() {
        let mut settings = Settings::default();
        settings.ocr.accuracy = "fast".to_string();
        let options = settings.ocr_options();
        assert_eq!(options.accuracy, RecognitionAccuracy::Fast);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "store_dir = \"/tmp/records\"\nmax_dimension = 1024\n").unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.store_dir, PathBuf::from("/tmp/records"));
        assert_eq!(settings.max_dimension, 1024);
    }
}
