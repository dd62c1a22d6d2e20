//! Seams for the external model services the pipeline calls.
//!
//! Each collaborator is a narrow trait so the core stages can run
//! against test doubles. All calls block for their full duration; there
//! are no retries and no cancellation anywhere in the pipeline.

use std::path::Path;
use std::process::Command;

use crate::error::{Error, Result};

/// Turns a batch of strings into fixed-length vectors, one per input,
/// in input order.
pub trait TextEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Blocking text-completion service: one prompt in, one completion out.
pub trait TextCompletion {
    fn complete(&self, prompt: &str) -> Result<String>;
}

/// Produces a short caption for one image. May fail on unreadable
/// images; callers decide how to degrade.
pub trait ImageCaptioner {
    fn caption(&self, image: &Path) -> Result<String>;
}

/// Extracts embedded text from one image. An image without text yields
/// an empty string, not an error.
pub trait OcrEngine {
    fn recognize(&self, image: &Path) -> Result<String>;
}

/// OCR via the `tesseract` command-line binary.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    binary: String,
}

impl TesseractOcr {
    pub fn new() -> Self {
        Self {
            binary: "tesseract".into(),
        }
    }

    #[cfg(test)]
    fn with_binary(binary: &str) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, image: &Path) -> Result<String> {
        let output = Command::new(&self.binary)
            .arg(image)
            .arg("stdout")
            .output()?;

        if !output.status.success() {
            return Err(Error::Service {
                service: "tesseract",
                message: String::from_utf8_lossy(&output.stderr)
                    .trim()
                    .to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognize_captures_and_trims_stdout() {
        // `echo` stands in for the OCR binary: it prints its arguments
        // followed by a newline, which recognize() must trim away.
        let ocr = TesseractOcr::with_binary("echo");
        let text = ocr.recognize(Path::new("scan.png")).unwrap();
        assert_eq!(text, "scan.png stdout");
    }

    #[test]
    fn missing_binary_is_an_error() {
        let ocr = TesseractOcr::with_binary("docrag-no-such-binary");
        assert!(ocr.recognize(Path::new("scan.png")).is_err());
    }
}
