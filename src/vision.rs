//! Captioning, OCR, and description expansion for extracted images.
//!
//! Every image in a directory gets an [`ImageDescription`]: a short
//! caption from the captioning model, raw OCR text, and an expanded
//! paragraph written by the completion service from the caption plus
//! the OCR text. Each step tolerates failure on its own; a bad image
//! never aborts the batch.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    error::Result,
    services::{ImageCaptioner, OcrEngine, TextCompletion},
};

/// Raster extensions the describer picks up.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Description of one extracted image.
///
/// `long` is always derived from `short` and `ocr`; it never exists
/// independently of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDescription {
    pub short: String,
    pub ocr: String,
    pub long: String,
}

/// Policy knobs for a describe run.
#[derive(Debug, Clone, Copy)]
pub struct DescribeOptions {
    /// When a caption could not be produced, still send the error
    /// placeholder through the expansion step. When false, the
    /// placeholder is kept as the long description and the completion
    /// call is skipped.
    pub expand_on_caption_failure: bool,
}

impl Default for DescribeOptions {
    fn default() -> Self {
        Self {
            expand_on_caption_failure: true,
        }
    }
}

/// Describe every image in `dir`, keyed by filename.
///
/// A missing directory is created and yields an empty mapping; so does
/// an empty one. Neither is an error.
pub fn describe_images<C, O, L>(
    dir: &Path,
    captioner: &C,
    ocr: &O,
    completion: &L,
    options: &DescribeOptions,
) -> Result<BTreeMap<String, ImageDescription>>
where
    C: ImageCaptioner,
    O: OcrEngine,
    L: TextCompletion,
{
    let mut results = BTreeMap::new();

    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
        info!("no images found; created empty directory {}", dir.display());
        return Ok(results);
    }

    let mut images: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| {
                    IMAGE_EXTENSIONS
                        .iter()
                        .any(|known| known.eq_ignore_ascii_case(ext))
                })
        })
        .collect();
    images.sort();

    if images.is_empty() {
        info!("no image files found in {}", dir.display());
        return Ok(results);
    }

    for path in images {
        let Some(filename) =
            path.file_name().and_then(|n| n.to_str()).map(str::to_string)
        else {
            continue;
        };

        let (short, caption_failed) = match captioner.caption(&path) {
            Ok(caption) => (caption, false),
            Err(e) => {
                warn!("captioning failed for {filename}: {e}");
                (format!("(caption error: {e})"), true)
            }
        };

        let ocr_text = match ocr.recognize(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!("OCR failed for {filename}: {e}");
                String::new()
            }
        };

        let long = if caption_failed && !options.expand_on_caption_failure {
            short.clone()
        } else {
            let prompt = expansion_prompt(&short, &ocr_text);
            match completion.complete(&prompt) {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    warn!("expansion failed for {filename}: {e}");
                    short.clone()
                }
            }
        };

        info!("described {filename}: {short}");
        results.insert(
            filename,
            ImageDescription {
                short,
                ocr: ocr_text,
                long,
            },
        );
    }

    Ok(results)
}

/// Build the expansion prompt from the short caption and OCR text.
/// The OCR line is omitted entirely when no text was found.
fn expansion_prompt(short: &str, ocr_text: &str) -> String {
    let mut prompt = format!(
        "You are an assistant that writes detailed, vivid, factual image \
         descriptions.\n\nShort caption: {short}\n"
    );
    if !ocr_text.is_empty() {
        prompt.push_str(&format!("Detected text inside image: {ocr_text}\n"));
    }
    prompt.push_str(
        "Write a complete descriptive paragraph (3-6 sentences) that covers: \
         what is in the image, notable attributes (style, colors, objects), \
         any readable text, and a short inference about the likely purpose \
         of the image. Be factual, avoid hallucination, but use reasonable \
         general knowledge.\n\nDescription:\n",
    );
    prompt
}

/// Persist a description mapping as one JSON object keyed by filename.
pub fn save_descriptions(
    path: &Path,
    descriptions: &BTreeMap<String, ImageDescription>,
) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(descriptions)?)?;
    Ok(())
}

/// Load a previously persisted description mapping.
pub fn load_descriptions(
    path: &Path,
) -> Result<BTreeMap<String, ImageDescription>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::error::Error;

    struct FakeCaptioner {
        fail_for: Option<&'static str>,
    }

    impl ImageCaptioner for FakeCaptioner {
        fn caption(&self, image: &Path) -> Result<String> {
            let name = image.file_name().unwrap().to_string_lossy();
            if self.fail_for.is_some_and(|f| name.contains(f)) {
                return Err(Error::Service {
                    service: "captioner",
                    message: "unreadable image".into(),
                });
            }
            Ok(format!("caption of {name}"))
        }
    }

    struct FakeOcr {
        text: &'static str,
    }

    impl OcrEngine for FakeOcr {
        fn recognize(&self, _image: &Path) -> Result<String> {
            Ok(self.text.to_string())
        }
    }

    struct FakeCompletion {
        prompts: RefCell<Vec<String>>,
        fail: bool,
    }

    impl FakeCompletion {
        fn new() -> Self {
            Self {
                prompts: RefCell::new(Vec::new()),
                fail: false,
            }
        }
    }

    impl TextCompletion for FakeCompletion {
        fn complete(&self, prompt: &str) -> Result<String> {
            if self.fail {
                return Err(Error::Service {
                    service: "completion",
                    message: "model offline".into(),
                });
            }
            self.prompts.borrow_mut().push(prompt.to_string());
            Ok("an expanded description".into())
        }
    }

    fn image_dir(names: &[&str]) -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        for name in names {
            std::fs::write(tmp.path().join(name), b"img").unwrap();
        }
        tmp
    }

    #[test]
    fn missing_directory_yields_empty_mapping_and_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("extracted_images");

        let results = describe_images(
            &dir,
            &FakeCaptioner { fail_for: None },
            &FakeOcr { text: "" },
            &FakeCompletion::new(),
            &DescribeOptions::default(),
        )
        .unwrap();

        assert!(results.is_empty());
        assert!(dir.is_dir());
    }

    #[test]
    fn non_image_files_are_ignored() {
        let dir = image_dir(&["chart.png", "photo.JPG", "notes.txt"]);

        let results = describe_images(
            dir.path(),
            &FakeCaptioner { fail_for: None },
            &FakeOcr { text: "" },
            &FakeCompletion::new(),
            &DescribeOptions::default(),
        )
        .unwrap();

        let keys: Vec<_> = results.keys().cloned().collect();
        assert_eq!(keys, vec!["chart.png", "photo.JPG"]);
    }

    #[test]
    fn caption_failure_yields_placeholder_and_still_expands() {
        let dir = image_dir(&["bad.png"]);
        let completion = FakeCompletion::new();

        let results = describe_images(
            dir.path(),
            &FakeCaptioner {
                fail_for: Some("bad"),
            },
            &FakeOcr { text: "" },
            &completion,
            &DescribeOptions::default(),
        )
        .unwrap();

        let description = &results["bad.png"];
        assert!(description.short.starts_with("(caption error:"));
        assert_eq!(description.long, "an expanded description");
        assert_eq!(completion.prompts.borrow().len(), 1);
    }

    #[test]
    fn caption_failure_can_skip_expansion() {
        let dir = image_dir(&["bad.png", "good.png"]);
        let completion = FakeCompletion::new();

        let results = describe_images(
            dir.path(),
            &FakeCaptioner {
                fail_for: Some("bad"),
            },
            &FakeOcr { text: "" },
            &completion,
            &DescribeOptions {
                expand_on_caption_failure: false,
            },
        )
        .unwrap();

        let bad = &results["bad.png"];
        assert_eq!(bad.long, bad.short);
        // Only the healthy image reached the completion service.
        assert_eq!(completion.prompts.borrow().len(), 1);
        assert_eq!(results["good.png"].long, "an expanded description");
    }

    #[test]
    fn ocr_text_is_included_in_the_prompt_only_when_present() {
        let dir = image_dir(&["scan.png"]);

        let completion = FakeCompletion::new();
        describe_images(
            dir.path(),
            &FakeCaptioner { fail_for: None },
            &FakeOcr { text: "TOTAL 42" },
            &completion,
            &DescribeOptions::default(),
        )
        .unwrap();
        let prompt = completion.prompts.borrow()[0].clone();
        assert!(prompt.contains("Detected text inside image: TOTAL 42"));
        assert!(prompt.contains("Short caption: caption of scan.png"));

        let completion = FakeCompletion::new();
        describe_images(
            dir.path(),
            &FakeCaptioner { fail_for: None },
            &FakeOcr { text: "" },
            &completion,
            &DescribeOptions::default(),
        )
        .unwrap();
        let prompt = completion.prompts.borrow()[0].clone();
        assert!(!prompt.contains("Detected text inside image"));
    }

    #[test]
    fn expansion_failure_falls_back_to_the_short_caption() {
        let dir = image_dir(&["chart.png"]);
        let completion = FakeCompletion {
            prompts: RefCell::new(Vec::new()),
            fail: true,
        };

        let results = describe_images(
            dir.path(),
            &FakeCaptioner { fail_for: None },
            &FakeOcr { text: "" },
            &completion,
            &DescribeOptions::default(),
        )
        .unwrap();

        let description = &results["chart.png"];
        assert_eq!(description.long, description.short);
    }

    #[test]
    fn descriptions_roundtrip_through_json() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("image_captions.json");

        let mut map = BTreeMap::new();
        map.insert(
            "a.png".to_string(),
            ImageDescription {
                short: "a chart".into(),
                ocr: "Q1 Q2".into(),
                long: "a quarterly revenue chart".into(),
            },
        );

        save_descriptions(&path, &map).unwrap();
        let loaded = load_descriptions(&path).unwrap();
        assert_eq!(loaded, map);

        // Wire format keeps the documented keys.
        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["a.png"]["short"], "a chart");
        assert_eq!(value["a.png"]["ocr"], "Q1 Q2");
        assert_eq!(value["a.png"]["long"], "a quarterly revenue chart");
    }
}
