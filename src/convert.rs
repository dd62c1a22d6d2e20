//! Boundary to the external PDF structural converter and page renderer.
//!
//! The converter itself is a black box: the traits here describe the
//! structured export the pipeline consumes: plain text, HTML, a JSON
//! content tree, per-picture raw bytes, and per-table markdown. The
//! shipped implementations talk to a conversion HTTP endpoint and to
//! poppler's `pdftoppm` for page rasters.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Options forwarded to the converter.
#[derive(Debug, Clone, Copy)]
pub struct ConvertOptions {
    pub generate_images: bool,
    pub generate_tables: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            generate_images: true,
            generate_tables: true,
        }
    }
}

/// The converter's structured export for one PDF.
///
/// Picture and table accessors are fallible per item: a single
/// unreadable picture or unexportable table must not poison the rest of
/// the document.
pub trait ConvertedDocument {
    fn export_text(&self) -> &str;
    fn export_html(&self) -> &str;
    fn export_json(&self) -> &serde_json::Value;

    fn picture_count(&self) -> usize;
    fn picture_bytes(&self, index: usize) -> Result<Vec<u8>>;

    fn table_count(&self) -> usize;
    fn table_markdown(&self, index: usize) -> Result<String>;
}

/// Converts one PDF file into a structured export.
pub trait DocumentConverter {
    type Document: ConvertedDocument;

    fn convert(
        &self,
        pdf: &Path,
        options: &ConvertOptions,
    ) -> Result<Self::Document>;
}

/// Renders every page of a PDF as a PNG at a fixed resolution, writing
/// `{stem}_page{N}.png` (N from 1) into `out_dir` and returning the
/// paths in page order.
pub trait PageRenderer {
    fn render_pages(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>>;
}

/// Converter client posting PDFs to a conversion service.
///
/// The service answers with one JSON object carrying every export the
/// pipeline needs, pictures as base64-encoded PNG payloads.
#[derive(Debug, Clone)]
pub struct HttpConverter {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl HttpConverter {
    /// Conversion of a large PDF can take minutes; no client-side
    /// deadline is set.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(None::<Duration>)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }
}

impl DocumentConverter for HttpConverter {
    type Document = HttpDocument;

    fn convert(
        &self,
        pdf: &Path,
        options: &ConvertOptions,
    ) -> Result<Self::Document> {
        let bytes = std::fs::read(pdf)?;
        let response = self
            .http
            .post(format!("{}/convert", self.base_url))
            .query(&[
                ("images", options.generate_images),
                ("tables", options.generate_tables),
            ])
            .header(reqwest::header::CONTENT_TYPE, "application/pdf")
            .body(bytes)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(Error::Service {
                service: "converter",
                message: format!("{status}: {body}"),
            });
        }

        Ok(response.json()?)
    }
}

/// Structured export as returned by the conversion service.
#[derive(Debug, Deserialize)]
pub struct HttpDocument {
    text: String,
    html: String,
    document: serde_json::Value,
    #[serde(default)]
    pictures: Vec<String>,
    #[serde(default)]
    tables: Vec<String>,
}

impl ConvertedDocument for HttpDocument {
    fn export_text(&self) -> &str {
        &self.text
    }

    fn export_html(&self) -> &str {
        &self.html
    }

    fn export_json(&self) -> &serde_json::Value {
        &self.document
    }

    fn picture_count(&self) -> usize {
        self.pictures.len()
    }

    fn picture_bytes(&self, index: usize) -> Result<Vec<u8>> {
        let encoded =
            self.pictures.get(index).ok_or_else(|| Error::NotFound {
                kind: "picture",
                name: index.to_string(),
            })?;
        BASE64.decode(encoded).map_err(|e| Error::Service {
            service: "converter",
            message: format!("picture {index} payload unreadable: {e}"),
        })
    }

    fn table_count(&self) -> usize {
        self.tables.len()
    }

    fn table_markdown(&self, index: usize) -> Result<String> {
        self.tables
            .get(index)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                kind: "table",
                name: index.to_string(),
            })
    }
}

/// Page rasterization via poppler's `pdftoppm` at a fixed DPI.
#[derive(Debug, Clone)]
pub struct PdftoppmRenderer {
    binary: String,
    dpi: u32,
}

/// Render resolution matching the rest of the extraction toolchain.
pub const DEFAULT_RENDER_DPI: u32 = 150;

impl PdftoppmRenderer {
    pub fn new(dpi: u32) -> Self {
        Self {
            binary: "pdftoppm".into(),
            dpi,
        }
    }
}

impl Default for PdftoppmRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_RENDER_DPI)
    }
}

impl PageRenderer for PdftoppmRenderer {
    fn render_pages(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let stem = file_stem(pdf)?;
        let prefix = out_dir.join(format!("{stem}_page"));

        let output = Command::new(&self.binary)
            .arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(pdf)
            .arg(&prefix)
            .output()?;

        if !output.status.success() {
            return Err(Error::Service {
                service: "pdftoppm",
                message: String::from_utf8_lossy(&output.stderr)
                    .trim()
                    .to_string(),
            });
        }

        collect_rendered_pages(out_dir, &stem)
    }
}

pub(crate) fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::NotFound {
            kind: "file stem",
            name: path.display().to_string(),
        })
}

/// Normalize `pdftoppm` output names to the deterministic scheme.
///
/// `pdftoppm` writes `{prefix}-{N}.png` and zero-pads N by total page
/// count; renames those to `{stem}_page{N}.png` and returns the paths
/// in page order.
fn collect_rendered_pages(out_dir: &Path, stem: &str) -> Result<Vec<PathBuf>> {
    let padded_prefix = format!("{stem}_page-");
    let mut pages: Vec<(usize, PathBuf)> = Vec::new();

    for entry in std::fs::read_dir(out_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        let Some(rest) = name.strip_prefix(&padded_prefix) else {
            continue;
        };
        let Some(digits) = rest.strip_suffix(".png") else {
            continue;
        };
        let Ok(number) = digits.parse::<usize>() else {
            continue;
        };

        let target = out_dir.join(format!("{stem}_page{number}.png"));
        std::fs::rename(entry.path(), &target)?;
        pages.push((number, target));
    }

    pages.sort_by_key(|(number, _)| *number);
    Ok(pages.into_iter().map(|(_, path)| path).collect())
}
