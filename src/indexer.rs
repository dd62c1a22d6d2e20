//! Index construction: merge normalized text, image descriptions, and
//! table rows into retrievable units, embed them, and persist the
//! bundle.
//!
//! The unit collection and the vector collection are parallel: position
//! i of one always describes position i of the other. Everything here
//! is written to preserve that correspondence: units are gathered in a
//! fixed order (text, then images, then tables), embedded in one batch
//! call, and appended to the index without reordering.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    chunking::{ChunkingConfig, chunk_text},
    error::{Error, Result},
    flat_index::FlatIndex,
    services::TextEmbedder,
    unit::{RetrievableUnit, UnitMetadata},
    vision,
    workspace::Workspace,
};

/// The persisted search artifact: the vector index plus the parallel
/// unit-text and metadata collections. Built once per run, read-only at
/// query time.
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexBundle {
    pub index: FlatIndex,
    pub sentences: Vec<String>,
    pub metadata: Vec<UnitMetadata>,
}

impl IndexBundle {
    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    /// Persist as one compact JSON file. The metadata tagging requires
    /// a self-describing format, so the bundle shares the artifact
    /// family's encoding rather than a binary codec.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_vec(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Collect every retrievable unit from the workspace artifacts.
///
/// Sources, in concatenation order:
/// 1. every `{stem}.txt` in the workspace root, chunked per document;
/// 2. every entry of the image-description mapping (expanded
///    description, falling back to the short caption);
/// 3. every row of every canonicalized table export, cells joined with
///    `" | "` in stored column order.
pub fn gather_units(
    workspace: &Workspace,
    config: &ChunkingConfig,
) -> Result<Vec<RetrievableUnit>> {
    let mut units = Vec::new();

    for path in sorted_files(workspace.root(), "txt")? {
        let stem = crate::convert::file_stem(&path)?;
        let raw = std::fs::read_to_string(&path)?;
        for (i, chunk) in chunk_text(&raw, config).into_iter().enumerate() {
            units.push(RetrievableUnit::new(
                chunk,
                UnitMetadata::Text {
                    source: stem.clone(),
                    chunk: i,
                },
            ));
        }
    }

    let captions_file = workspace.captions_file();
    if captions_file.exists() {
        let descriptions = vision::load_descriptions(&captions_file)?;
        for (filename, description) in descriptions {
            let text = if description.long.is_empty() {
                description.short
            } else {
                description.long
            };
            units.push(RetrievableUnit::new(
                text,
                UnitMetadata::Image { source: filename },
            ));
        }
    } else {
        info!("no image descriptions at {}", captions_file.display());
    }

    for path in sorted_files(&workspace.tables_json_dir()?, "json")? {
        let Some(filename) =
            path.file_name().and_then(|n| n.to_str()).map(str::to_string)
        else {
            continue;
        };
        let raw = std::fs::read_to_string(&path)?;
        let rows: Vec<serde_json::Map<String, serde_json::Value>> =
            serde_json::from_str(&raw)?;
        for row in rows {
            let text = row
                .values()
                .map(cell_text)
                .collect::<Vec<_>>()
                .join(" | ");
            units.push(RetrievableUnit::new(
                text,
                UnitMetadata::Table {
                    source: filename.clone(),
                },
            ));
        }
    }

    Ok(units)
}

/// Embed every unit in one batch call and build the bundle.
///
/// Fails if the embedder returns a different number of vectors than it
/// was given: a silent mismatch would corrupt every future retrieval.
pub fn build_bundle<E: TextEmbedder>(
    units: Vec<RetrievableUnit>,
    embedder: &E,
) -> Result<IndexBundle> {
    if units.is_empty() {
        return Err(Error::Config(
            "no retrievable units found; run ingest/tables/describe first"
                .into(),
        ));
    }

    let texts: Vec<String> = units.iter().map(|u| u.text.clone()).collect();
    info!("embedding {} units in one batch", texts.len());
    let vectors = embedder.embed(&texts)?;

    if vectors.len() != units.len() {
        return Err(Error::Config(format!(
            "embedder returned {} vectors for {} units",
            vectors.len(),
            units.len()
        )));
    }

    let dimension = vectors[0].len();
    let mut index = FlatIndex::new(dimension)?;
    index.add(&vectors)?;

    let mut sentences = Vec::with_capacity(units.len());
    let mut metadata = Vec::with_capacity(units.len());
    for unit in units {
        sentences.push(unit.text);
        metadata.push(unit.metadata);
    }

    Ok(IndexBundle {
        index,
        sentences,
        metadata,
    })
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn sorted_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        warn!("skipping missing directory {}", dir.display());
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        })
        .collect();
    files.sort();
    Ok(files)
}
