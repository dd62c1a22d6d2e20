//! Canonicalization of raw tabular exports into row-record JSON.
//!
//! Every `.csv` file in a source directory becomes one JSON array of
//! row objects in the target directory. Cells are kept as strings,
//! missing cells become empty strings (the key is always present), and
//! column order is preserved so downstream joins see cells in source
//! order. The stage reads and writes only files; it has no coupling to
//! the ingestion pipeline's in-memory state.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::info;

use crate::error::Result;

/// Canonicalize every tabular export in `source` into `target`,
/// creating `target` if needed. Non-CSV files are ignored. Returns the
/// number of files written.
pub fn canonicalize_tables(source: &Path, target: &Path) -> Result<usize> {
    std::fs::create_dir_all(target)?;

    let mut exports: Vec<PathBuf> = std::fs::read_dir(source)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    exports.sort();

    let mut written = 0;
    for path in exports {
        let rows = canonicalize_file(&path)?;
        let stem = crate::convert::file_stem(&path)?;
        let out = target.join(format!("{stem}.json"));
        std::fs::write(&out, serde_json::to_string(&rows)?)?;
        info!("canonicalized {} -> {}", path.display(), out.display());
        written += 1;
    }

    Ok(written)
}

/// Parse one delimited export into row records.
fn canonicalize_file(
    path: &Path,
) -> Result<Vec<serde_json::Map<String, Value>>> {
    let bytes = std::fs::read(path)?;
    let text = decode_text(&bytes);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> =
        reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = serde_json::Map::new();
        for (i, header) in headers.iter().enumerate() {
            let cell = record.get(i).unwrap_or("");
            row.insert(header.clone(), Value::String(cell.to_string()));
        }
        rows.push(row);
    }

    Ok(rows)
}

/// Decode as UTF-8, falling back to Latin-1 for legacy exports.
fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        // Latin-1 maps every byte to the code point of the same value.
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}
