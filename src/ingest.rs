//! Concurrent PDF ingestion.
//!
//! A fixed pool of worker threads drains a shared queue of PDF paths,
//! driving the external converter and page renderer for each file and
//! persisting every extracted artifact under the workspace. Failures
//! are contained per file (and per picture / per table within a file);
//! the pool always drains the whole queue.

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::{
    convert::{self, ConvertOptions, ConvertedDocument, DocumentConverter, PageRenderer},
    error::Result,
    workspace::Workspace,
};

/// Upper bound on the worker pool; fewer files means fewer workers.
pub const MAX_WORKERS: usize = 4;

/// Counts reported by an ingestion run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub processed: usize,
    pub failed: usize,
}

/// Ingest every PDF in `input`, writing artifacts under `workspace`.
///
/// Files are distributed first come, first served across
/// `min(4, files)` workers; no cross-file ordering is guaranteed. The
/// call returns only after every worker has exited, so all artifacts
/// are on disk when it does. A directory without PDFs is a warning and
/// a no-op, not an error.
pub fn ingest_directory<C, R>(
    input: &Path,
    workspace: &Workspace,
    converter: &C,
    renderer: &R,
) -> Result<IngestSummary>
where
    C: DocumentConverter + Sync,
    R: PageRenderer + Sync,
{
    let pdfs = discover_pdfs(input)?;
    if pdfs.is_empty() {
        warn!("no PDF files found in {}", input.display());
        return Ok(IngestSummary::default());
    }

    let out_root = workspace.root();
    let images_dir = workspace.images_dir()?;
    let workers = pdfs.len().min(MAX_WORKERS);

    let (tx, rx) = crossbeam_channel::unbounded();
    for pdf in pdfs {
        let _ = tx.send(pdf);
    }
    drop(tx);

    let mut summary = IngestSummary::default();
    std::thread::scope(|scope| {
        let images_dir = images_dir.as_path();
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let rx = rx.clone();
                scope.spawn(move || {
                    let mut processed = 0;
                    let mut failed = 0;
                    while let Ok(pdf) = rx.recv() {
                        match process_document(
                            &pdf, out_root, images_dir, converter, renderer,
                        ) {
                            Ok(()) => processed += 1,
                            Err(e) => {
                                error!(
                                    "error processing {}: {e}",
                                    pdf.display()
                                );
                                failed += 1;
                            }
                        }
                    }
                    (processed, failed)
                })
            })
            .collect();

        for handle in handles {
            match handle.join() {
                Ok((processed, failed)) => {
                    summary.processed += processed;
                    summary.failed += failed;
                }
                Err(_) => {
                    error!("ingest worker panicked");
                    summary.failed += 1;
                }
            }
        }
    });

    Ok(summary)
}

/// Convert one PDF and persist its artifact set.
fn process_document<C, R>(
    pdf: &Path,
    out_root: &Path,
    images_dir: &Path,
    converter: &C,
    renderer: &R,
) -> Result<()>
where
    C: DocumentConverter,
    R: PageRenderer,
{
    let stem = convert::file_stem(pdf)?;
    info!("processing {}", pdf.display());

    let doc = converter.convert(pdf, &ConvertOptions::default())?;

    std::fs::write(out_root.join(format!("{stem}.txt")), doc.export_text())?;
    std::fs::write(out_root.join(format!("{stem}.html")), doc.export_html())?;

    let structured = serde_json::to_string_pretty(doc.export_json())?;
    // JSON despite the extension; downstream consumers expect this name.
    std::fs::write(out_root.join(format!("{stem}.yaml")), &structured)?;
    std::fs::write(out_root.join(format!("{stem}_doc.json")), &structured)?;

    let pages = renderer.render_pages(pdf, images_dir)?;

    let mut pictures = 0;
    for index in 0..doc.picture_count() {
        match doc.picture_bytes(index) {
            Ok(bytes) => {
                pictures += 1;
                let out = images_dir.join(format!("{stem}_pic_{pictures}.png"));
                std::fs::write(out, bytes)?;
            }
            Err(e) => warn!(
                "skipping embedded picture {} of {}: {e}",
                index + 1,
                pdf.display()
            ),
        }
    }

    let mut tables = 0;
    for index in 0..doc.table_count() {
        match doc.table_markdown(index) {
            Ok(markdown) => {
                let out = out_root.join(format!("{stem}_table{}.md", index + 1));
                std::fs::write(out, markdown)?;
                tables += 1;
            }
            Err(e) => {
                warn!("skipping table {} of {}: {e}", index + 1, pdf.display())
            }
        }
    }

    info!(
        "finished {}: {} pages, {pictures} pictures, {tables} tables",
        pdf.display(),
        pages.len()
    );
    Ok(())
}

fn discover_pdfs(input: &Path) -> Result<Vec<PathBuf>> {
    let mut pdfs = Vec::new();
    for entry in std::fs::read_dir(input)? {
        let entry = entry?;
        let path = entry.path();
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if is_pdf && entry.file_type()?.is_file() {
            pdfs.push(path);
        }
    }
    pdfs.sort();
    Ok(pdfs)
}
