use std::collections::BTreeSet;
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use lopdf::Document;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::grouping::StateGroups;
use crate::session::DocumentSource;
use crate::util::ensure_directory;

pub const DEFAULT_ARCHIVE_NAME: &str = "Sorted_V18_Final.zip";

pub trait PageSplitter {
    /// File extension of the documents this splitter produces.
    fn extension(&self) -> &str;

    /// A new document holding exactly `page_indices` (0-based, ascending) of
    /// the source, in that order.
    fn extract_pages(&self, document: &DocumentSource, page_indices: &[usize]) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Default)]
pub struct LopdfSplitter;

impl LopdfSplitter {
    pub fn new() -> Self {
        Self
    }
}

impl PageSplitter for LopdfSplitter {
    fn extension(&self) -> &str {
        "pdf"
    }

    fn extract_pages(&self, document: &DocumentSource, page_indices: &[usize]) -> Result<Vec<u8>> {
        let mut pdf = Document::load_mem(document.bytes()).context("failed to parse source PDF")?;
        let page_count = pdf.get_pages().len();

        let keep = page_indices
            .iter()
            .map(|index| *index as u32 + 1)
            .collect::<BTreeSet<u32>>();
        if let Some(out_of_range) = keep.iter().find(|number| **number as usize > page_count) {
            bail!(
                "page {} requested but source document has {} pages",
                out_of_range,
                page_count
            );
        }

        let discard = pdf
            .get_pages()
            .keys()
            .copied()
            .filter(|number| !keep.contains(number))
            .collect::<Vec<u32>>();
        pdf.delete_pages(&discard);
        pdf.prune_objects();
        pdf.renumber_objects();
        pdf.compress();

        let mut buffer = Vec::new();
        pdf.save_to(&mut buffer)
            .context("failed to serialize extracted pages")?;
        Ok(buffer)
    }
}

/// Builds one document per state group and packs them into a single ZIP.
pub fn build_archive(
    document: &DocumentSource,
    groups: &StateGroups,
    splitter: &dyn PageSplitter,
) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for group in groups.iter() {
        let entry_name = group.entry_name(splitter.extension());
        let bytes = splitter
            .extract_pages(document, &group.pages)
            .with_context(|| format!("failed to build {entry_name}"))?;

        writer
            .start_file(entry_name.as_str(), options)
            .with_context(|| format!("failed to start archive entry {entry_name}"))?;
        writer
            .write_all(&bytes)
            .with_context(|| format!("failed to write archive entry {entry_name}"))?;

        debug!(entry = %entry_name, pages = group.pages.len(), "added archive entry");
    }

    let cursor = writer.finish().context("failed to finalize archive")?;
    Ok(cursor.into_inner())
}

pub fn write_archive(path: &Path, archive: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }
    fs::write(path, archive).with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), bytes = archive.len(), "wrote archive");
    Ok(())
}
