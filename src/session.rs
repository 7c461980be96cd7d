use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tempfile::NamedTempFile;

use crate::model::{PageResult, RecognitionFailure, RecognitionMethod};
use crate::states::StateCode;
use crate::util::sha256_hex;

/// An input document held for the lifetime of a run.
///
/// The bytes stay in memory and are also spooled to a private file: every
/// read (text layer, rasterization, export) opens the document again instead
/// of sharing one cursor across phases.
#[derive(Debug)]
pub struct DocumentSource {
    bytes: Vec<u8>,
    sha256: String,
    spool: NamedTempFile,
}

impl DocumentSource {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes =
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            bail!("input document is empty");
        }

        let mut spool = tempfile::Builder::new()
            .prefix("labelsort_")
            .suffix(".pdf")
            .tempfile()
            .context("failed to create document spool file")?;
        spool
            .write_all(&bytes)
            .context("failed to write document spool file")?;
        spool
            .flush()
            .context("failed to flush document spool file")?;

        let sha256 = sha256_hex(&bytes);
        Ok(Self {
            bytes,
            sha256,
            spool,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// On-disk copy for collaborators that only accept a path.
    pub fn path(&self) -> &Path {
        self.spool.path()
    }
}

/// Per-page results for one document. Only the run mutates its pages.
#[derive(Debug, Clone)]
pub struct ClassificationRun {
    document_sha256: String,
    pages: Vec<PageResult>,
    failures: Vec<RecognitionFailure>,
}

impl ClassificationRun {
    pub fn new(document_sha256: String, pages: Vec<PageResult>) -> Self {
        Self {
            document_sha256,
            pages,
            failures: Vec::new(),
        }
    }

    pub fn document_sha256(&self) -> &str {
        &self.document_sha256
    }

    pub fn pages(&self) -> &[PageResult] {
        &self.pages
    }

    pub fn failures(&self) -> &[RecognitionFailure] {
        &self.failures
    }

    pub fn unresolved_pages(&self) -> Vec<usize> {
        self.pages
            .iter()
            .filter(|page| !page.is_resolved())
            .map(|page| page.page_index)
            .collect()
    }

    pub fn resolved_count(&self) -> usize {
        self.pages.iter().filter(|page| page.is_resolved()).count()
    }

    /// Records the outcome of an OCR attempt. A page that already has a
    /// state keeps it; returns whether the page is resolved afterwards.
    pub fn apply_ocr_result(&mut self, page_index: usize, state: Option<StateCode>) -> bool {
        let Some(page) = self.pages.get_mut(page_index) else {
            return false;
        };
        if page.state.is_some() {
            return true;
        }

        page.method = RecognitionMethod::Ocr;
        page.state = state;
        page.state.is_some()
    }

    /// Keeps the page's method as it was: a page is only marked OCR once
    /// the engine has actually returned text for it.
    pub fn record_failure(&mut self, failure: RecognitionFailure) {
        self.failures.push(failure);
    }

    pub fn failure_for(&self, page_index: usize) -> Option<&RecognitionFailure> {
        self.failures
            .iter()
            .rev()
            .find(|failure| failure.page_index == page_index)
    }
}

/// Holds the run for the current document. Loading a different document
/// discards the previous run entirely.
#[derive(Debug, Default)]
pub struct Session {
    run: Option<ClassificationRun>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<F>(
        &mut self,
        document: &DocumentSource,
        classify: F,
    ) -> Result<&mut ClassificationRun>
    where
        F: FnOnce(&DocumentSource) -> Result<ClassificationRun>,
    {
        let run = match self.run.take() {
            Some(run) if run.document_sha256() == document.sha256() => run,
            _ => classify(document)?,
        };
        Ok(self.run.insert(run))
    }

    pub fn run(&self) -> Option<&ClassificationRun> {
        self.run.as_ref()
    }
}
