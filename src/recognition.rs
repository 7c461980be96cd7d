use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use anyhow::{Context, Result, anyhow, bail};
use tempfile::TempDir;
use tracing::debug;

use crate::session::DocumentSource;
use crate::util::command_version_optional;

/// Structured text extraction from the document's own text layer.
pub trait TextLayer {
    fn page_count(&self, document: &DocumentSource) -> Result<usize>;

    /// Text of one page (0-based). Empty when the page has no text layer.
    fn page_text(&self, document: &DocumentSource, page_index: usize) -> Result<String>;
}

pub trait PageRasterizer {
    fn rasterize(&self, document: &DocumentSource, page_index: usize) -> Result<PageImage>;
}

pub trait TextRecognizer {
    /// Recognized text fragments joined by single spaces.
    fn recognize(&self, image: &PageImage) -> Result<String>;
}

/// A rendered page. Owns the scratch directory the image lives in, if any.
#[derive(Debug)]
pub struct PageImage {
    page_index: usize,
    path: PathBuf,
    _scratch: Option<TempDir>,
}

impl PageImage {
    #[cfg(test)]
    pub fn new(page_index: usize, path: PathBuf) -> Self {
        Self {
            page_index,
            path,
            _scratch: None,
        }
    }

    fn in_scratch(page_index: usize, path: PathBuf, scratch: TempDir) -> Self {
        Self {
            page_index,
            path,
            _scratch: Some(scratch),
        }
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone, Default)]
pub struct PdftotextLayer;

impl PdftotextLayer {
    pub fn new() -> Self {
        Self
    }
}

impl TextLayer for PdftotextLayer {
    fn page_count(&self, document: &DocumentSource) -> Result<usize> {
        let output = Command::new("pdfinfo")
            .arg(document.path())
            .output()
            .context("failed to execute pdfinfo; is poppler-utils installed?")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("pdfinfo returned non-zero exit status: {}", stderr.trim());
        }

        parse_pdfinfo_pages(&String::from_utf8_lossy(&output.stdout))
    }

    fn page_text(&self, document: &DocumentSource, page_index: usize) -> Result<String> {
        let page_number = page_index + 1;
        let output = Command::new("pdftotext")
            .arg("-enc")
            .arg("UTF-8")
            .arg("-f")
            .arg(page_number.to_string())
            .arg("-l")
            .arg(page_number.to_string())
            .arg(document.path())
            .arg("-")
            .output()
            .with_context(|| format!("failed to execute pdftotext for page {page_number}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "pdftotext returned non-zero exit status for page {}: {}",
                page_number,
                stderr.trim()
            );
        }

        Ok(clean_extracted_text(&String::from_utf8_lossy(&output.stdout)))
    }
}

fn parse_pdfinfo_pages(stdout: &str) -> Result<usize> {
    for line in stdout.lines() {
        if let Some(rest) = line.strip_prefix("Pages:") {
            let num_str = rest.trim();
            return num_str.parse::<usize>().with_context(|| {
                format!("failed to parse page count from 'Pages:' line: {num_str}")
            });
        }
    }

    bail!("pdfinfo output did not contain a 'Pages:' line")
}

fn clean_extracted_text(raw: &str) -> String {
    raw.replace(['\u{000C}', '\u{0000}'], "")
}

#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    dpi: u32,
}

impl PdftoppmRasterizer {
    pub fn new(dpi: u32) -> Self {
        Self { dpi }
    }
}

impl PageRasterizer for PdftoppmRasterizer {
    fn rasterize(&self, document: &DocumentSource, page_index: usize) -> Result<PageImage> {
        let page_number = page_index + 1;
        let scratch = tempfile::Builder::new()
            .prefix("labelsort_page_")
            .tempdir()
            .context("failed to create rasterization scratch directory")?;
        let output_root = scratch.path().join(format!("page_{page_number:04}"));
        let png_path = output_root.with_extension("png");

        let output = Command::new("pdftoppm")
            .arg("-f")
            .arg(page_number.to_string())
            .arg("-l")
            .arg(page_number.to_string())
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-singlefile")
            .arg("-png")
            .arg(document.path())
            .arg(&output_root)
            .output()
            .with_context(|| format!("failed to execute pdftoppm for page {page_number}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "pdftoppm returned non-zero exit status for page {}: {}",
                page_number,
                stderr.trim()
            );
        }

        if !png_path.exists() {
            bail!("pdftoppm did not produce expected image for page {page_number}");
        }

        debug!(page = page_number, path = %png_path.display(), "rasterized page");
        Ok(PageImage::in_scratch(page_index, png_path, scratch))
    }
}

/// Handle to the tesseract engine.
///
/// Built once by the caller and shared by reference. The engine binary is
/// probed on first use only and the outcome is kept for later calls.
#[derive(Debug)]
pub struct TesseractEngine {
    lang: String,
    probe: OnceLock<std::result::Result<String, String>>,
}

impl TesseractEngine {
    pub fn new(lang: impl Into<String>) -> Self {
        Self {
            lang: lang.into(),
            probe: OnceLock::new(),
        }
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    pub fn version(&self) -> Result<&str> {
        let probe = self.probe.get_or_init(|| {
            command_version_optional("tesseract", &["--version"])
                .ok_or_else(|| "tesseract not found (install tesseract-ocr)".to_string())
        });

        match probe {
            Ok(version) => Ok(version.as_str()),
            Err(message) => Err(anyhow!(message.clone())),
        }
    }
}

impl TextRecognizer for TesseractEngine {
    fn recognize(&self, image: &PageImage) -> Result<String> {
        self.version()?;

        let output = Command::new("tesseract")
            .arg(image.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.lang)
            .output()
            .with_context(|| {
                format!("failed to execute tesseract for {}", image.path().display())
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "tesseract returned non-zero exit status for page {}: {}",
                image.page_index() + 1,
                stderr.trim()
            );
        }

        Ok(join_fragments(&String::from_utf8_lossy(&output.stdout)))
    }
}

fn join_fragments(raw: &str) -> String {
    clean_extracted_text(raw)
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
}
