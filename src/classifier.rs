use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::matcher::StateMatcher;
use crate::model::{FailureStage, PageResult, RecognitionFailure, RecognitionMethod};
use crate::recognition::{PageRasterizer, TextLayer, TextRecognizer};
use crate::session::{ClassificationRun, DocumentSource};
use crate::states::StateCode;

pub const DEFAULT_WEAK_TEXT_MIN_CHARS: usize = 20;

#[derive(Debug, Clone, Copy)]
pub struct ClassifierConfig {
    /// Pages whose trimmed text layer is shorter than this are left for OCR.
    pub weak_text_min_chars: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            weak_text_min_chars: DEFAULT_WEAK_TEXT_MIN_CHARS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OcrPassSummary {
    pub attempted: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub failed: usize,
}

pub fn is_weak_text(text: &str, min_chars: usize) -> bool {
    text.trim().chars().count() < min_chars
}

pub struct PageClassifier<'a> {
    matcher: &'a StateMatcher,
    config: ClassifierConfig,
}

impl<'a> PageClassifier<'a> {
    pub fn new(matcher: &'a StateMatcher, config: ClassifierConfig) -> Self {
        Self { matcher, config }
    }

    pub fn config(&self) -> ClassifierConfig {
        self.config
    }

    /// Text-layer verdict for one page. Weak text never yields a state, even
    /// when the fragment happens to contain a matching pair.
    pub fn classify_text(&self, raw_text: &str) -> Option<StateCode> {
        if is_weak_text(raw_text, self.config.weak_text_min_chars) {
            return None;
        }
        self.matcher.extract_state(raw_text)
    }

    /// First pass over every page, in document order, using the text layer.
    ///
    /// Only a failure to count pages aborts the pass. A page whose text cannot
    /// be extracted is recorded as a failure and left unresolved for OCR.
    pub fn text_pass(
        &self,
        document: &DocumentSource,
        text_layer: &dyn TextLayer,
    ) -> Result<ClassificationRun> {
        let page_count = text_layer
            .page_count(document)
            .context("failed to read page count from text layer")?;

        let mut pages = Vec::with_capacity(page_count);
        let mut failures = Vec::new();
        for page_index in 0..page_count {
            let raw_text = match text_layer.page_text(document, page_index) {
                Ok(text) => text,
                Err(error) => {
                    let message = format!("{error:#}");
                    warn!(
                        page = page_index + 1,
                        error = %message,
                        "text layer failed for page; leaving it for ocr"
                    );
                    failures.push(RecognitionFailure {
                        page_index,
                        stage: FailureStage::TextLayer,
                        message,
                    });
                    String::new()
                }
            };
            let state = self.classify_text(&raw_text);

            debug!(
                page = page_index + 1,
                chars = raw_text.trim().chars().count(),
                state = state.map(StateCode::as_str).unwrap_or("-"),
                "text layer classified page"
            );

            pages.push(PageResult {
                page_index,
                state,
                raw_text,
                method: RecognitionMethod::TextLayer,
            });
        }

        let mut run = ClassificationRun::new(document.sha256().to_string(), pages);
        for failure in failures {
            run.record_failure(failure);
        }
        info!(
            pages = page_count,
            resolved = run.resolved_count(),
            pending = page_count - run.resolved_count(),
            "text layer pass complete"
        );
        Ok(run)
    }

    /// Second pass: OCR over the pages that are still unresolved.
    ///
    /// Runs one page at a time. A rasterization or OCR error is recorded on
    /// the run and the pass moves on to the next page. `on_progress` receives
    /// `(done, total)` after every page.
    pub fn ocr_pass(
        &self,
        run: &mut ClassificationRun,
        document: &DocumentSource,
        rasterizer: &dyn PageRasterizer,
        recognizer: &dyn TextRecognizer,
        mut on_progress: impl FnMut(usize, usize),
    ) -> Result<OcrPassSummary> {
        if run.document_sha256() != document.sha256() {
            bail!("classification run does not belong to the supplied document");
        }

        let pending = run.unresolved_pages();
        let total = pending.len();
        let mut summary = OcrPassSummary::default();

        for (done, page_index) in pending.into_iter().enumerate() {
            summary.attempted += 1;
            let page_number = page_index + 1;

            match self.recognize_page(document, page_index, rasterizer, recognizer) {
                Ok(state) => {
                    if run.apply_ocr_result(page_index, state) {
                        summary.resolved += 1;
                        info!(
                            page = page_number,
                            state = state.map(StateCode::as_str).unwrap_or("-"),
                            "ocr resolved page"
                        );
                    } else {
                        summary.unresolved += 1;
                        info!(page = page_number, "ocr found no recipient state");
                    }
                }
                Err(failure) => {
                    summary.failed += 1;
                    warn!(
                        page = page_number,
                        stage = ?failure.stage,
                        error = %failure.message,
                        "ocr failed for page"
                    );
                    run.record_failure(failure);
                }
            }

            on_progress(done + 1, total);
        }

        Ok(summary)
    }

    fn recognize_page(
        &self,
        document: &DocumentSource,
        page_index: usize,
        rasterizer: &dyn PageRasterizer,
        recognizer: &dyn TextRecognizer,
    ) -> std::result::Result<Option<StateCode>, RecognitionFailure> {
        let failure = |stage: FailureStage, error: anyhow::Error| RecognitionFailure {
            page_index,
            stage,
            message: format!("{error:#}"),
        };

        let image = rasterizer
            .rasterize(document, page_index)
            .map_err(|error| failure(FailureStage::Rasterize, error))?;
        let text = recognizer
            .recognize(&image)
            .map_err(|error| failure(FailureStage::Recognize, error))?;

        Ok(self.matcher.extract_state(&text))
    }
}

#[cfg(test)]
mod tests;
