use serde::Serialize;

use crate::states::StateCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecognitionMethod {
    #[serde(rename = "TextLayer")]
    TextLayer,
    #[serde(rename = "OCR")]
    Ocr,
}

impl RecognitionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TextLayer => "TextLayer",
            Self::Ocr => "OCR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStage {
    TextLayerResolved,
    TextLayerUnresolved,
    OcrResolved,
    OcrUnresolved,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageResult {
    pub page_index: usize,
    pub state: Option<StateCode>,
    pub raw_text: String,
    pub method: RecognitionMethod,
}

impl PageResult {
    pub fn page_number(&self) -> usize {
        self.page_index + 1
    }

    pub fn is_resolved(&self) -> bool {
        self.state.is_some()
    }

    pub fn stage(&self) -> PageStage {
        match (self.method, self.state.is_some()) {
            (RecognitionMethod::TextLayer, true) => PageStage::TextLayerResolved,
            (RecognitionMethod::TextLayer, false) => PageStage::TextLayerUnresolved,
            (RecognitionMethod::Ocr, true) => PageStage::OcrResolved,
            (RecognitionMethod::Ocr, false) => PageStage::OcrUnresolved,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    TextLayer,
    Rasterize,
    Recognize,
}

impl FailureStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TextLayer => "text layer",
            Self::Rasterize => "rasterize",
            Self::Recognize => "OCR",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecognitionFailure {
    pub page_index: usize,
    pub stage: FailureStage,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolVersions {
    pub pdftotext: Option<String>,
    pub pdftoppm: Option<String>,
    pub tesseract: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SortPaths {
    pub input_path: String,
    pub output_dir: String,
    pub archive_path: Option<String>,
    pub report_path: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SortCounts {
    pub page_count: usize,
    pub text_layer_resolved: usize,
    pub ocr_resolved: usize,
    pub unresolved: usize,
    pub text_layer_failures: usize,
    pub ocr_failures: usize,
    pub state_groups: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateGroupEntry {
    pub state: StateCode,
    pub entry_name: String,
    pub pages: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticRow {
    pub page: usize,
    pub result: Option<StateCode>,
    pub method: RecognitionMethod,
    pub stage: PageStage,
    pub failure: Option<FailureStage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SortRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub started_at: String,
    pub updated_at: String,
    pub document_sha256: String,
    pub command: String,
    pub ocr_requested: bool,
    pub weak_text_min_chars: usize,
    pub sender_zips: Vec<String>,
    pub tool_versions: ToolVersions,
    pub paths: SortPaths,
    pub counts: SortCounts,
    pub groups: Vec<StateGroupEntry>,
    pub pages: Vec<DiagnosticRow>,
    pub failures: Vec<RecognitionFailure>,
    pub warnings: Vec<String>,
}
