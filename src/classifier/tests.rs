use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read};
use std::path::PathBuf;

use anyhow::{Result, anyhow};
use zip::ZipArchive;

use super::*;
use crate::export::{LopdfSplitter, build_archive};
use crate::grouping::group;
use crate::model::PageStage;
use crate::recognition::PageImage;
use crate::test_support::{page_widths, sample_pdf};

struct FakeTextLayer {
    pages: Vec<&'static str>,
}

impl TextLayer for FakeTextLayer {
    fn page_count(&self, _document: &DocumentSource) -> Result<usize> {
        Ok(self.pages.len())
    }

    fn page_text(&self, _document: &DocumentSource, page_index: usize) -> Result<String> {
        self.pages
            .get(page_index)
            .map(|text| text.to_string())
            .ok_or_else(|| anyhow!("no page {page_index}"))
    }
}

#[derive(Default)]
struct FakeRasterizer {
    broken_pages: Vec<usize>,
    rendered: RefCell<Vec<usize>>,
}

impl PageRasterizer for FakeRasterizer {
    fn rasterize(&self, _document: &DocumentSource, page_index: usize) -> Result<PageImage> {
        self.rendered.borrow_mut().push(page_index);
        if self.broken_pages.contains(&page_index) {
            return Err(anyhow!("renderer crashed"));
        }
        Ok(PageImage::new(
            page_index,
            PathBuf::from(format!("page_{page_index}.png")),
        ))
    }
}

struct FakeRecognizer {
    texts: HashMap<usize, &'static str>,
}

impl TextRecognizer for FakeRecognizer {
    fn recognize(&self, image: &PageImage) -> Result<String> {
        self.texts
            .get(&image.page_index())
            .map(|text| text.to_string())
            .ok_or_else(|| anyhow!("engine returned nothing"))
    }
}

const NY_LABEL: &str = "FROM: WAREHOUSE CA 91761 SHIP TO: BUYER 1 MAIN ST NEW YORK NY 10001";
const NY_LABEL_2: &str = "RETURN CA 92841 DELIVER TO: 9 ELM RD ALBANY NY 12207 USA";

fn document(pages: usize) -> DocumentSource {
    let widths = (0..pages).map(|index| 100 + index as i64 * 100).collect::<Vec<_>>();
    DocumentSource::from_bytes(sample_pdf(&widths)).unwrap()
}

fn matcher() -> StateMatcher {
    StateMatcher::with_default_senders().unwrap()
}

fn summary_of(groups: &crate::grouping::StateGroups) -> BTreeMap<&'static str, Vec<usize>> {
    groups
        .iter()
        .map(|group| (group.state.as_str(), group.pages.clone()))
        .collect()
}

#[test]
fn weak_text_threshold_counts_trimmed_characters() {
    assert!(is_weak_text("   NY 10001   ", 20));
    assert!(is_weak_text("", 20));
    assert!(!is_weak_text("SHIP TO: NEW YORK NY 10001", 20));
    assert!(!is_weak_text("NY 10001", 8));
}

#[test]
fn weak_text_never_resolves_even_with_a_valid_pair() {
    let matcher = matcher();
    let classifier = PageClassifier::new(&matcher, ClassifierConfig::default());
    assert_eq!(classifier.classify_text("TX 75555"), None);

    let lenient = PageClassifier::new(
        &matcher,
        ClassifierConfig {
            weak_text_min_chars: 5,
        },
    );
    assert_eq!(
        lenient.classify_text("TX 75555").map(StateCode::as_str),
        Some("TX")
    );
}

#[test]
fn text_pass_records_every_page_as_text_layer() {
    let matcher = matcher();
    let classifier = PageClassifier::new(&matcher, ClassifierConfig::default());
    let document = document(3);
    let text_layer = FakeTextLayer {
        pages: vec![NY_LABEL, "scan", NY_LABEL_2],
    };

    let run = classifier.text_pass(&document, &text_layer).unwrap();

    assert_eq!(run.pages().len(), 3);
    for (index, page) in run.pages().iter().enumerate() {
        assert_eq!(page.page_index, index);
        assert_eq!(page.method, RecognitionMethod::TextLayer);
    }
    assert_eq!(run.pages()[1].raw_text, "scan");
    assert_eq!(run.pages()[1].stage(), PageStage::TextLayerUnresolved);
    assert_eq!(run.unresolved_pages(), vec![1]);
}

#[test]
fn text_pass_propagates_text_layer_errors() {
    struct BrokenLayer;
    impl TextLayer for BrokenLayer {
        fn page_count(&self, _document: &DocumentSource) -> Result<usize> {
            Err(anyhow!("not a pdf"))
        }
        fn page_text(&self, _document: &DocumentSource, _page_index: usize) -> Result<String> {
            unreachable!()
        }
    }

    let matcher = matcher();
    let classifier = PageClassifier::new(&matcher, ClassifierConfig::default());
    assert!(classifier.text_pass(&document(1), &BrokenLayer).is_err());
}

struct FlakyTextLayer {
    pages: Vec<Option<&'static str>>,
}

impl TextLayer for FlakyTextLayer {
    fn page_count(&self, _document: &DocumentSource) -> Result<usize> {
        Ok(self.pages.len())
    }

    fn page_text(&self, _document: &DocumentSource, page_index: usize) -> Result<String> {
        match self.pages.get(page_index) {
            Some(Some(text)) => Ok(text.to_string()),
            _ => Err(anyhow!("pdftotext returned non-zero exit status")),
        }
    }
}

#[test]
fn text_layer_error_on_one_page_leaves_the_rest_resolved() {
    let matcher = matcher();
    let classifier = PageClassifier::new(&matcher, ClassifierConfig::default());
    let document = document(3);
    let text_layer = FlakyTextLayer {
        pages: vec![Some(NY_LABEL), None, Some(NY_LABEL_2)],
    };

    let run = classifier.text_pass(&document, &text_layer).unwrap();

    assert_eq!(run.pages().len(), 3);
    assert_eq!(run.pages()[0].state.map(StateCode::as_str), Some("NY"));
    assert_eq!(run.pages()[2].state.map(StateCode::as_str), Some("NY"));
    assert_eq!(run.pages()[1].raw_text, "");
    assert_eq!(run.pages()[1].stage(), PageStage::TextLayerUnresolved);
    assert_eq!(run.unresolved_pages(), vec![1]);

    assert_eq!(run.failures().len(), 1);
    assert_eq!(run.failures()[0].page_index, 1);
    assert_eq!(run.failures()[0].stage, FailureStage::TextLayer);
    assert!(run.failures()[0].message.contains("non-zero exit status"));
}

#[test]
fn ocr_recovers_a_page_the_text_layer_failed_on() {
    let matcher = matcher();
    let classifier = PageClassifier::new(&matcher, ClassifierConfig::default());
    let document = document(3);
    let text_layer = FlakyTextLayer {
        pages: vec![Some(NY_LABEL), None, Some(NY_LABEL_2)],
    };
    let rasterizer = FakeRasterizer::default();
    let recognizer = FakeRecognizer {
        texts: HashMap::from([(1, "SHIP TO AUSTIN TX 78701")]),
    };

    let mut run = classifier.text_pass(&document, &text_layer).unwrap();
    classifier
        .ocr_pass(&mut run, &document, &rasterizer, &recognizer, |_, _| {})
        .unwrap();

    assert_eq!(*rasterizer.rendered.borrow(), vec![1]);
    assert_eq!(
        summary_of(&group(run.pages())),
        BTreeMap::from([("NY", vec![0, 2]), ("TX", vec![1])])
    );
    assert_eq!(run.pages()[1].stage(), PageStage::OcrResolved);
}

#[test]
fn three_page_document_groups_after_text_pass_and_exports_ny() {
    let matcher = matcher();
    let classifier = PageClassifier::new(&matcher, ClassifierConfig::default());
    let document = document(3);
    let text_layer = FakeTextLayer {
        pages: vec![NY_LABEL, "  FL 3 ", NY_LABEL_2],
    };

    let run = classifier.text_pass(&document, &text_layer).unwrap();
    let groups = group(run.pages());

    assert_eq!(summary_of(&groups), BTreeMap::from([("NY", vec![0, 2])]));
    assert!(!run.pages()[1].is_resolved());

    let archive = build_archive(&document, &groups, &LopdfSplitter::new()).unwrap();
    let mut archive = ZipArchive::new(Cursor::new(archive)).unwrap();
    assert_eq!(archive.len(), 1);
    let mut ny = Vec::new();
    archive
        .by_name("NY.pdf")
        .unwrap()
        .read_to_end(&mut ny)
        .unwrap();
    assert_eq!(page_widths(&ny), vec![100, 300]);
}

#[test]
fn ocr_pass_resolves_pending_page_and_marks_method() {
    let matcher = matcher();
    let classifier = PageClassifier::new(&matcher, ClassifierConfig::default());
    let document = document(3);
    let text_layer = FakeTextLayer {
        pages: vec![NY_LABEL, "", NY_LABEL_2],
    };
    let rasterizer = FakeRasterizer::default();
    let recognizer = FakeRecognizer {
        texts: HashMap::from([(1, "RETURN CA 92841 SHIP TO MIAMI F L 3 3 1 0 1")]),
    };

    let mut run = classifier.text_pass(&document, &text_layer).unwrap();
    let summary = classifier
        .ocr_pass(&mut run, &document, &rasterizer, &recognizer, |_, _| {})
        .unwrap();

    assert_eq!(
        summary,
        OcrPassSummary {
            attempted: 1,
            resolved: 1,
            unresolved: 0,
            failed: 0,
        }
    );
    assert_eq!(*rasterizer.rendered.borrow(), vec![1]);
    assert_eq!(
        summary_of(&group(run.pages())),
        BTreeMap::from([("NY", vec![0, 2]), ("FL", vec![1])])
    );
    assert_eq!(run.pages()[1].method, RecognitionMethod::Ocr);
    assert_eq!(run.pages()[1].stage(), PageStage::OcrResolved);
    assert_eq!(run.pages()[0].method, RecognitionMethod::TextLayer);
    assert_eq!(run.pages()[1].raw_text, "");
}

#[test]
fn ocr_pass_never_touches_resolved_pages() {
    let matcher = matcher();
    let classifier = PageClassifier::new(&matcher, ClassifierConfig::default());
    let document = document(2);
    let text_layer = FakeTextLayer {
        pages: vec![NY_LABEL, ""],
    };
    let rasterizer = FakeRasterizer::default();
    let recognizer = FakeRecognizer {
        texts: HashMap::from([(0, "SHIP TO TX 75555"), (1, "SHIP TO TX 75555")]),
    };

    let mut run = classifier.text_pass(&document, &text_layer).unwrap();
    classifier
        .ocr_pass(&mut run, &document, &rasterizer, &recognizer, |_, _| {})
        .unwrap();

    assert_eq!(*rasterizer.rendered.borrow(), vec![1]);
    assert_eq!(run.pages()[0].state.map(StateCode::as_str), Some("NY"));
    assert_eq!(run.pages()[0].stage(), PageStage::TextLayerResolved);
}

#[test]
fn one_failing_page_does_not_stop_the_others() {
    let matcher = matcher();
    let classifier = PageClassifier::new(&matcher, ClassifierConfig::default());
    let document = document(4);
    let text_layer = FakeTextLayer {
        pages: vec!["", "", "", ""],
    };
    let rasterizer = FakeRasterizer {
        broken_pages: vec![1],
        ..FakeRasterizer::default()
    };
    let recognizer = FakeRecognizer {
        texts: HashMap::from([
            (0, "SHIP TO SEATTLE WA 98101"),
            (2, "NOTHING USEFUL HERE"),
            (3, "SHIP TO PORTLAND OR 97201"),
        ]),
    };
    let mut progress = Vec::new();

    let mut run = classifier.text_pass(&document, &text_layer).unwrap();
    let summary = classifier
        .ocr_pass(&mut run, &document, &rasterizer, &recognizer, |done, total| {
            progress.push((done, total))
        })
        .unwrap();

    assert_eq!(*rasterizer.rendered.borrow(), vec![0, 1, 2, 3]);
    assert_eq!(progress, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    assert_eq!(summary.resolved, 2);
    assert_eq!(summary.unresolved, 1);
    assert_eq!(summary.failed, 1);

    assert_eq!(run.failures().len(), 1);
    assert_eq!(run.failures()[0].page_index, 1);
    assert_eq!(run.failures()[0].stage, FailureStage::Rasterize);
    assert!(run.failures()[0].message.contains("renderer crashed"));

    let stages = run.pages().iter().map(PageResult::stage).collect::<Vec<_>>();
    assert_eq!(
        stages,
        vec![
            PageStage::OcrResolved,
            PageStage::TextLayerUnresolved,
            PageStage::OcrUnresolved,
            PageStage::OcrResolved,
        ]
    );
    assert_eq!(run.unresolved_pages(), vec![1, 2]);
}

#[test]
fn recognizer_errors_are_reported_as_recognize_failures() {
    let matcher = matcher();
    let classifier = PageClassifier::new(&matcher, ClassifierConfig::default());
    let document = document(2);
    let text_layer = FakeTextLayer {
        pages: vec!["", ""],
    };
    let rasterizer = FakeRasterizer::default();
    let recognizer = FakeRecognizer {
        texts: HashMap::from([(1, "SHIP TO DENVER CO 80202")]),
    };

    let mut run = classifier.text_pass(&document, &text_layer).unwrap();
    let summary = classifier
        .ocr_pass(&mut run, &document, &rasterizer, &recognizer, |_, _| {})
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.resolved, 1);
    assert_eq!(run.failures()[0].stage, FailureStage::Recognize);
    assert_eq!(run.pages()[0].method, RecognitionMethod::TextLayer);
    assert_eq!(run.pages()[1].state.map(StateCode::as_str), Some("CO"));
}

#[test]
fn ocr_pass_rejects_a_run_from_another_document() {
    let matcher = matcher();
    let classifier = PageClassifier::new(&matcher, ClassifierConfig::default());
    let first = document(1);
    let second = document(2);
    let text_layer = FakeTextLayer { pages: vec![""] };

    let mut run = classifier.text_pass(&first, &text_layer).unwrap();
    let result = classifier.ocr_pass(
        &mut run,
        &second,
        &FakeRasterizer::default(),
        &FakeRecognizer {
            texts: HashMap::new(),
        },
        |_, _| {},
    );
    assert!(result.is_err());
}
