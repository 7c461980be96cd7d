use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::classifier::{ClassifierConfig, PageClassifier};
use crate::cli::SortArgs;
use crate::export::{LopdfSplitter, PageSplitter, build_archive, write_archive};
use crate::grouping::group;
use crate::model::{SortPaths, SortRunManifest, ToolVersions};
use crate::recognition::{PdftoppmRasterizer, PdftotextLayer, TesseractEngine};
use crate::report::{counts, diagnostic_rows, group_entries, print_table};
use crate::session::{ClassificationRun, DocumentSource, Session};
use crate::util::{command_version_optional, now_utc_string, utc_compact_string, write_json_pretty};

use super::build_matcher;

/// Run-level facts recorded in the manifest but decided before classification.
struct RunInfo {
    run_id: String,
    started_ts: DateTime<Utc>,
    started_at: String,
    weak_text_min_chars: usize,
    sender_zips: Vec<String>,
    tool_versions: ToolVersions,
}

pub fn run(args: SortArgs, ocr_engine: &TesseractEngine) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("sort-{}", utc_compact_string(started_ts));

    let matcher = build_matcher(&args.senders)?;
    let config = ClassifierConfig {
        weak_text_min_chars: args.weak_text_min_chars,
    };
    let classifier = PageClassifier::new(&matcher, config);
    let text_layer = PdftotextLayer::new();
    let splitter = LopdfSplitter::new();

    let document = DocumentSource::open(&args.input)
        .with_context(|| format!("failed to load {}", args.input.display()))?;
    info!(
        input = %args.input.display(),
        sha256 = %document.sha256(),
        run_id = %run_id,
        "starting sort"
    );

    let mut session = Session::new();
    let loaded = session.load(&document, |document| {
        classifier.text_pass(document, &text_layer)
    })?;

    let mut warnings = Vec::new();
    let pending = loaded.unresolved_pages().len();
    if pending > 0 && args.ocr {
        let rasterizer = PdftoppmRasterizer::new(args.dpi);
        info!(pages = pending, lang = %ocr_engine.lang(), "starting ocr pass");
        let summary = classifier.ocr_pass(
            loaded,
            &document,
            &rasterizer,
            ocr_engine,
            |done, total| info!(done, total, "ocr progress"),
        )?;
        info!(
            resolved = summary.resolved,
            unresolved = summary.unresolved,
            failed = summary.failed,
            "ocr pass complete"
        );
    } else if pending > 0 {
        let message = format!(
            "{pending} page(s) could not be read from the text layer; rerun with --ocr to scan them"
        );
        warn!(pages = pending, "{message}");
        warnings.push(message);
    }

    let run = session
        .run()
        .context("no classification run is loaded")?;
    print_table(&diagnostic_rows(run), args.json)?;

    let info = RunInfo {
        run_id,
        started_ts,
        started_at,
        weak_text_min_chars: classifier.config().weak_text_min_chars,
        sender_zips: matcher.sender_zips().iter().cloned().collect(),
        tool_versions: ToolVersions {
            pdftotext: command_version_optional("pdftotext", &["-v"]),
            pdftoppm: args
                .ocr
                .then(|| command_version_optional("pdftoppm", &["-v"]))
                .flatten(),
            tesseract: args
                .ocr
                .then(|| ocr_engine.version().ok().map(str::to_string))
                .flatten(),
        },
    };

    write_outputs(&args, info, &document, run, &splitter, warnings)?;
    Ok(())
}

/// Writes the archive and the run manifest for a finished run. Returns the
/// manifest path, or `None` on a dry run.
fn write_outputs(
    args: &SortArgs,
    info: RunInfo,
    document: &DocumentSource,
    run: &ClassificationRun,
    splitter: &dyn PageSplitter,
    mut warnings: Vec<String>,
) -> Result<Option<PathBuf>> {
    for failure in run.failures() {
        warnings.push(format!(
            "{} failed for page {}: {}",
            failure.stage.as_str(),
            failure.page_index + 1,
            failure.message
        ));
    }

    let groups = group(run.pages());

    if args.dry_run {
        info!(groups = groups.len(), "dry-run complete; nothing written");
        return Ok(None);
    }

    let archive_path = if groups.is_empty() {
        let message = "no page was resolved to a state; archive not written".to_string();
        warn!("{message}");
        warnings.push(message);
        None
    } else {
        let path = args.output_dir.join(&args.archive_name);
        let archive = build_archive(document, &groups, splitter)?;
        write_archive(&path, &archive)?;
        Some(path)
    };

    let report_path = args.output_dir.join(format!(
        "sort_report_{}.json",
        utc_compact_string(info.started_ts)
    ));
    let manifest = SortRunManifest {
        manifest_version: 1,
        run_id: info.run_id,
        started_at: info.started_at,
        updated_at: now_utc_string(),
        document_sha256: document.sha256().to_string(),
        command: render_sort_command(args),
        ocr_requested: args.ocr,
        weak_text_min_chars: info.weak_text_min_chars,
        sender_zips: info.sender_zips,
        tool_versions: info.tool_versions,
        paths: SortPaths {
            input_path: args.input.display().to_string(),
            output_dir: args.output_dir.display().to_string(),
            archive_path: archive_path.as_ref().map(|path| path.display().to_string()),
            report_path: report_path.display().to_string(),
        },
        counts: counts(run, &groups),
        groups: group_entries(&groups, splitter.extension()),
        pages: diagnostic_rows(run),
        failures: run.failures().to_vec(),
        warnings,
    };
    write_json_pretty(&report_path, &manifest)?;

    info!(path = %report_path.display(), "wrote sort report");
    info!(
        pages = manifest.counts.page_count,
        resolved = manifest.counts.text_layer_resolved + manifest.counts.ocr_resolved,
        unresolved = manifest.counts.unresolved,
        groups = manifest.counts.state_groups,
        "sort completed"
    );

    Ok(Some(report_path))
}

fn render_sort_command(args: &SortArgs) -> String {
    let mut command = vec![
        "labelsort".to_string(),
        "sort".to_string(),
        args.input.display().to_string(),
        "--output-dir".to_string(),
        args.output_dir.display().to_string(),
        "--archive-name".to_string(),
        args.archive_name.clone(),
        "--weak-text-min-chars".to_string(),
        args.weak_text_min_chars.to_string(),
    ];

    if args.ocr {
        command.push("--ocr".to_string());
        command.push("--ocr-lang".to_string());
        command.push(args.ocr_lang.clone());
        command.push("--dpi".to_string());
        command.push(args.dpi.to_string());
    }
    for zip in &args.senders.sender_zips {
        command.push("--sender-zip".to_string());
        command.push(zip.clone());
    }
    if args.senders.no_default_sender_zips {
        command.push("--no-default-sender-zips".to_string());
    }
    if args.dry_run {
        command.push("--dry-run".to_string());
    }
    if args.json {
        command.push("--json".to_string());
    }

    command.join(" ")
}
