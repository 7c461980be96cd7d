use std::io::{self, Write};

use anyhow::{Context, Result};

use crate::grouping::StateGroups;
use crate::model::{DiagnosticRow, FailureStage, PageStage, SortCounts, StateGroupEntry};
use crate::session::ClassificationRun;

pub const UNRESOLVED_MARKER: &str = "UNRESOLVED";

pub fn diagnostic_rows(run: &ClassificationRun) -> Vec<DiagnosticRow> {
    run.pages()
        .iter()
        .map(|page| DiagnosticRow {
            page: page.page_number(),
            result: page.state,
            method: page.method,
            stage: page.stage(),
            failure: run
                .failure_for(page.page_index)
                .map(|failure| failure.stage),
        })
        .collect()
}

pub fn group_entries(groups: &StateGroups, extension: &str) -> Vec<StateGroupEntry> {
    groups
        .iter()
        .map(|group| StateGroupEntry {
            state: group.state,
            entry_name: group.entry_name(extension),
            pages: group.pages.iter().map(|index| index + 1).collect(),
        })
        .collect()
}

pub fn counts(run: &ClassificationRun, groups: &StateGroups) -> SortCounts {
    let text_layer_failures = run
        .failures()
        .iter()
        .filter(|failure| failure.stage == FailureStage::TextLayer)
        .count();
    let mut counts = SortCounts {
        page_count: run.pages().len(),
        text_layer_failures,
        ocr_failures: run.failures().len() - text_layer_failures,
        state_groups: groups.len(),
        ..SortCounts::default()
    };

    for row in diagnostic_rows(run) {
        match row.stage {
            PageStage::TextLayerResolved => counts.text_layer_resolved += 1,
            PageStage::OcrResolved => counts.ocr_resolved += 1,
            _ => counts.unresolved += 1,
        }
    }

    counts
}

pub fn render_table(rows: &[DiagnosticRow], out: &mut impl Write) -> Result<()> {
    writeln!(out, "{:>5}  {:<10}  {}", "Page", "Result", "Method")?;
    for row in rows {
        let result = row
            .result
            .map(|state| state.as_str())
            .unwrap_or(UNRESOLVED_MARKER);
        match row.failure {
            Some(stage) => writeln!(
                out,
                "{:>5}  {:<10}  {}  ({} failed)",
                row.page,
                result,
                row.method.as_str(),
                stage.as_str()
            )?,
            None => writeln!(out, "{:>5}  {:<10}  {}", row.page, result, row.method.as_str())?,
        }
    }
    Ok(())
}

pub fn print_table(rows: &[DiagnosticRow], json: bool) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    if json {
        serde_json::to_writer_pretty(&mut output, rows)
            .context("failed to serialize diagnostic table")?;
        writeln!(output)?;
    } else {
        render_table(rows, &mut output)?;
    }

    output.flush()?;
    Ok(())
}
