use std::fs;
use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use serde::Serialize;

use crate::cli::InspectArgs;
use crate::matcher::{Candidate, CandidateVerdict, StateMatcher, normalize_label_text};
use crate::report::UNRESOLVED_MARKER;
use crate::states::StateCode;

use super::build_matcher;

#[derive(Debug, Serialize)]
struct InspectReport {
    normalized_text: String,
    candidates: Vec<Candidate>,
    state: Option<StateCode>,
}

pub fn run(args: InspectArgs) -> Result<()> {
    let text = match (&args.text, &args.file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        (None, None) => bail!("either --text or --file is required"),
    };

    let matcher = build_matcher(&args.senders)?;
    let report = inspect_text(&matcher, &text);

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        serde_json::to_writer_pretty(&mut output, &report)
            .context("failed to serialize inspect report")?;
        writeln!(output)?;
    } else {
        render_report(&report, &mut output)?;
    }
    output.flush()?;

    Ok(())
}

fn inspect_text(matcher: &StateMatcher, text: &str) -> InspectReport {
    InspectReport {
        normalized_text: normalize_label_text(text),
        candidates: matcher.candidates(text),
        state: matcher.extract_state(text),
    }
}

fn render_report(report: &InspectReport, out: &mut impl Write) -> Result<()> {
    writeln!(out, "normalized: {}", report.normalized_text)?;
    if report.candidates.is_empty() {
        writeln!(out, "no state/ZIP candidates")?;
    }
    for candidate in &report.candidates {
        let verdict = match candidate.verdict {
            CandidateVerdict::Accepted => "accepted",
            CandidateVerdict::SenderZip => "sender zip",
            CandidateVerdict::UnknownCode => "unknown code",
        };
        writeln!(
            out,
            "{:>5}  {} {}  {}",
            candidate.offset, candidate.code, candidate.zip, verdict
        )?;
    }
    let state = report
        .state
        .map(|state| state.as_str())
        .unwrap_or(UNRESOLVED_MARKER);
    writeln!(out, "result: {state}")?;
    Ok(())
}
