use std::collections::BTreeSet;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;

use crate::states::StateCode;

const STATE_ZIP_PATTERN: &str = r"([A-Z]{2})\s*[^A-Z0-9]*\s*([0-9]{5})";

/// Finds the recipient state on a label page.
///
/// Candidates are `(code, zip)` pairs in document order. Pairs whose ZIP
/// belongs to the sender, or whose code is not a known state, are dropped and
/// the last remaining pair wins: the recipient block follows the return
/// address on every layout seen so far.
#[derive(Debug, Clone)]
pub struct StateMatcher {
    pattern: Regex,
    sender_zips: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateVerdict {
    Accepted,
    SenderZip,
    UnknownCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub code: String,
    pub zip: String,
    pub offset: usize,
    pub verdict: CandidateVerdict,
}

impl StateMatcher {
    pub fn new(sender_zips: BTreeSet<String>) -> Result<Self> {
        let pattern =
            Regex::new(STATE_ZIP_PATTERN).context("failed to compile state/zip regex")?;
        Ok(Self {
            pattern,
            sender_zips,
        })
    }

    #[cfg(test)]
    pub fn with_default_senders() -> Result<Self> {
        Self::new(crate::states::default_sender_zips())
    }

    pub fn sender_zips(&self) -> &BTreeSet<String> {
        &self.sender_zips
    }

    pub fn extract_state(&self, text: &str) -> Option<StateCode> {
        self.candidates(text)
            .into_iter()
            .rev()
            .find(|candidate| candidate.verdict == CandidateVerdict::Accepted)
            .and_then(|candidate| StateCode::parse(&candidate.code))
    }

    /// Every pattern hit in `text`, left to right, with the reason it was kept or dropped.
    pub fn candidates(&self, text: &str) -> Vec<Candidate> {
        let normalized = normalize_label_text(text);

        self.pattern
            .captures_iter(&normalized)
            .filter_map(|captures| {
                let code = captures.get(1)?;
                let zip = captures.get(2)?;
                let verdict = if self.sender_zips.contains(zip.as_str()) {
                    CandidateVerdict::SenderZip
                } else if StateCode::parse(code.as_str()).is_none() {
                    CandidateVerdict::UnknownCode
                } else {
                    CandidateVerdict::Accepted
                };
                Some(Candidate {
                    code: code.as_str().to_string(),
                    zip: zip.as_str().to_string(),
                    offset: code.start(),
                    verdict,
                })
            })
            .collect()
    }
}

/// Collapses whitespace, uppercases, and rejoins glyphs that OCR split apart.
pub fn normalize_label_text(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<&str>>().join(" ");
    let upper = collapsed.to_uppercase();
    rejoin_split_glyphs(&upper)
}

// "T X 7 5 5 5 9" -> "TX75559". A lone glyph between words is kept as is.
fn rejoin_split_glyphs(input: &str) -> String {
    let mut tokens = Vec::<String>::new();
    let mut glyph_run = String::new();

    for token in input.split(' ') {
        let mut chars = token.chars();
        let is_lone_glyph = matches!(
            (chars.next(), chars.next()),
            (Some(character), None) if character.is_alphanumeric()
        );

        if is_lone_glyph {
            glyph_run.push_str(token);
            continue;
        }

        if !glyph_run.is_empty() {
            tokens.push(std::mem::take(&mut glyph_run));
        }
        tokens.push(token.to_string());
    }
    if !glyph_run.is_empty() {
        tokens.push(glyph_run);
    }

    tokens.join(" ")
}
