use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::{MatchResult, MatchSettings, SearchRecord, SearchResult};

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Fold a title for comparison.
///
/// Steps (order matters):
/// 1. Unescape the HTML entities that survive copy/paste from web pages
/// 2. Unicode NFKC normalization (ligatures, full-width forms, non-breaking spaces)
/// 3. Lowercase
/// 4. Collapse runs of whitespace and trim
///
/// Punctuation is kept so that the direct score still reflects the text a
/// reader would see.
pub fn fold_title(title: &str) -> String {
    let title = title
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ");

    let normalized: String = title.nfkc().collect::<String>().to_lowercase();
    WHITESPACE_RE.replace_all(normalized.trim(), " ").into_owned()
}

/// Whole-string similarity between two titles, 0–100.
///
/// Normalized indel (edit-distance) ratio over the folded titles.
pub fn direct_score(a: &str, b: &str) -> f64 {
    let a: Vec<char> = fold_title(a).chars().collect();
    let b: Vec<char> = fold_title(b).chars().collect();
    if a.is_empty() && b.is_empty() {
        return 100.0;
    }
    ratio(&a, &b)
}

/// Best-aligned substring similarity between two titles, 0–100.
///
/// The shorter title is slid across the longer one and the best window ratio
/// wins, so a candidate carrying extra text around the title (a journal name,
/// a date prefix) still scores 100 when it contains the title verbatim.
/// Windows hanging off either end of the longer title are included so a title
/// that is only partially present is still scored on its overlap.
pub fn partial_score(a: &str, b: &str) -> f64 {
    let a: Vec<char> = fold_title(a).chars().collect();
    let b: Vec<char> = fold_title(b).chars().collect();
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    if short.is_empty() {
        return if long.is_empty() { 100.0 } else { 0.0 };
    }

    let m = short.len();
    let n = long.len();
    let mut best = 0.0_f64;

    // Full-width windows
    for start in 0..=(n - m) {
        best = best.max(ratio(&short, &long[start..start + m]));
        if best >= 100.0 {
            return 100.0;
        }
    }

    // Windows clipped by the start or end of the longer title
    for len in 1..m {
        best = best.max(ratio(&short, &long[..len]));
        best = best.max(ratio(&short, &long[n - len..]));
    }

    best
}

fn ratio(a: &[char], b: &[char]) -> f64 {
    let score = rapidfuzz::fuzz::ratio(a.iter().copied(), b.iter().copied()) * 100.0;
    score.clamp(0.0, 100.0)
}

/// Whether the folded candidate title literally contains the folded record title.
pub fn contains_title(record_title: &str, candidate_title: &str) -> bool {
    let needle = fold_title(record_title);
    !needle.is_empty() && fold_title(candidate_title).contains(&needle)
}

/// Score one candidate against a record. Pure: no filtering happens here.
pub fn score(record: &SearchRecord, result: &SearchResult) -> MatchResult {
    MatchResult {
        record: record.clone(),
        result: result.clone(),
        direct_score: direct_score(record.title(), &result.title),
        partial_score: partial_score(record.title(), &result.title),
    }
}

/// Acceptance policy: the partial score gates, the direct score is informational.
pub fn is_accepted(partial_score: f64, threshold: f64) -> bool {
    partial_score >= threshold
}

/// Applies the configured scoring policy to one record's candidates.
#[derive(Debug, Clone)]
pub struct Matcher {
    settings: MatchSettings,
}

impl Matcher {
    pub fn new(settings: MatchSettings) -> Self {
        Self { settings }
    }

    pub fn threshold(&self) -> f64 {
        self.settings.threshold
    }

    /// Score `results` (in endpoint order, capped at `top_n`) and keep only
    /// the accepted matches.
    pub fn accepted(&self, record: &SearchRecord, results: &[SearchResult]) -> Vec<MatchResult> {
        let cap = self.settings.top_n.unwrap_or(results.len());
        results
            .iter()
            .take(cap)
            .filter(|r| {
                !self.settings.require_containment || contains_title(record.title(), &r.title)
            })
            .map(|r| score(record, r))
            .filter(|m| is_accepted(m.partial_score, self.settings.threshold))
            .collect()
    }
}
