//! Title cleaning and fuzzy comparison used to build search keys and to
//! validate title-search hits.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

static AI_BEFORE_NOUN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bAl(\s+(?:at|in|for|and|agents?|tools?|systems?|models?)\b)").expect("valid regex")
});
static GENERATIVE_AL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bGenerative Al\b").expect("valid regex"));
static AL_HYPHEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bAl-").expect("valid regex"));
static GPTS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:Gpts|GPTS)\b").expect("valid regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static WORKING_PAPER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*(?:\(No\.\s*w\d+\)|\[NBER\s+w\d+\]|\(Working\s+Paper\)|\[Working\s+Paper\])\s*$")
        .expect("valid regex")
});
static NON_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "been", "be", "have", "has", "had", "do", "does",
    "did", "will", "would", "should", "could", "may", "might", "must", "can", "this", "that",
    "these", "those", "it", "its", "their", "them",
];

/// Cleans a raw title for searching. Pure and idempotent.
///
/// Passes repeat until nothing changes; no pass ever lengthens the text, so
/// the loop terminates.
pub fn clean_title(raw: &str) -> String {
    let mut current = raw.trim().to_string();
    loop {
        let next = clean_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn clean_pass(title: &str) -> String {
    let fixed = fix_replacements(title.trim());
    let untruncated = strip_truncation(&fixed);
    let without_wp = WORKING_PAPER_RE.replace(&untruncated, "");
    let collapsed = WHITESPACE_RE.replace_all(without_wp.trim(), " ");
    collapsed.trim_end_matches([',', ';', ':']).trim().to_string()
}

fn fix_replacements(title: &str) -> String {
    let s = AI_BEFORE_NOUN_RE.replace_all(title, "AI$1");
    let s = GENERATIVE_AL_RE.replace_all(&s, "Generative AI");
    let s = AL_HYPHEN_RE.replace_all(&s, "AI-");
    let s = GPTS_RE.replace_all(&s, "GPTs");
    let s: String = s
        .chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{2013}' | '\u{2014}' => '-',
            other => other,
        })
        .collect();
    WHITESPACE_RE.replace_all(&s, " ").into_owned()
}

fn strip_truncation(title: &str) -> String {
    if let Some(s) = title.strip_suffix("...") {
        return s.trim().to_string();
    }
    if let Some(s) = title.strip_suffix('\u{2026}') {
        return s.trim().to_string();
    }
    if let Some(s) = title.strip_suffix("..") {
        return s.trim().to_string();
    }
    if let Some(s) = title.strip_suffix('.') {
        let last_token_len = title.split_whitespace().last().map_or(0, |w| w.chars().count());
        if last_token_len <= 2 {
            return s.trim().to_string();
        }
    }
    title.to_string()
}

/// Lower-cased significant terms of a title, stop words and short tokens removed.
pub fn extract_key_terms(title: &str) -> BTreeSet<String> {
    let cleaned = clean_title(title).to_lowercase();
    let spaced = NON_WORD_RE.replace_all(&cleaned, " ");
    spaced
        .split_whitespace()
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(w))
        .map(ToOwned::to_owned)
        .collect()
}

/// Jaccard similarity of the two titles' key terms; `0.0` if either is empty.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let left = extract_key_terms(a);
    let right = extract_key_terms(b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let intersection = left.intersection(&right).count();
    let union = left.union(&right).count();
    intersection as f64 / union as f64
}

/// Ellipsis, no terminal punctuation, or under 20 characters.
pub fn is_likely_truncated(title: &str) -> bool {
    let title = title.trim();
    let Some(last) = title.chars().last() else {
        return true;
    };
    if title.ends_with("..") || last == '\u{2026}' {
        return true;
    }
    if !matches!(last, '.' | '!' | '?') {
        return true;
    }
    title.chars().count() < 20
}

/// Whether `full` plausibly completes the cut-off title `truncated`.
pub fn is_title_expansion(truncated: &str, full: &str, threshold: f64) -> bool {
    let trunc = clean_title(truncated).to_lowercase();
    let full = clean_title(full).to_lowercase();

    let trunc_words: Vec<&str> = trunc.split_whitespace().collect();
    if trunc_words.is_empty() {
        return false;
    }

    let half: String = trunc.chars().take(trunc.chars().count() / 2).collect();
    if !half.is_empty() && full.starts_with(&half) {
        return true;
    }

    let matching = trunc_words
        .iter()
        .zip(full.split_whitespace())
        .take_while(|(a, b)| *a == b)
        .count();
    matching as f64 / trunc_words.len() as f64 >= threshold
}
