//! Error-Code Extractor (stage `error_code_extraction`, spec §4.2.5) — the
//! hardest subsystem and the core of the pipeline. Manufacturer-specific
//! patterns plus a confidence model eliminate the dominant false-positive
//! class (part numbers, page numbers) that generic patterns produce; a
//! manufacturer with no pattern set is a hard failure, never a silent
//! generic fallback (spec §4.1).

use crate::error::{Error, Result};
use crate::pattern::{CompiledPattern, PatternRegistry, PatternSet};
use crate::types::ExtractionRules;
use std::sync::Arc;
use std::time::Instant;

use super::ExtractorMetrics;

/// One accepted error-code candidate, pre-persistence (no ids/document
/// linkage yet — the stage runner fills those in when it builds the
/// `ErrorCode` row).
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedErrorCode {
    pub error_code: String,
    pub error_description: Option<String>,
    pub solution_text: Option<String>,
    pub page_number: u32,
    pub confidence_score: f32,
    pub context_text: String,
    pub category: String,
    pub severity_hint: Option<String>,
}

/// The stage's result shape: either the extracted codes, or an explicit
/// skip when no manufacturer was resolved upstream (spec: "If
/// `manufacturer_name` is absent -> skip the stage with
/// `Skipped(no_manufacturer)`").
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorCodeExtractionOutcome {
    Extracted(Vec<ExtractedErrorCode>),
    SkippedNoManufacturer,
}

pub struct ErrorCodeExtractor<'a> {
    registry: &'a PatternRegistry,
}

impl<'a> ErrorCodeExtractor<'a> {
    #[must_use]
    pub fn new(registry: &'a PatternRegistry) -> Self {
        Self { registry }
    }

    /// Run the extractor over every page of a document.
    ///
    /// `manufacturer_key` is the manufacturer's stable `pattern_key`
    /// (spec §3), not its display `name` — the caller (the stage runner)
    /// is responsible for resolving one from the other via storage.
    ///
    /// # Errors
    /// Returns [`Error::ManufacturerPatternNotFound`] when
    /// `manufacturer_key` is present but unregistered — this aborts the
    /// stage entirely (spec: "raise `ManufacturerPatternNotFound` and
    /// abort the stage").
    pub fn extract(
        &self,
        pages: &[(u32, String)],
        manufacturer_key: Option<&str>,
    ) -> Result<(ErrorCodeExtractionOutcome, ExtractorMetrics)> {
        let start = Instant::now();
        let Some(manufacturer_key) = manufacturer_key else {
            return Ok((
                ErrorCodeExtractionOutcome::SkippedNoManufacturer,
                ExtractorMetrics::from_duration(0, 0, start.elapsed()),
            ));
        };

        let pattern_set = self.registry.get(manufacturer_key)?;
        let rules = pattern_set.extraction_rules.clone();

        let mut all_codes = Vec::new();
        let mut rejected = 0usize;
        for (page_number, text) in pages {
            let (codes, page_rejected) = extract_page(text, *page_number, &pattern_set, &rules);
            rejected += page_rejected;
            all_codes.extend(codes);
        }

        let confidence_distribution = all_codes.iter().map(|c| c.confidence_score).collect();
        let metrics = ExtractorMetrics {
            items_emitted: all_codes.len(),
            items_rejected: rejected,
            confidence_distribution,
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        Ok((ErrorCodeExtractionOutcome::Extracted(all_codes), metrics))
    }
}

struct Candidate {
    error_code: String,
    start: usize,
    end: usize,
    confidence: f32,
    category: String,
    severity_hint: Option<String>,
}

fn extract_page(
    text: &str,
    page_number: u32,
    pattern_set: &Arc<PatternSet>,
    rules: &ExtractionRules,
) -> (Vec<ExtractedErrorCode>, usize) {
    let mut candidates: Vec<Candidate> = Vec::new();
    let mut rejected = 0usize;

    for pattern in &pattern_set.patterns {
        for m in pattern.regex.find_iter(text) {
            let matched = m.as_str();
            if !pattern_set.validation_regex.is_match(matched) {
                rejected += 1;
                continue;
            }

            let context = context_window(text, m.start(), m.end(), rules.context_window_chars);
            let confidence = score_confidence(pattern, &context);
            if confidence < rules.min_confidence {
                rejected += 1;
                continue;
            }

            candidates.push(Candidate {
                error_code: matched.to_string(),
                start: m.start(),
                end: m.end(),
                confidence,
                category: pattern.category.clone(),
                severity_hint: pattern.severity_hint.clone(),
            });
        }
    }

    // Highest confidence first, earliest offset breaks ties.
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.start.cmp(&b.start))
    });
    if candidates.len() > rules.max_codes_per_page {
        rejected += candidates.len() - rules.max_codes_per_page;
        candidates.truncate(rules.max_codes_per_page);
    }
    // Restore natural reading order for the final emitted set.
    candidates.sort_by_key(|c| c.start);

    let emitted = candidates
        .into_iter()
        .map(|c| {
            let context = context_window(text, c.start, c.end, rules.context_window_chars);
            let after = text_after(text, c.end, rules.text_window_after_chars);
            let solution_text = extract_solution(after);
            let error_description = first_descriptive_sentence(&context, &c.error_code);
            ExtractedErrorCode {
                error_code: c.error_code,
                error_description,
                solution_text,
                page_number,
                confidence_score: c.confidence,
                context_text: context,
                category: c.category,
                severity_hint: c.severity_hint,
            }
        })
        .collect();

    (emitted, rejected)
}

/// Confidence model: pattern specificity as the base term, adjusted by
/// canonical section cues, disqualifying cues, and a small positional
/// boost for heading/table-like context. Clamped to `[0, 1]`.
fn score_confidence(pattern: &CompiledPattern, context: &str) -> f32 {
    let lower = context.to_lowercase();
    let mut score = pattern.specificity;

    const CUES: &[&str] = &["error", "code", "fault", "abnormal", "malfunction", "jam"];
    if CUES.iter().any(|cue| lower.contains(cue)) {
        score += 0.15;
    }

    const DISQUALIFIERS: &[&str] = &[
        "page ",
        "figure",
        "fig.",
        "p/n",
        "part no",
        "part number",
        "see section",
    ];
    if DISQUALIFIERS.iter().any(|d| lower.contains(d)) {
        score -= 0.35;
    }

    if pattern.severity_hint.is_some() {
        score += 0.05;
    }

    // A heading/table-like position: the context begins at (or very near)
    // a line start, which our fixed-width window approximates as a
    // leading newline within the first few characters.
    if context.get(..4).is_some_and(|s| s.contains('\n')) {
        score += 0.05;
    }

    score.clamp(0.0, 1.0)
}

/// Byte-offset window around `[start, end)`, clamped to UTF-8 char
/// boundaries so slicing never panics on multi-byte characters.
fn context_window(text: &str, start: usize, end: usize, window: usize) -> String {
    let lo = floor_char_boundary(text, start.saturating_sub(window));
    let hi = ceil_char_boundary(text, (end + window).min(text.len()));
    text[lo..hi].to_string()
}

fn text_after(text: &str, end: usize, window: usize) -> &str {
    let lo = floor_char_boundary(text, end);
    let hi = ceil_char_boundary(text, (end + window).min(text.len()));
    &text[lo..hi]
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

/// First sentence in `context` that mentions the error code or otherwise
/// reads as a description (falls back to the whole first sentence).
fn first_descriptive_sentence(context: &str, error_code: &str) -> Option<String> {
    let sentence = context
        .split(['.', '\n'])
        .map(str::trim)
        .find(|s| !s.is_empty() && (s.contains(error_code) || s.len() > 10))?;
    Some(sentence.to_string())
}

const SECTION_BREAK_KEYWORDS: &[&str] = &["note:", "warning:", "caution:", "important:"];
const MAX_SOLUTION_LIST_ITEMS: usize = crate::types::MAX_SOLUTION_LIST_ITEMS;
const MAX_SOLUTION_PARAGRAPH_CHARS: usize = crate::types::MAX_SOLUTION_PARAGRAPH_CHARS;
const MIN_LIST_ITEM_CHARS: usize = crate::types::MIN_LIST_ITEM_CHARS;
const MIN_CONTINUATION_CHARS: usize = crate::types::MIN_CONTINUATION_CHARS;

/// Ordered solution-extraction strategies; the first non-empty result
/// wins (spec §4.2.5 step 3). Never returns `Some("")`  — an empty
/// solution window yields `None`, never an empty string.
fn extract_solution(after: &str) -> Option<String> {
    recommended_action(after)
        .or_else(|| procedure_list(after))
        .or_else(|| labeled_paragraph(after))
        .or_else(|| bare_numbered_list(after))
        .or_else(|| bulleted_list(after))
        .filter(|s| !s.trim().is_empty())
}

fn find_header<'a>(text: &'a str, headers: &[&str]) -> Option<&'a str> {
    let lower = text.to_lowercase();
    let pos = headers.iter().find_map(|h| lower.find(h))?;
    let header_end = text[pos..]
        .find('\n')
        .map_or(text.len(), |n| pos + n + 1);
    Some(&text[header_end..])
}

/// Marker regex shared by [`recommended_action`] and [`procedure_list`]:
/// these strategies already found a dedicated header, so any
/// numbered/bulleted/`Step N` marker under it is trusted.
const ANY_MARKER: &str = r"^\s*(?:\d+[.)]|Step\s+\d+[:.]?|[-*\u{2022}])\s*";
/// Marker regex for [`bare_numbered_list`]: no header preceded this text,
/// so only a numeric or `Step N` marker counts — a bare `-` line this far
/// from a header is too easily a table dash or a hyphenated word.
const NUMBERED_MARKER: &str = r"^\s*(?:\d+[.)]|Step\s+\d+[:.]?)\s*";
/// Marker regex for [`bulleted_list`]: the numbered-marker counterpart —
/// only bullet glyphs, never a bare digit marker (which
/// [`bare_numbered_list`] already tried first).
const BULLET_MARKER: &str = r"^\s*[-*\u{2022}]\s*";

fn recommended_action(after: &str) -> Option<String> {
    let body = find_header(
        after,
        &[
            "recommended action for customers",
            "recommended action for technicians",
            "recommended action for agents",
            "recommended action",
        ],
    )?;
    parse_list(body, 2, ANY_MARKER)
}

fn procedure_list(after: &str) -> Option<String> {
    let body = find_header(after, &["repair procedure", "procedure"])?;
    parse_list(body, 1, ANY_MARKER)
}

fn labeled_paragraph(after: &str) -> Option<String> {
    let lower = after.to_lowercase();
    for label in ["solution:", "remedy:", "fix:", "resolution:"] {
        if let Some(pos) = lower.find(label) {
            let body = &after[pos + label.len()..];
            let end = body
                .find("\n\n")
                .unwrap_or(body.len())
                .min(MAX_SOLUTION_PARAGRAPH_CHARS);
            let para = body[..end].trim();
            if !para.is_empty() {
                return Some(para.to_string());
            }
        }
    }
    None
}

fn bare_numbered_list(after: &str) -> Option<String> {
    parse_list(after, 2, NUMBERED_MARKER)
}

fn bulleted_list(after: &str) -> Option<String> {
    parse_list(after, 2, BULLET_MARKER)
}

/// Shared list parser for strategies (a), (b), (d), (e): collects
/// consecutive items matching `marker`, merging indented continuation
/// lines of at least [`MIN_CONTINUATION_CHARS`] into the preceding item.
/// Stops at a section-break keyword, a blank heading line, or
/// [`MAX_SOLUTION_LIST_ITEMS`] items — whichever comes first. Returns
/// `None` if fewer than `min_items` were collected.
fn parse_list(body: &str, min_items: usize, marker: &str) -> Option<String> {
    let marker = regex::Regex::new(marker).ok()?;
    let mut items: Vec<String> = Vec::new();

    for line in body.lines() {
        let trimmed_lower = line.trim().to_lowercase();
        if SECTION_BREAK_KEYWORDS.iter().any(|k| trimmed_lower.starts_with(k)) {
            break;
        }
        if items.len() >= MAX_SOLUTION_LIST_ITEMS {
            break;
        }
        if let Some(m) = marker.find(line) {
            let content = line[m.end()..].trim();
            if content.len() >= MIN_LIST_ITEM_CHARS {
                items.push(content.to_string());
            } else if !items.is_empty() {
                // Marker present but too short to be a real item; treat
                // as noise rather than aborting the whole list.
                continue;
            }
        } else if line.starts_with(char::is_whitespace) && line.trim().len() >= MIN_CONTINUATION_CHARS {
            if let Some(last) = items.last_mut() {
                last.push(' ');
                last.push_str(line.trim());
            }
        } else if line.trim().is_empty() && !items.is_empty() {
            // A blank line after at least one item ends the list.
            break;
        } else if items.is_empty() {
            // Not a marker yet and nothing collected: keep scanning for
            // the first marker line (header -> blank line -> list is
            // common in service manuals).
            continue;
        } else {
            break;
        }
    }

    if items.len() < min_items {
        return None;
    }
    Some(items.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternRegistry;

    const PATTERN_FILE: &str = r#"
[konica_minolta]
validation_regex = '^[A-Z]?[0-9]{4,5}$'

[[konica_minolta.patterns]]
regex = '\bC[0-9]{4}\b'
category = "hardware"
severity_hint = "high"
"#;

    #[test]
    fn s1_known_manufacturer_clean_extraction() {
        let registry = PatternRegistry::load_from_str(PATTERN_FILE).unwrap();
        let extractor = ErrorCodeExtractor::new(&registry);
        let page_text = "C9402 CIS LED lighting abnormally (front side)\n\
Procedure\n\
1. Turn OFF the machine\n\
2. Reseat the CIS cable\n\
3. Replace the CIS unit\n";
        let pages = vec![(450, page_text.to_string())];
        let (outcome, _) = extractor
            .extract(&pages, Some("konica_minolta"))
            .unwrap();
        let ErrorCodeExtractionOutcome::Extracted(codes) = outcome else {
            panic!("expected extraction");
        };
        assert_eq!(codes.len(), 1);
        let code = &codes[0];
        assert_eq!(code.error_code, "C9402");
        assert_eq!(code.page_number, 450);
        assert!(code.confidence_score >= 0.80, "{}", code.confidence_score);
        let solution = code.solution_text.as_ref().unwrap();
        assert!(solution.contains("Turn OFF the machine"));
        assert!(solution.contains("Reseat the CIS cable"));
        assert!(solution.contains("Replace the CIS unit"));
    }

    #[test]
    fn s2_unknown_manufacturer_aborts_stage() {
        let registry = PatternRegistry::load_from_str(PATTERN_FILE).unwrap();
        let extractor = ErrorCodeExtractor::new(&registry);
        let pages = vec![(1, "C9402 something".to_string())];
        let err = extractor.extract(&pages, Some("UTAX")).unwrap_err();
        assert!(matches!(err, Error::ManufacturerPatternNotFound { .. }));
    }

    #[test]
    fn no_manufacturer_skips_without_error() {
        let registry = PatternRegistry::load_from_str(PATTERN_FILE).unwrap();
        let extractor = ErrorCodeExtractor::new(&registry);
        let pages = vec![(1, "C9402 something".to_string())];
        let (outcome, _) = extractor.extract(&pages, None).unwrap();
        assert_eq!(outcome, ErrorCodeExtractionOutcome::SkippedNoManufacturer);
    }

    #[test]
    fn part_number_context_is_rejected_as_disqualified() {
        let registry = PatternRegistry::load_from_str(PATTERN_FILE).unwrap();
        let extractor = ErrorCodeExtractor::new(&registry);
        let pages = vec![(
            1,
            "See part number C9402 in the parts catalog, figure 3, page 12.".to_string(),
        )];
        let (outcome, _) = extractor.extract(&pages, Some("konica_minolta")).unwrap();
        let ErrorCodeExtractionOutcome::Extracted(codes) = outcome else {
            panic!("expected extraction");
        };
        assert!(codes.is_empty());
    }

    #[test]
    fn empty_solution_window_yields_none_not_empty_string() {
        let registry = PatternRegistry::load_from_str(PATTERN_FILE).unwrap();
        let extractor = ErrorCodeExtractor::new(&registry);
        let pages = vec![(1, "C9402 error code with no solution text following.".to_string())];
        let (outcome, _) = extractor.extract(&pages, Some("konica_minolta")).unwrap();
        let ErrorCodeExtractionOutcome::Extracted(codes) = outcome else {
            panic!("expected extraction");
        };
        assert_eq!(codes[0].solution_text, None);
    }

    #[test]
    fn max_codes_per_page_keeps_highest_confidence() {
        let file = r#"
[acme]
validation_regex = '^[A-Z][0-9]{4}$'

[[acme.patterns]]
regex = '\b[A-Z][0-9]{4}\b'
category = "generic"
"#;
        let registry = PatternRegistry::load_from_str(file).unwrap();
        let extractor = ErrorCodeExtractor::new(&registry);
        let mut text = String::new();
        for i in 0..20 {
            text.push_str(&format!("error code A{:04} fault detected\n", i));
        }
        let pages = vec![(1, text)];
        let (outcome, _) = extractor.extract(&pages, Some("acme")).unwrap();
        let ErrorCodeExtractionOutcome::Extracted(codes) = outcome else {
            panic!("expected extraction");
        };
        assert_eq!(codes.len(), 15);
    }
}
