//! Response normalizer: turns free-form model output into a verdict.
//!
//! Models do not reliably follow the requested reply format, so parsing is a
//! fallback chain, each step usable on its own:
//!
//! 1. [`scan_labels`] reads `SUMMARY:` / `RECOMMENDATION:` / `REASONING:` lines.
//! 2. [`scan_keywords`] guesses a recommendation from the whole reply.
//! 3. [`fallback_summary`] takes the first two sentences.
//!
//! [`normalize`] never fails, including on empty input.

use tracing::debug;

use triage_shared::Recommendation;

/// Summary used when nothing usable can be derived from the reply.
pub const SUMMARY_PLACEHOLDER: &str = "Content analysis summary not available.";

const SUMMARY_LABEL: &str = "summary:";
const RECOMMENDATION_LABEL: &str = "recommendation:";
const REASONING_LABEL: &str = "reasoning:";

/// Parsed verdict. `recommendation` is only ever `Read` or `Discard` here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedVerdict {
    pub recommendation: Recommendation,
    pub summary: String,
    pub rationale: String,
}

/// Fields found on labelled lines. The first non-empty occurrence of each wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabeledFields {
    pub summary: Option<String>,
    pub recommendation: Option<Recommendation>,
    pub reasoning: Option<String>,
}

/// Remainder of `line` after a case-insensitive `label` prefix.
fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let head = line.get(..label.len())?;
    head.eq_ignore_ascii_case(label)
        .then(|| line[label.len()..].trim())
}

/// A recommendation label's value. Values naming neither verdict count as absent.
fn parse_recommendation_value(value: &str) -> Option<Recommendation> {
    let lower = value.to_lowercase();
    if lower.contains("discard") {
        Some(Recommendation::Discard)
    } else if lower.contains("read") {
        Some(Recommendation::Read)
    } else {
        None
    }
}

/// Step 1: scan lines for labelled fields.
pub fn scan_labels(raw: &str) -> LabeledFields {
    let mut fields = LabeledFields::default();

    for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(value) = strip_label(line, SUMMARY_LABEL) {
            if fields.summary.is_none() && !value.is_empty() {
                fields.summary = Some(value.to_string());
            }
        } else if let Some(value) = strip_label(line, RECOMMENDATION_LABEL) {
            if fields.recommendation.is_none() {
                fields.recommendation = parse_recommendation_value(value);
            }
        } else if let Some(value) = strip_label(line, REASONING_LABEL) {
            if fields.reasoning.is_none() && !value.is_empty() {
                fields.reasoning = Some(value.to_string());
            }
        }
    }

    fields
}

/// Step 2: recommendation from keywords anywhere in the reply.
///
/// `Discard` when some occurrence of "discard" is not directly preceded by
/// "not ". Otherwise `Read`, whether or not a positive keyword appears.
pub fn scan_keywords(raw: &str) -> Recommendation {
    let lower = raw.to_lowercase();
    let unnegated_discard = lower
        .match_indices("discard")
        .any(|(idx, _)| !lower[..idx].ends_with("not "));

    if unnegated_discard {
        return Recommendation::Discard;
    }

    let positive = ["read", "valuable", "useful"]
        .iter()
        .any(|word| lower.contains(word));
    debug!(positive, "no unnegated discard keyword, defaulting to read");
    Recommendation::Read
}

/// Step 3: the first two `.`-separated segments, with the final period kept.
pub fn fallback_summary(raw: &str) -> String {
    let segments: Vec<&str> = raw
        .split('.')
        .filter(|s| !s.trim().is_empty())
        .take(2)
        .collect();

    let mut summary = segments.join(".").trim().to_string();
    if summary.is_empty() {
        return SUMMARY_PLACEHOLDER.to_string();
    }
    if !summary.ends_with('.') {
        summary.push('.');
    }
    summary
}

/// Parse a raw model reply into a verdict. Total over all inputs.
pub fn normalize(raw: &str) -> NormalizedVerdict {
    let fields = scan_labels(raw);
    debug!(
        summary_label = fields.summary.is_some(),
        recommendation_label = fields.recommendation.is_some(),
        reasoning_label = fields.reasoning.is_some(),
        "labelled fields scanned"
    );

    NormalizedVerdict {
        recommendation: fields
            .recommendation
            .unwrap_or_else(|| scan_keywords(raw)),
        summary: fields.summary.unwrap_or_else(|| fallback_summary(raw)),
        rationale: fields.reasoning.unwrap_or_else(|| raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_reply() {
        let verdict = normalize("");
        assert_eq!(verdict.recommendation, Recommendation::Read);
        assert_eq!(verdict.summary, SUMMARY_PLACEHOLDER);
        assert_eq!(verdict.rationale, "");
    }

    #[test]
    fn labelled_reply_parsed_exactly() {
        let verdict = normalize("SUMMARY: S\nRECOMMENDATION: Discard\nREASONING: R");
        assert_eq!(
            verdict,
            NormalizedVerdict {
                recommendation: Recommendation::Discard,
                summary: "S".into(),
                rationale: "R".into(),
            }
        );
    }

    #[test]
    fn labels_are_case_insensitive_and_trimmed() {
        let verdict = normalize("  summary:   A tidy recap  \n\nRecommendation: read it\nReasoning:  solid ");
        assert_eq!(verdict.summary, "A tidy recap");
        assert_eq!(verdict.recommendation, Recommendation::Read);
        assert_eq!(verdict.rationale, "solid");
    }

    #[test]
    fn recommendation_label_beats_keywords() {
        let reply = "SUMMARY: Guide\nRECOMMENDATION: Read\nREASONING: No reason to discard it.";
        assert_eq!(normalize(reply).recommendation, Recommendation::Read);
    }

    #[test]
    fn first_label_occurrence_wins() {
        let fields = scan_labels("SUMMARY: first\nSUMMARY: second\nRECOMMENDATION: Discard\nRECOMMENDATION: Read");
        assert_eq!(fields.summary.as_deref(), Some("first"));
        assert_eq!(fields.recommendation, Some(Recommendation::Discard));
    }

    #[test]
    fn unclear_recommendation_label_falls_back_to_keywords() {
        let reply = "RECOMMENDATION: Skip\nThis is spam, discard.";
        assert_eq!(scan_labels(reply).recommendation, None);
        assert_eq!(normalize(reply).recommendation, Recommendation::Discard);
    }

    #[test]
    fn keyword_discard() {
        let verdict = normalize("I recommend you discard this, it's spam.");
        assert_eq!(verdict.recommendation, Recommendation::Discard);
        assert_eq!(verdict.rationale, "I recommend you discard this, it's spam.");
    }

    #[test]
    fn negated_discard_is_not_discard() {
        assert_eq!(scan_keywords("Please do not discard this"), Recommendation::Read);
        assert_eq!(scan_keywords("DO NOT DISCARD. Valuable."), Recommendation::Read);
    }

    #[test]
    fn negation_applies_per_occurrence() {
        assert_eq!(
            scan_keywords("Do not discard the intro, but discard the rest."),
            Recommendation::Discard
        );
    }

    #[test]
    fn no_keywords_defaults_to_read() {
        assert_eq!(scan_keywords("Hmm."), Recommendation::Read);
        assert_eq!(scan_keywords("This is a useful piece."), Recommendation::Read);
    }

    #[test]
    fn summary_from_first_two_sentences() {
        assert_eq!(
            fallback_summary("First point. Second point. Third point."),
            "First point. Second point."
        );
        assert_eq!(fallback_summary("No period here"), "No period here.");
        assert_eq!(fallback_summary("..."), SUMMARY_PLACEHOLDER);
    }

    #[test]
    fn missing_reasoning_uses_full_reply() {
        let reply = "SUMMARY: Short\nRECOMMENDATION: Read";
        let verdict = normalize(reply);
        assert_eq!(verdict.rationale, reply);
        assert_eq!(verdict.summary, "Short");
    }

    #[test]
    fn empty_label_value_counts_as_missing() {
        let reply = "SUMMARY:\nThe article explains lifetimes. It is long.";
        assert_eq!(
            normalize(reply).summary,
            "SUMMARY:\nThe article explains lifetimes. It is long."
        );
    }
}
