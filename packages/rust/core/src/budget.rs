//! Token budgeting: estimate the cost of a text and cut it to fit a ceiling.
//!
//! The estimate is a fixed characters-per-token heuristic, not a tokenizer.
//! Truncation keeps 80% of the ceiling's character allowance, leaving room
//! for the instruction and model overhead, and appends [`TRUNCATION_MARKER`].

use tracing::debug;

use triage_shared::TRUNCATION_MARKER;
use triage_shared::pipeline_config::CHARS_PER_TOKEN;

/// Text to send to the model, and whether it was cut.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetedText {
    pub text_for_model: String,
    pub was_truncated: bool,
}

/// Estimated tokens: `ceil(chars / 4)`.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Tokens reported as analyzed when a text was truncated: 80% of the ceiling.
pub fn analyzed_tokens(ceiling: usize) -> usize {
    ceiling * 4 / 5
}

/// Number of characters kept from a text that overflows `ceiling`.
///
/// Normally `floor(ceiling * 4 * 0.8)`. Very small ceilings are further capped
/// so the kept prefix plus the marker still fits under the ceiling.
fn kept_chars(ceiling: usize) -> usize {
    let allowance = ceiling * CHARS_PER_TOKEN;
    let with_margin = allowance * 4 / 5;
    let marker_chars = TRUNCATION_MARKER.chars().count();
    with_margin.min(allowance.saturating_sub(marker_chars))
}

/// Fit `text` under `ceiling` estimated tokens.
///
/// Pure and deterministic. For any ceiling of at least
/// [`MIN_TOKEN_CEILING`](triage_shared::MIN_TOKEN_CEILING) the output estimates
/// at or under the ceiling, so budgeting it again is a no-op.
pub fn budget(text: &str, ceiling: usize) -> BudgetedText {
    let estimate = estimate_tokens(text);
    if estimate <= ceiling {
        return BudgetedText {
            text_for_model: text.to_string(),
            was_truncated: false,
        };
    }

    let keep = kept_chars(ceiling);
    let cut = text
        .char_indices()
        .nth(keep)
        .map_or(text.len(), |(idx, _)| idx);

    let mut text_for_model = String::with_capacity(cut + TRUNCATION_MARKER.len());
    text_for_model.push_str(&text[..cut]);
    text_for_model.push_str(TRUNCATION_MARKER);

    debug!(estimate, ceiling, kept_chars = keep, "text truncated to fit token ceiling");
    BudgetedText {
        text_for_model,
        was_truncated: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_shared::MIN_TOKEN_CEILING;

    #[test]
    fn estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        // Characters, not bytes.
        assert_eq!(estimate_tokens("ééééé"), 2);
    }

    #[test]
    fn under_ceiling_passes_through() {
        let out = budget("Hello world", 100_000);
        assert_eq!(out.text_for_model, "Hello world");
        assert!(!out.was_truncated);
    }

    #[test]
    fn exactly_at_ceiling_passes_through() {
        let text = "a".repeat(400);
        let out = budget(&text, 100);
        assert!(!out.was_truncated);
        assert_eq!(out.text_for_model, text);
    }

    #[test]
    fn over_ceiling_keeps_eighty_percent() {
        let text = "a".repeat(401);
        let out = budget(&text, 100);
        assert!(out.was_truncated);
        assert_eq!(out.text_for_model, format!("{}{TRUNCATION_MARKER}", "a".repeat(320)));
    }

    #[test]
    fn multibyte_text_cut_on_char_boundary() {
        let text = "日本語のテキスト".repeat(200);
        let out = budget(&text, 50);
        assert!(out.was_truncated);
        let prefix = out.text_for_model.strip_suffix(TRUNCATION_MARKER).unwrap();
        assert_eq!(prefix.chars().count(), 160);
        assert!(text.starts_with(prefix));
    }

    #[test]
    fn smallest_ceiling_still_fits() {
        let text = "x".repeat(1000);
        let out = budget(&text, MIN_TOKEN_CEILING);
        assert!(estimate_tokens(&out.text_for_model) <= MIN_TOKEN_CEILING);
    }

    #[test]
    fn analyzed_tokens_is_eighty_percent() {
        assert_eq!(analyzed_tokens(100_000), 80_000);
        assert_eq!(analyzed_tokens(1001), 800);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use triage_shared::MIN_TOKEN_CEILING;

    proptest! {
        /// Property: the budgeted text never estimates above the ceiling
        #[test]
        fn output_fits_ceiling(text in "\\PC{0,3000}", ceiling in MIN_TOKEN_CEILING..800usize) {
            let out = budget(&text, ceiling);
            prop_assert!(estimate_tokens(&out.text_for_model) <= ceiling);
        }

        /// Property: budgeting twice changes nothing the second time
        #[test]
        fn budgeting_is_idempotent(text in "\\PC{0,3000}", ceiling in MIN_TOKEN_CEILING..800usize) {
            let once = budget(&text, ceiling);
            let twice = budget(&once.text_for_model, ceiling);
            prop_assert!(!twice.was_truncated);
            prop_assert_eq!(twice.text_for_model, once.text_for_model);
        }

        /// Property: a truncated result is a prefix of the input plus the marker
        #[test]
        fn truncation_keeps_a_prefix(text in "\\PC{0,3000}", ceiling in MIN_TOKEN_CEILING..800usize) {
            let out = budget(&text, ceiling);
            if out.was_truncated {
                let prefix = out.text_for_model.strip_suffix(TRUNCATION_MARKER);
                prop_assert!(prefix.is_some_and(|p| text.starts_with(p)));
            } else {
                prop_assert_eq!(out.text_for_model, text);
            }
        }
    }
}
