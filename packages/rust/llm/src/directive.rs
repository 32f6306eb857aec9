//! The output-format directive appended to every instruction.

/// Asks the model for the labelled three-field reply the normalizer parses.
pub const FORMAT_DIRECTIVE: &str = "\n\nPlease provide your response in the following format:\nSUMMARY: [Brief 1-2 sentence summary of the content]\nRECOMMENDATION: [Read or Discard]\nREASONING: [Explanation for your recommendation]";

/// The instruction with [`FORMAT_DIRECTIVE`] appended.
pub fn with_directive(instruction: &str) -> String {
    format!("{instruction}{FORMAT_DIRECTIVE}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_follows_instruction() {
        let prompt = with_directive("Be strict.");
        assert!(prompt.starts_with("Be strict.\n\nPlease provide your response"));
        assert!(prompt.ends_with("REASONING: [Explanation for your recommendation]"));
        assert!(prompt.contains("\nRECOMMENDATION: [Read or Discard]\n"));
    }
}
