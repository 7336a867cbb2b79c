//! Context-window error detection
//!
//! Classifies agent output as "the prompt no longer fits". The orchestrator
//! uses this to decide when to call
//! [`ConversationStore::summarize`](crate::conversation::ConversationStore::summarize).

use regex::RegexSet;
use std::sync::OnceLock;

/// Known phrasings of window/token/length exhaustion
const PATTERNS: &[(&str, &str)] = &[
    ("context_window", r"context[\s_-]*window[\s_-]*(?:is\s+)?(?:exceeded|full|limit|overflow)"),
    ("exceeds_context_window", r"exceed(?:s|ed|ing)?\s+(?:the\s+)?(?:model'?s?\s+)?context[\s_-]*window"),
    ("context_length", r"context[\s_-]*length[\s_-]*(?:exceeded|limit)"),
    ("maximum_context_length", r"maximum\s+context\s+length"),
    ("token_limit", r"token\s+limit\s+(?:exceeded|reached)"),
    ("too_many_tokens", r"too\s+many\s+tokens"),
    ("prompt_too_long", r"prompt\s+is\s+too\s+long"),
    ("input_too_long", r"input\s+is\s+too\s+long"),
    ("conversation_too_long", r"conversation\s+is\s+too\s+long"),
    ("exceeds_model_maximum", r"exceeds\s+the\s+model'?s\s+maximum"),
    ("reduce_length", r"reduce\s+the\s+length\s+of\s+the\s+messages"),
];

fn pattern_set() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| {
        RegexSet::new(PATTERNS.iter().map(|(_, p)| format!("(?i){}", p)))
            .unwrap_or_else(|_| RegexSet::empty())
    })
}

/// Whether `output` reports an exhausted context window
#[must_use]
pub fn is_context_window_error(output: &str) -> bool {
    pattern_set().is_match(output)
}

/// Name of the first matching pattern, for logging
#[must_use]
pub fn matched_pattern(output: &str) -> Option<&'static str> {
    pattern_set()
        .matches(output)
        .iter()
        .next()
        .map(|idx| PATTERNS[idx].0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patterns_compile() {
        assert_eq!(pattern_set().len(), PATTERNS.len());
    }

    #[test]
    fn test_detects_known_phrasings() {
        let samples = [
            "Error: context window exceeded",
            "The context_window_limit was hit",
            "This model's maximum context length is 200000 tokens",
            "Token limit exceeded for request",
            "Request failed: too many tokens in prompt",
            "prompt is too long: 210000 tokens > 200000 maximum",
            "Input is too long for requested model.",
            "The conversation is too long, please start a new chat",
            "Please reduce the length of the messages.",
            "Your input exceeds the context window of this model",
            "CONTEXT LENGTH EXCEEDED",
        ];
        for sample in samples {
            assert!(is_context_window_error(sample), "not detected: {}", sample);
        }
    }

    #[test]
    fn test_ignores_unrelated_output() {
        let samples = [
            "All 42 tests passed",
            "Refactored the token parser",
            "The window was resized",
            "",
        ];
        for sample in samples {
            assert!(!is_context_window_error(sample), "false positive: {}", sample);
        }
    }

    #[test]
    fn test_matched_pattern_name() {
        assert_eq!(
            matched_pattern("maximum context length is 8192"),
            Some("maximum_context_length")
        );
        assert_eq!(matched_pattern("fine"), None);
    }
}
