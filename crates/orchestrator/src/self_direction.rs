//! Detects two shapes of unproductive assistant turns so the message
//! loop can nudge the model back toward action instead of ending the
//! turn on a description of what it was *going* to do:
//!
//! - stating an intention ("let me search the logs...") without the
//!   matching tool call ever appearing in the same turn
//! - giving up prematurely ("no logs were found...") on a turn that
//!   never actually fetched anything

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentType {
    SearchLogs,
    ListLogGroups,
    ExpandTime,
    ChangeFilter,
    Analyze,
}

#[derive(Debug, Clone)]
pub struct DetectedIntent {
    pub intent_type: IntentType,
    pub confidence: f64,
    pub trigger_phrases: Vec<String>,
}

struct IntentPattern {
    regex: Regex,
    intent_type: IntentType,
    confidence: f64,
}

fn intent_patterns() -> &'static Vec<IntentPattern> {
    static PATTERNS: OnceLock<Vec<IntentPattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            IntentPattern {
                regex: Regex::new(
                    r"\b(i'?ll|let me|i will|i'?m going to)\s+(search|look|check|fetch|find|query|examine|investigate)\b",
                )
                .unwrap(),
                intent_type: IntentType::SearchLogs,
                confidence: 0.9,
            },
            IntentPattern {
                regex: Regex::new(
                    r"\b(i'?ll|let me|i will)\s+(list|show|display|get)\s+(the\s+)?(available\s+)?log\s*groups?\b",
                )
                .unwrap(),
                intent_type: IntentType::ListLogGroups,
                confidence: 0.9,
            },
            IntentPattern {
                regex: Regex::new(
                    r"\b(expand|widen|broaden|increase|extend)\s+(the\s+)?time\s*(range|window|period)?\b",
                )
                .unwrap(),
                intent_type: IntentType::ExpandTime,
                confidence: 0.8,
            },
            IntentPattern {
                regex: Regex::new(r"\b(try|use)\s+(a\s+)?(different|another|broader|narrower)\s+filter\b")
                    .unwrap(),
                intent_type: IntentType::ChangeFilter,
                confidence: 0.8,
            },
            IntentPattern {
                regex: Regex::new(
                    r"\b(i'?ll|let me)\s+(analyze|summarize|review)\s+(the\s+)?(results|logs|data)\b",
                )
                .unwrap(),
                intent_type: IntentType::Analyze,
                confidence: 0.5,
            },
        ]
    })
}

fn giving_up_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            Regex::new(r"\bno\s+(logs?|results?|data|entries)\s+(were\s+)?found\b").unwrap(),
            Regex::new(r"\b(could\s*n'?t|could\s+not)\s+find\s+any\b").unwrap(),
            Regex::new(r"\bthere\s+(are|were)\s+no\s+(matching\s+)?(logs?|results?)\b").unwrap(),
            Regex::new(r"\bthe\s+search\s+returned\s+(no|zero|empty)\b").unwrap(),
            Regex::new(r"\bunfortunately[,]?\s+(i\s+)?((could\s*n'?t|could\s+not)|was\s+unable)\b").unwrap(),
        ]
    })
}

/// Scan text for a stated-but-unexecuted intention. `Analyze` intents
/// are never returned — analyzing already-fetched data needs no tool
/// call, so stating an intent to do so is not a nudge condition.
pub fn detect_intent(response_text: &str) -> Option<DetectedIntent> {
    if response_text.is_empty() {
        return None;
    }
    let text_lower = response_text.to_lowercase();

    for pattern in intent_patterns() {
        if pattern.intent_type == IntentType::Analyze {
            continue;
        }
        let phrases: Vec<String> = pattern
            .regex
            .captures_iter(&text_lower)
            .map(|c| c.get(0).map(|m| m.as_str().to_string()).unwrap_or_default())
            .collect();
        if !phrases.is_empty() {
            return Some(DetectedIntent {
                intent_type: pattern.intent_type,
                confidence: pattern.confidence,
                trigger_phrases: phrases,
            });
        }
    }
    None
}

/// Whether the text reads like giving up without having tried
/// alternatives.
pub fn detect_premature_giving_up(response_text: &str) -> bool {
    if response_text.is_empty() {
        return false;
    }
    let text_lower = response_text.to_lowercase();
    giving_up_patterns().iter().any(|p| p.is_match(&text_lower))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_search_intent() {
        let intent = detect_intent("Let me search the logs for errors.").unwrap();
        assert_eq!(intent.intent_type, IntentType::SearchLogs);
    }

    #[test]
    fn detects_list_groups_intent() {
        let intent = detect_intent("I'll list the available log groups now.").unwrap();
        assert_eq!(intent.intent_type, IntentType::ListLogGroups);
    }

    #[test]
    fn analyze_intent_is_never_returned() {
        assert!(detect_intent("Let me analyze the results now.").is_none());
    }

    #[test]
    fn no_intent_in_plain_text() {
        assert!(detect_intent("The deployment succeeded at 10:02 UTC.").is_none());
    }

    #[test]
    fn detects_premature_giving_up_phrases() {
        assert!(detect_premature_giving_up("Unfortunately, I couldn't find any matching entries."));
        assert!(detect_premature_giving_up("No logs were found for that query."));
        assert!(!detect_premature_giving_up("Found 42 matching error events."));
    }
}
