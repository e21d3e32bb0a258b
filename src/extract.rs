//! Answer-label extraction from free-text model output.
//!
//! Dispatch on the record's task category: anomaly answers reduce to a
//! yes/no (or normal/abnormal) word, scenario answers to their first
//! sentence, inferential answers to a count. Inferential extraction walks an
//! ordered pattern list and stops at the first match, so earlier patterns
//! deliberately shadow later ones.

use regex::{Regex, RegexBuilder};

use crate::classify::TaskCategory;
use crate::numbers::cardinal_to_number;

/// Counting phrases tried in priority order; group 1 captures the count
/// token. First match wins.
const INFERENTIAL_PATTERNS: [&str; 24] = [
    r"I've found that there are (\w+)",
    r"I've found that there is (\w+)",
    r"I've found that there were (\w+)",
    r"I've found that there was (\w+)",
    r"I've found (\w+)",
    r"I've identified (\w+)",
    r"there is (\w+)",
    r"there are (?:approximately|about|roughly) (\w+)",
    r"there was (\w+)",
    r"there were (?:approximately|about|roughly) (\w+)",
    r"there were (\w+)",
    r"it was observed that (\w+)",
    r"the number of .*? is (\w+)",
    r"it took (\w+)",
    r"(\w+) \w+(?: \w+)* can be identified",
    r"occurred (\w+)",
    r"the time series shows (\w+)",
    r"(\w+) times\b",
    r"(\w+) days?\b",
    r"(\w+) minutes?\b",
    r"(\w+) hours?\b",
    r"(\w+) seconds?\b",
    r"(\w+) points?\b",
    r"on (\w+)",
];

/// Word tokens with fixed numeric readings that the general cardinal
/// conversion does not cover.
fn special_count_word(token: &str) -> Option<&'static str> {
    match token {
        "no" | "zero" | "none" => Some("0"),
        "a" | "an" | "once" => Some("1"),
        "twice" => Some("2"),
        _ => None,
    }
}

pub struct LabelExtractor {
    yes_no: Regex,
    normal_abnormal: Regex,
    first_sentence: Regex,
    inferential: Vec<Regex>,
}

impl Default for LabelExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelExtractor {
    pub fn new() -> Self {
        let inferential = INFERENTIAL_PATTERNS
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .expect("counting pattern")
            })
            .collect();
        Self {
            yes_no: Regex::new(r"(?i)\b(yes|no)\b").expect("yes-no pattern"),
            normal_abnormal: Regex::new(r"(?i)\b(normal|abnormal)\b").expect("normal pattern"),
            first_sentence: Regex::new(r"^.*?[.!?]").expect("sentence pattern"),
            inferential,
        }
    }

    /// Extracts the normalized label for `task` from `output`; `None` when
    /// no rule matched (the record is flagged for manual review, not
    /// dropped).
    pub fn extract(&self, task: TaskCategory, output: &str) -> Option<String> {
        match task {
            TaskCategory::AnomalyDetection => self.anomaly(output),
            TaskCategory::ScenarioAttribution => self.scenario(output),
            TaskCategory::InferentialCalculation => self.inferential(output),
            TaskCategory::Others => None,
        }
    }

    /// Yes/No first, Normal/Abnormal as fallback, capitalized.
    pub fn anomaly(&self, output: &str) -> Option<String> {
        let clean = output.trim().replace('\n', " ");
        if clean.is_empty() {
            return None;
        }
        if let Some(caps) = self.yes_no.captures(&clean) {
            return Some(capitalize(&caps[1]));
        }
        if let Some(caps) = self.normal_abnormal.captures(&clean) {
            return Some(capitalize(&caps[1]));
        }
        None
    }

    /// First sentence up to `.`, `!`, or `?`, punctuation stripped; the
    /// whole trimmed text when no terminal punctuation exists.
    pub fn scenario(&self, output: &str) -> Option<String> {
        let clean = output.trim().replace(['\n', '\r'], " ");
        if clean.is_empty() {
            return None;
        }
        match self.first_sentence.find(&clean) {
            Some(m) => {
                let sentence = m.as_str().trim_end_matches(['.', '!', '?']).trim();
                if sentence.is_empty() {
                    None
                } else {
                    Some(sentence.to_string())
                }
            }
            None => Some(clean.trim().to_string()),
        }
    }

    /// Count token from the first matching pattern, mapped to digits when
    /// possible; an unconvertible capture comes back verbatim rather than
    /// erroring.
    pub fn inferential(&self, output: &str) -> Option<String> {
        let clean = output.trim().replace('\n', " ");
        if clean.is_empty() {
            return None;
        }
        for pattern in &self.inferential {
            let Some(caps) = pattern.captures(&clean) else {
                continue;
            };
            let raw = caps[1].trim().to_string();
            if raw.chars().all(|c| c.is_ascii_digit()) {
                return Some(raw);
            }
            let lower = raw.to_lowercase();
            if let Some(mapped) = special_count_word(&lower) {
                return Some(mapped.to_string());
            }
            return match cardinal_to_number(&lower) {
                Some(n) => Some(n.to_string()),
                None => Some(raw),
            };
        }
        None
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// An inferential label that survived extraction but is still not all
/// digits; such records go on the manual-review list.
pub fn needs_review(task: TaskCategory, label: Option<&str>) -> bool {
    match label {
        None => true,
        Some(l) if task == TaskCategory::InferentialCalculation => {
            l.is_empty() || !l.chars().all(|c| c.is_ascii_digit())
        }
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anomaly_yes_no_beats_normal_abnormal() {
        let x = LabelExtractor::new();
        assert_eq!(
            x.anomaly("Yes, the pattern is abnormal."),
            Some("Yes".to_string())
        );
    }

    #[test]
    fn anomaly_falls_back_to_normal_abnormal() {
        let x = LabelExtractor::new();
        assert_eq!(
            x.anomaly("The series looks abnormal near the end."),
            Some("Abnormal".to_string())
        );
        assert_eq!(x.anomaly("Flat trend, nothing else."), None);
    }

    #[test]
    fn anomaly_capitalizes_matched_word() {
        let x = LabelExtractor::new();
        assert_eq!(x.anomaly("NO spikes were flagged."), Some("No".to_string()));
    }

    #[test]
    fn scenario_takes_first_sentence() {
        let x = LabelExtractor::new();
        assert_eq!(
            x.scenario("It is likely that the system failed. This caused further delays."),
            Some("It is likely that the system failed".to_string())
        );
    }

    #[test]
    fn scenario_without_terminal_punctuation_returns_whole_text() {
        let x = LabelExtractor::new();
        assert_eq!(
            x.scenario("increased storm activity"),
            Some("increased storm activity".to_string())
        );
        assert_eq!(x.scenario("   "), None);
    }

    #[test]
    fn inferential_extracts_digits() {
        let x = LabelExtractor::new();
        assert_eq!(
            x.inferential("I've found that there are 5 spikes in total."),
            Some("5".to_string())
        );
    }

    #[test]
    fn inferential_maps_special_words() {
        let x = LabelExtractor::new();
        assert_eq!(x.inferential("there were no drops"), Some("0".to_string()));
        assert_eq!(
            x.inferential("it took twice as long"),
            Some("2".to_string())
        );
        assert_eq!(x.inferential("there is a spike"), Some("1".to_string()));
    }

    #[test]
    fn inferential_converts_cardinal_words() {
        let x = LabelExtractor::new();
        assert_eq!(
            x.inferential("I've identified seven downward spikes."),
            Some("7".to_string())
        );
        assert_eq!(
            x.inferential("the spike occurred eleven times overall"),
            Some("11".to_string())
        );
    }

    #[test]
    fn inferential_returns_raw_token_when_conversion_fails() {
        let x = LabelExtractor::new();
        assert_eq!(
            x.inferential("it took onehundred minutes"),
            Some("onehundred".to_string())
        );
    }

    #[test]
    fn inferential_none_when_no_pattern_matches() {
        let x = LabelExtractor::new();
        assert_eq!(x.inferential("The trend is broadly stable."), None);
    }

    #[test]
    fn earlier_patterns_shadow_later_ones() {
        let x = LabelExtractor::new();
        // "I've found that there are N" must win over "N times".
        assert_eq!(
            x.inferential("I've found that there are 3 bursts, repeating 9 times."),
            Some("3".to_string())
        );
    }

    #[test]
    fn extract_dispatches_on_task() {
        let x = LabelExtractor::new();
        assert_eq!(
            x.extract(TaskCategory::AnomalyDetection, "No."),
            Some("No".to_string())
        );
        assert_eq!(
            x.extract(TaskCategory::InferentialCalculation, "there were 4 events"),
            Some("4".to_string())
        );
        assert_eq!(x.extract(TaskCategory::Others, "anything"), None);
    }

    #[test]
    fn review_flag_for_non_digit_inferential_labels() {
        let t = TaskCategory::InferentialCalculation;
        assert!(needs_review(t, None));
        assert!(needs_review(t, Some("onehundred")));
        assert!(!needs_review(t, Some("12")));
        assert!(!needs_review(TaskCategory::AnomalyDetection, Some("Yes")));
    }
}
