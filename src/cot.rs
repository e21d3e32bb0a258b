//! Chain-of-thought normalization.
//!
//! Reasoning traces arrive as numbered "Step N" sections, each carrying a
//! `[Judgment] ... [Description]` span (Step 6 has no description, its
//! judgment runs to the end of the trace). The steps of interest are 1, 2,
//! 4, and 6; step 6 doubles as the final answer.

use regex::{Regex, RegexBuilder};

/// Judgments pulled out of one trace. A field is `None` when the step was
/// absent or its judgment normalized to nothing.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StepLabels {
    pub step1: Option<String>,
    pub step2: Option<String>,
    pub step4: Option<String>,
    pub step6: Option<String>,
}

impl StepLabels {
    /// Field name / value pairs in output order.
    pub fn fields(&self) -> [(&'static str, Option<&str>); 4] {
        [
            ("step1_label", self.step1.as_deref()),
            ("step2_label", self.step2.as_deref()),
            ("step4_label", self.step4.as_deref()),
            ("step6_label", self.step6.as_deref()),
        ]
    }
}

pub struct CotParser {
    bounded_steps: [(u8, Regex); 3],
    final_step: Regex,
}

impl Default for CotParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CotParser {
    pub fn new() -> Self {
        let bounded = |n: u8| {
            RegexBuilder::new(&format!(
                r"Step {n}.*?(?:\*\*)?\s*\[Judgment\]\s*(?:\*\*)?\s*([\s\S]+?)\s*(?:\*\*)?\s*\[Description\]"
            ))
            .case_insensitive(true)
            .build()
            .expect("step judgment pattern")
        };
        Self {
            bounded_steps: [(1, bounded(1)), (2, bounded(2)), (4, bounded(4))],
            final_step: RegexBuilder::new(
                r"Step 6.*?(?:\*\*)?\s*\[Judgment\]\s*(?:\*\*)?\s*([\s\S]+?)\s*$",
            )
            .case_insensitive(true)
            .build()
            .expect("final step pattern"),
        }
    }

    /// Extracts the step judgments from a raw trace. Empty, "none", and
    /// "null" judgments come back as missing, not as empty strings.
    pub fn parse(&self, cot: &str) -> StepLabels {
        let mut labels = StepLabels::default();
        let clean = cot.trim().replace('\n', " ").replace("  ", " ");
        if clean.is_empty() {
            return labels;
        }

        for (n, pattern) in &self.bounded_steps {
            let value = extract_judgment(pattern, &clean);
            match *n {
                1 => labels.step1 = value,
                2 => labels.step2 = value,
                _ => labels.step4 = value,
            }
        }
        labels.step6 = extract_judgment(&self.final_step, &clean);
        labels
    }
}

fn extract_judgment(pattern: &Regex, text: &str) -> Option<String> {
    let caps = pattern.captures(text)?;
    let raw = caps[1].replace("**", "");
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("none")
        || trimmed.eq_ignore_ascii_case("null")
    {
        return None;
    }
    Some(capitalize_first(trimmed))
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Builds the combined `<think>/<ANSWER>` field. The step-6 judgment loses
/// one trailing period or semicolon; a missing judgment answers "unknown".
pub fn generate_cot_field(cot: &str, step6: Option<&str>) -> String {
    let cot_clean = cot.trim();
    let answer = step6
        .map(|s| s.trim_end_matches(['.', ';']).trim())
        .filter(|s| !s.is_empty())
        .unwrap_or("unknown");
    format!("<think>{cot_clean}</think><ANSWER>The answer is {answer}.</ANSWER>")
}

/// Lowercases, drops punctuation, removes all whitespace.
pub fn normalize_text(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether a step-6 judgment agrees with the ground-truth label: normalized
/// substring containment in either direction. Absent or empty sides never
/// match.
pub fn labels_match(label: &str, step6: &str) -> bool {
    let norm_label = normalize_text(label);
    let norm_step6 = normalize_text(step6);
    if norm_label.is_empty() || norm_step6.is_empty() {
        return false;
    }
    norm_label.contains(&norm_step6) || norm_step6.contains(&norm_label)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACE: &str = "\
Step 1: Inspect the raw series. [Judgment] upward trend [Description] The values climb steadily.
Step 2: Check periodicity. [Judgment] no seasonality [Description] No repeating cycle is visible.
Step 3: Irrelevant here.
Step 4: Compare against the threshold. [Judgment] two breaches [Description] Both occur late.
Step 5: Re-check.
Step 6: Final answer. [Judgment] Yes; the series is anomalous.";

    #[test]
    fn parses_all_four_steps() {
        let labels = CotParser::new().parse(TRACE);
        assert_eq!(labels.step1.as_deref(), Some("Upward trend"));
        assert_eq!(labels.step2.as_deref(), Some("No seasonality"));
        assert_eq!(labels.step4.as_deref(), Some("Two breaches"));
        assert_eq!(
            labels.step6.as_deref(),
            Some("Yes; the series is anomalous.")
        );
    }

    #[test]
    fn step6_runs_to_end_of_text() {
        let labels = CotParser::new()
            .parse("Step 6 wrap-up. [Judgment] increased storm activity, most likely");
        assert_eq!(
            labels.step6.as_deref(),
            Some("Increased storm activity, most likely")
        );
    }

    #[test]
    fn tolerates_emphasis_markup_around_markers() {
        let labels = CotParser::new()
            .parse("Step 1 **[Judgment]** **abnormal** **[Description]** details follow.");
        assert_eq!(labels.step1.as_deref(), Some("Abnormal"));
    }

    #[test]
    fn empty_none_and_null_judgments_are_missing() {
        let parser = CotParser::new();
        let labels = parser.parse("Step 2 x [Judgment] none [Description] y");
        assert_eq!(labels.step2, None);
        let labels = parser.parse("Step 2 x [Judgment] NULL [Description] y");
        assert_eq!(labels.step2, None);
        let labels = parser.parse("");
        assert_eq!(labels, StepLabels::default());
    }

    #[test]
    fn cot_field_wraps_trace_and_answer() {
        let field = generate_cot_field("Step 6 [Judgment] three.", Some("three."));
        assert_eq!(
            field,
            "<think>Step 6 [Judgment] three.</think><ANSWER>The answer is three.</ANSWER>"
        );
    }

    #[test]
    fn cot_field_strips_trailing_semicolon_and_defaults_to_unknown() {
        assert!(generate_cot_field("trace", Some("rises;")).contains("The answer is rises."));
        assert!(generate_cot_field("trace", None).contains("The answer is unknown."));
        assert!(generate_cot_field("trace", Some("  ")).contains("The answer is unknown."));
    }

    #[test]
    fn normalized_comparison_ignores_case_punctuation_whitespace() {
        assert!(labels_match("Increased storm activity", "increased storm activity."));
        assert!(labels_match("Yes", "Yes; the series is anomalous"));
        assert!(labels_match("the system failed", "It seems the system failed"));
        assert!(!labels_match("No", "Yes"));
    }

    #[test]
    fn empty_sides_never_match() {
        assert!(!labels_match("", "anything"));
        assert!(!labels_match("label", ""));
        assert!(!labels_match("...", "label"));
    }
}
