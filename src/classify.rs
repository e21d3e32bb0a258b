//! Task classification.
//!
//! Two interchangeable strategies decide which task category a question
//! belongs to: a deterministic keyword/regex ruleset, and a prompt sent to
//! the text-completion collaborator. Both land in the same four-category
//! enumeration and honor the same priority rule: a counting question is
//! Inferential calculation even when it also carries anomaly keywords.

use regex::Regex;

/// The fixed task enumeration. Category 4 records are filtered out of every
/// sink, never routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskCategory {
    AnomalyDetection,
    ScenarioAttribution,
    InferentialCalculation,
    Others,
}

impl TaskCategory {
    pub fn number(self) -> u8 {
        match self {
            TaskCategory::AnomalyDetection => 1,
            TaskCategory::ScenarioAttribution => 2,
            TaskCategory::InferentialCalculation => 3,
            TaskCategory::Others => 4,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(TaskCategory::AnomalyDetection),
            2 => Some(TaskCategory::ScenarioAttribution),
            3 => Some(TaskCategory::InferentialCalculation),
            4 => Some(TaskCategory::Others),
            _ => None,
        }
    }

    /// Canonical task name written into the `task` field.
    pub fn task_name(self) -> &'static str {
        match self {
            TaskCategory::AnomalyDetection => "Anomaly detection",
            TaskCategory::ScenarioAttribution => "Scenario attribution",
            TaskCategory::InferentialCalculation => "Inferential calculation",
            TaskCategory::Others => "Others",
        }
    }

    pub fn from_task_name(name: &str) -> Option<Self> {
        match name.trim() {
            "Anomaly detection" => Some(TaskCategory::AnomalyDetection),
            "Scenario attribution" => Some(TaskCategory::ScenarioAttribution),
            "Inferential calculation" => Some(TaskCategory::InferentialCalculation),
            "Others" => Some(TaskCategory::Others),
            _ => None,
        }
    }
}

/// Keywords that mark a question as anomaly-flavored.
pub const ANOMALY_KEYWORDS: [&str; 10] = [
    "normal",
    "abnormal",
    "anomalous",
    "anomaly",
    "anomalies",
    "usual",
    "unusual",
    "expected",
    "unexpected",
    "extreme",
];

/// Deterministic strategy: a pure function of the question text (plus the
/// answer text for the yes/no check), case-insensitive, whole-word matches.
pub struct RuleClassifier {
    choose_from: Regex,
    how_many: Regex,
    anomaly_keyword: Regex,
    yes_no: Regex,
}

impl Default for RuleClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleClassifier {
    pub fn new() -> Self {
        let keywords = ANOMALY_KEYWORDS.join("|");
        Self {
            choose_from: Regex::new(r"(?i)\bchoose\b\s+\bfrom\b").expect("choose-from pattern"),
            how_many: Regex::new(r"(?i)\bhow\b\s+\bmany\b").expect("how-many pattern"),
            anomaly_keyword: Regex::new(&format!(r"(?i)\b(?:{keywords})\b"))
                .expect("anomaly keyword pattern"),
            yes_no: Regex::new(r"(?i)\b(?:yes|no)\b").expect("yes-no pattern"),
        }
    }

    /// Classifies `question` (with `output` consulted only for the yes/no
    /// requirement of anomaly detection).
    pub fn classify(&self, question: &str, output: &str) -> TaskCategory {
        if self.choose_from.is_match(question) {
            return TaskCategory::ScenarioAttribution;
        }
        // Counting takes absolute priority over anomaly keywords.
        if self.how_many.is_match(question) {
            return TaskCategory::InferentialCalculation;
        }
        if self.anomaly_keyword.is_match(question) && self.yes_no.is_match(output) {
            return TaskCategory::AnomalyDetection;
        }
        TaskCategory::Others
    }
}

const CATEGORY_DEFINITIONS: &str = "\
1. Anomaly detection: The question must contain at least one of the following keywords: \"normal\", \"abnormal\", \"anomalous\", \"anomaly\", \"anomalies\", \"usual\", \"unusual\", or \"expected\", and is a true/false task that explicitly asks whether the time series data is normal, abnormal, or usual.
2. Scenario attribution: The question involves scenario attribution or future scenario prediction, and must explicitly require choosing from several provided options (a multiple-choice task). Questions that involve scenario attribution or prediction but do not provide options are excluded.
3. Inferential calculation: The question must contain the phrase \"how many\" (including but not limited to \"how many occasions\", \"how many times\", \"how many days\", \"how many events\", \"how many instances\"), and its core task is to count the number of \"events, occasions, data-related phenomena or points conforming to the relevant definitions\" in the time series.
4. Others: General questions (e.g., feature extraction, trend analysis) that do not fit the above categories.";

const PRIORITY_GUIDELINES: &str = "\
- Absolute Priority Rule for Counting Tasks: If the question contains \"how many\" and focuses on counting, it must be Category 3 (Inferential calculation), even if it involves anomaly detection (e.g., \"abnormal\") or scenario attribution (e.g., scenario prediction/attribution) content.
- If uncertain, default to Category 4.
- Only output the category number based on the Output format.";

/// Prompt for the first classification round.
pub fn build_first_round_prompt(question: &str) -> String {
    format!(
        "**Task:** Classify the given question into one of these categories:
{CATEGORY_DEFINITIONS}

**Examples:**
1. **Anomaly detection** (Category 1):
- You are a time series analysis expert. This is a metric called Ad Frequency collected from Marketing and Sales with length of 256: <ts><ts/>. If the Ad Frequency data shows a steady trend and no periodic fluctuations, should this behavior be flagged as anomalous in a context where frequent changes are expected?

2. **Scenario attribution** (Category 2):
- You are a time series analysis expert. This is a metric called Storm Tracking collected from Weather Forecasting with length of 256: <ts><ts/>. According to the time series, what might have happened between time point 150 and 200? Choose from: increased storm activity, stable weather conditions, or system maintenance.

3. **Inferential calculation** (Category 3):
- You are a time series analysis expert. This is a metric called Manufacturing Costs collected from Manufacturing with length of 256: <ts><ts/>. The manufacturing costs data starts from January 1, and each point represents a day. During this period, a significant cost-saving initiative was implemented, causing a dramatic drop in costs. How many days did the manufacturing costs drop by more than 50 units within a short period?

**Guidelines:**
{PRIORITY_GUIDELINES}

**Question:** {question}

**Output format:**
- Category: [1/2/3/4]
"
    )
}

/// Prompt for the re-validation round: the collaborator either confirms the
/// original category or reclassifies.
pub fn build_revalidation_prompt(question: &str, original_task: &str) -> String {
    format!(
        "**Task:** Evaluate if the given question is correctly classified into the task category based on the task definitions. If correctly, only output the corresponding category number (1/2/3/4). If not, reclassify it into the correct task category and only output the final category number (1/2/3/4).

**Task Definitions:**
{CATEGORY_DEFINITIONS}

**Original Classification:** {original_task}
**Question:** {question}

**Guidelines:**
{PRIORITY_GUIDELINES}

**Output format:**
- Final Category: [1/2/3/4]
"
    )
}

/// First-round response marker.
pub const CATEGORY_MARKER: &str = "Category:";
/// Re-validation response marker.
pub const FINAL_CATEGORY_MARKER: &str = "Final Category:";

/// Extracts the category digit following `marker` in a collaborator
/// response. Whitespace and an opening bracket may sit between the marker
/// and the digit ("Category: 3" and "Category: [3]" both parse). `None`
/// when the marker or digit is absent; the caller skips the record.
pub fn parse_category_response(response: &str, marker: &str) -> Option<TaskCategory> {
    let idx = response.find(marker)?;
    let rest = response[idx + marker.len()..]
        .trim_start()
        .trim_start_matches('[')
        .trim_start();
    let digit = rest.chars().next().filter(char::is_ascii_digit)?;
    TaskCategory::from_number(digit as u8 - b'0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choose_from_is_scenario_attribution() {
        let c = RuleClassifier::new();
        let q = "What might have happened? Choose from: a storm, maintenance, or nothing.";
        assert_eq!(c.classify(q, ""), TaskCategory::ScenarioAttribution);
    }

    #[test]
    fn how_many_is_inferential_calculation() {
        let c = RuleClassifier::new();
        let q = "How many occasions did the value exceed 10?";
        assert_eq!(c.classify(q, ""), TaskCategory::InferentialCalculation);
    }

    #[test]
    fn how_many_beats_anomaly_keywords() {
        let c = RuleClassifier::new();
        let q = "How many abnormal spikes are present in the series?";
        let out = "Yes, there are three.";
        assert_eq!(c.classify(q, out), TaskCategory::InferentialCalculation);
    }

    #[test]
    fn anomaly_keyword_needs_yes_no_answer() {
        let c = RuleClassifier::new();
        let q = "Should this unusual behavior be flagged as anomalous?";
        assert_eq!(c.classify(q, "Yes, it should."), TaskCategory::AnomalyDetection);
        assert_eq!(c.classify(q, "The trend is flat."), TaskCategory::Others);
    }

    #[test]
    fn keyword_matches_are_whole_word() {
        let c = RuleClassifier::new();
        // "abnormally" must not satisfy the whole-word "abnormal" check,
        // and "normalized" must not satisfy "normal".
        let q = "Is the normalized series behaving abnormally overall?";
        assert_eq!(c.classify(q, "Yes."), TaskCategory::Others);
    }

    #[test]
    fn unmatched_question_is_others() {
        let c = RuleClassifier::new();
        let q = "Describe the overall trend of the series.";
        assert_eq!(c.classify(q, "It rises."), TaskCategory::Others);
    }

    #[test]
    fn task_names_round_trip() {
        for cat in [
            TaskCategory::AnomalyDetection,
            TaskCategory::ScenarioAttribution,
            TaskCategory::InferentialCalculation,
            TaskCategory::Others,
        ] {
            assert_eq!(TaskCategory::from_task_name(cat.task_name()), Some(cat));
            assert_eq!(TaskCategory::from_number(cat.number()), Some(cat));
        }
    }

    #[test]
    fn parses_bare_and_bracketed_category_markers() {
        assert_eq!(
            parse_category_response("- Category: 3", CATEGORY_MARKER),
            Some(TaskCategory::InferentialCalculation)
        );
        assert_eq!(
            parse_category_response("- Category: [2]", CATEGORY_MARKER),
            Some(TaskCategory::ScenarioAttribution)
        );
        assert_eq!(
            parse_category_response("- Final Category: [1]", FINAL_CATEGORY_MARKER),
            Some(TaskCategory::AnomalyDetection)
        );
    }

    #[test]
    fn missing_marker_or_digit_is_a_parse_miss() {
        assert_eq!(parse_category_response("no marker here", CATEGORY_MARKER), None);
        assert_eq!(parse_category_response("Category: maybe", CATEGORY_MARKER), None);
        assert_eq!(parse_category_response("Category: [7]", CATEGORY_MARKER), None);
    }

    #[test]
    fn prompts_embed_question_and_marker_format() {
        let p = build_first_round_prompt("How many dips occur?");
        assert!(p.contains("How many dips occur?"));
        assert!(p.contains("Category: [1/2/3/4]"));

        let p = build_revalidation_prompt("Is this normal?", "Anomaly detection");
        assert!(p.contains("**Original Classification:** Anomaly detection"));
        assert!(p.contains("Final Category: [1/2/3/4]"));
    }
}
