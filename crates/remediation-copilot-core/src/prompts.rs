//! Provider-agnostic prompt rendering.
//!
//! Every builder is a pure function of its inputs: no clocks, no randomness, no
//! provider specifics. Each prompt spells out the exact answer contract the
//! normalizer expects back.

use crate::incident::Incident;
use crate::llm::truncate;
use crate::risk::BrokerAnswerSet;

const MAX_INCIDENT_CHARS: usize = 4000;

const UNDERWRITER_PREAMBLE: &str = "You are assisting a cyber-insurance underwriter reviewing a reported incident.";

/// The distinct jobs a prompt can ask a provider to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Remediation,
    Checklist,
    BrokerQuestions,
    DynamicSuggestions,
    FullAnalysis,
}

/// How the normalizer should read a provider's answer for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    LabeledLines,
    JsonObject,
    JsonList,
}

impl TaskKind {
    pub fn response_format(self) -> ResponseFormat {
        match self {
            Self::Remediation => ResponseFormat::LabeledLines,
            Self::Checklist | Self::BrokerQuestions => ResponseFormat::JsonList,
            Self::DynamicSuggestions | Self::FullAnalysis => ResponseFormat::JsonObject,
        }
    }
}

/// Inputs for one prompt, shaped by the task they belong to.
#[derive(Debug, Clone, Copy)]
pub enum PromptRequest<'a> {
    Remediation {
        incident: &'a Incident,
    },
    Checklist {
        incident: &'a Incident,
    },
    BrokerQuestions {
        incident_text: &'a str,
        checklist: &'a [String],
    },
    DynamicSuggestions {
        incident_text: &'a str,
        checklist: &'a [String],
        answers: &'a BrokerAnswerSet,
    },
    FullAnalysis {
        text: &'a str,
    },
}

impl PromptRequest<'_> {
    pub fn task_kind(&self) -> TaskKind {
        match self {
            Self::Remediation { .. } => TaskKind::Remediation,
            Self::Checklist { .. } => TaskKind::Checklist,
            Self::BrokerQuestions { .. } => TaskKind::BrokerQuestions,
            Self::DynamicSuggestions { .. } => TaskKind::DynamicSuggestions,
            Self::FullAnalysis { .. } => TaskKind::FullAnalysis,
        }
    }

    pub fn render(&self) -> String {
        match *self {
            Self::Remediation { incident } => remediation_prompt(incident),
            Self::Checklist { incident } => checklist_prompt(incident),
            Self::BrokerQuestions {
                incident_text,
                checklist,
            } => broker_questions_prompt(incident_text, checklist),
            Self::DynamicSuggestions {
                incident_text,
                checklist,
                answers,
            } => dynamic_suggestions_prompt(incident_text, checklist, answers),
            Self::FullAnalysis { text } => full_analysis_prompt(text),
        }
    }
}

/// Single-incident remediation in the labeled-line format.
pub fn remediation_prompt(incident: &Incident) -> String {
    let mut lines = vec![
        format!("Incident: {}", incident.title),
        format!(
            "Description: {}",
            truncate(incident.description.trim(), MAX_INCIDENT_CHARS)
        ),
        format!("Risk: {}", incident.risk_level),
        format!(
            "Risk contribution score: {}/100",
            incident.risk_contribution_score
        ),
    ];
    if let Some(cost) = incident.remediation_cost {
        lines.push(format!("Estimated remediation cost: {cost:.2}"));
    }
    lines.extend(
        [
            "Provide:",
            "1. Technical and plain-language remediation steps.",
            "2. Why this matters.",
            "3. A recommended underwriting action (Accept risk, Request fix, Decline policy) with reasoning.",
            "4. A confidence score (0-1) for your recommendation.",
            "Answer with exactly these four lines and nothing else:",
            "Remediation: ...",
            "Why: ...",
            "Recommended Action: ...",
            "Confidence: ...",
        ]
        .map(String::from),
    );
    lines.join("\n")
}

/// Underwriting checklist pre-fill for a structured incident.
pub fn checklist_prompt(incident: &Incident) -> String {
    [
        UNDERWRITER_PREAMBLE.to_string(),
        format!("Incident: {}", incident.title),
        format!(
            "Description: {}",
            truncate(incident.description.trim(), MAX_INCIDENT_CHARS)
        ),
        format!("Risk: {}", incident.risk_level),
        "List 3 to 6 underwriting checklist items the underwriter should verify for this incident."
            .to_string(),
        "Respond with a JSON object only, using exactly this key:".to_string(),
        r#"{"checklist": ["item", "..."]}"#.to_string(),
    ]
    .join("\n")
}

/// Broker yes/no questions driven by the checklist items the underwriter selected.
pub fn broker_questions_prompt(incident_text: &str, checklist: &[String]) -> String {
    let mut lines = vec![
        UNDERWRITER_PREAMBLE.to_string(),
        "Incident:".to_string(),
        truncate(incident_text.trim(), MAX_INCIDENT_CHARS),
        "Checklist items selected by the underwriter:".to_string(),
    ];
    lines.extend(bullet_list(checklist));
    lines.extend(
        [
            "Write 2 to 5 yes/no questions for the broker that clarify the controls behind the selected checklist items.",
            "Respond with a JSON object only, using exactly this key:",
            r#"{"broker_questions": ["question", "..."]}"#,
        ]
        .map(String::from),
    );
    lines.join("\n")
}

/// Mitigation suggestions and remediation refined by the broker's answers.
pub fn dynamic_suggestions_prompt(
    incident_text: &str,
    checklist: &[String],
    answers: &BrokerAnswerSet,
) -> String {
    let mut lines = vec![
        UNDERWRITER_PREAMBLE.to_string(),
        "Incident:".to_string(),
        truncate(incident_text.trim(), MAX_INCIDENT_CHARS),
        "Checklist items selected by the underwriter:".to_string(),
    ];
    lines.extend(bullet_list(checklist));
    lines.push("Broker answers:".to_string());
    if answers.is_empty() {
        lines.push("- (no answers provided)".to_string());
    }
    for (idx, (question, answer)) in answers.pairs().enumerate() {
        lines.push(format!("Q{}: {}", idx + 1, question));
        lines.push(format!("A{}: {}", idx + 1, answer));
    }
    lines.extend(
        [
            "Using the broker answers, suggest risk mitigations and a remediation plan.",
            "Respond with a JSON object only, using exactly these keys:",
            r#"{"risk_mitigation": ["suggestion", "..."], "remediation": "steps", "recommendation": "Accept risk | Request fix | Decline policy", "confidence": 0.0, "explanation": "why"}"#,
            "confidence must be a number between 0 and 1.",
        ]
        .map(String::from),
    );
    lines.join("\n")
}

/// Full structured analysis of a free-text incident description.
pub fn full_analysis_prompt(text: &str) -> String {
    [
        UNDERWRITER_PREAMBLE.to_string(),
        "Incident report:".to_string(),
        truncate(text.trim(), MAX_INCIDENT_CHARS),
        "Analyse the report and respond with a JSON object only, using exactly these keys:".to_string(),
        r#"{"checklist": ["item"], "broker_questions": ["yes/no question"], "risk_mitigation": ["suggestion"], "remediation": "steps", "recommendation": "Accept risk | Request fix | Decline policy", "confidence": 0.0, "broker_summary": "two-line note for the broker", "explanation": "why"}"#.to_string(),
        "confidence must be a number between 0 and 1.".to_string(),
    ]
    .join("\n")
}

/// Union of the items carried into the next stage: trimmed, blanks dropped,
/// duplicates removed with first-occurrence order kept.
pub fn union_gate<S: AsRef<str>>(items: &[S]) -> Vec<String> {
    let mut gated: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let item = item.as_ref().trim();
        if item.is_empty() || gated.iter().any(|seen| seen == item) {
            continue;
        }
        gated.push(item.to_string());
    }
    gated
}

fn bullet_list(items: &[String]) -> Vec<String> {
    if items.is_empty() {
        return vec!["- (none selected)".to_string()];
    }
    items.iter().map(|item| format!("- {item}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::sample_incident;
    use crate::risk::BrokerAnswer;

    #[test]
    fn builders_are_deterministic() {
        let incident = sample_incident();
        assert_eq!(remediation_prompt(&incident), remediation_prompt(&incident));
        assert_eq!(full_analysis_prompt("x"), full_analysis_prompt("x"));
    }

    #[test]
    fn remediation_prompt_states_labeled_contract() {
        let prompt = remediation_prompt(&sample_incident());
        for label in ["Remediation:", "Why:", "Recommended Action:", "Confidence:"] {
            assert!(prompt.contains(label), "missing {label}");
        }
        assert!(prompt.contains("Estimated remediation cost: 2500.00"));
    }

    #[test]
    fn remediation_prompt_omits_missing_cost() {
        let mut incident = sample_incident();
        incident.remediation_cost = None;
        assert!(!remediation_prompt(&incident).contains("remediation cost"));
    }

    #[test]
    fn full_analysis_prompt_enumerates_json_keys() {
        let prompt = full_analysis_prompt("Ransomware note found on file server");
        for key in [
            "checklist",
            "broker_questions",
            "risk_mitigation",
            "remediation",
            "recommendation",
            "confidence",
            "broker_summary",
            "explanation",
        ] {
            assert!(prompt.contains(&format!("\"{key}\"")), "missing {key}");
        }
    }

    #[test]
    fn dynamic_prompt_pairs_questions_with_answers_in_order() {
        let answers = BrokerAnswerSet::new(
            vec!["Is MFA enforced?".into(), "Are backups offline?".into()],
            vec![BrokerAnswer::Yes, BrokerAnswer::No],
        )
        .unwrap();
        let prompt = dynamic_suggestions_prompt("phishing", &["MFA".to_string()], &answers);
        let q1 = prompt.find("Q1: Is MFA enforced?").unwrap();
        let a1 = prompt.find("A1: Yes").unwrap();
        let q2 = prompt.find("Q2: Are backups offline?").unwrap();
        let a2 = prompt.find("A2: No").unwrap();
        assert!(q1 < a1 && a1 < q2 && q2 < a2);
        assert!(prompt.contains("- MFA"));
    }

    #[test]
    fn request_render_matches_free_functions() {
        let incident = sample_incident();
        let checklist = vec!["Backups".to_string()];
        let request = PromptRequest::BrokerQuestions {
            incident_text: "text",
            checklist: &checklist,
        };
        assert_eq!(request.task_kind(), TaskKind::BrokerQuestions);
        assert_eq!(request.render(), broker_questions_prompt("text", &checklist));
        let request = PromptRequest::Remediation {
            incident: &incident,
        };
        assert_eq!(request.task_kind().response_format(), ResponseFormat::LabeledLines);
        assert_eq!(request.render(), remediation_prompt(&incident));
    }

    #[test]
    fn empty_checklist_is_called_out() {
        let prompt = broker_questions_prompt("text", &[]);
        assert!(prompt.contains("- (none selected)"));
    }

    #[test]
    fn union_gate_trims_and_dedupes_in_order() {
        let gated = union_gate(&["  MFA ", "Backups", "", "MFA", "EDR", "Backups"]);
        assert_eq!(gated, ["MFA", "Backups", "EDR"]);
    }

    #[test]
    fn long_incident_text_is_truncated() {
        let text = "a".repeat(MAX_INCIDENT_CHARS + 50);
        let prompt = full_analysis_prompt(&text);
        assert!(prompt.contains('…'));
        assert!(!prompt.contains(&"a".repeat(MAX_INCIDENT_CHARS + 1)));
    }
}
