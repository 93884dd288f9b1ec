//! Deterministic residual-risk arithmetic and broker-answer adjustments.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CopilotError;
use crate::incident::Incident;

pub const ESCALATION_SUGGESTION: &str =
    "Escalate: broker reported a missing control; request remediation evidence before binding.";
pub const NO_ACTION_SUGGESTION: &str =
    "No additional action needed: broker confirmed every queried control is in place.";
pub const ESCALATION_MULTIPLIER: f64 = 1.2;
pub const CONFIRMED_MULTIPLIER: f64 = 0.8;

/// Residual risk of one incident once the recommended action is applied.
///
/// Accepting the risk removes it from the residual entirely; any other action
/// leaves `floor(risk_before × (1 − confidence))`.
pub fn risk_after(risk_before: u32, recommended_action: &str, confidence: f64) -> u32 {
    if RecommendedAction::is_accept(recommended_action) {
        return 0;
    }
    let confidence = if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };
    (f64::from(risk_before) * (1.0 - confidence)).floor() as u32
}

/// Portfolio risk after swapping one incident's contribution for its residual.
pub fn net_risk(total_risk: i64, risk_before: i64, risk_after: i64) -> i64 {
    total_risk - (risk_before - risk_after)
}

/// A broker's answer to a yes/no clarification question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrokerAnswer {
    Yes,
    No,
}

impl FromStr for BrokerAnswer {
    type Err = CopilotError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" => Ok(Self::Yes),
            "no" | "n" => Ok(Self::No),
            other => Err(CopilotError::InvalidAnswers(format!(
                "answer `{other}` must be Yes or No"
            ))),
        }
    }
}

impl fmt::Display for BrokerAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Yes => "Yes",
            Self::No => "No",
        })
    }
}

/// Broker questions paired positionally with their answers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BrokerAnswerSet {
    questions: Vec<String>,
    answers: Vec<BrokerAnswer>,
}

impl BrokerAnswerSet {
    pub fn new(questions: Vec<String>, answers: Vec<BrokerAnswer>) -> Result<Self, CopilotError> {
        if questions.len() != answers.len() {
            return Err(CopilotError::InvalidAnswers(format!(
                "{} question(s) but {} answer(s)",
                questions.len(),
                answers.len()
            )));
        }
        Ok(Self { questions, answers })
    }

    /// Build from raw answer strings, accepting `Yes`/`No` in any case.
    pub fn parse<S: AsRef<str>>(questions: Vec<String>, answers: &[S]) -> Result<Self, CopilotError> {
        let answers = answers
            .iter()
            .map(|answer| answer.as_ref().parse())
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(questions, answers)
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    pub fn answers(&self) -> &[BrokerAnswer] {
        &self.answers
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, BrokerAnswer)> + '_ {
        self.questions
            .iter()
            .map(String::as_str)
            .zip(self.answers.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

/// Advisory outcome of folding broker answers into the suggestion list.
///
/// The multiplier is not applied to any stored risk; callers decide how to use it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrokerAdjustment {
    pub suggestions: Vec<String>,
    pub risk_multiplier: f64,
    pub urgent: bool,
}

pub fn adjust_for_broker_answers(
    base_suggestions: &[String],
    answers: &[BrokerAnswer],
) -> BrokerAdjustment {
    let mut suggestions = base_suggestions.to_vec();
    if answers.contains(&BrokerAnswer::No) {
        suggestions.push(ESCALATION_SUGGESTION.to_string());
        return BrokerAdjustment {
            suggestions,
            risk_multiplier: ESCALATION_MULTIPLIER,
            urgent: true,
        };
    }
    if !answers.is_empty() {
        suggestions.push(NO_ACTION_SUGGESTION.to_string());
        return BrokerAdjustment {
            suggestions,
            risk_multiplier: CONFIRMED_MULTIPLIER,
            urgent: false,
        };
    }
    BrokerAdjustment {
        suggestions,
        risk_multiplier: 1.0,
        urgent: false,
    }
}

/// Classification of the free-text underwriting recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    AcceptRisk,
    RequestFix,
    DeclinePolicy,
    Other(String),
}

impl RecommendedAction {
    pub fn classify(text: &str) -> Self {
        let lowered = text.trim().to_ascii_lowercase();
        if lowered.starts_with("accept") {
            Self::AcceptRisk
        } else if lowered.starts_with("request") {
            Self::RequestFix
        } else if lowered.starts_with("decline") {
            Self::DeclinePolicy
        } else {
            Self::Other(text.trim().to_string())
        }
    }

    /// `true` when the text starts with "accept" in any case.
    pub fn is_accept(text: &str) -> bool {
        text.trim_start()
            .get(..6)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("accept"))
    }
}

impl fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AcceptRisk => f.write_str("Accept risk"),
            Self::RequestFix => f.write_str("Request fix"),
            Self::DeclinePolicy => f.write_str("Decline policy"),
            Self::Other(text) => f.write_str(text),
        }
    }
}

/// Before/after view of one incident against the portfolio total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RiskAssessment {
    pub total_risk: i64,
    pub risk_before: u32,
    pub risk_after: u32,
    pub net_risk: i64,
}

impl RiskAssessment {
    pub fn compute(total_risk: i64, incident: &Incident, action: &str, confidence: f64) -> Self {
        let risk_before = incident.risk_contribution_score;
        let after = risk_after(risk_before, action, confidence);
        Self {
            total_risk,
            risk_before,
            risk_after: after,
            net_risk: net_risk(total_risk, i64::from(risk_before), i64::from(after)),
        }
    }
}
