use serde::{Deserialize, Serialize};

use crate::risk::BrokerAdjustment;

/// Confidence assumed when a provider omits one or sends something unreadable.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Remediation guidance for a single incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationResult {
    pub remediation_steps: String,
    pub explanation: String,
    /// `Accept risk`, `Request fix`, `Decline policy`, or free text from the provider.
    pub recommended_action: String,
    /// Always within `0.0..=1.0`.
    pub confidence_score: f64,
}

impl Default for RemediationResult {
    fn default() -> Self {
        Self {
            remediation_steps: String::new(),
            explanation: String::new(),
            recommended_action: String::new(),
            confidence_score: DEFAULT_CONFIDENCE,
        }
    }
}

/// Structured analysis of a free-text incident report.
///
/// Every sequence keeps provider order; the presentation layer renders and pairs by position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FullAnalysisResult {
    pub checklist: Vec<String>,
    pub broker_questions: Vec<String>,
    pub risk_mitigation: Vec<String>,
    pub remediation_steps: String,
    pub recommended_action: String,
    /// `None` when the provider left confidence out entirely.
    pub confidence_score: Option<f64>,
    pub broker_summary: String,
    pub explanation: String,
}

impl FullAnalysisResult {
    /// `true` when nothing usable was recovered from the provider output.
    pub fn is_empty(&self) -> bool {
        self.checklist.is_empty()
            && self.broker_questions.is_empty()
            && self.risk_mitigation.is_empty()
            && self.remediation_steps.is_empty()
            && self.recommended_action.is_empty()
            && self.confidence_score.is_none()
            && self.broker_summary.is_empty()
            && self.explanation.is_empty()
    }

    /// The remediation subset, with the default confidence filled in when absent.
    pub fn remediation(&self) -> RemediationResult {
        RemediationResult {
            remediation_steps: self.remediation_steps.clone(),
            explanation: self.explanation.clone(),
            recommended_action: self.recommended_action.clone(),
            confidence_score: self.confidence_score.unwrap_or(DEFAULT_CONFIDENCE),
        }
    }
}

/// Suggestions and remediation refined by broker answers, merged with the
/// deterministic broker-answer adjustment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DynamicRemediation {
    pub risk_mitigation: Vec<String>,
    pub remediation: RemediationResult,
    pub risk_multiplier: f64,
    pub urgent: bool,
}

impl DynamicRemediation {
    pub fn from_parts(remediation: RemediationResult, adjustment: BrokerAdjustment) -> Self {
        Self {
            risk_mitigation: adjustment.suggestions,
            remediation,
            risk_multiplier: adjustment.risk_multiplier,
            urgent: adjustment.urgent,
        }
    }
}
