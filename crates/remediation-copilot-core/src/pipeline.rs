//! The four underwriting flows, each a fixed chain of
//! prompt builder → dispatcher → normalizer (→ risk adjuster).
//!
//! Flow 1 (`remediate`) has no offline fallback and surfaces
//! [`CopilotError::NoProviderAvailable`]. Every other flow degrades to static
//! guidance so callers always receive a record of the expected shape.

use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::error::CopilotError;
use crate::incident::Incident;
use crate::llm::{Dispatched, Dispatcher, LlmSettings, ProviderRegistry};
use crate::normalize::{parse_full_analysis, parse_labeled, parse_string_list};
use crate::prompts::{union_gate, PromptRequest};
use crate::records::{DynamicRemediation, FullAnalysisResult, RemediationResult, DEFAULT_CONFIDENCE};
use crate::risk::{adjust_for_broker_answers, BrokerAnswerSet, RecommendedAction};

/// Action substituted when a provider answers without naming one.
pub const DEFAULT_ACTION: &str = "Request fix";

const STUB_CHECKLIST: [&str; 4] = [
    "Confirm multi-factor authentication is enforced for all remote access",
    "Verify offline backups exist and were restore-tested recently",
    "Check endpoint detection and response coverage on affected hosts",
    "Review patch cadence for internet-facing systems",
];

const STUB_QUESTIONS: [&str; 2] = [
    "Is multi-factor authentication enforced for all remote access?",
    "Are backups stored offline and restore-tested within the last 90 days?",
];

const STUB_MITIGATION: [&str; 3] = [
    "Enforce multi-factor authentication on every externally reachable service",
    "Keep immutable or offline backups and test restores quarterly",
    "Deploy endpoint detection and response across the estate",
];

const STUB_REMEDIATION: &str = "Contain affected systems, rotate exposed credentials, and patch the exploited weakness before binding.";
const STUB_EXPLANATION: &str =
    "Static guidance: no language-model provider produced a usable analysis.";
const STUB_BROKER_SUMMARY: &str =
    "Incident requires review before binding. Please confirm the listed controls with the insured.";

/// Entry point for every flow; owns the provider registry and the dispatcher.
#[derive(Debug, Clone)]
pub struct Copilot {
    registry: ProviderRegistry,
    dispatcher: Dispatcher,
}

impl Copilot {
    pub fn new(registry: ProviderRegistry, dispatcher: Dispatcher) -> Self {
        Self {
            registry,
            dispatcher,
        }
    }

    pub fn from_settings(settings: &LlmSettings) -> Self {
        Self::new(
            ProviderRegistry::from_settings(settings),
            Dispatcher::new(Duration::from_secs(settings.timeout_secs)),
        )
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Flow 1: labeled-line remediation for a structured incident.
    #[instrument(skip_all, fields(incident = %incident.id))]
    pub async fn remediate(&self, incident: &Incident) -> Result<RemediationResult, CopilotError> {
        let dispatched = self.dispatch(PromptRequest::Remediation { incident }).await?;
        let mut result = parse_labeled(&dispatched.text);
        fill_missing_action(&mut result.recommended_action, &dispatched.provider);
        Ok(result)
    }

    /// Flow 2: JSON analysis of free text, falling back to static guidance.
    #[instrument(skip_all, fields(text_chars = text.chars().count()))]
    pub async fn analyze_text(&self, text: &str) -> FullAnalysisResult {
        let dispatched = match self.dispatch(PromptRequest::FullAnalysis { text }).await {
            Ok(dispatched) => dispatched,
            Err(err) => {
                warn!(error = %err, "analysis unavailable; using static analysis");
                return stub_analysis();
            }
        };
        let mut analysis = parse_full_analysis(&dispatched.text);
        if analysis.is_empty() {
            warn!(provider = %dispatched.provider, "analysis response had no usable fields; using static analysis");
            return stub_analysis();
        }
        fill_missing_action(&mut analysis.recommended_action, &dispatched.provider);
        analysis
    }

    /// AI pre-fill of the underwriting checklist for a structured incident.
    #[instrument(skip_all, fields(incident = %incident.id))]
    pub async fn underwriting_checklist(&self, incident: &Incident) -> Vec<String> {
        let items = match self.dispatch(PromptRequest::Checklist { incident }).await {
            Ok(dispatched) => parse_string_list(&dispatched.text, "checklist"),
            Err(err) => {
                warn!(error = %err, "checklist unavailable; using static checklist");
                Vec::new()
            }
        };
        if items.is_empty() {
            return to_owned(&STUB_CHECKLIST);
        }
        items
    }

    /// Flow 3: broker questions driven by the selected checklist items.
    #[instrument(skip_all, fields(selected = selected.len()))]
    pub async fn broker_questions<S: AsRef<str>>(
        &self,
        incident_text: &str,
        selected: &[S],
    ) -> Vec<String> {
        let checklist = union_gate(selected);
        let request = PromptRequest::BrokerQuestions {
            incident_text,
            checklist: &checklist,
        };
        let questions = match self.dispatch(request).await {
            Ok(dispatched) => parse_string_list(&dispatched.text, "broker_questions"),
            Err(err) => {
                warn!(error = %err, "broker questions unavailable; using static questions");
                Vec::new()
            }
        };
        if questions.is_empty() {
            return to_owned(&STUB_QUESTIONS);
        }
        questions
    }

    /// Flow 4: remediation refined by broker answers, merged with the
    /// deterministic broker-answer adjustment.
    #[instrument(skip_all, fields(answers = answers.len()))]
    pub async fn dynamic_remediation<S: AsRef<str>>(
        &self,
        incident_text: &str,
        checklist: &[S],
        answers: &BrokerAnswerSet,
    ) -> DynamicRemediation {
        let checklist = union_gate(checklist);
        let request = PromptRequest::DynamicSuggestions {
            incident_text,
            checklist: &checklist,
            answers,
        };
        let analysis = match self.dispatch(request).await {
            Ok(dispatched) => {
                let mut analysis = parse_full_analysis(&dispatched.text);
                if !analysis.is_empty() {
                    fill_missing_action(&mut analysis.recommended_action, &dispatched.provider);
                }
                analysis
            }
            Err(err) => {
                warn!(error = %err, "dynamic remediation unavailable; using static guidance");
                FullAnalysisResult::default()
            }
        };
        let analysis = if analysis.is_empty() {
            stub_analysis()
        } else {
            analysis
        };
        let adjustment = adjust_for_broker_answers(&analysis.risk_mitigation, answers.answers());
        debug!(
            multiplier = adjustment.risk_multiplier,
            urgent = adjustment.urgent,
            "broker answers folded into suggestions"
        );
        DynamicRemediation::from_parts(analysis.remediation(), adjustment)
    }

    async fn dispatch(&self, request: PromptRequest<'_>) -> Result<Dispatched, CopilotError> {
        let prompt = request.render();
        debug!(task = ?request.task_kind(), prompt_chars = prompt.chars().count(), "dispatching prompt");
        match self
            .dispatcher
            .dispatch(&prompt, self.registry.available_providers())
            .await
        {
            Ok(dispatched) => {
                info!(task = ?request.task_kind(), provider = %dispatched.provider, "task answered");
                Ok(dispatched)
            }
            Err(CopilotError::NoProviderAvailable { attempts }) => {
                let mut trail = self.registry.skipped().to_vec();
                trail.extend(attempts);
                Err(CopilotError::NoProviderAvailable { attempts: trail })
            }
            Err(other) => Err(other),
        }
    }
}

/// Re-runs the free-text analysis only when the text differs from the last one seen.
///
/// Every other flow runs once per explicit request; this one follows its input.
#[derive(Debug, Default)]
pub struct AnalysisTracker {
    last_text: Option<String>,
    last_result: FullAnalysisResult,
    runs: usize,
}

impl AnalysisTracker {
    /// Returns the current analysis and whether it was recomputed for `text`.
    pub async fn refresh(&mut self, copilot: &Copilot, text: &str) -> (&FullAnalysisResult, bool) {
        if self.last_text.as_deref() == Some(text) {
            debug!("input text unchanged; reusing previous analysis");
            return (&self.last_result, false);
        }
        self.last_result = copilot.analyze_text(text).await;
        self.last_text = Some(text.to_string());
        self.runs += 1;
        (&self.last_result, true)
    }

    pub fn runs(&self) -> usize {
        self.runs
    }
}

/// Short note for the broker: incident, severity and the first remediation sentence.
pub fn broker_summary(remediation_steps: &str, incident: &Incident) -> String {
    let first_sentence = remediation_steps.split('.').next().unwrap_or_default().trim();
    format!(
        "{} ({} risk): {}. Issue addressed to reduce exposure.",
        incident.title, incident.risk_level, first_sentence
    )
}

/// The recommendation that stands once an underwriter override, if any, is applied.
pub fn final_recommendation(ai_action: &str, human_override: Option<&RecommendedAction>) -> String {
    match human_override {
        Some(action) => action.to_string(),
        None => ai_action.to_string(),
    }
}

/// A provider answer that names no action still yields a usable recommendation.
fn fill_missing_action(action: &mut String, provider: &str) {
    if action.trim().is_empty() {
        warn!(provider, "response named no recommended action; defaulting to `{DEFAULT_ACTION}`");
        *action = DEFAULT_ACTION.to_string();
    }
}

fn stub_analysis() -> FullAnalysisResult {
    FullAnalysisResult {
        checklist: to_owned(&STUB_CHECKLIST),
        broker_questions: to_owned(&STUB_QUESTIONS),
        risk_mitigation: to_owned(&STUB_MITIGATION),
        remediation_steps: STUB_REMEDIATION.to_string(),
        recommended_action: DEFAULT_ACTION.to_string(),
        confidence_score: Some(DEFAULT_CONFIDENCE),
        broker_summary: STUB_BROKER_SUMMARY.to_string(),
        explanation: STUB_EXPLANATION.to_string(),
    }
}

fn to_owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AttemptStatus;
    use crate::incident::{sample_incident, total_risk};
    use crate::llm::testing::{handle, ScriptedClient};
    use crate::risk::{
        BrokerAnswer, RiskAssessment, ESCALATION_SUGGESTION, NO_ACTION_SUGGESTION,
    };

    fn copilot_with(replies: &[&str]) -> Copilot {
        let handles = replies
            .iter()
            .enumerate()
            .map(|(idx, reply)| handle(&format!("p{idx}"), ScriptedClient::ok(reply)))
            .collect();
        Copilot::new(ProviderRegistry::from_handles(handles), Dispatcher::default())
    }

    fn offline() -> Copilot {
        Copilot::from_settings(&LlmSettings::default())
    }

    #[tokio::test]
    async fn remediation_end_to_end_request_fix() {
        let copilot = copilot_with(&[
            "Remediation: Close RDP. Enforce MFA.\nWhy: Common entry point\nRecommended Action: Request fix\nConfidence: 0.5",
        ]);
        let incident = sample_incident();
        let result = copilot.remediate(&incident).await.unwrap();
        assert_eq!(result.recommended_action, "Request fix");
        assert_eq!(result.confidence_score, 0.5);

        let assessment =
            RiskAssessment::compute(200, &incident, &result.recommended_action, result.confidence_score);
        assert_eq!(assessment.risk_after, 40);
        assert_eq!(assessment.net_risk, 160);
    }

    #[tokio::test]
    async fn remediation_accept_risk_zeroes_residual() {
        let copilot = copilot_with(&["Recommended Action: Accept risk\nConfidence: 0.1"]);
        let incident = sample_incident();
        let result = copilot.remediate(&incident).await.unwrap();
        let total = total_risk(std::slice::from_ref(&incident));
        let assessment =
            RiskAssessment::compute(total, &incident, &result.recommended_action, result.confidence_score);
        assert_eq!(assessment.risk_after, 0);
        assert_eq!(assessment.net_risk, 0);
    }

    #[tokio::test]
    async fn remediation_without_providers_is_fatal() {
        let err = offline()
            .remediate(&sample_incident())
            .await
            .expect_err("flow 1 has no fallback");
        match err {
            CopilotError::NoProviderAvailable { attempts } => {
                assert_eq!(attempts.len(), 4);
                assert!(attempts
                    .iter()
                    .all(|a| matches!(a.status, AttemptStatus::Skipped(_))));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn remediation_fills_missing_action() {
        let copilot = copilot_with(&["Remediation: Patch the VPN appliance"]);
        let result = copilot.remediate(&sample_incident()).await.unwrap();
        assert_eq!(result.recommended_action, DEFAULT_ACTION);
        assert_eq!(result.remediation_steps, "Patch the VPN appliance");
        assert_eq!(result.confidence_score, 0.5);
    }

    #[tokio::test]
    async fn analysis_passes_through_parsed_json() {
        let copilot = copilot_with(&[
            r#"{"checklist": ["Backups"], "broker_questions": ["Is EDR deployed?"], "recommendation": "Decline policy", "confidence": 0.9}"#,
        ]);
        let analysis = copilot.analyze_text("Ransomware on file server").await;
        assert_eq!(analysis.checklist, ["Backups"]);
        assert_eq!(analysis.recommended_action, "Decline policy");
        assert_eq!(analysis.confidence_score, Some(0.9));
    }

    #[tokio::test]
    async fn analysis_falls_back_on_garbage_or_no_provider() {
        let garbage = copilot_with(&["I am unable to produce JSON today."]);
        assert_eq!(garbage.analyze_text("x").await, stub_analysis());
        assert_eq!(offline().analyze_text("x").await, stub_analysis());
    }

    #[tokio::test]
    async fn failing_provider_falls_through_to_next() {
        let broken = ScriptedClient::failing("503");
        let working = ScriptedClient::ok(r#"{"broker_questions": ["Q-from-working"]}"#);
        let copilot = Copilot::new(
            ProviderRegistry::from_handles(vec![handle("broken", broken.clone()), handle("working", working)]),
            Dispatcher::default(),
        );
        let questions = copilot.broker_questions("text", &["MFA"]).await;
        assert_eq!(questions, ["Q-from-working"]);
        assert_eq!(broken.calls(), 1);
    }

    #[tokio::test]
    async fn broker_questions_prompt_carries_only_gated_items() {
        let client = ScriptedClient::ok(r#"["Is MFA enforced?"]"#);
        let copilot = Copilot::new(
            ProviderRegistry::from_handles(vec![handle("only", client.clone())]),
            Dispatcher::default(),
        );
        let questions = copilot
            .broker_questions("Phishing campaign", &["MFA", " MFA ", "", "Backups"])
            .await;
        assert_eq!(questions, ["Is MFA enforced?"]);
        let prompt = client.last_prompt().unwrap();
        assert_eq!(prompt.matches("- MFA").count(), 1);
        assert!(prompt.contains("- Backups"));
    }

    #[tokio::test]
    async fn broker_questions_stub_has_two_items() {
        let questions = offline().broker_questions("text", &["MFA"]).await;
        assert_eq!(questions.len(), 2);
        let empty_list = copilot_with(&[r#"{"broker_questions": []}"#]);
        assert_eq!(empty_list.broker_questions("text", &["MFA"]).await, questions);
    }

    #[tokio::test]
    async fn checklist_prefill_parses_or_falls_back() {
        let copilot = copilot_with(&[r#"{"checklist": ["MFA on RDP", "Firewall review"]}"#]);
        assert_eq!(
            copilot.underwriting_checklist(&sample_incident()).await,
            ["MFA on RDP", "Firewall review"]
        );
        assert_eq!(
            offline().underwriting_checklist(&sample_incident()).await.len(),
            STUB_CHECKLIST.len()
        );
    }

    #[tokio::test]
    async fn dynamic_remediation_escalates_on_any_no() {
        let copilot = copilot_with(&[
            r#"{"risk_mitigation": ["Segment OT network"], "remediation": "Isolate PLCs", "recommendation": "Request fix", "confidence": 0.6, "explanation": "Flat network"}"#,
        ]);
        let answers = BrokerAnswerSet::new(
            vec!["Is MFA on?".into(), "Is OT segmented?".into()],
            vec![BrokerAnswer::Yes, BrokerAnswer::No],
        )
        .unwrap();
        let result = copilot
            .dynamic_remediation("OT exposure", &["Segmentation"], &answers)
            .await;
        assert_eq!(result.risk_mitigation, ["Segment OT network", ESCALATION_SUGGESTION]);
        assert_eq!(result.risk_multiplier, 1.2);
        assert!(result.urgent);
        assert_eq!(result.remediation.remediation_steps, "Isolate PLCs");
        assert_eq!(result.remediation.confidence_score, 0.6);
    }

    #[tokio::test]
    async fn json_flows_fill_missing_action() {
        let copilot = copilot_with(&[r#"{"checklist": ["MFA"], "risk_mitigation": ["Enable MFA"], "confidence": 0.3}"#]);
        let analysis = copilot.analyze_text("Credential stuffing").await;
        assert_eq!(analysis.checklist, ["MFA"]);
        assert_eq!(analysis.recommended_action, DEFAULT_ACTION);

        let answers = BrokerAnswerSet::parse(vec!["Is MFA on?".into()], &["yes"]).unwrap();
        let refined = copilot
            .dynamic_remediation("Credential stuffing", &["MFA"], &answers)
            .await;
        assert_eq!(refined.remediation.recommended_action, DEFAULT_ACTION);
        assert_eq!(refined.remediation.confidence_score, 0.3);
        assert_eq!(refined.risk_mitigation, ["Enable MFA", NO_ACTION_SUGGESTION]);
    }

    #[tokio::test]
    async fn dynamic_remediation_stub_still_applies_answers() {
        let answers = BrokerAnswerSet::parse(vec!["Q1".into()], &["Yes"]).unwrap();
        let result = offline()
            .dynamic_remediation("text", &[] as &[&str], &answers)
            .await;
        assert_eq!(result.risk_mitigation.last().map(String::as_str), Some(NO_ACTION_SUGGESTION));
        assert_eq!(result.risk_multiplier, 0.8);
        assert_eq!(result.remediation.recommended_action, DEFAULT_ACTION);
    }

    #[tokio::test]
    async fn tracker_reruns_only_on_changed_text() {
        let client = ScriptedClient::ok(r#"{"checklist": ["A"]}"#);
        let copilot = Copilot::new(
            ProviderRegistry::from_handles(vec![handle("only", client.clone())]),
            Dispatcher::default(),
        );
        let mut tracker = AnalysisTracker::default();
        let (_, rerun) = tracker.refresh(&copilot, "first").await;
        assert!(rerun);
        let (result, rerun) = tracker.refresh(&copilot, "first").await;
        assert!(!rerun);
        assert_eq!(result.checklist, ["A"]);
        let (_, rerun) = tracker.refresh(&copilot, "second").await;
        assert!(rerun);
        assert_eq!(tracker.runs(), 2);
        assert_eq!(client.calls(), 2);
    }

    #[test]
    fn broker_summary_uses_first_sentence() {
        let summary = broker_summary("Close RDP. Enforce MFA.", &sample_incident());
        assert_eq!(
            summary,
            "Exposed RDP endpoint (High risk): Close RDP. Issue addressed to reduce exposure."
        );
    }

    #[test]
    fn override_replaces_ai_recommendation() {
        assert_eq!(final_recommendation("Request fix", None), "Request fix");
        assert_eq!(
            final_recommendation("Request fix", Some(&RecommendedAction::DeclinePolicy)),
            "Decline policy"
        );
    }
}
