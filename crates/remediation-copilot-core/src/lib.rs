pub mod error;
pub mod incident;
pub mod llm;
pub mod normalize;
pub mod pipeline;
pub mod prompts;
pub mod records;
pub mod report;
pub mod risk;

pub use error::{AttemptStatus, CopilotError, ProviderAttempt};
pub use incident::{total_risk, Incident, IncidentValidationError, RiskLevel};
pub use llm::{
    Dispatched, Dispatcher, LlmClient, LlmSettings, ProviderHandle, ProviderKind,
    ProviderRegistry, ProviderSettings,
};
pub use pipeline::{broker_summary, final_recommendation, AnalysisTracker, Copilot};
pub use records::{DynamicRemediation, FullAnalysisResult, RemediationResult};
pub use risk::{
    adjust_for_broker_answers, net_risk, risk_after, BrokerAdjustment, BrokerAnswer,
    BrokerAnswerSet, RecommendedAction, RiskAssessment,
};
