use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Qualitative severity attached to an incident record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        };
        f.write_str(label)
    }
}

/// A reported cybersecurity exposure under underwriting review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub title: String,
    pub description: String,
    pub risk_level: RiskLevel,
    /// Share of the portfolio risk attributed to this incident (0–100 inclusive).
    #[serde(default)]
    pub risk_contribution_score: u32,
    /// Estimated remediation cost in the policy currency.
    #[serde(default)]
    pub remediation_cost: Option<f64>,
}

impl Incident {
    /// Human-facing label used when listing incidents for selection.
    pub fn label(&self) -> String {
        format!("{} (Risk: {})", self.title, self.risk_level)
    }

    /// Validate invariants for a loaded record.
    pub fn validate(&self) -> Result<(), IncidentValidationError> {
        if self.id.trim().is_empty() {
            return Err(IncidentValidationError::EmptyId);
        }
        if self.risk_contribution_score > 100 {
            return Err(IncidentValidationError::InvalidScore {
                incident_id: self.id.clone(),
                score: self.risk_contribution_score,
            });
        }
        if let Some(cost) = self.remediation_cost {
            if !cost.is_finite() || cost < 0.0 {
                return Err(IncidentValidationError::InvalidCost {
                    incident_id: self.id.clone(),
                    cost,
                });
            }
        }
        Ok(())
    }

    /// The free-text rendering fed to the text-driven flows.
    pub fn as_text(&self) -> String {
        format!(
            "{}\nRisk level: {}\n{}",
            self.title, self.risk_level, self.description
        )
    }
}

/// Errors emitted while validating incident records.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IncidentValidationError {
    #[error("incident id must not be blank")]
    EmptyId,
    #[error("incident `{incident_id}` risk contribution must be within 0..=100 (got {score})")]
    InvalidScore { incident_id: String, score: u32 },
    #[error("incident `{incident_id}` remediation cost must be a non-negative amount (got {cost})")]
    InvalidCost { incident_id: String, cost: f64 },
}

/// Portfolio-wide risk: the sum of every incident's contribution score.
pub fn total_risk(incidents: &[Incident]) -> i64 {
    incidents
        .iter()
        .map(|incident| i64::from(incident.risk_contribution_score))
        .sum()
}

#[cfg(test)]
pub(crate) fn sample_incident() -> Incident {
    Incident {
        id: "INC-001".into(),
        title: "Exposed RDP endpoint".into(),
        description: "Port 3389 reachable from the internet without MFA.".into(),
        risk_level: RiskLevel::High,
        risk_contribution_score: 80,
        remediation_cost: Some(2500.0),
    }
}
