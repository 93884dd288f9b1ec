use std::fmt::Write;

use serde::Serialize;

use crate::incident::Incident;
use crate::records::{DynamicRemediation, FullAnalysisResult, RemediationResult};
use crate::risk::RiskAssessment;

/// Format styles supported by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Everything shown for a single-incident remediation run.
#[derive(Debug, Clone, Serialize)]
pub struct RemediationReport<'a> {
    pub incident: &'a Incident,
    pub result: &'a RemediationResult,
    pub final_recommendation: &'a str,
    pub assessment: RiskAssessment,
    pub broker_summary: &'a str,
}

pub fn render_remediation(report: &RemediationReport<'_>, format: OutputFormat) -> anyhow::Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(report)?);
    }
    let mut out = String::new();
    writeln!(out, "Incident: {}", report.incident.label())?;
    writeln!(out)?;
    writeln!(out, "Remediation Steps:")?;
    writeln!(out, "  {}", or_placeholder(&report.result.remediation_steps))?;
    writeln!(out, "Why: {}", or_placeholder(&report.result.explanation))?;
    writeln!(out)?;
    writeln!(
        out,
        "AI Recommendation: {} (confidence {:.2})",
        report.result.recommended_action, report.result.confidence_score
    )?;
    writeln!(out, "Final Recommendation: {}", report.final_recommendation)?;
    writeln!(out)?;
    writeln!(
        out,
        "Risk before: {} • Risk after: {} • Net risk: {} (portfolio total {})",
        report.assessment.risk_before,
        report.assessment.risk_after,
        report.assessment.net_risk,
        report.assessment.total_risk
    )?;
    writeln!(out)?;
    writeln!(out, "Broker Summary: {}", report.broker_summary)?;
    Ok(out)
}

pub fn render_analysis(analysis: &FullAnalysisResult, format: OutputFormat) -> anyhow::Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(analysis)?);
    }
    let mut out = String::new();
    write_section(&mut out, "Underwriting Checklist", &analysis.checklist)?;
    write_section(&mut out, "Broker Questions", &analysis.broker_questions)?;
    write_section(&mut out, "Risk Mitigation Suggestions", &analysis.risk_mitigation)?;
    if !analysis.remediation_steps.is_empty() {
        writeln!(out, "Remediation Steps:\n  {}", analysis.remediation_steps)?;
    }
    if !analysis.recommended_action.is_empty() {
        match analysis.confidence_score {
            Some(confidence) => writeln!(
                out,
                "Recommendation: {} (confidence {:.2})",
                analysis.recommended_action, confidence
            )?,
            None => writeln!(out, "Recommendation: {}", analysis.recommended_action)?,
        }
    }
    if !analysis.explanation.is_empty() {
        writeln!(out, "Why: {}", analysis.explanation)?;
    }
    if !analysis.broker_summary.is_empty() {
        writeln!(out, "Broker Summary: {}", analysis.broker_summary)?;
    }
    Ok(out)
}

pub fn render_list(title: &str, items: &[String], format: OutputFormat) -> anyhow::Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(items)?);
    }
    let mut out = String::new();
    write_section(&mut out, title, items)?;
    Ok(out)
}

pub fn render_dynamic(result: &DynamicRemediation, format: OutputFormat) -> anyhow::Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(result)?);
    }
    let mut out = String::new();
    write_section(&mut out, "Risk Mitigation Suggestions", &result.risk_mitigation)?;
    writeln!(
        out,
        "Remediation Steps:\n  {}",
        or_placeholder(&result.remediation.remediation_steps)
    )?;
    writeln!(
        out,
        "Recommendation: {} (confidence {:.2})",
        or_placeholder(&result.remediation.recommended_action),
        result.remediation.confidence_score
    )?;
    if !result.remediation.explanation.is_empty() {
        writeln!(out, "Why: {}", result.remediation.explanation)?;
    }
    writeln!(
        out,
        "Risk multiplier: {:.1}{}",
        result.risk_multiplier,
        if result.urgent { " (urgent remediation)" } else { "" }
    )?;
    Ok(out)
}

/// Empty sections are skipped entirely.
fn write_section(out: &mut String, title: &str, items: &[String]) -> std::fmt::Result {
    if items.is_empty() {
        return Ok(());
    }
    writeln!(out, "{title}:")?;
    for (idx, item) in items.iter().enumerate() {
        writeln!(out, "  {}. {}", idx + 1, sanitize_line(item))?;
    }
    writeln!(out)
}

fn or_placeholder(text: &str) -> &str {
    if text.trim().is_empty() {
        "(not provided)"
    } else {
        text
    }
}

fn sanitize_line(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\n' | '\r' => ' ',
            _ => c,
        })
        .collect()
}
