use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use remediation_copilot_core::report::{
    render_analysis, render_dynamic, render_list, render_remediation, OutputFormat,
    RemediationReport,
};
use remediation_copilot_core::{
    broker_summary, final_recommendation, total_risk, AnalysisTracker, BrokerAnswerSet, Copilot,
    Incident, LlmSettings, RecommendedAction, RiskAssessment,
};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "remediation-copilot",
    author,
    version,
    about = "Cyber-insurance underwriting remediation copilot"
)]
struct Cli {
    /// Settings file (TOML, YAML or JSON) with per-provider keys, models and endpoints
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Incident dataset (JSON or YAML)
    #[arg(
        long,
        value_name = "FILE",
        default_value = "data/sample_incidents.json",
        global = true
    )]
    incidents: PathBuf,

    /// Bound on every provider call, e.g. `30s` or `2m`
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration, global = true)]
    timeout: Option<Duration>,

    /// Emit JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show which providers are usable and why the others were skipped
    Providers,
    /// List incidents with their labels and the portfolio total risk
    Incidents,
    /// Generate remediation and a recommendation for one incident
    Remediate {
        #[arg(long)]
        id: String,
        /// Underwriter decision replacing the AI recommendation
        #[arg(long = "override", value_name = "ACTION", value_parser = parse_override)]
        override_action: Option<RecommendedAction>,
        /// Portfolio total used for net risk (defaults to the sum over the dataset)
        #[arg(long, value_name = "N")]
        total_risk: Option<i64>,
    },
    /// Pre-fill the underwriting checklist for one incident
    Checklist {
        #[arg(long)]
        id: String,
    },
    /// Analyze free incident text; repeat `--text` to simulate successive edits
    Analyze {
        #[arg(long = "text", value_name = "TEXT", required = true)]
        texts: Vec<String>,
    },
    /// Generate broker questions from selected checklist items
    Questions {
        #[arg(long)]
        text: String,
        #[arg(long = "item", value_name = "ITEM")]
        items: Vec<String>,
    },
    /// Refine suggestions and remediation with the broker's Yes/No answers
    Suggest {
        #[arg(long)]
        text: String,
        #[arg(long = "item", value_name = "ITEM")]
        items: Vec<String>,
        #[arg(long = "question", value_name = "QUESTION")]
        questions: Vec<String>,
        #[arg(long = "answer", value_name = "YES|NO")]
        answers: Vec<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let settings = load_settings(cli.config.as_deref(), cli.timeout)?;
    let copilot = Copilot::from_settings(&settings);
    info!(
        available = copilot.registry().available_providers().len(),
        timeout_secs = settings.timeout_secs,
        "provider registry ready"
    );

    match cli.command.unwrap_or(Commands::Incidents) {
        Commands::Providers => list_providers(&copilot, cli.json)?,
        Commands::Incidents => list_incidents(&cli.incidents, cli.json)?,
        Commands::Remediate {
            id,
            override_action,
            total_risk,
        } => {
            remediate(
                &copilot,
                &cli.incidents,
                &id,
                override_action.as_ref(),
                total_risk,
                format,
            )
            .await?
        }
        Commands::Checklist { id } => {
            let incidents = load_incidents(&cli.incidents)?;
            let incident = find_incident(&incidents, &id)?;
            let items = copilot.underwriting_checklist(incident).await;
            print!("{}", render_list("Underwriting Checklist", &items, format)?);
        }
        Commands::Analyze { texts } => analyze(&copilot, &texts, format).await?,
        Commands::Questions { text, items } => {
            let questions = copilot.broker_questions(&text, &items).await;
            print!("{}", render_list("Broker Questions", &questions, format)?);
        }
        Commands::Suggest {
            text,
            items,
            questions,
            answers,
        } => {
            let answers = BrokerAnswerSet::parse(questions, &answers)?;
            let result = copilot.dynamic_remediation(&text, &items, &answers).await;
            print!("{}", render_dynamic(&result, format)?);
        }
    }
    Ok(())
}

/// Config file first, then environment variables, then `--timeout`.
fn load_settings(config_path: Option<&Path>, timeout: Option<Duration>) -> Result<LlmSettings> {
    let base = match config_path {
        Some(path) => config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .and_then(|cfg| cfg.try_deserialize::<LlmSettings>())
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => LlmSettings::default(),
    };
    let vars: HashMap<String, String> = std::env::vars().collect();
    let mut settings = base.with_env_overrides(&vars)?;
    if let Some(timeout) = timeout {
        settings.timeout_secs = timeout.as_secs().max(1);
    }
    Ok(settings)
}

fn load_incidents(path: &Path) -> Result<Vec<Incident>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read incidents from {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    );
    let incidents: Vec<Incident> = if is_yaml {
        serde_yaml::from_str(&raw)
            .with_context(|| format!("invalid YAML incidents in {}", path.display()))?
    } else {
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid JSON incidents in {}", path.display()))?
    };
    for incident in &incidents {
        incident.validate()?;
    }
    Ok(incidents)
}

fn find_incident<'a>(incidents: &'a [Incident], id: &str) -> Result<&'a Incident> {
    match incidents.iter().find(|incident| incident.id == id) {
        Some(incident) => Ok(incident),
        None => bail!("no incident with id `{id}`"),
    }
}

fn parse_override(raw: &str) -> Result<RecommendedAction, String> {
    match RecommendedAction::classify(raw) {
        RecommendedAction::Other(_) => Err(format!(
            "`{raw}` is not one of: Accept risk, Request fix, Decline policy"
        )),
        action => Ok(action),
    }
}

#[derive(Serialize)]
struct ProviderStatus<'a> {
    provider: &'a str,
    model: Option<&'a str>,
    available: bool,
    reason: Option<String>,
}

fn list_providers(copilot: &Copilot, json: bool) -> Result<()> {
    let registry = copilot.registry();
    let mut rows: Vec<ProviderStatus<'_>> = registry
        .available_providers()
        .iter()
        .map(|handle| ProviderStatus {
            provider: handle.name.as_str(),
            model: Some(handle.model_id.as_str()),
            available: true,
            reason: None,
        })
        .collect();
    rows.extend(registry.skipped().iter().map(|attempt| ProviderStatus {
        provider: attempt.provider.as_str(),
        model: None,
        available: false,
        reason: Some(attempt.to_string()),
    }));

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    println!(
        "{} of {} provider(s) available",
        registry.available_providers().len(),
        rows.len()
    );
    for row in rows {
        match (row.model, row.reason) {
            (Some(model), _) => println!("- {:<8} available  model {model}", row.provider),
            (None, Some(reason)) => println!("- {:<8} unavailable :: {reason}", row.provider),
            (None, None) => println!("- {:<8} unavailable", row.provider),
        }
    }
    Ok(())
}

fn list_incidents(path: &Path, json: bool) -> Result<()> {
    let incidents = load_incidents(path)?;
    let total = total_risk(&incidents);
    if json {
        let payload = serde_json::json!({ "incidents": incidents, "total_risk": total });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }
    println!("{} incident(s) loaded from {}", incidents.len(), path.display());
    for incident in &incidents {
        let cost = incident
            .remediation_cost
            .map(|cost| format!(", cost {cost:.0}"))
            .unwrap_or_default();
        println!(
            "- {id:<10} {label} :: score {score:>3}{cost}",
            id = incident.id,
            label = incident.label(),
            score = incident.risk_contribution_score,
        );
    }
    println!("Total risk: {total}");
    Ok(())
}

async fn remediate(
    copilot: &Copilot,
    incidents_path: &Path,
    id: &str,
    override_action: Option<&RecommendedAction>,
    total_override: Option<i64>,
    format: OutputFormat,
) -> Result<()> {
    let incidents = load_incidents(incidents_path)?;
    let incident = find_incident(&incidents, id)?;
    let result = copilot.remediate(incident).await?;
    let final_rec = final_recommendation(&result.recommended_action, override_action);
    let total = total_override.unwrap_or_else(|| total_risk(&incidents));
    let assessment = RiskAssessment::compute(total, incident, &final_rec, result.confidence_score);
    let summary = broker_summary(&result.remediation_steps, incident);
    let report = RemediationReport {
        incident,
        result: &result,
        final_recommendation: &final_rec,
        assessment,
        broker_summary: &summary,
    };
    print!("{}", render_remediation(&report, format)?);
    Ok(())
}

async fn analyze(copilot: &Copilot, texts: &[String], format: OutputFormat) -> Result<()> {
    let mut tracker = AnalysisTracker::default();
    for text in texts {
        let (analysis, rerun) = tracker.refresh(copilot, text).await;
        if !rerun {
            warn!("text unchanged since the previous edit; analysis not re-run");
        }
        print!("{}", render_analysis(analysis, format)?);
    }
    info!(runs = tracker.runs(), edits = texts.len(), "analysis finished");
    Ok(())
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tokio=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
