use anyhow::{bail, Context};
use audit_copilot::copilot::{AuditCopilot, CopilotConfig, DEFAULT_MAX_CONCURRENCY};
use audit_copilot::domain::{AnomalyDetectionInput, EvidenceInput, RiskScoringInput};
use audit_copilot::gateway::{
    GenerationOptions, HttpModelGateway, ProviderConfig, ProviderShape, DEFAULT_ENDPOINT,
    DEFAULT_TOKEN_ENV,
};
use clap::{Args, Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "audit-copilot", version, about = "Audit copilot CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[command(flatten)]
    provider: ProviderArgs,
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Args)]
struct ProviderArgs {
    #[arg(long, env = "AUDIT_COPILOT_ENDPOINT", default_value = DEFAULT_ENDPOINT, global = true)]
    endpoint: String,
    /// `text` for inputs/parameters bodies, `chat` for OpenAI-style messages.
    #[arg(long, env = "AUDIT_COPILOT_SHAPE", default_value = "text", global = true)]
    shape: String,
    #[arg(long, env = "AUDIT_COPILOT_MODEL", global = true)]
    model: Option<String>,
    /// Environment variable holding the bearer token.
    #[arg(long, default_value = DEFAULT_TOKEN_ENV, global = true)]
    token_env: String,
    #[arg(long, default_value_t = 0.2, global = true)]
    temperature: f32,
    #[arg(long, default_value_t = 600, global = true)]
    max_tokens: u32,
    #[arg(long, default_value_t = 3, global = true)]
    max_attempts: u32,
    #[arg(long, default_value_t = 120, global = true)]
    timeout_secs: u64,
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENCY, global = true)]
    max_concurrency: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Score the risk of one anomaly.
    Score {
        /// JSON file with anomalyDescription, riskParameters and confidenceInterval.
        #[arg(long, conflicts_with = "description")]
        input: Option<PathBuf>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, default_value = "")]
        parameters: String,
        #[arg(long, default_value = "")]
        confidence: String,
    },
    /// Explain a flagged issue and assemble its evidence pack.
    Explain {
        #[arg(long)]
        input: PathBuf,
    },
    /// Run anomaly detection over a ledger extract.
    Detect {
        #[arg(long)]
        input: PathBuf,
    },
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_copilot(args: &ProviderArgs) -> anyhow::Result<AuditCopilot<HttpModelGateway>> {
    let shape: ProviderShape = args.shape.parse()?;
    let options = GenerationOptions::default()
        .with_temperature(args.temperature)
        .with_max_tokens(args.max_tokens);
    let mut config = ProviderConfig::new(args.endpoint.clone(), shape)
        .with_token_env(args.token_env.clone())
        .with_options(options)
        .with_max_attempts(args.max_attempts)
        .with_timeout(Duration::from_secs(args.timeout_secs));
    if let Some(model) = &args.model {
        config = config.with_model(model.clone());
    }

    let gateway = HttpModelGateway::new(config)?;
    let settings = CopilotConfig::default().with_max_concurrency(args.max_concurrency);
    Ok(AuditCopilot::with_config(Arc::new(gateway), settings))
}

fn read_input<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    let copilot = build_copilot(&cli.provider)?;

    match cli.command {
        Commands::Score {
            input,
            description,
            parameters,
            confidence,
        } => {
            let request: RiskScoringInput = match (input, description) {
                (Some(path), _) => read_input(&path)?,
                (None, Some(anomaly_description)) => RiskScoringInput {
                    anomaly_description,
                    risk_parameters: parameters,
                    confidence_interval: confidence,
                },
                (None, None) => bail!("score needs either --input or --description"),
            };
            let assessment = copilot.score_risk(&request).await?;
            print_json(&assessment)?;
        }
        Commands::Explain { input } => {
            let request: EvidenceInput = read_input(&input)?;
            let report = copilot.explain_and_assemble_evidence(&request).await?;
            print_json(&report)?;
        }
        Commands::Detect { input } => {
            let request: AnomalyDetectionInput = read_input(&input)?;
            if request.is_empty() {
                info!(input = %input.display(), "no records to analyse");
            }
            let report = copilot.detect_anomalies(&request).await?;
            print_json(&report)?;
        }
    }

    Ok(())
}
