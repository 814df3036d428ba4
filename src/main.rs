use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::{info, warn};

use dashboard_unifier::config::Config;
use dashboard_unifier::constants::{self, DEFAULT_CONFIG_PATH};
use dashboard_unifier::domain::{AuthType, InteractiveState, Source, UnifiedDashboard};
use dashboard_unifier::infra::build_extractor;
use dashboard_unifier::observability;
use dashboard_unifier::pipeline::processing::{ComponentUnifier, DataCleaner};
use dashboard_unifier::types::{ConnectionParams, RawExtraction};
use dashboard_unifier::{ExtractionRequest, InteractiveStateMerger};

#[derive(Parser)]
#[command(name = "dashboard_unifier")]
#[command(about = "Extract Power BI and Tableau dashboards into one unified schema")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Print Prometheus metrics to stderr before exiting
    #[arg(long, global = true)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

/// How to reach a dashboard. Source and auth type are detected from the URL
/// when not given.
#[derive(Args, Clone)]
struct Target {
    #[arg(long)]
    source: Option<String>,
    #[arg(long)]
    auth: Option<String>,
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    report_id: Option<String>,
    #[arg(long)]
    workspace_id: Option<String>,
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    site_id: Option<String>,
    #[arg(long)]
    view_id: Option<String>,
    /// Access token for private dashboards; falls back to the vendor env var
    #[arg(long)]
    token: Option<String>,
    /// Skip OCR for KPI extraction on public dashboards
    #[arg(long)]
    no_ocr: bool,
    /// Run the data cleaner over the result
    #[arg(long)]
    clean: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a dashboard and print the unified snapshot
    Extract {
        #[command(flatten)]
        target: Target,
    },
    /// Unify and clean a saved adapter result without any network access
    Clean {
        /// JSON file holding a raw adapter result
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        source: String,
        #[arg(long, default_value = "public")]
        auth: String,
        /// Also print a per-table summary to stderr
        #[arg(long)]
        summary: bool,
    },
    /// Select a value on a filter and re-extract
    ApplyFilter {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        name: String,
        /// Selected value as JSON; bare words are taken as strings
        #[arg(long)]
        value: String,
    },
    /// Select a value on a slicer and re-extract
    ApplySlicer {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        name: String,
        #[arg(long)]
        value: String,
    },
    DrillDown {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        visual: String,
        #[arg(long)]
        level: String,
    },
    DrillUp {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        visual: String,
    },
    Highlight {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        component: String,
        #[arg(long)]
        point: String,
    },
    /// Clear one filter, or every selection when no name is given
    ClearFilter {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        name: Option<String>,
    },
    /// Re-extract with the snapshot's interactive state
    Refresh {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        snapshot: PathBuf,
    },
}

fn parse_json_arg(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn resolve(target: &Target) -> anyhow::Result<(Source, AuthType, ConnectionParams)> {
    let source = match (&target.source, &target.url) {
        (Some(s), _) => s.parse::<Source>()?,
        (None, Some(url)) => Source::detect_from_url(url)?,
        (None, None) => bail!("either --source or --url is required"),
    };
    let auth_type = match (&target.auth, &target.url) {
        (Some(a), _) => a.parse::<AuthType>()?,
        (None, Some(url)) => AuthType::infer_from_url(url),
        (None, None) => AuthType::Private,
    };
    Ok((source, auth_type, connection_params(target, source)))
}

fn connection_params(target: &Target, source: Source) -> ConnectionParams {
    let token_env = match source {
        Source::PowerBi => constants::POWERBI_TOKEN_ENV,
        Source::Tableau => constants::TABLEAU_TOKEN_ENV,
    };
    ConnectionParams {
        url: target.url.clone(),
        report_id: target.report_id.clone(),
        workspace_id: target.workspace_id.clone(),
        view_id: target.view_id.clone(),
        site_id: target.site_id.clone(),
        server_url: target.server_url.clone(),
        access_token: target.token.clone().or_else(|| std::env::var(token_env).ok()),
        use_ocr: !target.no_ocr,
    }
}

fn load_snapshot(path: &Path) -> anyhow::Result<UnifiedDashboard> {
    let content = fs::read_to_string(path).with_context(|| format!("reading snapshot {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing snapshot {}", path.display()))
}

fn print_dashboard(dashboard: &UnifiedDashboard) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(dashboard)?);
    if let Some(error) = &dashboard.error {
        warn!(kind = error.kind.as_str(), message = %error.message, "Dashboard returned with error");
    }
    Ok(())
}

async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    let dashboard = match cli.command {
        Commands::Extract { target } => {
            let (source, auth_type, params) = resolve(&target)?;
            let extractor = build_extractor(&config, target.clean)?;
            extractor
                .extract(&ExtractionRequest::new(source, auth_type, params))
                .await
        }
        Commands::Clean { input, source, auth, summary } => {
            let content = fs::read_to_string(&input).with_context(|| format!("reading {}", input.display()))?;
            let raw: RawExtraction = serde_json::from_str(&content)?;
            let dashboard = ComponentUnifier::new().unify(
                source.parse()?,
                auth.parse()?,
                raw,
                &InteractiveState::new(),
            );
            let cleaner = DataCleaner::new(&config.cleaning)?;
            let cleaned = cleaner.clean_dashboard(dashboard);
            if summary {
                for table in &cleaned.tables {
                    eprintln!("{}", serde_json::to_string_pretty(&cleaner.summarize(table))?);
                }
            }
            cleaned
        }
        Commands::ApplyFilter { target, snapshot, name, value } => {
            let (merger, snapshot, params) = prepare(&config, &target, &snapshot)?;
            merger.apply_filter(&snapshot, &params, &name, parse_json_arg(&value)).await
        }
        Commands::ApplySlicer { target, snapshot, name, value } => {
            let (merger, snapshot, params) = prepare(&config, &target, &snapshot)?;
            merger.apply_slicer(&snapshot, &params, &name, parse_json_arg(&value)).await
        }
        Commands::DrillDown { target, snapshot, visual, level } => {
            let (merger, snapshot, params) = prepare(&config, &target, &snapshot)?;
            merger.drill_down(&snapshot, &params, &visual, &level).await
        }
        Commands::DrillUp { target, snapshot, visual } => {
            let (merger, snapshot, params) = prepare(&config, &target, &snapshot)?;
            merger.drill_up(&snapshot, &params, &visual).await
        }
        Commands::Highlight { target, snapshot, component, point } => {
            let (merger, snapshot, params) = prepare(&config, &target, &snapshot)?;
            merger
                .highlight_data_point(&snapshot, &params, &component, parse_json_arg(&point))
                .await
        }
        Commands::ClearFilter { target, snapshot, name } => {
            let (merger, snapshot, params) = prepare(&config, &target, &snapshot)?;
            merger.clear_filter(&snapshot, &params, name.as_deref()).await
        }
        Commands::Refresh { target, snapshot } => {
            let (merger, snapshot, params) = prepare(&config, &target, &snapshot)?;
            merger.refresh(&snapshot, &params).await
        }
    };
    print_dashboard(&dashboard)
}

/// The snapshot carries source and auth type, so only connection params are
/// taken from the target for interactions.
fn prepare(
    config: &Config,
    target: &Target,
    snapshot_path: &Path,
) -> anyhow::Result<(InteractiveStateMerger, UnifiedDashboard, ConnectionParams)> {
    let snapshot = load_snapshot(snapshot_path)?;
    let params = connection_params(target, snapshot.source);
    let extractor = build_extractor(config, target.clean)?;
    Ok((InteractiveStateMerger::new(Arc::new(extractor)), snapshot, params))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    observability::init_logging();

    let cli = Cli::parse();
    let print_metrics = cli.print_metrics;
    if print_metrics {
        if let Err(e) = observability::init() {
            warn!("Metrics disabled: {}", e);
        }
    }

    let config = Config::load(&cli.config)?;
    info!(config = %cli.config.display(), "Loaded configuration");

    run(cli, config).await?;

    if print_metrics {
        if let Some(text) = observability::render() {
            eprintln!("{}", text);
        }
    }
    Ok(())
}
