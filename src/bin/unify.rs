//! Unify Command Line Interface
//!
//! Loads source dumps, rebuilds the unified view and queries it.
//!
//! # Usage
//!
//! ```bash
//! # Load JSON dumps of both extracts
//! unify load --crm crm.json --equipment equipment.json
//!
//! # Rebuild (skipped when nothing changed)
//! unify rebuild
//!
//! # Companies with equipment in Germany
//! unify query --country Germany
//!
//! # One company with its equipment
//! unify detail "Outokumpu Oyj"
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use company_unify::{
    llm, CompanyFilter, CrmRecord, EquipmentRecord, ReconcileConfig, ReconciliationService,
};

/// Default configuration path
const DEFAULT_CONFIG_PATH: &str = "config/unify.yaml";

#[derive(Parser)]
#[command(name = "unify")]
#[command(version = "0.1.0")]
#[command(about = "Reconcile CRM and installed-base extracts into a unified company view")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (YAML); missing file means defaults
    #[arg(long, short, global = true, env = "UNIFY_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Print the operational log to stderr after the command
    #[arg(long, global = true)]
    show_log: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace both source tables from JSON arrays of records
    Load {
        #[arg(long)]
        crm: PathBuf,
        #[arg(long)]
        equipment: PathBuf,
        /// Rebuild the unified view after loading
        #[arg(long)]
        rebuild: bool,
    },

    /// Rebuild the unified view
    Rebuild {
        /// Ignore the data fingerprint
        #[arg(long)]
        force: bool,
    },

    /// List unified companies
    Query {
        #[arg(long)]
        equipment_type: Option<String>,
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        company: Option<String>,
    },

    /// Show one company with its equipment
    Detail {
        name: String,
        #[arg(long)]
        equipment_type: Option<String>,
    },

    /// Fill missing coordinates and/or profiles through the configured LLM
    Enrich {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Also fill CEO and headcount
        #[arg(long)]
        profiles: bool,
    },

    /// Mapping similarity distribution
    Stats,

    /// Reference lists: regions, equipment types, equipment countries
    Lists,
}

// =============================================================================
// MAIN
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "company_unify=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli.config)?;
    let mut service = ReconciliationService::open(config).await?;
    if let Some(client) = llm::client_from_env()? {
        service = service.with_llm(client);
    }
    let service = Arc::new(service);

    let result = match cli.command {
        Commands::Load {
            crm,
            equipment,
            rebuild,
        } => cmd_load(&service, &crm, &equipment, rebuild).await,
        Commands::Rebuild { force } => cmd_rebuild(&service, force).await,
        Commands::Query {
            equipment_type,
            country,
            region,
            company,
        } => {
            let filter = CompanyFilter {
                equipment_type,
                country,
                region,
                company_name: company,
            };
            print_json(&*service.get_unified_companies(filter).await)
        }
        Commands::Detail {
            name,
            equipment_type,
        } => print_json(
            &service
                .get_company_detail(&name, equipment_type.as_deref())
                .await,
        ),
        Commands::Enrich { limit, profiles } => cmd_enrich(&service, limit, profiles).await,
        Commands::Stats => print_json(&service.match_quality_stats().await),
        Commands::Lists => cmd_lists(&service).await,
    };

    if cli.show_log {
        for line in service.logs() {
            eprintln!("{}", line);
        }
    }
    result
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

fn load_config(path: &Path) -> Result<ReconcileConfig> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "No configuration file, using defaults");
        return Ok(ReconcileConfig::default());
    }
    let path_str = path.to_string_lossy();
    tracing::info!(path = %path_str, "Loading configuration");
    Ok(ReconcileConfig::from_file(&path_str)?)
}

fn read_records<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

async fn cmd_load(
    service: &ReconciliationService,
    crm: &Path,
    equipment: &Path,
    rebuild: bool,
) -> Result<()> {
    let crm: Vec<CrmRecord> = read_records(crm)?;
    let equipment: Vec<EquipmentRecord> = read_records(equipment)?;
    service.load_sources(crm, equipment).await?;
    if rebuild {
        cmd_rebuild(service, false).await?;
    }
    Ok(())
}

async fn cmd_rebuild(service: &ReconciliationService, force: bool) -> Result<()> {
    let outcome = if force {
        service.force_rebuild().await?
    } else {
        service.rebuild_unified_view().await?
    };
    print_json(&serde_json::json!({
        "skipped": outcome.skipped,
        "new_mappings": outcome.new_mappings,
        "companies": outcome.companies,
    }))
}

async fn cmd_enrich(service: &Arc<ReconciliationService>, limit: usize, profiles: bool) -> Result<()> {
    let located = service
        .spawn_coordinate_enrichment(limit)
        .await
        .context("Geo-enrichment task failed")?;
    let profiled = if profiles {
        service.enrich_missing_profiles(limit).await
    } else {
        0
    };
    print_json(&serde_json::json!({
        "coordinates_updated": located,
        "profiles_updated": profiled,
    }))
}

async fn cmd_lists(service: &ReconciliationService) -> Result<()> {
    print_json(&serde_json::json!({
        "regions": service.region_options(),
        "equipment_types": service.equipment_types(),
        "equipment_countries": &*service.equipment_countries().await,
    }))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
