//! # Provider Registry Entry Point
//!
//! `serve` runs the HTTP API, `migrate` applies the schema and `refresh`
//! imports new releases of one provider from the command line.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use provider_registry::{
    audit::{AuditSink, TracingAuditSink},
    config::ConfigLoader,
    db::{health_check, init_pool, run_migrations},
    extractor::refresh_provider,
    repositories::ProviderRepository,
    server::run_server,
    sources::ProviderSourceRegistry,
    telemetry::init_tracing,
};

/// Provider registry service
#[derive(Parser, Debug)]
#[command(name = "provider-registry")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the registry API
    Serve {
        /// Apply pending migrations before accepting requests
        #[arg(long)]
        migrate: bool,
    },

    /// Apply pending database migrations and exit
    Migrate,

    /// Import new releases of one provider
    Refresh {
        /// Namespace name
        namespace: String,
        /// Provider name
        provider: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration from layered env files and variables
    let config = ConfigLoader::new().load()?;
    init_tracing(&config)?;

    tracing::info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(configuration = %redacted_json, "Effective configuration");
    }

    let db = init_pool(&config).await?;
    health_check(&db).await?;

    match cli.command {
        Command::Migrate => run_migrations(&db).await,
        Command::Serve { migrate } => {
            if migrate {
                run_migrations(&db).await?;
            }
            let sources = ProviderSourceRegistry::from_config(&config)?;
            let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
            run_server(config, db, sources, audit).await
        }
        Command::Refresh {
            namespace,
            provider,
        } => {
            let sources = ProviderSourceRegistry::from_config(&config)?;
            let (_, found) = ProviderRepository::new(&db)
                .find_by_address(&namespace, &provider)
                .await?
                .ok_or_else(|| anyhow!("provider {namespace}/{provider} not found"))?;

            let report = refresh_provider(&db, &sources, &TracingAuditSink, found.id).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to render report")?
            );
            if report.failed() > 0 {
                return Err(anyhow!(
                    "{} of {} releases failed to import",
                    report.failed(),
                    report.discovered
                ));
            }
            Ok(())
        }
    }
}
