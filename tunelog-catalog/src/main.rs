//! tunelog-catalog service binary

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tunelog_catalog::services::catalog_client::CatalogClient;
use tunelog_catalog::services::knowledge_graph::KnowledgeGraphClient;
use tunelog_catalog::{build_router, AppState};
use tunelog_common::api::auth::load_shared_secret;
use tunelog_common::config::{self, TomlConfig};

#[derive(Debug, Parser)]
#[command(name = "tunelog-catalog", version, about = "Tunelog catalog cache service")]
struct Cli {
    /// Root folder holding the database (overrides env and config file)
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Listen port
    #[arg(long, default_value_t = 5730)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting Tunelog catalog service (tunelog-catalog) v{}",
        env!("CARGO_PKG_VERSION")
    );

    let cli = Cli::parse();
    let toml_config = TomlConfig::load();

    let root_folder = config::resolve_root_folder(cli.root_folder.as_ref(), &toml_config);
    config::ensure_root_folder(&root_folder)?;

    let db_path = config::database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = match tunelog_common::db::connect(&db_path).await {
        Ok(pool) => {
            info!("✓ Connected to database");
            pool
        }
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            return Err(e.into());
        }
    };

    tunelog_catalog::db::schema::initialize_schema(&pool).await?;

    let shared_secret = match load_shared_secret(&pool).await {
        Ok(secret) => {
            if secret == 0 {
                info!("Administrative API authentication disabled (shared_secret = 0)");
            } else {
                info!("✓ Loaded shared secret for administrative API authentication");
            }
            secret
        }
        Err(e) => {
            error!("Failed to load shared secret: {}", e);
            return Err(e.into());
        }
    };

    let user_agent = config::user_agent(toml_config.contact.as_deref());
    let catalog = CatalogClient::new(
        user_agent.clone(),
        toml_config.catalog_base_url(),
        CatalogClient::DEFAULT_MIN_INTERVAL,
    )?;
    let graph = KnowledgeGraphClient::new(user_agent, toml_config.knowledge_graph_url())?;

    let state = AppState::new(pool, shared_secret, catalog, graph);
    let app = build_router(state);

    let addr = format!("127.0.0.1:{}", cli.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("tunelog-catalog listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
