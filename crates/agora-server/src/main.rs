use crate::opt::{Commands, CompleteTurn, Db, Run, SetRole};
use crate::relay::{DbEntitlementChecker, DbMessageStore};
use agora_config::AgentCatalog;
use agora_core::UpstreamClient;
use agora_core::llm_config::LlmConfig;
use agora_db::schema::setup_schema;
use agora_db::sea_orm::{ConnectOptions, Database, DatabaseConnection};
use agora_model_tools::convert::IntoDbModel;
use agora_relay::{RelayConfig, SessionManager};
use agora_utils::net::create_listener;
use agora_utils::tracing::TracingConfig;
use anyhow::Result;
use axum::serve;
use clap::Parser;
use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::sync::Arc;
use url::Url;

mod app;
mod auth;
mod opt;
mod relay;
mod routes;
mod user;

const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
const DEFAULT_PORT: u16 = 3030;

pub(crate) struct InnerAppConfig {
    catalog: Arc<AgentCatalog>,
    sessions: SessionManager,
}

#[derive(Clone)]
pub(crate) struct AppConfig(Arc<InnerAppConfig>);

impl AppConfig {
    pub(crate) fn new(catalog: Arc<AgentCatalog>, sessions: SessionManager) -> Self {
        Self(Arc::new(InnerAppConfig { catalog, sessions }))
    }

    pub fn catalog(&self) -> &AgentCatalog {
        &self.0.catalog
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.0.sessions
    }
}

async fn run(opt: Run) -> Result<()> {
    let _guard = agora_utils::tracing::setup(
        TracingConfig::builder()
            .package(env!("CARGO_PKG_NAME"))
            .version(env!("CARGO_PKG_VERSION"))
            .sentry_dsn(opt.sentry_dsn.clone())
            .env(opt.env.clone())
            .build(),
    )?;

    let catalog = Arc::new(load_catalog(opt.agents.as_deref()).await?);
    tracing::info!(agents = catalog.len(), "loaded agent catalog");

    let seaorm_pool = connect(&opt.db, opt.db_url.clone()).await?;

    let llm_config: LlmConfig = opt.llm_services.clone().into();
    for agent in catalog.iter() {
        if !llm_config.has_key(&agent.provider) {
            tracing::warn!(agent = %agent.id, provider = %agent.provider, "no api key configured for agent");
        }
    }
    let upstream = UpstreamClient::new(llm_config)?;

    let sessions = SessionManager::new(
        Arc::new(DbMessageStore::new(seaorm_pool.clone())),
        Arc::new(upstream),
        Arc::new(DbEntitlementChecker::new(seaorm_pool.clone())),
        Arc::clone(&catalog),
        RelayConfig::builder().history_limit(opt.history_limit).build(),
    );

    let Run {
        host, port, auth, ..
    } = opt;
    let app_config = AppConfig::new(catalog, sessions);
    let app = app::create_app(app_config, auth::AuthConfig::new(&auth.jwt_secret), &auth.origins, seaorm_pool)?;

    let listener = create_listener((host, port), (DEFAULT_HOST, DEFAULT_PORT)).await?;

    let service = app.into_make_service();
    tracing::info!(local_addr = %listener.local_addr()?, "starting app");
    serve::serve(listener, service).await?;
    Ok(())
}

async fn set_role(opt: SetRole) -> Result<()> {
    let _guard = agora_utils::tracing::setup(
        TracingConfig::builder()
            .package(env!("CARGO_PKG_NAME"))
            .version(env!("CARGO_PKG_VERSION"))
            .build(),
    )?;
    let seaorm_pool = connect(&Db::default(), opt.db_url).await?;
    let user = agora_db::user::Mutation::set_role(&seaorm_pool, opt.user_id, opt.role.into_db_model()).await?;
    tracing::info!(user_id = %user.id, role = ?user.role, "updated role");
    Ok(())
}

async fn complete_turn(opt: CompleteTurn) -> Result<()> {
    let _guard = agora_utils::tracing::setup(
        TracingConfig::builder()
            .package(env!("CARGO_PKG_NAME"))
            .version(env!("CARGO_PKG_VERSION"))
            .build(),
    )?;
    let seaorm_pool = connect(&Db::default(), opt.db_url).await?;
    let turn =
        agora_db::turn::Mutation::complete_partial(&seaorm_pool, opt.conversation_id, opt.turn_order, opt.content)
            .await
            .inspect_err(|error| {
                tracing::error!(error = error as &dyn std::error::Error, "failed to complete turn");
            })?;
    tracing::info!(conversation_id = %turn.conversation_id, turn_order = turn.turn_order, "completed turn");
    Ok(())
}

async fn load_catalog(path: Option<&Path>) -> Result<AgentCatalog> {
    let catalog = match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading agent catalog");
            AgentCatalog::load(path).await?
        }
        None => AgentCatalog::builtin()?,
    };
    Ok(catalog)
}

async fn connect(db_options: &Db, db_url: Url) -> Result<DatabaseConnection> {
    let seaorm_pool = Database::connect(build_connect_options(db_options, db_url)).await?;
    setup_schema(&seaorm_pool)
        .await
        .inspect_err(|error| tracing::error!(error = error as &dyn std::error::Error, "failed to set up schema"))?;
    Ok(seaorm_pool)
}

fn build_connect_options(db_options: &Db, db_url: Url) -> ConnectOptions {
    let mut seaorm_pool_options = ConnectOptions::new(db_url);
    if let Some(min_connections) = db_options.db_min_connections {
        seaorm_pool_options.min_connections(min_connections);
    }
    if let Some(max_connections) = db_options.db_max_connections {
        seaorm_pool_options.max_connections(max_connections);
    }
    seaorm_pool_options
}

fn main() -> Result<()> {
    let main = async {
        let opt = opt::Cli::parse();

        match opt.command {
            Commands::Run(o) => run(o).await?,
            Commands::SetRole(o) => set_role(o).await?,
            Commands::CompleteTurn(o) => complete_turn(o).await?,
        }
        Ok(())
    };

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(main)
}
