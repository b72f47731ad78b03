use anyhow::{Context, Result};
use clap::Parser;
use dental_api::auth::{self, TokenKeys};
use dental_api::{app, build_info, AppState, Cli};
use dental_db::Database;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dental_api=info,dental_db=info,tower_http=info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    info!(
        version = build_info::PKG_VERSION,
        profile = build_info::PROFILE,
        "Iniciando dental-api"
    );

    let db = Database::open(&cli.db_config())
        .await
        .context("Falha ao abrir o banco de dados")?;

    if let (Some(email), Some(password)) = (&cli.admin_email, &cli.admin_password) {
        auth::bootstrap_admin(&db, email, password)
            .await
            .context("Falha ao criar o administrador inicial")?;
    }

    let state = AppState::new(db, TokenKeys::new(&cli.jwt_secret, cli.token_ttl_minutes));
    let router = app(state, &cli.http_config())?;

    info!(bind = %cli.bind, "Servidor HTTP escutando");
    axum::Server::bind(&cli.bind)
        .serve(router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Falha no servidor HTTP")?;

    info!("Servidor encerrado");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Falha ao aguardar sinal de encerramento");
    }
}
