//src/main.rs

use std::sync::Arc;

use axum::{
    routing::{get, patch, post, put},
    Router,
};
use tokio::{net::TcpListener, sync::watch};
use tracing_subscriber::EnvFilter;

use backoffice::{
    config::{AppState, Settings},
    handlers,
    services::jobs::{JobDispatcher, LogInvoiceIssuer, LogNotifier},
};

fn router(app_state: AppState) -> Router {
    let product_routes = Router::new()
        .route("/{id}", get(handlers::inventory::get_product))
        .route(
            "/{id}/movements",
            post(handlers::inventory::create_movement).get(handlers::inventory::list_movements),
        )
        .route(
            "/{id}/conversions",
            post(handlers::inventory::create_conversion).get(handlers::inventory::list_conversions),
        )
        .route(
            "/{id}/pricing-policy",
            put(handlers::inventory::update_pricing_policy),
        )
        .route(
            "/{id}/recalculate-pricing",
            post(handlers::inventory::recalculate_pricing),
        );

    let conversion_routes = Router::new().route("/{id}", patch(handlers::inventory::update_conversion));

    let purchase_routes = Router::new()
        .route("/", post(handlers::purchases::create_purchase))
        .route(
            "/{id}",
            get(handlers::purchases::get_purchase).put(handlers::purchases::update_purchase),
        )
        .route("/{id}/complete", post(handlers::purchases::complete_purchase))
        .route("/{id}/void", post(handlers::purchases::void_purchase));

    let sale_routes = Router::new()
        .route("/", post(handlers::sales::create_sale))
        .route("/{id}", get(handlers::sales::get_sale))
        .route("/{id}/void", post(handlers::sales::void_sale));

    Router::new()
        .nest("/api/products", product_routes)
        .nest("/api/conversions", conversion_routes)
        .nest("/api/purchases", purchase_routes)
        .nest("/api/sales", sale_routes)
        .with_state(app_state)
}

async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Falha ao escutar o sinal de desligamento: {}", e);
    }
    tracing::info!("🛑 Desligando...");
    let _ = shutdown_tx.send(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Inicializa o logger; RUST_LOG sobrescreve o filtro padrão
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("backoffice=info,sqlx=warn")),
        )
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar.
    let settings = Settings::from_env()?;

    // Jobs pós-commit (aviso ao fornecedor, fatura)
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (jobs, jobs_worker) = JobDispatcher::spawn(
        Arc::new(LogNotifier),
        Arc::new(LogInvoiceIssuer),
        settings.job_retry,
        shutdown_rx,
    );

    let app_state = AppState::new(&settings, jobs).await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    let app = router(app_state);

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    // Espera o worker de jobs parar
    if let Err(e) = jobs_worker.await {
        tracing::error!("Worker de jobs terminou com erro: {}", e);
    }

    Ok(())
}
