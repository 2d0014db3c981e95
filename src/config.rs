// src/config.rs

use std::{env, str::FromStr, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{InventoryRepository, PartyRepository, PurchaseRepository, SaleRepository},
    services::{
        inventory_service::InventoryService,
        jobs::{JobDispatcher, RetryPolicy},
        pricing_service::PricingService,
        purchase_service::PurchaseService,
        sale_service::SaleService,
    },
};

// Configuração lida do ambiente (.env em desenvolvimento)
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub bind_addr: String,
    pub job_retry: RetryPolicy,
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} inválida: '{raw}'")),
        None => Ok(default),
    }
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Mesmo que `from_env`, mas com a fonte de variáveis injetada.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL deve ser definida")?;

        let max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", 5u32)?;
        let acquire_timeout = Duration::from_secs(parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", 3u64)?);
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string());

        let job_retry = RetryPolicy {
            max_attempts: parse_or(&lookup, "JOB_MAX_ATTEMPTS", 3u32)?,
            backoff: Duration::from_millis(parse_or(&lookup, "JOB_RETRY_BACKOFF_MS", 500u64)?),
        };

        Ok(Self {
            database_url,
            max_connections,
            acquire_timeout,
            bind_addr,
            job_retry,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub inventory_service: InventoryService,
    pub pricing_service: PricingService,
    pub purchase_service: PurchaseService,
    pub sale_service: SaleService,
}

impl AppState {
    pub async fn new(settings: &Settings, jobs: JobDispatcher) -> anyhow::Result<Self> {
        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect(&settings.database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Ok(Self::from_pool(db_pool, jobs))
    }

    // --- Monta o gráfico de dependências ---
    pub fn from_pool(db_pool: PgPool, jobs: JobDispatcher) -> Self {
        let inventory_repo = InventoryRepository::new(db_pool.clone());
        let purchase_repo = PurchaseRepository::new(db_pool.clone());
        let sale_repo = SaleRepository::new(db_pool.clone());
        let party_repo = PartyRepository::new();

        let inventory_service = InventoryService::new(inventory_repo.clone());
        let pricing_service = PricingService::new(inventory_repo.clone(), purchase_repo.clone());
        let purchase_service = PurchaseService::new(
            purchase_repo,
            inventory_repo.clone(),
            party_repo.clone(),
            pricing_service.clone(),
            jobs.clone(),
        );
        let sale_service = SaleService::new(sale_repo, inventory_repo, party_repo, jobs);

        Self {
            db_pool,
            inventory_service,
            pricing_service,
            purchase_service,
            sale_service,
        }
    }
}
