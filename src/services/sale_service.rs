// src/services/sale_service.rs

use sqlx::{Acquire, Postgres};

use crate::{
    common::{
        db_utils::{apply_stock_changes, lock_catalog},
        error::AppError,
    },
    db::{InventoryRepository, PartyRepository, SaleRepository},
    engine::{
        conversion::Direction,
        documents::{
            base_totals, check_sale_request, check_sale_void, document_total, negate, plan_stock_changes,
            price_lines, product_ids, recorded_totals, DocumentLine, PriceFallback, RecordedLine,
        },
        ledger::NegativeStock,
    },
    models::sales::{PaymentMethod, SaleWithDetails},
    services::jobs::{JobDispatcher, JobKind},
};

#[derive(Clone)]
pub struct SaleService {
    repo: SaleRepository,
    inventory_repo: InventoryRepository,
    party_repo: PartyRepository,
    jobs: JobDispatcher,
}

impl SaleService {
    pub fn new(
        repo: SaleRepository,
        inventory_repo: InventoryRepository,
        party_repo: PartyRepository,
        jobs: JobDispatcher,
    ) -> Self {
        Self {
            repo,
            inventory_repo,
            party_repo,
            jobs,
        }
    }

    // --- CREATE SALE ---
    pub async fn create_sale<'e, E>(
        &self,
        executor: E,
        user_id: i64,
        customer_id: Option<i64>,
        payment_method: PaymentMethod,
        issue_invoice: bool,
        lines: &[DocumentLine],
    ) -> Result<SaleWithDetails, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        check_sale_request(customer_id, issue_invoice, lines)?;

        let mut tx = executor.begin().await?;

        // 1. Cliente (opcional) precisa estar ativo
        if let Some(id) = customer_id {
            self.party_repo
                .get_customer(&mut *tx, id)
                .await?
                .filter(|c| c.is_active)
                .ok_or(AppError::EntityNotFound { entity: "Cliente", id })?;
        }

        // 2. Bloqueia os produtos e resolve cada item para unidade base
        let ids: Vec<i64> = product_ids(lines).into_iter().collect();
        let catalog = lock_catalog(&mut *tx, &self.inventory_repo, &ids).await?;

        let priced = price_lines(&catalog, lines, Direction::Sale, PriceFallback::SalePrice)?;

        // 3. Saldo validado contra a soma de todos os itens do mesmo produto
        let needed = base_totals(&catalog, &priced)?;
        let changes = plan_stock_changes(&catalog, &negate(&needed), NegativeStock::Reject)?;
        let total = document_total(&priced)?;

        // 4. Grava
        let header = self
            .repo
            .create_sale(&mut *tx, customer_id, user_id, total, payment_method, issue_invoice)
            .await?;

        let mut details = Vec::with_capacity(priced.len());
        for line in &priced {
            details.push(self.repo.insert_detail(&mut *tx, header.id, line).await?);
        }

        apply_stock_changes(&mut *tx, &self.inventory_repo, &catalog, &changes).await?;

        tx.commit().await?;

        tracing::info!(
            sale_id = header.id,
            total = %header.total,
            lines = details.len(),
            "💰 Venda registrada"
        );

        // 5. Fatura depois do commit; falha só aparece no log
        if issue_invoice {
            let job = self.jobs.dispatch(JobKind::IssueInvoice { sale_id: header.id });
            tracing::debug!(job_id = %job.id(), sale_id = header.id, "Emissão de fatura enfileirada");
        }

        Ok(SaleWithDetails { header, details })
    }

    // --- VOID SALE (active -> voided) ---
    /// Devolve ao estoque a quantidade base gravada em cada item, qualquer que seja a tabela atual.
    pub async fn void_sale<'e, E>(&self, executor: E, user_id: i64, sale_id: i64) -> Result<SaleWithDetails, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let sale = self
            .repo
            .get_sale_for_update(&mut *tx, sale_id)
            .await?
            .ok_or(AppError::EntityNotFound {
                entity: "Venda",
                id: sale_id,
            })?;

        check_sale_void(sale.id, sale.status)?;

        let details = self.repo.list_details(&mut *tx, sale_id).await?;
        let ids: Vec<i64> = details
            .iter()
            .map(|d| d.product_id)
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        let catalog = lock_catalog(&mut *tx, &self.inventory_repo, &ids).await?;

        let returned = recorded_totals(&catalog, details.iter().map(RecordedLine::from))?;
        let changes = plan_stock_changes(&catalog, &returned, NegativeStock::Reject)?;
        apply_stock_changes(&mut *tx, &self.inventory_repo, &catalog, &changes).await?;

        let header = self.repo.mark_voided(&mut *tx, sale_id, user_id).await?;

        tx.commit().await?;

        tracing::info!(sale_id, user_id, "🚫 Venda anulada");
        Ok(SaleWithDetails { header, details })
    }

    pub async fn get_sale(&self, sale_id: i64) -> Result<SaleWithDetails, AppError> {
        let header = self.repo.find_sale(sale_id).await?.ok_or(AppError::EntityNotFound {
            entity: "Venda",
            id: sale_id,
        })?;
        let details = self.repo.find_details(sale_id).await?;
        Ok(SaleWithDetails { header, details })
    }
}
