// src/services/purchase_service.rs

use std::collections::BTreeSet;

use sqlx::{Acquire, PgConnection, Postgres};

use crate::{
    common::{
        db_utils::{apply_stock_changes, lock_catalog},
        error::AppError,
    },
    db::{InventoryRepository, PartyRepository, PurchaseRepository},
    engine::{
        conversion::Direction,
        documents::{
            base_totals, check_new_purchase_status, check_purchase_action, document_total, negate, net_deltas,
            plan_stock_changes, price_lines, product_ids, recorded_totals, DocumentLine, PriceFallback,
            PurchaseAction, RecordedLine,
        },
        ledger::NegativeStock,
    },
    models::{
        parties::Supplier,
        purchases::{Purchase, PurchaseStatus, PurchaseWithDetails},
    },
    services::{
        jobs::{JobDispatcher, JobKind, PurchaseSummary},
        pricing_service::PricingService,
    },
};

#[derive(Clone)]
pub struct PurchaseService {
    repo: PurchaseRepository,
    inventory_repo: InventoryRepository,
    party_repo: PartyRepository,
    pricing_service: PricingService,
    jobs: JobDispatcher,
}

impl PurchaseService {
    pub fn new(
        repo: PurchaseRepository,
        inventory_repo: InventoryRepository,
        party_repo: PartyRepository,
        pricing_service: PricingService,
        jobs: JobDispatcher,
    ) -> Self {
        Self {
            repo,
            inventory_repo,
            party_repo,
            pricing_service,
            jobs,
        }
    }

    async fn active_supplier(&self, conn: &mut PgConnection, supplier_id: i64) -> Result<Supplier, AppError> {
        self.party_repo
            .get_supplier(&mut *conn, supplier_id)
            .await?
            .filter(|s| s.is_active)
            .ok_or(AppError::EntityNotFound {
                entity: "Fornecedor",
                id: supplier_id,
            })
    }

    async fn locked_purchase(&self, conn: &mut PgConnection, purchase_id: i64) -> Result<Purchase, AppError> {
        self.repo
            .get_purchase_for_update(&mut *conn, purchase_id)
            .await?
            .ok_or(AppError::EntityNotFound {
                entity: "Compra",
                id: purchase_id,
            })
    }

    // --- CREATE PURCHASE ---
    /// O recebimento (entrada de estoque) acontece aqui, uma única vez, para pendentes e concluídas.
    pub async fn create_purchase<'e, E>(
        &self,
        executor: E,
        user_id: i64,
        supplier_id: i64,
        status: PurchaseStatus,
        notes: Option<&str>,
        lines: &[DocumentLine],
    ) -> Result<PurchaseWithDetails, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        check_new_purchase_status(status)?;

        let mut tx = executor.begin().await?;

        // 1. Validações (nenhuma escrita ainda)
        let supplier = self.active_supplier(&mut *tx, supplier_id).await?;

        let ids: Vec<i64> = product_ids(lines).into_iter().collect();
        let catalog = lock_catalog(&mut *tx, &self.inventory_repo, &ids).await?;

        let priced = price_lines(&catalog, lines, Direction::Purchase, PriceFallback::PurchasePrice)?;
        let totals = base_totals(&catalog, &priced)?;
        let changes = plan_stock_changes(&catalog, &totals, NegativeStock::Reject)?;
        let total = document_total(&priced)?;

        // 2. Cabeçalho + itens
        let header = self
            .repo
            .create_purchase(&mut *tx, supplier_id, user_id, status, total, notes)
            .await?;

        let mut details = Vec::with_capacity(priced.len());
        for line in &priced {
            details.push(self.repo.insert_detail(&mut *tx, header.id, line).await?);
        }

        // 3. Entrada de estoque
        apply_stock_changes(&mut *tx, &self.inventory_repo, &catalog, &changes).await?;

        // 4. Compra já concluída entra no custo médio
        if status == PurchaseStatus::Completed {
            let touched: BTreeSet<i64> = totals.keys().copied().collect();
            self.pricing_service
                .update_pricing_for(&mut *tx, &catalog, &touched)
                .await?;
        }

        tx.commit().await?;

        tracing::info!(
            purchase_id = header.id,
            supplier_id,
            status = header.status.as_str(),
            total = %header.total,
            lines = details.len(),
            "🛒 Compra registrada"
        );

        // 5. Aviso ao fornecedor: depois do commit, sem afetar o resultado
        let job = self.jobs.dispatch(JobKind::NotifySupplier {
            supplier,
            summary: PurchaseSummary {
                purchase_id: header.id,
                status: header.status,
                total: header.total,
                line_count: details.len(),
            },
        });
        tracing::debug!(job_id = %job.id(), purchase_id = header.id, "Aviso ao fornecedor enfileirado");

        Ok(PurchaseWithDetails { header, details })
    }

    // --- UPDATE PURCHASE (troca completa dos itens) ---
    pub async fn update_purchase<'e, E>(
        &self,
        executor: E,
        user_id: i64,
        purchase_id: i64,
        notes: Option<&str>,
        lines: &[DocumentLine],
    ) -> Result<PurchaseWithDetails, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let purchase = self.locked_purchase(&mut *tx, purchase_id).await?;
        check_purchase_action(purchase.id, purchase.status, PurchaseAction::Edit)?;

        let old_details = self.repo.list_details(&mut *tx, purchase_id).await?;

        // Bloqueia produtos antigos e novos juntos
        let mut ids = product_ids(lines);
        ids.extend(old_details.iter().map(|d| d.product_id));
        let ids: Vec<i64> = ids.into_iter().collect();
        let catalog = lock_catalog(&mut *tx, &self.inventory_repo, &ids).await?;

        let priced = price_lines(&catalog, lines, Direction::Purchase, PriceFallback::PurchasePrice)?;
        let new_totals = base_totals(&catalog, &priced)?;
        let old_totals = recorded_totals(&catalog, old_details.iter().map(RecordedLine::from))?;

        // Remove a contribuição antiga e soma a nova, em uma variação líquida por produto
        let deltas = net_deltas(&old_totals, &new_totals);
        let changes = plan_stock_changes(&catalog, &deltas, NegativeStock::Reject)?;
        let total = document_total(&priced)?;

        self.repo.delete_details(&mut *tx, purchase_id).await?;
        let mut details = Vec::with_capacity(priced.len());
        for line in &priced {
            details.push(self.repo.insert_detail(&mut *tx, purchase_id, line).await?);
        }
        let header = self
            .repo
            .update_total(&mut *tx, purchase_id, total, notes, user_id)
            .await?;

        apply_stock_changes(&mut *tx, &self.inventory_repo, &catalog, &changes).await?;

        let touched: BTreeSet<i64> = ids.into_iter().collect();
        self.pricing_service
            .update_pricing_for(&mut *tx, &catalog, &touched)
            .await?;

        tx.commit().await?;

        tracing::info!(
            purchase_id,
            user_id,
            total = %header.total,
            products_adjusted = changes.len(),
            "✏️ Itens da compra substituídos"
        );
        Ok(PurchaseWithDetails { header, details })
    }

    // --- COMPLETE PURCHASE (pending -> completed) ---
    /// Não mexe no estoque (já recebido na criação); só entra no custo médio.
    pub async fn complete_purchase<'e, E>(
        &self,
        executor: E,
        user_id: i64,
        purchase_id: i64,
    ) -> Result<PurchaseWithDetails, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let purchase = self.locked_purchase(&mut *tx, purchase_id).await?;
        check_purchase_action(purchase.id, purchase.status, PurchaseAction::Complete)?;

        let details = self.repo.list_details(&mut *tx, purchase_id).await?;
        let touched: BTreeSet<i64> = details.iter().map(|d| d.product_id).collect();
        let ids: Vec<i64> = touched.iter().copied().collect();
        let catalog = lock_catalog(&mut *tx, &self.inventory_repo, &ids).await?;

        let header = self
            .repo
            .set_status(&mut *tx, purchase_id, PurchaseStatus::Completed, user_id)
            .await?;

        self.pricing_service
            .update_pricing_for(&mut *tx, &catalog, &touched)
            .await?;

        tx.commit().await?;

        tracing::info!(purchase_id, user_id, "✅ Compra concluída");
        Ok(PurchaseWithDetails { header, details })
    }

    // --- VOID PURCHASE (* -> voided) ---
    /// A anulação sempre passa: o estoque pode ficar negativo, com aviso no log.
    pub async fn void_purchase<'e, E>(
        &self,
        executor: E,
        user_id: i64,
        purchase_id: i64,
    ) -> Result<PurchaseWithDetails, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let purchase = self.locked_purchase(&mut *tx, purchase_id).await?;
        check_purchase_action(purchase.id, purchase.status, PurchaseAction::Void)?;

        let details = self.repo.list_details(&mut *tx, purchase_id).await?;
        let touched: BTreeSet<i64> = details.iter().map(|d| d.product_id).collect();
        let ids: Vec<i64> = touched.iter().copied().collect();
        let catalog = lock_catalog(&mut *tx, &self.inventory_repo, &ids).await?;

        // Reverte a entrada feita na criação, pela quantidade base gravada
        let received = recorded_totals(&catalog, details.iter().map(RecordedLine::from))?;
        let changes = plan_stock_changes(&catalog, &negate(&received), NegativeStock::AllowWithWarning)?;
        apply_stock_changes(&mut *tx, &self.inventory_repo, &catalog, &changes).await?;

        let header = self
            .repo
            .set_status(&mut *tx, purchase_id, PurchaseStatus::Voided, user_id)
            .await?;

        // Os itens anulados saem do custo médio
        self.pricing_service
            .update_pricing_for(&mut *tx, &catalog, &touched)
            .await?;

        tx.commit().await?;

        tracing::info!(
            purchase_id,
            user_id,
            previous_status = purchase.status.as_str(),
            "🚫 Compra anulada"
        );
        Ok(PurchaseWithDetails { header, details })
    }

    pub async fn get_purchase(&self, purchase_id: i64) -> Result<PurchaseWithDetails, AppError> {
        let header = self
            .repo
            .find_purchase(purchase_id)
            .await?
            .ok_or(AppError::EntityNotFound {
                entity: "Compra",
                id: purchase_id,
            })?;
        let details = self.repo.find_details(purchase_id).await?;
        Ok(PurchaseWithDetails { header, details })
    }
}
