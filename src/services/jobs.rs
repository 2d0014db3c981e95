// src/services/jobs.rs
//
// Efeitos colaterais pós-commit (aviso ao fornecedor, emissão de fatura).
// Rodam fora da transação, com novas tentativas, e nunca desfazem o documento.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use uuid::Uuid;

use crate::models::{parties::Supplier, purchases::PurchaseStatus};

// ---
// Colaboradores externos
// ---

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseSummary {
    pub purchase_id: i64,
    pub status: PurchaseStatus,
    pub total: Decimal,
    pub line_count: usize,
}

#[async_trait]
pub trait SupplierNotifier: Send + Sync {
    async fn notify(&self, supplier: &Supplier, summary: &PurchaseSummary) -> anyhow::Result<()>;
}

#[async_trait]
pub trait InvoiceIssuer: Send + Sync {
    async fn issue_invoice(&self, sale_id: i64) -> anyhow::Result<()>;
}

/// Implementação padrão: só registra no log. A integração real (WhatsApp/SMS) fica fora daqui.
pub struct LogNotifier;

#[async_trait]
impl SupplierNotifier for LogNotifier {
    async fn notify(&self, supplier: &Supplier, summary: &PurchaseSummary) -> anyhow::Result<()> {
        tracing::info!(
            supplier_id = supplier.id,
            purchase_id = summary.purchase_id,
            total = %summary.total,
            "📨 Aviso de compra para o fornecedor {}",
            supplier.name
        );
        Ok(())
    }
}

pub struct LogInvoiceIssuer;

#[async_trait]
impl InvoiceIssuer for LogInvoiceIssuer {
    async fn issue_invoice(&self, sale_id: i64) -> anyhow::Result<()> {
        tracing::info!(sale_id, "🧾 Fatura solicitada para a venda");
        Ok(())
    }
}

// ---
// Jobs
// ---

#[derive(Debug, Clone)]
pub enum JobKind {
    NotifySupplier {
        supplier: Supplier,
        summary: PurchaseSummary,
    },
    IssueInvoice {
        sale_id: i64,
    },
}

impl JobKind {
    fn name(&self) -> &'static str {
        match self {
            JobKind::NotifySupplier { .. } => "notify_supplier",
            JobKind::IssueInvoice { .. } => "issue_invoice",
        }
    }

    // Id do documento de origem, para reconciliação manual pelos logs.
    fn document_id(&self) -> i64 {
        match self {
            JobKind::NotifySupplier { summary, .. } => summary.purchase_id,
            JobKind::IssueInvoice { sale_id } => *sale_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded { attempts: u32 },
    Failed { attempts: u32 },
    Cancelled,
    // O worker já foi encerrado; o job nunca rodou.
    Dropped,
}

struct Job {
    id: Uuid,
    kind: JobKind,
    cancelled: Arc<AtomicBool>,
    done: oneshot::Sender<JobOutcome>,
}

/// Devolvido a quem despacha. Descartar o handle não cancela o job.
pub struct JobHandle {
    id: Uuid,
    cancelled: Arc<AtomicBool>,
    done: oneshot::Receiver<JobOutcome>,
}

impl JobHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Impede novas tentativas. Uma tentativa já em andamento termina normalmente.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub async fn outcome(self) -> JobOutcome {
        self.done.await.unwrap_or(JobOutcome::Dropped)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Clone)]
struct Collaborators {
    notifier: Arc<dyn SupplierNotifier>,
    invoicer: Arc<dyn InvoiceIssuer>,
}

#[derive(Clone)]
pub struct JobDispatcher {
    sender: mpsc::UnboundedSender<Job>,
}

impl JobDispatcher {
    /// Sobe o worker. Ele para quando `shutdown` recebe `true` ou quando todos os dispatchers somem.
    pub fn spawn(
        notifier: Arc<dyn SupplierNotifier>,
        invoicer: Arc<dyn InvoiceIssuer>,
        policy: RetryPolicy,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let collaborators = Collaborators { notifier, invoicer };
        let worker = tokio::spawn(run_worker(receiver, collaborators, policy, shutdown));
        (Self { sender }, worker)
    }

    /// Enfileira sem bloquear e sem falhar. Se o worker já parou, só loga.
    pub fn dispatch(&self, kind: JobKind) -> JobHandle {
        let id = Uuid::new_v4();
        let cancelled = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = oneshot::channel();

        let job = Job {
            id,
            kind,
            cancelled: cancelled.clone(),
            done: done_tx,
        };

        if let Err(mpsc::error::SendError(job)) = self.sender.send(job) {
            tracing::error!(
                job_id = %job.id,
                job = job.kind.name(),
                document_id = job.kind.document_id(),
                "🔥 Fila de jobs encerrada; efeito colateral descartado"
            );
            let _ = job.done.send(JobOutcome::Dropped);
        }

        JobHandle {
            id,
            cancelled,
            done: done_rx,
        }
    }
}

async fn run_worker(
    mut receiver: mpsc::UnboundedReceiver<Job>,
    collaborators: Collaborators,
    policy: RetryPolicy,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            job = receiver.recv() => match job {
                // Cada job em sua própria task: um aviso lento não segura a fatura.
                Some(job) => {
                    tokio::spawn(run_job(job, collaborators.clone(), policy));
                }
                None => break,
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    tracing::info!("Worker de jobs encerrado");
}

async fn run_job(job: Job, collaborators: Collaborators, policy: RetryPolicy) {
    let Job {
        id,
        kind,
        cancelled,
        done,
    } = job;
    let max_attempts = policy.max_attempts.max(1);

    let mut attempts = 0;
    let outcome = loop {
        if cancelled.load(Ordering::SeqCst) {
            tracing::info!(job_id = %id, job = kind.name(), document_id = kind.document_id(), "Job cancelado");
            break JobOutcome::Cancelled;
        }

        attempts += 1;
        let result = match &kind {
            JobKind::NotifySupplier { supplier, summary } => {
                collaborators.notifier.notify(supplier, summary).await
            }
            JobKind::IssueInvoice { sale_id } => collaborators.invoicer.issue_invoice(*sale_id).await,
        };

        match result {
            Ok(()) => break JobOutcome::Succeeded { attempts },
            Err(e) if attempts < max_attempts => {
                tracing::warn!(
                    job_id = %id,
                    job = kind.name(),
                    document_id = kind.document_id(),
                    attempt = attempts,
                    "Falha no job, tentando novamente: {:#}",
                    e
                );
                tokio::time::sleep(policy.backoff * attempts).await;
            }
            Err(e) => {
                tracing::error!(
                    job_id = %id,
                    job = kind.name(),
                    document_id = kind.document_id(),
                    attempts,
                    "🔥 Job falhou definitivamente: {:#}",
                    e
                );
                break JobOutcome::Failed { attempts };
            }
        }
    };

    let _ = done.send(outcome);
}
