//! Tarefas pós-commit: novas tentativas, falha permanente, cancelamento e desligamento.

mod common;

use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use backoffice::{
    models::{parties::Supplier, purchases::PurchaseStatus},
    services::jobs::{
        InvoiceIssuer, JobDispatcher, JobKind, JobOutcome, LogInvoiceIssuer, LogNotifier, PurchaseSummary,
        RetryPolicy, SupplierNotifier,
    },
};
use common::dec;
use tokio::sync::watch;

/// Falha as primeiras `failures` chamadas.
struct FlakyNotifier {
    failures: u32,
    calls: AtomicU32,
}

impl FlakyNotifier {
    fn new(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures,
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SupplierNotifier for FlakyNotifier {
    async fn notify(&self, _supplier: &Supplier, _summary: &PurchaseSummary) -> anyhow::Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            anyhow::bail!("gateway indisponível (chamada {call})");
        }
        Ok(())
    }
}

struct FailingInvoicer;

#[async_trait]
impl InvoiceIssuer for FailingInvoicer {
    async fn issue_invoice(&self, sale_id: i64) -> anyhow::Result<()> {
        anyhow::bail!("sem resposta para a venda {sale_id}")
    }
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        backoff: Duration::from_millis(1),
    }
}

fn notify_job() -> JobKind {
    JobKind::NotifySupplier {
        supplier: Supplier {
            id: 7,
            name: "Distribuidora Central".to_string(),
            phone: Some("+51 999 000 111".to_string()),
            email: None,
            is_active: true,
        },
        summary: PurchaseSummary {
            purchase_id: 42,
            status: PurchaseStatus::Completed,
            total: dec("350.00"),
            line_count: 2,
        },
    }
}

#[tokio::test]
async fn notification_succeeds_after_transient_failures() {
    let notifier = FlakyNotifier::new(2);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let (jobs, _worker) = JobDispatcher::spawn(notifier.clone(), Arc::new(LogInvoiceIssuer), fast_retry(3), shutdown_rx);

    let outcome = jobs.dispatch(notify_job()).outcome().await;

    assert_eq!(outcome, JobOutcome::Succeeded { attempts: 3 });
    assert_eq!(notifier.calls(), 3);
}

#[tokio::test]
async fn job_gives_up_after_max_attempts() {
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let (jobs, _worker) = JobDispatcher::spawn(Arc::new(LogNotifier), Arc::new(FailingInvoicer), fast_retry(3), shutdown_rx);

    let outcome = jobs.dispatch(JobKind::IssueInvoice { sale_id: 9 }).outcome().await;

    assert_eq!(outcome, JobOutcome::Failed { attempts: 3 });
}

#[tokio::test]
async fn zero_attempts_still_runs_once() {
    let notifier = FlakyNotifier::new(0);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let (jobs, _worker) = JobDispatcher::spawn(notifier.clone(), Arc::new(LogInvoiceIssuer), fast_retry(0), shutdown_rx);

    let outcome = jobs.dispatch(notify_job()).outcome().await;

    assert_eq!(outcome, JobOutcome::Succeeded { attempts: 1 });
    assert_eq!(notifier.calls(), 1);
}

#[tokio::test]
async fn invoice_is_issued_once() {
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let (jobs, _worker) = JobDispatcher::spawn(Arc::new(LogNotifier), Arc::new(LogInvoiceIssuer), RetryPolicy::default(), shutdown_rx);

    let outcome = jobs.dispatch(JobKind::IssueInvoice { sale_id: 1 }).outcome().await;

    assert_eq!(outcome, JobOutcome::Succeeded { attempts: 1 });
}

#[tokio::test]
async fn cancelled_job_never_runs() {
    let notifier = FlakyNotifier::new(0);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let (jobs, _worker) = JobDispatcher::spawn(notifier.clone(), Arc::new(LogInvoiceIssuer), fast_retry(3), shutdown_rx);

    // O runtime de teste é single-thread: o worker só roda no próximo await.
    let handle = jobs.dispatch(notify_job());
    handle.cancel();

    assert_eq!(handle.outcome().await, JobOutcome::Cancelled);
    assert_eq!(notifier.calls(), 0);
}

#[tokio::test]
async fn cancel_stops_further_retries() {
    let notifier = FlakyNotifier::new(u32::MAX);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let policy = RetryPolicy {
        max_attempts: 10,
        backoff: Duration::from_millis(100),
    };
    let (jobs, _worker) = JobDispatcher::spawn(notifier.clone(), Arc::new(LogInvoiceIssuer), policy, shutdown_rx);

    let handle = jobs.dispatch(notify_job());
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.cancel();

    assert_eq!(handle.outcome().await, JobOutcome::Cancelled);
    assert_eq!(notifier.calls(), 1);
}

#[tokio::test]
async fn jobs_after_shutdown_are_dropped() {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (jobs, worker) = JobDispatcher::spawn(Arc::new(LogNotifier), Arc::new(LogInvoiceIssuer), fast_retry(3), shutdown_rx);

    shutdown_tx.send(true).unwrap();
    worker.await.unwrap();

    let handle = jobs.dispatch(JobKind::IssueInvoice { sale_id: 5 });
    assert_eq!(handle.outcome().await, JobOutcome::Dropped);
}
