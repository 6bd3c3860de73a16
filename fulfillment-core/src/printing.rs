//! Print job types and the spooler worker.
//!
//! The engine decides *that* and *what* to print; rendering and the physical
//! printer live behind [`PrintSink`]. Jobs are enqueued after the owning
//! transaction commits and drained by a worker task — a failing sink is
//! logged and the job dropped, never surfaced to the caller.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use shared::models::StationRef;

/// One printed line of a ticket or cancel slip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintLine {
    pub name: String,
    pub variant_name: Option<String>,
    pub quantity: i32,
    pub instructions: Option<String>,
}

/// Kitchen/bar ticket print, addressed to one station's printer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketPrint {
    pub station: StationRef,
    pub ticket_number: String,
    pub order_number: String,
    pub table_id: Option<String>,
    pub priority: bool,
    pub items: Vec<PrintLine>,
    pub reprint: bool,
    pub timestamp: i64,
}

/// Customer bill print.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillPrint {
    pub invoice_number: String,
    pub order_number: String,
    pub table_id: Option<String>,
    pub grand_total: f64,
    pub amount_in_words: String,
    pub timestamp: i64,
}

/// Cancel slip, addressed to the station that was preparing the items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelSlipPrint {
    pub station: StationRef,
    pub ticket_number: String,
    pub order_number: String,
    pub items: Vec<PrintLine>,
    pub reason: Option<String>,
    pub timestamp: i64,
}

/// A structured print job handed to the sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrintJob {
    Ticket(TicketPrint),
    Bill(BillPrint),
    CancelSlip(CancelSlipPrint),
}

impl PrintJob {
    /// Short description for log lines.
    pub fn describe(&self) -> String {
        match self {
            PrintJob::Ticket(t) => format!("ticket {} -> {}", t.ticket_number, t.station.id),
            PrintJob::Bill(b) => format!("bill {}", b.invoice_number),
            PrintJob::CancelSlip(c) => {
                format!("cancel slip {} -> {}", c.ticket_number, c.station.id)
            }
        }
    }
}

#[derive(Debug, Error)]
#[error("print sink error: {0}")]
pub struct PrintSinkError(pub String);

/// Printer bridge implemented by the collaborator that knows the hardware.
#[async_trait]
pub trait PrintSink: Send + Sync {
    async fn submit(&self, job: PrintJob) -> Result<(), PrintSinkError>;
}

/// Drains the print queue into a sink until the queue closes or shutdown is
/// requested. Sink failures are logged and the job dropped — the state
/// change that produced the job has already committed.
pub async fn run_print_worker(
    mut rx: mpsc::Receiver<PrintJob>,
    sink: Arc<dyn PrintSink>,
    shutdown: CancellationToken,
) {
    tracing::info!("print worker started");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("print worker received shutdown signal");
                break;
            }
            job = rx.recv() => {
                let Some(job) = job else {
                    tracing::info!("print queue closed, worker stopping");
                    break;
                };
                let label = job.describe();
                if let Err(e) = sink.submit(job).await {
                    tracing::warn!(job = %label, error = %e, "print job failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::StationKind;
    use std::sync::Mutex;

    struct RecordingSink {
        jobs: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PrintSink for RecordingSink {
        async fn submit(&self, job: PrintJob) -> Result<(), PrintSinkError> {
            self.jobs.lock().unwrap().push(job.describe());
            Ok(())
        }
    }

    #[tokio::test]
    async fn worker_drains_queue_into_sink() {
        let (tx, rx) = mpsc::channel(8);
        let sink = Arc::new(RecordingSink {
            jobs: Mutex::new(Vec::new()),
        });
        let shutdown = CancellationToken::new();

        tx.send(PrintJob::Ticket(TicketPrint {
            station: StationRef {
                id: "bar-1".to_string(),
                name: "Bar".to_string(),
                kind: StationKind::Bar,
            },
            ticket_number: "BOT20250807-001".to_string(),
            order_number: "ORD20250807-0001".to_string(),
            table_id: Some("t1".to_string()),
            priority: false,
            items: Vec::new(),
            reprint: false,
            timestamp: 0,
        }))
        .await
        .unwrap();
        drop(tx);

        run_print_worker(rx, sink.clone(), shutdown).await;

        let jobs = sink.jobs.lock().unwrap();
        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].contains("BOT20250807-001"));
    }
}
