use std::path::Path;

use crate::dto::CreateTransaction;
use crate::Ledger;

use csv_async::{AsyncReaderBuilder, Error as CsvError, Trim};
use tokio::fs::File;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio_stream::StreamExt;

const BUFFER_SIZE: usize = 1024;

/// Outcome of an import run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub created: usize,
    pub rejected: usize,
}

/// An import that stopped early. Rows handed to the ledger before the
/// failure stay stored and are counted in `summary`.
#[derive(Debug, thiserror::Error)]
#[error(
    "import stopped after {} created, {} rejected rows",
    .summary.created,
    .summary.rejected
)]
pub struct ImportError {
    pub summary: ImportSummary,
    #[source]
    pub source: ImportFailure,
}

#[derive(Debug, thiserror::Error)]
pub enum ImportFailure {
    #[error("failed to read CSV input: {0}")]
    Csv(#[from] CsvError),

    #[error("import task failed: {0}")]
    Task(#[from] JoinError),
}

/// Creates a transaction for every row of the input file.
/// Spawns two tasks:
/// * CSV reader - streams rows from the input file, deserializes them and sends them to the processor via channel.
/// * Processor - receives rows from the channel and hands each to [`Ledger::create`] until the channel is closed.
///
/// Rows are created in file order, so on an otherwise idle ledger they get consecutive ids.
///
/// # Errors
/// Returns an [`ImportError`] if:
/// * The input file cannot be read
/// * The CSV is malformed
///
/// The error carries the summary of the rows processed before the failure.
/// Rows the ledger rejects are counted in [`ImportSummary::rejected`] and logged, not returned.
pub async fn import<P>(ledger: &Ledger, input_path: P) -> Result<ImportSummary, ImportError>
where
    P: AsRef<Path>,
{
    let (tx, rx) = mpsc::channel(BUFFER_SIZE);
    let input_path = input_path.as_ref().to_owned();

    let reader_handle = tokio::spawn(read_requests(input_path, tx));
    let processor_handle = tokio::spawn(create_transactions(ledger.clone(), rx));

    // The reader drops its sender on every exit path, so the processor
    // always drains the channel and finishes.
    let processed = processor_handle.await;
    let read = reader_handle.await;
    let summary = processed.as_ref().copied().unwrap_or_default();

    let failure = match (read, processed) {
        (Ok(Ok(())), Ok(_)) => None,
        (Ok(Err(e)), _) => Some(ImportFailure::from(e)),
        (Err(e), _) | (_, Err(e)) => Some(ImportFailure::from(e)),
    };
    if let Some(source) = failure {
        tracing::error!(
            created = summary.created,
            rejected = summary.rejected,
            error = %source,
            "import stopped"
        );
        return Err(ImportError { summary, source });
    }

    tracing::info!(
        created = summary.created,
        rejected = summary.rejected,
        "import finished"
    );
    Ok(summary)
}

async fn read_requests(
    input_path: impl AsRef<Path> + Send,
    tx: mpsc::Sender<CreateTransaction>,
) -> Result<(), CsvError> {
    let file = File::open(input_path).await?;
    let mut csv_reader = AsyncReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .create_deserializer(file);

    let mut records = csv_reader.deserialize::<CreateTransaction>();
    while let Some(result) = records.next().await {
        let request = result?;
        if tx.send(request).await.is_err() {
            // Receiver dropped, exit gracefully
            break;
        }
    }
    Ok(())
}

async fn create_transactions(
    ledger: Ledger,
    mut rx: mpsc::Receiver<CreateTransaction>,
) -> ImportSummary {
    let mut summary = ImportSummary::default();
    while let Some(request) = rx.recv().await {
        match ledger.create(request).await {
            Ok(_) => summary.created += 1,
            Err(e) => {
                summary.rejected += 1;
                tracing::warn!(error = %e, "skipping import row");
            }
        }
    }
    summary
}
