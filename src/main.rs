use clap::Parser;
use miette::{IntoDiagnostic, Result};
use payment_gateway::application::config::ServiceConfig;
use payment_gateway::application::service::AuthorizationService;
use payment_gateway::domain::authorization::{AuthorizationId, CurrencyCode};
use payment_gateway::domain::ports::AuthorizationStoreRef;
use payment_gateway::error::{ErrorKind, GatewayError};
use payment_gateway::infrastructure::in_memory::InMemoryAuthorizationStore;
use payment_gateway::infrastructure::processor::SimulatedProcessor;
use payment_gateway::infrastructure::reconciliation::TracingReconciliationLog;
use payment_gateway::interfaces::csv::authorization_writer::{AuthorizationWriter, ListingRow};
use payment_gateway::interfaces::csv::operation_reader::{Command, OperationReader};
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input operations CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Currency accepted at authorize time. Repeat for several.
    #[arg(long = "currency", default_values = ["EUR", "GBP", "USD"])]
    currencies: Vec<String>,

    /// Card number the simulated processor declines. Repeat for several.
    #[arg(long = "decline-card")]
    decline_cards: Vec<u64>,

    #[arg(long, default_value_t = 5000)]
    processor_timeout_ms: u64,

    #[arg(long, default_value_t = 5000)]
    storage_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let currencies = cli
        .currencies
        .iter()
        .map(|code| CurrencyCode::parse(code))
        .collect::<Result<Vec<_>, _>>()
        .into_diagnostic()?;
    let store = open_store(cli.db_path, &currencies).await?;

    let processor = SimulatedProcessor::new();
    for number in cli.decline_cards {
        processor.decline_card(number);
    }

    let config = ServiceConfig::default()
        .with_processor_timeout(Duration::from_millis(cli.processor_timeout_ms))
        .with_storage_timeout(Duration::from_millis(cli.storage_timeout_ms));
    let service = AuthorizationService::new(
        store,
        Arc::new(processor),
        Arc::new(TracingReconciliationLog::default()),
        config,
    );
    service.health_check().await.into_diagnostic()?;

    // Process operations
    let file = File::open(cli.input).into_diagnostic()?;
    let mut references = HashMap::new();
    for (index, record) in OperationReader::new(file).records().enumerate() {
        let row = index + 2;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!(row, error = %e, "skipping malformed row");
                continue;
            }
        };
        let command = match Command::try_from(record) {
            Ok(command) => command,
            Err(e) => {
                warn!(row, error = %e, "skipping invalid row");
                continue;
            }
        };
        let reference = command.reference().to_string();
        if let Err(e) = execute(&service, &mut references, command).await {
            if e.is_caller_error() || e.kind() == ErrorKind::ProcessorDeclined {
                warn!(row, reference = %reference, kind = ?e.kind(), error = %e, "operation rejected");
            } else {
                error!(row, reference = %reference, kind = ?e.kind(), error = %e, "operation failed");
            }
        }
    }

    // Output final state
    let labels: HashMap<AuthorizationId, String> = references
        .into_iter()
        .map(|(reference, id)| (id, reference))
        .collect();
    let mut rows = Vec::new();
    for summary in service.list_all().await.into_diagnostic()? {
        let authorization = service.get_details(&summary.id).await.into_diagnostic()?;
        let reference = labels.get(&summary.id).map(String::as_str);
        rows.push(ListingRow::new(&authorization, reference).into_diagnostic()?);
    }

    let stdout = io::stdout();
    let mut writer = AuthorizationWriter::new(stdout.lock());
    writer.write_rows(rows).into_diagnostic()?;

    Ok(())
}

async fn execute(
    service: &AuthorizationService,
    references: &mut HashMap<String, AuthorizationId>,
    command: Command,
) -> Result<(), GatewayError> {
    match command {
        Command::Authorize {
            merchant,
            reference,
            currency,
            amount,
            card,
        } => {
            if references.contains_key(&reference) {
                return Err(GatewayError::Validation(format!(
                    "reference {reference} already used"
                )));
            }
            let id = service.authorize(&merchant, &currency, amount, card).await?;
            info!(reference = %reference, authorization = %id, "authorized");
            references.insert(reference, id);
        }
        Command::Capture {
            merchant,
            reference,
            amount,
        } => {
            let id = lookup(references, &reference)?;
            service.capture(&merchant, &id, amount).await?;
        }
        Command::Refund {
            merchant,
            reference,
            amount,
        } => {
            let id = lookup(references, &reference)?;
            service.refund(&merchant, &id, amount).await?;
        }
        Command::Void {
            merchant,
            reference,
        } => {
            let id = lookup(references, &reference)?;
            service.void(&merchant, &id).await?;
        }
    }
    Ok(())
}

fn lookup(
    references: &HashMap<String, AuthorizationId>,
    reference: &str,
) -> Result<AuthorizationId, GatewayError> {
    references
        .get(reference)
        .cloned()
        .ok_or_else(|| GatewayError::Validation(format!("unknown reference {reference}")))
}

#[cfg(feature = "storage-rocksdb")]
async fn open_store(
    db_path: Option<PathBuf>,
    currencies: &[CurrencyCode],
) -> Result<AuthorizationStoreRef> {
    use payment_gateway::infrastructure::rocksdb::RocksDBStore;

    if let Some(path) = db_path {
        let store = RocksDBStore::open(&path).into_diagnostic()?;
        for code in currencies {
            store.register_currency(code).into_diagnostic()?;
        }
        info!(path = %path.display(), "using RocksDB storage");
        return Ok(Arc::new(store));
    }
    Ok(in_memory(currencies))
}

#[cfg(not(feature = "storage-rocksdb"))]
async fn open_store(
    db_path: Option<PathBuf>,
    currencies: &[CurrencyCode],
) -> Result<AuthorizationStoreRef> {
    if let Some(path) = db_path {
        warn!(
            path = %path.display(),
            "built without the storage-rocksdb feature, falling back to in-memory storage"
        );
    }
    Ok(in_memory(currencies))
}

fn in_memory(currencies: &[CurrencyCode]) -> AuthorizationStoreRef {
    Arc::new(InMemoryAuthorizationStore::with_currencies(
        currencies.iter().cloned(),
    ))
}
