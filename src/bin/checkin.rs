//! `checkin` - station and admin command line for fest check-in

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use fest_checkin::auth::{Credentials, IdentityProvider, LocalIdentityProvider, PasswordAccount};
use fest_checkin::config::Config;
use fest_checkin::domain::{format_local_timestamp, parse_roster};
use fest_checkin::metrics::MetricsRegistry;
use fest_checkin::portal::StudentPortal;
use fest_checkin::scan::{
    run_session, CameraConstraints, LineScanSource, PayloadIssuer, RedemptionGuard,
    ScanController, ScanSource,
};
use fest_checkin::search::AdminSearch;
use fest_checkin::telemetry::{init_telemetry, TelemetryConfig};
use fest_checkin::{AttendeeRecord, DocumentId, RecordStore, SqliteRecordStore};

/// Provider name the CLI uses to assert a student identity locally
const CLI_PROVIDER: &str = "cli";

#[derive(Parser, Debug)]
#[command(name = "checkin", version, about = "Event QR check-in and coupon redemption")]
struct Cli {
    /// Record store location
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load attendee records from a JSON array
    Seed {
        /// Path to the JSON file
        file: PathBuf,
    },
    /// Run a scanning session reading one decoded code per stdin line
    Scan {
        /// Staff account running this station
        #[arg(long, env = "CHECKIN_STAFF_EMAIL")]
        staff_email: String,

        #[arg(long, env = "CHECKIN_STAFF_PASSWORD", hide_env_values = true)]
        staff_password: String,

        /// Print session metrics when input ends
        #[arg(long, value_enum)]
        metrics: Option<MetricsFormat>,
    },
    /// Print a CHECKIN_STAFF_ACCOUNTS entry for a staff account
    HashPassword {
        email: String,

        #[arg(long, env = "CHECKIN_STAFF_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Search by name prefix or roll number prefix
    Search { term: String },
    /// List the most recently redeemed records
    Recent,
    /// Flip a record's redemption state
    Toggle { doc_id: String },
    /// Print the QR text for a record
    Issue {
        doc_id: String,
        /// Emit a plain code instead of an encrypted one
        #[arg(long)]
        plain: bool,
    },
    /// Show a student's own view of their record
    Status { email: String },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MetricsFormat {
    Json,
    Prometheus,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_telemetry(&TelemetryConfig::from_env())
        .map_err(|e| anyhow::anyhow!("failed to initialize telemetry: {e}"))?;

    if let Command::HashPassword { email, password } = &cli.command {
        let account = PasswordAccount::new(email, password, None);
        println!("{}={}", account.email, account.digest());
        return Ok(());
    }

    let mut config = Config::from_env()?;
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }

    let store = SqliteRecordStore::connect(&config.database_url)
        .await
        .with_context(|| format!("failed to open {}", config.database_url))?;
    store.initialize().await?;
    let store: Arc<dyn RecordStore> = Arc::new(store);

    match cli.command {
        Command::Seed { file } => seed(store.as_ref(), &file).await,
        Command::Scan {
            staff_email,
            staff_password,
            metrics,
        } => scan(&config, store, &staff_email, &staff_password, metrics).await,
        Command::HashPassword { .. } => Ok(()),
        Command::Search { term } => {
            let results = AdminSearch::new(store).search(&term).await?;
            if results.is_empty() {
                println!("No matches for {term:?}");
            }
            results.iter().for_each(print_record);
            Ok(())
        }
        Command::Recent => {
            AdminSearch::new(store)
                .recent()
                .await?
                .iter()
                .for_each(print_record);
            Ok(())
        }
        Command::Toggle { doc_id } => {
            let record = AdminSearch::new(store)
                .toggle(&DocumentId::new(doc_id))
                .await?;
            print_record(&record);
            Ok(())
        }
        Command::Issue { doc_id, plain } => issue(&config, store.as_ref(), doc_id, plain).await,
        Command::Status { email } => status(&config, store, email).await,
    }
}

async fn seed(store: &dyn RecordStore, file: &Path) -> Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let records = parse_roster(&raw).context("seed file must be a JSON array of records")?;

    let count = records.len();
    for record in records {
        store.put(record).await?;
    }
    info!(count, "records seeded");
    println!("Seeded {count} records");
    Ok(())
}

async fn scan(
    config: &Config,
    store: Arc<dyn RecordStore>,
    staff_email: &str,
    staff_password: &str,
    metrics_format: Option<MetricsFormat>,
) -> Result<()> {
    let staff = config
        .sign_in_staff(staff_email, staff_password)
        .await
        .context("staff sign-in failed; scanner not started")?;

    let metrics = Arc::new(MetricsRegistry::new());
    let controller = ScanController::builder(
        config.payload_codec()?,
        RedemptionGuard::new(store, config.redemption_policy),
    )
    .windows(config.windows)
    .identity(staff.clone())
    .metrics(metrics.clone())
    .build();

    info!(
        payload_mode = config.payload_mode.as_str(),
        redemption_policy = config.redemption_policy.as_str(),
        "scanner ready"
    );

    let mut source = LineScanSource::stdin();
    let events = source
        .start(CameraConstraints {
            poll_interval: config.scan_interval,
            ..Default::default()
        })
        .await?;
    controller.set_camera(true).await;

    run_session(&controller, events, |outcome| {
        println!("[{}] {}", outcome.kind(), outcome.message());
    })
    .await;

    controller.set_camera(false).await;
    source.stop().await;
    staff.sign_out().await;

    match metrics_format {
        Some(MetricsFormat::Json) => {
            println!("{}", serde_json::to_string_pretty(&metrics.to_json().await)?)
        }
        Some(MetricsFormat::Prometheus) => print!("{}", metrics.to_prometheus().await),
        None => {}
    }
    Ok(())
}

async fn issue(config: &Config, store: &dyn RecordStore, doc_id: String, plain: bool) -> Result<()> {
    let doc_id = DocumentId::new(doc_id);
    let Some(record) = store.get_by_id(&doc_id).await? else {
        bail!("no record with doc_id {doc_id}");
    };

    let text = if plain {
        PayloadIssuer::issue_plain(&record.roll_num)
    } else {
        config.payload_issuer()?.issue(&record.doc_id, &record.roll_num)?
    };
    println!("{text}");
    Ok(())
}

async fn status(config: &Config, store: Arc<dyn RecordStore>, email: String) -> Result<()> {
    let identity = Arc::new(LocalIdentityProvider::new().allow_federated(CLI_PROVIDER));
    let portal = StudentPortal::new(
        identity as Arc<dyn IdentityProvider>,
        store,
        config.student_email_domain.as_str(),
    );

    let view = portal
        .sign_in(Credentials::federated(CLI_PROVIDER, email))
        .await?;
    println!("{} ({})", view.record.name, view.record.roll_num);
    println!("Preference: {}", view.preference);
    if let Some(url) = &view.record.qr_image_url {
        println!("QR code: {url}");
    }
    println!("{}", view.status);

    portal.sign_out().await;
    Ok(())
}

fn print_record(record: &AttendeeRecord) {
    let redeemed = record
        .redeemed_at()
        .map(|at| format!("redeemed {}", format_local_timestamp(at)))
        .unwrap_or_else(|| "not redeemed".to_string());
    println!(
        "{:<22} {:<12} {:<28} {}",
        record.doc_id.as_str(),
        record.roll_num.as_str(),
        record.name,
        redeemed
    );
}
