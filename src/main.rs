use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tablewatch::{
    config::AppConfig,
    http_client::HttpClientPool,
    models::{ConditionSpec, MonitoredTable, NotificationChannels, Observer, StoredConnection},
    notification::{MailSender, NotificationService, SmtpMailSender, TelegramNotifier},
    persistence::{ObserverRepository, SqliteObserverRepository},
    provider::{MySqlTableScanner, TableScanner},
    scheduler::ObserverScheduler,
    secrets::CredentialCipher,
    validator::ObserverValidator,
};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// How often the scheduled loop wakes up to look for due observers.
const SWEEP_TICK: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory containing app.yaml.
    #[arg(long)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the scheduling loop, checking for due observers every minute.
    Run,
    /// Runs a single sweep over due observers and exits.
    Sweep,
    /// Force-runs one observer against a handful of rows, without touching
    /// its schedule.
    TestObserver {
        /// Observer id.
        #[arg(long)]
        id: i64,
    },
    /// Sends a test notification through one observer's configured channels.
    TestNotification {
        /// Observer id.
        #[arg(long)]
        id: i64,
    },
    /// Verifies a registered connection can reach its datastore.
    TestConnection {
        /// Connection id.
        #[arg(long)]
        id: i64,
    },
    /// Registers an external MySQL connection.
    AddConnection(AddConnectionArgs),
    /// Lists registered connections.
    ListConnections,
    /// Deletes a connection and everything that depends on it.
    DeleteConnection {
        /// Connection id.
        #[arg(long)]
        id: i64,
    },
    /// Maps a table inside a registered connection.
    AddTable(AddTableArgs),
    /// Creates an observer on a monitored table.
    AddObserver(AddObserverArgs),
    /// Deletes an observer and its log entries.
    DeleteObserver {
        /// Observer id.
        #[arg(long)]
        id: i64,
    },
}

#[derive(Args)]
struct AddConnectionArgs {
    /// Display name.
    #[arg(long)]
    name: String,
    /// Hostname or IP.
    #[arg(long)]
    host: String,
    /// TCP port.
    #[arg(long, default_value_t = 3306)]
    port: u16,
    /// Database (schema) name.
    #[arg(long)]
    database: String,
    /// Username.
    #[arg(long)]
    username: String,
    /// Password (encrypted before it hits disk).
    #[arg(long)]
    password: String,
}

#[derive(Args)]
struct AddTableArgs {
    /// Owning connection id.
    #[arg(long)]
    connection_id: i64,
    /// Display name.
    #[arg(long)]
    name: String,
    /// Actual table name in the external datastore.
    #[arg(long)]
    table_name: String,
    /// Primary-key column.
    #[arg(long, default_value = "id")]
    primary_key: String,
}

#[derive(Args)]
struct AddObserverArgs {
    /// Owning monitored table id.
    #[arg(long)]
    table_id: i64,
    /// Display name.
    #[arg(long)]
    name: String,
    /// Column to watch.
    #[arg(long)]
    field: String,
    /// Condition type (less_than, greater_than, equals, not_equals,
    /// contains, starts_with, ends_with, date_near_expiry, date_expired,
    /// date_future, date_past).
    #[arg(long)]
    condition: String,
    /// Numeric operand for the numeric family.
    #[arg(long)]
    threshold: Option<f64>,
    /// String operand for the string family.
    #[arg(long)]
    value: Option<String>,
    /// Date granularity: date or datetime.
    #[arg(long)]
    date_field_type: Option<String>,
    /// Near-expiry window in days.
    #[arg(long)]
    days_before_alert: Option<u32>,
    /// Grace window after expiry in days (0 = unbounded).
    #[arg(long)]
    days_after_alert: Option<u32>,
    /// Whether expired dates alert at all.
    #[arg(long)]
    alert_on_expired: Option<bool>,
    /// Custom chrono date format.
    #[arg(long)]
    date_format: Option<String>,
    /// Minutes between checks.
    #[arg(long, default_value_t = 60)]
    interval: i64,
    /// Recipient email address (repeatable).
    #[arg(long = "email")]
    emails: Vec<String>,
    /// Telegram chat id (repeatable).
    #[arg(long = "telegram-chat-id")]
    telegram_chat_ids: Vec<String>,
    /// Telegram bot token.
    #[arg(long)]
    telegram_bot_token: Option<String>,
    /// Subject template.
    #[arg(long, default_value = "")]
    subject: String,
    /// Body template.
    #[arg(long, default_value = "")]
    message: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let cli = Cli::parse();

    tracing::debug!("Loading application configuration...");
    let config = AppConfig::new(cli.config_dir.as_deref())?;
    tracing::debug!(database_url = %config.database_url, "Configuration loaded.");

    let cipher = CredentialCipher::new(&config.encryption_key);
    let repository = Arc::new(SqliteObserverRepository::new(&config.database_url, cipher).await?);
    repository.run_migrations().await?;

    match cli.command {
        Commands::Run => {
            let scheduler = build_scheduler(&config, repository.clone())?;
            tracing::info!("Scheduler initialized, starting observation loop...");
            let mut tick = tokio::time::interval(SWEEP_TICK);
            loop {
                tick.tick().await;
                match scheduler.run_due_observers(Utc::now()).await {
                    Ok(summary) => tracing::debug!(?summary, "Sweep finished."),
                    Err(e) => tracing::error!(error = %e, "Sweep aborted."),
                }
            }
        }
        Commands::Sweep => {
            let scheduler = build_scheduler(&config, repository.clone())?;
            let summary = scheduler.run_due_observers(Utc::now()).await?;
            tracing::info!(?summary, "Sweep finished.");
        }
        Commands::TestObserver { id } => {
            let scheduler = build_scheduler(&config, repository.clone())?;
            let outcome = scheduler.run_observer(id).await?;
            tracing::info!(
                observer_id = id,
                rows_scanned = outcome.rows_scanned,
                rows_matched = outcome.rows_matched,
                notifications_sent = outcome.notifications_sent,
                "Forced run finished."
            );
        }
        Commands::TestNotification { id } => {
            let scheduler = build_scheduler(&config, repository.clone())?;
            let report = scheduler.test_notification(id).await?;
            if report.any_success() {
                tracing::info!(observer_id = id, sent_to = ?report.sent_to(), "Test notification delivered.");
            } else {
                tracing::error!(observer_id = id, ?report, "Test notification failed on every destination.");
            }
        }
        Commands::TestConnection { id } => {
            let credentials = repository.connection_credentials(id).await?;
            let scanner = MySqlTableScanner::new(
                config.scan_connect_timeout_secs,
                config.scan_max_connections,
            );
            scanner.ping(&credentials).await?;
            tracing::info!(connection_id = id, host = %credentials.host, "Connection is reachable.");
        }
        Commands::AddConnection(args) => {
            let created = repository
                .create_connection(
                    StoredConnection {
                        id: 0,
                        name: args.name,
                        host: args.host,
                        port: args.port,
                        database_name: args.database,
                        username: args.username,
                        password_enc: String::new(),
                    },
                    args.password,
                )
                .await?;
            tracing::info!(connection_id = created.id, name = %created.name, "Connection registered.");
        }
        Commands::ListConnections => {
            for connection in repository.list_connections().await? {
                println!(
                    "{}\t{}\t{}@{}:{}/{}",
                    connection.id,
                    connection.name,
                    connection.username,
                    connection.host,
                    connection.port,
                    connection.database_name
                );
            }
        }
        Commands::DeleteConnection { id } => {
            repository.delete_connection(id).await?;
            tracing::info!(connection_id = id, "Connection deleted (tables, observers and logs cascaded).");
        }
        Commands::AddTable(args) => {
            let created = repository
                .create_monitored_table(MonitoredTable::new(
                    args.connection_id,
                    args.name,
                    args.table_name,
                    args.primary_key,
                ))
                .await?;
            tracing::info!(table_id = created.id, table_name = %created.table_name, "Table mapped.");
        }
        Commands::AddObserver(args) => {
            let condition = ConditionSpec::from_columns(
                &args.condition,
                args.threshold,
                args.value,
                args.date_field_type,
                args.days_before_alert,
                args.days_after_alert,
                args.alert_on_expired,
                args.date_format,
            );
            let observer = Observer {
                id: 0,
                monitored_table_id: args.table_id,
                name: args.name,
                field_to_watch: args.field,
                condition,
                is_active: true,
                check_interval_minutes: args.interval,
                channels: NotificationChannels {
                    emails: args.emails,
                    telegram_chat_ids: args.telegram_chat_ids,
                    telegram_bot_token: args.telegram_bot_token,
                },
                notification_subject: args.subject,
                notification_message: args.message,
                last_checked_at: None,
                last_triggered_at: None,
                trigger_count: 0,
            };
            ObserverValidator::validate(&observer)?;
            let created = repository.create_observer(observer).await?;
            tracing::info!(observer_id = created.id, name = %created.name, "Observer created.");
        }
        Commands::DeleteObserver { id } => {
            repository.delete_observer(id).await?;
            tracing::info!(observer_id = id, "Observer deleted.");
        }
    }

    Ok(())
}

fn build_scheduler(
    config: &AppConfig,
    repository: Arc<SqliteObserverRepository>,
) -> Result<ObserverScheduler, Box<dyn std::error::Error>> {
    let mailer: Option<Arc<dyn MailSender>> = match &config.smtp {
        Some(smtp) => Some(Arc::new(SmtpMailSender::new(smtp)?)),
        None => {
            tracing::warn!("SMTP is not configured; the email channel is disabled.");
            None
        }
    };

    let telegram = TelegramNotifier::new(
        Arc::new(HttpClientPool::new(config.notification_timeout_secs)),
        config.http_retry_config.clone(),
        config.telegram_send_delay_ms,
    );
    let dispatcher = Arc::new(NotificationService::new(mailer, telegram));

    let scanner = Arc::new(MySqlTableScanner::new(
        config.scan_connect_timeout_secs,
        config.scan_max_connections,
    ));

    Ok(ObserverScheduler::new(
        repository as Arc<dyn ObserverRepository>,
        scanner,
        dispatcher,
    ))
}
