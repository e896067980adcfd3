//! End-to-end scheduler tests against a real (in-memory) app store.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tablewatch::{
    models::{
        ChannelReport, ConnectionCredentials, DestinationResult, DispatchReport, FieldValue,
        MonitoredTable, NotificationChannels, NotificationContext,
    },
    notification::Dispatcher,
    persistence::{ObserverRepository, SqliteObserverRepository},
    provider::{ProviderError, ScannedRow, TableScanner},
    scheduler::ObserverScheduler,
    secrets::CredentialCipher,
    test_helpers::ObserverBuilder,
};

/// A scanner that serves canned rows instead of talking to MySQL.
struct FakeScanner {
    rows: Vec<ScannedRow>,
}

#[async_trait]
impl TableScanner for FakeScanner {
    async fn scan(
        &self,
        _credentials: &ConnectionCredentials,
        _table_name: &str,
        _columns: &[String],
        limit: Option<u32>,
    ) -> Result<Vec<ScannedRow>, ProviderError> {
        let mut rows = self.rows.clone();
        if let Some(limit) = limit {
            rows.truncate(limit as usize);
        }
        Ok(rows)
    }

    async fn ping(&self, _credentials: &ConnectionCredentials) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Records every dispatched context and reports one delivered Telegram chat.
#[derive(Default)]
struct RecordingDispatcher {
    contexts: Mutex<Vec<NotificationContext>>,
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn dispatch(&self, context: &NotificationContext) -> DispatchReport {
        self.contexts.lock().unwrap().push(context.clone());
        DispatchReport {
            email: None,
            telegram: Some(ChannelReport {
                results: vec![DestinationResult::ok("1001")],
            }),
        }
    }
}

fn product_row(id: i64, quantity: f64) -> ScannedRow {
    ScannedRow::from_pairs(vec![
        ("id".into(), FieldValue::Number(id as f64)),
        ("quantity".into(), FieldValue::Number(quantity)),
    ])
}

fn telegram_channels() -> NotificationChannels {
    NotificationChannels {
        telegram_chat_ids: vec!["1001".into()],
        telegram_bot_token: Some("token".into()),
        ..Default::default()
    }
}

async fn setup_repo() -> Arc<SqliteObserverRepository> {
    let repo = SqliteObserverRepository::new("sqlite::memory:", CredentialCipher::new("test-key"))
        .await
        .expect("Failed to set up in-memory database");
    repo.run_migrations().await.expect("Failed to run migrations");
    Arc::new(repo)
}

async fn seed_observer(repo: &SqliteObserverRepository) -> i64 {
    let connection = repo
        .create_connection(
            tablewatch::models::StoredConnection {
                id: 0,
                name: "shop".into(),
                host: "db.example.com".into(),
                port: 3306,
                database_name: "shop".into(),
                username: "reader".into(),
                password_enc: String::new(),
            },
            "s3cret".into(),
        )
        .await
        .unwrap();
    let table = repo
        .create_monitored_table(MonitoredTable::new(connection.id, "Products", "products", "id"))
        .await
        .unwrap();
    repo.create_observer(
        ObserverBuilder::new()
            .monitored_table_id(table.id)
            .channels(telegram_channels())
            .templates("Stock alert {record_id}", "{field} is {current_value}")
            .build(),
    )
    .await
    .unwrap()
    .id
}

fn scheduler_with(
    repo: Arc<SqliteObserverRepository>,
    rows: Vec<ScannedRow>,
) -> (ObserverScheduler, Arc<RecordingDispatcher>) {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let scheduler = ObserverScheduler::new(
        repo,
        Arc::new(FakeScanner { rows }),
        dispatcher.clone(),
    );
    (scheduler, dispatcher)
}

#[tokio::test]
async fn sweep_logs_notifies_and_commits_bookkeeping() {
    let repo = setup_repo().await;
    let observer_id = seed_observer(&repo).await;

    let (scheduler, dispatcher) = scheduler_with(
        repo.clone(),
        vec![product_row(41, 3.0), product_row(42, 50.0)],
    );

    let now = Utc::now();
    let summary = scheduler.run_due_observers(now).await.unwrap();
    assert_eq!(summary.checked, 1);
    assert_eq!(summary.rows_matched, 1);
    assert_eq!(summary.notifications_sent, 1);

    // One log entry per row; only the matching one carries a delivery.
    let entries = repo.log_entries_for(observer_id).await.unwrap();
    assert_eq!(entries.len(), 2);
    let matched = entries.iter().find(|e| e.condition_met).unwrap();
    assert_eq!(matched.record_id, "41");
    assert_eq!(matched.current_value, Some(3.0));
    assert_eq!(
        matched.notification_sent_to,
        Some(vec!["telegram:1001".to_string()])
    );
    let unmatched = entries.iter().find(|e| !e.condition_met).unwrap();
    assert!(unmatched.notification_sent_to.is_none());

    // Templates were rendered from the matching row.
    let contexts = dispatcher.contexts.lock().unwrap();
    assert_eq!(contexts.len(), 1);
    assert_eq!(contexts[0].record_id, "41");
    assert_eq!(contexts[0].current_value, "3");

    // Bookkeeping committed.
    let observer = repo.get_observer_job(observer_id).await.unwrap().observer;
    assert_eq!(observer.last_checked_at, Some(now));
    assert_eq!(observer.last_triggered_at, Some(now));
    assert_eq!(observer.trigger_count, 1);
}

#[tokio::test]
async fn fresh_sweep_skips_observers_checked_recently() {
    let repo = setup_repo().await;
    seed_observer(&repo).await;

    let (scheduler, dispatcher) = scheduler_with(repo.clone(), vec![product_row(1, 3.0)]);

    let now = Utc::now();
    let first = scheduler.run_due_observers(now).await.unwrap();
    assert_eq!(first.checked, 1);

    // Immediately afterwards the observer is not due again.
    let second = scheduler.run_due_observers(now).await.unwrap();
    assert_eq!(second.checked, 0);
    assert_eq!(second.skipped, 1);
    assert_eq!(dispatcher.contexts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn empty_table_still_counts_as_a_completed_check() {
    let repo = setup_repo().await;
    let observer_id = seed_observer(&repo).await;

    let (scheduler, dispatcher) = scheduler_with(repo.clone(), vec![]);

    let now = Utc::now();
    let summary = scheduler.run_due_observers(now).await.unwrap();
    assert_eq!(summary.checked, 1);
    assert_eq!(summary.rows_matched, 0);
    assert!(dispatcher.contexts.lock().unwrap().is_empty());

    let observer = repo.get_observer_job(observer_id).await.unwrap().observer;
    assert_eq!(observer.last_checked_at, Some(now));
    assert_eq!(observer.last_triggered_at, None);
}

#[tokio::test]
async fn force_run_doubles_logs_without_moving_the_schedule() {
    let repo = setup_repo().await;
    let observer_id = seed_observer(&repo).await;

    let (scheduler, _dispatcher) = scheduler_with(repo.clone(), vec![product_row(1, 3.0)]);

    scheduler.run_observer(observer_id).await.unwrap();
    scheduler.run_observer(observer_id).await.unwrap();

    // Two forced runs append two log entries but never touch bookkeeping.
    let entries = repo.log_entries_for(observer_id).await.unwrap();
    assert_eq!(entries.len(), 2);

    let observer = repo.get_observer_job(observer_id).await.unwrap().observer;
    assert_eq!(observer.last_checked_at, None);
    assert_eq!(observer.last_triggered_at, None);
    assert_eq!(observer.trigger_count, 0);
}

#[tokio::test]
async fn sweep_with_no_observers_is_a_noop() {
    let repo = setup_repo().await;
    let (scheduler, dispatcher) = scheduler_with(repo, vec![product_row(1, 3.0)]);

    let summary = scheduler.run_due_observers(Utc::now()).await.unwrap();
    assert_eq!(summary.checked, 0);
    assert_eq!(summary.skipped, 0);
    assert!(dispatcher.contexts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_notification_reaches_the_dispatcher_with_placeholders() {
    let repo = setup_repo().await;
    let observer_id = seed_observer(&repo).await;

    let (scheduler, dispatcher) = scheduler_with(repo.clone(), vec![]);

    let report = scheduler.test_notification(observer_id).await.unwrap();
    assert!(report.any_success());

    let contexts = dispatcher.contexts.lock().unwrap();
    assert_eq!(contexts.len(), 1);
    assert_eq!(contexts[0].record_id, "test");
    assert_eq!(contexts[0].table_name, "Products");
}
