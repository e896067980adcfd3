//! The observer scheduler: decides which observers are due, runs their
//! checks and commits bookkeeping.
//!
//! A sweep is sequential over observers and rows. Each observer is its own
//! failure boundary: a dead external datastore fails that observer's check,
//! gets logged, and the sweep moves on. Bookkeeping is committed once per
//! observer after all its rows are processed, so a crash mid-observer means
//! that observer runs again next sweep (at-least-once).

pub mod error;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::{FieldValue, NotificationContext, ObserverJob, ObserverLogEntry};
use crate::notification::Dispatcher;
use crate::persistence::ObserverRepository;
use crate::provider::TableScanner;

pub use error::SchedulerError;

/// Row cap for the force-test path, so "run now" on a large table stays
/// cheap.
const FORCE_RUN_ROW_LIMIT: u32 = 10;

/// Counters for one scheduled sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    /// Observers that were due and ran to completion.
    pub checked: usize,
    /// Observers that were not yet due.
    pub skipped: usize,
    /// Observers whose check aborted with an error.
    pub failed: usize,
    /// Rows that met their condition, across all checked observers.
    pub rows_matched: usize,
    /// Matches for which at least one destination was delivered.
    pub notifications_sent: usize,
}

/// Outcome of one observer's check.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CheckOutcome {
    /// Rows fetched from the external table.
    pub rows_scanned: usize,
    /// Rows that met the condition.
    pub rows_matched: usize,
    /// Matches with at least one successful delivery.
    pub notifications_sent: usize,
}

/// Runs observers against their external tables and records the results.
pub struct ObserverScheduler {
    repository: Arc<dyn ObserverRepository>,
    scanner: Arc<dyn TableScanner>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl ObserverScheduler {
    /// Creates a scheduler over the given seams.
    pub fn new(
        repository: Arc<dyn ObserverRepository>,
        scanner: Arc<dyn TableScanner>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self {
            repository,
            scanner,
            dispatcher,
        }
    }

    /// Runs every active observer that is due at `now`.
    ///
    /// Only loading the observer set can fail; individual observer errors
    /// are logged, counted and contained.
    pub async fn run_due_observers(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SweepSummary, SchedulerError> {
        let jobs = self.repository.load_active_observers().await?;
        tracing::debug!(observers = jobs.len(), "Starting scheduled sweep.");

        let mut summary = SweepSummary::default();
        for job in &jobs {
            if !job.observer.is_due(now) {
                summary.skipped += 1;
                continue;
            }

            match self.check_observer(job, now, None, true).await {
                Ok(outcome) => {
                    summary.checked += 1;
                    summary.rows_matched += outcome.rows_matched;
                    summary.notifications_sent += outcome.notifications_sent;
                }
                Err(e) => {
                    tracing::error!(
                        observer_id = job.observer.id,
                        observer_name = %job.observer.name,
                        error = %e,
                        "Observer check failed; continuing sweep."
                    );
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            checked = summary.checked,
            skipped = summary.skipped,
            failed = summary.failed,
            rows_matched = summary.rows_matched,
            "Sweep complete."
        );
        Ok(summary)
    }

    /// Force-runs one observer immediately, active or not.
    ///
    /// The scan is capped at a few rows and no bookkeeping is committed:
    /// `last_checked_at`, `last_triggered_at` and `trigger_count` are
    /// untouched, so a manual test never shifts the schedule.
    pub async fn run_observer(&self, observer_id: i64) -> Result<CheckOutcome, SchedulerError> {
        let job = self.repository.get_observer_job(observer_id).await?;
        self.check_observer(&job, Utc::now(), Some(FORCE_RUN_ROW_LIMIT), false)
            .await
    }

    /// Sends a test notification through the observer's configured channels
    /// using placeholder values, without touching the external datastore.
    pub async fn test_notification(
        &self,
        observer_id: i64,
    ) -> Result<crate::models::DispatchReport, SchedulerError> {
        let job = self.repository.get_observer_job(observer_id).await?;
        let context = NotificationContext {
            observer_name: job.observer.name.clone(),
            table_name: job.table.name.clone(),
            field: job.observer.field_to_watch.clone(),
            condition: job.observer.condition.to_string(),
            current_value: "42".into(),
            record_id: "test".into(),
            subject_template: job.observer.notification_subject.clone(),
            body_template: job.observer.notification_message.clone(),
            channels: job.observer.channels.clone(),
        };
        Ok(self.dispatcher.dispatch(&context).await)
    }

    async fn check_observer(
        &self,
        job: &ObserverJob,
        now: DateTime<Utc>,
        limit: Option<u32>,
        commit: bool,
    ) -> Result<CheckOutcome, SchedulerError> {
        let observer = &job.observer;
        let mut columns = vec![job.table.primary_key.clone()];
        if observer.field_to_watch != job.table.primary_key {
            columns.push(observer.field_to_watch.clone());
        }

        let rows = self
            .scanner
            .scan(&job.credentials, &job.table.table_name, &columns, limit)
            .await?;

        let mut outcome = CheckOutcome {
            rows_scanned: rows.len(),
            ..Default::default()
        };

        for row in &rows {
            let record_id = row
                .get(&job.table.primary_key)
                .map(FieldValue::string_form)
                .unwrap_or_default();
            let (value, missing) = match row.get(&observer.field_to_watch) {
                Some(value) => (value.clone(), false),
                // Schema drift: the watched column is gone. Record it, do
                // not fire.
                None => (FieldValue::Null, true),
            };

            let met = !missing && crate::evaluator::evaluate(&value, &observer.condition, now);
            let shown = if value.is_null() {
                "NULL".to_string()
            } else {
                value.string_form()
            };
            let details = if missing {
                format!("column `{}` not found in scanned row", observer.field_to_watch)
            } else {
                format!(
                    "{} = {shown}; condition `{}` {}",
                    observer.field_to_watch,
                    observer.condition,
                    if met { "met" } else { "not met" }
                )
            };

            let entry =
                ObserverLogEntry::from_evaluation(observer.id, &record_id, &value, met, details);
            let log_id = self.repository.insert_log_entry(entry).await?;

            if met {
                outcome.rows_matched += 1;
                if observer.channels.has_any() {
                    let context = NotificationContext {
                        observer_name: observer.name.clone(),
                        table_name: job.table.name.clone(),
                        field: observer.field_to_watch.clone(),
                        condition: observer.condition.to_string(),
                        current_value: shown,
                        record_id: record_id.clone(),
                        subject_template: observer.notification_subject.clone(),
                        body_template: observer.notification_message.clone(),
                        channels: observer.channels.clone(),
                    };
                    let report = self.dispatcher.dispatch(&context).await;
                    if report.any_success() {
                        outcome.notifications_sent += 1;
                        self.repository
                            .mark_log_notified(log_id, report.sent_to(), Utc::now())
                            .await?;
                    }
                }
            }
        }

        // An empty table is still a completed check.
        if commit {
            self.repository
                .complete_sweep(observer.id, now, outcome.rows_matched as i64)
                .await?;
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use mockall::predicate::eq;

    use super::*;
    use crate::models::{ChannelReport, DestinationResult, DispatchReport, NotificationChannels};
    use crate::notification::MockDispatcher;
    use crate::persistence::MockObserverRepository;
    use crate::provider::MockTableScanner;
    use crate::test_helpers::{observer_job, row, ObserverBuilder};

    fn telegram_channels() -> NotificationChannels {
        NotificationChannels {
            telegram_chat_ids: vec!["1001".into()],
            telegram_bot_token: Some("token".into()),
            ..Default::default()
        }
    }

    fn success_report() -> DispatchReport {
        DispatchReport {
            email: None,
            telegram: Some(ChannelReport {
                results: vec![DestinationResult::ok("1001")],
            }),
        }
    }

    #[tokio::test]
    async fn not_due_observers_are_skipped() {
        let now = Utc::now();
        let job = observer_job(
            ObserverBuilder::new()
                .interval_minutes(60)
                .last_checked_at(now - Duration::minutes(5))
                .build(),
        );

        let mut repo = MockObserverRepository::new();
        repo.expect_load_active_observers()
            .returning(move || Ok(vec![job.clone()]));

        // No scan expectation: touching the scanner would panic.
        let scanner = MockTableScanner::new();
        let dispatcher = MockDispatcher::new();

        let scheduler =
            ObserverScheduler::new(Arc::new(repo), Arc::new(scanner), Arc::new(dispatcher));
        let summary = scheduler.run_due_observers(now).await.unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.checked, 0);
    }

    #[tokio::test]
    async fn due_observer_logs_dispatches_and_commits() {
        let now = Utc::now();
        let job = observer_job(
            ObserverBuilder::new()
                .channels(telegram_channels())
                .build(),
        );

        let mut repo = MockObserverRepository::new();
        repo.expect_load_active_observers()
            .returning(move || Ok(vec![job.clone()]));
        // Two rows, two log entries.
        repo.expect_insert_log_entry()
            .times(2)
            .returning(|entry| Ok(if entry.condition_met { 7 } else { 8 }));
        repo.expect_mark_log_notified()
            .withf(|log_id, sent_to, _| *log_id == 7 && sent_to == &["telegram:1001".to_string()])
            .times(1)
            .returning(|_, _, _| Ok(()));
        repo.expect_complete_sweep()
            .withf(move |id, at, met| *id == 1 && *at == now && *met == 1)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut scanner = MockTableScanner::new();
        scanner.expect_scan().times(1).returning(|_, _, _, _| {
            Ok(vec![
                row(41, "quantity", crate::models::FieldValue::Number(3.0)),
                row(42, "quantity", crate::models::FieldValue::Number(50.0)),
            ])
        });

        let mut dispatcher = MockDispatcher::new();
        dispatcher
            .expect_dispatch()
            .withf(|ctx| ctx.record_id == "41" && ctx.current_value == "3")
            .times(1)
            .returning(|_| success_report());

        let scheduler =
            ObserverScheduler::new(Arc::new(repo), Arc::new(scanner), Arc::new(dispatcher));
        let summary = scheduler.run_due_observers(now).await.unwrap();

        assert_eq!(summary.checked, 1);
        assert_eq!(summary.rows_matched, 1);
        assert_eq!(summary.notifications_sent, 1);
    }

    #[tokio::test]
    async fn scan_failure_contains_to_one_observer() {
        let now = Utc::now();
        let failing = observer_job(ObserverBuilder::new().id(1).build());
        let healthy = observer_job(ObserverBuilder::new().id(2).build());

        let mut repo = MockObserverRepository::new();
        repo.expect_load_active_observers()
            .returning(move || Ok(vec![failing.clone(), healthy.clone()]));
        repo.expect_complete_sweep()
            .withf(|id, _, met| *id == 2 && *met == 0)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut scanner = MockTableScanner::new();
        let mut first = true;
        scanner.expect_scan().times(2).returning(move |_, _, _, _| {
            if std::mem::take(&mut first) {
                Err(crate::provider::ProviderError::Connection(
                    "host unreachable".into(),
                ))
            } else {
                Ok(vec![])
            }
        });

        let dispatcher = MockDispatcher::new();
        let scheduler =
            ObserverScheduler::new(Arc::new(repo), Arc::new(scanner), Arc::new(dispatcher));
        let summary = scheduler.run_due_observers(now).await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.checked, 1);
    }

    #[tokio::test]
    async fn force_run_caps_rows_and_skips_bookkeeping() {
        let job = observer_job(ObserverBuilder::new().build());

        let mut repo = MockObserverRepository::new();
        repo.expect_get_observer_job()
            .with(eq(1))
            .returning(move |_| Ok(job.clone()));
        repo.expect_insert_log_entry().returning(|_| Ok(1));
        // No complete_sweep expectation: committing would panic.

        let mut scanner = MockTableScanner::new();
        scanner
            .expect_scan()
            .withf(|_, _, _, limit| *limit == Some(10))
            .returning(|_, _, _, _| {
                Ok(vec![row(1, "quantity", crate::models::FieldValue::Number(99.0))])
            });

        let dispatcher = MockDispatcher::new();
        let scheduler =
            ObserverScheduler::new(Arc::new(repo), Arc::new(scanner), Arc::new(dispatcher));
        let outcome = scheduler.run_observer(1).await.unwrap();

        assert_eq!(outcome.rows_scanned, 1);
        assert_eq!(outcome.rows_matched, 0);
    }

    #[tokio::test]
    async fn test_notification_uses_placeholders_without_scanning() {
        let job = observer_job(
            ObserverBuilder::new()
                .channels(telegram_channels())
                .build(),
        );

        let mut repo = MockObserverRepository::new();
        repo.expect_get_observer_job()
            .with(eq(1))
            .returning(move |_| Ok(job.clone()));

        let scanner = MockTableScanner::new();
        let mut dispatcher = MockDispatcher::new();
        dispatcher
            .expect_dispatch()
            .withf(|ctx| ctx.record_id == "test" && ctx.current_value == "42")
            .times(1)
            .returning(|_| success_report());

        let scheduler =
            ObserverScheduler::new(Arc::new(repo), Arc::new(scanner), Arc::new(dispatcher));
        let report = scheduler.test_notification(1).await.unwrap();
        assert!(report.any_success());
    }

    #[tokio::test]
    async fn missing_watched_column_logs_without_firing() {
        let job = observer_job(
            ObserverBuilder::new()
                .field_to_watch("vanished")
                .channels(telegram_channels())
                .build(),
        );
        let now = Utc::now();

        let mut repo = MockObserverRepository::new();
        repo.expect_load_active_observers()
            .returning(move || Ok(vec![job.clone()]));
        repo.expect_insert_log_entry()
            .withf(|entry| !entry.condition_met && entry.details.contains("not found"))
            .times(1)
            .returning(|_| Ok(1));
        repo.expect_complete_sweep()
            .withf(|_, _, met| *met == 0)
            .returning(|_, _, _| Ok(()));

        let mut scanner = MockTableScanner::new();
        scanner.expect_scan().returning(|_, _, _, _| {
            Ok(vec![row(1, "quantity", crate::models::FieldValue::Number(1.0))])
        });

        let dispatcher = MockDispatcher::new();
        let scheduler =
            ObserverScheduler::new(Arc::new(repo), Arc::new(scanner), Arc::new(dispatcher));
        let summary = scheduler.run_due_observers(now).await.unwrap();
        assert_eq!(summary.rows_matched, 0);
    }
}
