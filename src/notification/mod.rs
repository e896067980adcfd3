//! Notification dispatch: renders templates and delivers to every configured
//! destination.
//!
//! Dispatch is deliberately infallible at the call site. Each destination's
//! outcome is recorded in a [`DispatchReport`]; the scheduler decides what to
//! persist from it. A dead SMTP relay therefore cannot take the Telegram
//! channel down with it, and one bad recipient cannot starve the rest.

use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

pub mod email;
pub mod error;
pub mod telegram;
pub mod template;

use crate::models::{ChannelReport, DestinationResult, DispatchReport, NotificationContext};

pub use email::{MailSender, SmtpMailSender};
pub use error::NotificationError;
pub use telegram::TelegramNotifier;

/// Delivers one rendered notification to all configured destinations.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Renders the context's templates and attempts every destination.
    /// Failures are reported, never returned.
    async fn dispatch(&self, context: &NotificationContext) -> DispatchReport;
}

/// The production dispatcher: SMTP email plus Telegram Bot API.
pub struct NotificationService {
    mailer: Option<Arc<dyn MailSender>>,
    telegram: TelegramNotifier,
}

impl NotificationService {
    /// Creates a service. `mailer` is `None` when SMTP is not configured;
    /// email destinations then fail individually with a config error.
    pub fn new(mailer: Option<Arc<dyn MailSender>>, telegram: TelegramNotifier) -> Self {
        Self { mailer, telegram }
    }

    async fn dispatch_email(&self, context: &NotificationContext) -> ChannelReport {
        let subject = template::render_subject(context);
        let body = template::render_body(context);

        let mut report = ChannelReport::default();
        for recipient in &context.channels.emails {
            let result = match &self.mailer {
                Some(mailer) => match mailer.send(recipient, &subject, &body).await {
                    Ok(()) => DestinationResult::ok(recipient),
                    Err(e) => {
                        tracing::warn!(recipient, error = %e, "Email send failed.");
                        DestinationResult::failed(recipient, e.to_string())
                    }
                },
                None => DestinationResult::failed(recipient, "SMTP is not configured"),
            };
            report.results.push(result);
        }
        report
    }

    async fn dispatch_telegram(&self, context: &NotificationContext) -> ChannelReport {
        let subject = telegram::escape_html(&template::render_subject(context));
        let body = telegram::escape_html(&template::render_body(context));
        let text = format!("<b>{subject}</b>\n\n{body}");

        // telegram_configured() guarantees the token is present.
        let token = context.channels.telegram_bot_token.as_deref().unwrap_or("");
        self.telegram
            .send_all(token, &context.channels.telegram_chat_ids, &text)
            .await
    }
}

#[async_trait]
impl Dispatcher for NotificationService {
    async fn dispatch(&self, context: &NotificationContext) -> DispatchReport {
        let email = if context.channels.email_configured() {
            Some(self.dispatch_email(context).await)
        } else {
            None
        };

        let telegram = if context.channels.telegram_configured() {
            Some(self.dispatch_telegram(context).await)
        } else {
            None
        };

        let report = DispatchReport { email, telegram };
        if !report.any_success() && context.channels.has_any() {
            tracing::error!(
                observer_name = %context.observer_name,
                "Every notification destination failed."
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockall::predicate::eq;

    use super::email::MockMailSender;
    use super::*;
    use crate::config::HttpRetryConfig;
    use crate::http_client::HttpClientPool;
    use crate::models::NotificationChannels;

    fn telegram_notifier() -> TelegramNotifier {
        TelegramNotifier::new(
            Arc::new(HttpClientPool::default()),
            HttpRetryConfig::default(),
            Duration::from_millis(0),
        )
    }

    fn email_context(emails: Vec<String>) -> NotificationContext {
        NotificationContext {
            observer_name: "low stock".into(),
            table_name: "products".into(),
            field: "quantity".into(),
            condition: "value < 10".into(),
            current_value: "3".into(),
            record_id: "42".into(),
            subject_template: String::new(),
            body_template: String::new(),
            channels: NotificationChannels {
                emails,
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn one_failing_recipient_does_not_stop_the_rest() {
        let mut mailer = MockMailSender::new();
        mailer
            .expect_send()
            .with(eq("a@example.com"), mockall::predicate::always(), mockall::predicate::always())
            .returning(|_, _, _| Ok(()));
        mailer
            .expect_send()
            .with(eq("b@example.com"), mockall::predicate::always(), mockall::predicate::always())
            .returning(|_, _, _| {
                Err(NotificationError::NotifyFailed("mailbox full".into()))
            });
        mailer
            .expect_send()
            .with(eq("c@example.com"), mockall::predicate::always(), mockall::predicate::always())
            .returning(|_, _, _| Ok(()));

        let service = NotificationService::new(Some(Arc::new(mailer)), telegram_notifier());
        let context = email_context(vec![
            "a@example.com".into(),
            "b@example.com".into(),
            "c@example.com".into(),
        ]);

        let report = service.dispatch(&context).await;
        let email = report.email.as_ref().expect("email channel attempted");
        assert_eq!(email.results.len(), 3);
        assert!(email.results[0].success);
        assert!(!email.results[1].success);
        assert!(email.results[2].success);
        assert_eq!(
            report.sent_to(),
            vec!["a@example.com".to_string(), "c@example.com".to_string()]
        );
    }

    #[tokio::test]
    async fn missing_smtp_fails_each_recipient_without_erroring() {
        let service = NotificationService::new(None, telegram_notifier());
        let context = email_context(vec!["a@example.com".into()]);

        let report = service.dispatch(&context).await;
        let email = report.email.expect("email channel attempted");
        assert!(!email.succeeded());
        assert!(email.results[0]
            .error
            .as_deref()
            .unwrap()
            .contains("SMTP is not configured"));
    }

    #[tokio::test]
    async fn unconfigured_channels_are_not_attempted() {
        let service = NotificationService::new(None, telegram_notifier());
        let context = email_context(vec![]);

        let report = service.dispatch(&context).await;
        assert!(report.email.is_none());
        assert!(report.telegram.is_none());
        assert!(!report.any_success());
    }
}
