//! Integration tests for the notification service.

use std::sync::Arc;
use std::time::Duration;

use mockito::Matcher;
use serde_json::json;
use tablewatch::{
    config::HttpRetryConfig,
    http_client::HttpClientPool,
    models::{NotificationChannels, NotificationContext},
    notification::{Dispatcher, NotificationService, TelegramNotifier},
};

fn telegram_service(server_url: &str, retry_policy: HttpRetryConfig) -> NotificationService {
    let telegram = TelegramNotifier::with_api_base(
        Arc::new(HttpClientPool::default()),
        retry_policy,
        Duration::from_millis(0),
        server_url,
    );
    NotificationService::new(None, telegram)
}

fn context(chat_ids: Vec<String>) -> NotificationContext {
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
            telegram_chat_ids: chat_ids,
            telegram_bot_token: Some("TOKEN".into()),
            ..Default::default()
        },
    }
}

#[tokio::test]
async fn telegram_delivery_renders_templates_and_escapes_html() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/botTOKEN/sendMessage")
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(json!({
                "chat_id": "1001",
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
            })),
            // The condition contains `<`, which must arrive escaped.
            Matcher::Regex("value &lt; 10".to_string()),
            Matcher::Regex(r"\[low stock\] condition met on products".to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"ok":true}"#)
        .create_async()
        .await;

    let service = telegram_service(&server.url(), HttpRetryConfig::default());
    let report = service.dispatch(&context(vec!["1001".into()])).await;

    mock.assert_async().await;
    let telegram = report.telegram.as_ref().expect("telegram channel attempted");
    assert!(telegram.succeeded());
    assert_eq!(report.sent_to(), vec!["telegram:1001".to_string()]);
}

#[tokio::test]
async fn one_failing_chat_does_not_stop_the_rest() {
    let mut server = mockito::Server::new_async().await;

    let good = server
        .mock("POST", "/botTOKEN/sendMessage")
        .match_body(Matcher::PartialJson(json!({"chat_id": "1001"})))
        .with_status(200)
        .with_body(r#"{"ok":true}"#)
        .create_async()
        .await;
    let bad = server
        .mock("POST", "/botTOKEN/sendMessage")
        .match_body(Matcher::PartialJson(json!({"chat_id": "1002"})))
        .with_status(400)
        .with_body(r#"{"ok":false,"description":"chat not found"}"#)
        .create_async()
        .await;

    let service = telegram_service(&server.url(), HttpRetryConfig::default());
    let report = service
        .dispatch(&context(vec!["1001".into(), "1002".into()]))
        .await;

    good.assert_async().await;
    bad.assert_async().await;

    let telegram = report.telegram.as_ref().expect("telegram channel attempted");
    assert_eq!(telegram.results.len(), 2);
    assert!(telegram.results[0].success);
    assert!(!telegram.results[1].success);
    assert!(telegram.results[1]
        .error
        .as_deref()
        .unwrap()
        .contains("chat not found"));
    assert_eq!(report.sent_to(), vec!["telegram:1001".to_string()]);
}

#[tokio::test]
async fn transient_server_errors_are_retried() {
    let mut server = mockito::Server::new_async().await;

    // Two retries on top of the initial attempt.
    let mock = server
        .mock("POST", "/botTOKEN/sendMessage")
        .with_status(500)
        .with_body("Internal Server Error")
        .expect(3)
        .create_async()
        .await;

    let retry_policy = HttpRetryConfig {
        max_retries: 2,
        initial_backoff_ms: Duration::from_millis(10),
        max_backoff_secs: Duration::from_millis(50),
        ..Default::default()
    };
    let service = telegram_service(&server.url(), retry_policy);
    let report = service.dispatch(&context(vec!["1001".into()])).await;

    mock.assert_async().await;
    let telegram = report.telegram.as_ref().expect("telegram channel attempted");
    assert!(!telegram.succeeded());
    assert!(!report.any_success());
}
