//! Telegram delivery over the Bot API.

use std::sync::Arc;
use std::time::Duration;

use crate::config::HttpRetryConfig;
use crate::http_client::HttpClientPool;
use crate::models::{ChannelReport, DestinationResult};

use super::error::NotificationError;

/// Sends observer alerts to Telegram chats via `sendMessage`.
///
/// One bot token serves all chats of an observer. Sends are sequential with
/// a short pause between chats to stay under the Bot API rate limits.
pub struct TelegramNotifier {
    client_pool: Arc<HttpClientPool>,
    retry_policy: HttpRetryConfig,
    api_base: String,
    send_delay: Duration,
}

impl TelegramNotifier {
    /// Creates a notifier against the public Bot API.
    pub fn new(
        client_pool: Arc<HttpClientPool>,
        retry_policy: HttpRetryConfig,
        send_delay: Duration,
    ) -> Self {
        Self::with_api_base(
            client_pool,
            retry_policy,
            send_delay,
            "https://api.telegram.org",
        )
    }

    /// Creates a notifier against an alternate API base URL.
    pub fn with_api_base(
        client_pool: Arc<HttpClientPool>,
        retry_policy: HttpRetryConfig,
        send_delay: Duration,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            client_pool,
            retry_policy,
            api_base: api_base.into(),
            send_delay,
        }
    }

    /// Delivers `text` to every chat id, one request per chat. Each chat
    /// gets its own [`DestinationResult`]; one failing chat never stops the
    /// rest.
    pub async fn send_all(&self, token: &str, chat_ids: &[String], text: &str) -> ChannelReport {
        let mut report = ChannelReport::default();
        for (i, chat_id) in chat_ids.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.send_delay).await;
            }
            let result = match self.send_one(token, chat_id, text).await {
                Ok(()) => DestinationResult::ok(chat_id),
                Err(e) => {
                    tracing::warn!(chat_id, error = %e, "Telegram send failed.");
                    DestinationResult::failed(chat_id, e.to_string())
                }
            };
            report.results.push(result);
        }
        report
    }

    async fn send_one(
        &self,
        token: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<(), NotificationError> {
        let client = self.client_pool.get_or_create(&self.retry_policy).await?;
        let url = format!("{}/bot{token}/sendMessage", self.api_base);
        let payload = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        let response = client.post(&url).json(&payload).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::NotifyFailed(format!(
                "Telegram API returned {status}: {body}"
            )));
        }
        Ok(())
    }
}

/// Escapes the characters Telegram's HTML parse mode treats specially.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_escaping_covers_markup_characters() {
        assert_eq!(escape_html("a < b & b > c"), "a &lt; b &amp; b &gt; c");
        assert_eq!(escape_html("plain"), "plain");
    }
}
