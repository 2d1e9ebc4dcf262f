use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use crate::notify::format::{render_description, render_title};
use crate::notify::Notification;

const EMBED_COLOR: u32 = 3_447_003;

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;
    async fn notify(&self, notification: &Notification<'_>) -> Result<()>;
}

/// Prints notifications to the console. Writes to stderr instead when stdout
/// carries machine-readable output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutNotifier {
    use_stderr: bool,
}

impl StdoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stderr() -> Self {
        Self { use_stderr: true }
    }

    pub fn writes_to_stderr(&self) -> bool {
        self.use_stderr
    }

    pub fn render(notification: &Notification<'_>) -> String {
        format!(
            "{}\n{}",
            render_title(notification),
            render_description(notification)
        )
    }
}

#[async_trait]
impl Notifier for StdoutNotifier {
    fn name(&self) -> &str {
        if self.use_stderr {
            "stderr"
        } else {
            "stdout"
        }
    }

    async fn notify(&self, notification: &Notification<'_>) -> Result<()> {
        let text = Self::render(notification);
        if self.use_stderr {
            eprintln!("{text}");
        } else {
            println!("{text}");
        }
        Ok(())
    }
}

pub struct DiscordNotifier {
    client: Client,
    webhook: String,
}

impl DiscordNotifier {
    pub fn new(webhook: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("cargo-schedule-watch/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("failed building webhook HTTP client")?;
        Ok(Self {
            client,
            webhook: webhook.into(),
        })
    }
}

#[derive(Serialize)]
struct DiscordFooter {
    text: String,
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
    color: u32,
    footer: DiscordFooter,
}

#[derive(Serialize)]
struct DiscordWebhookPayload {
    embeds: Vec<DiscordEmbed>,
}

impl DiscordWebhookPayload {
    fn from_notification(notification: &Notification<'_>) -> Self {
        Self {
            embeds: vec![DiscordEmbed {
                title: render_title(notification),
                description: render_description(notification),
                color: EMBED_COLOR,
                footer: DiscordFooter {
                    text: format!("取得日時: {}", Local::now().format("%Y/%m/%d %H:%M:%S")),
                },
            }],
        }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    fn name(&self) -> &str {
        "discord"
    }

    async fn notify(&self, notification: &Notification<'_>) -> Result<()> {
        let payload = DiscordWebhookPayload::from_notification(notification);
        let response = self
            .client
            .post(&self.webhook)
            .json(&payload)
            .send()
            .await
            .context("discord webhook request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(180).collect();
            return Err(anyhow!("discord webhook returned {status}: {preview}"));
        }
        info!(
            "sent {} {} flights to discord",
            notification.flights.len(),
            notification.direction.as_slug()
        );
        Ok(())
    }
}

/// Delivers to every sink; succeeds when at least one sink accepted.
pub struct MultiNotifier {
    sinks: Vec<Box<dyn Notifier>>,
}

impl MultiNotifier {
    pub fn new(sinks: Vec<Box<dyn Notifier>>) -> Self {
        Self { sinks }
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl Notifier for MultiNotifier {
    fn name(&self) -> &str {
        "multi"
    }

    async fn notify(&self, notification: &Notification<'_>) -> Result<()> {
        let mut delivered = 0usize;
        for sink in &self.sinks {
            match sink.notify(notification).await {
                Ok(()) => delivered += 1,
                Err(err) => warn!("{} delivery failed: {err:#}", sink.name()),
            }
        }
        if delivered == 0 {
            return Err(anyhow!("no notifier accepted the message"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::*;
    use crate::flight::{Direction, Period};
    use crate::notify::NotificationKind;

    struct Counting {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        async fn notify(&self, _notification: &Notification<'_>) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(anyhow!("boom"))
            } else {
                Ok(())
            }
        }
    }

    fn notification(period: &Period) -> Notification<'_> {
        Notification {
            direction: Direction::Departure,
            airport: "NGO",
            period,
            kind: NotificationKind::Changes,
            summary: "new: 1件",
            flights: &[],
        }
    }

    #[test]
    fn multi_succeeds_when_any_sink_succeeds() {
        let calls = Arc::new(AtomicUsize::new(0));
        let multi = MultiNotifier::new(vec![
            Box::new(Counting {
                calls: calls.clone(),
                fail: true,
            }),
            Box::new(Counting {
                calls: calls.clone(),
                fail: false,
            }),
        ]);
        let period = Period::starting(NaiveDate::from_ymd_opt(2025, 11, 1).unwrap(), 1);
        let result = tokio_test::block_on(multi.notify(&notification(&period)));
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn multi_fails_when_every_sink_fails() {
        let calls = Arc::new(AtomicUsize::new(0));
        let multi = MultiNotifier::new(vec![Box::new(Counting {
            calls: calls.clone(),
            fail: true,
        })]);
        let period = Period::starting(NaiveDate::from_ymd_opt(2025, 11, 1).unwrap(), 1);
        assert!(tokio_test::block_on(multi.notify(&notification(&period))).is_err());
        assert!(MultiNotifier::new(Vec::new()).is_empty());
    }

    #[test]
    fn console_notifier_stream_selection() {
        assert!(!StdoutNotifier::new().writes_to_stderr());
        let stderr = StdoutNotifier::stderr();
        assert!(stderr.writes_to_stderr());
        assert_eq!(stderr.name(), "stderr");

        let period = Period::starting(NaiveDate::from_ymd_opt(2025, 11, 1).unwrap(), 7);
        let text = StdoutNotifier::render(&notification(&period));
        assert!(text.starts_with("🛫"));
        assert!(tokio_test::block_on(stderr.notify(&notification(&period))).is_ok());
    }

    #[test]
    fn discord_payload_carries_single_embed() {
        let period = Period::starting(NaiveDate::from_ymd_opt(2025, 11, 1).unwrap(), 7);
        let payload = DiscordWebhookPayload::from_notification(&notification(&period));
        let json = serde_json::to_value(&payload).expect("json");
        assert_eq!(json["embeds"].as_array().map(Vec::len), Some(1));
        assert_eq!(json["embeds"][0]["color"], 3_447_003);
        assert!(json["embeds"][0]["footer"]["text"]
            .as_str()
            .unwrap_or_default()
            .starts_with("取得日時"));
    }
}
