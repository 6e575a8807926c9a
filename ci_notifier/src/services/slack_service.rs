//! Delivery of composed messages to a Slack incoming webhook.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

use crate::models::message::NotificationMessage;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("webhook rejected message: {status} {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to write message: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait DeliverySink: Debug + Send + Sync {
    async fn deliver(&self, message: &NotificationMessage) -> Result<(), DeliveryError>;
}

#[derive(Debug)]
pub struct SlackWebhook {
    client: reqwest::Client,
    url: String,
}

impl SlackWebhook {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl DeliverySink for SlackWebhook {
    async fn deliver(&self, message: &NotificationMessage) -> Result<(), DeliveryError> {
        let resp = self.client.post(&self.url).json(message).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected { status, body });
        }
        Ok(())
    }
}

/// Prints messages instead of sending them. Used for dry runs and when no
/// webhook is configured.
#[derive(Debug)]
pub struct StdoutSink;

#[async_trait]
impl DeliverySink for StdoutSink {
    async fn deliver(&self, message: &NotificationMessage) -> Result<(), DeliveryError> {
        let json = serde_json::to_string_pretty(message)
            .map_err(|e| DeliveryError::Io(std::io::Error::other(e)))?;
        println!("{json}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};

    use super::*;
    use crate::models::message::Attachment;
    use crate::testing::serve;

    fn message() -> NotificationMessage {
        NotificationMessage {
            text: "Build id: `b-1`".into(),
            mrkdwn: true,
            attachments: vec![Attachment {
                color: Some("good".into()),
                ..Default::default()
            }],
        }
    }

    async fn hooks() -> String {
        let api = Router::new()
            .route(
                "/ok",
                post(|Json(body): Json<serde_json::Value>| async move {
                    if body["text"] == "Build id: `b-1`" && body["mrkdwn"] == true {
                        (StatusCode::OK, "ok")
                    } else {
                        (StatusCode::BAD_REQUEST, "invalid_payload")
                    }
                }),
            )
            .route(
                "/revoked",
                post(|| async { (StatusCode::FORBIDDEN, "invalid_token") }),
            )
            .route(
                "/gone",
                post(|| async { (StatusCode::NOT_FOUND, "no_service") }),
            );
        serve(api).await
    }

    #[tokio::test]
    async fn accepted_messages_are_delivered() {
        let base = hooks().await;
        let hook = SlackWebhook::new(format!("{base}/ok")).unwrap();
        hook.deliver(&message()).await.unwrap();
    }

    #[tokio::test]
    async fn non_success_responses_are_rejections() {
        let base = hooks().await;

        for (path, expected, text) in [
            ("revoked", StatusCode::FORBIDDEN, "invalid_token"),
            ("gone", StatusCode::NOT_FOUND, "no_service"),
        ] {
            let hook = SlackWebhook::new(format!("{base}/{path}")).unwrap();
            match hook.deliver(&message()).await.unwrap_err() {
                DeliveryError::Rejected { status, body } => {
                    assert_eq!(status, expected);
                    assert_eq!(body, text);
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }
}
