//! Pub/Sub push handler — unwraps the push envelope and runs the pipeline.
//!
//! Pub/Sub redelivers on any non-2xx response, so only failures worth
//! retrying (delivery, deadline) are answered with an error status.

use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::NotifierState;
use crate::services::notify_service::{NotifyError, Outcome};

#[derive(Debug, Deserialize)]
pub struct PushEnvelope {
    pub message: PushMessage,
    #[serde(default)]
    pub subscription: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub publish_time: Option<String>,
}

pub async fn push_handler(
    State(state): State<NotifierState>,
    envelope: Result<Json<PushEnvelope>, JsonRejection>,
) -> StatusCode {
    let Json(envelope) = match envelope {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!("Rejecting push request: {e}");
            return StatusCode::BAD_REQUEST;
        }
    };

    tracing::debug!(
        message_id = envelope.message.message_id.as_deref().unwrap_or_default(),
        publish_time = envelope.message.publish_time.as_deref().unwrap_or_default(),
        subscription = envelope.subscription.as_deref().unwrap_or_default(),
        build_id = envelope.message.attributes.get("buildId").map(String::as_str).unwrap_or_default(),
        "Received push message"
    );

    match state.notifier.handle(&envelope.message.data).await {
        Ok(Outcome::Delivered) => StatusCode::OK,
        Ok(Outcome::Skipped(_)) => StatusCode::NO_CONTENT,
        // Redelivering a poison message cannot help; acknowledge it.
        Err(NotifyError::MalformedPayload(_)) => StatusCode::NO_CONTENT,
        Err(NotifyError::Delivery(_)) => StatusCode::BAD_GATEWAY,
        Err(NotifyError::DeadlineExceeded(_)) => StatusCode::GATEWAY_TIMEOUT,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{self, Request};
    use tower::ServiceExt;

    use super::*;
    use crate::routes::notifier_router;
    use crate::services::notify_service::testing::{config, encoded, FakeCommits, RecordingSink};
    use crate::services::notify_service::Notifier;
    use crate::services::store::testing::MemoryStore;

    fn router(sink: Arc<RecordingSink>) -> axum::Router {
        let notifier = Notifier::new(
            config(),
            Arc::new(MemoryStore::default()),
            Arc::new(FakeCommits(None)),
            sink,
        );
        notifier_router(NotifierState {
            notifier: Arc::new(notifier),
        })
    }

    fn push(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/pubsub/push")
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn envelope(data: String) -> String {
        serde_json::json!({
            "message": {
                "data": data,
                "attributes": {"buildId": "b-1", "status": "SUCCESS"},
                "messageId": "42",
                "publishTime": "2019-01-01T00:00:00Z"
            },
            "subscription": "projects/p/subscriptions/slack"
        })
        .to_string()
    }

    fn build(status: &str) -> String {
        encoded(serde_json::json!({
            "id": "b-1",
            "status": status,
            "projectId": "proj",
            "substitutions": {"REPO_NAME": "airflow"}
        }))
    }

    #[tokio::test]
    async fn delivered_events_return_ok() {
        let sink = Arc::new(RecordingSink::default());
        let resp = router(sink.clone())
            .oneshot(push(envelope(build("SUCCESS"))))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(sink.sent().len(), 1);
    }

    #[tokio::test]
    async fn filtered_events_are_acknowledged() {
        let sink = Arc::new(RecordingSink::default());
        let resp = router(sink.clone())
            .oneshot(push(envelope(build("WORKING"))))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn malformed_data_is_acknowledged() {
        let resp = router(Arc::new(RecordingSink::default()))
            .oneshot(push(envelope("!!not-base64!!".into())))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn invalid_envelopes_are_bad_requests() {
        let resp = router(Arc::new(RecordingSink::default()))
            .oneshot(push(r#"{"nope": true}"#.into()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delivery_failures_ask_for_redelivery() {
        let sink = Arc::new(RecordingSink {
            reject: true,
            ..Default::default()
        });
        let resp = router(sink).oneshot(push(envelope(build("FAILURE")))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let resp = router(Arc::new(RecordingSink::default()))
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }
}
