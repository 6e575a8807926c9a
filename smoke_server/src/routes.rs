use axum::body::Bytes;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

const DEFAULT_MESSAGE: &str = "Hello World!";

#[derive(Debug, Default, Deserialize)]
pub struct MessageParams {
    pub message: Option<String>,
}

pub fn smoke_router() -> Router {
    Router::new().route("/", get(hello).post(hello))
}

impl MessageParams {
    /// The message, unless it is missing or empty.
    fn non_empty(self) -> Option<String> {
        self.message.filter(|m| !m.is_empty())
    }
}

/// Echoes `message` from the query string, then from a JSON body, else greets.
async fn hello(Query(query): Query<MessageParams>, body: Bytes) -> (StatusCode, String) {
    let from_body = || {
        serde_json::from_slice::<MessageParams>(&body)
            .ok()
            .and_then(MessageParams::non_empty)
    };
    let message = query
        .non_empty()
        .or_else(from_body)
        .unwrap_or_else(|| DEFAULT_MESSAGE.to_string());
    (StatusCode::OK, message)
}
