//! Meta webhook endpoint
//!
//! Serves the Cloud API callback: `GET /webhook` answers Meta's
//! subscription handshake, `POST /webhook` receives message
//! notifications and dispatches them to the configured handler. The
//! receive path always acknowledges with 200 so Meta does not retry
//! deliveries we have already seen.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::bot::{InboundMessage, MessageHandler, OutboundMessage};
use crate::config::WebhookConfig;

use super::client::CloudApiClient;

#[derive(Clone)]
pub struct WebhookState {
    pub handler: Arc<dyn MessageHandler>,
    pub client: Arc<CloudApiClient>,
    pub verify_token: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// Subscription handshake: echo the challenge back when the mode and
/// token match, reject with 403 otherwise.
pub async fn verify(
    State(state): State<WebhookState>,
    Query(query): Query<VerifyQuery>,
) -> Response {
    if query.mode.as_deref() == Some("subscribe")
        && query.verify_token.as_deref() == Some(state.verify_token.as_str())
    {
        info!("Webhook verified");
        (StatusCode::OK, query.challenge.unwrap_or_default()).into_response()
    } else {
        warn!("Webhook verification rejected");
        StatusCode::FORBIDDEN.into_response()
    }
}

#[derive(Debug, Deserialize)]
struct Notification {
    #[serde(default)]
    entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
struct Change {
    value: ChangeValue,
}

#[derive(Debug, Deserialize)]
struct ChangeValue {
    #[serde(default)]
    messages: Vec<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    from: String,
    text: Option<TextBody>,
    context: Option<MessageContext>,
}

#[derive(Debug, Deserialize)]
struct TextBody {
    body: String,
}

#[derive(Debug, Deserialize)]
struct MessageContext {
    id: Option<String>,
}

/// Message notification. Only the first message of the first change is
/// processed; delivery failures are logged, never surfaced to Meta.
pub async fn receive(State(state): State<WebhookState>, body: String) -> (StatusCode, &'static str) {
    match serde_json::from_str::<Notification>(&body) {
        Ok(notification) => {
            if let Some(message) = first_message(notification) {
                dispatch(&state, message).await;
            } else {
                debug!("Notification without a message payload, ignoring");
            }
        }
        Err(err) => warn!("Unparseable webhook body: {err}"),
    }
    (StatusCode::OK, "OK")
}

fn first_message(notification: Notification) -> Option<IncomingMessage> {
    notification
        .entry
        .into_iter()
        .next()?
        .changes
        .into_iter()
        .next()?
        .value
        .messages
        .into_iter()
        .next()
}

async fn dispatch(state: &WebhookState, message: IncomingMessage) {
    let event = InboundMessage {
        sender: message.from.clone(),
        text: message.text.map(|t| t.body),
        context_id: message.context.and_then(|c| c.id),
        ..Default::default()
    };
    debug!("Inbound Cloud API message from {}", message.from);

    let replies = match state.handler.on_message(event).await {
        Ok(replies) => replies,
        Err(err) => {
            error!("Handler failed for {}: {err}", message.from);
            return;
        }
    };
    for reply in replies {
        let sent = match reply {
            OutboundMessage::Text(text) => state.client.send_text(&message.from, &text).await,
            OutboundMessage::Image { bytes, caption } => {
                state.client.send_image(&message.from, bytes, &caption).await
            }
        };
        if let Err(err) = sent {
            error!("Failed to deliver reply to {}: {err}", message.from);
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", get(verify))
        .route("/webhook", post(receive))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn serve(config: &WebhookConfig, state: WebhookState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.bind, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Webhook listening on http://{addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received, stopping webhook server");
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;

    struct EchoHandler;

    #[async_trait]
    impl MessageHandler for EchoHandler {
        async fn on_message(&self, event: InboundMessage) -> Result<Vec<OutboundMessage>> {
            Ok(event
                .text
                .map(|t| vec![OutboundMessage::Text(format!("echo: {t}"))])
                .unwrap_or_default())
        }
    }

    fn state_with(server: &mockito::ServerGuard) -> WebhookState {
        let config = WebhookConfig {
            api_base: server.url(),
            access_token: "token".into(),
            phone_number_id: "12345".into(),
            ..Default::default()
        };
        WebhookState {
            handler: Arc::new(EchoHandler),
            client: Arc::new(CloudApiClient::new(&config)),
            verify_token: "secret".into(),
        }
    }

    fn query(mode: Option<&str>, token: Option<&str>, challenge: Option<&str>) -> VerifyQuery {
        VerifyQuery {
            mode: mode.map(String::from),
            verify_token: token.map(String::from),
            challenge: challenge.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_verify_echoes_challenge() {
        let server = mockito::Server::new_async().await;
        let state = state_with(&server);
        let response = verify(
            State(state),
            Query(query(Some("subscribe"), Some("secret"), Some("1158201444"))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"1158201444");
    }

    #[tokio::test]
    async fn test_verify_rejects_bad_token() {
        let server = mockito::Server::new_async().await;
        let state = state_with(&server);
        let response = verify(
            State(state),
            Query(query(Some("subscribe"), Some("wrong"), Some("1"))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_verify_rejects_missing_mode() {
        let server = mockito::Server::new_async().await;
        let state = state_with(&server);
        let response = verify(State(state), Query(query(None, Some("secret"), Some("1")))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_receive_dispatches_first_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/12345/messages")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "to": "628111",
                "text": {"body": "echo: halo"}
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let body = serde_json::json!({
            "entry": [{"changes": [{"value": {"messages": [
                {"from": "628111", "type": "text", "text": {"body": "halo"}},
                {"from": "628222", "type": "text", "text": {"body": "kedua"}}
            ]}}]}]
        })
        .to_string();

        let state = state_with(&server);
        let (status, ack) = receive(State(state), body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack, "OK");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_receive_acks_status_only_notification() {
        let server = mockito::Server::new_async().await;
        let state = state_with(&server);
        let body = serde_json::json!({
            "entry": [{"changes": [{"value": {"statuses": [{"id": "x"}]}}]}]
        })
        .to_string();
        let (status, _) = receive(State(state), body).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_receive_acks_garbage() {
        let server = mockito::Server::new_async().await;
        let state = state_with(&server);
        let (status, _) = receive(State(state), "not json".to_string()).await;
        assert_eq!(status, StatusCode::OK);
    }
}
