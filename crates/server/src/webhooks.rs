//! Inbound webhook handlers for the Slack events API and Twilio WhatsApp.

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Json, Response};
use axum::Form;
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use tracing::{info, warn};

use palaver_channels::slack::{parse_event, post_message_payload, SlackInbound};
use palaver_channels::whatsapp::{to_message, twiml_reply, TwilioInbound};
use palaver_core::InterfaceError;

use crate::routes::{ApiError, AppState};

pub async fn slack(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let inbound = parse_event(&payload)
        .map_err(|error| ApiError::from(InterfaceError::bad_request(error.to_string())))?;

    match inbound {
        SlackInbound::Challenge(challenge) => Ok(Json(json!({ "challenge": challenge }))),
        SlackInbound::Ignored => Ok(Json(json!({ "ok": true }))),
        SlackInbound::Message { message, channel_id, thread_ts } => {
            let decision = state.engine.handle(&message).await;

            if let Some(token) = &state.slack_bot_token {
                let body = post_message_payload(&channel_id, &thread_ts, &decision);
                let token = token.expose_secret().to_string();
                // Reply delivery is best effort; Slack retries the event if we
                // fail hard, which would double-answer the user.
                tokio::spawn(async move {
                    let outcome = reqwest::Client::new()
                        .post("https://slack.com/api/chat.postMessage")
                        .bearer_auth(token)
                        .json(&body)
                        .send()
                        .await;
                    match outcome {
                        Ok(response) if response.status().is_success() => {
                            info!(event_name = "slack.reply_posted", "reply delivered");
                        }
                        Ok(response) => {
                            warn!(
                                event_name = "slack.reply_rejected",
                                status = %response.status(),
                                "slack rejected the reply"
                            );
                        }
                        Err(error) => {
                            warn!(event_name = "slack.reply_failed", %error, "reply not delivered");
                        }
                    }
                });
            } else {
                warn!(event_name = "slack.reply_skipped", "no bot token configured");
            }

            Ok(Json(json!({ "ok": true })))
        }
    }
}

pub async fn whatsapp(
    State(state): State<AppState>,
    Form(inbound): Form<TwilioInbound>,
) -> Result<Response, ApiError> {
    let message = to_message(&inbound)
        .map_err(|error| ApiError::from(InterfaceError::bad_request(error.to_string())))?;

    let decision = state.engine.handle(&message).await;
    let twiml = twiml_reply(&decision);

    Ok(([(header::CONTENT_TYPE, "application/xml")], twiml).into_response())
}
