use chrono::Utc;
use salvo::prelude::*;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::slack::{SignatureError, SignatureVerifier, SlackEnvelope};
use crate::web::web_state;

/// Raw pieces of an Events API delivery.
#[derive(Debug, Clone, Copy)]
pub struct EventsRequest<'a> {
    pub timestamp: Option<&'a str>,
    pub signature: Option<&'a str>,
    pub retry_num: Option<&'a str>,
    pub body: &'a [u8],
}

#[derive(Debug)]
pub enum EventsReply {
    Challenge(String),
    Dispatch {
        event_id: Option<String>,
        event: Value,
    },
    Ack,
    Unauthorized(SignatureError),
    BadRequest(String),
}

/// Verifies and decodes one delivery. Nothing here touches the bridge.
pub fn classify(verifier: &SignatureVerifier, request: EventsRequest<'_>, now: i64) -> EventsReply {
    if let Err(err) = verifier.verify(request.timestamp, request.body, request.signature, now) {
        return EventsReply::Unauthorized(err);
    }

    let envelope: SlackEnvelope = match serde_json::from_slice(request.body) {
        Ok(envelope) => envelope,
        Err(err) => return EventsReply::BadRequest(err.to_string()),
    };

    match envelope {
        SlackEnvelope::UrlVerification { challenge } => EventsReply::Challenge(challenge),
        SlackEnvelope::EventCallback { event_id, .. } if request.retry_num.is_some() => {
            debug!(
                "dropping redelivered slack event id={:?} retry={:?}",
                event_id, request.retry_num
            );
            EventsReply::Ack
        }
        SlackEnvelope::EventCallback { event_id, event } => {
            EventsReply::Dispatch { event_id, event }
        }
        SlackEnvelope::Unknown => EventsReply::Ack,
    }
}

fn header_value(req: &Request, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(ToOwned::to_owned)
}

#[handler]
pub async fn slack_events(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let Some(state) = web_state(depot) else {
        res.status_code(StatusCode::SERVICE_UNAVAILABLE);
        return;
    };

    let timestamp = header_value(req, "X-Slack-Request-Timestamp");
    let signature = header_value(req, "X-Slack-Signature");
    let retry_num = header_value(req, "X-Slack-Retry-Num");
    let body = match req.payload().await {
        Ok(body) => body.to_vec(),
        Err(err) => {
            warn!("failed to read slack event body: {}", err);
            res.status_code(StatusCode::BAD_REQUEST);
            return;
        }
    };

    let request = EventsRequest {
        timestamp: timestamp.as_deref(),
        signature: signature.as_deref(),
        retry_num: retry_num.as_deref(),
        body: &body,
    };
    match classify(&state.verifier, request, Utc::now().timestamp()) {
        EventsReply::Challenge(challenge) => {
            info!("answering slack url verification");
            res.render(Json(json!({ "challenge": challenge })));
        }
        EventsReply::Dispatch { event_id, event } => {
            debug!("accepted slack event id={:?}", event_id);
            let bridge = state.bridge.clone();
            tokio::spawn(async move {
                bridge.handle_slack_event(&event).await;
            });
            res.status_code(StatusCode::OK);
        }
        EventsReply::Ack => {
            res.status_code(StatusCode::OK);
        }
        EventsReply::Unauthorized(err) => {
            warn!("rejected slack request: {}", err);
            res.status_code(StatusCode::UNAUTHORIZED);
            res.render("invalid request signature");
        }
        EventsReply::BadRequest(reason) => {
            warn!("malformed slack event payload: {}", reason);
            res.status_code(StatusCode::BAD_REQUEST);
        }
    }
}
