//! Slack ingress: one endpoint for both the Events API and interactivity.
//!
//! Requests are authenticated with the signing secret, decoded, and acked
//! right away. The command itself runs on a background task so Slack's
//! three-second ack deadline never depends on the database or the Web API.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use kintai_core::clock::Clock;
use kintai_slack::{
    decode_request, EventProcessor, InboundPayload, SignatureVerifier, SIGNATURE_HEADER,
    TIMESTAMP_HEADER,
};
use serde_json::json;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub const RETRY_HEADER: &str = "x-slack-retry-num";

#[derive(Clone)]
pub struct SlackState {
    pub verifier: SignatureVerifier,
    pub processor: EventProcessor,
    pub tasks: BackgroundTasks,
    pub clock: Arc<dyn Clock>,
}

/// Command work accepted before shutdown, drained with a deadline on the way out.
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    inner: Arc<Mutex<JoinSet<()>>>,
}

impl BackgroundTasks {
    pub async fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut set = self.inner.lock().await;
        while set.try_join_next().is_some() {}
        set.spawn(task);
    }

    /// Waits for in-flight work; returns how many tasks were aborted at the deadline.
    pub async fn drain(&self, deadline: Duration) -> usize {
        let mut set = self.inner.lock().await;
        let finished = tokio::time::timeout(deadline, async {
            while set.join_next().await.is_some() {}
        })
        .await;

        if finished.is_ok() {
            return 0;
        }
        let abandoned = set.len();
        set.abort_all();
        abandoned
    }
}

pub fn router(state: SlackState) -> Router {
    Router::new().route("/slack/events", post(slack_events)).with_state(state)
}

async fn slack_events(
    State(state): State<SlackState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());

    if let Err(error) = state.verifier.verify(
        header(TIMESTAMP_HEADER),
        header(SIGNATURE_HEADER),
        &body,
        state.clock.now().timestamp(),
    ) {
        warn!(
            event_name = "slack.signature_rejected",
            correlation_id = "ingress",
            error = %error,
            "rejecting unsigned or stale request"
        );
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let payload = match decode_request(header(CONTENT_TYPE.as_str()), &body) {
        Ok(payload) => payload,
        Err(error) => {
            warn!(
                event_name = "slack.decode_failed",
                correlation_id = "ingress",
                error = %error,
                "request body could not be decoded"
            );
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match payload {
        InboundPayload::UrlVerification { challenge } => {
            info!(
                event_name = "slack.url_verified",
                correlation_id = "ingress",
                "answered url verification"
            );
            Json(json!({ "challenge": challenge })).into_response()
        }
        InboundPayload::Ignored { reason } => {
            debug!(event_name = "slack.ignored", correlation_id = "ingress", reason = %reason, "ignored");
            StatusCode::OK.into_response()
        }
        InboundPayload::Envelope(envelope) => {
            // The first delivery was already acked and is being processed.
            if let Some(retry) = header(RETRY_HEADER) {
                info!(
                    event_name = "slack.retry_skipped",
                    correlation_id = %envelope.envelope_id,
                    retry,
                    "skipping redelivered event"
                );
                return StatusCode::OK.into_response();
            }

            debug!(
                event_name = "slack.accepted",
                correlation_id = %envelope.envelope_id,
                user_id = %envelope.user_id.as_str(),
                command = envelope.command.name(),
                "accepted command"
            );
            let processor = state.processor.clone();
            state
                .tasks
                .spawn(async move {
                    processor.process(envelope).await;
                })
                .await;
            StatusCode::OK.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use kintai_core::clock::{Clock, FixedClock};
    use kintai_core::context::RequestContext;
    use kintai_core::directory::UserDirectory;
    use kintai_core::domain::user::UserId;
    use kintai_core::overview::OverviewAggregator;
    use kintai_core::repository::memory::{
        InMemoryAttendancePlanRepository, InMemoryShiftRepository, InMemoryUserRepository,
    };
    use kintai_core::scheduler::AttendanceScheduler;
    use kintai_core::shift_engine::ShiftAccountingEngine;
    use kintai_slack::blocks::MessageTemplate;
    use kintai_slack::events::action;
    use kintai_slack::{
        CommandRouter, CommandServices, EventProcessor, SignatureVerifier, SlackApi,
        SlackApiError, SIGNATURE_HEADER, TIMESTAMP_HEADER,
    };
    use secrecy::SecretString;
    use serde_json::json;
    use tower::ServiceExt;

    use super::{router, BackgroundTasks, SlackState, RETRY_HEADER};

    const SECRET: &str = "test-signing-secret";

    #[derive(Default)]
    struct RecordingApi {
        posted: Mutex<Vec<(String, MessageTemplate)>>,
    }

    impl RecordingApi {
        fn posted(&self) -> Vec<(String, MessageTemplate)> {
            self.posted.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl SlackApi for RecordingApi {
        async fn post_message(
            &self,
            channel_id: &str,
            message: &MessageTemplate,
        ) -> Result<(), SlackApiError> {
            self.posted.lock().expect("lock").push((channel_id.to_owned(), message.clone()));
            Ok(())
        }

        async fn display_name(&self, _user_id: &UserId) -> Result<Option<String>, SlackApiError> {
            Ok(Some("山田 花子".to_owned()))
        }
    }

    struct Harness {
        state: SlackState,
        api: Arc<RecordingApi>,
        shifts: ShiftAccountingEngine,
        clock: Arc<dyn Clock>,
    }

    fn harness() -> Harness {
        // 2024-05-14 09:30 JST
        let clock: Arc<dyn Clock> =
            Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 14, 0, 30, 0).unwrap()));
        let shift_repo = Arc::new(InMemoryShiftRepository::default());
        let plans = Arc::new(InMemoryAttendancePlanRepository::default());
        let users = Arc::new(InMemoryUserRepository::default());
        let shifts = ShiftAccountingEngine::new(shift_repo, clock.clone());

        let services = CommandServices {
            shifts: shifts.clone(),
            scheduler: AttendanceScheduler::new(plans.clone(), clock.clone()),
            overview: OverviewAggregator::new(plans),
            directory: UserDirectory::new(users, clock.clone()),
            clock: clock.clone(),
        };
        let api = Arc::new(RecordingApi::default());
        let state = SlackState {
            verifier: SignatureVerifier::new(SecretString::from(SECRET.to_owned())),
            processor: EventProcessor::new(
                Arc::new(CommandRouter::new(services)),
                api.clone(),
            ),
            tasks: BackgroundTasks::default(),
            clock: clock.clone(),
        };
        Harness { state, api, shifts, clock }
    }

    fn signed_request(harness: &Harness, content_type: &str, body: Vec<u8>) -> Request<Body> {
        let timestamp = harness.clock.now().timestamp().to_string();
        let signature = harness.state.verifier.sign(&timestamp, &body);
        Request::builder()
            .method("POST")
            .uri("/slack/events")
            .header("content-type", content_type)
            .header(TIMESTAMP_HEADER, timestamp)
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(body))
            .expect("request")
    }

    fn menu_event() -> Vec<u8> {
        json!({
            "type": "event_callback",
            "event_id": "Ev1",
            "event": {
                "type": "message", "channel_type": "im", "user": "U1",
                "channel": "D1", "text": "menu", "ts": "1715.2"
            }
        })
        .to_string()
        .into_bytes()
    }

    #[tokio::test]
    async fn url_verification_returns_the_challenge() {
        let harness = harness();
        let body = json!({ "type": "url_verification", "challenge": "abc123" }).to_string();
        let request = signed_request(&harness, "application/json", body.into_bytes());

        let response = router(harness.state.clone()).oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let payload: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(payload["challenge"], "abc123");
    }

    #[tokio::test]
    async fn unsigned_and_tampered_requests_are_rejected() {
        let harness = harness();
        let unsigned = Request::builder()
            .method("POST")
            .uri("/slack/events")
            .header("content-type", "application/json")
            .body(Body::from(menu_event()))
            .expect("request");
        let response = router(harness.state.clone()).oneshot(unsigned).await.expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let mut tampered = signed_request(&harness, "application/json", menu_event());
        *tampered.body_mut() = Body::from(b"{\"type\":\"url_verification\",\"challenge\":\"x\"}".to_vec());
        let response = router(harness.state.clone()).oneshot(tampered).await.expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        harness.state.tasks.drain(Duration::from_secs(1)).await;
        assert!(harness.api.posted().is_empty());
    }

    #[tokio::test]
    async fn stale_timestamps_are_rejected() {
        let harness = harness();
        let body = menu_event();
        let timestamp = (harness.clock.now().timestamp() - 600).to_string();
        let signature = harness.state.verifier.sign(&timestamp, &body);
        let request = Request::builder()
            .method("POST")
            .uri("/slack/events")
            .header("content-type", "application/json")
            .header(TIMESTAMP_HEADER, timestamp)
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(body))
            .expect("request");

        let response = router(harness.state.clone()).oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_bodies_get_bad_request() {
        let harness = harness();
        let request = signed_request(&harness, "application/json", b"not json".to_vec());

        let response = router(harness.state.clone()).oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn menu_message_is_acked_then_answered_in_the_dm() {
        let harness = harness();
        let request = signed_request(&harness, "application/json", menu_event());

        let response = router(harness.state.clone()).oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(harness.state.tasks.drain(Duration::from_secs(5)).await, 0);
        let posted = harness.api.posted();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].0, "D1");
        assert!(posted[0].1.action_ids().iter().any(|id| *id == action::START_WORK));
    }

    #[tokio::test]
    async fn start_submission_opens_a_shift() {
        let harness = harness();
        let payload = json!({
            "type": "block_actions",
            "trigger_id": "trigger-1",
            "user": { "id": "U1", "name": "hanako" },
            "channel": { "id": "D1" },
            "actions": [{ "action_id": action::SAVE_START_TIME, "action_ts": "1715.1" }],
            "state": { "values": {
                "b1": {
                    "datapicker": { "type": "datepicker", "selected_date": "2024-05-14" },
                    "timepicker": { "type": "timepicker", "selected_time": "09:00" }
                }
            }}
        });
        let body = serde_urlencoded::to_string([("payload", payload.to_string())])
            .expect("encode form")
            .into_bytes();
        let request = signed_request(&harness, "application/x-www-form-urlencoded", body);

        let response = router(harness.state.clone()).oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        harness.state.tasks.drain(Duration::from_secs(5)).await;

        let user = UserId("U1".to_owned());
        let open = harness.shifts.has_open_shift_today(&user, &RequestContext::default()).await;
        assert!(open.expect("lookup"));
        assert_eq!(harness.api.posted().len(), 1);
    }

    #[tokio::test]
    async fn redelivered_events_are_acked_without_processing() {
        let harness = harness();
        let mut request = signed_request(&harness, "application/json", menu_event());
        request.headers_mut().insert(RETRY_HEADER, "1".parse().expect("header"));

        let response = router(harness.state.clone()).oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        harness.state.tasks.drain(Duration::from_secs(1)).await;
        assert!(harness.api.posted().is_empty());
    }
}
