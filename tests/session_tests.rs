//! Live session tests
//!
//! Drive a full `Session` through its public surface: client frames go in
//! through the incoming stream, the test plays the conversational engine on
//! the other side of the request queue and event stream, and the
//! describe-scene tool is invoked the way the engine would.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::Message;
use bytes::Bytes;
use futures::channel::mpsc as client_mpsc;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};

use live_guide_gateway::config::{MediaConfig, UserProfile};
use live_guide_gateway::core::intent::IntentGate;
use live_guide_gateway::core::media::{FrameSlot, MediaChannel, PushOutcome};
use live_guide_gateway::core::realtime::{
    LiveEvent, LiveEventStream, LiveRequest, LiveRequestQueue, RealtimeConnection, RealtimeError,
    RealtimeResult, TranscriptRole,
};
use live_guide_gateway::core::session::{
    ClientLink, INTERRUPTED_MESSAGE, LiveMessageRoute, LiveOutgoingMessage, SPEAK_TEXT_PREFIX,
    Session, SessionIds, SessionOutcome, Worker,
};
use live_guide_gateway::core::tools::{
    DescribeSceneTool, LiveTool, NO_FRESH_FRAME_MESSAGE, SceneStoryGenerator, StoryError,
    ToolOutcome,
};

const STEP: Duration = Duration::from_secs(2);

struct StaticGenerator;

#[async_trait]
impl SceneStoryGenerator for StaticGenerator {
    async fn generate(&self, image: &Path, _profile: &UserProfile) -> Result<String, StoryError> {
        assert!(image.exists());
        Ok("A grand old opera house.".to_string())
    }
}

struct Harness {
    incoming: client_mpsc::UnboundedSender<Result<Message, axum::Error>>,
    requests: mpsc::Receiver<LiveRequest>,
    events: mpsc::Sender<RealtimeResult<LiveEvent>>,
    client: mpsc::Receiver<LiveMessageRoute>,
    gate: Arc<IntentGate>,
    slot: Arc<FrameSlot>,
    tool: DescribeSceneTool,
    session: JoinHandle<SessionOutcome>,
}

impl Harness {
    fn start() -> Self {
        let session = Session::new(
            SessionIds::for_connection("test"),
            &MediaConfig::default(),
            16000,
            None,
        );
        let gate = session.gate();
        let slot = session.frame_slot();
        let tool = DescribeSceneTool::new(
            gate.clone(),
            slot.clone(),
            Arc::new(StaticGenerator),
            UserProfile::default(),
            Duration::from_secs(3),
        );

        let (incoming_tx, incoming_rx) = client_mpsc::unbounded();
        let (link, client) = ClientLink::channel(64);
        let (requests, request_rx) = LiveRequestQueue::channel(64);
        let (event_tx, events) = LiveEventStream::channel(64);

        let session = tokio::spawn(session.run(
            incoming_rx,
            link,
            RealtimeConnection { requests, events },
        ));

        Self {
            incoming: incoming_tx,
            requests: request_rx,
            events: event_tx,
            client,
            gate,
            slot,
            tool,
            session,
        }
    }

    fn send(&self, message: serde_json::Value) {
        self.incoming
            .unbounded_send(Ok(Message::Text(message.to_string().into())))
            .unwrap();
    }

    async fn next_request(&mut self) -> LiveRequest {
        timeout(STEP, self.requests.recv())
            .await
            .expect("engine request timed out")
            .expect("request queue closed")
    }

    async fn next_client_message(&mut self) -> LiveOutgoingMessage {
        loop {
            match timeout(STEP, self.client.recv()).await {
                Ok(Some(LiveMessageRoute::Outgoing(message))) => return message,
                Ok(Some(LiveMessageRoute::Close)) => continue,
                Ok(None) => panic!("client channel closed"),
                Err(_) => panic!("client message timed out"),
            }
        }
    }

    async fn emit(&self, event: LiveEvent) {
        self.events.send(Ok(event)).await.unwrap();
    }

    /// Play the engine: forward typed text back as user text.
    async fn echo_text(&mut self) -> String {
        match self.next_request().await {
            LiveRequest::Text(text) => {
                self.emit(LiveEvent::Text {
                    role: TranscriptRole::User,
                    text: text.clone(),
                    partial: false,
                })
                .await;
                text
            }
            other => panic!("expected text request, got {other:?}"),
        }
    }

    async fn wait_for_gate(&self) {
        timeout(STEP, async {
            while !self.gate.is_open() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("intent gate never opened");
    }

    async fn finish(self) -> SessionOutcome {
        let Harness {
            incoming, session, ..
        } = self;
        drop(incoming);
        timeout(Duration::from_secs(5), session)
            .await
            .expect("session did not stop")
            .expect("session task panicked")
    }
}

fn video(bytes: &[u8]) -> serde_json::Value {
    use base64::prelude::*;
    json!({"type": "video", "data": BASE64_STANDARD.encode(bytes)})
}

#[tokio::test]
async fn test_describe_with_fresh_frame_generates_story() {
    let mut h = Harness::start();

    h.send(video(b"\xff\xd8frame"));
    assert!(matches!(h.next_request().await, LiveRequest::Video { .. }));
    assert!(!h.slot.is_empty());

    h.send(json!({"type": "text", "data": "Describe this place"}));
    assert_eq!(h.echo_text().await, "Describe this place");
    h.wait_for_gate().await;

    let outcome = h.tool.invoke().await;
    assert_eq!(
        outcome,
        ToolOutcome::Generated("A grand old opera house.".to_string())
    );

    h.finish().await;
}

#[tokio::test]
async fn test_describe_without_video_reports_no_fresh_frame() {
    let mut h = Harness::start();

    h.send(json!({"type": "text", "data": "what is this building?"}));
    h.echo_text().await;
    h.wait_for_gate().await;

    let outcome = h.tool.invoke().await;
    assert_eq!(outcome.text(), NO_FRESH_FRAME_MESSAGE);

    h.finish().await;
}

#[tokio::test(start_paused = true)]
async fn test_describe_with_stale_frame_reports_no_fresh_frame() {
    let mut h = Harness::start();

    h.send(video(b"\xff\xd8frame"));
    assert!(matches!(h.next_request().await, LiveRequest::Video { .. }));

    tokio::time::sleep(Duration::from_secs(5)).await;

    h.send(json!({"type": "text", "data": "Describe this landmark"}));
    h.echo_text().await;
    h.wait_for_gate().await;

    assert_eq!(h.tool.invoke().await.text(), NO_FRESH_FRAME_MESSAGE);

    h.finish().await;
}

#[test]
fn test_audio_channel_keeps_most_recent_fifty() {
    let channel = MediaChannel::new("audio", 50);
    let mut evicted = Vec::new();
    for i in 0..60u8 {
        if let PushOutcome::Evicted(old) = channel.push(i) {
            evicted.push(old);
        }
    }
    assert_eq!(evicted, (0..10).collect::<Vec<_>>());

    let retained: Vec<u8> = std::iter::from_fn(|| channel.try_pop()).collect();
    assert_eq!(retained, (10..60).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_turn_complete_relayed_once_and_gate_reset() {
    let mut h = Harness::start();

    h.send(json!({"type": "text", "data": "run describe_place"}));
    h.echo_text().await;
    h.wait_for_gate().await;

    h.emit(LiveEvent::TurnComplete).await;
    assert_eq!(
        h.next_client_message().await,
        LiveOutgoingMessage::TurnComplete { session_id: None }
    );
    assert!(!h.gate.is_open());

    // Nothing else queued for the client from that turn.
    assert!(
        timeout(Duration::from_millis(100), h.client.recv())
            .await
            .is_err()
    );

    h.finish().await;
}

#[tokio::test]
async fn test_gate_survives_repeated_invocations_within_turn() {
    let mut h = Harness::start();

    h.send(video(b"\xff\xd8frame"));
    h.next_request().await;
    h.send(json!({"type": "text", "data": "Describe this building"}));
    h.echo_text().await;
    h.wait_for_gate().await;

    for _ in 0..3 {
        assert!(h.tool.invoke().await.is_generated());
    }
    assert!(h.gate.is_open());

    h.emit(LiveEvent::Interrupted).await;
    h.emit(LiveEvent::TurnComplete).await;
    assert_eq!(
        h.next_client_message().await,
        LiveOutgoingMessage::Interrupted {
            data: INTERRUPTED_MESSAGE.to_string()
        }
    );
    assert!(matches!(
        h.next_client_message().await,
        LiveOutgoingMessage::TurnComplete { .. }
    ));
    assert!(!h.gate.is_open());

    h.finish().await;
}

#[tokio::test]
async fn test_relays_engine_events_in_order() {
    let mut h = Harness::start();

    h.emit(LiveEvent::SessionResumption {
        handle: Some("resume-1".to_string()),
        resumable: true,
    })
    .await;
    h.emit(LiveEvent::Audio(Bytes::from_static(&[1, 2, 3])))
        .await;
    h.emit(LiveEvent::Text {
        role: TranscriptRole::Assistant,
        text: "This is".to_string(),
        partial: true,
    })
    .await;
    h.emit(LiveEvent::TurnComplete).await;

    assert_eq!(
        h.next_client_message().await,
        LiveOutgoingMessage::SessionId {
            data: "resume-1".to_string()
        }
    );
    assert_eq!(
        h.next_client_message().await,
        LiveOutgoingMessage::Audio {
            data: "AQID".to_string()
        }
    );
    assert_eq!(
        h.next_client_message().await,
        LiveOutgoingMessage::Text {
            data: "This is".to_string()
        }
    );
    assert_eq!(
        h.next_client_message().await,
        LiveOutgoingMessage::TurnComplete {
            session_id: Some("resume-1".to_string())
        }
    );

    h.finish().await;
}

#[tokio::test]
async fn test_media_and_speak_text_forwarded_to_engine() {
    let mut h = Harness::start();

    h.send(json!({"type": "audio", "data": "AAEC"}));
    match h.next_request().await {
        LiveRequest::Audio { data, mime_type } => {
            assert_eq!(data.as_ref(), &[0, 1, 2]);
            assert_eq!(mime_type, "audio/pcm;rate=16000");
        }
        other => panic!("unexpected request: {other:?}"),
    }

    h.send(json!({"type": "not_a_type"}));
    h.send(json!({"type": "speak_text", "data": "Welcome to Vienna"}));
    match h.next_request().await {
        LiveRequest::SpeakText(text) => {
            assert_eq!(text, format!("{SPEAK_TEXT_PREFIX}Welcome to Vienna"))
        }
        other => panic!("unexpected request: {other:?}"),
    }

    h.finish().await;
}

#[tokio::test]
async fn test_narration_does_not_open_gate() {
    let mut h = Harness::start();

    h.send(json!({"type": "speak_text", "data": "Let me describe this building for you"}));
    assert!(matches!(h.next_request().await, LiveRequest::SpeakText(_)));
    h.emit(LiveEvent::Audio(Bytes::from_static(&[1, 2]))).await;
    h.next_client_message().await;
    assert!(!h.gate.is_open());

    h.finish().await;
}

#[tokio::test]
async fn test_typed_request_opens_gate_without_echo() {
    let mut h = Harness::start();

    h.send(json!({"type": "text", "data": "What is this landmark?"}));
    assert!(matches!(h.next_request().await, LiveRequest::Text(_)));
    // No engine echo yet; a tool call arriving now must already pass the gate.
    assert!(h.gate.is_open());

    h.finish().await;
}

#[tokio::test]
async fn test_engine_failure_cancels_session() {
    let mut h = Harness::start();

    let failed_at = Instant::now();
    h.events
        .send(Err(RealtimeError::ConnectionClosed("1011 internal".to_string())))
        .await
        .unwrap();

    assert_eq!(
        h.next_client_message().await,
        LiveOutgoingMessage::Error {
            data: "model_connection_closed".to_string()
        }
    );
    // Close route follows the error once every worker has stopped.
    assert!(matches!(
        timeout(STEP, h.client.recv()).await,
        Ok(Some(LiveMessageRoute::Close))
    ));
    // Media workers left on the channel sentinel, well before the 2 s abort.
    assert!(
        failed_at.elapsed() < Duration::from_secs(1),
        "workers were aborted instead of draining: {:?}",
        failed_at.elapsed()
    );

    // The engine is told to finish and every request sender is dropped.
    let mut saw_close = false;
    loop {
        match timeout(STEP, h.requests.recv()).await {
            Ok(Some(LiveRequest::Close)) => saw_close = true,
            Ok(Some(_)) => {}
            Ok(None) => break,
            Err(_) => panic!("request queue still held open"),
        }
    }
    assert!(saw_close);

    let outcome = timeout(STEP, h.session).await.unwrap().unwrap();
    match outcome {
        SessionOutcome::Failed { worker, error } => {
            assert_eq!(worker, Worker::Response);
            assert_eq!(error.client_code().as_str(), "model_connection_closed");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_engine_stream_end_is_connection_loss() {
    let mut h = Harness::start();
    let (closed_tx, _) = mpsc::channel(1);
    // Dropping the only event sender ends the engine stream.
    drop(std::mem::replace(&mut h.events, closed_tx));

    assert_eq!(
        h.next_client_message().await,
        LiveOutgoingMessage::Error {
            data: "model_connection_closed".to_string()
        }
    );
}

#[tokio::test]
async fn test_client_disconnect_ends_session_quietly() {
    let mut h = Harness::start();
    h.send(json!({"type": "end"}));
    h.incoming
        .unbounded_send(Ok(Message::Close(None)))
        .unwrap();

    let outcome = timeout(STEP, &mut h.session).await.unwrap().unwrap();
    assert!(matches!(
        outcome,
        SessionOutcome::Completed {
            worker: Worker::Ingress
        }
    ));
    assert!(!outcome.is_failure());

    // No error is sent to a client that already left.
    while let Ok(Some(route)) = timeout(Duration::from_millis(100), h.client.recv()).await {
        assert!(!matches!(
            route,
            LiveMessageRoute::Outgoing(LiveOutgoingMessage::Error { .. })
        ));
    }
}
