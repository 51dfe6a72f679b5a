//! Gemini Live API client implementation.
//!
//! This module provides the Gemini Live client that implements the `BaseRealtime` trait
//! using the `BidiGenerateContent` WebSocket API.
//!
//! # API Reference
//!
//! - Endpoint: `wss://generativelanguage.googleapis.com/ws/...BidiGenerateContent?key=<key>`
//! - Protocol: WebSocket with JSON messages (text or binary frames)
//! - Input audio: PCM 16-bit, 16kHz, mono, little-endian, base64 encoded
//! - Output audio: PCM 16-bit, 24kHz, mono, little-endian, base64 encoded
//!
//! # Connection Task
//!
//! After setup, one spawned task owns the socket. It multiplexes outgoing
//! requests, incoming server messages and finished tool calls. Tool calls run
//! on the task's own `JoinSet`, so a slow tool never stalls event relay, and
//! every pending call is aborted when the connection ends.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{FutureExt, Sink, SinkExt, Stream, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinSet};
use tokio_tungstenite::tungstenite::{self, Message};

use super::config::{SETUP_TIMEOUT_SECS, build_ws_url, qualified_model};
use super::messages::{
    AudioTranscriptionConfig, Blob, ClientContent, ClientMessage, Content, FunctionCall,
    FunctionResponse, GenerationConfig, Part, PrebuiltVoiceConfig, RealtimeInput,
    ServerMessage, SessionResumptionConfig, Setup, SpeechConfig, Tool, ToolResponse, VoiceConfig,
};
use crate::core::realtime::base::{
    BaseRealtime, LiveEvent, LiveEventStream, LiveRequest, LiveRequestQueue, RealtimeConfig,
    RealtimeConnection, RealtimeError, RealtimeResult, TranscriptRole,
};
use crate::core::tools::{ToolOutcome, ToolRegistry};

/// Channel capacity for requests and events.
const WS_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// Gemini Live Client
// =============================================================================

/// Gemini Live API client.
///
/// Stateless: every [`BaseRealtime::connect`] call opens an independent
/// session, so one instance is shared by all connections.
#[derive(Debug, Clone, Default)]
pub struct GeminiLive;

impl GeminiLive {
    pub fn new() -> Self {
        Self
    }
}

/// Build the first message of a session.
pub(crate) fn build_setup(config: &RealtimeConfig, tools: &ToolRegistry) -> Setup {
    let tools = if tools.is_empty() {
        Vec::new()
    } else {
        vec![Tool {
            function_declarations: tools.declarations(),
        }]
    };

    Setup {
        model: qualified_model(&config.model),
        generation_config: GenerationConfig {
            response_modalities: vec!["AUDIO".to_string()],
            speech_config: (!config.voice.is_empty()).then(|| SpeechConfig {
                voice_config: VoiceConfig {
                    prebuilt_voice_config: PrebuiltVoiceConfig {
                        voice_name: config.voice.clone(),
                    },
                },
            }),
        },
        system_instruction: (!config.instructions.is_empty()).then(|| Content {
            role: None,
            parts: vec![Part::text(config.instructions.clone())],
        }),
        tools,
        input_audio_transcription: AudioTranscriptionConfig::default(),
        output_audio_transcription: AudioTranscriptionConfig::default(),
        session_resumption: SessionResumptionConfig {
            handle: config.resume_handle.clone(),
        },
    }
}

/// Map a session request onto its wire message. `Close` has none.
pub(crate) fn to_client_message(request: LiveRequest) -> Option<ClientMessage> {
    match request {
        LiveRequest::Audio { data, mime_type } => {
            Some(ClientMessage::RealtimeInput(RealtimeInput {
                audio: Some(Blob::encode(mime_type, &data)),
                video: None,
            }))
        }
        LiveRequest::Video { data, mime_type } => {
            Some(ClientMessage::RealtimeInput(RealtimeInput {
                audio: None,
                video: Some(Blob::encode(mime_type, &data)),
            }))
        }
        LiveRequest::Text(text) | LiveRequest::SpeakText(text) => {
            Some(ClientMessage::ClientContent(ClientContent {
                turns: vec![Content::user(vec![Part::text(text)])],
                turn_complete: true,
            }))
        }
        LiveRequest::Close => None,
    }
}

fn parse_server_message(msg: &Message) -> Option<Result<ServerMessage, serde_json::Error>> {
    match msg {
        Message::Text(text) => Some(serde_json::from_str(text)),
        Message::Binary(data) => Some(serde_json::from_slice(data)),
        _ => None,
    }
}

async fn send_json<S>(sink: &mut S, message: &ClientMessage) -> RealtimeResult<()>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let json = serde_json::to_string(message)?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|e| RealtimeError::WebSocketError(e.to_string()))
}

async fn wait_for_setup<R>(stream: &mut R) -> RealtimeResult<()>
where
    R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(msg) = stream.next().await {
        let msg = msg.map_err(|e| RealtimeError::WebSocketError(e.to_string()))?;
        if let Message::Close(frame) = &msg {
            let reason = frame
                .as_ref()
                .map(|f| f.reason.as_str().to_string())
                .unwrap_or_default();
            return Err(RealtimeError::ConnectionClosed(format!(
                "closed during setup: {reason}"
            )));
        }
        match parse_server_message(&msg) {
            Some(Ok(parsed)) if parsed.setup_complete.is_some() => return Ok(()),
            Some(Ok(_)) => tracing::debug!("Ignoring message before setupComplete"),
            Some(Err(e)) => tracing::warn!("Failed to parse setup response: {}", e),
            None => {}
        }
    }
    Err(RealtimeError::ConnectionClosed(
        "stream ended during setup".to_string(),
    ))
}

#[async_trait]
impl BaseRealtime for GeminiLive {
    async fn connect(
        &self,
        config: RealtimeConfig,
        tools: ToolRegistry,
    ) -> RealtimeResult<RealtimeConnection> {
        if config.api_key.is_empty() && config.endpoint.is_none() {
            return Err(RealtimeError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }

        let url = build_ws_url(config.endpoint.as_deref(), &config.api_key)
            .map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))?;

        let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        let (mut ws_sink, mut ws_stream) = ws_stream.split();

        send_json(&mut ws_sink, &ClientMessage::Setup(build_setup(&config, &tools))).await?;

        tokio::time::timeout(
            Duration::from_secs(SETUP_TIMEOUT_SECS),
            wait_for_setup(&mut ws_stream),
        )
        .await
        .map_err(|_| RealtimeError::Timeout("waiting for setupComplete".to_string()))??;

        tracing::info!("Connected to Gemini Live API ({})", config);

        let (requests, request_rx) = LiveRequestQueue::channel(WS_CHANNEL_CAPACITY);
        let (event_tx, events) = LiveEventStream::channel(WS_CHANNEL_CAPACITY);

        let task = ConnectionTask {
            sink: ws_sink,
            stream: ws_stream,
            requests: request_rx,
            events: event_tx,
            tools,
            tool_tasks: JoinSet::new(),
            pending_calls: HashMap::new(),
        };
        tokio::spawn(task.run());

        Ok(RealtimeConnection { requests, events })
    }

    fn get_provider_info(&self) -> serde_json::Value {
        json!({
            "provider": "gemini",
            "api": "BidiGenerateContent",
            "response_modalities": ["AUDIO"],
            "supports_tools": true,
            "supports_session_resumption": true,
            "input_transcription": true,
            "output_transcription": true,
        })
    }
}

// =============================================================================
// Connection Task
// =============================================================================

/// Whether the loop keeps running after handling one item.
enum Flow {
    Continue,
    /// The session dropped its event stream
    Detached,
}

struct ConnectionTask<S, R> {
    sink: S,
    stream: R,
    requests: mpsc::Receiver<LiveRequest>,
    events: mpsc::Sender<RealtimeResult<LiveEvent>>,
    tools: ToolRegistry,
    tool_tasks: JoinSet<FunctionResponse>,
    pending_calls: HashMap<String, AbortHandle>,
}

impl<S, R> ConnectionTask<S, R>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin + Send + 'static,
    R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin + Send + 'static,
{
    async fn run(mut self) {
        let outcome: RealtimeResult<()> = loop {
            let step = tokio::select! {
                request = self.requests.recv() => match request {
                    Some(LiveRequest::Close) | None => break Ok(()),
                    Some(request) => self.handle_request(request).await,
                },

                msg = self.stream.next() => match msg {
                    Some(Ok(Message::Ping(payload))) => {
                        self.sink
                            .send(Message::Pong(payload))
                            .await
                            .map(|_| Flow::Continue)
                            .map_err(|e| RealtimeError::WebSocketError(e.to_string()))
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| format!("{} {}", u16::from(f.code), f.reason.as_str()))
                            .unwrap_or_else(|| "no close frame".to_string());
                        break Err(RealtimeError::ConnectionClosed(reason));
                    }
                    Some(Ok(msg)) => self.handle_server_frame(&msg).await,
                    Some(Err(e)) => break Err(RealtimeError::WebSocketError(e.to_string())),
                    None => break Err(RealtimeError::ConnectionClosed("stream ended".to_string())),
                },

                Some(joined) = self.tool_tasks.join_next(), if !self.tool_tasks.is_empty() => {
                    match joined {
                        Ok(response) => self.send_tool_response(response).await,
                        Err(e) if e.is_cancelled() => Ok(Flow::Continue),
                        Err(e) => {
                            tracing::error!("Tool task panicked: {}", e);
                            Ok(Flow::Continue)
                        }
                    }
                }
            };

            match step {
                Ok(Flow::Continue) => {}
                Ok(Flow::Detached) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        self.tool_tasks.abort_all();
        match outcome {
            Ok(()) => {
                tracing::info!("Gemini Live session closed");
                let _ = self.sink.send(Message::Close(None)).await;
            }
            Err(e) => {
                tracing::error!("Gemini Live connection ended: {}", e);
                let _ = self.events.send(Err(e)).await;
            }
        }
    }

    async fn emit(&self, event: LiveEvent) -> Flow {
        match self.events.send(Ok(event)).await {
            Ok(()) => Flow::Continue,
            Err(_) => Flow::Detached,
        }
    }

    async fn handle_request(&mut self, request: LiveRequest) -> RealtimeResult<Flow> {
        let echo = match &request {
            LiveRequest::Text(text) => Some(text.clone()),
            _ => None,
        };

        if let Some(message) = to_client_message(request) {
            send_json(&mut self.sink, &message).await?;
        }

        // Typed text never comes back as a transcription.
        if let Some(text) = echo {
            return Ok(self
                .emit(LiveEvent::Text {
                    role: TranscriptRole::User,
                    text,
                    partial: false,
                })
                .await);
        }
        Ok(Flow::Continue)
    }

    async fn handle_server_frame(&mut self, msg: &Message) -> RealtimeResult<Flow> {
        let message = match parse_server_message(msg) {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                tracing::warn!("Failed to parse server message: {}", e);
                return Ok(Flow::Continue);
            }
            None => return Ok(Flow::Continue),
        };

        if let Some(update) = message.session_resumption_update {
            tracing::debug!(
                "Session resumption update: resumable={}",
                update.resumable
            );
            if let Flow::Detached = self
                .emit(LiveEvent::SessionResumption {
                    handle: update.new_handle,
                    resumable: update.resumable,
                })
                .await
            {
                return Ok(Flow::Detached);
            }
        }

        if let Some(content) = message.server_content {
            for event in content.into_events() {
                if let Flow::Detached = self.emit(event).await {
                    return Ok(Flow::Detached);
                }
            }
        }

        if let Some(tool_call) = message.tool_call {
            for call in tool_call.function_calls {
                if let Flow::Detached = self
                    .emit(LiveEvent::ToolCall {
                        name: call.name.clone(),
                    })
                    .await
                {
                    return Ok(Flow::Detached);
                }
                self.spawn_tool_call(call);
            }
        }

        if let Some(cancellation) = message.tool_call_cancellation {
            for id in cancellation.ids {
                if let Some(handle) = self.pending_calls.remove(&id) {
                    tracing::info!("Cancelling tool call {}", id);
                    handle.abort();
                }
            }
        }

        if let Some(go_away) = message.go_away {
            tracing::warn!("Gemini Live go-away, time left: {:?}", go_away.time_left);
            return Ok(self
                .emit(LiveEvent::GoAway {
                    time_left: go_away.time_left,
                })
                .await);
        }

        Ok(Flow::Continue)
    }

    fn spawn_tool_call(&mut self, call: FunctionCall) {
        let tool = self.tools.get(&call.name);
        let id = call.id.clone();
        let name = call.name;

        tracing::info!("Tool call: name={} id={:?}", name, id);

        let handle = self.tool_tasks.spawn(async move {
            let result = match tool {
                Some(tool) => {
                    let outcome = match AssertUnwindSafe(tool.invoke()).catch_unwind().await {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            tracing::error!("Tool {} panicked", name);
                            ToolOutcome::Failed("the tool crashed".to_string())
                        }
                    };
                    tracing::info!("Tool {} finished: generated={}", name, outcome.is_generated());
                    outcome.text()
                }
                None => {
                    tracing::warn!("Engine called unknown tool: {}", name);
                    format!("Unknown tool: {name}")
                }
            };
            FunctionResponse {
                id,
                name,
                response: json!({ "result": result }),
            }
        });

        if let Some(id) = call.id {
            self.pending_calls.insert(id, handle);
        }
    }

    async fn send_tool_response(&mut self, response: FunctionResponse) -> RealtimeResult<Flow> {
        if let Some(id) = &response.id {
            self.pending_calls.remove(id);
        }
        let message = ClientMessage::ToolResponse(ToolResponse {
            function_responses: vec![response],
        });
        send_json(&mut self.sink, &message).await?;
        Ok(Flow::Continue)
    }
}
