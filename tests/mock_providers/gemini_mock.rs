//! WebSocket Mock Server for the Gemini Live API
//!
//! Accepts one connection, records every client message, answers `setup`
//! with `setupComplete` and sends whatever frames the test scripts.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

/// How the mock answers the `setup` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupBehavior {
    /// Reply with `setupComplete`
    Accept,
    /// Close the socket with a policy violation
    Reject,
}

/// Frames the test asks the mock to send.
#[derive(Debug)]
pub enum MockFrame {
    Json(Value),
    Close { code: u16, reason: String },
}

/// A running mock Gemini Live server.
pub struct GeminiMockServer {
    pub addr: SocketAddr,
    received: mpsc::UnboundedReceiver<Value>,
    outgoing: mpsc::UnboundedSender<MockFrame>,
}

impl GeminiMockServer {
    pub async fn start(setup: SetupBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (received_tx, received) = mpsc::unbounded_channel();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<MockFrame>();

        tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let Ok(ws_stream) = accept_async(stream).await else {
                return;
            };
            let (mut write, mut read) = ws_stream.split();

            loop {
                tokio::select! {
                    msg = read.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            let Ok(value) = serde_json::from_str::<Value>(text.as_str()) else {
                                continue;
                            };
                            let is_setup = value.get("setup").is_some();
                            let _ = received_tx.send(value);
                            if is_setup {
                                match setup {
                                    SetupBehavior::Accept => {
                                        let reply = json!({"setupComplete": {}});
                                        if write.send(Message::Text(reply.to_string().into())).await.is_err() {
                                            break;
                                        }
                                    }
                                    SetupBehavior::Reject => {
                                        let frame = CloseFrame {
                                            code: CloseCode::Policy,
                                            reason: "invalid model".into(),
                                        };
                                        let _ = write.send(Message::Close(Some(frame))).await;
                                        break;
                                    }
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                        Some(Ok(_)) => {}
                    },
                    frame = outgoing_rx.recv() => match frame {
                        Some(MockFrame::Json(value)) => {
                            if write.send(Message::Text(value.to_string().into())).await.is_err() {
                                break;
                            }
                        }
                        Some(MockFrame::Close { code, reason }) => {
                            let frame = CloseFrame {
                                code: CloseCode::from(code),
                                reason: reason.into(),
                            };
                            let _ = write.send(Message::Close(Some(frame))).await;
                            break;
                        }
                        None => break,
                    },
                }
            }
        });

        Self {
            addr,
            received,
            outgoing,
        }
    }

    /// Endpoint to configure the client with.
    pub fn endpoint(&self) -> String {
        format!("ws://{}/live", self.addr)
    }

    pub fn send(&self, value: Value) {
        let _ = self.outgoing.send(MockFrame::Json(value));
    }

    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.outgoing.send(MockFrame::Close {
            code,
            reason: reason.to_string(),
        });
    }

    /// Next message the client sent.
    pub async fn next_message(&mut self) -> Value {
        tokio::time::timeout(Duration::from_secs(5), self.received.recv())
            .await
            .expect("timed out waiting for client message")
            .expect("mock server stopped")
    }

    /// Next client message that has `key` at the top level.
    pub async fn next_message_with(&mut self, key: &str) -> Value {
        loop {
            let message = self.next_message().await;
            if message.get(key).is_some() {
                return message;
            }
        }
    }
}
