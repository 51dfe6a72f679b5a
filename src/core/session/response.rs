//! Response worker: relays engine events to the client through the turn tracker.

use tokio::select;
use tokio_util::sync::CancellationToken;

use super::client_link::ClientLink;
use super::turn::TurnTracker;
use crate::core::realtime::{LiveEventStream, RealtimeError};
use crate::errors::session_error::SessionResult;

/// Consume engine events until cancelled.
///
/// The engine stream ending on its own is a connection loss.
pub async fn run_response_worker(
    mut events: LiveEventStream,
    mut tracker: TurnTracker,
    link: ClientLink,
    cancel: CancellationToken,
) -> SessionResult<()> {
    loop {
        let next = select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            next = events.next() => next,
        };

        match next {
            Some(Ok(event)) => {
                for message in tracker.handle(event) {
                    link.send(message).await;
                }
            }
            Some(Err(e)) => return Err(e.into()),
            None => {
                return Err(RealtimeError::ConnectionClosed("event stream ended".to_string()).into());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::intent::IntentGate;
    use crate::core::realtime::LiveEvent;
    use crate::core::session::messages::{LiveMessageRoute, LiveOutgoingMessage};
    use crate::errors::ErrorCode;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_relays_in_order_then_reports_stream_end() {
        let (tx, events) = LiveEventStream::channel(8);
        let (link, mut out) = ClientLink::channel(8);
        let tracker = TurnTracker::new(Arc::new(IntentGate::new()), None);

        tx.send(Ok(LiveEvent::Interrupted)).await.unwrap();
        tx.send(Ok(LiveEvent::TurnComplete)).await.unwrap();
        drop(tx);

        let err = run_response_worker(events, tracker, link, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.client_code(), ErrorCode::ModelConnectionClosed);

        assert!(matches!(
            out.recv().await,
            Some(LiveMessageRoute::Outgoing(LiveOutgoingMessage::Interrupted { .. }))
        ));
        assert!(matches!(
            out.recv().await,
            Some(LiveMessageRoute::Outgoing(LiveOutgoingMessage::TurnComplete { .. }))
        ));
    }

    #[tokio::test]
    async fn test_engine_error_is_fatal() {
        let (tx, events) = LiveEventStream::channel(8);
        let (link, _out) = ClientLink::channel(8);
        let tracker = TurnTracker::new(Arc::new(IntentGate::new()), None);
        tx.send(Err(RealtimeError::ProviderError("quota".into())))
            .await
            .unwrap();

        let err = run_response_worker(events, tracker, link, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.client_code(), ErrorCode::ServerError);
    }

    #[tokio::test]
    async fn test_cancel_wins_over_pending_stream() {
        let (_tx, events) = LiveEventStream::channel(8);
        let (link, _out) = ClientLink::channel(8);
        let tracker = TurnTracker::new(Arc::new(IntentGate::new()), None);
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(run_response_worker(events, tracker, link, cancel).await.is_ok());
    }
}
