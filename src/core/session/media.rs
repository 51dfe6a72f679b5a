//! Media workers: drain one channel each and forward to the engine.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::core::media::{FrameSlot, MediaChannel, VideoChunk};
use crate::core::realtime::LiveRequestQueue;
use crate::core::realtime::gemini::VIDEO_MIME_TYPE;
use crate::errors::session_error::SessionResult;

/// Forward audio chunks in arrival order until the channel is closed.
pub async fn run_audio_worker(
    audio: Arc<MediaChannel<Bytes>>,
    requests: LiveRequestQueue,
    mime_type: String,
) -> SessionResult<()> {
    let mut forwarded: u64 = 0;
    while let Some(chunk) = audio.pop().await {
        requests.send_audio(chunk, mime_type.as_str()).await?;
        forwarded += 1;
    }
    debug!(forwarded, stats = ?audio.stats(), "Audio worker stopped");
    Ok(())
}

/// Store each frame in the slot, then forward the same frame to the engine.
pub async fn run_video_worker(
    video: Arc<MediaChannel<VideoChunk>>,
    slot: Arc<FrameSlot>,
    requests: LiveRequestQueue,
) -> SessionResult<()> {
    let mut forwarded: u64 = 0;
    while let Some(chunk) = video.pop().await {
        slot.set(chunk.data.clone(), chunk.received_at);
        trace!(mode = %chunk.mode, bytes = chunk.data.len(), "Forwarding frame");
        requests.send_video(chunk.data, VIDEO_MIME_TYPE).await?;
        forwarded += 1;
    }
    debug!(forwarded, stats = ?video.stats(), "Video worker stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::realtime::LiveRequest;
    use tokio::time::Instant;

    #[tokio::test]
    async fn test_audio_worker_drains_then_stops() {
        let audio = Arc::new(MediaChannel::new("audio", 4));
        let (requests, mut rx) = LiveRequestQueue::channel(8);
        audio.push(Bytes::from_static(b"a"));
        audio.push(Bytes::from_static(b"b"));
        audio.close();
        audio.push(Bytes::from_static(b"late"));

        run_audio_worker(audio, requests, "audio/pcm;rate=16000".to_string())
            .await
            .unwrap();

        let mut seen = Vec::new();
        while let Ok(LiveRequest::Audio { data, mime_type }) = rx.try_recv() {
            assert_eq!(mime_type, "audio/pcm;rate=16000");
            seen.push(data);
        }
        assert_eq!(seen, vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
    }

    #[tokio::test]
    async fn test_video_worker_updates_slot_with_forwarded_frame() {
        let video = Arc::new(MediaChannel::new("video", 2));
        let slot = Arc::new(FrameSlot::new());
        let (requests, mut rx) = LiveRequestQueue::channel(8);
        let at = Instant::now();
        video.push(VideoChunk {
            data: Bytes::from_static(b"jpeg"),
            mode: "webcam".to_string(),
            received_at: at,
        });
        video.close();

        run_video_worker(video, slot.clone(), requests).await.unwrap();

        let frame = slot.get().unwrap();
        assert_eq!(frame.captured_at, at);
        match rx.try_recv() {
            Ok(LiveRequest::Video { data, mime_type }) => {
                assert_eq!(mime_type, VIDEO_MIME_TYPE);
                assert_eq!(data, frame.data);
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_worker_fails_when_engine_gone() {
        let audio = Arc::new(MediaChannel::new("audio", 2));
        let (requests, rx) = LiveRequestQueue::channel(1);
        drop(rx);
        audio.push(Bytes::from_static(b"a"));

        let result = run_audio_worker(audio, requests, "audio/pcm".to_string()).await;
        assert!(result.is_err());
    }
}
