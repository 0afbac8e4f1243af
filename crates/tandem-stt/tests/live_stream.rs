//! Integration tests for the live STT session against an in-process fake
//! upstream WebSocket server.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tandem_stt::{LiveSttConfig, LiveSttSession, RawPcmFormat, SttError};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::protocol::Message;

/// What the fake upstream observed, reported back to the test.
#[derive(Debug)]
enum UpstreamEvent {
    Query(String),
    BinaryFrame(usize),
    CloseStream,
}

/// Spawns a fake STT upstream that answers every binary frame with a
/// recognition result (every third one empty) and reports what it sees.
async fn spawn_fake_upstream() -> (SocketAddr, mpsc::UnboundedReceiver<UpstreamEvent>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();

        let query_tx = events_tx.clone();
        let mut ws = accept_hdr_async(stream, move |req: &Request, resp: Response| {
            let _ = query_tx.send(UpstreamEvent::Query(
                req.uri().query().unwrap_or_default().to_string(),
            ));
            Ok(resp)
        })
        .await
        .unwrap();

        let mut frame_count = 0u32;
        while let Some(Ok(message)) = ws.next().await {
            match message {
                Message::Binary(bytes) => {
                    let _ = events_tx.send(UpstreamEvent::BinaryFrame(bytes.len()));
                    frame_count += 1;

                    // Every third frame recognizes nothing.
                    let transcript = if frame_count % 3 == 0 {
                        String::new()
                    } else {
                        format!("utterance {frame_count}")
                    };
                    let result = serde_json::json!({
                        "channel": {
                            "alternatives": [{
                                "transcript": transcript,
                                "words": [{"word": "x", "speaker": frame_count % 2}]
                            }]
                        }
                    });
                    if ws.send(Message::Text(result.to_string())).await.is_err() {
                        break;
                    }
                }
                Message::Text(text) if text.contains("CloseStream") => {
                    let _ = events_tx.send(UpstreamEvent::CloseStream);
                    let _ = ws.send(Message::Close(None)).await;
                    break;
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    (addr, events_rx)
}

fn bot_config(addr: SocketAddr) -> LiveSttConfig {
    LiveSttConfig {
        url: format!("ws://{addr}/v1/listen"),
        api_key: String::new(),
        model: "nova-2".to_string(),
        language: "ja".to_string(),
        smart_format: true,
        diarize: true,
        raw_pcm: Some(RawPcmFormat::linear16_16khz_mono()),
    }
}

#[tokio::test]
async fn raw_pcm_session_relays_frames_and_orders_utterances() {
    let (addr, mut upstream) = spawn_fake_upstream().await;
    let (session, mut utterances) = LiveSttSession::start(&bot_config(addr))
        .await
        .expect("session should start");

    // The upstream must have been told about the raw format explicitly.
    match upstream.recv().await {
        Some(UpstreamEvent::Query(query)) => {
            assert!(query.contains("encoding=linear16"), "query was: {query}");
            assert!(query.contains("sample_rate=16000"));
            assert!(query.contains("channels=1"));
        }
        other => panic!("expected query event, got {other:?}"),
    }

    // Arbitrary-length binary frames are accepted and forwarded verbatim.
    for len in [1usize, 320, 7, 4096] {
        session.send(vec![0u8; len]).await.expect("send should succeed");
    }

    for expected_len in [1usize, 320, 7, 4096] {
        match upstream.recv().await {
            Some(UpstreamEvent::BinaryFrame(len)) => assert_eq!(len, expected_len),
            other => panic!("expected binary frame, got {other:?}"),
        }
    }

    // Frames 1, 2, 4 produced text; frame 3 was empty and must not surface.
    for expected in ["utterance 1", "utterance 2", "utterance 4"] {
        let utterance = utterances.recv().await.expect("utterance should arrive");
        assert_eq!(utterance.text, expected);
    }

    session.finish().await;

    match upstream.recv().await {
        Some(UpstreamEvent::CloseStream) => {}
        other => panic!("finish should deliver CloseStream upstream, got {other:?}"),
    }

    // The utterance channel drains to closed after the upstream hangs up.
    assert!(utterances.recv().await.is_none());
}

#[tokio::test]
async fn send_after_finish_is_rejected() {
    let (addr, _upstream) = spawn_fake_upstream().await;
    let (session, _utterances) = LiveSttSession::start(&bot_config(addr))
        .await
        .expect("session should start");

    session.send(vec![0u8; 160]).await.expect("open session accepts frames");
    session.finish().await;
    session.finish().await; // idempotent

    match session.send(vec![0u8; 160]).await {
        Err(SttError::Closed) => {}
        other => panic!("send after finish must fail with Closed, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_upstream_fails_to_start() {
    // Bind to learn a free port, then release it before connecting.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    match LiveSttSession::start(&bot_config(addr)).await {
        Err(SttError::Connect(_)) => {}
        Ok(_) => panic!("start must fail when the upstream is unreachable"),
        Err(other) => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn upstream_disconnect_ends_the_utterance_stream() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        // One result, then an abrupt close.
        let result = serde_json::json!({
            "channel": {"alternatives": [{"transcript": "last words", "words": []}]}
        });
        let _ = ws.send(Message::Text(result.to_string())).await;
        let _ = ws.close(None).await;
    });

    let mut config = bot_config(addr);
    config.raw_pcm = None;
    let (_session, mut utterances) = LiveSttSession::start(&config)
        .await
        .expect("session should start");

    let utterance = utterances.recv().await.expect("one utterance expected");
    assert_eq!(utterance.text, "last words");
    assert_eq!(utterance.speaker, 0);

    // Mid-stream termination is treated as end-of-stream, not an error.
    assert!(utterances.recv().await.is_none());
}
