use super::*;
use crate::transport::{MockFrame, MockHandle, MockTransport};
use cody_types::Feed;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep, timeout};

const URL: &str = "wss://test.example/ws";

fn test_config() -> StreamConfig {
    StreamConfig::new(URL).with_reconnect(
        ReconnectConfig::new()
            .with_initial_delay(Duration::from_millis(100))
            .with_jitter(0.0),
    )
}

fn session_with(
    config: StreamConfig,
    token: TokenHandle,
) -> (StreamingSession<MockTransport>, MockHandle) {
    let transport = MockTransport::new(URL);
    let mock = transport.handle();
    let credentials = Arc::new(Credentials::new("abc", "s3cr3t").unwrap());
    (StreamingSession::new(config, credentials, token, transport), mock)
}

fn session(config: StreamConfig) -> (StreamingSession<MockTransport>, MockHandle) {
    session_with(config, TokenHandle::with_token("jwt-1"))
}

async fn events_until(
    rx: &mut UnboundedReceiver<StreamEvent>,
    done: impl Fn(&StreamEvent) -> bool,
) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    loop {
        let event = timeout(Duration::from_secs(60), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed");
        let finished = done(&event);
        events.push(event);
        if finished {
            return events;
        }
    }
}

fn heartbeats(mock: &MockHandle) -> Vec<StreamMessage> {
    mock.sent_messages()
        .into_iter()
        .filter(|m| m.msg_type == MessageType::Heartbeat)
        .collect()
}

#[test]
fn test_stream_config_builders() {
    let config = StreamConfig::default();
    assert_eq!(config.url, DEFAULT_WS_URL);
    assert_eq!(config.heartbeat_interval, Duration::from_secs(300));
    assert_eq!(config.heartbeat_poll, Duration::from_secs(1));
    assert_eq!(config.send_timeout, Duration::from_secs(5));
    assert!(config.restore_subscriptions);

    let config = StreamConfig::from_rest_base("https://api.example.com/")
        .unwrap()
        .with_heartbeat_interval(Duration::from_secs(30))
        .without_reconnect();
    assert_eq!(config.url, "wss://api.example.com/ws");
    assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
    assert!(!config.reconnect.should_reconnect(1));
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_cadence() {
    let config = test_config()
        .with_heartbeat_interval(Duration::from_secs(2))
        .with_heartbeat_poll(Duration::from_secs(1));
    let (session, mock) = session(config);
    let running = session.spawn();

    sleep(Duration::from_millis(1500)).await;
    assert_eq!(heartbeats(&mock).len(), 0, "no heartbeat before the interval");

    sleep(Duration::from_secs(1)).await;
    assert_eq!(heartbeats(&mock).len(), 1);

    sleep(Duration::from_secs(2)).await;
    let sent = heartbeats(&mock);
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], StreamMessage::heartbeat("jwt-1"));
    assert_eq!(mock.sent()[0], r#"{"Token":"jwt-1","Type":"H","Symbols":[]}"#);

    running.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_after_server_close() {
    let (mut session, mock) = session(test_config());
    mock.push_connection([MockFrame::Text("a".into()), MockFrame::Close]);
    mock.push_connection([MockFrame::Text("b".into())]);
    let mut events = session.take_event_receiver().unwrap();
    let running = session.spawn();

    let seen = events_until(&mut events, |e| *e == StreamEvent::Message("b".into())).await;
    assert_eq!(
        seen,
        vec![
            StreamEvent::Connected { url: URL.into(), connection: 1 },
            StreamEvent::Message("a".into()),
            StreamEvent::Disconnected { reason: DisconnectReason::ServerClosed },
            StreamEvent::Reconnecting { attempt: 1, delay: Duration::from_millis(100) },
            StreamEvent::Connected { url: URL.into(), connection: 2 },
            StreamEvent::Message("b".into()),
        ]
    );
    assert_eq!(mock.connect_count(), 2);
    assert_eq!(running.handle().state(), ConnectionState::Connected);

    running.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_backoff_resets_after_successful_connect() {
    let (mut session, mock) = session(test_config());
    mock.push_connection([MockFrame::Close]);
    mock.push_connection([MockFrame::Error("reset".into())]);
    let mut events = session.take_event_receiver().unwrap();
    let running = session.spawn();

    let seen = events_until(&mut events, |e| {
        matches!(e, StreamEvent::Connected { connection: 3, .. })
    })
    .await;
    let attempts: Vec<u32> = seen
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Reconnecting { attempt, .. } => Some(*attempt),
            _ => None,
        })
        .collect();
    assert_eq!(attempts, vec![1, 1]);
    assert!(seen.contains(&StreamEvent::Disconnected {
        reason: DisconnectReason::NetworkError("receive failed: reset".into())
    }));

    running.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_subscriptions_restored_after_reconnect() {
    let (mut session, mock) = session(test_config());
    let mut events = session.take_event_receiver().unwrap();
    let running = session.spawn();
    let handle = running.handle();

    events_until(&mut events, |e| matches!(e, StreamEvent::Connected { .. })).await;
    handle.subscribe(Feed::T, ["GARAN", " THYAO "]).await.unwrap();
    handle.subscribe(Feed::D, ["AKBNK"]).await.unwrap();
    handle.unsubscribe(Feed::T, ["GARAN"]).await.unwrap();
    assert_eq!(
        mock.sent_messages()[0],
        StreamMessage::subscribe("jwt-1", Feed::T, ["GARAN", "THYAO"])
    );

    mock.push_frame(MockFrame::Close);
    events_until(&mut events, |e| *e == StreamEvent::SubscriptionsRestored { count: 2 }).await;

    let sent = mock.sent_messages();
    assert_eq!(
        sent[sent.len() - 2..],
        [
            StreamMessage::subscribe("jwt-1", Feed::T, ["THYAO"]),
            StreamMessage::subscribe("jwt-1", Feed::D, ["AKBNK"]),
        ]
    );

    running.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_failed_restoration_reports_disconnect() {
    let (mut session, mock) = session(test_config());
    let mut events = session.take_event_receiver().unwrap();
    let running = session.spawn();
    let handle = running.handle();

    events_until(&mut events, |e| matches!(e, StreamEvent::Connected { .. })).await;
    handle.subscribe(Feed::T, ["GARAN"]).await.unwrap();

    // replay on the second connection fails
    mock.fail_next_sends(1);
    mock.push_frame(MockFrame::Close);

    let seen = events_until(&mut events, |e| {
        matches!(e, StreamEvent::Disconnected { reason: DisconnectReason::SendFailed(_) })
    })
    .await;
    assert!(
        matches!(seen[seen.len() - 2], StreamEvent::Connected { connection: 2, .. }),
        "{seen:?}"
    );
    let next = events_until(&mut events, |_| true).await;
    assert!(matches!(next[0], StreamEvent::Reconnecting { .. }));

    // the next connection replays the subscription
    events_until(&mut events, |e| *e == StreamEvent::SubscriptionsRestored { count: 1 }).await;
    assert_eq!(mock.connect_count(), 3);

    running.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_restoration_can_be_disabled() {
    let (mut session, mock) = session(test_config().with_restore_subscriptions(false));
    let mut events = session.take_event_receiver().unwrap();
    let running = session.spawn();
    let handle = running.handle();

    events_until(&mut events, |e| matches!(e, StreamEvent::Connected { .. })).await;
    handle.subscribe(Feed::Y, ["GARAN"]).await.unwrap();
    mock.push_frame(MockFrame::Close);
    events_until(&mut events, |e| matches!(e, StreamEvent::Connected { connection: 2, .. })).await;

    assert_eq!(mock.sent_messages().len(), 1);
    running.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_rebind_token_reconnects_with_new_token() {
    let (mut session, mock) = session(test_config());
    let mut events = session.take_event_receiver().unwrap();
    let running = session.spawn();
    let handle = running.handle();

    events_until(&mut events, |e| matches!(e, StreamEvent::Connected { .. })).await;
    handle.subscribe(Feed::T, ["GARAN"]).await.unwrap();
    handle.rebind_token("jwt-2").await.unwrap();

    let seen = events_until(&mut events, |e| {
        matches!(e, StreamEvent::SubscriptionsRestored { .. })
    })
    .await;
    assert_eq!(
        seen,
        vec![
            StreamEvent::Disconnected { reason: DisconnectReason::Requested },
            StreamEvent::Connected { url: URL.into(), connection: 2 },
            StreamEvent::SubscriptionsRestored { count: 1 },
        ]
    );

    let handshakes = mock.handshakes();
    assert_eq!(handshakes[0].token, "jwt-1");
    assert_eq!(handshakes[1].token, "jwt-2");
    assert_eq!(
        mock.sent_messages().last().unwrap(),
        &StreamMessage::subscribe("jwt-2", Feed::T, ["GARAN"])
    );

    running.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_close_stops_session() {
    let (mut session, mock) = session(test_config());
    let mut events = session.take_event_receiver().unwrap();
    let running = session.spawn();
    let handle = running.handle();

    events_until(&mut events, |e| matches!(e, StreamEvent::Connected { .. })).await;
    handle.close().await.unwrap();

    let seen = events_until(&mut events, |e| *e == StreamEvent::Closed).await;
    assert_eq!(
        seen,
        vec![
            StreamEvent::Disconnected { reason: DisconnectReason::Shutdown },
            StreamEvent::Closed,
        ]
    );
    assert_eq!(mock.close_count(), 1);
    assert_eq!(handle.state(), ConnectionState::Disconnected);
    assert!(handle.is_closed());

    // closing twice is fine, other commands are refused
    handle.close().await.unwrap();
    assert!(matches!(
        handle.subscribe(Feed::T, ["GARAN"]).await,
        Err(CodyError::ShuttingDown)
    ));

    running.join().await.unwrap();
    assert_eq!(mock.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_token_fails_fast() {
    let (mut session, mock) = session_with(test_config(), TokenHandle::new());
    let mut events = session.take_event_receiver().unwrap();

    let result = session.run().await;
    assert!(matches!(result, Err(CodyError::TokenMissing)));
    assert_eq!(mock.connect_attempts(), 0);

    let seen = events_until(&mut events, |e| *e == StreamEvent::Closed).await;
    assert!(matches!(seen[0], StreamEvent::ReconnectFailed { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_attempts_exhausted() {
    let config = test_config().with_reconnect(
        ReconnectConfig::new()
            .with_initial_delay(Duration::from_millis(100))
            .with_jitter(0.0)
            .with_max_attempts(2),
    );
    let (mut session, mock) = session(config);
    mock.fail_next_connects(10);
    let mut events = session.take_event_receiver().unwrap();

    let result = session.run().await;
    assert!(matches!(result, Err(CodyError::ConnectionFailed { .. })));
    assert_eq!(mock.connect_attempts(), 3);

    let seen = events_until(&mut events, |e| *e == StreamEvent::Closed).await;
    assert_eq!(seen.len(), 4);
    assert_eq!(
        seen[..2],
        [
            StreamEvent::Reconnecting { attempt: 1, delay: Duration::from_millis(100) },
            StreamEvent::Reconnecting { attempt: 2, delay: Duration::from_millis(200) },
        ]
    );
    assert!(matches!(seen[2], StreamEvent::ReconnectFailed { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_message_handler_receives_frames() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);

    let (session, mock) = session(test_config());
    let mut session = session.with_message_handler(move |text| sink.lock().push(text.to_string()));
    mock.push_connection([
        MockFrame::Text(r#"{"s":"GARAN"}"#.into()),
        MockFrame::Text(r#"{"s":"THYAO"}"#.into()),
        MockFrame::Close,
    ]);
    let mut events = session.take_event_receiver().unwrap();
    let running = session.spawn();

    let seen = events_until(&mut events, |e| matches!(e, StreamEvent::Disconnected { .. })).await;
    assert_eq!(*received.lock(), vec![r#"{"s":"GARAN"}"#, r#"{"s":"THYAO"}"#]);
    // frames went to the handler only
    assert!(!seen.iter().any(StreamEvent::is_message));

    running.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_send_failure_triggers_reconnect() {
    let (mut session, mock) = session(test_config());
    let mut events = session.take_event_receiver().unwrap();
    let running = session.spawn();
    let handle = running.handle();

    events_until(&mut events, |e| matches!(e, StreamEvent::Connected { .. })).await;
    mock.fail_next_sends(1);
    let result = handle.subscribe(Feed::T, ["GARAN"]).await;
    assert!(matches!(result, Err(CodyError::WebSocket(_))));

    let seen = events_until(&mut events, |e| matches!(e, StreamEvent::Connected { .. })).await;
    assert!(matches!(
        seen[0],
        StreamEvent::Disconnected { reason: DisconnectReason::SendFailed(_) }
    ));
    // the failed subscribe was never recorded
    assert!(!seen.iter().any(|e| matches!(e, StreamEvent::SubscriptionsRestored { .. })));

    running.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_while_waiting_to_reconnect() {
    let config = test_config().with_reconnect(
        ReconnectConfig::new()
            .with_initial_delay(Duration::from_secs(10))
            .with_jitter(0.0),
    );
    let (mut session, mock) = session(config);
    mock.push_connection([MockFrame::Close]);
    let mut events = session.take_event_receiver().unwrap();
    let running = session.spawn();
    let handle = running.handle();

    events_until(&mut events, |e| matches!(e, StreamEvent::Reconnecting { .. })).await;
    assert_eq!(handle.state(), ConnectionState::Reconnecting);

    handle.subscribe(Feed::Y, ["AKBNK"]).await.unwrap();
    assert!(handle.send_raw("ping").await.is_err());
    handle.reconnect().await.unwrap();

    events_until(&mut events, |e| *e == StreamEvent::SubscriptionsRestored { count: 1 }).await;
    assert_eq!(
        mock.sent_messages(),
        vec![StreamMessage::subscribe("jwt-1", Feed::Y, ["AKBNK"])]
    );

    running.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_rejects_empty_symbols() {
    let (session, mock) = session(test_config());
    let running = session.spawn();
    let handle = running.handle();

    let result = handle.subscribe(Feed::T, ["", "  "]).await;
    assert!(matches!(result, Err(CodyError::Configuration(_))));
    assert!(mock.sent().is_empty());

    running.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_command_times_out_when_not_served() {
    let (session, _mock) = session(test_config().with_send_timeout(Duration::from_millis(200)));
    let handle = session.handle();

    // nothing drains commands until the session runs
    let result = handle.send_raw("x").await;
    assert!(matches!(result, Err(CodyError::SendTimeout { .. })));
    drop(session);
}

#[tokio::test(start_paused = true)]
async fn test_events_dropped_without_receiver() {
    let (session, mock) = session(test_config());
    mock.push_connection([MockFrame::Text("a".into())]);
    let running = session.spawn();
    let handle = running.handle();

    handle.send_raw("hello").await.unwrap();
    assert_eq!(mock.sent(), vec!["hello".to_string()]);
    running.shutdown(Duration::from_secs(1)).await.unwrap();
}
