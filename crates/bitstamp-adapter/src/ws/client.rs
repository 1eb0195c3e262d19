/*
[INPUT]:  Relay URL, idle timeout, channel names to subscribe
[OUTPUT]: Decoded events and per-frame errors via bounded channels
[POS]:    WebSocket layer - real-time data stream handling
[UPDATE]: When changing the read loop, backpressure policy or cancellation
*/

use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::http::{BitstampError, Result};
use crate::ws::message::Event;

/// Bitstamp's Pusher relay
pub const STREAM_URL: &str = "wss://ws.pusherapp.com/app/de504dc5763aeef9ff52?protocol=7&client=js&version=2.1.6&flash=false";
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_CHANNEL_CAPACITY: usize = 100;
const OUTBOUND_CAPACITY: usize = 100;
const CLOSE_FRAME_TIMEOUT: Duration = Duration::from_secs(1);
const RAW_LOG_MAX_BYTES: usize = 1024;

/// Streaming client configuration
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub url: String,
    /// Longest wait for a frame before a `FrameTimeout` is reported
    pub idle_timeout: Duration,
    /// Capacity of the event and error channels
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: STREAM_URL.to_string(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl StreamConfig {
    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            idle_timeout,
            ..Self::default()
        }
    }
}

/// Lifecycle of a stream connection. Dialing happens inside
/// [`StreamConnection::connect`], so a connection is observed `Open` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Open,
    Closing,
    Closed,
}

/// One WebSocket connection to the relay with its background read loop.
///
/// Events and errors are delivered on bounded channels in socket order. When
/// a channel is full the loop waits for the consumer, but every such wait
/// also watches the cancellation token: `close()` always completes, and a
/// frame still pending delivery at that point is dropped.
#[derive(Debug)]
pub struct StreamConnection {
    outbound_tx: mpsc::Sender<WsMessage>,
    events_rx: Option<mpsc::Receiver<Event>>,
    errors_rx: Option<mpsc::Receiver<BitstampError>>,
    state_rx: watch::Receiver<StreamState>,
    cancel: CancellationToken,
    reader: Option<JoinHandle<()>>,
}

impl StreamConnection {
    /// Dial the relay and start the read loop
    pub async fn connect(config: StreamConfig) -> Result<Self> {
        info!(url = %config.url, "connecting stream");
        let (ws_stream, _response) = connect_async(config.url.as_str())
            .await
            .map_err(BitstampError::Connect)?;
        let (write, read) = ws_stream.split();
        info!(url = %config.url, "stream connected");
        Ok(Self::from_parts(read, write, &config))
    }

    /// Start the read loop over an already established socket
    pub fn from_parts<R, W>(read: R, write: W, config: &StreamConfig) -> Self
    where
        R: Stream<Item = std::result::Result<WsMessage, WsError>> + Unpin + Send + 'static,
        W: Sink<WsMessage, Error = WsError> + Unpin + Send + 'static,
    {
        let capacity = config.channel_capacity.max(1);
        let (events_tx, events_rx) = mpsc::channel(capacity);
        let (errors_tx, errors_rx) = mpsc::channel(capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (state_tx, state_rx) = watch::channel(StreamState::Open);
        let cancel = CancellationToken::new();

        let read_loop = ReadLoop {
            read,
            write,
            outbound_rx,
            events_tx,
            errors_tx,
            state_tx,
            cancel: cancel.clone(),
            idle_timeout: config.idle_timeout,
        };
        let reader = tokio::spawn(read_loop.run());

        Self {
            outbound_tx,
            events_rx: Some(events_rx),
            errors_rx: Some(errors_rx),
            state_rx,
            cancel,
            reader: Some(reader),
        }
    }

    /// Take the event receiver (once)
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<Event>> {
        self.events_rx.take()
    }

    /// Take the error receiver (once)
    pub fn take_errors(&mut self) -> Option<mpsc::Receiver<BitstampError>> {
        self.errors_rx.take()
    }

    /// Next event, `None` once the loop has ended or the receiver was taken
    pub async fn next_event(&mut self) -> Option<Event> {
        self.events_rx.as_mut()?.recv().await
    }

    /// Next error, `None` once the loop has ended or the receiver was taken
    pub async fn next_error(&mut self) -> Option<BitstampError> {
        self.errors_rx.as_mut()?.recv().await
    }

    pub fn state(&self) -> StreamState {
        *self.state_rx.borrow()
    }

    /// Watch lifecycle transitions
    pub fn state_changes(&self) -> watch::Receiver<StreamState> {
        self.state_rx.clone()
    }

    /// Send `pusher:subscribe` for a channel. Confirmation, if any, arrives
    /// later as an ordinary event.
    pub async fn subscribe(&self, channel: &str) -> Result<()> {
        self.send_event(&Event::subscribe(channel)).await?;
        info!(channel, "ws subscription sent");
        Ok(())
    }

    pub async fn ping(&self) -> Result<()> {
        self.send_event(&Event::ping()).await
    }

    pub async fn pong(&self) -> Result<()> {
        self.send_event(&Event::pong()).await
    }

    /// Send a raw text frame
    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.send_frame(WsMessage::Text(text.into().into())).await
    }

    async fn send_event(&self, event: &Event) -> Result<()> {
        self.send_frame(WsMessage::Text(event.to_frame()?.into())).await
    }

    async fn send_frame(&self, message: WsMessage) -> Result<()> {
        self.outbound_tx
            .send(message)
            .await
            .map_err(|_| BitstampError::NotConnected)
    }

    /// Stop the read loop and release the socket.
    ///
    /// Consumes the connection, so it cannot be closed twice.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(reader) = self.reader.take()
            && let Err(err) = reader.await
        {
            warn!(error = %err, "stream read loop ended abnormally");
        }
        info!("stream closed");
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum Delivery {
    Sent,
    ReceiverGone,
    Cancelled,
}

/// Send on a bounded channel unless cancellation wins first
async fn deliver<T>(tx: &mpsc::Sender<T>, item: T, cancel: &CancellationToken) -> Delivery {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Delivery::Cancelled,
        sent = tx.send(item) => match sent {
            Ok(()) => Delivery::Sent,
            Err(_) => Delivery::ReceiverGone,
        },
    }
}

enum Step {
    Continue,
    Stop,
}

struct ReadLoop<R, W> {
    read: R,
    write: W,
    outbound_rx: mpsc::Receiver<WsMessage>,
    events_tx: mpsc::Sender<Event>,
    errors_tx: mpsc::Sender<BitstampError>,
    state_tx: watch::Sender<StreamState>,
    cancel: CancellationToken,
    idle_timeout: Duration,
}

impl<R, W> ReadLoop<R, W>
where
    R: Stream<Item = std::result::Result<WsMessage, WsError>> + Unpin,
    W: Sink<WsMessage, Error = WsError> + Unpin,
{
    async fn run(mut self) {
        loop {
            // A fresh deadline is armed on every iteration.
            let incoming = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                outbound = self.outbound_rx.recv() => {
                    match outbound {
                        Some(message) => match self.write_frame(message).await {
                            Step::Continue => continue,
                            Step::Stop => break,
                        },
                        None => break,
                    }
                }
                incoming = tokio::time::timeout(self.idle_timeout, self.read.next()) => incoming,
            };

            let step = match incoming {
                Err(_elapsed) => {
                    self.report(BitstampError::FrameTimeout {
                        idle: self.idle_timeout,
                    })
                    .await
                }
                Ok(None) => {
                    self.report(BitstampError::Frame("connection closed".to_string()))
                        .await;
                    Step::Stop
                }
                Ok(Some(Err(err))) => self.read_failed(err).await,
                Ok(Some(Ok(message))) => self.handle_message(message).await,
            };

            if let Step::Stop = step {
                break;
            }
        }

        // Senders see NotConnected from here on.
        self.outbound_rx.close();
        self.state_tx.send_replace(StreamState::Closing);
        self.shutdown().await;
    }

    async fn write_frame(&mut self, message: WsMessage) -> Step {
        let sent = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Step::Stop,
            sent = self.write.send(message) => sent,
        };
        match sent {
            Ok(()) => Step::Continue,
            Err(err) => self.read_failed(err).await,
        }
    }

    async fn read_failed(&mut self, err: WsError) -> Step {
        let fatal = matches!(err, WsError::ConnectionClosed | WsError::AlreadyClosed);
        let step = self.report(BitstampError::Frame(err.to_string())).await;
        if fatal { Step::Stop } else { step }
    }

    async fn handle_message(&mut self, message: WsMessage) -> Step {
        let text = match message {
            WsMessage::Text(text) => text.to_string(),
            WsMessage::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => text,
                Err(err) => {
                    return self
                        .report(BitstampError::Decode {
                            message: err.to_string(),
                            frame: String::from_utf8_lossy(err.as_bytes()).into_owned(),
                        })
                        .await;
                }
            },
            WsMessage::Close(frame) => {
                debug!(?frame, "close frame received");
                self.report(BitstampError::Frame("connection closed by peer".to_string()))
                    .await;
                return Step::Stop;
            }
            WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {
                return Step::Continue;
            }
        };

        match Event::from_frame(&text) {
            Ok(event) => {
                debug!(event = %event.event, "event received");
                match deliver(&self.events_tx, event, &self.cancel).await {
                    Delivery::Sent => Step::Continue,
                    Delivery::ReceiverGone | Delivery::Cancelled => Step::Stop,
                }
            }
            Err(err) => self.report(err).await,
        }
    }

    /// Publish a non-fatal error; only cancellation stops the loop here
    async fn report(&mut self, err: BitstampError) -> Step {
        match &err {
            BitstampError::Decode { message, frame } => {
                warn!(error = %message, bytes = frame.len(), "ws frame decode failed");
                debug!(frame = %truncate_for_log(frame, RAW_LOG_MAX_BYTES), "undecodable frame");
            }
            other => warn!(error = %other, "ws frame error"),
        }

        match deliver(&self.errors_tx, err, &self.cancel).await {
            Delivery::Cancelled => Step::Stop,
            Delivery::Sent | Delivery::ReceiverGone => Step::Continue,
        }
    }

    async fn shutdown(mut self) {
        let close = self.write.send(WsMessage::Close(None));
        if tokio::time::timeout(CLOSE_FRAME_TIMEOUT, close).await.is_err() {
            debug!("close frame not flushed before timeout");
        }
        drop(self.outbound_rx);
        self.state_tx.send_replace(StreamState::Closed);
    }
}

fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + 3);
    out.push_str(&value[..end]);
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use serde_json::Value;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    type Inbound = std::result::Result<WsMessage, WsError>;

    /// In-memory socket: frames pushed on the returned sender are read by the
    /// loop, frames written by the loop land on the returned receiver.
    struct SimulatedSocket {
        inbound: mpsc::UnboundedSender<Inbound>,
        written: mpsc::UnboundedReceiver<WsMessage>,
    }

    fn simulated(config: &StreamConfig) -> (StreamConnection, SimulatedSocket) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<Inbound>();
        let (written_tx, written_rx) = mpsc::unbounded_channel::<WsMessage>();

        let read = Box::pin(stream::unfold(inbound_rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        }));
        let write = Box::pin(futures_util::sink::unfold(
            written_tx,
            |tx, message: WsMessage| async move {
                let _ = tx.send(message);
                Ok::<_, WsError>(tx)
            },
        ));

        let connection = StreamConnection::from_parts(read, write, config);
        (
            connection,
            SimulatedSocket {
                inbound: inbound_tx,
                written: written_rx,
            },
        )
    }

    fn text(frame: &str) -> Inbound {
        Ok(WsMessage::Text(frame.to_string().into()))
    }

    fn config(idle_timeout: Duration, channel_capacity: usize) -> StreamConfig {
        StreamConfig {
            url: "ws://simulated".to_string(),
            idle_timeout,
            channel_capacity,
        }
    }

    #[tokio::test]
    async fn test_subscribe_then_event_delivered() {
        let (mut connection, mut socket) = simulated(&config(WAIT, 10));
        let mut errors = connection.take_errors().unwrap();

        connection.subscribe("order_book").await.unwrap();
        let written = timeout(WAIT, socket.written.recv()).await.unwrap().unwrap();
        let WsMessage::Text(written) = written else {
            panic!("expected text frame");
        };
        let written: Value = serde_json::from_str(written.as_str()).unwrap();
        assert_eq!(
            written,
            serde_json::json!({"event": "pusher:subscribe", "data": {"channel": "order_book"}})
        );

        socket
            .inbound
            .send(text(r#"{"event":"data","data":"{\"bids\":[]}"}"#))
            .unwrap();

        let event = timeout(WAIT, connection.next_event()).await.unwrap().unwrap();
        assert_eq!(
            event,
            Event::new("data", Value::String(r#"{"bids":[]}"#.to_string()))
        );
        assert!(errors.try_recv().is_err());

        connection.close().await;
    }

    #[tokio::test]
    async fn test_decode_error_does_not_stop_loop() {
        let (mut connection, socket) = simulated(&config(WAIT, 10));

        socket.inbound.send(text("this is not json")).unwrap();
        socket
            .inbound
            .send(text(r#"{"event":"trade","data":"{}"}"#))
            .unwrap();

        let err = timeout(WAIT, connection.next_error()).await.unwrap().unwrap();
        assert!(matches!(err, BitstampError::Decode { ref frame, .. } if frame == "this is not json"));

        let event = timeout(WAIT, connection.next_event()).await.unwrap().unwrap();
        assert_eq!(event.event, "trade");

        let mut errors = connection.take_errors().unwrap();
        assert!(errors.try_recv().is_err());
        connection.close().await;
    }

    #[tokio::test]
    async fn test_read_error_is_reported_and_loop_continues() {
        let (mut connection, socket) = simulated(&config(WAIT, 10));

        socket
            .inbound
            .send(Err(WsError::Io(std::io::Error::other("socket hiccup"))))
            .unwrap();
        socket.inbound.send(text(r#"{"event":"after"}"#)).unwrap();

        let err = timeout(WAIT, connection.next_error()).await.unwrap().unwrap();
        assert!(matches!(err, BitstampError::Frame(_)));
        let event = timeout(WAIT, connection.next_event()).await.unwrap().unwrap();
        assert_eq!(event.event, "after");
        assert_eq!(connection.state(), StreamState::Open);

        connection.close().await;
    }

    #[tokio::test]
    async fn test_events_keep_socket_order() {
        let (mut connection, socket) = simulated(&config(WAIT, 4));

        for index in 0..20 {
            socket
                .inbound
                .send(text(&format!(r#"{{"event":"e{index}"}}"#)))
                .unwrap();
        }

        for index in 0..20 {
            let event = timeout(WAIT, connection.next_event()).await.unwrap().unwrap();
            assert_eq!(event.event, format!("e{index}"));
        }
        connection.close().await;
    }

    #[tokio::test]
    async fn test_idle_timeout_is_not_fatal() {
        let (mut connection, socket) = simulated(&config(Duration::from_millis(100), 10));

        let err = timeout(WAIT, connection.next_error()).await.unwrap().unwrap();
        assert!(matches!(err, BitstampError::FrameTimeout { idle } if idle == Duration::from_millis(100)));

        socket.inbound.send(text(r#"{"event":"late"}"#)).unwrap();
        let event = timeout(WAIT, connection.next_event()).await.unwrap().unwrap();
        assert_eq!(event.event, "late");

        connection.close().await;
    }

    #[tokio::test]
    async fn test_close_does_not_hang_on_stalled_consumer() {
        let (connection, mut socket) = simulated(&config(WAIT, 1));
        let mut state = connection.state_changes();

        for index in 0..5 {
            socket
                .inbound
                .send(text(&format!(r#"{{"event":"e{index}"}}"#)))
                .unwrap();
        }
        // Let the loop fill the channel and block on the next send.
        tokio::time::sleep(Duration::from_millis(100)).await;

        timeout(Duration::from_secs(2), connection.close())
            .await
            .expect("close must not wait for the consumer");

        assert_eq!(*state.borrow_and_update(), StreamState::Closed);
        let last = timeout(WAIT, socket.written.recv()).await.unwrap().unwrap();
        assert!(matches!(last, WsMessage::Close(None)));
    }

    #[tokio::test]
    async fn test_peer_close_ends_loop() {
        let (mut connection, socket) = simulated(&config(WAIT, 10));
        let mut state = connection.state_changes();

        socket.inbound.send(Ok(WsMessage::Close(None))).unwrap();

        let err = timeout(WAIT, connection.next_error()).await.unwrap().unwrap();
        assert!(matches!(err, BitstampError::Frame(_)));
        timeout(WAIT, state.wait_for(|s| *s == StreamState::Closed))
            .await
            .unwrap()
            .unwrap();

        assert!(matches!(
            connection.ping().await,
            Err(BitstampError::NotConnected)
        ));
        assert!(connection.next_event().await.is_none());
    }

    /// Sink whose writes never complete, like a peer that stopped reading
    fn stalled_sink() -> impl Sink<WsMessage, Error = WsError> + Unpin + Send + 'static {
        Box::pin(futures_util::sink::unfold((), |(), _message: WsMessage| async move {
            std::future::pending::<()>().await;
            Ok::<_, WsError>(())
        }))
    }

    #[tokio::test]
    async fn test_close_does_not_hang_on_stalled_write() {
        let read = stream::pending::<Inbound>();
        let connection = StreamConnection::from_parts(read, stalled_sink(), &config(WAIT, 10));

        connection.subscribe("order_book").await.unwrap();
        // Let the loop pick the frame up and block inside the write.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut state = connection.state_changes();
        timeout(Duration::from_secs(3), connection.close())
            .await
            .expect("close must not wait for a stalled socket write");
        assert_eq!(*state.borrow_and_update(), StreamState::Closed);
    }

    #[tokio::test]
    async fn test_sends_rejected_while_closing() {
        let read = stream::iter(vec![Ok(WsMessage::Close(None))]).chain(stream::pending());
        let connection = StreamConnection::from_parts(read, stalled_sink(), &config(WAIT, 10));
        let mut state = connection.state_changes();

        // The close frame write stalls, so the loop lingers in Closing.
        timeout(WAIT, state.wait_for(|s| *s != StreamState::Open))
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            connection.ping().await,
            Err(BitstampError::NotConnected)
        ));
        assert!(matches!(
            connection.send_text("{}").await,
            Err(BitstampError::NotConnected)
        ));

        timeout(WAIT, state.wait_for(|s| *s == StreamState::Closed))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_invalid_utf8_binary_frame_reported() {
        let (mut connection, socket) = simulated(&config(WAIT, 10));

        socket
            .inbound
            .send(Ok(WsMessage::Binary(vec![0xff, 0xfe, 0xfd].into())))
            .unwrap();
        socket
            .inbound
            .send(Ok(WsMessage::Binary(br#"{"event":"binary"}"#.to_vec().into())))
            .unwrap();

        let err = timeout(WAIT, connection.next_error()).await.unwrap().unwrap();
        assert!(matches!(err, BitstampError::Decode { ref message, .. } if message.contains("utf-8")));

        let event = timeout(WAIT, connection.next_event()).await.unwrap().unwrap();
        assert_eq!(event.event, "binary");
        assert_eq!(connection.state(), StreamState::Open);

        connection.close().await;
    }

    #[tokio::test]
    async fn test_ping_pong_and_raw_text_frames() {
        let (connection, mut socket) = simulated(&config(WAIT, 10));

        connection.ping().await.unwrap();
        connection.pong().await.unwrap();
        connection.send_text("{\"event\":\"custom\"}").await.unwrap();

        let mut frames = Vec::new();
        for _ in 0..3 {
            match timeout(WAIT, socket.written.recv()).await.unwrap().unwrap() {
                WsMessage::Text(frame) => frames.push(frame.to_string()),
                other => panic!("expected text frame, got {other:?}"),
            }
        }
        assert_eq!(
            frames,
            vec![
                r#"{"event":"pusher:ping","data":null}"#,
                r#"{"event":"pusher:pong","data":null}"#,
                r#"{"event":"custom"}"#,
            ]
        );
        connection.close().await;
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("abcdef", 3), "abc...");
        assert_eq!(truncate_for_log("ééé", 3), "é...");
    }
}
