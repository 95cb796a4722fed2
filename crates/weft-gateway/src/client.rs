//! Reconnecting gateway client.
//!
//! One `GatewayClient` owns one logical duplex connection. Callers issue
//! correlated request/response calls through it and subscribe to the server's
//! event push stream; on an unexpected close the client schedules reconnect
//! attempts according to its [`ReconnectPolicy`](weft_core::ReconnectPolicy).

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::metrics::{GatewayMetrics, GatewayMetricsSnapshot};
use crate::pending::PendingRequests;
use crate::subscribers::{
    ConnectionStatus, GatewayEvent, StatusChange, SubscriberSet, Subscription,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};
use uuid::Uuid;
use weft_core::WireMessage;

/// Identity challenge pushed by the server right after the socket opens.
const CHALLENGE_EVENT: &str = "connect.challenge";
/// Event the client answers the challenge with, echoing the nonce.
const CONNECT_EVENT: &str = "connect";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;
type WsSource = SplitStream<WsStream>;

struct ConnState {
    status: ConnectionStatus,
    /// Reconnect attempts since the last successful open.
    attempts: u32,
    /// Set by `disconnect()`; suppresses reconnect scheduling.
    intentional: bool,
}

struct Shared {
    config: GatewayConfig,
    state: Mutex<ConnState>,
    sink: tokio::sync::Mutex<Option<WsSink>>,
    pending: PendingRequests,
    events: SubscriberSet<GatewayEvent>,
    status_subs: SubscriberSet<StatusChange>,
    metrics: GatewayMetrics,
    reconnect_timer: Mutex<Option<JoinHandle<()>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

/// RPC transport over one logical gateway connection.
#[derive(Clone)]
pub struct GatewayClient {
    inner: Arc<Shared>,
}

impl GatewayClient {
    /// Create a client for the given configuration. The client is inert
    /// until [`connect`](Self::connect) is called.
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            inner: Arc::new(Shared {
                config,
                state: Mutex::new(ConnState {
                    status: ConnectionStatus::Disconnected,
                    attempts: 0,
                    intentional: false,
                }),
                sink: tokio::sync::Mutex::new(None),
                pending: PendingRequests::default(),
                events: SubscriberSet::new("event"),
                status_subs: SubscriberSet::new("status"),
                metrics: GatewayMetrics::default(),
                reconnect_timer: Mutex::new(None),
                reader: Mutex::new(None),
            }),
        }
    }

    /// Open the connection. Idempotent: a client that is already connecting
    /// or connected is left alone.
    pub async fn connect(&self) -> GatewayResult<()> {
        Shared::connect(&self.inner).await
    }

    /// Issue an RPC call and wait for its response.
    ///
    /// Fails immediately with [`GatewayError::NotConnected`] when the socket
    /// is not open, with [`GatewayError::Remote`] when the server reports an
    /// error, and with [`GatewayError::RequestTimeout`] when no response
    /// arrives within the configured window. Concurrent calls are
    /// independent: each gets its own correlation id and continuation.
    pub async fn request(&self, method: &str, params: Value) -> GatewayResult<Value> {
        self.request_with_timeout(method, params, self.inner.config.request_timeout())
            .await
    }

    /// Like [`request`](Self::request) with an explicit per-call window
    /// instead of the configured default.
    pub async fn request_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: std::time::Duration,
    ) -> GatewayResult<Value> {
        if self.status() != ConnectionStatus::Connected {
            return Err(GatewayError::NotConnected);
        }

        let id = Uuid::new_v4().to_string();
        let rx = self.inner.pending.register(&id);
        let frame = WireMessage::request(&id, method, params);

        if let Err(error) = self.inner.transmit(&frame).await {
            // A write failure settles only this request.
            self.inner.pending.forget(&id);
            return Err(error);
        }
        self.inner.metrics.record_request();
        debug!(method, id, "sent gateway request");

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            // The continuation was dropped without settling: the table was
            // cleared by a concurrent disconnect.
            Ok(Err(_)) => Err(GatewayError::Disconnected),
            Err(_) => {
                self.inner.pending.forget(&id);
                self.inner.metrics.record_timeout();
                warn!(method, id, "gateway request timed out");
                Err(GatewayError::RequestTimeout {
                    method: method.to_string(),
                    timeout,
                })
            }
        }
    }

    /// Close the connection intentionally: cancels any scheduled reconnect,
    /// closes the socket, and fails every outstanding request with
    /// "client disconnected".
    pub async fn disconnect(&self) {
        {
            let mut state = self.inner.state();
            state.intentional = true;
            state.status = ConnectionStatus::Disconnected;
        }
        if let Some(timer) = self.inner.reconnect_timer().take() {
            timer.abort();
        }
        if let Some(mut sink) = self.inner.sink.lock().await.take() {
            let _ = sink.close().await;
        }
        if let Some(reader) = self.inner.reader().take() {
            reader.abort();
        }
        self.inner.pending.fail_all(|| GatewayError::Disconnected);
        self.inner
            .notify_status(ConnectionStatus::Disconnected, None);
    }

    /// Subscribe to server-pushed events. Delivery is synchronous in socket
    /// arrival order; a failing handler never interrupts the others.
    pub fn on_event<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&GatewayEvent) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
            + Send
            + Sync
            + 'static,
    {
        self.inner.events.subscribe(handler)
    }

    /// Remove an event subscription.
    pub fn off_event(&self, subscription: Subscription) -> bool {
        self.inner.events.unsubscribe(subscription)
    }

    /// Subscribe to connection status transitions.
    pub fn on_status<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&StatusChange) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
            + Send
            + Sync
            + 'static,
    {
        self.inner.status_subs.subscribe(handler)
    }

    /// Remove a status subscription.
    pub fn off_status(&self, subscription: Subscription) -> bool {
        self.inner.status_subs.unsubscribe(subscription)
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.inner.state().status
    }

    /// Number of in-flight requests.
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.len()
    }

    /// Copy of the client's transport counters.
    pub fn metrics(&self) -> GatewayMetricsSnapshot {
        self.inner.metrics.snapshot()
    }
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, ConnState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn reconnect_timer(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.reconnect_timer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn reader(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.reader.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn notify_status(&self, status: ConnectionStatus, reason: Option<String>) {
        self.status_subs.dispatch(&StatusChange { status, reason });
    }

    async fn connect(this: &Arc<Self>) -> GatewayResult<()> {
        {
            let mut state = this.state();
            match state.status {
                ConnectionStatus::Connecting | ConnectionStatus::Connected => return Ok(()),
                ConnectionStatus::Disconnected | ConnectionStatus::Error => {}
            }
            state.status = ConnectionStatus::Connecting;
            state.intentional = false;
        }
        this.notify_status(ConnectionStatus::Connecting, None);

        match connect_async(this.config.url.as_str()).await {
            Ok((stream, _response)) => {
                let (sink, source) = stream.split();
                *this.sink.lock().await = Some(sink);
                {
                    let mut state = this.state();
                    state.status = ConnectionStatus::Connected;
                    state.attempts = 0;
                }
                this.notify_status(ConnectionStatus::Connected, None);
                debug!(url = %this.config.url, "gateway connected");

                let shared = Arc::clone(this);
                let handle = tokio::spawn(async move { shared.read_loop(source).await });
                if let Some(stale) = this.reader().replace(handle) {
                    stale.abort();
                }
                Ok(())
            }
            Err(error) => {
                {
                    this.state().status = ConnectionStatus::Error;
                }
                warn!(url = %this.config.url, %error, "gateway dial failed");
                this.notify_status(ConnectionStatus::Error, Some(error.to_string()));
                Shared::schedule_reconnect(this);
                Err(GatewayError::Transport(error.to_string()))
            }
        }
    }

    async fn read_loop(self: Arc<Self>, mut source: WsSource) {
        let mut close_reason: Option<String> = None;
        while let Some(message) = source.next().await {
            match message {
                Ok(WsMessage::Text(text)) => self.handle_frame(&text).await,
                Ok(WsMessage::Close(frame)) => {
                    close_reason = frame
                        .map(|f| f.reason.to_string())
                        .filter(|reason| !reason.is_empty());
                    break;
                }
                Ok(_) => {}
                Err(error) => {
                    close_reason = Some(error.to_string());
                    break;
                }
            }
        }
        Shared::handle_socket_closed(&self, close_reason).await;
    }

    async fn handle_socket_closed(this: &Arc<Self>, reason: Option<String>) {
        *this.sink.lock().await = None;
        if this.state().intentional {
            // disconnect() already transitioned state and notified.
            return;
        }
        {
            this.state().status = ConnectionStatus::Disconnected;
        }
        debug!(reason = reason.as_deref().unwrap_or("none"), "gateway connection lost");
        this.notify_status(ConnectionStatus::Disconnected, reason);
        Shared::schedule_reconnect(this);
    }

    /// Dispatch one inbound frame. Malformed payloads are logged and dropped
    /// without touching pending requests or connection state.
    async fn handle_frame(&self, raw: &str) {
        let frame = match WireMessage::from_json(raw) {
            Ok(frame) => frame,
            Err(error) => {
                warn!(%error, "dropping malformed gateway frame");
                return;
            }
        };

        match frame {
            WireMessage::Res {
                id,
                ok,
                payload,
                error,
            } => {
                self.metrics.record_response();
                let result = if ok {
                    Ok(payload.unwrap_or(Value::Null))
                } else {
                    Err(GatewayError::Remote(
                        error.unwrap_or_else(|| "request failed".to_string()),
                    ))
                };
                self.pending.settle(&id, result);
            }
            WireMessage::Event { event, payload } => {
                if event == CHALLENGE_EVENT {
                    self.answer_challenge(&payload).await;
                    return;
                }
                self.metrics.record_event();
                self.events.dispatch(&GatewayEvent { event, payload });
            }
            WireMessage::Req { method, .. } => {
                debug!(method, "ignoring inbound request frame");
            }
        }
    }

    /// Answer the identity challenge with an event echoing the nonce. Runs
    /// outside the correlation table.
    async fn answer_challenge(&self, payload: &Value) {
        let Some(nonce) = payload.get("nonce").and_then(Value::as_str) else {
            warn!("challenge event without nonce, ignoring");
            return;
        };
        let mut reply = json!({ "nonce": nonce });
        if let Some(token) = &self.config.token {
            reply["auth"] = json!({ "token": token });
        }
        let frame = WireMessage::event(CONNECT_EVENT, reply);
        if let Err(error) = self.transmit(&frame).await {
            warn!(%error, "failed answering connect challenge");
        }
    }

    async fn transmit(&self, frame: &WireMessage) -> GatewayResult<()> {
        let raw = frame.to_json()?;
        let mut sink = self.sink.lock().await;
        match sink.as_mut() {
            Some(sink) => sink
                .send(WsMessage::Text(raw))
                .await
                .map_err(|error| GatewayError::Transport(error.to_string())),
            None => Err(GatewayError::NotConnected),
        }
    }

    /// Arm the single reconnect timer. A timer that is already pending is
    /// left in place.
    fn schedule_reconnect(this: &Arc<Self>) {
        let delay = {
            let mut state = this.state();
            if state.intentional {
                return;
            }
            let delay = this.config.reconnect.delay_for(state.attempts);
            state.attempts = state.attempts.saturating_add(1);
            delay
        };

        let mut timer = this.reconnect_timer();
        if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        this.metrics.record_reconnect();
        debug!(delay_ms = delay.as_millis() as u64, "scheduling gateway reconnect");

        let shared = Arc::clone(this);
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if shared.state().intentional {
                return;
            }
            // A failed attempt arms the next timer from inside connect().
            let _ = Shared::connect(&shared).await;
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_without_connection_fails_immediately() {
        let client = GatewayClient::new(GatewayConfig::new("ws://127.0.0.1:1"));
        let result = client.request("echo", json!({})).await;
        assert!(matches!(result, Err(GatewayError::NotConnected)));
        assert_eq!(client.pending_requests(), 0);
    }

    #[tokio::test]
    async fn status_starts_disconnected() {
        let client = GatewayClient::new(GatewayConfig::new("ws://127.0.0.1:1"));
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn disconnect_before_connect_is_harmless() {
        let client = GatewayClient::new(GatewayConfig::new("ws://127.0.0.1:1"));
        client.disconnect().await;
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
    }
}
