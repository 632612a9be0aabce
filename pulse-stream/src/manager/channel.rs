//! Per-channel connection task.
//!
//! One task owns one channel: its stream, its state, and its single retry
//! timer. The task loops through connect → read → backoff until it is
//! aborted, the retry cap is reached, or a configuration error settles it.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::backoff::BackoffPolicy;
use crate::config::StreamConfig;
use crate::dispatch::EventDispatcher;
use crate::error::{StreamError, TransportError, TransportResult};
use crate::sse::{FrameDecoder, SseFrame};
use crate::token::TokenProvider;
use crate::transport::{channel_url, EventTransport, FrameStream};
use crate::types::{Channel, ChannelKey, ConnectionState, StatusListener};

/// State observable from outside the connection task.
pub(crate) struct ConnectionShared {
    state: RwLock<ConnectionState>,
    attempts: AtomicU32,
    last_heartbeat: Mutex<Option<Instant>>,
}

impl ConnectionShared {
    fn new() -> Self {
        Self {
            state: RwLock::new(ConnectionState::Disconnected),
            attempts: AtomicU32::new(0),
            last_heartbeat: Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn record_failure(&self) -> u32 {
        self.attempts.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn reset_attempts(&self) {
        self.attempts.store(0, Ordering::SeqCst);
    }

    pub(crate) fn last_heartbeat(&self) -> Option<Instant> {
        *self.last_heartbeat.lock()
    }

    fn touch_heartbeat(&self) {
        *self.last_heartbeat.lock() = Some(Instant::now());
    }
}

/// A live channel connection: shared state plus the task driving it.
pub(crate) struct ChannelConnection {
    shared: Arc<ConnectionShared>,
    task: JoinHandle<()>,
}

impl ChannelConnection {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn spawn(
        channel: Channel,
        config: StreamConfig,
        backoff: BackoffPolicy,
        transport: Arc<dyn EventTransport>,
        tokens: Arc<dyn TokenProvider>,
        dispatcher: EventDispatcher,
        status: Arc<RwLock<Option<StatusListener>>>,
        online_rx: watch::Receiver<bool>,
        initial_token: String,
    ) -> Self {
        let shared = Arc::new(ConnectionShared::new());
        let key = channel.key();

        let task = ChannelTask {
            channel,
            key,
            config,
            backoff,
            transport,
            tokens,
            dispatcher,
            status,
            online_rx,
            shared: Arc::clone(&shared),
            initial_token: Some(initial_token),
        };

        Self {
            shared,
            task: tokio::spawn(task.run()),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub(crate) fn shared(&self) -> Arc<ConnectionShared> {
        Arc::clone(&self.shared)
    }

    /// Tear the connection down.
    ///
    /// Aborting at the task's current await point drops the stream and any
    /// pending retry timer with it.
    pub(crate) fn shutdown(self) {
        self.task.abort();
    }
}

struct ChannelTask {
    channel: Channel,
    key: ChannelKey,
    config: StreamConfig,
    backoff: BackoffPolicy,
    transport: Arc<dyn EventTransport>,
    tokens: Arc<dyn TokenProvider>,
    dispatcher: EventDispatcher,
    status: Arc<RwLock<Option<StatusListener>>>,
    online_rx: watch::Receiver<bool>,
    shared: Arc<ConnectionShared>,
    /// Token pulled by the manager's synchronous guard, used for the first
    /// attempt only; reconnects pull fresh.
    initial_token: Option<String>,
}

impl ChannelTask {
    async fn run(mut self) {
        let mut retry_override: Option<Duration> = None;

        loop {
            if !*self.online_rx.borrow() && !self.wait_for_online_signal().await {
                return;
            }

            self.set_state(ConnectionState::Connecting);

            let token = match self.current_token() {
                Some(token) => token,
                None => {
                    let error = StreamError::MissingToken(self.key.clone());
                    if !self.settle_exhausted(error).await {
                        return;
                    }
                    continue;
                }
            };

            let url = match channel_url(&self.config.base_url, &self.channel, &token) {
                Ok(url) => url,
                Err(error) => {
                    if !self.settle_exhausted(error).await {
                        return;
                    }
                    continue;
                }
            };

            let error = match self.transport.connect(&url).await {
                Ok(stream) => {
                    self.shared.reset_attempts();
                    self.shared.touch_heartbeat();
                    self.set_state(ConnectionState::Connected);
                    self.dispatcher.dispatch_open(&self.key);
                    tracing::info!(channel = %self.key, "channel connected");

                    self.read_stream(stream, &mut retry_override).await
                }
                Err(error) => error,
            };

            let failures = self.shared.record_failure();
            tracing::warn!(
                channel = %self.key,
                error = %error,
                attempt = failures,
                "channel connection lost"
            );
            self.set_state(ConnectionState::Erroring);
            self.dispatcher
                .dispatch_error(&self.key, &StreamError::Transport(error));

            if failures >= self.config.max_attempts {
                tracing::warn!(
                    channel = %self.key,
                    attempts = failures,
                    "retry attempts exhausted; waiting for manual or network recovery"
                );
                self.set_state(ConnectionState::Exhausted);
                if !self.wait_for_online_signal().await {
                    return;
                }
                self.shared.reset_attempts();
                retry_override = None;
                continue;
            }

            let delay = retry_override
                .take()
                .unwrap_or_else(|| self.backoff.next_delay(failures - 1));
            if !self.wait_backoff(delay).await {
                return;
            }
        }
    }

    /// Read the open stream until it drops, dispatching frames in arrival
    /// order.
    async fn read_stream(
        &mut self,
        mut stream: FrameStream,
        retry_override: &mut Option<Duration>,
    ) -> TransportError {
        let mut decoder = FrameDecoder::new();

        loop {
            match next_chunk(&mut stream, self.config.heartbeat_timeout).await {
                Ok(Some(bytes)) => {
                    self.shared.touch_heartbeat();
                    for frame in decoder.feed(&bytes) {
                        self.handle_frame(frame, retry_override);
                    }
                }
                Ok(None) => {
                    if let Some(frame) = decoder.finish() {
                        self.handle_frame(frame, retry_override);
                    }
                    return TransportError::Interrupted("stream closed by server".to_string());
                }
                Err(error) => return error,
            }
        }
    }

    fn handle_frame(&self, frame: SseFrame, retry_override: &mut Option<Duration>) {
        if let Some(retry) = frame.retry {
            tracing::debug!(
                channel = %self.key,
                delay_ms = retry.as_millis() as u64,
                "server adjusted retry delay"
            );
            *retry_override = Some(retry);
        }
        self.dispatcher.dispatch_frame(&self.key, &frame);
    }

    /// Wait out the backoff delay.
    ///
    /// Going offline suspends the timer entirely; an online signal (after
    /// offline, or an explicit network-online nudge) retries immediately,
    /// bypassing the remaining delay. Returns `false` when the manager is
    /// gone.
    async fn wait_backoff(&mut self, delay: Duration) -> bool {
        // Mark the current value seen so a signal from before this wait
        // cannot short-circuit the delay.
        self.online_rx.borrow_and_update();

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            if !*self.online_rx.borrow() {
                return self.wait_for_online_signal().await;
            }

            tokio::select! {
                _ = &mut sleep => return true,
                changed = self.online_rx.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                    if *self.online_rx.borrow() {
                        return true;
                    }
                    // Went offline: loop back and suspend.
                }
            }
        }
    }

    /// Park until the next online signal. Returns `false` when the manager is
    /// gone.
    async fn wait_for_online_signal(&mut self) -> bool {
        self.online_rx.borrow_and_update();

        loop {
            if self.online_rx.changed().await.is_err() {
                return false;
            }
            if *self.online_rx.borrow() {
                return true;
            }
        }
    }

    /// Settle into `Exhausted` after a configuration error and wait for
    /// external intervention. Returns `false` when the manager is gone.
    async fn settle_exhausted(&mut self, error: StreamError) -> bool {
        tracing::warn!(channel = %self.key, error = %error, "channel requires intervention");
        self.set_state(ConnectionState::Exhausted);
        self.dispatcher.dispatch_error(&self.key, &error);

        if !self.wait_for_online_signal().await {
            return false;
        }
        self.shared.reset_attempts();
        true
    }

    fn current_token(&mut self) -> Option<String> {
        self.initial_token
            .take()
            .or_else(|| self.tokens.token())
            .filter(|token| !token.is_empty())
    }

    fn set_state(&self, state: ConnectionState) {
        self.shared.set_state(state);
        tracing::debug!(channel = %self.key, state = %state, "connection state changed");
        if let Some(listener) = &*self.status.read() {
            listener(&self.key, state);
        }
    }
}

async fn next_chunk(
    stream: &mut FrameStream,
    idle_limit: Option<Duration>,
) -> TransportResult<Option<Bytes>> {
    match idle_limit {
        Some(limit) => match tokio::time::timeout(limit, stream.next()).await {
            Ok(item) => item.transpose(),
            Err(_) => Err(TransportError::IdleTimeout(limit)),
        },
        None => stream.next().await.transpose(),
    }
}
