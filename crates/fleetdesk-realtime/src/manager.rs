//! Realtime connection manager.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fleetdesk_core::{ListenerSet, RefCounts, Release, Subscription, TopicRegistry};
use fleetdesk_protocols::{CredentialSource, RealtimeError};

use crate::backoff::ReconnectPolicy;
use crate::message::{ControlMessage, InboundEvent, parse_inbound};
use crate::state::{ConnectionEvent, ConnectionState, ConnectionStatus};
use crate::transport::{ConnectRequest, Connector, TransportPair};

struct Shared {
    state: ConnectionState,
    attempt: u32,
    /// Bumped by every connect and disconnect. A driver whose generation is
    /// stale stops touching state.
    generation: u64,
    channels: RefCounts,
    outbound: Option<mpsc::UnboundedSender<ControlMessage>>,
    cancel: Option<CancellationToken>,
    last_error: Option<RealtimeError>,
}

struct Inner {
    url: String,
    policy: ReconnectPolicy,
    connector: Arc<dyn Connector>,
    credentials: Arc<dyn CredentialSource>,
    shared: Mutex<Shared>,
    topics: TopicRegistry<InboundEvent>,
    events: ListenerSet<ConnectionEvent>,
    status_tx: watch::Sender<ConnectionStatus>,
}

enum SessionEnd {
    Cancelled,
    Dropped(RealtimeError),
}

enum NextStep {
    Retry(Duration),
    Stop,
}

/// Owner of the single realtime connection.
///
/// Channel refcounts and topic subscriptions are local bookkeeping: they
/// survive reconnects and explicit disconnects, and every channel with a
/// nonzero count is rejoined whenever a transport comes up.
///
/// [`connect`](Self::connect) spawns the driver task and must be called from
/// within a tokio runtime. Dropping the manager stops the driver.
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(
        url: impl Into<String>,
        policy: ReconnectPolicy,
        connector: Arc<dyn Connector>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::default());
        Self {
            inner: Arc::new(Inner {
                url: url.into(),
                policy,
                connector,
                credentials,
                shared: Mutex::new(Shared {
                    state: ConnectionState::Disconnected,
                    attempt: 0,
                    generation: 0,
                    channels: RefCounts::new(),
                    outbound: None,
                    cancel: None,
                    last_error: None,
                }),
                topics: TopicRegistry::new(),
                events: ListenerSet::new(),
                status_tx,
            }),
        }
    }

    /// Start connecting. No-op while `Connecting` or `Connected`. From
    /// `Reconnecting` or `Disconnected` (including after exhaustion) the
    /// attempt counter is reset and a fresh cycle starts.
    pub fn connect(&self) {
        let (generation, cancel, events) = {
            let mut shared = self.inner.shared.lock();
            if matches!(
                shared.state,
                ConnectionState::Connecting | ConnectionState::Connected
            ) {
                return;
            }

            if let Some(previous) = shared.cancel.take() {
                previous.cancel();
            }
            shared.generation += 1;
            let cancel = CancellationToken::new();
            shared.cancel = Some(cancel.clone());
            shared.outbound = None;
            shared.attempt = 0;
            shared.last_error = None;
            let events = self.inner.set_state(&mut shared, ConnectionState::Connecting);
            (shared.generation, cancel, events)
        };

        self.inner.emit_all(events);
        tokio::spawn(drive(self.inner.clone(), generation, cancel));
    }

    /// Tear down the transport and cancel any pending reconnect. Channel and
    /// topic bookkeeping is kept.
    pub fn disconnect(&self) {
        let events = {
            let mut shared = self.inner.shared.lock();
            shared.generation += 1;
            if let Some(cancel) = shared.cancel.take() {
                cancel.cancel();
            }
            shared.outbound = None;
            self.inner.set_state(&mut shared, ConnectionState::Disconnected)
        };
        if !events.is_empty() {
            info!("Realtime disconnected");
        }
        self.inner.emit_all(events);
    }

    /// Take a reference on `channel`. The wire join is sent on the first
    /// reference, immediately when connected or on the next connect
    /// otherwise. Disposing the returned handle releases the reference.
    pub fn join_channel(&self, channel: impl Into<String>) -> Subscription {
        let channel = channel.into();
        {
            let mut shared = self.inner.shared.lock();
            if shared.channels.acquire(&channel) {
                debug!("Joining channel {}", channel);
                if let Some(outbound) = &shared.outbound {
                    let _ = outbound.send(ControlMessage::join(channel.as_str()));
                }
            }
        }

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.leave_channel(&channel);
            }
        })
    }

    /// Register `callback` for events on `topic`, in registration order.
    pub fn subscribe<F>(&self, topic: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&InboundEvent) + Send + Sync + 'static,
    {
        self.inner.topics.subscribe(topic, callback)
    }

    /// Register a listener for state changes, failed attempts, exhaustion
    /// and undecodable frames.
    pub fn on_event<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        self.inner.events.register(listener)
    }

    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status_tx.subscribe()
    }

    pub fn current_status(&self) -> ConnectionStatus {
        self.inner.status_tx.borrow().clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.shared.lock().state
    }

    pub fn attempt(&self) -> u32 {
        self.inner.shared.lock().attempt
    }

    /// Wait until the published status satisfies `predicate`. The current
    /// status is checked first.
    pub async fn wait_for<F>(&self, predicate: F) -> Result<ConnectionStatus, RealtimeError>
    where
        F: FnMut(&ConnectionStatus) -> bool,
    {
        let mut rx = self.status();
        let status = rx
            .wait_for(predicate)
            .await
            .map(|status| status.clone())
            .map_err(|_| RealtimeError::NotConnected)?;
        Ok(status)
    }

    pub async fn wait_for_state(
        &self,
        state: ConnectionState,
    ) -> Result<ConnectionStatus, RealtimeError> {
        self.wait_for(|status| status.state == state).await
    }

    pub fn channel_refcount(&self, channel: &str) -> usize {
        self.inner.shared.lock().channels.count(channel)
    }

    /// Channels with a nonzero refcount, sorted.
    pub fn joined_channels(&self) -> Vec<String> {
        self.inner.shared.lock().channels.names()
    }

    pub fn topic_subscribers(&self, topic: &str) -> usize {
        self.inner.topics.subscriber_count(topic)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        let mut shared = self.inner.shared.lock();
        shared.generation += 1;
        shared.outbound = None;
        if let Some(cancel) = shared.cancel.take() {
            cancel.cancel();
        }
    }
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.shared.lock().generation == generation
    }

    /// Move to `next` and publish the status. Must be called with the lock
    /// held; the returned events are emitted after it is released.
    fn set_state(&self, shared: &mut Shared, next: ConnectionState) -> Vec<ConnectionEvent> {
        let previous = shared.state;
        shared.state = next;
        self.status_tx.send_replace(ConnectionStatus {
            state: shared.state,
            attempt: shared.attempt,
            last_error: shared.last_error.clone(),
        });

        if previous == next {
            Vec::new()
        } else {
            debug!("Realtime {} -> {}", previous, next);
            vec![ConnectionEvent::StateChanged {
                from: previous,
                to: next,
            }]
        }
    }

    fn emit_all(&self, events: Vec<ConnectionEvent>) {
        for event in &events {
            let failed = self.events.emit(event);
            if failed > 0 {
                warn!("{} connection listener(s) panicked", failed);
            }
        }
    }

    /// Install the outbound queue and rejoin every held channel. Returns
    /// `None` when this driver has been superseded.
    fn on_connected(&self, generation: u64) -> Option<mpsc::UnboundedReceiver<ControlMessage>> {
        let (rx, events) = {
            let mut shared = self.shared.lock();
            if shared.generation != generation {
                return None;
            }

            let (tx, rx) = mpsc::unbounded_channel();
            let channels = shared.channels.names();
            for channel in &channels {
                let _ = tx.send(ControlMessage::join(channel.as_str()));
            }
            info!("Realtime connected, joining {} channel(s)", channels.len());

            shared.outbound = Some(tx);
            shared.attempt = 0;
            shared.last_error = None;
            (rx, self.set_state(&mut shared, ConnectionState::Connected))
        };
        self.emit_all(events);
        Some(rx)
    }

    fn on_connect_failed(&self, generation: u64, error: RealtimeError) -> NextStep {
        let (step, events) = {
            let mut shared = self.shared.lock();
            if shared.generation != generation {
                return NextStep::Stop;
            }

            shared.attempt += 1;
            let attempt = shared.attempt;
            warn!(
                "Realtime connect attempt {}/{} failed: {}",
                attempt, self.policy.max_attempts, error
            );
            let mut events = vec![ConnectionEvent::AttemptFailed {
                attempt,
                error: error.clone(),
            }];

            if attempt >= self.policy.max_attempts {
                info!("Realtime reconnect attempts exhausted after {}", attempt);
                shared.cancel = None;
                shared.last_error = Some(RealtimeError::ConnectionExhausted { attempts: attempt });
                events.extend(self.set_state(&mut shared, ConnectionState::Disconnected));
                events.push(ConnectionEvent::Exhausted { attempts: attempt });
                (NextStep::Stop, events)
            } else {
                shared.last_error = Some(error);
                events.extend(self.set_state(&mut shared, ConnectionState::Reconnecting));
                (NextStep::Retry(self.policy.delay_for_attempt(attempt)), events)
            }
        };
        self.emit_all(events);
        step
    }

    /// Returns false when this driver has been superseded.
    fn on_dropped(&self, generation: u64, error: RealtimeError) -> bool {
        let events = {
            let mut shared = self.shared.lock();
            if shared.generation != generation {
                return false;
            }
            warn!("Realtime transport dropped: {}", error);
            shared.outbound = None;
            shared.attempt = 0;
            shared.last_error = Some(error);
            self.set_state(&mut shared, ConnectionState::Reconnecting)
        };
        self.emit_all(events);
        true
    }

    fn leave_channel(&self, channel: &str) {
        let mut shared = self.shared.lock();
        match shared.channels.release(channel) {
            Release::Last => {
                debug!("Leaving channel {}", channel);
                if let Some(outbound) = &shared.outbound {
                    let _ = outbound.send(ControlMessage::leave(channel));
                }
            }
            Release::Remaining(left) => debug!("Channel {} still held by {}", channel, left),
            Release::NotHeld => warn!("Released channel {} that was not held", channel),
        }
    }

    fn handle_frame(&self, frame: &str) {
        match parse_inbound(frame) {
            Ok(event) => {
                let (_, failed) = self.topics.dispatch(&event.topic, &event);
                if failed > 0 {
                    warn!("{} subscriber(s) of {} panicked", failed, event.topic);
                }
            }
            Err(error) => self.undecodable_frame(error),
        }
    }

    fn undecodable_frame(&self, error: RealtimeError) {
        warn!("Dropping undecodable realtime frame: {}", error);
        self.emit_all(vec![ConnectionEvent::ProtocolError { error }]);
    }
}

/// Connection driver. Owns the transport for as long as its generation is
/// current.
async fn drive(inner: Arc<Inner>, generation: u64, cancel: CancellationToken) {
    let mut wait: Option<Duration> = None;

    loop {
        if let Some(delay) = wait.take() {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = sleep(delay) => {}
            }
        }
        if !inner.is_current(generation) {
            return;
        }

        let request = ConnectRequest {
            url: inner.url.clone(),
            token: inner.credentials.bearer_token(),
        };
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = inner.connector.connect(request) => result,
        };

        match result {
            Ok(mut pair) => {
                let Some(outbound) = inner.on_connected(generation) else {
                    pair.sink.close().await;
                    return;
                };
                match run_session(&inner, pair, outbound, &cancel).await {
                    SessionEnd::Cancelled => return,
                    SessionEnd::Dropped(error) => {
                        if !inner.on_dropped(generation, error) {
                            return;
                        }
                        wait = Some(inner.policy.delay_for_attempt(1));
                    }
                }
            }
            Err(error) => match inner.on_connect_failed(generation, error) {
                NextStep::Retry(delay) => wait = Some(delay),
                NextStep::Stop => return,
            },
        }
    }
}

async fn run_session(
    inner: &Inner,
    pair: TransportPair,
    mut outbound: mpsc::UnboundedReceiver<ControlMessage>,
    cancel: &CancellationToken,
) -> SessionEnd {
    let TransportPair { mut sink, mut stream } = pair;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                sink.close().await;
                return SessionEnd::Cancelled;
            }
            Some(message) = outbound.recv() => {
                let frame = match message.to_frame() {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!("Failed to encode {:?}: {}", message, e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(frame).await {
                    return SessionEnd::Dropped(e);
                }
            }
            frame = stream.next_frame() => match frame {
                Some(Ok(text)) => inner.handle_frame(&text),
                // A frame the transport could not turn into text is not a
                // dead transport.
                Some(Err(error @ RealtimeError::Protocol(_))) => inner.undecodable_frame(error),
                Some(Err(e)) => return SessionEnd::Dropped(e),
                None => {
                    return SessionEnd::Dropped(RealtimeError::TransportClosed(
                        "closed by peer".to_string(),
                    ));
                }
            },
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
