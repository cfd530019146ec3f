//! Reconnecting client over a sequence of underlying connections.

use std::sync::Arc;
use std::time::Instant;

use backoff::backoff::{Backoff as _, Constant};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::{Error, WsError};
use crate::hooks::EventHooks;
use crate::message;
use crate::transport::{
    CLOSE_ABNORMAL, CLOSE_NORMAL, CloseEvent, Connection as _, MessageFlags, SocketEvent,
    Transport, WsTransport,
};

/// Connection lifecycle as observed through [`Client::state_receiver`].
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum ConnectionState {
    /// Not connected and no retry pending
    Disconnected,
    /// Attempting to connect
    Connecting,
    /// Successfully connected
    Connected {
        /// When the connection was established
        since: Instant,
    },
    /// Waiting out the delay before the next attempt
    Reconnecting {
        /// Reconnect cycle about to run, 1-based within the failure streak
        attempt: u32,
    },
    /// Retry budget spent; the client will not dial again
    Exhausted,
}

impl ConnectionState {
    /// Check if the connection is currently active.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// Check if the client has given up reconnecting.
    #[must_use]
    pub const fn is_exhausted(self) -> bool {
        matches!(self, Self::Exhausted)
    }
}

enum Command {
    Open,
    Send { payload: String, flags: MessageFlags },
    Close { code: u16, reason: String },
}

/// Maintains one logical connection over a sequence of underlying sockets,
/// reopening after abnormal closes and refused connections.
///
/// The handle is cheap to clone; all clones drive the same connection. All
/// mutable state lives in a single worker task, so no synchronization is
/// needed around the attempt counter or the active connection. Dropping the
/// last handle shuts the worker down, cancelling any reopen still waiting
/// out its delay.
///
/// ```no_run
/// use reconnecting_websocket::{Client, ClientConfig, EventHooks};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = ClientConfig::builder()
///         .endpoint("wss://feed.example.com/stream")
///         .build();
///     let hooks = EventHooks::new()
///         .on_message(|value, _flags, _attempt| println!("{value}"));
///     let client = Client::new(config, hooks);
///
///     let mut states = client.state_receiver();
///     states.wait_for(|state| state.is_connected()).await?;
///     client.send(r#"{"subscribe":"ticks"}"#);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    command_tx: mpsc::UnboundedSender<Command>,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
    shutdown: CancellationToken,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        // Stops the worker, including a reopen still waiting out its delay.
        self.shutdown.cancel();
    }
}

impl Client {
    /// Create a client over the default `tokio-tungstenite` transport.
    ///
    /// Must be called within a Tokio runtime. When `config.auto_open` is set
    /// the first dial starts immediately.
    #[must_use]
    pub fn new(config: ClientConfig, hooks: EventHooks) -> Self {
        Self::with_transport(config, hooks, WsTransport)
    }

    /// Create a client over a caller-supplied [`Transport`].
    pub fn with_transport<T: Transport>(config: ClientConfig, hooks: EventHooks, transport: T) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let shutdown = CancellationToken::new();

        if config.auto_open {
            _ = command_tx.send(Command::Open);
        }

        let worker = Worker {
            config,
            hooks,
            transport,
            command_rx,
            state_tx: state_tx.clone(),
            shutdown: shutdown.clone(),
            attempts: 0,
        };
        tokio::spawn(worker.run());

        Self {
            inner: Arc::new(ClientInner {
                command_tx,
                state_tx,
                state_rx,
                shutdown,
            }),
        }
    }

    /// Dial the configured endpoint.
    ///
    /// A silent no-op once the retry budget is spent, and while a connection
    /// or a pending reopen already exists.
    pub fn open(&self) {
        _ = self.inner.command_tx.send(Command::Open);
    }

    /// Queue a text payload for the active connection.
    ///
    /// Never fails from the caller's perspective: a send failure is routed
    /// through the error path and surfaces via the error hook.
    pub fn send<P: Into<String>>(&self, payload: P) {
        self.send_with(payload, MessageFlags::empty());
    }

    /// Queue a payload with explicit frame flags.
    pub fn send_with<P: Into<String>>(&self, payload: P, flags: MessageFlags) {
        _ = self.inner.command_tx.send(Command::Send {
            payload: payload.into(),
            flags,
        });
    }

    /// Close the active connection with the normal close code (1000).
    pub fn close(&self) {
        self.close_with(CLOSE_NORMAL, "");
    }

    /// Close the active connection with `code` and `reason`.
    ///
    /// With no active connection this is a no-op, though it still cancels a
    /// reopen waiting out its delay.
    pub fn close_with<R: Into<String>>(&self, code: u16, reason: R) {
        _ = self.inner.command_tx.send(Command::Close {
            code,
            reason: reason.into(),
        });
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state_rx.borrow()
    }

    /// Subscribe to connection state changes.
    ///
    /// Returns a receiver that notifies when the connection state changes,
    /// including the terminal [`ConnectionState::Exhausted`] once the retry
    /// budget is spent.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }
}

/// Outcome of serving one connection.
enum Verdict {
    /// Abnormal end; schedule a reopen
    Reconnect,
    /// Clean end; go idle
    Stop,
    /// The client is shutting down
    Shutdown,
}

enum ServeStep {
    Event(Option<SocketEvent>),
    Command(Option<Command>),
    Shutdown,
}

enum WaitStep {
    Elapsed,
    Command(Option<Command>),
    Shutdown,
}

/// Owns all mutable connection state; runs as a single spawned task.
struct Worker<T: Transport> {
    config: ClientConfig,
    hooks: EventHooks,
    transport: T,
    command_rx: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<ConnectionState>,
    shutdown: CancellationToken,
    /// Consecutive reconnect cycles since the last successful open
    attempts: u32,
}

impl<T: Transport> Worker<T> {
    async fn run(mut self) {
        loop {
            let command = tokio::select! {
                () = self.shutdown.cancelled() => return,
                command = self.command_rx.recv() => command,
            };

            match command {
                Some(Command::Open) => self.connect_cycle().await,
                Some(Command::Send { .. }) => {
                    // No connection to send on; route to the error path.
                    self.hooks.error(&WsError::NotConnected.into());
                }
                Some(Command::Close { .. }) => {
                    // Nothing to close.
                }
                None => return,
            }
        }
    }

    /// Drive one open → serve → (delay → reopen)* run until the connection
    /// ends cleanly, the retry budget is spent, or the client shuts down.
    async fn connect_cycle(&mut self) {
        let mut delay: Constant = self.config.reconnect.into();

        loop {
            if let Some(max) = self.config.reconnect.max_attempts
                && self.attempts > max
            {
                self.set_state(ConnectionState::Exhausted);
                return;
            }

            self.set_state(ConnectionState::Connecting);
            match self
                .transport
                .connect(&self.config.endpoint, &self.config.protocols)
                .await
            {
                Ok(conn) => {
                    self.attempts = 0;
                    delay.reset();
                    self.set_state(ConnectionState::Connected {
                        since: Instant::now(),
                    });
                    self.hooks.open();

                    match self.serve(conn).await {
                        Verdict::Reconnect => {}
                        Verdict::Stop => {
                            self.set_state(ConnectionState::Disconnected);
                            return;
                        }
                        Verdict::Shutdown => return,
                    }
                }
                Err(e) if e.is_connection_refused() => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(error = %e, "WebSocket connection refused, scheduling reconnect");
                }
                Err(e) => {
                    self.hooks.error(&e);
                    self.set_state(ConnectionState::Disconnected);
                    return;
                }
            }

            if !self.wait_before_reopen(&mut delay).await {
                return;
            }
            self.attempts = self.attempts.saturating_add(1);
        }
    }

    /// Serve events on an active connection until it ends.
    async fn serve(&mut self, mut conn: T::Conn) -> Verdict {
        loop {
            let step = tokio::select! {
                () = self.shutdown.cancelled() => ServeStep::Shutdown,
                event = conn.next_event() => ServeStep::Event(event),
                command = self.command_rx.recv() => ServeStep::Command(command),
            };

            match step {
                ServeStep::Shutdown => {
                    _ = conn.close(CLOSE_NORMAL, "client dropped").await;
                    return Verdict::Shutdown;
                }
                ServeStep::Event(Some(SocketEvent::Message { payload, flags })) => {
                    self.dispatch(&payload, flags);
                }
                ServeStep::Event(Some(SocketEvent::Closed(close))) => {
                    return self.close_verdict(&close);
                }
                ServeStep::Event(Some(SocketEvent::Error(e))) => {
                    let error = Error::from(e);
                    if error.is_connection_refused() {
                        return Verdict::Reconnect;
                    }
                    self.hooks.error(&error);
                    // If the connection died with the error, the stream ends
                    // and the abnormal-close path below takes over.
                }
                ServeStep::Event(None) => {
                    // The peer vanished without a close frame.
                    let close = CloseEvent {
                        code: CLOSE_ABNORMAL,
                        reason: String::new(),
                    };
                    return self.close_verdict(&close);
                }
                ServeStep::Command(Some(Command::Send { payload, flags })) => {
                    if let Err(e) = conn.send(payload, flags).await {
                        // Send failures are re-routed through the error path,
                        // never surfaced to the caller of `send`.
                        if e.is_connection_refused() {
                            return Verdict::Reconnect;
                        }
                        self.hooks.error(&e);
                    }
                }
                ServeStep::Command(Some(Command::Close { code, reason })) => {
                    if let Err(e) = conn.close(code, &reason).await {
                        self.hooks.error(&e);
                    }
                    // The close frame echoes back through `next_event`, which
                    // decides whether the cycle ends or reconnects.
                }
                ServeStep::Command(Some(Command::Open)) => {
                    // Already connected; one live connection at a time.
                }
                ServeStep::Command(None) => return Verdict::Shutdown,
            }
        }
    }

    /// Wait out the reconnect delay. Returns `false` when the cycle should
    /// stop because the client closed or shut down while the delay was
    /// pending.
    async fn wait_before_reopen(&mut self, delay: &mut Constant) -> bool {
        self.set_state(ConnectionState::Reconnecting {
            attempt: self.attempts.saturating_add(1),
        });
        #[cfg(feature = "tracing")]
        tracing::info!(
            interval = ?self.config.reconnect.interval,
            "Retrying WebSocket connection after delay"
        );

        let Some(duration) = delay.next_backoff() else {
            return false;
        };
        let reopen = tokio::time::sleep(duration);
        tokio::pin!(reopen);

        loop {
            let step = tokio::select! {
                () = self.shutdown.cancelled() => WaitStep::Shutdown,
                () = &mut reopen => WaitStep::Elapsed,
                command = self.command_rx.recv() => WaitStep::Command(command),
            };

            match step {
                WaitStep::Elapsed => return true,
                WaitStep::Shutdown | WaitStep::Command(None) => return false,
                WaitStep::Command(Some(Command::Close { .. })) => {
                    // Closing while a reopen is pending cancels the reopen.
                    self.set_state(ConnectionState::Disconnected);
                    return false;
                }
                WaitStep::Command(Some(Command::Send { .. })) => {
                    self.hooks.error(&WsError::NotConnected.into());
                }
                WaitStep::Command(Some(Command::Open)) => {
                    // A reopen is already pending.
                }
            }
        }
    }

    fn dispatch(&self, payload: &str, flags: MessageFlags) {
        match message::decode(payload) {
            Ok(value) => self.hooks.message(&value, flags, self.attempts),
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %e, "Failed to decode WebSocket message");
                #[cfg(not(feature = "tracing"))]
                let _ = &e;
            }
        }
    }

    /// Decide whether a close ends the cycle or schedules a reopen, then
    /// inform the close hook.
    fn close_verdict(&self, close: &CloseEvent) -> Verdict {
        let verdict = if close.code == CLOSE_NORMAL {
            #[cfg(feature = "tracing")]
            tracing::info!("WebSocket closed");
            Verdict::Stop
        } else {
            #[cfg(feature = "tracing")]
            tracing::warn!(code = close.code, "Abnormal WebSocket close, scheduling reconnect");
            Verdict::Reconnect
        };
        self.hooks.close(close);
        verdict
    }

    fn set_state(&self, state: ConnectionState) {
        #[cfg(feature = "tracing")]
        tracing::debug!(%state, "Connection state changed");
        _ = self.state_tx.send(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connected_state_is_connected() {
        let state = ConnectionState::Connected {
            since: Instant::now(),
        };
        assert!(state.is_connected());
        assert!(!state.is_exhausted());
    }

    #[test]
    fn exhausted_state_is_terminal_flag() {
        assert!(ConnectionState::Exhausted.is_exhausted());
        assert!(!ConnectionState::Exhausted.is_connected());
    }

    #[test]
    fn state_display_names_the_variant() {
        assert_eq!(ConnectionState::Disconnected.to_string(), "Disconnected");
        assert_eq!(
            ConnectionState::Reconnecting { attempt: 2 }.to_string(),
            "Reconnecting"
        );
    }
}
