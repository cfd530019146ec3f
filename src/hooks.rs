//! Event hooks invoked by the client.

use std::fmt;

use serde_json::Value;

use crate::error::Error;
use crate::transport::{CloseEvent, MessageFlags};

/// Hook invoked when a connection is established.
pub type OpenHook = Box<dyn Fn() + Send + Sync>;
/// Hook invoked with the decoded message, frame flags, and attempt count.
pub type MessageHook = Box<dyn Fn(&Value, MessageFlags, u32) + Send + Sync>;
/// Hook invoked after the close/reconnect decision has been made.
pub type CloseHook = Box<dyn Fn(&CloseEvent) + Send + Sync>;
/// Hook invoked for errors that do not trigger reconnection.
pub type ErrorHook = Box<dyn Fn(&Error) + Send + Sync>;

/// Optional callbacks for connection lifecycle events.
///
/// Hooks are injected at construction; each unset hook falls back to logging
/// the event. Hooks run on the client's worker task, so they should return
/// promptly.
///
/// ```
/// use reconnecting_websocket::EventHooks;
///
/// let hooks = EventHooks::new()
///     .on_message(|value, _flags, attempt| {
///         println!("got {value} on attempt streak {attempt}");
///     })
///     .on_close(|event| println!("closed with {}", event.code));
/// ```
#[derive(Default)]
pub struct EventHooks {
    on_open: Option<OpenHook>,
    on_message: Option<MessageHook>,
    on_close: Option<CloseHook>,
    on_error: Option<ErrorHook>,
}

impl EventHooks {
    /// Create a hook set where every event falls back to logging.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoked once per successful open, after the attempt counter resets.
    #[must_use]
    pub fn on_open<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_open = Some(Box::new(hook));
        self
    }

    /// Invoked for every decoded inbound message.
    #[must_use]
    pub fn on_message<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Value, MessageFlags, u32) + Send + Sync + 'static,
    {
        self.on_message = Some(Box::new(hook));
        self
    }

    /// Invoked for every close, normal or not.
    #[must_use]
    pub fn on_close<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CloseEvent) + Send + Sync + 'static,
    {
        self.on_close = Some(Box::new(hook));
        self
    }

    /// Invoked for errors that are not resolved by reconnecting.
    ///
    /// Refused connections never reach this hook; they feed the reconnect
    /// path instead.
    #[must_use]
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.on_error = Some(Box::new(hook));
        self
    }

    pub(crate) fn open(&self) {
        match &self.on_open {
            Some(hook) => hook(),
            None => {
                #[cfg(feature = "tracing")]
                tracing::info!("WebSocket open");
            }
        }
    }

    pub(crate) fn message(&self, value: &Value, flags: MessageFlags, attempt: u32) {
        match &self.on_message {
            Some(hook) => hook(value, flags, attempt),
            None => {
                #[cfg(feature = "tracing")]
                tracing::debug!(%value, ?flags, attempt, "WebSocket message");
            }
        }
    }

    pub(crate) fn close(&self, event: &CloseEvent) {
        match &self.on_close {
            Some(hook) => hook(event),
            None => {
                #[cfg(feature = "tracing")]
                tracing::info!(code = event.code, reason = %event.reason, "WebSocket closed");
            }
        }
    }

    pub(crate) fn error(&self, error: &Error) {
        match &self.on_error {
            Some(hook) => hook(error),
            None => {
                #[cfg(feature = "tracing")]
                tracing::warn!(%error, "WebSocket error");
            }
        }
    }
}

impl fmt::Debug for EventHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHooks")
            .field("on_open", &self.on_open.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
