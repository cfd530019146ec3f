use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::{fmt, io};

use tokio_tungstenite::tungstenite;

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Internal error from dependencies
    Internal,
    /// Error related to WebSocket connections
    WebSocket,
}

#[derive(Debug)]
pub struct Error {
    kind: Kind,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    backtrace: Backtrace,
}

impl Error {
    pub fn with_source<S: StdError + Send + Sync + 'static>(kind: Kind, source: S) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
            backtrace: Backtrace::capture(),
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    pub fn inner(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        let e = self.source.as_deref()?;
        e.downcast_ref::<E>()
    }

    /// Whether this error means the server actively refused the connection.
    ///
    /// Refused connections take the reconnect path instead of surfacing
    /// through the error hook.
    #[must_use]
    pub fn is_connection_refused(&self) -> bool {
        self.downcast_ref::<WsError>()
            .is_some_and(WsError::is_connection_refused)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(src) => write!(f, "{:?}: {}", self.kind, src),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

/// WebSocket error variants.
#[non_exhaustive]
#[derive(Debug)]
pub enum WsError {
    /// Error connecting to or communicating with the WebSocket server
    Connection(tungstenite::Error),
    /// Error decoding an inbound message
    MessageParse(serde_json::Error),
    /// Operation attempted while no connection is active
    NotConnected,
}

impl WsError {
    /// Whether the underlying transport error is a refused connection.
    #[must_use]
    pub fn is_connection_refused(&self) -> bool {
        matches!(
            self,
            Self::Connection(tungstenite::Error::Io(e))
                if e.kind() == io::ErrorKind::ConnectionRefused
        )
    }
}

impl fmt::Display for WsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(e) => write!(f, "WebSocket connection error: {e}"),
            Self::MessageParse(e) => write!(f, "Failed to decode WebSocket message: {e}"),
            Self::NotConnected => write!(f, "No active WebSocket connection"),
        }
    }
}

impl StdError for WsError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Connection(e) => Some(e),
            Self::MessageParse(e) => Some(e),
            Self::NotConnected => None,
        }
    }
}

impl From<WsError> for Error {
    fn from(e: WsError) -> Self {
        Self::with_source(Kind::WebSocket, e)
    }
}

impl From<tungstenite::Error> for Error {
    fn from(e: tungstenite::Error) -> Self {
        Self::with_source(Kind::WebSocket, WsError::Connection(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refused() -> tungstenite::Error {
        tungstenite::Error::Io(io::Error::from(io::ErrorKind::ConnectionRefused))
    }

    #[test]
    fn refused_io_error_is_classified() {
        let error: Error = WsError::Connection(refused()).into();

        assert_eq!(error.kind(), Kind::WebSocket);
        assert!(error.is_connection_refused());
    }

    #[test]
    fn other_io_error_is_not_refused() {
        let reset = tungstenite::Error::Io(io::Error::from(io::ErrorKind::ConnectionReset));
        let error: Error = WsError::Connection(reset).into();

        assert!(!error.is_connection_refused());
    }

    #[test]
    fn not_connected_is_not_refused() {
        let error: Error = WsError::NotConnected.into();

        assert!(!error.is_connection_refused());
    }

    #[test]
    fn display_includes_source() {
        let error: Error = WsError::NotConnected.into();

        assert!(error.to_string().contains("No active WebSocket connection"));
    }

    #[test]
    fn downcast_recovers_ws_error() {
        let error: Error = WsError::Connection(refused()).into();

        let ws = error.downcast_ref::<WsError>().expect("source is a WsError");
        assert!(ws.is_connection_refused());
    }
}
