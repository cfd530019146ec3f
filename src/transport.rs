//! The socket layer beneath the client.
//!
//! The client orchestrates a [`Transport`] rather than a concrete socket, so
//! the reconnection machinery can run over anything that can dial, stream
//! events, and close. [`WsTransport`] is the production implementation over
//! `tokio-tungstenite`.

use async_trait::async_trait;
use bitflags::bitflags;
use futures::{SinkExt as _, StreamExt as _};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest as _;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::Result;
use crate::error::WsError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close code signifying a clean, intentional shutdown.
///
/// A close carrying this code never triggers reconnection.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close code reported when the peer vanishes without a close frame.
pub(crate) const CLOSE_ABNORMAL: u16 = 1006;

bitflags! {
    /// Side-channel details about how a frame arrived.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MessageFlags: u8 {
        /// The payload travelled in a binary frame rather than a text frame.
        const BINARY = 1;
    }
}

/// Close details delivered with a close frame.
#[expect(
    clippy::exhaustive_structs,
    reason = "Constructed by external Transport implementations"
)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseEvent {
    /// Close status code
    pub code: u16,
    /// Reason supplied by whoever initiated the close, possibly empty
    pub reason: String,
}

/// An event produced by an active [`Connection`].
#[expect(
    clippy::exhaustive_enums,
    reason = "Constructed by external Transport implementations"
)]
#[derive(Debug)]
pub enum SocketEvent {
    /// A complete inbound frame
    Message {
        /// Frame payload as UTF-8 text
        payload: String,
        /// How the frame arrived
        flags: MessageFlags,
    },
    /// The peer closed the connection
    Closed(CloseEvent),
    /// The transport reported an error
    Error(WsError),
}

/// Dials endpoints on behalf of the client.
///
/// One connection is dialed per reconnect cycle; the client never holds two
/// connections at once.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Connection type produced by [`connect`](Self::connect)
    type Conn: Connection;

    /// Open a connection to `endpoint`, offering `protocols` in order.
    async fn connect(&self, endpoint: &str, protocols: &[String]) -> Result<Self::Conn>;
}

/// A single live connection.
#[async_trait]
pub trait Connection: Send + 'static {
    /// Next event from the socket. `None` once the stream is exhausted.
    async fn next_event(&mut self) -> Option<SocketEvent>;

    /// Transmit a payload.
    async fn send(&mut self, payload: String, flags: MessageFlags) -> Result<()>;

    /// Initiate the closing handshake with `code` and `reason`.
    async fn close(&mut self, code: u16, reason: &str) -> Result<()>;
}

/// Default transport over `tokio-tungstenite`.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    type Conn = WsConnection;

    async fn connect(&self, endpoint: &str, protocols: &[String]) -> Result<WsConnection> {
        let mut request = endpoint
            .into_client_request()
            .map_err(WsError::Connection)?;

        if !protocols.is_empty() {
            let offer = HeaderValue::from_str(&protocols.join(", "))
                .map_err(|e| WsError::Connection(tungstenite::Error::HttpFormat(e.into())))?;
            request
                .headers_mut()
                .insert("Sec-WebSocket-Protocol", offer);
        }

        let (stream, _response) = connect_async(request)
            .await
            .map_err(WsError::Connection)?;

        Ok(WsConnection {
            stream,
            terminated: false,
        })
    }
}

/// Live connection produced by [`WsTransport`].
pub struct WsConnection {
    stream: WsStream,
    /// Set once the stream has yielded a fatal error; later polls return `None`
    terminated: bool,
}

#[async_trait]
impl Connection for WsConnection {
    async fn next_event(&mut self) -> Option<SocketEvent> {
        if self.terminated {
            return None;
        }

        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => {
                    return Some(SocketEvent::Message {
                        payload: text.to_string(),
                        flags: MessageFlags::empty(),
                    });
                }
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(payload) => {
                        return Some(SocketEvent::Message {
                            payload,
                            flags: MessageFlags::BINARY,
                        });
                    }
                    Err(e) => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(error = %e, "Dropping non-UTF-8 binary frame");
                        #[cfg(not(feature = "tracing"))]
                        let _ = &e;
                    }
                },
                Ok(Message::Close(frame)) => {
                    let close = frame.map_or(
                        CloseEvent {
                            code: CLOSE_ABNORMAL,
                            reason: String::new(),
                        },
                        |f| CloseEvent {
                            code: f.code.into(),
                            reason: f.reason.to_string(),
                        },
                    );
                    return Some(SocketEvent::Closed(close));
                }
                Ok(_) => {
                    // Ping/pong is handled by tungstenite itself.
                }
                Err(
                    tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed,
                ) => return None,
                Err(e) => {
                    self.terminated = true;
                    return Some(SocketEvent::Error(WsError::Connection(e)));
                }
            }
        }
    }

    async fn send(&mut self, payload: String, flags: MessageFlags) -> Result<()> {
        let message = if flags.contains(MessageFlags::BINARY) {
            Message::Binary(payload.into_bytes().into())
        } else {
            Message::Text(payload.into())
        };
        self.stream
            .send(message)
            .await
            .map_err(WsError::Connection)?;
        Ok(())
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_owned().into(),
        };
        self.stream
            .close(Some(frame))
            .await
            .map_err(WsError::Connection)?;
        Ok(())
    }
}
