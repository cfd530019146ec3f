#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod client;
pub mod config;
pub mod error;
pub mod hooks;
pub mod message;
pub mod transport;

pub use client::{Client, ConnectionState};
pub use config::{ClientConfig, ReconnectConfig};
pub use error::Error;
pub use hooks::EventHooks;
pub use transport::{
    CLOSE_NORMAL, CloseEvent, Connection, MessageFlags, SocketEvent, Transport, WsTransport,
};

pub type Result<T> = std::result::Result<T, Error>;
