//! SMPP v3.4 protocol engine.
//!
//! Both endpoints of the protocol are provided: an ESME [`Client`] that
//! connects out, binds and submits messages, and an SMSC [`Server`] that
//! accepts and services many concurrent ESME sessions. Underneath them
//! sit a bit-exact PDU codec ([`codec`]), length-prefixed framing
//! ([`connection`]) and a role-parameterized session state machine
//! ([`session`]) handling sequence numbers, request/response
//! correlation and enquire_link keep-alive.
//!
//! # Sending a message
//!
//! ```rust,no_run
//! use smpp34::client::{ClientBuilder, SubmitOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClientBuilder::new("localhost:2775")
//!         .system_id("test_client")
//!         .password("password")
//!         .connect()
//!         .await?;
//!
//!     client.bind_transceiver().await?;
//!     let message_id = client
//!         .submit_sm("1234", "5678", b"Hello, World!", SubmitOptions::default())
//!         .await?;
//!     println!("submitted as {message_id}");
//!
//!     client.unbind().await?;
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Serving ESMEs
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use async_trait::async_trait;
//! use smpp34::server::{Server, ServerConfig, ServerHandler};
//!
//! struct Auth;
//!
//! #[async_trait]
//! impl ServerHandler for Auth {
//!     async fn authenticate(&self, _system_id: &str, password: &str, _system_type: &str) -> bool {
//!         password == "password"
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::new(ServerConfig::default(), Arc::new(Auth));
//!     server.start("127.0.0.1:2775").await?;
//!     // ... run until told otherwise ...
//!     server.stop(Duration::from_secs(5)).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod connection;
pub mod datatypes;
pub mod error;
pub mod server;
pub mod session;

mod macros;

pub use client::{Client, ClientBuilder, ClientHandler, SubmitOptions};
pub use codec::{CodecError, Decodable, Encodable, Pdu, PduHeader, MAX_PDU_SIZE};
pub use connection::{FrameError, FrameReader, FrameWriter};
pub use error::{SmppError, SmppResult};
pub use server::{Server, ServerConfig, ServerHandler};
pub use session::{
    PeerInfo, Session, SessionConfig, SessionEvent, SessionId, SessionRole, SessionState,
};
