//! # MessageU Client
//!
//! Client library for the MessageU end-to-end encrypted chat protocol.
//!
//! Every exchange with the server is a single request and response over a fresh TCP
//! connection. Message bodies are encrypted between clients: symmetric keys travel
//! encrypted with the recipient's RSA public key, and text and files travel encrypted with
//! the shared AES key. The server only relays ciphertext.
//!
//! ## Modules
//! - [`core`]: fixed-width wire types and temp-file backed message content
//! - [`protocol`]: request/response codec and the pending-message dispatcher
//! - [`session`]: the session engine, peer registry, identity persistence and endpoint
//! - [`utils`]: crypto capabilities, logging setup and metrics
//! - [`config`]: TOML, environment and legacy `server.info` configuration
//! - [`error`]: protocol, session and crypto error taxonomies
//!
//! ## Quick Start
//! ```rust,no_run
//! use messageu_client::{ClientConfig, Session};
//!
//! #[tokio::main]
//! async fn main() -> messageu_client::Result<()> {
//!     let config = ClientConfig::from_server_info_file("server.info")?;
//!     messageu_client::utils::logging::init_logging(&config.logging)?;
//!
//!     let mut session = Session::new(&config)?;
//!     if !session.is_registered() {
//!         session.register("alice").await?;
//!     }
//!     session.update_client_list(|name| println!("{name}")).await?;
//!     session.get_public_key("bob").await?;
//!     session.send_symmetric_key("bob").await?;
//!     session.send_message("bob", "hello").await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod session;
pub mod utils;

pub use config::ClientConfig;
pub use error::{Error, Result};
pub use protocol::message::ReceivedMessage;
pub use session::Session;
