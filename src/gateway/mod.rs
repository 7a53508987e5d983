//! Request gateway
//!
//! Every resource talks to the server through a [`RequestGateway`]. It owns
//! the base configuration, the transport, the overridable hooks and the
//! notification collaborator.
//!
//! # Module Structure
//!
//! - [`client`] - The gateway: config merge, envelope unwrap, error classification
//! - [`error`] - The fixed error taxonomy
//! - [`http`] - Transport trait and the reqwest implementation
//! - [`mock`] - Scripted transport for tests
//! - [`request`] - Request configuration, envelope and query helpers
//!
//! # Example
//!
//! ```ignore
//! use resource_store::gateway::{GatewayConfig, RequestGateway};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let gateway = RequestGateway::http(GatewayConfig::default())?;
//!     let users = gateway.get("/users", None).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod http;
pub mod mock;
pub mod request;

pub use client::{DefaultHooks, GatewayHooks, RequestGateway};
pub use error::{RequestError, TransportError};
pub use http::{RawResponse, ReqwestTransport, Transport, TransportRequest};
pub use request::{GatewayConfig, Params, RequestConfig, ResponseEnvelope};
