//! Embeddable MCP server with context-dependent capability metadata.
//!
//! Tools and prompts are declared as [`capability::CapabilityDefinition`]s
//! whose title, description, input schema, and annotations are each either a
//! fixed literal or a resolver of the caller-supplied context, re-evaluated on
//! every call. A [`dispatcher::Dispatcher`] routes JSON-RPC 2.0 methods to the
//! registered definitions; transports ([`transport::InProcessTransport`] for
//! same-process use, [`server::StdioServer`] for stdio) feed it requests.

pub mod capability;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod field;
pub mod protocol;
pub mod schema;
pub mod server;
pub mod transport;
