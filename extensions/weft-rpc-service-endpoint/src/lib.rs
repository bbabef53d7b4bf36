//! The server half of the Weft call runtime.
//!
//! An [`RpcServiceEndpoint`] holds the method registry and the server
//! interceptor chain; a transport feeds each connection's bytes through
//! [`RpcServiceEndpointInterface::read_bytes`] with a per-connection
//! [`ServerConnection`]. Every accepted stream runs its handler in its own
//! task, so one slow handler never stalls the connection's read loop or
//! its sibling streams. Unknown method paths are rejected with
//! `Unimplemented` before any interceptor runs and without spawning
//! anything.

pub mod connection;
pub mod error;
pub mod handler;
pub mod interceptor;

mod endpoint;
mod endpoint_interface;

pub use connection::ServerConnection;
pub use endpoint::{RegisteredMethod, RpcServiceEndpoint};
pub use endpoint_interface::RpcServiceEndpointInterface;
pub use error::RpcServiceEndpointError;
pub use handler::{
    BoxError, RequestStream, ResponseSink, ServerHandlerFn, StreamingResponder,
    TypedRequestStream,
};
pub use interceptor::{ServerCallContext, ServerInterceptor, ServerNext};
