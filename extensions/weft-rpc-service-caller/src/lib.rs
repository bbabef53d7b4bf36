//! The client half of the Weft call runtime.
//!
//! Any transport that can expose a shared [`weft::stream::MuxDispatcher`]
//! and a raw-bytes emit function implements
//! [`RpcServiceCallerInterface`] and gains the four call shapes (unary,
//! client-streaming, server-streaming, duplex) with deadlines, cooperative
//! cancellation, and per-stream backpressure.
//!
//! On top of single-transport calls, [`channel::RpcChannel`] adds logical
//! targets: a pluggable [`resolver::Resolver`] maps the target to endpoint
//! sets, a round-robin [`picker`] chooses a connection per call, and the
//! channel re-dispatches retryable failures according to the
//! [`weft_rpc_service::ServiceConfig`] retry policy. A registered
//! [`interceptor::ClientInterceptor`] chain wraps every call the channel
//! makes.

pub mod call;
pub mod call_options;
pub mod channel;
pub mod dynamic_channel;
pub mod interceptor;
pub mod picker;
pub mod resolver;
pub mod shapes;

mod caller_interface;
mod transport_state;

pub use call::{RpcCall, RpcInboundCall, RpcRequestSink};
pub use call_options::CallOptions;
pub use caller_interface::RpcServiceCallerInterface;
pub use channel::{Connector, RpcChannel};
pub use dynamic_channel::{DynamicChannelType, DynamicReceiver, DynamicSender, dynamic_channel};
pub use interceptor::{
    CallReply, ClientCallContext, ClientInterceptor, Next, NextFuture, OutboundPayload,
    TerminalFn, run_chain,
};
pub use picker::{EndpointState, RoundRobinPicker};
pub use resolver::{Endpoint, Resolver, StaticResolver};
pub use shapes::{RpcClientStreamCall, RpcDuplexCall, RpcResponseStream};
pub use transport_state::RpcTransportState;
