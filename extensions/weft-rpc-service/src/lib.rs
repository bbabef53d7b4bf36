//! Shared vocabulary between generated service stubs and the Weft call
//! runtime.
//!
//! The code-generation collaborator produces typed request/response
//! containers and stub surfaces; this crate defines the two things those
//! stubs and the runtime agree on: per-method descriptors with
//! serializer/deserializer capabilities ([`method`]) and the policy data a
//! client channel consumes at construction time ([`config`]).

pub mod config;
pub mod constants;
pub mod method;

pub use config::{LbPolicy, MethodConfig, RetryPolicy, ServiceConfig};
pub use method::{
    MethodDescriptor, RpcMethod, RpcMethodClientStreaming, RpcMethodDuplex,
    RpcMethodServerStreaming, RpcMethodUnary,
};
