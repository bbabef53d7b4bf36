//! The Echo service definition used by examples and integration tests.
//!
//! This crate stands in for generated stub code: typed request/response
//! containers plus one [`weft_rpc_service::RpcMethod`] implementation per
//! method, one method per call shape.

pub mod echo;

pub use echo::{EchoCollect, EchoExpand, EchoGet, EchoRequest, EchoResponse, EchoUpdate};
