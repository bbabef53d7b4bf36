mod rpc_server;
pub mod utils;

pub use rpc_server::{RpcServer, WsSenderContext};
pub use weft_rpc_service_endpoint::RpcServiceEndpointInterface;
