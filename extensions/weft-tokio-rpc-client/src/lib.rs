mod connector;
mod rpc_client;

pub use connector::WsConnector;
pub use rpc_client::RpcClient;
pub use weft_rpc_service_caller::{RpcServiceCallerInterface, RpcTransportState};
