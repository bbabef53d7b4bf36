use crate::rpc_client::RpcClient;
use std::io;
use std::sync::Arc;
use weft_rpc_service_caller::{Connector, Endpoint};

/// [`Connector`] implementation over [`RpcClient`], letting an
/// [`RpcChannel`](weft_rpc_service_caller::RpcChannel) establish WebSocket
/// transports per endpoint.
pub struct WsConnector;

#[async_trait::async_trait]
impl Connector for WsConnector {
    type Caller = RpcClient;

    async fn connect(&self, endpoint: &Endpoint) -> io::Result<Arc<RpcClient>> {
        let client = RpcClient::new(&endpoint.host, endpoint.port).await?;
        Ok(Arc::new(client))
    }
}
