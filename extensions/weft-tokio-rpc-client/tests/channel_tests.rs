use example_weft_echo_service::{EchoGet, EchoRequest, EchoResponse};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use weft::status::{Status, StatusCode};
use weft_rpc_service::{LbPolicy, MethodConfig, ServiceConfig};
use weft_rpc_service_caller::{
    CallOptions, CallReply, ClientCallContext, ClientInterceptor, Endpoint, Next,
    OutboundPayload, RpcChannel, StaticResolver,
};
use weft_rpc_service_endpoint::BoxError;
use weft_tokio_rpc_client::WsConnector;
use weft_tokio_rpc_server::{RpcServer, RpcServiceEndpointInterface};

/// Starts an echo server whose unary responses carry `tag`, so tests can
/// tell which endpoint served a call.
async fn start_tagged_server(tag: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(RpcServer::new());

    server
        .endpoint()
        .register_unary::<EchoGet, _, _>(move |_, req: EchoRequest| async move {
            Ok::<EchoResponse, BoxError>(EchoResponse {
                text: format!("{tag}: {}", req.text),
            })
        })
        .unwrap();

    tokio::spawn(async move {
        let _ = server.serve_with_listener(listener).await;
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    addr
}

fn endpoint_of(addr: SocketAddr) -> Endpoint {
    Endpoint::new(addr.ip().to_string(), addr.port())
}

fn round_robin_config() -> ServiceConfig {
    ServiceConfig {
        lb_policy: LbPolicy::RoundRobin,
        method_configs: Vec::new(),
    }
}

#[tokio::test]
async fn round_robin_rotates_across_endpoints() {
    let addr_a = start_tagged_server("alpha").await;
    let addr_b = start_tagged_server("beta").await;

    let resolver = Arc::new(StaticResolver::new(vec![
        endpoint_of(addr_a),
        endpoint_of(addr_b),
    ]));
    let channel = RpcChannel::new("echo-pool", resolver, WsConnector)
        .with_config(round_robin_config());

    let mut seen = HashSet::new();
    for _ in 0..4 {
        let response = channel
            .call_unary::<EchoGet>(EchoRequest { text: "hi".into() }, CallOptions::new())
            .await
            .unwrap();
        let tag = response.text.split(':').next().unwrap().to_string();
        seen.insert(tag);
    }

    // Both endpoints served calls; the rotation never locked onto one.
    assert_eq!(seen.len(), 2);
}

#[tokio::test]
async fn dead_endpoint_is_skipped() {
    // Reserve a port, then free it so connections to it are refused.
    let dead_addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let live_addr = start_tagged_server("live").await;

    let resolver = Arc::new(StaticResolver::new(vec![
        endpoint_of(dead_addr),
        endpoint_of(live_addr),
    ]));
    let channel = RpcChannel::new("echo-pool", resolver, WsConnector)
        .with_config(round_robin_config());

    for _ in 0..3 {
        let response = channel
            .call_unary::<EchoGet>(EchoRequest { text: "hi".into() }, CallOptions::new())
            .await
            .unwrap();
        assert_eq!(response.text, "live: hi");
    }
}

#[tokio::test]
async fn all_endpoints_down_is_unavailable() {
    let dead_addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let resolver = Arc::new(StaticResolver::new(vec![endpoint_of(dead_addr)]));
    let channel = RpcChannel::new("echo-pool", resolver, WsConnector);

    let status = channel
        .call_unary::<EchoGet>(EchoRequest { text: "hi".into() }, CallOptions::new())
        .await
        .unwrap_err();

    assert_eq!(status.code(), StatusCode::Unavailable);
}

#[tokio::test]
async fn channel_interceptors_wrap_every_call() {
    struct TagMetadata;

    #[async_trait::async_trait]
    impl ClientInterceptor for TagMetadata {
        async fn intercept(
            &self,
            mut ctx: ClientCallContext,
            payload: OutboundPayload,
            next: Next<'_>,
        ) -> Result<CallReply, Status> {
            ctx.options.metadata.append_ascii("x-channel", "yes").unwrap();
            next.run(ctx, payload).await
        }
    }

    // The server interceptor observes the metadata the client interceptor
    // attached, proving both chains ran.
    use std::sync::Mutex;
    use weft_rpc_service_endpoint::{ServerCallContext, ServerInterceptor, ServerNext};

    struct CaptureMetadata {
        seen: Arc<Mutex<Option<String>>>,
    }

    #[async_trait::async_trait]
    impl ServerInterceptor for CaptureMetadata {
        async fn intercept(
            &self,
            ctx: ServerCallContext,
            next: ServerNext<'_>,
        ) -> Result<(), Status> {
            *self.seen.lock().unwrap() = ctx
                .metadata
                .get_ascii("x-channel")
                .map(|s| s.to_string());
            next.run(ctx).await
        }
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(RpcServer::new());
    let seen: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

    server
        .endpoint()
        .add_interceptor(Arc::new(CaptureMetadata { seen: seen.clone() }));
    server
        .endpoint()
        .register_unary::<EchoGet, _, _>(|_, req: EchoRequest| async move {
            Ok::<EchoResponse, BoxError>(EchoResponse { text: req.text })
        })
        .unwrap();

    tokio::spawn(async move {
        let _ = server.serve_with_listener(listener).await;
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let resolver = Arc::new(StaticResolver::new(vec![endpoint_of(addr)]));
    let channel = RpcChannel::new("echo", resolver, WsConnector)
        .with_interceptor(Arc::new(TagMetadata));

    let response = channel
        .call_unary::<EchoGet>(EchoRequest { text: "m".into() }, CallOptions::new())
        .await
        .unwrap();

    assert_eq!(response.text, "m");
    assert_eq!(seen.lock().unwrap().as_deref(), Some("yes"));
}

#[tokio::test]
async fn service_config_default_timeout_applies() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(RpcServer::new());

    server
        .endpoint()
        .register_unary::<EchoGet, _, _>(|_, req: EchoRequest| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<EchoResponse, BoxError>(EchoResponse { text: req.text })
        })
        .unwrap();

    tokio::spawn(async move {
        let _ = server.serve_with_listener(listener).await;
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let resolver = Arc::new(StaticResolver::new(vec![endpoint_of(addr)]));
    let channel = RpcChannel::new("echo", resolver, WsConnector).with_config(ServiceConfig {
        lb_policy: LbPolicy::PickFirst,
        method_configs: vec![MethodConfig {
            path_prefix: "/echo.Echo/".into(),
            default_timeout: Some(Duration::from_millis(150)),
            retry: None,
        }],
    });

    // No per-call deadline; the service config supplies one.
    let status = channel
        .call_unary::<EchoGet>(EchoRequest { text: "slow".into() }, CallOptions::new())
        .await
        .unwrap_err();

    assert_eq!(status.code(), StatusCode::DeadlineExceeded);
}
