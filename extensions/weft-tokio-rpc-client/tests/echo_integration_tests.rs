use example_weft_echo_service::{
    EchoCollect, EchoExpand, EchoGet, EchoRequest, EchoResponse, EchoUpdate,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use weft::status::StatusCode;
use weft_rpc_service_caller::{CallOptions, RpcServiceCallerInterface};
use weft_rpc_service_endpoint::{BoxError, TypedRequestStream};
use weft_tokio_rpc_client::RpcClient;
use weft_tokio_rpc_server::{RpcServer, RpcServiceEndpointInterface};

/// Starts a server with the full Echo service registered and returns its
/// address.
async fn start_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(RpcServer::new());
    let endpoint = server.endpoint();

    endpoint
        .register_unary::<EchoGet, _, _>(|_, req: EchoRequest| async move {
            Ok::<EchoResponse, BoxError>(EchoResponse {
                text: format!("echo get: {}", req.text),
            })
        })
        .unwrap();

    endpoint
        .register_server_streaming::<EchoExpand, _, _>(|_, req: EchoRequest, responder| async move {
            for token in req.text.split_whitespace() {
                responder
                    .send(EchoResponse {
                        text: token.to_string(),
                    })
                    .await?;
            }
            Ok::<(), BoxError>(())
        })
        .unwrap();

    endpoint
        .register_client_streaming::<EchoCollect, _, _>(
            |_, mut requests: TypedRequestStream<EchoCollect>| async move {
                let mut parts = Vec::new();
                while let Some(req) = requests.next().await {
                    parts.push(req?.text);
                }
                Ok::<EchoResponse, BoxError>(EchoResponse {
                    text: parts.join(" "),
                })
            },
        )
        .unwrap();

    endpoint
        .register_duplex::<EchoUpdate, _, _>(
            |_, mut requests: TypedRequestStream<EchoUpdate>, responder| async move {
                while let Some(req) = requests.next().await {
                    responder
                        .send(EchoResponse {
                            text: format!("echo update: {}", req?.text),
                        })
                        .await?;
                }
                Ok::<(), BoxError>(())
            },
        )
        .unwrap();

    tokio::spawn(async move {
        let _ = server.serve_with_listener(listener).await;
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    addr
}

async fn connect(addr: SocketAddr) -> RpcClient {
    RpcClient::new(&addr.ip().to_string(), addr.port())
        .await
        .unwrap()
}

#[tokio::test]
async fn unary_roundtrip() {
    let addr = start_echo_server().await;
    let client = connect(addr).await;

    let response = client
        .call_unary::<EchoGet>(
            EchoRequest {
                text: "hello".into(),
            },
            CallOptions::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.text, "echo get: hello");
}

#[tokio::test]
async fn server_streaming_fans_out_in_order() {
    let addr = start_echo_server().await;
    let client = connect(addr).await;

    let mut stream = client
        .call_server_streaming::<EchoExpand>(
            EchoRequest {
                text: "a b c".into(),
            },
            CallOptions::new(),
        )
        .await
        .unwrap();

    let mut responses = Vec::new();
    while let Some(item) = stream.next().await {
        responses.push(item.unwrap().text);
    }

    // Exactly one response per token, in order, then a clean end.
    assert_eq!(responses, vec!["a", "b", "c"]);
    assert_eq!(stream.status().await.code(), StatusCode::Ok);
}

#[tokio::test]
async fn client_streaming_aggregates() {
    let addr = start_echo_server().await;
    let client = connect(addr).await;

    let call = client
        .call_client_streaming::<EchoCollect>(CallOptions::new())
        .await
        .unwrap();

    for text in ["a", "b", "c"] {
        call.send(EchoRequest { text: text.into() }).await.unwrap();
    }
    let response = call.finish().await.unwrap();

    assert_eq!(response.text, "a b c");
}

#[tokio::test]
async fn duplex_echoes_in_lockstep() {
    let addr = start_echo_server().await;
    let client = connect(addr).await;

    let mut call = client
        .call_duplex::<EchoUpdate>(CallOptions::new())
        .await
        .unwrap();

    let mut received = 0usize;
    for text in ["one", "two", "three"] {
        call.send(EchoRequest { text: text.into() }).await.unwrap();

        // Each response arrives before the next send is issued.
        let response = call.next().await.unwrap().unwrap();
        assert_eq!(response.text, format!("echo update: {text}"));
        received += 1;
    }

    call.close_sender().unwrap();
    assert!(call.next().await.is_none());
    assert_eq!(received, 3);
}

#[tokio::test]
async fn unknown_method_fails_with_unimplemented() {
    struct Missing;

    impl weft_rpc_service::RpcMethod for Missing {
        type Input = EchoRequest;
        type Output = EchoResponse;

        fn encode_request(input: Self::Input) -> Result<Vec<u8>, std::io::Error> {
            EchoGet::encode_request(input)
        }
        fn decode_request(bytes: &[u8]) -> Result<Self::Input, std::io::Error> {
            EchoGet::decode_request(bytes)
        }
        fn encode_response(output: Self::Output) -> Result<Vec<u8>, std::io::Error> {
            EchoGet::encode_response(output)
        }
        fn decode_response(bytes: &[u8]) -> Result<Self::Output, std::io::Error> {
            EchoGet::decode_response(bytes)
        }
    }

    impl weft_rpc_service::RpcMethodUnary for Missing {
        const DESCRIPTOR: weft_rpc_service::MethodDescriptor =
            weft_rpc_service::MethodDescriptor::unary("/echo.Echo/Missing");
    }

    let addr = start_echo_server().await;
    let client = connect(addr).await;

    let status = client
        .call_unary::<Missing>(EchoRequest { text: "x".into() }, CallOptions::new())
        .await
        .unwrap_err();

    assert_eq!(status.code(), StatusCode::Unimplemented);
}

#[tokio::test]
async fn deadline_expires_locally() {
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

    let client = connect(addr).await;
    let started = Instant::now();

    let status = client
        .call_unary::<EchoGet>(
            EchoRequest { text: "slow".into() },
            CallOptions::new().with_deadline(Duration::from_millis(150)),
        )
        .await
        .unwrap_err();

    assert_eq!(status.code(), StatusCode::DeadlineExceeded);
    // The deadline is detected locally, without waiting out the handler.
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn cancellation_propagates_promptly() {
    let addr = start_echo_server().await;
    let client = connect(addr).await;

    let cancel = CancellationToken::new();
    let mut call = client
        .call_duplex::<EchoUpdate>(CallOptions::new().with_cancel(cancel.clone()))
        .await
        .unwrap();

    call.send(EchoRequest { text: "ping".into() }).await.unwrap();
    let first = call.next().await.unwrap().unwrap();
    assert_eq!(first.text, "echo update: ping");

    cancel.cancel();

    // The pending receive observes cancellation within bounded time and
    // no further message is delivered.
    let outcome = tokio::time::timeout(Duration::from_secs(1), call.next())
        .await
        .expect("cancellation was not observed in time");
    match outcome {
        Some(Err(status)) => assert_eq!(status.code(), StatusCode::Cancelled),
        None => {}
        Some(Ok(msg)) => panic!("message delivered after cancellation: {msg:?}"),
    }

    let send_result = call.send(EchoRequest { text: "late".into() }).await;
    assert!(send_result.is_err());
}

#[tokio::test]
async fn handler_status_metadata_reaches_the_caller() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(RpcServer::new());

    server
        .endpoint()
        .register_unary::<EchoGet, _, _>(|_, _req: EchoRequest| async move {
            let mut metadata = weft::metadata::Metadata::new();
            metadata.append_ascii("retry-hint", "later").unwrap();
            Err::<EchoResponse, BoxError>(Box::new(
                weft::status::Status::new(StatusCode::NotFound, "no such widget")
                    .with_metadata(metadata),
            ))
        })
        .unwrap();

    tokio::spawn(async move {
        let _ = server.serve_with_listener(listener).await;
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = connect(addr).await;
    let status = client
        .call_unary::<EchoGet>(EchoRequest { text: "x".into() }, CallOptions::new())
        .await
        .unwrap_err();

    assert_eq!(status.code(), StatusCode::NotFound);
    assert_eq!(status.message(), "no such widget");
    assert_eq!(status.metadata().get_ascii("retry-hint"), Some("later"));
}

#[tokio::test]
async fn failed_stream_reports_one_terminal_status() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(RpcServer::new());

    server
        .endpoint()
        .register_server_streaming::<EchoExpand, _, _>(
            |_, _req: EchoRequest, _responder| async move {
                Err::<(), BoxError>(Box::new(weft::status::Status::new(
                    StatusCode::FailedPrecondition,
                    "not ready",
                )))
            },
        )
        .unwrap();

    tokio::spawn(async move {
        let _ = server.serve_with_listener(listener).await;
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = connect(addr).await;
    let mut stream = client
        .call_server_streaming::<EchoExpand>(EchoRequest { text: "x".into() }, CallOptions::new())
        .await
        .unwrap();

    let first = stream.next().await.unwrap().unwrap_err();
    assert_eq!(first.code(), StatusCode::FailedPrecondition);
    assert!(stream.next().await.is_none());

    // Repeated observation yields the identical terminal status.
    let terminal = stream.status().await;
    assert_eq!(terminal, first);
}

#[tokio::test]
async fn large_payload_roundtrip() {
    let addr = start_echo_server().await;
    let client = connect(addr).await;

    // Spans many frame chunks in both directions.
    let text = "x".repeat(2 * 1024 * 1024);
    let response = client
        .call_unary::<EchoGet>(EchoRequest { text: text.clone() }, CallOptions::new())
        .await
        .unwrap();

    assert_eq!(response.text.len(), text.len() + "echo get: ".len());
    assert!(response.text.ends_with(&text));
}

#[tokio::test]
async fn flow_control_cycles_credits_over_many_messages() {
    let addr = start_echo_server().await;
    let client = connect(addr).await;

    let mut call = client
        .call_duplex::<EchoUpdate>(CallOptions::new())
        .await
        .unwrap();

    // Cumulative traffic far exceeds one window in each direction; the
    // exchange only makes progress if consuming messages keeps crediting
    // the peer's send window.
    let chunk = "y".repeat(64 * 1024);
    let count = 100;
    for _ in 0..count {
        call.send(EchoRequest {
            text: chunk.clone(),
        })
        .await
        .unwrap();

        let response = call.next().await.unwrap().unwrap();
        assert_eq!(response.text.len(), chunk.len() + "echo update: ".len());
    }

    call.close_sender().unwrap();
    assert!(call.next().await.is_none());
}
