use std::sync::{Arc, Mutex};
use tokio::{
    net::TcpListener,
    time::{Duration, sleep},
};
use weft_tokio_rpc_client::{RpcClient, RpcTransportState};
use weft_tokio_rpc_server::RpcServer;
use weft_tokio_rpc_server::utils::tcp_listener_to_host_port;

#[tokio::test]
async fn test_client_errors_on_connection_failure() {
    // Attempt to connect to an address that is not listening.
    let result = RpcClient::new(
        "127.0.0.1",
        // Use a port that's almost certainly unused.
        1,
    )
    .await;

    assert!(result.is_err());
    let err = result.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::ConnectionRefused);
}

#[tokio::test]
async fn test_transport_state_change_handler() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = Arc::new(RpcServer::new());

    let (server_host, server_port) = tcp_listener_to_host_port(&listener).unwrap();

    let _server_task = tokio::spawn(async move {
        let _ = server.serve_with_listener(listener).await;
    });

    tokio::time::sleep(Duration::from_millis(100)).await;

    let received_states = Arc::new(Mutex::new(Vec::new()));
    let client = RpcClient::new(&server_host.to_string(), server_port)
        .await
        .unwrap();

    let states_clone = received_states.clone();
    client.set_state_change_handler(move |state| {
        states_clone.lock().unwrap().push(state);
    });

    sleep(Duration::from_millis(50)).await;

    // Dropping the client aborts its background tasks and reliably
    // signals the disconnection.
    drop(client);

    sleep(Duration::from_millis(100)).await;

    let final_states = received_states.lock().unwrap();
    assert_eq!(
        *final_states,
        vec![
            RpcTransportState::Connected,
            RpcTransportState::Disconnected
        ],
        "The state change handler should have been called for both connect and disconnect events."
    );
}

#[tokio::test]
async fn in_flight_calls_fail_with_unavailable_on_teardown() {
    use example_weft_echo_service::{EchoRequest, EchoResponse, EchoUpdate};
    use weft::status::StatusCode;
    use weft_rpc_service_caller::{CallOptions, RpcServiceCallerInterface};
    use weft_rpc_service_endpoint::{BoxError, TypedRequestStream};
    use weft_tokio_rpc_server::RpcServiceEndpointInterface;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(RpcServer::new());

    server
        .endpoint()
        .register_duplex::<EchoUpdate, _, _>(
            |_, mut requests: TypedRequestStream<EchoUpdate>, responder| async move {
                while let Some(req) = requests.next().await {
                    responder
                        .send(EchoResponse {
                            text: req?.text,
                        })
                        .await?;
                }
                Ok::<(), BoxError>(())
            },
        )
        .unwrap();

    let _server_task = tokio::spawn(async move {
        let _ = server.serve_with_listener(listener).await;
    });
    sleep(Duration::from_millis(100)).await;

    let client = RpcClient::new(&addr.ip().to_string(), addr.port())
        .await
        .unwrap();

    let mut call = client
        .call_duplex::<EchoUpdate>(CallOptions::new())
        .await
        .unwrap();
    call.send(EchoRequest { text: "up".into() }).await.unwrap();
    assert!(call.next().await.unwrap().is_ok());

    // Tear the transport down with the call still open. The call must
    // resolve promptly rather than hang.
    drop(client);

    let outcome = tokio::time::timeout(Duration::from_secs(2), call.next())
        .await
        .expect("teardown was not observed in time");
    match outcome {
        Some(Err(status)) => assert_eq!(status.code(), StatusCode::Unavailable),
        Some(Ok(msg)) => panic!("message delivered after teardown: {msg:?}"),
        None => panic!("stream ended cleanly despite teardown"),
    }
    assert_eq!(call.status().await.code(), StatusCode::Unavailable);
}
