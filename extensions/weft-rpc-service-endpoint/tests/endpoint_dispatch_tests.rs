use example_weft_echo_service::{EchoGet, EchoRequest, EchoResponse};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use weft::envelope::Envelope;
use weft::metadata::Metadata;
use weft::status::{Status, StatusCode};
use weft::stream::{
    MuxDispatcher, SessionConfig, SessionRole, StreamEvent, StreamHeader,
};
use weft_rpc_service::{RpcMethod, RpcMethodUnary};
use weft_rpc_service_endpoint::{
    BoxError, RpcServiceEndpoint, RpcServiceEndpointInterface, ServerConnection,
};

type SharedBuf = Arc<Mutex<Vec<u8>>>;

fn shared_buf() -> SharedBuf {
    Arc::new(Mutex::new(Vec::new()))
}

fn drain(buf: &SharedBuf) -> Vec<u8> {
    buf.lock().unwrap().split_off(0)
}

struct LoopbackCall {
    client: Arc<Mutex<MuxDispatcher>>,
    client_out: SharedBuf,
    status: Arc<Mutex<Option<Status>>>,
    messages: Arc<Mutex<Vec<Vec<u8>>>>,
}

/// Opens a client-side call over an in-memory byte loopback, capturing
/// inbound messages and the terminal status.
fn open_loopback_call(path: &str, request: Option<Vec<u8>>) -> LoopbackCall {
    let client = Arc::new(Mutex::new(MuxDispatcher::new(
        SessionRole::Client,
        SessionConfig::default(),
    )));
    let client_out = shared_buf();
    let status: Arc<Mutex<Option<Status>>> = Arc::new(Mutex::new(None));
    let messages: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));

    let handler = {
        let status = status.clone();
        let messages = messages.clone();
        move |event: StreamEvent| match event {
            StreamEvent::Message { envelope, .. } => {
                messages.lock().unwrap().push(envelope.payload);
            }
            StreamEvent::Trailers { trailers, .. } => {
                *status.lock().unwrap() = Some(
                    Status::from_trailers(&trailers)
                        .unwrap_or_else(|| Status::internal("missing status")),
                );
            }
            StreamEvent::Canceled { status: s, .. } => {
                *status.lock().unwrap() = Some(s);
            }
            _ => {}
        }
    };

    let emit = {
        let out = client_out.clone();
        move |bytes: &[u8]| out.lock().unwrap().extend_from_slice(bytes)
    };

    let mut encoder = client
        .lock()
        .unwrap()
        .open_stream(&StreamHeader::new(path, Metadata::new()), emit, handler)
        .unwrap();

    if let Some(payload) = request {
        encoder
            .send_envelope(&Envelope {
                compressed: false,
                payload,
            })
            .unwrap();
    }
    encoder.close(&Metadata::new()).unwrap();

    LoopbackCall {
        client,
        client_out,
        status,
        messages,
    }
}

/// Pumps bytes between the loopback client and the endpoint until the
/// call resolves or the attempt limit runs out.
async fn pump_until_resolved(
    endpoint: &RpcServiceEndpoint<()>,
    conn: &ServerConnection,
    call: &LoopbackCall,
) -> Status {
    let server_out = shared_buf();

    for _ in 0..100 {
        let to_server = drain(&call.client_out);
        if !to_server.is_empty() {
            let out = server_out.clone();
            endpoint
                .read_bytes(conn, (), &to_server, move |bytes: Vec<u8>| {
                    out.lock().unwrap().extend_from_slice(&bytes);
                })
                .await
                .unwrap();
        }

        let to_client = drain(&server_out);
        if !to_client.is_empty() {
            call.client.lock().unwrap().read_bytes(&to_client).unwrap();
        }

        if let Some(status) = call.status.lock().unwrap().clone() {
            return status;
        }

        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    panic!("call did not resolve");
}

#[test]
fn duplicate_registration_is_rejected() {
    let endpoint: RpcServiceEndpoint<()> = RpcServiceEndpoint::new();

    endpoint
        .register_unary::<EchoGet, _, _>(|_, req: EchoRequest| async move {
            Ok::<EchoResponse, BoxError>(EchoResponse { text: req.text })
        })
        .unwrap();

    let second = endpoint.register_unary::<EchoGet, _, _>(|_, req: EchoRequest| async move {
        Ok::<EchoResponse, BoxError>(EchoResponse { text: req.text })
    });

    assert!(second.is_err());
}

#[tokio::test]
async fn unknown_method_is_rejected_before_any_handler() {
    let endpoint: RpcServiceEndpoint<()> = RpcServiceEndpoint::new();
    let conn = ServerConnection::default();

    let call = open_loopback_call("/no.Such/Method", Some(b"ignored".to_vec()));
    let status = pump_until_resolved(&endpoint, &conn, &call).await;

    assert_eq!(status.code(), StatusCode::Unimplemented);
    assert!(call.messages.lock().unwrap().is_empty());
    // The rejected stream never consumed handler concurrency.
    assert_eq!(conn.active_streams(), 0);
}

#[tokio::test]
async fn unary_handler_roundtrip() {
    let endpoint: RpcServiceEndpoint<()> = RpcServiceEndpoint::new();
    endpoint
        .register_unary::<EchoGet, _, _>(|_, req: EchoRequest| async move {
            Ok::<EchoResponse, BoxError>(EchoResponse {
                text: format!("echo get: {}", req.text),
            })
        })
        .unwrap();

    let conn = ServerConnection::default();
    let request = EchoGet::encode_request(EchoRequest {
        text: "hello".into(),
    })
    .unwrap();

    let call = open_loopback_call(EchoGet::DESCRIPTOR.path, Some(request));
    let status = pump_until_resolved(&endpoint, &conn, &call).await;

    assert_eq!(status.code(), StatusCode::Ok);
    let messages = call.messages.lock().unwrap();
    assert_eq!(messages.len(), 1);
    let response = EchoGet::decode_response(&messages[0]).unwrap();
    assert_eq!(response.text, "echo get: hello");
}

#[tokio::test]
async fn handler_status_error_passes_through() {
    let endpoint: RpcServiceEndpoint<()> = RpcServiceEndpoint::new();
    endpoint
        .register_unary::<EchoGet, _, _>(|_, _req: EchoRequest| async move {
            Err::<EchoResponse, BoxError>(Box::new(Status::new(
                StatusCode::NotFound,
                "no such widget",
            )))
        })
        .unwrap();

    let conn = ServerConnection::default();
    let request = EchoGet::encode_request(EchoRequest { text: "x".into() }).unwrap();
    let call = open_loopback_call(EchoGet::DESCRIPTOR.path, Some(request));
    let status = pump_until_resolved(&endpoint, &conn, &call).await;

    assert_eq!(status.code(), StatusCode::NotFound);
    assert_eq!(status.message(), "no such widget");
}

#[tokio::test]
async fn handler_opaque_error_maps_to_internal() {
    let endpoint: RpcServiceEndpoint<()> = RpcServiceEndpoint::new();
    endpoint
        .register_unary::<EchoGet, _, _>(|_, _req: EchoRequest| async move {
            Err::<EchoResponse, BoxError>("boom".into())
        })
        .unwrap();

    let conn = ServerConnection::default();
    let request = EchoGet::encode_request(EchoRequest { text: "x".into() }).unwrap();
    let call = open_loopback_call(EchoGet::DESCRIPTOR.path, Some(request));
    let status = pump_until_resolved(&endpoint, &conn, &call).await;

    assert_eq!(status.code(), StatusCode::Internal);
    assert_eq!(status.message(), "boom");
}

#[tokio::test]
async fn missing_request_message_is_internal() {
    let endpoint: RpcServiceEndpoint<()> = RpcServiceEndpoint::new();
    endpoint
        .register_unary::<EchoGet, _, _>(|_, req: EchoRequest| async move {
            Ok::<EchoResponse, BoxError>(EchoResponse { text: req.text })
        })
        .unwrap();

    let conn = ServerConnection::default();
    // Half-close with no request message at all.
    let call = open_loopback_call(EchoGet::DESCRIPTOR.path, None);
    let status = pump_until_resolved(&endpoint, &conn, &call).await;

    assert_eq!(status.code(), StatusCode::Internal);
}
