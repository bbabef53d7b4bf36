use std::sync::{Arc, Mutex};
use weft::metadata::Metadata;
use weft::status::{Status, StatusCode};
use weft_rpc_service_caller::{
    CallOptions, CallReply, ClientCallContext, ClientInterceptor, Next, NextFuture,
    OutboundPayload, run_chain,
};

type Log = Arc<Mutex<Vec<String>>>;

struct Recorder {
    name: &'static str,
    log: Log,
}

#[async_trait::async_trait]
impl ClientInterceptor for Recorder {
    async fn intercept(
        &self,
        mut ctx: ClientCallContext,
        payload: OutboundPayload,
        next: Next<'_>,
    ) -> Result<CallReply, Status> {
        self.log.lock().unwrap().push(format!("{}:pre", self.name));
        ctx.options.metadata.append_ascii(self.name, "seen").unwrap();
        let result = next.run(ctx, payload).await;
        self.log.lock().unwrap().push(format!("{}:post", self.name));
        result
    }
}

struct ShortCircuit;

#[async_trait::async_trait]
impl ClientInterceptor for ShortCircuit {
    async fn intercept(
        &self,
        _ctx: ClientCallContext,
        _payload: OutboundPayload,
        _next: Next<'_>,
    ) -> Result<CallReply, Status> {
        // Never invokes `next`; the call resolves with this status alone.
        Err(Status::new(StatusCode::PermissionDenied, "blocked"))
    }
}

fn ctx() -> ClientCallContext {
    ClientCallContext {
        path: "/test.Svc/Method".into(),
        client_streaming: false,
        server_streaming: false,
        options: CallOptions::new(),
    }
}

#[tokio::test]
async fn chain_runs_in_registration_order() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let chain: Vec<Arc<dyn ClientInterceptor>> = vec![
        Arc::new(Recorder {
            name: "outer",
            log: log.clone(),
        }),
        Arc::new(Recorder {
            name: "inner",
            log: log.clone(),
        }),
    ];

    let terminal = {
        let log = log.clone();
        move |_ctx: ClientCallContext, _payload: OutboundPayload| -> NextFuture {
            let log = log.clone();
            Box::pin(async move {
                log.lock().unwrap().push("terminal".into());
                Ok(CallReply::Unary(b"reply".to_vec()))
            })
        }
    };

    let result = run_chain(&chain, &terminal, ctx(), OutboundPayload::Unary(Vec::new()))
        .await
        .unwrap();
    assert!(matches!(result, CallReply::Unary(bytes) if bytes == b"reply"));

    // First registered is outermost; last registered runs closest to the
    // wire.
    assert_eq!(
        *log.lock().unwrap(),
        vec!["outer:pre", "inner:pre", "terminal", "inner:post", "outer:post"]
    );
}

#[tokio::test]
async fn metadata_mutations_reach_the_terminal() {
    let seen: Arc<Mutex<Option<Metadata>>> = Arc::new(Mutex::new(None));
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let chain: Vec<Arc<dyn ClientInterceptor>> = vec![
        Arc::new(Recorder {
            name: "auth",
            log: log.clone(),
        }),
        Arc::new(Recorder {
            name: "trace",
            log: log.clone(),
        }),
    ];

    let terminal = {
        let seen = seen.clone();
        move |ctx: ClientCallContext, _payload: OutboundPayload| -> NextFuture {
            let seen = seen.clone();
            Box::pin(async move {
                *seen.lock().unwrap() = Some(ctx.options.metadata.clone());
                Ok(CallReply::Unary(Vec::new()))
            })
        }
    };

    run_chain(&chain, &terminal, ctx(), OutboundPayload::Unary(Vec::new()))
        .await
        .unwrap();

    let metadata = seen.lock().unwrap().take().unwrap();
    assert_eq!(metadata.get_ascii("auth"), Some("seen"));
    assert_eq!(metadata.get_ascii("trace"), Some("seen"));
}

#[tokio::test]
async fn short_circuit_skips_terminal_and_inner_stages() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let chain: Vec<Arc<dyn ClientInterceptor>> = vec![
        Arc::new(Recorder {
            name: "outer",
            log: log.clone(),
        }),
        Arc::new(ShortCircuit),
        Arc::new(Recorder {
            name: "never",
            log: log.clone(),
        }),
    ];

    let terminal = {
        let log = log.clone();
        move |_ctx: ClientCallContext, _payload: OutboundPayload| -> NextFuture {
            let log = log.clone();
            Box::pin(async move {
                log.lock().unwrap().push("terminal".into());
                Ok(CallReply::Unary(Vec::new()))
            })
        }
    };

    let result = run_chain(&chain, &terminal, ctx(), OutboundPayload::Unary(Vec::new())).await;

    let status = result.err().unwrap();
    assert_eq!(status.code(), StatusCode::PermissionDenied);
    assert_eq!(
        *log.lock().unwrap(),
        vec!["outer:pre", "outer:post"],
        "inner stages and terminal must not run"
    );
}

#[tokio::test]
async fn empty_chain_goes_straight_to_terminal() {
    let terminal = |_ctx: ClientCallContext, payload: OutboundPayload| -> NextFuture {
        Box::pin(async move {
            match payload {
                OutboundPayload::Unary(bytes) => Ok(CallReply::Unary(bytes)),
                OutboundPayload::Streaming => {
                    Err(Status::internal("unexpected streaming payload"))
                }
            }
        })
    };

    let result = run_chain(&[], &terminal, ctx(), OutboundPayload::Unary(b"echo".to_vec()))
        .await
        .unwrap();
    assert!(matches!(result, CallReply::Unary(bytes) if bytes == b"echo"));
}
