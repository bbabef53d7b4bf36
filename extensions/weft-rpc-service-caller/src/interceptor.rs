use crate::call::RpcCall;
use crate::call_options::CallOptions;
use futures::future::BoxFuture;
use std::sync::Arc;
use weft::status::Status;

/// The in-flight call as an interceptor sees it: the method identity and
/// the mutable outbound options (metadata, deadline, cancellation).
#[derive(Debug, Clone)]
pub struct ClientCallContext {
    pub path: String,
    pub client_streaming: bool,
    pub server_streaming: bool,
    pub options: CallOptions,
}

/// The request as presented to interceptors: materialized bytes for
/// single-request shapes, a marker for streaming requests (whose messages
/// flow below the interceptor layer).
pub enum OutboundPayload {
    Unary(Vec<u8>),
    Streaming,
}

/// What invoking the rest of the chain produced: a materialized response
/// for single-response shapes, or the live call for streaming ones.
pub enum CallReply {
    Unary(Vec<u8>),
    Streaming(RpcCall),
}

pub type NextFuture = BoxFuture<'static, Result<CallReply, Status>>;

/// The innermost stage of a chain: the function that actually dispatches
/// the call. Returns an owned future so the chain borrows nothing from it.
pub type TerminalFn = dyn Fn(ClientCallContext, OutboundPayload) -> NextFuture + Send + Sync;

/// The capability to invoke the rest of the interceptor chain.
///
/// `run` consumes the value, so an interceptor can invoke it at most once.
/// Not invoking it at all short-circuits the call with whatever the
/// interceptor returns.
pub struct Next<'a> {
    chain: &'a [Arc<dyn ClientInterceptor>],
    terminal: &'a TerminalFn,
}

impl<'a> Next<'a> {
    pub fn new(chain: &'a [Arc<dyn ClientInterceptor>], terminal: &'a TerminalFn) -> Self {
        Self { chain, terminal }
    }

    pub async fn run(
        self,
        ctx: ClientCallContext,
        payload: OutboundPayload,
    ) -> Result<CallReply, Status> {
        match self.chain.split_first() {
            Some((head, rest)) => {
                let next = Next {
                    chain: rest,
                    terminal: self.terminal,
                };
                head.intercept(ctx, payload, next).await
            }
            None => (self.terminal)(ctx, payload).await,
        }
    }
}

/// Composable middleware around outbound calls.
///
/// Interceptors run in registration order: the first registered is
/// outermost, the last registered runs closest to the wire. Cancellation
/// needs no cooperation here; the whole chain runs inside the call's task,
/// so cancelling the call drops every pending `next` future.
#[async_trait::async_trait]
pub trait ClientInterceptor: Send + Sync {
    async fn intercept(
        &self,
        ctx: ClientCallContext,
        payload: OutboundPayload,
        next: Next<'_>,
    ) -> Result<CallReply, Status>;
}

/// Runs `payload` through `interceptors` and into `terminal`. Exposed for
/// composition points (channels) and chain tests.
pub async fn run_chain(
    interceptors: &[Arc<dyn ClientInterceptor>],
    terminal: &TerminalFn,
    ctx: ClientCallContext,
    payload: OutboundPayload,
) -> Result<CallReply, Status> {
    Next::new(interceptors, terminal).run(ctx, payload).await
}
